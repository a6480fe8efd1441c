//! Call-graph analysis and Tarjan's SCC algorithm.
//!
//! Builds a directed graph of calls between the functions of one module
//! and finds strongly-connected components. A function is *recursive* if it
//! belongs to an SCC with a cycle (size > 1, or size 1 with a self-edge);
//! SCCs of size > 1 are mutual recursion.
//!
//! Tarjan emits components callees-first, which is exactly the order in
//! which functions must be analysed so that every non-recursive callee
//! already has a class when its caller is built.

use std::collections::{BTreeMap, BTreeSet};

use crate::nodes::{FunctionNode, SyntaxNode};

#[derive(Clone, Debug, Default)]
pub struct CallGraph {
    /// Declaration order of the module's functions.
    functions: Vec<String>,
    /// Calls from each function to other functions of the same module.
    edges: BTreeMap<String, BTreeSet<String>>,
    /// Components in callee-first order.
    sccs: Vec<Vec<String>>,
}

impl CallGraph {
    pub fn build(functions: &[FunctionNode]) -> Self {
        let names: BTreeSet<&str> = functions.iter().map(|f| f.name.as_str()).collect();
        let mut edges = BTreeMap::new();
        for function in functions {
            let mut callees = BTreeSet::new();
            collect_callees(&function.body, &mut callees);
            callees.retain(|callee| names.contains(callee.as_str()));
            edges.insert(function.name.clone(), callees);
        }
        let order: Vec<String> = functions.iter().map(|f| f.name.clone()).collect();
        let sccs = tarjan_scc(&edges, &order);
        CallGraph {
            functions: order,
            edges,
            sccs,
        }
    }

    /// Module functions called directly by `function`.
    pub fn callees(&self, function: &str) -> impl Iterator<Item = &str> {
        self.edges
            .get(function)
            .into_iter()
            .flat_map(|callees| callees.iter().map(String::as_str))
    }

    pub fn calls_itself(&self, function: &str) -> bool {
        self.edges
            .get(function)
            .is_some_and(|callees| callees.contains(function))
    }

    pub fn is_mutually_recursive(&self, function: &str) -> bool {
        self.sccs
            .iter()
            .any(|scc| scc.len() > 1 && scc.iter().any(|f| f == function))
    }

    /// Functions ordered so that callees come before their callers.
    /// Members of one component keep their declaration order.
    pub fn analysis_order(&self) -> Vec<&str> {
        let position: BTreeMap<&str, usize> = self
            .functions
            .iter()
            .enumerate()
            .map(|(i, f)| (f.as_str(), i))
            .collect();
        let mut order = Vec::with_capacity(self.functions.len());
        for scc in &self.sccs {
            let mut members: Vec<&str> = scc.iter().map(String::as_str).collect();
            members.sort_by_key(|f| position.get(f).copied().unwrap_or(usize::MAX));
            order.extend(members);
        }
        order
    }
}

fn collect_callees(node: &SyntaxNode, callees: &mut BTreeSet<String>) {
    match node {
        SyntaxNode::Call { callee, args } => {
            callees.insert(callee.clone());
            for arg in args {
                collect_callees(arg, callees);
            }
        }
        SyntaxNode::Sequence(stmts) => {
            for stmt in stmts {
                collect_callees(stmt, callees);
            }
        }
        SyntaxNode::Conditional {
            condition,
            then_branch,
            else_branch,
        } => {
            collect_callees(condition, callees);
            collect_callees(then_branch, callees);
            if let Some(else_branch) = else_branch {
                collect_callees(else_branch, callees);
            }
        }
        SyntaxNode::ForLoop {
            start,
            stop,
            step,
            body,
            ..
        } => {
            collect_callees(start, callees);
            collect_callees(stop, callees);
            collect_callees(step, callees);
            collect_callees(body, callees);
        }
        SyntaxNode::WhileLoop { condition, body } => {
            collect_callees(condition, callees);
            collect_callees(body, callees);
        }
        SyntaxNode::Assignment { value, .. } => collect_callees(value, callees),
        SyntaxNode::BinaryOp { left, right, .. } => {
            collect_callees(left, callees);
            collect_callees(right, callees);
        }
        SyntaxNode::Return(Some(value)) => collect_callees(value, callees),
        SyntaxNode::Return(None)
        | SyntaxNode::Literal(_)
        | SyntaxNode::Identifier(_)
        | SyntaxNode::Pass => {}
    }
}

// ---------------------------------------------------------------------------
// Tarjan's SCC algorithm
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TarjanState {
    index_counter: usize,
    stack: Vec<String>,
    on_stack: BTreeSet<String>,
    indices: BTreeMap<String, usize>,
    lowlinks: BTreeMap<String, usize>,
    sccs: Vec<Vec<String>>,
}

fn tarjan_scc(graph: &BTreeMap<String, BTreeSet<String>>, nodes: &[String]) -> Vec<Vec<String>> {
    let mut state = TarjanState::default();
    for node in nodes {
        if !state.indices.contains_key(node) {
            strongconnect(node, graph, &mut state);
        }
    }
    state.sccs
}

fn strongconnect(v: &str, graph: &BTreeMap<String, BTreeSet<String>>, state: &mut TarjanState) {
    let idx = state.index_counter;
    state.index_counter += 1;
    state.indices.insert(v.to_string(), idx);
    state.lowlinks.insert(v.to_string(), idx);
    state.stack.push(v.to_string());
    state.on_stack.insert(v.to_string());

    if let Some(callees) = graph.get(v) {
        for w in callees {
            if let Some(&w_idx) = state.indices.get(w) {
                if state.on_stack.contains(w) {
                    let v_low = state.lowlinks[v];
                    if w_idx < v_low {
                        state.lowlinks.insert(v.to_string(), w_idx);
                    }
                }
            } else if graph.contains_key(w) {
                strongconnect(w, graph, state);
                let w_low = state.lowlinks[w];
                let v_low = state.lowlinks[v];
                if w_low < v_low {
                    state.lowlinks.insert(v.to_string(), w_low);
                }
            }
        }
    }

    if state.lowlinks[v] == state.indices[v] {
        let mut scc = Vec::new();
        while let Some(w) = state.stack.pop() {
            state.on_stack.remove(&w);
            let done = w == v;
            scc.push(w);
            if done {
                break;
            }
        }
        state.sccs.push(scc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calling(name: &str, callees: &[&str]) -> FunctionNode {
        FunctionNode::new(
            name,
            &["n"],
            callees
                .iter()
                .map(|c| SyntaxNode::call(c, vec![SyntaxNode::ident("n")]))
                .collect(),
        )
    }

    #[test]
    fn test_self_recursion() {
        let graph = CallGraph::build(&[calling("fact", &["fact"]), calling("main", &["fact"])]);
        assert!(graph.calls_itself("fact"));
        assert!(!graph.is_mutually_recursive("fact"));
        assert!(!graph.calls_itself("main"));
    }

    #[test]
    fn test_mutual_recursion() {
        let graph = CallGraph::build(&[
            calling("is_even", &["is_odd"]),
            calling("is_odd", &["is_even"]),
            calling("main", &["is_even"]),
        ]);
        assert!(graph.is_mutually_recursive("is_even"));
        assert!(graph.is_mutually_recursive("is_odd"));
        assert!(!graph.calls_itself("is_odd"));
        assert!(!graph.is_mutually_recursive("main"));
    }

    #[test]
    fn test_analysis_order_is_callee_first() {
        let graph = CallGraph::build(&[
            calling("main", &["helper", "print"]),
            calling("helper", &["leaf"]),
            calling("leaf", &[]),
        ]);
        assert_eq!(graph.analysis_order(), vec!["leaf", "helper", "main"]);
    }

    #[test]
    fn test_external_calls_are_not_edges() {
        let graph = CallGraph::build(&[calling("main", &["print", "len"])]);
        assert_eq!(graph.callees("main").count(), 0);
        assert!(!graph.calls_itself("main"));
        assert!(!graph.is_mutually_recursive("main"));
    }
}
