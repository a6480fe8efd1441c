//! Per-module analysis driver.
//!
//! Builds the call graph, walks the functions callee-first, and turns every
//! cost expression into a [`FunctionReport`]. One [`Analyzer::analyze_module`]
//! call owns its own recurrence memo; nothing outlives the returned report.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use itertools::Itertools;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::adapter::ModuleItem;
use crate::call_graph::CallGraph;
use crate::complexity::{Classifier, ComplexityClass};
use crate::config::EngineConfig;
use crate::cost::{Built, CostBuilder, CostExpression};
use crate::error::{AnalysisError, UnsupportedConstruct};
use crate::nodes::FunctionNode;

/// Cooperative cancellation flag shared between a caller and a running
/// analysis. Checked between top-level statements.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FunctionReport {
    pub function_name: String,
    pub complexity: ComplexityClass,
    /// Symbolic cost expression the class was derived from.
    pub cost: String,
    pub warnings: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ModuleReport {
    pub functions: Vec<FunctionReport>,
}

impl ModuleReport {
    pub fn get(&self, function_name: &str) -> Option<&FunctionReport> {
        self.functions
            .iter()
            .find(|f| f.function_name == function_name)
    }

    /// Worst class over all functions; `O(1)` for an empty module.
    pub fn worst(&self) -> ComplexityClass {
        self.functions
            .iter()
            .map(|f| f.complexity)
            .fold(ComplexityClass::O1, ComplexityClass::max)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Analyzer {
    config: EngineConfig,
    cancellation: Option<CancellationToken>,
}

impl Analyzer {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn analyze_function(&self, function: &FunctionNode) -> Result<FunctionReport, AnalysisError> {
        let mut report = self.analyze_module(std::slice::from_ref(function))?;
        Ok(report.functions.remove(0))
    }

    pub fn analyze_module(&self, functions: &[FunctionNode]) -> Result<ModuleReport, AnalysisError> {
        self.run(functions, &[])
    }

    /// Like [`Analyzer::analyze_module`], for adapter output in which some
    /// functions were already rejected. Reports keep declaration order.
    pub fn analyze_items(&self, items: &[ModuleItem]) -> Result<ModuleReport, AnalysisError> {
        let mut functions = Vec::new();
        let mut rejected = Vec::new();
        for item in items {
            match item {
                ModuleItem::Function(function) => functions.push(function.clone()),
                ModuleItem::Rejected { name, error } => {
                    if self.config.abort_on_unsupported {
                        return Err(error.clone().into());
                    }
                    rejected.push((name.clone(), error.clone()));
                }
            }
        }
        let report = self.run(&functions, &rejected)?;

        let mut by_name: HashMap<String, FunctionReport> = report
            .functions
            .into_iter()
            .map(|f| (f.function_name.clone(), f))
            .collect();
        let functions = items
            .iter()
            .filter_map(|item| by_name.remove(item.name()))
            .collect();
        Ok(ModuleReport { functions })
    }

    fn run(
        &self,
        functions: &[FunctionNode],
        rejected: &[(String, UnsupportedConstruct)],
    ) -> Result<ModuleReport, AnalysisError> {
        let graph = CallGraph::build(functions);
        let mut known: HashMap<String, ComplexityClass> = HashMap::new();
        let mut reports: HashMap<String, FunctionReport> = HashMap::new();
        for (name, error) in rejected {
            known.insert(name.clone(), ComplexityClass::Unknown);
            reports.insert(name.clone(), degraded(name, error));
        }

        let mut classifier = Classifier::new();
        for name in graph.analysis_order() {
            if self.is_cancelled() {
                return Err(AnalysisError::Cancelled);
            }
            let Some(function) = functions.iter().find(|f| f.name == name) else {
                continue;
            };
            let report = self.analyze_one(function, &graph, &known, &mut classifier)?;
            known.insert(report.function_name.clone(), report.complexity);
            reports.insert(report.function_name.clone(), report);
        }

        let functions = functions
            .iter()
            .map(|f| f.name.as_str())
            .chain(rejected.iter().map(|(name, _)| name.as_str()))
            .unique()
            .filter_map(|name| reports.remove(name))
            .collect();
        Ok(ModuleReport { functions })
    }

    #[instrument(skip_all, fields(function = %function.name))]
    fn analyze_one(
        &self,
        function: &FunctionNode,
        graph: &CallGraph,
        known: &HashMap<String, ComplexityClass>,
        classifier: &mut Classifier,
    ) -> Result<FunctionReport, AnalysisError> {
        let mut builder = CostBuilder::new(&self.config, known, graph);
        if let Some(token) = &self.cancellation {
            builder = builder.with_cancellation(token);
        }
        let built = match builder.build(function) {
            Ok(built) => built,
            Err(AnalysisError::Unsupported(error)) if !self.config.abort_on_unsupported => {
                let report = degraded(&function.name, &error);
                warn!("{error}");
                return Ok(report);
            }
            Err(e) => return Err(e),
        };

        let classification = match built.built {
            Built::Cost(expr) => classifier.classify(&expr),
            Built::Recurrence(relation) => {
                let name = relation.function.clone();
                classifier.register(relation);
                classifier.classify(&CostExpression::RecurrenceRef(name))
            }
        };
        let warnings: Vec<String> = built
            .warnings
            .into_iter()
            .chain(classification.warnings)
            .unique()
            .collect();
        for warning in &warnings {
            warn!("{warning}");
        }
        debug!(complexity = %classification.class, cost = %built.expression, "classified");

        Ok(FunctionReport {
            function_name: function.name.clone(),
            complexity: classification.class,
            cost: built.expression.to_string(),
            warnings,
        })
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }
}

fn degraded(name: &str, error: &UnsupportedConstruct) -> FunctionReport {
    FunctionReport {
        function_name: name.to_string(),
        complexity: ComplexityClass::Unknown,
        cost: "?".to_string(),
        warnings: vec![error.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{BinOp, SyntaxNode};

    fn id(name: &str) -> SyntaxNode {
        SyntaxNode::ident(name)
    }

    fn linear(name: &str) -> FunctionNode {
        FunctionNode::new(
            name,
            &["n"],
            vec![SyntaxNode::for_range(
                "i",
                SyntaxNode::lit(0),
                id("n"),
                SyntaxNode::lit(1),
                SyntaxNode::call("print", vec![id("i")]),
            )],
        )
    }

    #[test]
    fn test_callee_class_flows_into_caller() {
        let caller = FunctionNode::new(
            "caller",
            &["n"],
            vec![SyntaxNode::for_range(
                "j",
                SyntaxNode::lit(0),
                id("n"),
                SyntaxNode::lit(1),
                SyntaxNode::call("helper", vec![id("n")]),
            )],
        );
        let report = Analyzer::default()
            .analyze_module(&[caller, linear("helper")])
            .unwrap();
        assert_eq!(report.functions[0].function_name, "caller");
        assert_eq!(report.get("helper").unwrap().complexity, ComplexityClass::ON);
        assert_eq!(
            report.get("caller").unwrap().complexity,
            ComplexityClass::OPolynomial(2)
        );
        assert_eq!(report.worst(), ComplexityClass::OPolynomial(2));
    }

    #[test]
    fn test_mutual_recursion_degrades() {
        let ping = FunctionNode::new("ping", &["n"], vec![SyntaxNode::call("pong", vec![id("n")])]);
        let pong = FunctionNode::new("pong", &["n"], vec![SyntaxNode::call("ping", vec![id("n")])]);
        let report = Analyzer::default()
            .analyze_module(&[ping, pong, linear("other")])
            .unwrap();
        let ping = report.get("ping").unwrap();
        assert_eq!(ping.complexity, ComplexityClass::Unknown);
        assert_eq!(ping.warnings, vec!["unsupported construct: mutual recursion"]);
        assert_eq!(report.get("other").unwrap().complexity, ComplexityClass::ON);
    }

    #[test]
    fn test_caller_of_degraded_function_is_warned() {
        let ping = FunctionNode::new("ping", &["n"], vec![SyntaxNode::call("pong", vec![id("n")])]);
        let pong = FunctionNode::new("pong", &["n"], vec![SyntaxNode::call("ping", vec![id("n")])]);
        let main = FunctionNode::new("main", &["n"], vec![SyntaxNode::call("ping", vec![id("n")])]);
        let report = Analyzer::default()
            .analyze_module(&[ping, pong, main])
            .unwrap();
        let main = report.get("main").unwrap();
        assert_eq!(main.complexity, ComplexityClass::Unknown);
        assert_eq!(main.warnings, vec!["`ping` has unknown complexity"]);
    }

    #[test]
    fn test_caller_of_rejected_function_is_warned() {
        let items = vec![
            ModuleItem::Rejected {
                name: "load".to_string(),
                error: UnsupportedConstruct::new("Try"),
            },
            ModuleItem::Function(FunctionNode::new(
                "main",
                &[],
                vec![SyntaxNode::call("load", vec![])],
            )),
        ];
        let report = Analyzer::default().analyze_items(&items).unwrap();
        let main = report.get("main").unwrap();
        assert_eq!(main.complexity, ComplexityClass::Unknown);
        assert_eq!(main.warnings, vec!["`load` has unknown complexity"]);
    }

    #[test]
    fn test_abort_on_unsupported() {
        let config = EngineConfig {
            abort_on_unsupported: true,
            ..EngineConfig::default()
        };
        let ping = FunctionNode::new("ping", &["n"], vec![SyntaxNode::call("ping2", vec![id("n")])]);
        let ping2 = FunctionNode::new("ping2", &["n"], vec![SyntaxNode::call("ping", vec![id("n")])]);
        let result = Analyzer::new(config).analyze_module(&[ping, ping2]);
        assert!(matches!(result, Err(AnalysisError::Unsupported(_))));
    }

    #[test]
    fn test_recursive_function_is_solved() {
        let countdown = FunctionNode::new(
            "countdown",
            &["n"],
            vec![
                SyntaxNode::conditional(
                    SyntaxNode::binary(BinOp::Le, id("n"), SyntaxNode::lit(0)),
                    SyntaxNode::ret(None),
                    None,
                ),
                SyntaxNode::call(
                    "countdown",
                    vec![SyntaxNode::binary(BinOp::Sub, id("n"), SyntaxNode::lit(1))],
                ),
            ],
        );
        let report = Analyzer::default().analyze_function(&countdown).unwrap();
        assert_eq!(report.complexity, ComplexityClass::ON);
        assert!(report.cost.contains("T_countdown(n-1)"), "{}", report.cost);
    }

    #[test]
    fn test_cancelled_run_returns_no_report() {
        let token = CancellationToken::new();
        let analyzer = Analyzer::default().with_cancellation(token.clone());
        token.cancel();
        assert_eq!(
            analyzer.analyze_module(&[linear("f")]),
            Err(AnalysisError::Cancelled)
        );
    }

    #[test]
    fn test_rejected_items_keep_their_place() {
        let items = vec![
            ModuleItem::Function(linear("first")),
            ModuleItem::Rejected {
                name: "broken".to_string(),
                error: UnsupportedConstruct::new("Try"),
            },
            ModuleItem::Function(linear("last")),
        ];
        let report = Analyzer::default().analyze_items(&items).unwrap();
        let names: Vec<&str> = report
            .functions
            .iter()
            .map(|f| f.function_name.as_str())
            .collect();
        assert_eq!(names, vec!["first", "broken", "last"]);
        assert_eq!(report.functions[1].complexity, ComplexityClass::Unknown);
    }

    #[test]
    fn test_report_serialises_notation() {
        let report = Analyzer::default().analyze_function(&linear("f")).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["complexity"], "O(n)");
        assert_eq!(json["function_name"], "f");
    }
}
