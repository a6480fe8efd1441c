//! Cost Expression Building
//!
//! Walks one function body and produces a symbolic [`CostExpression`]:
//! blocks sum their statements, loops multiply their iteration bound by the
//! cost of one pass, conditionals take the worst branch. A function that
//! calls itself additionally yields a [`RecurrenceRelation`] with one term
//! per call site, which the classifier hands to the recurrence solver.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use tracing::debug;

use crate::analysis::CancellationToken;
use crate::bound_resolution::{BoundResolver, SymbolicBound};
use crate::call_graph::CallGraph;
use crate::complexity::{ComplexityClass, Classifier};
use crate::config::EngineConfig;
use crate::error::{AnalysisError, UnsupportedConstruct};
use crate::nodes::{BinOp, FunctionNode, SyntaxNode};
use crate::recurrence::{Multiplicity, RecurrenceRelation, RecursiveTerm, Shrink};
use crate::tracker::{Scope, Value, VariableState, VariableTracker};

/// Symbolic cost of a piece of code.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CostExpression {
    Constant(BigUint),
    Sum(Vec<CostExpression>),
    Product(Vec<CostExpression>),
    /// Mutually exclusive alternatives; the worst one counts.
    Max(Vec<CostExpression>),
    /// Iteration count of a loop.
    Bound(SymbolicBound),
    /// Cost of a call whose class is already known.
    Class(ComplexityClass),
    /// The solved recurrence of a recursive function.
    RecurrenceRef(String),
    /// One recursive call site inside the function's own body.
    RecursiveCall { function: String, shrink: Shrink },
}

impl CostExpression {
    pub fn constant(value: u64) -> CostExpression {
        CostExpression::Constant(BigUint::from(value))
    }

    pub fn zero() -> CostExpression {
        CostExpression::Constant(BigUint::zero())
    }

    pub fn one() -> CostExpression {
        CostExpression::Constant(BigUint::one())
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, CostExpression::Constant(c) if c.is_zero())
    }

    /// Flattening sum; zero terms are dropped.
    pub fn sum(terms: Vec<CostExpression>) -> CostExpression {
        let mut flat = Vec::with_capacity(terms.len());
        for term in terms {
            match term {
                CostExpression::Sum(inner) => flat.extend(inner),
                t if t.is_zero() => {}
                t => flat.push(t),
            }
        }
        match flat.len() {
            0 => CostExpression::zero(),
            1 => flat.remove(0),
            _ => CostExpression::Sum(flat),
        }
    }

    pub fn product(factors: Vec<CostExpression>) -> CostExpression {
        let mut flat = Vec::with_capacity(factors.len());
        for factor in factors {
            match factor {
                CostExpression::Product(inner) => flat.extend(inner),
                f => flat.push(f),
            }
        }
        match flat.len() {
            0 => CostExpression::one(),
            1 => flat.remove(0),
            _ => CostExpression::Product(flat),
        }
    }

    pub fn max(alternatives: Vec<CostExpression>) -> CostExpression {
        let mut flat = Vec::with_capacity(alternatives.len());
        for alternative in alternatives {
            match alternative {
                CostExpression::Max(inner) => flat.extend(inner),
                a => flat.push(a),
            }
        }
        match flat.len() {
            0 => CostExpression::zero(),
            1 => flat.remove(0),
            _ => CostExpression::Max(flat),
        }
    }

    pub fn contains_recursion(&self) -> bool {
        match self {
            CostExpression::RecursiveCall { .. } => true,
            CostExpression::Sum(children)
            | CostExpression::Product(children)
            | CostExpression::Max(children) => children.iter().any(Self::contains_recursion),
            _ => false,
        }
    }

    /// The same expression with every recursive call site costed as one step.
    pub fn without_recursion(&self) -> CostExpression {
        match self {
            CostExpression::RecursiveCall { .. } => CostExpression::one(),
            CostExpression::Sum(children) => {
                CostExpression::Sum(children.iter().map(Self::without_recursion).collect())
            }
            CostExpression::Product(children) => {
                CostExpression::Product(children.iter().map(Self::without_recursion).collect())
            }
            CostExpression::Max(children) => {
                CostExpression::Max(children.iter().map(Self::without_recursion).collect())
            }
            other => other.clone(),
        }
    }
}

fn join(f: &mut fmt::Formatter<'_>, children: &[CostExpression], sep: &str) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{child}")?;
    }
    Ok(())
}

impl fmt::Display for CostExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostExpression::Constant(c) => write!(f, "{c}"),
            CostExpression::Sum(children) => {
                write!(f, "(")?;
                join(f, children, " + ")?;
                write!(f, ")")
            }
            CostExpression::Product(children) => join(f, children, " * "),
            CostExpression::Max(children) => {
                write!(f, "max(")?;
                join(f, children, ", ")?;
                write!(f, ")")
            }
            CostExpression::Bound(bound) => write!(f, "[{bound}]"),
            CostExpression::Class(class) => write!(f, "{class}"),
            CostExpression::RecurrenceRef(function) => write!(f, "T_{function}(n)"),
            CostExpression::RecursiveCall { function, shrink } => match shrink {
                Shrink::Divide(b) => write!(f, "T_{function}(n/{b})"),
                Shrink::Decrement(c) => write!(f, "T_{function}(n-{c})"),
                Shrink::Unrecognised => write!(f, "T_{function}(?)"),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Built {
    Cost(CostExpression),
    Recurrence(RecurrenceRelation),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuiltFunction {
    pub built: Built,
    /// Full body cost, recursive call sites included.
    pub expression: CostExpression,
    pub warnings: Vec<String>,
}

/// Builds cost expressions for the functions of one module.
///
/// `known` holds the classes of module functions analysed so far; callers
/// are expected to build functions in [`CallGraph::analysis_order`].
pub struct CostBuilder<'a> {
    config: &'a EngineConfig,
    known: &'a HashMap<String, ComplexityClass>,
    graph: &'a CallGraph,
    cancellation: Option<&'a CancellationToken>,
}

impl<'a> CostBuilder<'a> {
    pub fn new(
        config: &'a EngineConfig,
        known: &'a HashMap<String, ComplexityClass>,
        graph: &'a CallGraph,
    ) -> Self {
        Self {
            config,
            known,
            graph,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn build(&self, function: &FunctionNode) -> Result<BuiltFunction, AnalysisError> {
        if self.graph.is_mutually_recursive(&function.name) {
            return Err(UnsupportedConstruct::new("mutual recursion").into());
        }

        let params: BTreeSet<String> = function.params.iter().cloned().collect();
        let mut walker = Walker {
            builder: self,
            function,
            tracker: VariableTracker::new(&params),
            warnings: Vec::new(),
        };
        let mut scope = Scope::new();
        let expression = walker.block(function.body.statements(), &mut scope, true)?;
        let mut warnings = walker.warnings;

        if !expression.contains_recursion() {
            return Ok(BuiltFunction {
                built: Built::Cost(expression.clone()),
                expression,
                warnings,
            });
        }

        let mut terms = Vec::new();
        collect_terms(&expression, Multiplicity::Times(1), &mut terms);
        let residual_expr = expression.without_recursion();
        let residual = Classifier::new().classify(&residual_expr);
        warnings.extend(residual.warnings);

        if terms.is_empty() {
            // Every recursive call sits in a loop that never runs.
            return Ok(BuiltFunction {
                built: Built::Cost(residual_expr),
                expression,
                warnings,
            });
        }

        let relation = RecurrenceRelation {
            function: function.name.clone(),
            terms,
            residual: residual.class,
        };
        debug!(function = %function.name, %relation, "built recurrence");
        Ok(BuiltFunction {
            built: Built::Recurrence(relation),
            expression,
            warnings,
        })
    }
}

struct Walker<'a> {
    builder: &'a CostBuilder<'a>,
    function: &'a FunctionNode,
    tracker: VariableTracker<'a>,
    warnings: Vec<String>,
}

impl<'a> Walker<'a> {
    fn block(
        &mut self,
        stmts: &[SyntaxNode],
        scope: &mut Scope,
        top_level: bool,
    ) -> Result<CostExpression, AnalysisError> {
        let mut costs = Vec::with_capacity(stmts.len());
        for stmt in stmts {
            if top_level
                && self
                    .builder
                    .cancellation
                    .is_some_and(CancellationToken::is_cancelled)
            {
                return Err(AnalysisError::Cancelled);
            }
            costs.push(self.statement(stmt, scope)?);
            self.tracker.apply_statement(scope, stmt);
        }
        Ok(CostExpression::sum(costs))
    }

    fn statement(
        &mut self,
        stmt: &SyntaxNode,
        scope: &mut Scope,
    ) -> Result<CostExpression, AnalysisError> {
        match stmt {
            SyntaxNode::Sequence(stmts) => self.block(stmts, scope, false),
            SyntaxNode::Pass => Ok(CostExpression::zero()),
            SyntaxNode::Return(None) => Ok(CostExpression::one()),
            SyntaxNode::Return(Some(value)) | SyntaxNode::Assignment { value, .. } => Ok(
                CostExpression::sum(vec![CostExpression::one(), self.expression(value, scope)]),
            ),
            SyntaxNode::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.expression(condition, scope);
                let mut then_scope = scope.clone();
                let then_cost = self.block(then_branch.statements(), &mut then_scope, false)?;
                let else_cost = match else_branch {
                    Some(else_branch) => {
                        let mut else_scope = scope.clone();
                        self.block(else_branch.statements(), &mut else_scope, false)?
                    }
                    None => CostExpression::zero(),
                };
                Ok(CostExpression::sum(vec![
                    CostExpression::one(),
                    condition,
                    CostExpression::max(vec![then_cost, else_cost]),
                ]))
            }
            SyntaxNode::ForLoop {
                iterator,
                start,
                stop,
                step,
                body,
            } => {
                let bound = BoundResolver::new(&self.tracker).resolve(stmt, scope, &mut self.warnings);
                if bound.is_zero() {
                    return Ok(CostExpression::zero());
                }
                let header = CostExpression::sum(vec![
                    self.expression(start, scope),
                    self.expression(stop, scope),
                    self.expression(step, scope),
                ]);

                let mut inner = loop_scope(scope, body);
                let descending = self.tracker.literal(scope, step).is_some_and(|d| d < 0);
                match (
                    self.tracker.value_of(scope, start),
                    self.tracker.value_of(scope, stop),
                ) {
                    (Some(from), Some(to)) => {
                        let (low, high) = if descending { (to, from) } else { (from, to) };
                        inner.set(
                            iterator,
                            VariableState::Constant(Value::Range {
                                low: Box::new(low),
                                high: Box::new(high),
                            }),
                        );
                    }
                    _ => inner.invalidate(iterator),
                }
                let pass = self.block(body.statements(), &mut inner, false)?;
                Ok(CostExpression::sum(vec![
                    header,
                    CostExpression::product(vec![
                        CostExpression::Bound(bound),
                        CostExpression::sum(vec![CostExpression::one(), pass]),
                    ]),
                ]))
            }
            SyntaxNode::WhileLoop { condition, body } => {
                let bound = BoundResolver::new(&self.tracker).resolve(stmt, scope, &mut self.warnings);
                if bound.is_zero() {
                    return Ok(CostExpression::zero());
                }
                let mut inner = loop_scope(scope, body);
                let condition = self.expression(condition, &inner);
                let pass = self.block(body.statements(), &mut inner, false)?;
                Ok(CostExpression::product(vec![
                    CostExpression::Bound(bound),
                    CostExpression::sum(vec![CostExpression::one(), condition, pass]),
                ]))
            }
            expr @ (SyntaxNode::Call { .. }
            | SyntaxNode::BinaryOp { .. }
            | SyntaxNode::Identifier(_)
            | SyntaxNode::Literal(_)) => Ok(CostExpression::sum(vec![
                CostExpression::one(),
                self.expression(expr, scope),
            ])),
        }
    }

    /// Cost of the calls made while evaluating an expression.
    fn expression(&mut self, node: &SyntaxNode, scope: &Scope) -> CostExpression {
        match node {
            SyntaxNode::Call { callee, args } => {
                let mut costs: Vec<CostExpression> =
                    args.iter().map(|arg| self.expression(arg, scope)).collect();
                costs.push(self.call(callee, args, scope));
                CostExpression::sum(costs)
            }
            SyntaxNode::BinaryOp { left, right, .. } => CostExpression::sum(vec![
                self.expression(left, scope),
                self.expression(right, scope),
            ]),
            SyntaxNode::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.expression(condition, scope);
                let then_cost = self.expression(then_branch, scope);
                let else_cost = match else_branch {
                    Some(else_branch) => self.expression(else_branch, scope),
                    None => CostExpression::zero(),
                };
                CostExpression::sum(vec![condition, CostExpression::max(vec![then_cost, else_cost])])
            }
            _ => CostExpression::zero(),
        }
    }

    fn call(&mut self, callee: &str, args: &[SyntaxNode], scope: &Scope) -> CostExpression {
        if callee == self.function.name {
            return CostExpression::RecursiveCall {
                function: callee.to_string(),
                shrink: self.shrink_of(callee, args, scope),
            };
        }
        if let Some(class) = self.builder.known.get(callee) {
            if class.is_unknown() {
                self.warnings
                    .push(format!("`{callee}` has unknown complexity"));
            }
            return CostExpression::Class(*class);
        }
        if let Some(class) = self.builder.config.builtin_cost(callee) {
            return CostExpression::Class(class);
        }
        if self.builder.graph.callees(&self.function.name).any(|f| f == callee) {
            self.warnings
                .push(format!("`{callee}` has no known complexity"));
            return CostExpression::Class(ComplexityClass::Unknown);
        }
        let assumed = self.builder.config.unresolved_call;
        self.warnings
            .push(format!("call to unknown function `{callee}` assumed {assumed}"));
        CostExpression::Class(assumed)
    }

    /// How the arguments of a recursive call shrink the input. Only one
    /// argument has to reach the base case, so the slowest recognised
    /// shrink bounds the recursion depth.
    fn shrink_of(&mut self, callee: &str, args: &[SyntaxNode], scope: &Scope) -> Shrink {
        let shrinks: Vec<Shrink> = args
            .iter()
            .filter_map(|arg| self.arg_shrink(arg, scope, 0))
            .collect();
        let decrement = shrinks
            .iter()
            .filter_map(|s| match s {
                Shrink::Decrement(c) => Some(*c),
                _ => None,
            })
            .min();
        let divide = shrinks
            .iter()
            .filter_map(|s| match s {
                Shrink::Divide(b) => Some(*b),
                _ => None,
            })
            .min();
        let shrink = match (decrement, divide) {
            (Some(c), _) => Shrink::Decrement(c),
            (None, Some(b)) => Shrink::Divide(b),
            (None, None) => Shrink::Unrecognised,
        };
        if shrinks.iter().any(|s| *s != shrink) {
            let assumed = match shrink {
                Shrink::Decrement(c) => format!("n-{c}"),
                Shrink::Divide(b) => format!("n/{b}"),
                Shrink::Unrecognised => "n".to_string(),
            };
            self.warnings.push(format!(
                "arguments of recursive call to `{callee}` shrink at different rates; assumed {assumed}"
            ));
        }
        shrink
    }

    fn arg_shrink(&self, arg: &SyntaxNode, scope: &Scope, depth: usize) -> Option<Shrink> {
        if depth > 4 {
            return None;
        }
        let positive = |node: &SyntaxNode| match self.tracker.literal(scope, node) {
            Some(c) if c > 0 => u64::try_from(c).ok(),
            _ => None,
        };
        match arg {
            SyntaxNode::Identifier(name) => scope
                .assigned_value(name)
                .and_then(|value| self.arg_shrink(value, scope, depth + 1)),
            SyntaxNode::BinaryOp { op, left, right } => match op {
                BinOp::Div | BinOp::FloorDiv => match positive(right) {
                    Some(b) if b >= 2 => Some(Shrink::Divide(b)),
                    _ => None,
                },
                BinOp::Shr => positive(right)
                    .and_then(|k| u32::try_from(k).ok())
                    .and_then(|k| 2u64.checked_pow(k))
                    .map(Shrink::Divide),
                BinOp::Sub => match self.arg_shrink(left, scope, depth + 1) {
                    Some(divide @ Shrink::Divide(_)) => Some(divide),
                    _ => positive(right).map(Shrink::Decrement),
                },
                BinOp::Add => {
                    // `mid + 1`, `lo + (hi - lo) // 2`, or two slices that
                    // together leave one element out.
                    if is_slice(left) && is_slice(right) {
                        return Some(Shrink::Decrement(1));
                    }
                    [left, right]
                        .into_iter()
                        .filter_map(|side| self.arg_shrink(side, scope, depth + 1))
                        .find(|s| matches!(s, Shrink::Divide(_)))
                }
                _ => None,
            },
            SyntaxNode::Call { callee, args } if callee == "slice" && args.len() == 3 => {
                let lower = self.arg_shrink(&args[1], scope, depth + 1);
                let upper = self.arg_shrink(&args[2], scope, depth + 1);
                if let Some(divide @ Shrink::Divide(_)) = lower.or(upper) {
                    return Some(divide);
                }
                if let Some(divide @ Shrink::Divide(_)) = upper {
                    return Some(divide);
                }
                let upper_is_len =
                    matches!(&args[2], SyntaxNode::Call { callee, .. } if callee == "len");
                match (positive(&args[1]), self.tracker.literal(scope, &args[2])) {
                    (Some(c), _) if upper_is_len => Some(Shrink::Decrement(c)),
                    (_, Some(c)) if c < 0 => {
                        u64::try_from(c.unsigned_abs()).ok().map(Shrink::Decrement)
                    }
                    _ => upper,
                }
            }
            _ => None,
        }
    }
}

fn is_slice(node: &SyntaxNode) -> bool {
    matches!(node, SyntaxNode::Call { callee, .. } if callee == "slice")
}

/// Scope seen by a loop body: names the body reassigns vary between
/// iterations, so they start out unknown.
fn loop_scope(scope: &Scope, body: &SyntaxNode) -> Scope {
    let mut inner = scope.clone();
    for name in body.assigned_names() {
        inner.invalidate(name);
    }
    inner
}

/// Recursive terms of an expression, each scaled by the iteration counts of
/// the loops around it.
fn collect_terms(expr: &CostExpression, multiplicity: Multiplicity, out: &mut Vec<RecursiveTerm>) {
    match expr {
        CostExpression::RecursiveCall { shrink, .. } => out.push(RecursiveTerm {
            multiplicity,
            shrink: *shrink,
        }),
        CostExpression::Sum(children) => {
            for child in children {
                collect_terms(child, multiplicity, out);
            }
        }
        CostExpression::Max(children) => {
            let worst = children
                .iter()
                .map(|child| {
                    let mut terms = Vec::new();
                    collect_terms(child, multiplicity, &mut terms);
                    terms
                })
                .max_by_key(|terms| {
                    terms
                        .iter()
                        .fold(0u64, |acc, t| acc.saturating_add(t.multiplicity.weight()))
                });
            if let Some(terms) = worst {
                out.extend(terms);
            }
        }
        CostExpression::Product(factors) => {
            if factors.iter().any(CostExpression::is_zero) {
                return;
            }
            let scale = factors
                .iter()
                .filter(|f| !f.contains_recursion())
                .fold(Multiplicity::Times(1), |acc, f| acc.scaled(factor_multiplicity(f)));
            for factor in factors.iter().filter(|f| f.contains_recursion()) {
                collect_terms(factor, multiplicity.scaled(scale), out);
            }
        }
        _ => {}
    }
}

fn factor_multiplicity(factor: &CostExpression) -> Multiplicity {
    match factor {
        CostExpression::Constant(k) | CostExpression::Bound(SymbolicBound::Constant(k)) => {
            Multiplicity::Times(k.to_u64().unwrap_or(u64::MAX))
        }
        CostExpression::Bound(SymbolicBound::Size(_) | SymbolicBound::Divided(..)) => {
            Multiplicity::PerSize
        }
        CostExpression::Class(ComplexityClass::O1) => Multiplicity::Times(1),
        _ => Multiplicity::Unbounded,
    }
}
