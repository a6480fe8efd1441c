//! Variable State Tracking
//!
//! Follows how identifiers change across the statements of one lexical
//! scope, using a deliberately small lattice:
//!
//! - `Constant`: a known literal, or a loop-invariant input size
//! - `LinearStep(d)`: each pass adds `d`
//! - `MultiplicativeStep(f)`: each pass multiplies or divides by `f`
//! - `Unknown`: anything else (the top element)
//!
//! Loop bodies are tracked *relatively*: the scope starts empty and every
//! state describes the change over one iteration. Function bodies are
//! tracked *absolutely*: states describe current values.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::nodes::{BinOp, SyntaxNode};

/// Value of a variable held constant within a scope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Literal(i128),
    /// An input size such as a parameter `n` or `len(arr)`, shifted by
    /// `offset`. `exact` is false once the symbol has been scaled, after
    /// which offsets no longer cancel against the bare symbol.
    Size {
        symbol: String,
        offset: i128,
        exact: bool,
    },
    /// A loop iterator: some value between `low` and `high`.
    Range { low: Box<Value>, high: Box<Value> },
}

impl Value {
    pub fn size(symbol: &str) -> Value {
        Value::Size {
            symbol: symbol.to_string(),
            offset: 0,
            exact: true,
        }
    }

    pub fn lowest(&self) -> &Value {
        match self {
            Value::Range { low, .. } => low.lowest(),
            other => other,
        }
    }

    pub fn highest(&self) -> &Value {
        match self {
            Value::Range { high, .. } => high.highest(),
            other => other,
        }
    }

    pub(crate) fn shifted(&self, delta: i128) -> Option<Value> {
        match self {
            Value::Literal(v) => v.checked_add(delta).map(Value::Literal),
            Value::Size {
                symbol,
                offset,
                exact,
            } => Some(Value::Size {
                symbol: symbol.clone(),
                offset: offset.saturating_add(delta),
                exact: *exact,
            }),
            Value::Range { low, high } => Some(Value::Range {
                low: Box::new(low.shifted(delta)?),
                high: Box::new(high.shifted(delta)?),
            }),
        }
    }

    fn scaled(&self, factor: Factor) -> Option<Value> {
        match self {
            Value::Literal(v) => match factor {
                Factor::Multiply(f) => v.checked_mul(f).map(Value::Literal),
                Factor::Divide(f) => Some(Value::Literal(v.div_euclid(f))),
            },
            Value::Size { symbol, .. } => Some(Value::Size {
                symbol: symbol.clone(),
                offset: 0,
                exact: false,
            }),
            Value::Range { low, high } => Some(Value::Range {
                low: Box::new(low.scaled(factor)?),
                high: Box::new(high.scaled(factor)?),
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Literal(v) => write!(f, "{v}"),
            Value::Size { symbol, offset, .. } if *offset == 0 => write!(f, "{symbol}"),
            Value::Size { symbol, offset, .. } if *offset > 0 => write!(f, "{symbol}+{offset}"),
            Value::Size { symbol, offset, .. } => write!(f, "{symbol}{offset}"),
            Value::Range { low, high } => write!(f, "[{low}, {high}]"),
        }
    }
}

/// Multiplicative step; the wrapped constant is always greater than one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Factor {
    Multiply(i128),
    Divide(i128),
}

impl Factor {
    fn then(self, other: Factor) -> Option<Factor> {
        match (self, other) {
            (Factor::Multiply(a), Factor::Multiply(b)) => a.checked_mul(b).map(Factor::Multiply),
            (Factor::Divide(a), Factor::Divide(b)) => a.checked_mul(b).map(Factor::Divide),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VariableState {
    Constant(Value),
    LinearStep(i128),
    MultiplicativeStep(Factor),
    Unknown,
}

/// Identifier states of one scope, plus the last expression assigned to
/// each identifier while it was still straight-line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Scope {
    states: BTreeMap<String, VariableState>,
    values: BTreeMap<String, SyntaxNode>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&VariableState> {
        self.states.get(name)
    }

    pub fn set(&mut self, name: &str, state: VariableState) {
        self.states.insert(name.to_string(), state);
    }

    /// Forget everything known about `name`.
    pub fn invalidate(&mut self, name: &str) {
        self.states
            .insert(name.to_string(), VariableState::Unknown);
        self.values.remove(name);
    }

    /// Expression most recently assigned to `name`, if still valid.
    pub fn assigned_value(&self, name: &str) -> Option<&SyntaxNode> {
        self.values.get(name)
    }

    /// Merge two branch results: identifiers on which they disagree become
    /// `Unknown`. An identifier absent from one side counts as unchanged,
    /// which only equals the other side when that side left it absent too.
    fn join(then_scope: Scope, else_scope: Scope) -> Scope {
        let names: BTreeSet<String> = then_scope
            .states
            .keys()
            .chain(else_scope.states.keys())
            .cloned()
            .collect();
        let mut joined = Scope::new();
        for name in names {
            let state = match (then_scope.states.get(&name), else_scope.states.get(&name)) {
                (Some(a), Some(b)) if a == b => a.clone(),
                _ => VariableState::Unknown,
            };
            joined.states.insert(name, state);
        }
        for (name, value) in then_scope.values {
            if else_scope.values.get(&name) == Some(&value) {
                joined.values.insert(name, value);
            }
        }
        joined
    }
}

/// Applies the assignment rules to statement lists.
pub struct VariableTracker<'a> {
    params: &'a BTreeSet<String>,
}

impl<'a> VariableTracker<'a> {
    pub fn new(params: &'a BTreeSet<String>) -> Self {
        Self { params }
    }

    /// Track `statements` starting from the absolute scope `entry`.
    pub fn track(&self, entry: &Scope, statements: &[SyntaxNode]) -> Scope {
        let mut scope = entry.clone();
        for stmt in statements {
            self.apply(&mut scope, stmt, false);
        }
        scope
    }

    /// Advance an absolute scope past one statement.
    pub fn apply_statement(&self, scope: &mut Scope, stmt: &SyntaxNode) {
        self.apply(scope, stmt, false);
    }

    /// Per-iteration states of a loop body, tracked from an empty scope.
    pub fn track_loop_body(&self, body: &SyntaxNode) -> Scope {
        let mut scope = Scope::new();
        for stmt in body.statements() {
            self.apply(&mut scope, stmt, true);
        }
        scope
    }

    fn apply(&self, scope: &mut Scope, stmt: &SyntaxNode, relative: bool) {
        match stmt {
            SyntaxNode::Assignment { target, value } => {
                let state = self.assignment_state(scope, target, value, relative);
                scope.states.insert(target.clone(), state);
                if value.identifiers().contains(&target.as_str()) {
                    scope.values.remove(target);
                } else {
                    scope.values.insert(target.clone(), (**value).clone());
                }
                // Anything derived from the old value is stale now.
                scope.values.retain(|_, v| !v.identifiers().contains(&target.as_str()));
            }
            SyntaxNode::Sequence(stmts) => {
                for stmt in stmts {
                    self.apply(scope, stmt, relative);
                }
            }
            SyntaxNode::Conditional {
                then_branch,
                else_branch,
                ..
            } => {
                let mut then_scope = scope.clone();
                self.apply(&mut then_scope, then_branch, relative);
                let mut else_scope = scope.clone();
                if let Some(else_branch) = else_branch {
                    self.apply(&mut else_scope, else_branch, relative);
                }
                *scope = Scope::join(then_scope, else_scope);
            }
            SyntaxNode::ForLoop { .. } | SyntaxNode::WhileLoop { .. } => {
                for name in stmt.assigned_names() {
                    scope.invalidate(name);
                }
            }
            _ => {}
        }
    }

    fn assignment_state(
        &self,
        scope: &Scope,
        target: &str,
        value: &SyntaxNode,
        relative: bool,
    ) -> VariableState {
        let current = match scope.states.get(target) {
            Some(state) => Some(state.clone()),
            None if relative => None,
            None if self.params.contains(target) => {
                Some(VariableState::Constant(Value::size(target)))
            }
            None => Some(VariableState::Unknown),
        };

        if let Some(delta) = self.linear_delta(scope, target, value) {
            return match current {
                None => VariableState::LinearStep(delta),
                Some(VariableState::LinearStep(d)) => d
                    .checked_add(delta)
                    .map(VariableState::LinearStep)
                    .unwrap_or(VariableState::Unknown),
                Some(VariableState::Constant(v)) => v
                    .shifted(delta)
                    .map(VariableState::Constant)
                    .unwrap_or(VariableState::Unknown),
                Some(_) => VariableState::Unknown,
            };
        }

        if let Some(factor) = self.factor(scope, target, value) {
            return match (current, factor) {
                (Some(state), None) => state,
                (None, None) => VariableState::LinearStep(0),
                (None, Some(f)) => VariableState::MultiplicativeStep(f),
                (Some(VariableState::MultiplicativeStep(a)), Some(b)) => a
                    .then(b)
                    .map(VariableState::MultiplicativeStep)
                    .unwrap_or(VariableState::Unknown),
                (Some(VariableState::Constant(v)), Some(f)) => v
                    .scaled(f)
                    .map(VariableState::Constant)
                    .unwrap_or(VariableState::Unknown),
                (Some(_), Some(_)) => VariableState::Unknown,
            };
        }

        if value.identifiers().contains(&target) {
            return VariableState::Unknown;
        }
        match self.value_of(scope, value) {
            Some(v) => VariableState::Constant(v),
            None => VariableState::Unknown,
        }
    }

    /// `x + c`, `c + x` or `x - c`, with `c` a known integer.
    fn linear_delta(&self, scope: &Scope, target: &str, value: &SyntaxNode) -> Option<i128> {
        let SyntaxNode::BinaryOp { op, left, right } = value else {
            return None;
        };
        let is_target = |node: &SyntaxNode| matches!(node, SyntaxNode::Identifier(n) if n == target);
        match op {
            BinOp::Add if is_target(left) => self.literal(scope, right),
            BinOp::Add if is_target(right) => self.literal(scope, left),
            BinOp::Sub if is_target(left) => self.literal(scope, right).and_then(i128::checked_neg),
            _ => None,
        }
    }

    /// `x * c`, `c * x`, `x / c`, `x // c` or `x >> k`. The inner `None`
    /// marks a factor of one, which leaves `x` unchanged.
    #[allow(clippy::option_option)]
    fn factor(&self, scope: &Scope, target: &str, value: &SyntaxNode) -> Option<Option<Factor>> {
        let SyntaxNode::BinaryOp { op, left, right } = value else {
            return None;
        };
        let is_target = |node: &SyntaxNode| matches!(node, SyntaxNode::Identifier(n) if n == target);
        let (c, multiply) = match op {
            BinOp::Mul if is_target(left) => (self.literal(scope, right)?, true),
            BinOp::Mul if is_target(right) => (self.literal(scope, left)?, true),
            BinOp::Div | BinOp::FloorDiv if is_target(left) => (self.literal(scope, right)?, false),
            BinOp::Shr if is_target(left) => (shift_factor(self.literal(scope, right)?)?, false),
            BinOp::Shl if is_target(left) => (shift_factor(self.literal(scope, right)?)?, true),
            _ => return None,
        };
        match c {
            1 => Some(None),
            c if c > 1 && multiply => Some(Some(Factor::Multiply(c))),
            c if c > 1 => Some(Some(Factor::Divide(c))),
            _ => None,
        }
    }

    /// Integer value of `node`, when it is known in `scope`.
    pub fn literal(&self, scope: &Scope, node: &SyntaxNode) -> Option<i128> {
        match self.value_of(scope, node)? {
            Value::Literal(v) => Some(v),
            _ => None,
        }
    }

    /// Loop-invariant value of an expression, if it has one.
    pub fn value_of(&self, scope: &Scope, node: &SyntaxNode) -> Option<Value> {
        match node {
            SyntaxNode::Literal(v) => Some(Value::Literal(*v)),
            SyntaxNode::Identifier(name) => match scope.states.get(name) {
                Some(VariableState::Constant(v)) => Some(v.clone()),
                Some(_) => None,
                None if self.params.contains(name) => Some(Value::size(name)),
                None => None,
            },
            SyntaxNode::Call { callee, args } if callee == "len" && args.len() == 1 => {
                match &args[0] {
                    SyntaxNode::Identifier(name)
                        if !matches!(
                            scope.states.get(name),
                            Some(VariableState::Unknown)
                                | Some(VariableState::LinearStep(_))
                                | Some(VariableState::MultiplicativeStep(_))
                        ) =>
                    {
                        Some(Value::size(&format!("len({name})")))
                    }
                    SyntaxNode::Identifier(_) => None,
                    other => Some(Value::size(&format!("len({other})"))),
                }
            }
            SyntaxNode::BinaryOp { op, left, right } => {
                let l = self.value_of(scope, left)?;
                let r = self.value_of(scope, right)?;
                combine(*op, l, r)
            }
            _ => None,
        }
    }
}

fn shift_factor(bits: i128) -> Option<i128> {
    u32::try_from(bits).ok().and_then(|b| 2i128.checked_pow(b))
}

fn combine(op: BinOp, l: Value, r: Value) -> Option<Value> {
    match (op, l, r) {
        (BinOp::Add, Value::Literal(a), Value::Literal(b)) => a.checked_add(b).map(Value::Literal),
        (BinOp::Sub, Value::Literal(a), Value::Literal(b)) => a.checked_sub(b).map(Value::Literal),
        (BinOp::Mul, Value::Literal(a), Value::Literal(b)) => a.checked_mul(b).map(Value::Literal),
        (BinOp::Div | BinOp::FloorDiv, Value::Literal(a), Value::Literal(b)) if b != 0 => {
            Some(Value::Literal(a.div_euclid(b)))
        }
        (BinOp::Add, v, Value::Literal(c)) | (BinOp::Add, Value::Literal(c), v) => v.shifted(c),
        (BinOp::Sub, v, Value::Literal(c)) => v.shifted(c.checked_neg()?),
        (BinOp::Mul, v, Value::Literal(c)) | (BinOp::Mul, Value::Literal(c), v) if c > 1 => {
            v.scaled(Factor::Multiply(c))
        }
        (BinOp::Div | BinOp::FloorDiv, v, Value::Literal(c)) if c > 1 => {
            v.scaled(Factor::Divide(c))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn add(name: &str, c: i128) -> SyntaxNode {
        SyntaxNode::assign(
            name,
            SyntaxNode::binary(BinOp::Add, SyntaxNode::ident(name), SyntaxNode::lit(c)),
        )
    }

    #[test]
    fn test_literal_assignment_is_constant() {
        let p = params(&[]);
        let tracker = VariableTracker::new(&p);
        let scope = tracker.track(&Scope::new(), &[SyntaxNode::assign("x", SyntaxNode::lit(3))]);
        assert_eq!(
            scope.get("x"),
            Some(&VariableState::Constant(Value::Literal(3)))
        );
    }

    #[test]
    fn test_constant_folds_increments() {
        let p = params(&[]);
        let tracker = VariableTracker::new(&p);
        let scope = tracker.track(
            &Scope::new(),
            &[SyntaxNode::assign("x", SyntaxNode::lit(3)), add("x", 2)],
        );
        assert_eq!(
            scope.get("x"),
            Some(&VariableState::Constant(Value::Literal(5)))
        );
    }

    #[test]
    fn test_loop_body_linear_steps_accumulate() {
        let p = params(&[]);
        let tracker = VariableTracker::new(&p);
        let body = SyntaxNode::Sequence(vec![add("i", 1), add("i", 2)]);
        let scope = tracker.track_loop_body(&body);
        assert_eq!(scope.get("i"), Some(&VariableState::LinearStep(3)));
    }

    #[test]
    fn test_loop_body_decrement() {
        let p = params(&[]);
        let tracker = VariableTracker::new(&p);
        let body = SyntaxNode::assign(
            "i",
            SyntaxNode::binary(BinOp::Sub, SyntaxNode::ident("i"), SyntaxNode::lit(1)),
        );
        assert_eq!(
            tracker.track_loop_body(&body).get("i"),
            Some(&VariableState::LinearStep(-1))
        );
    }

    #[test]
    fn test_multiplicative_steps() {
        let p = params(&[]);
        let tracker = VariableTracker::new(&p);
        let doubling = SyntaxNode::assign(
            "i",
            SyntaxNode::binary(BinOp::Mul, SyntaxNode::ident("i"), SyntaxNode::lit(2)),
        );
        assert_eq!(
            tracker.track_loop_body(&doubling).get("i"),
            Some(&VariableState::MultiplicativeStep(Factor::Multiply(2)))
        );
        let halving = SyntaxNode::assign(
            "n",
            SyntaxNode::binary(BinOp::FloorDiv, SyntaxNode::ident("n"), SyntaxNode::lit(2)),
        );
        assert_eq!(
            tracker.track_loop_body(&halving).get("n"),
            Some(&VariableState::MultiplicativeStep(Factor::Divide(2)))
        );
    }

    #[test]
    fn test_mixed_steps_are_unknown() {
        let p = params(&[]);
        let tracker = VariableTracker::new(&p);
        let body = SyntaxNode::Sequence(vec![
            add("i", 1),
            SyntaxNode::assign(
                "i",
                SyntaxNode::binary(BinOp::Mul, SyntaxNode::ident("i"), SyntaxNode::lit(2)),
            ),
        ]);
        assert_eq!(
            tracker.track_loop_body(&body).get("i"),
            Some(&VariableState::Unknown)
        );
    }

    #[test]
    fn test_non_linear_assignment_is_unknown() {
        let p = params(&[]);
        let tracker = VariableTracker::new(&p);
        let body = SyntaxNode::assign(
            "i",
            SyntaxNode::binary(BinOp::Mul, SyntaxNode::ident("i"), SyntaxNode::ident("i")),
        );
        assert_eq!(
            tracker.track_loop_body(&body).get("i"),
            Some(&VariableState::Unknown)
        );
        let call = SyntaxNode::assign("i", SyntaxNode::call("next_index", vec![]));
        assert_eq!(
            tracker.track_loop_body(&call).get("i"),
            Some(&VariableState::Unknown)
        );
    }

    #[test]
    fn test_conditional_disagreement_is_unknown() {
        let p = params(&[]);
        let tracker = VariableTracker::new(&p);
        let body = SyntaxNode::conditional(
            SyntaxNode::ident("flag"),
            add("i", 1),
            Some(add("i", 2)),
        );
        assert_eq!(
            tracker.track_loop_body(&body).get("i"),
            Some(&VariableState::Unknown)
        );
    }

    #[test]
    fn test_conditional_agreement_is_kept() {
        let p = params(&[]);
        let tracker = VariableTracker::new(&p);
        let body = SyntaxNode::conditional(
            SyntaxNode::ident("flag"),
            add("i", 1),
            Some(add("i", 1)),
        );
        assert_eq!(
            tracker.track_loop_body(&body).get("i"),
            Some(&VariableState::LinearStep(1))
        );
    }

    #[test]
    fn test_one_sided_conditional_is_unknown() {
        let p = params(&[]);
        let tracker = VariableTracker::new(&p);
        let body = SyntaxNode::conditional(SyntaxNode::ident("flag"), add("i", 1), None);
        assert_eq!(
            tracker.track_loop_body(&body).get("i"),
            Some(&VariableState::Unknown)
        );
    }

    #[test]
    fn test_params_and_len_are_size_symbols() {
        let p = params(&["n", "arr"]);
        let tracker = VariableTracker::new(&p);
        let scope = tracker.track(
            &Scope::new(),
            &[
                SyntaxNode::assign("hi", SyntaxNode::ident("n")),
                SyntaxNode::assign(
                    "m",
                    SyntaxNode::call("len", vec![SyntaxNode::ident("arr")]),
                ),
            ],
        );
        assert_eq!(scope.get("hi"), Some(&VariableState::Constant(Value::size("n"))));
        assert_eq!(
            scope.get("m"),
            Some(&VariableState::Constant(Value::size("len(arr)")))
        );
    }

    #[test]
    fn test_nested_loop_invalidates_assigned_names() {
        let p = params(&["n"]);
        let tracker = VariableTracker::new(&p);
        let inner = SyntaxNode::for_range(
            "j",
            SyntaxNode::lit(0),
            SyntaxNode::ident("n"),
            SyntaxNode::lit(1),
            add("total", 1),
        );
        let scope = tracker.track(
            &Scope::new(),
            &[SyntaxNode::assign("total", SyntaxNode::lit(0)), inner],
        );
        assert_eq!(scope.get("total"), Some(&VariableState::Unknown));
        assert_eq!(scope.get("j"), Some(&VariableState::Unknown));
    }

    #[test]
    fn test_overflowing_steps_are_unknown() {
        let p = params(&[]);
        let tracker = VariableTracker::new(&p);
        let big = i128::MAX / 2 + 1;
        let body = SyntaxNode::Sequence(vec![add("i", big), add("i", big)]);
        let scope = tracker.track_loop_body(&body);
        assert_eq!(scope.get("i"), Some(&VariableState::Unknown));
    }

    #[test]
    fn test_assigned_values_are_remembered() {
        let p = params(&["lo", "hi"]);
        let tracker = VariableTracker::new(&p);
        let midpoint = SyntaxNode::binary(
            BinOp::FloorDiv,
            SyntaxNode::binary(BinOp::Add, SyntaxNode::ident("lo"), SyntaxNode::ident("hi")),
            SyntaxNode::lit(2),
        );
        let scope = tracker.track(&Scope::new(), &[SyntaxNode::assign("mid", midpoint.clone())]);
        assert_eq!(scope.assigned_value("mid"), Some(&midpoint));
    }
}
