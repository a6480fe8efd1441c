//! Bound Resolution
//!
//! Turns a loop header plus the tracked state of its variables into a
//! symbolic iteration count.
//!
//! ## Rules
//!
//! - **Linear loops**: `ceil((stop - start) / step)`, with start and stop
//!   affine in at most one size symbol. Offsets of the same symbol cancel;
//!   two distinct symbols are bounded by the upper one.
//! - **Multiplicative loops**: `log_f(stop)` when multiplying by `f`,
//!   `log_f(start)` when dividing down to a constant.
//! - **While loops**: the compared variable is treated like a for-loop
//!   iterator, with its initial value taken from the enclosing scope and its
//!   step from the tracked body. Bisection on `lo`/`hi` yields `log_2` of the
//!   range; `i * i < n` yields `sqrt(n)`.
//!
//! Anything else resolves to [`SymbolicBound::Unknown`] and records a
//! warning, never an error.
//!
//! ## Example
//!
//! ```
//! use std::collections::BTreeSet;
//! use asymptote_engine::bound_resolution::{BoundResolver, SymbolicBound};
//! use asymptote_engine::nodes::SyntaxNode;
//! use asymptote_engine::tracker::{Scope, VariableTracker};
//!
//! let params: BTreeSet<String> = ["n".to_string()].into();
//! let tracker = VariableTracker::new(&params);
//! let resolver = BoundResolver::new(&tracker);
//!
//! let lp = SyntaxNode::for_range(
//!     "i",
//!     SyntaxNode::lit(0),
//!     SyntaxNode::ident("n"),
//!     SyntaxNode::lit(1),
//!     SyntaxNode::Pass,
//! );
//! let mut warnings = Vec::new();
//! let bound = resolver.resolve(&lp, &Scope::new(), &mut warnings);
//! assert_eq!(bound, SymbolicBound::Size("n".to_string()));
//! ```

use std::fmt;

use num_bigint::BigUint;
use num_traits::Zero;
use tracing::debug;

use crate::growth::Growth;
use crate::nodes::{BinOp, SyntaxNode};
use crate::tracker::{Factor, Scope, Value, VariableState, VariableTracker};

/// Symbolic number of loop iterations.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum SymbolicBound {
    Constant(BigUint),
    Size(String),
    Divided(Box<SymbolicBound>, u128),
    Log { base: u128, of: Box<SymbolicBound> },
    Sqrt(Box<SymbolicBound>),
    Unknown,
}

impl SymbolicBound {
    pub fn constant(value: u128) -> SymbolicBound {
        SymbolicBound::Constant(BigUint::from(value))
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, SymbolicBound::Constant(c) if c.is_zero())
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, SymbolicBound::Unknown)
    }

    /// Order of growth of the iteration count.
    pub fn growth(&self) -> Growth {
        match self {
            SymbolicBound::Constant(_) => Growth::CONSTANT,
            SymbolicBound::Size(_) => Growth::LINEAR,
            SymbolicBound::Divided(inner, _) => inner.growth(),
            SymbolicBound::Log { of, .. } => of.growth().logarithm(),
            SymbolicBound::Sqrt(inner) => inner.growth().square_root(),
            SymbolicBound::Unknown => Growth::Unknown,
        }
    }

    fn divided(self, step: i128) -> SymbolicBound {
        match u128::try_from(step) {
            Ok(1) | Err(_) => self,
            Ok(k) => SymbolicBound::Divided(Box::new(self), k),
        }
    }
}

impl fmt::Display for SymbolicBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolicBound::Constant(c) => write!(f, "{c}"),
            SymbolicBound::Size(symbol) => write!(f, "{symbol}"),
            SymbolicBound::Divided(inner, k) => write!(f, "{inner}/{k}"),
            SymbolicBound::Log { base, of } => write!(f, "log_{base}({of})"),
            SymbolicBound::Sqrt(inner) => write!(f, "sqrt({inner})"),
            SymbolicBound::Unknown => write!(f, "?"),
        }
    }
}

/// Resolves loop headers against a tracked scope.
pub struct BoundResolver<'a> {
    tracker: &'a VariableTracker<'a>,
}

impl<'a> BoundResolver<'a> {
    pub fn new(tracker: &'a VariableTracker<'a>) -> Self {
        Self { tracker }
    }

    /// Iteration count of `node`, a `ForLoop` or `WhileLoop`, entered with
    /// the absolute scope `scope`. Fallbacks push a warning.
    pub fn resolve(
        &self,
        node: &SyntaxNode,
        scope: &Scope,
        warnings: &mut Vec<String>,
    ) -> SymbolicBound {
        let bound = match node {
            SyntaxNode::ForLoop {
                iterator,
                start,
                stop,
                step,
                body,
            } => self.resolve_for(iterator, start, stop, step, body, scope, warnings),
            SyntaxNode::WhileLoop { condition, body } => {
                let body_states = self.tracker.track_loop_body(body);
                match self.resolve_while(condition, body, &body_states, scope) {
                    Ok(bound) => bound,
                    Err(reason) => {
                        warnings.push(format!(
                            "cannot bound `while {condition}`: {reason}"
                        ));
                        SymbolicBound::Unknown
                    }
                }
            }
            other => {
                warnings.push(format!("`{other}` is not a loop"));
                SymbolicBound::Unknown
            }
        };
        debug!(loop_node = %node, %bound, "resolved loop bound");
        bound
    }

    #[allow(clippy::too_many_arguments)]
    fn resolve_for(
        &self,
        iterator: &str,
        start: &SyntaxNode,
        stop: &SyntaxNode,
        step: &SyntaxNode,
        body: &SyntaxNode,
        scope: &Scope,
        warnings: &mut Vec<String>,
    ) -> SymbolicBound {
        let body_states = self.tracker.track_loop_body(body);
        if body_states.get(iterator).is_some() {
            warnings.push(format!("loop variable `{iterator}` mutated inside loop body"));
            return SymbolicBound::Unknown;
        }

        let step_state = if step.identifiers().contains(&iterator) {
            self.tracker
                .track_loop_body(&SyntaxNode::assign(iterator, step.clone()))
                .get(iterator)
                .cloned()
                .unwrap_or(VariableState::Unknown)
        } else {
            match self.tracker.literal(scope, step) {
                Some(d) => VariableState::LinearStep(d),
                None => VariableState::Unknown,
            }
        };

        let (Some(from), Some(to)) = (
            self.tracker.value_of(scope, start),
            self.tracker.value_of(scope, stop),
        ) else {
            warnings.push(format!(
                "range of loop variable `{iterator}` depends on values that change"
            ));
            return SymbolicBound::Unknown;
        };

        let result = match step_state {
            VariableState::LinearStep(d) if d > 0 => Ok(count(from.lowest(), to.highest(), d)),
            VariableState::LinearStep(d) if d < 0 => d
                .checked_neg()
                .map(|step| count(to.lowest(), from.highest(), step))
                .ok_or_else(|| "step overflows".to_string()),
            VariableState::MultiplicativeStep(Factor::Multiply(f)) => {
                multiply_count(from.lowest(), to.highest(), f)
            }
            VariableState::MultiplicativeStep(Factor::Divide(f)) => {
                divide_count(from.highest(), to.lowest(), f)
            }
            VariableState::LinearStep(_) => Err("step is zero".to_string()),
            _ => Err(format!("step `{step}` is not a constant or a simple update")),
        };
        result.unwrap_or_else(|reason| {
            warnings.push(format!("cannot bound loop over `{iterator}`: {reason}"));
            SymbolicBound::Unknown
        })
    }

    fn resolve_while(
        &self,
        condition: &SyntaxNode,
        body: &SyntaxNode,
        body_states: &Scope,
        scope: &Scope,
    ) -> Result<SymbolicBound, String> {
        match condition {
            SyntaxNode::Literal(0) => Ok(SymbolicBound::constant(0)),
            SyntaxNode::Literal(_) => Err("condition is constant".to_string()),
            SyntaxNode::Identifier(name) => self.resolve_comparison(
                &SyntaxNode::ident(name),
                BinOp::Ne,
                &SyntaxNode::lit(0),
                body_states,
                scope,
            ),
            SyntaxNode::BinaryOp {
                op: BinOp::And,
                left,
                right,
            } => {
                // The loop stops as soon as either side fails.
                let sides = [left, right]
                    .into_iter()
                    .filter_map(|side| self.resolve_while(side, body, body_states, scope).ok())
                    .filter(|b| !b.is_unknown())
                    .min_by_key(|b| b.growth());
                sides.ok_or_else(|| "neither side of `and` converges".to_string())
            }
            SyntaxNode::BinaryOp {
                op: BinOp::Or,
                left,
                right,
            } => {
                let l = self.resolve_while(left, body, body_states, scope)?;
                let r = self.resolve_while(right, body, body_states, scope)?;
                Ok(if l.growth() >= r.growth() { l } else { r })
            }
            SyntaxNode::BinaryOp { op, left, right } if op.is_comparison() => {
                if let Some(bound) = self.bisection(*op, left, right, body, scope) {
                    return Ok(bound);
                }
                self.resolve_comparison(left, *op, right, body_states, scope)
            }
            _ => Err("condition is not a comparison".to_string()),
        }
    }

    fn resolve_comparison(
        &self,
        left: &SyntaxNode,
        op: BinOp,
        right: &SyntaxNode,
        body_states: &Scope,
        scope: &Scope,
    ) -> Result<SymbolicBound, String> {
        if let Some(bound) = self.square_root(left, op, right, body_states, scope) {
            return Ok(bound);
        }

        let moving = |node: &SyntaxNode| match node {
            SyntaxNode::Identifier(name) => body_states.get(name).map(|s| (name.clone(), s.clone())),
            _ => None,
        };
        let (name, state, op, other) = match (moving(left), moving(right)) {
            (Some((name, state)), None) => (name, state, op, right),
            (None, Some((name, state))) => (name, state, op.flipped(), left),
            (Some(_), Some(_)) => return Err("both sides change inside the loop".to_string()),
            (None, None) => {
                let changing: Vec<&str> = left
                    .identifiers()
                    .into_iter()
                    .chain(right.identifiers())
                    .filter(|id| body_states.get(id).is_some())
                    .collect();
                return Err(match changing.first() {
                    Some(id) => format!("`{id}` changes in a way that cannot be bounded"),
                    None => "condition does not change inside the loop".to_string(),
                });
            }
        };

        if other
            .identifiers()
            .iter()
            .any(|id| body_states.get(id).is_some())
        {
            return Err("both sides change inside the loop".to_string());
        }
        let init = self
            .tracker
            .value_of(scope, &SyntaxNode::ident(&name))
            .ok_or_else(|| format!("initial value of `{name}` is unknown"))?;
        let limit = self
            .tracker
            .value_of(scope, other)
            .ok_or_else(|| format!("`{other}` is not loop-invariant"))?;

        match (state, op) {
            (VariableState::LinearStep(d), BinOp::Lt | BinOp::Ne) if d > 0 => {
                Ok(count(init.lowest(), limit.highest(), d))
            }
            (VariableState::LinearStep(d), BinOp::Le) if d > 0 => {
                let limit = limit.highest().shifted(1).ok_or("overflow")?;
                Ok(count(init.lowest(), &limit, d))
            }
            (VariableState::LinearStep(d), BinOp::Gt | BinOp::Ne) if d < 0 => {
                let step = d.checked_neg().ok_or("step overflows")?;
                Ok(count(limit.lowest(), init.highest(), step))
            }
            (VariableState::LinearStep(d), BinOp::Ge) if d < 0 => {
                let limit = limit.lowest().shifted(-1).ok_or("overflow")?;
                let step = d.checked_neg().ok_or("step overflows")?;
                Ok(count(&limit, init.highest(), step))
            }
            (VariableState::MultiplicativeStep(Factor::Multiply(f)), BinOp::Lt | BinOp::Le) => {
                multiply_count(init.lowest(), limit.highest(), f)
            }
            (VariableState::MultiplicativeStep(Factor::Divide(f)), BinOp::Gt) => {
                divide_count(init.highest(), limit.lowest(), f)
            }
            (VariableState::MultiplicativeStep(Factor::Divide(f)), BinOp::Ge) => {
                let limit = limit.lowest().shifted(-1).ok_or("overflow")?;
                divide_count(init.highest(), &limit, f)
            }
            (VariableState::MultiplicativeStep(Factor::Divide(f)), BinOp::Ne)
                if limit == Value::Literal(0) =>
            {
                divide_count(init.highest(), &limit, f)
            }
            (VariableState::Unknown, _) => Err(format!(
                "`{name}` is updated non-linearly inside the loop"
            )),
            (VariableState::Constant(_), _) => {
                Err(format!("`{name}` is reset to a constant inside the loop"))
            }
            _ => Err(format!("`{name}` moves away from its limit")),
        }
    }

    /// `while i * i < n` (or `i ** 2 < n`) with `i` counting up.
    fn square_root(
        &self,
        left: &SyntaxNode,
        op: BinOp,
        right: &SyntaxNode,
        body_states: &Scope,
        scope: &Scope,
    ) -> Option<SymbolicBound> {
        if !matches!(op, BinOp::Lt | BinOp::Le) {
            return None;
        }
        let SyntaxNode::BinaryOp {
            op: square,
            left: a,
            right: b,
        } = left
        else {
            return None;
        };
        let name = match (square, &**a, &**b) {
            (BinOp::Mul, SyntaxNode::Identifier(x), SyntaxNode::Identifier(y)) if x == y => x,
            (BinOp::Pow, SyntaxNode::Identifier(x), SyntaxNode::Literal(2)) => x,
            _ => return None,
        };
        match body_states.get(name) {
            Some(VariableState::LinearStep(d)) if *d > 0 => {}
            _ => return None,
        }
        if right
            .identifiers()
            .iter()
            .any(|id| body_states.get(id).is_some())
        {
            return None;
        }
        let limit = self.tracker.value_of(scope, right)?;
        Some(SymbolicBound::Sqrt(Box::new(count(
            &Value::Literal(0),
            limit.highest(),
            1,
        ))))
    }

    /// `while lo <= hi` where the body moves `lo` or `hi` to a midpoint of
    /// the two.
    fn bisection(
        &self,
        op: BinOp,
        left: &SyntaxNode,
        right: &SyntaxNode,
        body: &SyntaxNode,
        scope: &Scope,
    ) -> Option<SymbolicBound> {
        let (SyntaxNode::Identifier(lo), SyntaxNode::Identifier(hi)) = (left, right) else {
            return None;
        };
        let (lo, hi) = match op {
            BinOp::Lt | BinOp::Le => (lo, hi),
            BinOp::Gt | BinOp::Ge => (hi, lo),
            _ => return None,
        };

        let mut midpoints: Vec<&str> = Vec::new();
        for stmt in body.statements() {
            if let SyntaxNode::Assignment { target, value } = stmt {
                if is_midpoint(value, lo, hi) {
                    midpoints.push(target);
                }
            }
        }
        let moves_to_midpoint = |name: &str| {
            assignments_to(body, name).iter().any(|value| {
                is_midpoint(value, lo, hi)
                    || value
                        .identifiers()
                        .iter()
                        .any(|id| midpoints.contains(id))
            })
        };
        if !moves_to_midpoint(lo) && !moves_to_midpoint(hi) {
            return None;
        }

        let from = self.tracker.value_of(scope, &SyntaxNode::ident(lo))?;
        let to = self.tracker.value_of(scope, &SyntaxNode::ident(hi))?;
        let range = count(from.lowest(), &to.highest().shifted(1)?, 1);
        Some(match range {
            SymbolicBound::Constant(c) if c.is_zero() => SymbolicBound::constant(0),
            other => SymbolicBound::Log {
                base: 2,
                of: Box::new(other),
            },
        })
    }
}

/// `(lo + hi) // 2`, `(lo + hi) >> 1` or `lo + (hi - lo) // 2`.
fn is_midpoint(value: &SyntaxNode, lo: &str, hi: &str) -> bool {
    let halved = |node: &SyntaxNode| -> Option<SyntaxNode> {
        match node {
            SyntaxNode::BinaryOp {
                op: BinOp::Div | BinOp::FloorDiv,
                left,
                right,
            } if **right == SyntaxNode::Literal(2) => Some((**left).clone()),
            SyntaxNode::BinaryOp {
                op: BinOp::Shr,
                left,
                right,
            } if **right == SyntaxNode::Literal(1) => Some((**left).clone()),
            _ => None,
        }
    };
    let mentions_both = |node: &SyntaxNode| {
        let ids = node.identifiers();
        ids.contains(&lo) && ids.contains(&hi)
    };
    if let Some(inner) = halved(value) {
        return mentions_both(&inner);
    }
    match value {
        SyntaxNode::BinaryOp {
            op: BinOp::Add,
            left,
            right,
        } => {
            let lhs_is_lo = matches!(&**left, SyntaxNode::Identifier(n) if n == lo);
            lhs_is_lo && halved(right).is_some_and(|inner| mentions_both(&inner))
        }
        _ => false,
    }
}

fn assignments_to<'n>(node: &'n SyntaxNode, name: &str) -> Vec<&'n SyntaxNode> {
    let mut out = Vec::new();
    collect_assignments(node, name, &mut out);
    out
}

fn collect_assignments<'n>(node: &'n SyntaxNode, name: &str, out: &mut Vec<&'n SyntaxNode>) {
    match node {
        SyntaxNode::Assignment { target, value } if target == name => out.push(value),
        SyntaxNode::Sequence(stmts) => {
            for stmt in stmts {
                collect_assignments(stmt, name, out);
            }
        }
        SyntaxNode::Conditional {
            then_branch,
            else_branch,
            ..
        } => {
            collect_assignments(then_branch, name, out);
            if let Some(else_branch) = else_branch {
                collect_assignments(else_branch, name, out);
            }
        }
        _ => {}
    }
}

/// `ceil((hi - lo) / step)` for `step > 0`.
fn count(lo: &Value, hi: &Value, step: i128) -> SymbolicBound {
    match (lo, hi) {
        (Value::Literal(a), Value::Literal(b)) => literal_count(b.saturating_sub(*a), step),
        (
            Value::Size {
                symbol: s1,
                offset: o1,
                exact: true,
            },
            Value::Size {
                symbol: s2,
                offset: o2,
                exact: true,
            },
        ) if s1 == s2 => literal_count(o2.saturating_sub(*o1), step),
        // Sizes are never negative, so a constant upper end bounds the count.
        (Value::Size { offset, .. }, Value::Literal(b)) => {
            literal_count(b.saturating_sub(*offset), step)
        }
        (_, Value::Size { symbol, .. }) => SymbolicBound::Size(symbol.clone()).divided(step),
        _ => SymbolicBound::Unknown,
    }
}

fn literal_count(diff: i128, step: i128) -> SymbolicBound {
    if diff <= 0 {
        return SymbolicBound::constant(0);
    }
    let n = diff.saturating_add(step - 1) / step;
    SymbolicBound::constant(n.unsigned_abs())
}

/// Iterations of `i = lo; while i < hi: i *= f`.
fn multiply_count(lo: &Value, hi: &Value, f: i128) -> Result<SymbolicBound, String> {
    match lo {
        Value::Literal(a) if *a < 1 => {
            return Err(format!("multiplying {a} by {f} never grows"));
        }
        Value::Literal(_) | Value::Size { .. } => {}
        Value::Range { .. } => return Err("start is not loop-invariant".to_string()),
    }
    Ok(match (lo, hi) {
        (Value::Literal(a), Value::Literal(b)) => {
            let mut i = *a;
            let mut n: u128 = 0;
            while i < *b {
                n += 1;
                match i.checked_mul(f) {
                    Some(next) => i = next,
                    None => break,
                }
            }
            SymbolicBound::constant(n)
        }
        (_, Value::Size { symbol, .. }) => SymbolicBound::Log {
            base: f.unsigned_abs(),
            of: Box::new(SymbolicBound::Size(symbol.clone())),
        },
        // Starting from a size, a constant limit is passed after at most
        // log_f(limit) steps.
        (_, Value::Literal(b)) => multiply_count(&Value::Literal(1), &Value::Literal(*b), f)?,
        _ => SymbolicBound::Unknown,
    })
}

/// Iterations of `i = hi; while i > lo: i //= f`.
fn divide_count(hi: &Value, lo: &Value, f: i128) -> Result<SymbolicBound, String> {
    if let Value::Literal(t) = lo {
        if *t < 0 {
            return Err(format!("dividing by {f} never drops below {t}"));
        }
    }
    Ok(match (hi, lo) {
        (Value::Literal(a), Value::Literal(b)) => {
            let mut i = *a;
            let mut n: u128 = 0;
            while i > *b {
                n += 1;
                i = i.div_euclid(f);
            }
            SymbolicBound::constant(n)
        }
        (Value::Size { symbol, .. }, _) => SymbolicBound::Log {
            base: f.unsigned_abs(),
            of: Box::new(SymbolicBound::Size(symbol.clone())),
        },
        (Value::Literal(a), _) => divide_count(&Value::Literal(*a), &Value::Literal(0), f)?,
        _ => SymbolicBound::Unknown,
    })
}
