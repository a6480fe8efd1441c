//! Recurrence relations and their closed-form solutions.
//!
//! A recursive function `f` is summarised as
//! `T(n) = Σ mᵢ·T(shrinkᵢ(n)) + f(n)`, one term per recursive call site.
//! [`solve`] matches the relation against the known closed forms, in order:
//!
//! 1. Master theorem: `a·T(n/b) + f(n)`
//! 2. Linear decrement: `T(n-c) + f(n)`
//! 3. Branching decrement: `T(n-1) + T(n-2) + ...` or `a·T(n-c)` with `a >= 2`
//! 4. Per-element decrement: `n·T(n-1) + f(n)`
//!
//! Anything else is `Unknown` with a warning; unsolvable recurrences never
//! abort the analysis of the surrounding module.

use std::fmt;

use serde::Serialize;

use crate::complexity::ComplexityClass;
use crate::growth::{Degree, Growth};

/// How a recursive call shrinks the input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Shrink {
    Divide(u64),
    Decrement(u64),
    Unrecognised,
}

/// How many times a call site executes per invocation of its function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Multiplicity {
    Times(u64),
    /// Inside a loop whose bound is linear in the input size.
    PerSize,
    /// Inside a loop with a bound that is neither constant nor linear.
    Unbounded,
}

impl Multiplicity {
    pub fn scaled(self, factor: Multiplicity) -> Multiplicity {
        match (self, factor) {
            (Multiplicity::Unbounded, _) | (_, Multiplicity::Unbounded) => Multiplicity::Unbounded,
            (Multiplicity::PerSize, Multiplicity::PerSize) => Multiplicity::Unbounded,
            (Multiplicity::PerSize, _) | (_, Multiplicity::PerSize) => Multiplicity::PerSize,
            (Multiplicity::Times(a), Multiplicity::Times(b)) => {
                Multiplicity::Times(a.saturating_mul(b))
            }
        }
    }

    /// Weight used to pick the worst of several exclusive branches.
    pub fn weight(self) -> u64 {
        match self {
            Multiplicity::Times(k) => k,
            Multiplicity::PerSize => u64::MAX - 1,
            Multiplicity::Unbounded => u64::MAX,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct RecursiveTerm {
    pub multiplicity: Multiplicity,
    pub shrink: Shrink,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecurrenceRelation {
    pub function: String,
    pub terms: Vec<RecursiveTerm>,
    /// `f(n)`: the non-recursive work of one invocation.
    pub residual: ComplexityClass,
}

impl fmt::Display for RecurrenceRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T(n) = ")?;
        for term in &self.terms {
            match term.multiplicity {
                Multiplicity::Times(1) => {}
                Multiplicity::Times(k) => write!(f, "{k}*")?,
                Multiplicity::PerSize => write!(f, "n*")?,
                Multiplicity::Unbounded => write!(f, "?*")?,
            }
            match term.shrink {
                Shrink::Divide(b) => write!(f, "T(n/{b}) + ")?,
                Shrink::Decrement(c) => write!(f, "T(n-{c}) + ")?,
                Shrink::Unrecognised => write!(f, "T(?) + ")?,
            }
        }
        write!(f, "{}", self.residual)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Solution {
    pub growth: Growth,
    pub warnings: Vec<String>,
}

impl Solution {
    pub fn class(&self) -> ComplexityClass {
        self.growth.to_class().0
    }

    fn unsolved(relation: &RecurrenceRelation, reason: &str) -> Solution {
        Solution {
            growth: Growth::Unknown,
            warnings: vec![format!(
                "cannot solve recurrence for `{}` ({relation}): {reason}",
                relation.function
            )],
        }
    }
}

/// Closed-form growth of `relation`.
///
/// # Panics
///
/// A relation without recursive terms is a builder bug and panics.
pub fn solve(relation: &RecurrenceRelation) -> Solution {
    assert!(
        !relation.terms.is_empty(),
        "recurrence relation for `{}` has no recursive terms",
        relation.function
    );

    let mut warnings = Vec::new();
    let residual = relation.residual.growth();
    if residual.is_unknown() {
        return Solution::unsolved(relation, "non-recursive work is unknown");
    }

    if relation
        .terms
        .iter()
        .any(|t| t.shrink == Shrink::Unrecognised)
    {
        return Solution::unsolved(relation, "recursive argument does not shrink recognisably");
    }
    if relation
        .terms
        .iter()
        .any(|t| t.multiplicity == Multiplicity::Unbounded)
    {
        return Solution::unsolved(relation, "recursive call sits in a loop of unknown size");
    }

    let all_divide = relation
        .terms
        .iter()
        .all(|t| matches!(t.shrink, Shrink::Divide(_)));
    let all_decrement = relation
        .terms
        .iter()
        .all(|t| matches!(t.shrink, Shrink::Decrement(_)));

    let mut solution = if all_divide {
        master_theorem(relation, residual)
    } else if all_decrement {
        decrement(relation, residual)
    } else {
        Solution::unsolved(relation, "mixes divide and decrement calls")
    };
    warnings.append(&mut solution.warnings);
    solution.warnings = warnings;
    solution
}

fn master_theorem(relation: &RecurrenceRelation, residual: Growth) -> Solution {
    let mut bases = relation.terms.iter().filter_map(|t| match t.shrink {
        Shrink::Divide(b) => Some(b),
        _ => None,
    });
    let b = bases.next().unwrap_or(0);
    if relation
        .terms
        .iter()
        .any(|t| t.shrink != Shrink::Divide(b))
    {
        return Solution::unsolved(relation, "calls divide the input by different factors");
    }
    if b < 2 {
        return Solution::unsolved(relation, "division factor must be at least 2");
    }
    let mut a: u64 = 0;
    for term in &relation.terms {
        match term.multiplicity {
            Multiplicity::Times(k) => a = a.saturating_add(k),
            _ => return Solution::unsolved(relation, "divide-and-conquer call inside a loop"),
        }
    }
    let Some(p) = Degree::log(b, a) else {
        return Solution::unsolved(relation, "invalid master theorem parameters");
    };
    let critical = Growth::poly(p, 0);
    let growth = match residual {
        Growth::Poly { degree, log } if degree == p => Growth::poly(p, log + 1),
        f if f < critical => critical,
        f => f,
    };
    Solution {
        growth,
        warnings: Vec::new(),
    }
}

fn decrement(relation: &RecurrenceRelation, residual: Growth) -> Solution {
    if relation
        .terms
        .iter()
        .any(|t| t.multiplicity == Multiplicity::PerSize)
    {
        return Solution {
            growth: Growth::Factorial.max(residual),
            warnings: Vec::new(),
        };
    }
    let calls: u64 = relation
        .terms
        .iter()
        .map(|t| match t.multiplicity {
            Multiplicity::Times(k) => k,
            _ => 0,
        })
        .sum();
    let growth = if calls == 1 {
        Growth::LINEAR.times(residual)
    } else {
        Growth::Exponential.max(residual)
    };
    Solution {
        growth,
        warnings: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn relation(terms: Vec<(Multiplicity, Shrink)>, residual: ComplexityClass) -> RecurrenceRelation {
        RecurrenceRelation {
            function: "f".to_string(),
            terms: terms
                .into_iter()
                .map(|(multiplicity, shrink)| RecursiveTerm {
                    multiplicity,
                    shrink,
                })
                .collect(),
            residual,
        }
    }

    fn once(shrink: Shrink) -> (Multiplicity, Shrink) {
        (Multiplicity::Times(1), shrink)
    }

    #[test]
    fn test_merge_sort() {
        let r = relation(
            vec![once(Shrink::Divide(2)), once(Shrink::Divide(2))],
            ComplexityClass::ON,
        );
        assert_eq!(solve(&r).class(), ComplexityClass::ONLogN);
    }

    #[test]
    fn test_binary_search() {
        let r = relation(vec![once(Shrink::Divide(2))], ComplexityClass::O1);
        assert_eq!(solve(&r).class(), ComplexityClass::OLogN);
    }

    #[test]
    fn test_master_case_one() {
        // T(n) = 8T(n/2) + n^2 -> n^3
        let r = relation(
            vec![(Multiplicity::Times(8), Shrink::Divide(2))],
            ComplexityClass::OPolynomial(2),
        );
        assert_eq!(solve(&r).class(), ComplexityClass::OPolynomial(3));
    }

    #[test]
    fn test_master_case_three() {
        // T(n) = 2T(n/2) + n^2 -> n^2
        let r = relation(
            vec![once(Shrink::Divide(2)), once(Shrink::Divide(2))],
            ComplexityClass::OPolynomial(2),
        );
        assert_eq!(solve(&r).class(), ComplexityClass::OPolynomial(2));
    }

    #[test]
    fn test_karatsuba_rounds_up() {
        // T(n) = 3T(n/2) + n -> n^1.585
        let r = relation(
            vec![(Multiplicity::Times(3), Shrink::Divide(2))],
            ComplexityClass::ON,
        );
        let solution = solve(&r);
        assert_eq!(solution.growth, Growth::poly(Degree::new(1585, 1000), 0));
        assert_eq!(solution.class(), ComplexityClass::OPolynomial(2));
    }

    #[test]
    fn test_linear_decrement() {
        let r = relation(vec![once(Shrink::Decrement(1))], ComplexityClass::O1);
        assert_eq!(solve(&r).class(), ComplexityClass::ON);
        let r = relation(vec![once(Shrink::Decrement(1))], ComplexityClass::ON);
        assert_eq!(solve(&r).class(), ComplexityClass::OPolynomial(2));
    }

    #[test]
    fn test_fibonacci() {
        let r = relation(
            vec![once(Shrink::Decrement(1)), once(Shrink::Decrement(2))],
            ComplexityClass::O1,
        );
        assert_eq!(solve(&r).class(), ComplexityClass::OExponential);
    }

    #[test]
    fn test_permutations() {
        let r = relation(
            vec![(Multiplicity::PerSize, Shrink::Decrement(1))],
            ComplexityClass::ON,
        );
        assert_eq!(solve(&r).class(), ComplexityClass::OFactorial);
    }

    #[test]
    fn test_mixed_shrinks_unknown() {
        let r = relation(
            vec![once(Shrink::Divide(2)), once(Shrink::Decrement(1))],
            ComplexityClass::O1,
        );
        let solution = solve(&r);
        assert_eq!(solution.class(), ComplexityClass::Unknown);
        assert_eq!(solution.warnings.len(), 1);
    }

    #[test]
    fn test_unrecognised_shrink_unknown() {
        let r = relation(vec![once(Shrink::Unrecognised)], ComplexityClass::O1);
        assert_eq!(solve(&r).class(), ComplexityClass::Unknown);
    }

    #[test]
    fn test_display() {
        let r = relation(
            vec![once(Shrink::Decrement(1)), once(Shrink::Decrement(2))],
            ComplexityClass::O1,
        );
        assert_eq!(r.to_string(), "T(n) = T(n-1) + T(n-2) + O(1)");
    }

    #[test]
    #[should_panic(expected = "no recursive terms")]
    fn test_empty_relation_is_a_bug() {
        solve(&relation(vec![], ComplexityClass::O1));
    }
}
