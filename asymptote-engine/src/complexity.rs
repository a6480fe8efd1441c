#![allow(clippy::enum_variant_names)]

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use num_traits::Zero;
use pest::Parser;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

use crate::cost::CostExpression;
use crate::error::NotationError;
use crate::growth::{Degree, Growth};
use crate::recurrence::{self, RecurrenceRelation};

#[derive(pest_derive::Parser)]
#[grammar = "complexity_notation.pest"]
struct ComplexityNotationParser;

/// Canonical, totally ordered Big-O classes.
///
/// `OPolynomial(k)` and `OPolynomialLogN(k)` only hold `k >= 2`; use
/// [`ComplexityClass::polynomial`] to build them from arbitrary degrees.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComplexityClass {
    O1,
    OLogN,
    OSqrtN,
    ON,
    ONLogN,
    OPolynomial(u32),
    OPolynomialLogN(u32),
    OExponential,
    OFactorial,
    Unknown,
}

impl ComplexityClass {
    fn ordinal(&self) -> u64 {
        match self {
            ComplexityClass::O1 => 0,
            ComplexityClass::OLogN => 1,
            ComplexityClass::OSqrtN => 2,
            ComplexityClass::ON => 3,
            ComplexityClass::ONLogN => 4,
            ComplexityClass::OPolynomial(k) => 5 + 2 * u64::from(*k),
            ComplexityClass::OPolynomialLogN(k) => 6 + 2 * u64::from(*k),
            ComplexityClass::OExponential => 1_000_000_000_000,
            ComplexityClass::OFactorial => 2_000_000_000_000,
            ComplexityClass::Unknown => u64::MAX,
        }
    }

    pub fn polynomial(k: u32) -> ComplexityClass {
        match k {
            0 => ComplexityClass::O1,
            1 => ComplexityClass::ON,
            k => ComplexityClass::OPolynomial(k),
        }
    }

    pub fn polynomial_log(k: u32) -> ComplexityClass {
        match k {
            0 => ComplexityClass::OLogN,
            1 => ComplexityClass::ONLogN,
            k => ComplexityClass::OPolynomialLogN(k),
        }
    }

    pub fn max(self, other: ComplexityClass) -> ComplexityClass {
        if self >= other {
            self
        } else {
            other
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, ComplexityClass::Unknown)
    }

    /// The symbolic order this class stands for.
    pub fn growth(&self) -> Growth {
        match self {
            ComplexityClass::O1 => Growth::CONSTANT,
            ComplexityClass::OLogN => Growth::LOGARITHMIC,
            ComplexityClass::OSqrtN => Growth::SQRT,
            ComplexityClass::ON => Growth::LINEAR,
            ComplexityClass::ONLogN => Growth::poly(Degree::ONE, 1),
            ComplexityClass::OPolynomial(k) => Growth::poly(Degree::integer(u64::from(*k)), 0),
            ComplexityClass::OPolynomialLogN(k) => {
                Growth::poly(Degree::integer(u64::from(*k)), 1)
            }
            ComplexityClass::OExponential => Growth::Exponential,
            ComplexityClass::OFactorial => Growth::Factorial,
            ComplexityClass::Unknown => Growth::Unknown,
        }
    }
}

impl PartialOrd for ComplexityClass {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComplexityClass {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ordinal().cmp(&other.ordinal())
    }
}

impl fmt::Display for ComplexityClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComplexityClass::O1 => write!(f, "O(1)"),
            ComplexityClass::OLogN => write!(f, "O(log(n))"),
            ComplexityClass::OSqrtN => write!(f, "O(sqrt(n))"),
            ComplexityClass::ON => write!(f, "O(n)"),
            ComplexityClass::ONLogN => write!(f, "O(n*log(n))"),
            ComplexityClass::OPolynomial(k) => write!(f, "O(n^{k})"),
            ComplexityClass::OPolynomialLogN(k) => write!(f, "O(n^{k}*log(n))"),
            ComplexityClass::OExponential => write!(f, "O(2^n)"),
            ComplexityClass::OFactorial => write!(f, "O(n!)"),
            ComplexityClass::Unknown => write!(f, "O(?)"),
        }
    }
}

impl FromStr for ComplexityClass {
    type Err = NotationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let growth = ComplexityNotationParser::parse(Rule::simple_complexity, s)
            .map_err(|e| NotationError::Syntax(e.to_string()))?
            .next()
            .and_then(|complexity| {
                complexity
                    .into_inner()
                    .find(|pair| pair.as_rule() == Rule::growth)
            })
            .and_then(|growth| growth.into_inner().next())
            .ok_or_else(|| NotationError::Syntax(s.to_string()))?;

        let exponent = |pair: pest::iterators::Pair<Rule>| -> Result<u32, NotationError> {
            let digits = pair
                .into_inner()
                .find(|p| p.as_rule() == Rule::exponent)
                .map(|p| p.as_str().to_string())
                .unwrap_or_default();
            digits
                .parse()
                .map_err(|_| NotationError::InvalidExponent(digits))
        };

        match growth.as_rule() {
            Rule::constant => Ok(ComplexityClass::O1),
            Rule::log_n => Ok(ComplexityClass::OLogN),
            Rule::sqrt_n => Ok(ComplexityClass::OSqrtN),
            Rule::linear => Ok(ComplexityClass::ON),
            Rule::n_log_n => Ok(ComplexityClass::ONLogN),
            Rule::polynomial => Ok(ComplexityClass::polynomial(exponent(growth)?)),
            Rule::poly_log => Ok(ComplexityClass::polynomial_log(exponent(growth)?)),
            Rule::exponential => Ok(ComplexityClass::OExponential),
            Rule::factorial => Ok(ComplexityClass::OFactorial),
            Rule::unknown => Ok(ComplexityClass::Unknown),
            _ => Err(NotationError::Syntax(s.to_string())),
        }
    }
}

impl Serialize for ComplexityClass {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ComplexityClass {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ComplexityClass::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Result of reducing a cost expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Classification {
    pub class: ComplexityClass,
    pub warnings: Vec<String>,
}

/// Reduces cost expressions to classes.
///
/// Owns the recurrence relations registered during one analysis run and
/// memoises their solutions by function name. Never share one between
/// unrelated runs.
#[derive(Debug, Default)]
pub struct Classifier {
    relations: BTreeMap<String, RecurrenceRelation>,
    solved: HashMap<String, (Growth, Vec<String>)>,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, relation: RecurrenceRelation) {
        self.solved.remove(&relation.function);
        self.relations.insert(relation.function.clone(), relation);
    }

    pub fn classify(&mut self, expr: &CostExpression) -> Classification {
        let mut warnings = Vec::new();
        let growth = self.growth_of(expr, &mut warnings);
        let (class, exact) = growth.to_class();
        if !exact {
            warnings.push(format!("{growth} rounded up to {class}"));
        }
        Classification { class, warnings }
    }

    fn growth_of(&mut self, expr: &CostExpression, warnings: &mut Vec<String>) -> Growth {
        match expr {
            CostExpression::Constant(_) => Growth::CONSTANT,
            CostExpression::Class(class) => class.growth(),
            CostExpression::Bound(bound) => bound.growth(),
            CostExpression::Sum(children) | CostExpression::Max(children) => children
                .iter()
                .map(|child| self.growth_of(child, warnings))
                .fold(Growth::CONSTANT, Growth::max),
            CostExpression::Product(children) => {
                if children
                    .iter()
                    .any(|child| matches!(child, CostExpression::Constant(c) if c.is_zero()))
                {
                    return Growth::CONSTANT;
                }
                children
                    .iter()
                    .map(|child| self.growth_of(child, warnings))
                    .fold(Growth::CONSTANT, Growth::times)
            }
            CostExpression::RecurrenceRef(function)
            | CostExpression::RecursiveCall { function, .. } => {
                self.solve_recurrence(function, warnings)
            }
        }
    }

    fn solve_recurrence(&mut self, function: &str, warnings: &mut Vec<String>) -> Growth {
        if let Some((growth, cached_warnings)) = self.solved.get(function) {
            warnings.extend(cached_warnings.iter().cloned());
            return *growth;
        }
        let Some(relation) = self.relations.get(function) else {
            warnings.push(format!("no recurrence relation recorded for `{function}`"));
            return Growth::Unknown;
        };
        let solution = recurrence::solve(relation);
        debug!(function, relation = %relation, growth = %solution.growth, "solved recurrence");
        warnings.extend(solution.warnings.iter().cloned());
        self.solved
            .insert(function.to_string(), (solution.growth, solution.warnings));
        solution.growth
    }
}

/// Classifies an expression that references no recurrences.
pub fn classify(expr: &CostExpression) -> ComplexityClass {
    Classifier::new().classify(expr).class
}
