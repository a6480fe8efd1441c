//! Symbolic orders of growth.
//!
//! [`ComplexityClass`] is the closed, reportable lattice. Products and
//! recurrence solutions need something finer (`n^(3/2)`, `n^2 log^2 n`,
//! `n^log2(3)`), so the classifier multiplies and compares [`Growth`] values
//! and only rounds to a class at the very end.

use std::cmp::Ordering;
use std::fmt;

use crate::complexity::ComplexityClass;

/// Exponent of `n`, kept as a reduced fraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Degree {
    num: u64,
    den: u64,
}

/// Denominator used when `log_b(a)` has no exact rational form.
const APPROXIMATION_DENOMINATOR: u64 = 1000;

impl Degree {
    pub const ZERO: Degree = Degree { num: 0, den: 1 };
    pub const HALF: Degree = Degree { num: 1, den: 2 };
    pub const ONE: Degree = Degree { num: 1, den: 1 };

    pub fn new(num: u64, den: u64) -> Self {
        assert!(den != 0, "degree denominator must be non-zero");
        let g = gcd(num, den);
        Degree {
            num: num / g,
            den: den / g,
        }
    }

    pub fn integer(k: u64) -> Self {
        Degree { num: k, den: 1 }
    }

    pub fn as_integer(&self) -> Option<u64> {
        (self.den == 1).then_some(self.num)
    }

    /// Smallest integer not below this degree.
    pub fn ceil(&self) -> u64 {
        self.num.div_ceil(self.den)
    }

    /// `log_base(value)` as a degree: exact when `value` is a rational power
    /// of `base`, otherwise rounded up to the nearest thousandth.
    pub fn log(base: u64, value: u64) -> Option<Degree> {
        if base < 2 || value == 0 {
            return None;
        }
        if value == 1 {
            return Some(Degree::ZERO);
        }
        let approx = (value as f64).ln() / (base as f64).ln();
        for den in 1..=6u32 {
            let num = (approx * f64::from(den)).round() as u32;
            let lhs = u128::from(value).checked_pow(den);
            let rhs = u128::from(base).checked_pow(num);
            if let (Some(lhs), Some(rhs)) = (lhs, rhs) {
                if lhs == rhs {
                    return Some(Degree::new(u64::from(num), u64::from(den)));
                }
            }
        }
        let scaled = (approx * APPROXIMATION_DENOMINATOR as f64).ceil() as u64;
        Some(Degree::new(scaled, APPROXIMATION_DENOMINATOR))
    }

    fn add(self, other: Degree) -> Degree {
        Degree::new(
            self.num * other.den + other.num * self.den,
            self.den * other.den,
        )
    }
}

impl PartialOrd for Degree {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Degree {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = u128::from(self.num) * u128::from(other.den);
        let rhs = u128::from(other.num) * u128::from(self.den);
        lhs.cmp(&rhs)
    }
}

impl fmt::Display for Degree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a.max(1)
}

/// `n^degree * log(n)^log`, or one of the super-polynomial orders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Growth {
    Poly { degree: Degree, log: u32 },
    Exponential,
    Factorial,
    Unknown,
}

impl Growth {
    pub const CONSTANT: Growth = Growth::Poly {
        degree: Degree::ZERO,
        log: 0,
    };
    pub const LINEAR: Growth = Growth::Poly {
        degree: Degree::ONE,
        log: 0,
    };
    pub const LOGARITHMIC: Growth = Growth::Poly {
        degree: Degree::ZERO,
        log: 1,
    };
    pub const SQRT: Growth = Growth::Poly {
        degree: Degree::HALF,
        log: 0,
    };

    pub fn poly(degree: Degree, log: u32) -> Growth {
        Growth::Poly { degree, log }
    }

    fn rank(&self) -> u8 {
        match self {
            Growth::Poly { .. } => 0,
            Growth::Exponential => 1,
            Growth::Factorial => 2,
            Growth::Unknown => 3,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Growth::Unknown)
    }

    /// Order of the product of two costs.
    pub fn times(self, other: Growth) -> Growth {
        match (self, other) {
            (Growth::Unknown, _) | (_, Growth::Unknown) => Growth::Unknown,
            (Growth::Factorial, _) | (_, Growth::Factorial) => Growth::Factorial,
            (Growth::Exponential, _) | (_, Growth::Exponential) => Growth::Exponential,
            (
                Growth::Poly {
                    degree: d1,
                    log: l1,
                },
                Growth::Poly {
                    degree: d2,
                    log: l2,
                },
            ) => Growth::Poly {
                degree: d1.add(d2),
                log: l1 + l2,
            },
        }
    }

    /// Order of the logarithm of a quantity growing like `self`.
    pub fn logarithm(self) -> Growth {
        match self {
            Growth::Poly { degree, log } if degree == Degree::ZERO && log == 0 => {
                Growth::CONSTANT
            }
            // log(log^k n) is below log n; round up.
            Growth::Poly { .. } => Growth::LOGARITHMIC,
            Growth::Exponential => Growth::LINEAR,
            Growth::Factorial => Growth::poly(Degree::ONE, 1),
            Growth::Unknown => Growth::Unknown,
        }
    }

    pub fn square_root(self) -> Growth {
        match self {
            Growth::Poly { degree, log } => Growth::Poly {
                degree: Degree::new(degree.num, degree.den * 2),
                log: log.div_ceil(2),
            },
            other => other,
        }
    }

    /// Smallest class bounding this order from above, and whether that class
    /// is exact rather than a rounded-up bound.
    pub fn to_class(self) -> (ComplexityClass, bool) {
        match self {
            Growth::Unknown => (ComplexityClass::Unknown, true),
            Growth::Factorial => (ComplexityClass::OFactorial, true),
            Growth::Exponential => (ComplexityClass::OExponential, true),
            Growth::Poly { degree, log } => {
                if degree == Degree::ZERO {
                    return match log {
                        0 => (ComplexityClass::O1, true),
                        1 => (ComplexityClass::OLogN, true),
                        _ => (ComplexityClass::OSqrtN, false),
                    };
                }
                if degree < Degree::HALF {
                    return (ComplexityClass::OSqrtN, false);
                }
                if degree == Degree::HALF {
                    return if log == 0 {
                        (ComplexityClass::OSqrtN, true)
                    } else {
                        (ComplexityClass::ON, false)
                    };
                }
                match degree.as_integer() {
                    Some(k) => {
                        let k = u32::try_from(k).unwrap_or(u32::MAX);
                        match log {
                            0 => (ComplexityClass::polynomial(k), true),
                            1 => (ComplexityClass::polynomial_log(k), true),
                            _ => (ComplexityClass::polynomial(k.saturating_add(1)), false),
                        }
                    }
                    None => {
                        let k = u32::try_from(degree.ceil()).unwrap_or(u32::MAX);
                        (ComplexityClass::polynomial(k), false)
                    }
                }
            }
        }
    }
}

impl PartialOrd for Growth {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Growth {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (
                Growth::Poly {
                    degree: d1,
                    log: l1,
                },
                Growth::Poly {
                    degree: d2,
                    log: l2,
                },
            ) => d1.cmp(d2).then(l1.cmp(l2)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Growth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Growth::Unknown => write!(f, "?"),
            Growth::Factorial => write!(f, "n!"),
            Growth::Exponential => write!(f, "2^n"),
            Growth::Poly { degree, log } => {
                let poly = match degree.as_integer() {
                    Some(0) => None,
                    Some(1) => Some("n".to_string()),
                    _ => Some(format!("n^{degree}")),
                };
                let logs = match log {
                    0 => None,
                    1 => Some("log(n)".to_string()),
                    k => Some(format!("log(n)^{k}")),
                };
                match (poly, logs) {
                    (None, None) => write!(f, "1"),
                    (Some(p), None) => write!(f, "{p}"),
                    (None, Some(l)) => write!(f, "{l}"),
                    (Some(p), Some(l)) => write!(f, "{p}*{l}"),
                }
            }
        }
    }
}
