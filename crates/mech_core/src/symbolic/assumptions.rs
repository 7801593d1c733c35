use super::{Expr, Func};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Negative,
    Zero,
    Positive,
}

impl Sign {
    fn of(value: f64) -> Option<Sign> {
        if value.is_nan() {
            None
        } else if value > 0.0 {
            Some(Sign::Positive)
        } else if value < 0.0 {
            Some(Sign::Negative)
        } else {
            Some(Sign::Zero)
        }
    }

    fn times(self, other: Sign) -> Sign {
        match (self, other) {
            (Sign::Zero, _) | (_, Sign::Zero) => Sign::Zero,
            (a, b) if a == b => Sign::Positive,
            _ => Sign::Negative,
        }
    }
}

/// Symbols known to be strictly positive.
///
/// Masses are always registered. Other parameters (spring constants, damping
/// coefficients) must be declared before solving equations whose solution
/// shape depends on their sign.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Assumptions {
    positive: BTreeSet<String>,
}

impl Assumptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assume_positive(&mut self, symbol: impl Into<String>) -> &mut Self {
        self.positive.insert(symbol.into());
        self
    }

    pub fn is_positive(&self, symbol: &str) -> bool {
        self.positive.contains(symbol)
    }

    pub fn extend(&mut self, other: &Assumptions) {
        self.positive.extend(other.positive.iter().cloned());
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.positive.iter().map(String::as_str)
    }

    /// Sign of `expr` when it follows from the assumptions, `None` otherwise.
    pub fn sign(&self, expr: &Expr) -> Option<Sign> {
        match expr {
            Expr::Num(value) => Sign::of(*value),
            Expr::Sym(name) if self.is_positive(name) => Some(Sign::Positive),
            Expr::Sym(_) | Expr::Fun(_) | Expr::Deriv(_, _) => None,
            Expr::Mul(factors) => factors
                .iter()
                .try_fold(Sign::Positive, |acc, factor| Some(acc.times(self.sign(factor)?))),
            Expr::Add(terms) => {
                let mut positive = false;
                let mut negative = false;
                for term in terms {
                    match self.sign(term)? {
                        Sign::Positive => positive = true,
                        Sign::Negative => negative = true,
                        Sign::Zero => {}
                    }
                }
                match (positive, negative) {
                    (true, false) => Some(Sign::Positive),
                    (false, true) => Some(Sign::Negative),
                    (false, false) => Some(Sign::Zero),
                    (true, true) => None,
                }
            }
            Expr::Pow(base, exponent) => {
                let exponent = exponent.as_num();
                match (self.sign(base), exponent) {
                    (Some(Sign::Positive), _) => Some(Sign::Positive),
                    (Some(Sign::Zero), Some(e)) if e > 0.0 => Some(Sign::Zero),
                    (Some(Sign::Negative), Some(e)) if e.fract() == 0.0 => {
                        if (e as i64) % 2 == 0 {
                            Some(Sign::Positive)
                        } else {
                            Some(Sign::Negative)
                        }
                    }
                    _ => None,
                }
            }
            Expr::Call(Func::Exp | Func::Cosh, _) => Some(Sign::Positive),
            Expr::Call(Func::Sinh, arg) => self.sign(arg),
            Expr::Call(_, _) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn products_and_quotients_of_positive_symbols_are_positive() {
        let mut assumptions = Assumptions::new();
        assumptions.assume_positive("k").assume_positive("m");
        let ratio = Expr::sym("k") / Expr::sym("m");
        assert_eq!(assumptions.sign(&ratio), Some(Sign::Positive));
        assert_eq!(assumptions.sign(&-ratio), Some(Sign::Negative));
    }

    #[test]
    fn unknown_symbols_and_mixed_sums_are_undecided() {
        let mut assumptions = Assumptions::new();
        assumptions.assume_positive("b");
        assert_eq!(assumptions.sign(&Expr::sym("k")), None);
        let mixed = Expr::sym("b") - Expr::num(1.0);
        assert_eq!(assumptions.sign(&mixed), None);
        let positive = Expr::sym("b") + Expr::num(1.0);
        assert_eq!(assumptions.sign(&positive), Some(Sign::Positive));
    }

    #[test]
    fn even_powers_of_negative_numbers_are_positive() {
        let assumptions = Assumptions::new();
        let square = Expr::Pow(Box::new(Expr::num(-2.0)), Box::new(Expr::num(2.0)));
        assert_eq!(assumptions.sign(&square), Some(Sign::Positive));
        assert_eq!(assumptions.sign(&Expr::exp(Expr::sym("x"))), Some(Sign::Positive));
    }
}
