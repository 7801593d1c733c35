//! Differentiation, expansion and the structural queries the ODE solver needs.

use super::{Expr, Func, TIME};
use std::fmt;

/// Largest integer power of a sum that `expand` multiplies out.
const MAX_EXPANDED_POWER: u32 = 8;

/// Largest integer power of a sum that `time_polynomial` multiplies out.
pub const MAX_POLYNOMIAL_DEGREE: u32 = 64;

impl Expr {
    /// Partial derivative with respect to the symbol `var`.
    ///
    /// Coordinate functions only depend on time: differentiating with respect
    /// to [`TIME`] raises their derivative order, any other symbol leaves them
    /// constant.
    pub fn diff(&self, var: &str) -> Expr {
        match self {
            Expr::Num(_) => Expr::zero(),
            Expr::Sym(name) => {
                if name == var {
                    Expr::one()
                } else {
                    Expr::zero()
                }
            }
            Expr::Fun(name) => {
                if var == TIME {
                    Expr::deriv(name.clone(), 1)
                } else {
                    Expr::zero()
                }
            }
            Expr::Deriv(name, order) => {
                if var == TIME {
                    Expr::deriv(name.clone(), order + 1)
                } else {
                    Expr::zero()
                }
            }
            Expr::Add(terms) => Expr::add_all(terms.iter().map(|term| term.diff(var)).collect()),
            Expr::Mul(factors) => {
                let mut terms = Vec::with_capacity(factors.len());
                for (i, factor) in factors.iter().enumerate() {
                    let derivative = factor.diff(var);
                    if derivative.is_zero() {
                        continue;
                    }
                    let mut product: Vec<Expr> = factors
                        .iter()
                        .enumerate()
                        .filter(|(j, _)| *j != i)
                        .map(|(_, other)| other.clone())
                        .collect();
                    product.push(derivative);
                    terms.push(Expr::mul_all(product));
                }
                Expr::add_all(terms)
            }
            Expr::Pow(base, exponent) => {
                let base_prime = base.diff(var);
                if !exponent.depends_on(var) {
                    let lowered = Expr::pow((**base).clone(), &**exponent - &Expr::one());
                    return Expr::mul_all(vec![(**exponent).clone(), lowered, base_prime]);
                }
                let exponent_prime = exponent.diff(var);
                let log_term = exponent_prime * Expr::call(Func::Ln, (**base).clone());
                let ratio_term = &**exponent * &base_prime / (**base).clone();
                self.clone() * (log_term + ratio_term)
            }
            Expr::Call(func, arg) => {
                let inner = arg.diff(var);
                if inner.is_zero() {
                    return Expr::zero();
                }
                let arg = (**arg).clone();
                let outer = match func {
                    Func::Sin => Expr::cos(arg),
                    Func::Cos => -Expr::sin(arg),
                    Func::Tan => Expr::one() + Expr::pow(Expr::call(Func::Tan, arg), Expr::num(2.0)),
                    Func::Exp => Expr::exp(arg),
                    Func::Ln => Expr::pow(arg, Expr::num(-1.0)),
                    Func::Sinh => Expr::cosh(arg),
                    Func::Cosh => Expr::sinh(arg),
                };
                outer * inner
            }
        }
    }

    /// Whether the expression depends on `var`. Time-dependence includes coordinate functions.
    pub fn depends_on(&self, var: &str) -> bool {
        if var == TIME {
            self.depends_on_time()
        } else {
            self.contains_symbol(var)
        }
    }

    /// Distributes products over sums and small positive integer powers of sums.
    pub fn expand(&self) -> Expr {
        self.expand_powers_up_to(MAX_EXPANDED_POWER)
    }

    fn expand_powers_up_to(&self, max_power: u32) -> Expr {
        match self {
            Expr::Add(terms) => Expr::add_all(
                terms
                    .iter()
                    .map(|term| term.expand_powers_up_to(max_power))
                    .collect(),
            ),
            Expr::Mul(factors) => {
                let mut products = vec![Expr::one()];
                for factor in factors {
                    let expanded = factor.expand_powers_up_to(max_power);
                    let factor_terms = expanded.terms();
                    let mut next = Vec::with_capacity(products.len() * factor_terms.len());
                    for product in &products {
                        for term in &factor_terms {
                            next.push(product * term);
                        }
                    }
                    products = next;
                }
                Expr::add_all(products)
            }
            Expr::Pow(base, exponent) => {
                let base = base.expand_powers_up_to(max_power);
                match (exponent.as_num(), &base) {
                    (Some(e), Expr::Add(_)) if e.fract() == 0.0 && e > 1.0 && e <= f64::from(max_power) =>
                    {
                        let mut result = base.clone();
                        for _ in 1..(e as u32) {
                            result = distribute(&result, &base);
                        }
                        result
                    }
                    _ => Expr::pow(base, exponent.expand_powers_up_to(max_power)),
                }
            }
            Expr::Call(func, arg) => Expr::call(*func, arg.expand_powers_up_to(max_power)),
            _ => self.clone(),
        }
    }

    /// Writes the expression as `acceleration*q'' + velocity*q' + position*q + forcing`
    /// for the coordinate function `q`.
    ///
    /// Coefficients may contain parameters and `t`, but no coordinate functions.
    pub fn linear_form(&self, function: &str) -> Result<LinearForm, NonLinearity> {
        let mut form = LinearForm::default();
        for term in self.expand().terms() {
            let functions = term.time_functions();
            if functions.is_empty() {
                form.forcing = &form.forcing + &term;
                continue;
            }
            if let Some(other) = functions.iter().find(|name| name.as_str() != function) {
                return Err(NonLinearity::Coupled {
                    term: term.clone(),
                    other: other.clone(),
                });
            }

            let factors = term.factors();
            let mut order = None;
            let mut coefficient = Vec::with_capacity(factors.len());
            for factor in factors {
                let factor_order = match &factor {
                    Expr::Fun(name) if name == function => Some(0),
                    Expr::Deriv(name, n) if name == function && *n <= 2 => Some(*n),
                    _ => None,
                };
                match factor_order {
                    Some(n) if order.is_none() => order = Some(n),
                    Some(_) => return Err(NonLinearity::Nonlinear(term.clone())),
                    None if !factor.time_functions().is_empty() => {
                        return Err(NonLinearity::Nonlinear(term.clone()))
                    }
                    None => coefficient.push(factor),
                }
            }
            let coefficient = Expr::mul_all(coefficient);
            match order {
                Some(0) => form.position = &form.position + &coefficient,
                Some(1) => form.velocity = &form.velocity + &coefficient,
                Some(2) => form.acceleration = &form.acceleration + &coefficient,
                _ => return Err(NonLinearity::Nonlinear(term.clone())),
            }
        }
        Ok(form)
    }

    /// Coefficients `[c0, c1, ...]` of the expression as a polynomial in `t`.
    ///
    /// Fails with the offending term when `t` appears other than through
    /// non-negative integer powers, or inside a sum raised to more than
    /// [`MAX_POLYNOMIAL_DEGREE`].
    pub fn time_polynomial(&self) -> Result<Vec<Expr>, Expr> {
        let mut coefficients: Vec<Expr> = Vec::new();
        for term in self.expand_powers_up_to(MAX_POLYNOMIAL_DEGREE).terms() {
            if term.is_zero() {
                continue;
            }
            let mut degree = 0usize;
            let mut rest = Vec::new();
            for factor in term.factors() {
                match &factor {
                    Expr::Sym(name) if name == TIME => degree += 1,
                    Expr::Pow(base, exponent) if matches!(&**base, Expr::Sym(name) if name == TIME) => {
                        match exponent.as_num() {
                            Some(e) if e.fract() == 0.0 && e > 0.0 => degree += e as usize,
                            _ => return Err(term.clone()),
                        }
                    }
                    other if other.depends_on_time() => return Err(term.clone()),
                    other => rest.push(other.clone()),
                }
            }
            if coefficients.len() <= degree {
                coefficients.resize(degree + 1, Expr::zero());
            }
            coefficients[degree] = &coefficients[degree] + &Expr::mul_all(rest);
        }
        Ok(coefficients)
    }
}

fn distribute(left: &Expr, right: &Expr) -> Expr {
    let right_terms = right.terms();
    let mut products = Vec::new();
    for a in left.terms() {
        for b in &right_terms {
            products.push(&a * b);
        }
    }
    Expr::add_all(products)
}

/// `acceleration*q'' + velocity*q' + position*q + forcing`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearForm {
    pub acceleration: Expr,
    pub velocity: Expr,
    pub position: Expr,
    pub forcing: Expr,
}

impl Default for LinearForm {
    fn default() -> Self {
        Self {
            acceleration: Expr::zero(),
            velocity: Expr::zero(),
            position: Expr::zero(),
            forcing: Expr::zero(),
        }
    }
}

/// Why an expression is not linear in a coordinate function.
#[derive(Debug, Clone, PartialEq)]
pub enum NonLinearity {
    Nonlinear(Expr),
    Coupled { term: Expr, other: String },
}

impl fmt::Display for NonLinearity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NonLinearity::Nonlinear(term) => write!(f, "nonlinear term `{term}`"),
            NonLinearity::Coupled { term, other } => {
                write!(f, "term `{term}` couples to `{other}({TIME})`")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn diff_applies_product_and_chain_rules() {
        let x = Expr::sym("x");
        let expr = Expr::sin(x.clone() * x.clone());
        let derivative = expr.diff("x");
        let bindings = HashMap::from([("x".to_string(), 0.7)]);
        let expected = 2.0 * 0.7 * (0.7_f64 * 0.7).cos();
        let value = derivative.eval(&bindings).expect("bound");
        assert!((value - expected).abs() < 1e-12);
    }

    #[test]
    fn diff_in_time_raises_derivative_order() {
        let expr = Expr::sym("m") * Expr::fun("x");
        assert_eq!(expr.diff(TIME), Expr::sym("m") * Expr::deriv("x", 1));
        assert_eq!(Expr::deriv("x", 1).diff(TIME), Expr::deriv("x", 2));
        assert!(Expr::fun("x").diff("x").is_zero());
    }

    #[test]
    fn diff_of_sqrt_matches_power_rule() {
        let r = Expr::sym("r");
        let derivative = Expr::sqrt(r.clone()).diff("r");
        let bindings = HashMap::from([("r".to_string(), 4.0)]);
        let value = derivative.eval(&bindings).expect("bound");
        assert!((value - 0.25).abs() < 1e-12);
    }

    #[test]
    fn expand_distributes_products() {
        let a = Expr::sym("a");
        let b = Expr::sym("b");
        let expr = Expr::pow(a.clone() + b.clone(), Expr::num(2.0)).expand();
        let expected = Expr::pow(a.clone(), Expr::num(2.0))
            + 2.0 * a.clone() * b.clone()
            + Expr::pow(b.clone(), Expr::num(2.0));
        assert_eq!(expr, expected);
    }

    #[test]
    fn linear_form_extracts_coefficients() {
        let k = Expr::sym("k");
        let b = Expr::sym("b");
        let expr = -(k.clone() * Expr::fun("x")) - b.clone() * Expr::deriv("x", 1) + Expr::sym("F");
        let form = expr.linear_form("x").expect("linear");
        assert_eq!(form.position, -k);
        assert_eq!(form.velocity, -b);
        assert!(form.acceleration.is_zero());
        assert_eq!(form.forcing, Expr::sym("F"));
    }

    #[test]
    fn linear_form_rejects_nonlinear_and_coupled_terms() {
        let square = Expr::fun("x") * Expr::fun("x");
        assert!(matches!(square.linear_form("x"), Err(NonLinearity::Nonlinear(_))));

        let sine = Expr::sin(Expr::fun("x"));
        assert!(matches!(sine.linear_form("x"), Err(NonLinearity::Nonlinear(_))));

        let coupled = Expr::fun("x") - Expr::fun("y");
        match coupled.linear_form("x") {
            Err(NonLinearity::Coupled { other, .. }) => assert_eq!(other, "y"),
            other => panic!("expected coupling error, got {other:?}"),
        }
    }

    #[test]
    fn time_polynomial_collects_powers_of_t() {
        let t = Expr::time();
        let a = Expr::sym("a");
        let expr = a.clone() * t.clone() * t.clone() + Expr::num(3.0) + t.clone();
        let coefficients = expr.time_polynomial().expect("polynomial");
        assert_eq!(coefficients, vec![Expr::num(3.0), Expr::one(), a]);

        assert!(Expr::sin(t).time_polynomial().is_err());
        assert!(Expr::zero().time_polynomial().expect("zero").is_empty());
    }

    #[test]
    fn time_polynomial_expands_high_powers_of_sums() {
        let shifted = Expr::time() + Expr::one();
        let coefficients = Expr::pow(shifted.clone(), Expr::num(9.0))
            .time_polynomial()
            .expect("(t+1)^9 is a polynomial");
        assert_eq!(coefficients.len(), 10);
        assert_eq!(coefficients[0], Expr::one());
        assert_eq!(coefficients[1], Expr::num(9.0));
        assert_eq!(coefficients[4], Expr::num(126.0));
        assert_eq!(coefficients[9], Expr::one());

        let too_large = Expr::pow(shifted, Expr::num(f64::from(MAX_POLYNOMIAL_DEGREE + 1)));
        assert!(too_large.time_polynomial().is_err());
    }
}
