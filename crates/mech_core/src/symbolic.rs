//! Symbolic expressions for equations of motion.
//!
//! Expressions are kept in a canonical form: every constructor flattens nested
//! sums and products, folds numeric parts, collects like terms (`x + 2*x`) and
//! like bases (`x*x^2`), and sorts operands with a fixed total order. Two
//! expressions built from equal inputs are therefore structurally equal, which
//! is what the solver relies on when it compares coefficients against zero.
//!
//! Coordinates of particles appear in two shapes:
//! - as plain symbols (`x__body`) while users write forces and potentials;
//! - as functions of time (`x__body(t)`, [`Expr::Fun`]) and their time
//!   derivatives ([`Expr::Deriv`]) once equations are assembled.

pub mod assumptions;
pub mod calculus;

use crate::error::EvalError;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

pub use assumptions::{Assumptions, Sign};
pub use calculus::{LinearForm, NonLinearity};

/// Name of the independent time variable.
pub const TIME: &str = "t";

const PREC_ADD: u8 = 1;
const PREC_MUL: u8 = 2;
const PREC_POW: u8 = 3;
const PREC_ATOM: u8 = 4;

/// Elementary functions understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Exp,
    Ln,
    Sinh,
    Cosh,
}

impl Func {
    pub fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Exp => "exp",
            Func::Ln => "ln",
            Func::Sinh => "sinh",
            Func::Cosh => "cosh",
        }
    }

    /// Resolves a function name as written in user expressions. `log` is an alias of `ln`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sin" => Some(Func::Sin),
            "cos" => Some(Func::Cos),
            "tan" => Some(Func::Tan),
            "exp" => Some(Func::Exp),
            "ln" | "log" => Some(Func::Ln),
            "sinh" => Some(Func::Sinh),
            "cosh" => Some(Func::Cosh),
            _ => None,
        }
    }

    pub fn apply_f64(self, x: f64) -> f64 {
        match self {
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Exp => x.exp(),
            Func::Ln => x.ln(),
            Func::Sinh => x.sinh(),
            Func::Cosh => x.cosh(),
        }
    }

    fn is_odd(self) -> bool {
        matches!(self, Func::Sin | Func::Tan | Func::Sinh)
    }

    fn is_even(self) -> bool {
        matches!(self, Func::Cos | Func::Cosh)
    }
}

/// A symbolic expression in canonical form.
///
/// The variants are public for pattern matching. Build new expressions through
/// the constructors and operators so that the canonical form is preserved.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Num(f64),
    /// A free symbol: a parameter such as `k`, a coordinate symbol, or `t`.
    Sym(String),
    /// A coordinate as a function of time, `name(t)`.
    Fun(String),
    /// Time derivative of `name(t)` of the given order (at least 1).
    Deriv(String, u32),
    Add(Vec<Expr>),
    Mul(Vec<Expr>),
    Pow(Box<Expr>, Box<Expr>),
    Call(Func, Box<Expr>),
}

impl Expr {
    pub fn num(value: f64) -> Expr {
        Expr::Num(value)
    }

    pub fn zero() -> Expr {
        Expr::Num(0.0)
    }

    pub fn one() -> Expr {
        Expr::Num(1.0)
    }

    pub fn sym(name: impl Into<String>) -> Expr {
        Expr::Sym(name.into())
    }

    pub fn time() -> Expr {
        Expr::Sym(TIME.to_string())
    }

    pub fn fun(name: impl Into<String>) -> Expr {
        Expr::Fun(name.into())
    }

    /// `d^order/dt^order name(t)`; order zero is the function itself.
    pub fn deriv(name: impl Into<String>, order: u32) -> Expr {
        if order == 0 {
            Expr::Fun(name.into())
        } else {
            Expr::Deriv(name.into(), order)
        }
    }

    /// Canonical sum of `terms`.
    pub fn add_all(terms: Vec<Expr>) -> Expr {
        let mut constant = 0.0;
        let mut collected: Vec<(Expr, f64)> = Vec::new();
        let mut pending = terms;
        while let Some(term) = pending.pop() {
            match term {
                Expr::Add(inner) => pending.extend(inner),
                Expr::Num(value) => constant += value,
                other => {
                    let (coeff, rest) = other.split_coefficient();
                    if let Some(entry) = collected.iter_mut().find(|(base, _)| *base == rest) {
                        entry.1 += coeff;
                    } else {
                        collected.push((rest, coeff));
                    }
                }
            }
        }

        let mut out: Vec<Expr> = collected
            .into_iter()
            .filter(|(_, coeff)| *coeff != 0.0)
            .map(|(rest, coeff)| Expr::scaled(coeff, rest))
            .filter(|term| !term.is_zero())
            .collect();
        out.sort_by(Expr::canonical_cmp);
        if constant != 0.0 {
            out.push(Expr::Num(constant));
        }

        match out.len() {
            0 => Expr::zero(),
            1 => out.remove(0),
            _ => Expr::Add(out),
        }
    }

    /// Canonical product of `factors`.
    pub fn mul_all(factors: Vec<Expr>) -> Expr {
        let mut coeff = 1.0;
        let mut bases: Vec<(Expr, Expr)> = Vec::new();
        let mut pending = factors;
        while let Some(factor) = pending.pop() {
            match factor {
                Expr::Mul(inner) => pending.extend(inner),
                Expr::Num(value) => coeff *= value,
                other => {
                    let (base, exponent) = other.split_power();
                    if let Some(entry) = bases.iter_mut().find(|(b, _)| *b == base) {
                        entry.1 = Expr::add_all(vec![entry.1.clone(), exponent]);
                    } else {
                        bases.push((base, exponent));
                    }
                }
            }
        }
        if coeff == 0.0 {
            return Expr::zero();
        }

        let mut out = Vec::with_capacity(bases.len());
        for (base, exponent) in bases {
            match Expr::pow(base, exponent) {
                Expr::Num(value) => coeff *= value,
                other => out.push(other),
            }
        }
        if coeff == 0.0 {
            return Expr::zero();
        }
        out.sort_by(Expr::canonical_cmp);

        if out.is_empty() {
            return Expr::Num(coeff);
        }
        if out.len() == 1 && coeff == 1.0 {
            return out.remove(0);
        }
        if coeff != 1.0 {
            out.insert(0, Expr::Num(coeff));
        }
        Expr::Mul(out)
    }

    pub fn pow(base: Expr, exponent: Expr) -> Expr {
        match (&base, &exponent) {
            (_, Expr::Num(e)) if *e == 0.0 => Expr::one(),
            (_, Expr::Num(e)) if *e == 1.0 => base,
            (Expr::Num(b), Expr::Num(e)) => {
                let value = b.powf(*e);
                if value.is_finite() && (e.fract() == 0.0 || (value.fract() == 0.0 && *b >= 0.0)) {
                    Expr::Num(value)
                } else {
                    Expr::Pow(Box::new(base), Box::new(exponent))
                }
            }
            (Expr::Num(b), _) if *b == 1.0 => Expr::one(),
            (Expr::Pow(inner_base, inner_exp), Expr::Num(e)) if e.fract() == 0.0 => Expr::pow(
                (**inner_base).clone(),
                Expr::mul_all(vec![(**inner_exp).clone(), exponent.clone()]),
            ),
            (Expr::Mul(factors), Expr::Num(e)) if e.fract() == 0.0 => Expr::mul_all(
                factors
                    .iter()
                    .map(|factor| Expr::pow(factor.clone(), exponent.clone()))
                    .collect(),
            ),
            _ => Expr::Pow(Box::new(base), Box::new(exponent)),
        }
    }

    pub fn sqrt(value: Expr) -> Expr {
        Expr::pow(value, Expr::Num(0.5))
    }

    pub fn call(func: Func, arg: Expr) -> Expr {
        if arg.is_zero() {
            return match func {
                Func::Sin | Func::Tan | Func::Sinh => Expr::zero(),
                Func::Cos | Func::Cosh | Func::Exp => Expr::one(),
                Func::Ln => Expr::Call(func, Box::new(arg)),
            };
        }
        if func == Func::Ln && arg == Expr::one() {
            return Expr::zero();
        }
        match (func, &arg) {
            (Func::Exp, Expr::Call(Func::Ln, inner)) | (Func::Ln, Expr::Call(Func::Exp, inner)) => {
                return (**inner).clone();
            }
            _ => {}
        }
        if arg.split_coefficient().0 < 0.0 {
            let flipped = -arg.clone();
            if func.is_even() {
                return Expr::call(func, flipped);
            }
            if func.is_odd() {
                return -Expr::call(func, flipped);
            }
        }
        Expr::Call(func, Box::new(arg))
    }

    pub fn sin(arg: Expr) -> Expr {
        Expr::call(Func::Sin, arg)
    }

    pub fn cos(arg: Expr) -> Expr {
        Expr::call(Func::Cos, arg)
    }

    pub fn exp(arg: Expr) -> Expr {
        Expr::call(Func::Exp, arg)
    }

    pub fn sinh(arg: Expr) -> Expr {
        Expr::call(Func::Sinh, arg)
    }

    pub fn cosh(arg: Expr) -> Expr {
        Expr::call(Func::Cosh, arg)
    }

    /// `coeff * rest`, canonicalized.
    pub fn scaled(coeff: f64, rest: Expr) -> Expr {
        Expr::mul_all(vec![Expr::Num(coeff), rest])
    }

    /// Splits a term into its numeric coefficient and the remaining factors.
    pub fn split_coefficient(&self) -> (f64, Expr) {
        match self {
            Expr::Num(value) => (*value, Expr::one()),
            Expr::Mul(factors) => match factors.first() {
                Some(Expr::Num(coeff)) => {
                    let rest = &factors[1..];
                    let rest = if rest.len() == 1 {
                        rest[0].clone()
                    } else {
                        Expr::Mul(rest.to_vec())
                    };
                    (*coeff, rest)
                }
                _ => (1.0, self.clone()),
            },
            _ => (1.0, self.clone()),
        }
    }

    fn split_power(&self) -> (Expr, Expr) {
        match self {
            Expr::Pow(base, exponent) => ((**base).clone(), (**exponent).clone()),
            _ => (self.clone(), Expr::one()),
        }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Expr::Num(value) if *value == 0.0)
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Expr::Num(value) => Some(*value),
            _ => None,
        }
    }

    /// Terms of a sum, or the expression itself.
    pub fn terms(&self) -> Vec<Expr> {
        match self {
            Expr::Add(terms) => terms.clone(),
            _ => vec![self.clone()],
        }
    }

    /// Factors of a product, or the expression itself.
    pub fn factors(&self) -> Vec<Expr> {
        match self {
            Expr::Mul(factors) => factors.clone(),
            _ => vec![self.clone()],
        }
    }

    /// Rebuilds the expression bottom-up, replacing every node for which `f`
    /// returns a value. Replaced nodes are not visited further.
    pub fn map_nodes<F>(&self, f: &F) -> Expr
    where
        F: Fn(&Expr) -> Option<Expr>,
    {
        if let Some(replacement) = f(self) {
            return replacement;
        }
        match self {
            Expr::Num(_) | Expr::Sym(_) | Expr::Fun(_) | Expr::Deriv(_, _) => self.clone(),
            Expr::Add(terms) => Expr::add_all(terms.iter().map(|t| t.map_nodes(f)).collect()),
            Expr::Mul(factors) => Expr::mul_all(factors.iter().map(|x| x.map_nodes(f)).collect()),
            Expr::Pow(base, exponent) => Expr::pow(base.map_nodes(f), exponent.map_nodes(f)),
            Expr::Call(func, arg) => Expr::call(*func, arg.map_nodes(f)),
        }
    }

    /// Replaces symbols by expressions.
    pub fn subs(&self, bindings: &HashMap<String, Expr>) -> Expr {
        self.map_nodes(&|node| match node {
            Expr::Sym(name) => bindings.get(name).cloned(),
            _ => None,
        })
    }

    /// Replaces a single symbol.
    pub fn subs_one(&self, name: &str, value: &Expr) -> Expr {
        self.map_nodes(&|node| match node {
            Expr::Sym(symbol) if symbol == name => Some(value.clone()),
            _ => None,
        })
    }

    fn visit(&self, f: &mut impl FnMut(&Expr)) {
        f(self);
        match self {
            Expr::Add(items) | Expr::Mul(items) => items.iter().for_each(|item| item.visit(f)),
            Expr::Pow(base, exponent) => {
                base.visit(f);
                exponent.visit(f);
            }
            Expr::Call(_, arg) => arg.visit(f),
            _ => {}
        }
    }

    pub fn free_symbols(&self) -> BTreeSet<String> {
        let mut symbols = BTreeSet::new();
        self.visit(&mut |node| {
            if let Expr::Sym(name) = node {
                symbols.insert(name.clone());
            }
        });
        symbols
    }

    /// Names of the coordinate functions `q(t)` the expression depends on,
    /// directly or through derivatives.
    pub fn time_functions(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.visit(&mut |node| match node {
            Expr::Fun(name) | Expr::Deriv(name, _) => {
                names.insert(name.clone());
            }
            _ => {}
        });
        names
    }

    pub fn contains_symbol(&self, name: &str) -> bool {
        let mut found = false;
        self.visit(&mut |node| {
            if matches!(node, Expr::Sym(symbol) if symbol == name) {
                found = true;
            }
        });
        found
    }

    /// Whether the expression changes with time, explicitly or through coordinates.
    pub fn depends_on_time(&self) -> bool {
        self.contains_symbol(TIME) || !self.time_functions().is_empty()
    }

    /// Numeric value for the given symbol values. `t` is looked up like any other symbol.
    pub fn eval(&self, bindings: &HashMap<String, f64>) -> Result<f64, EvalError> {
        match self {
            Expr::Num(value) => Ok(*value),
            Expr::Sym(name) => bindings
                .get(name)
                .copied()
                .ok_or_else(|| EvalError::UnboundSymbol(name.clone())),
            Expr::Fun(name) | Expr::Deriv(name, _) => Err(EvalError::TimeFunction(name.clone())),
            Expr::Add(terms) => terms.iter().try_fold(0.0, |acc, t| Ok(acc + t.eval(bindings)?)),
            Expr::Mul(factors) => factors.iter().try_fold(1.0, |acc, x| Ok(acc * x.eval(bindings)?)),
            Expr::Pow(base, exponent) => Ok(base.eval(bindings)?.powf(exponent.eval(bindings)?)),
            Expr::Call(func, arg) => Ok(func.apply_f64(arg.eval(bindings)?)),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Expr::Num(_) => 0,
            Expr::Sym(_) => 1,
            Expr::Fun(_) => 2,
            Expr::Deriv(_, _) => 3,
            Expr::Call(_, _) => 4,
            Expr::Pow(_, _) => 5,
            Expr::Mul(_) => 6,
            Expr::Add(_) => 7,
        }
    }

    /// Total order used to sort operands of sums and products.
    pub fn canonical_cmp(&self, other: &Expr) -> Ordering {
        match (self, other) {
            (Expr::Num(a), Expr::Num(b)) => a.total_cmp(b),
            (Expr::Sym(a), Expr::Sym(b)) | (Expr::Fun(a), Expr::Fun(b)) => a.cmp(b),
            (Expr::Deriv(a, n), Expr::Deriv(b, m)) => a.cmp(b).then(n.cmp(m)),
            (Expr::Call(f, a), Expr::Call(g, b)) => f.cmp(g).then_with(|| a.canonical_cmp(b)),
            (Expr::Pow(a, x), Expr::Pow(b, y)) => a.canonical_cmp(b).then_with(|| x.canonical_cmp(y)),
            (Expr::Add(a), Expr::Add(b)) | (Expr::Mul(a), Expr::Mul(b)) => {
                for (left, right) in a.iter().zip(b.iter()) {
                    let ordering = left.canonical_cmp(right);
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Add(_) => PREC_ADD,
            Expr::Num(value) if *value < 0.0 => PREC_MUL,
            Expr::Mul(_) => PREC_MUL,
            Expr::Pow(_, exponent) if exponent.as_num().is_some_and(|e| e < 0.0) => PREC_MUL,
            Expr::Pow(_, exponent) if exponent.as_num() == Some(0.5) => PREC_ATOM,
            Expr::Pow(_, _) => PREC_POW,
            _ => PREC_ATOM,
        }
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

fn wrap(expr: &Expr, min_prec: u8) -> String {
    if expr.precedence() < min_prec {
        format!("({expr})")
    } else {
        expr.to_string()
    }
}

fn fmt_product(factors: &[Expr], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut coeff = 1.0;
    let mut numerator: Vec<&Expr> = Vec::new();
    let mut denominator: Vec<Expr> = Vec::new();
    for factor in factors {
        match factor {
            Expr::Num(value) => coeff *= value,
            Expr::Pow(base, exponent) if exponent.as_num().is_some_and(|e| e < 0.0) => {
                denominator.push(Expr::pow((**base).clone(), -(**exponent).clone()));
            }
            other => numerator.push(other),
        }
    }

    if coeff < 0.0 {
        f.write_str("-")?;
        coeff = -coeff;
    }
    let mut parts: Vec<String> = Vec::new();
    if coeff != 1.0 || numerator.is_empty() {
        parts.push(format_number(coeff));
    }
    parts.extend(numerator.iter().map(|factor| wrap(factor, PREC_MUL)));
    f.write_str(&parts.join("*"))?;

    match denominator.len() {
        0 => Ok(()),
        1 => write!(f, "/{}", wrap(&denominator[0], PREC_POW)),
        _ => {
            let joined: Vec<String> = denominator.iter().map(|d| wrap(d, PREC_MUL)).collect();
            write!(f, "/({})", joined.join("*"))
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Num(value) => f.write_str(&format_number(*value)),
            Expr::Sym(name) => f.write_str(name),
            Expr::Fun(name) => write!(f, "{name}({TIME})"),
            Expr::Deriv(name, 1) => write!(f, "diff({name}({TIME}), {TIME})"),
            Expr::Deriv(name, order) => write!(f, "diff({name}({TIME}), {TIME}, {order})"),
            Expr::Add(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    let (coeff, rest) = term.split_coefficient();
                    if i == 0 {
                        write!(f, "{term}")?;
                    } else if coeff < 0.0 {
                        write!(f, " - {}", Expr::scaled(-coeff, rest))?;
                    } else {
                        write!(f, " + {term}")?;
                    }
                }
                Ok(())
            }
            Expr::Mul(factors) => fmt_product(factors, f),
            Expr::Pow(base, exponent) => match exponent.as_num() {
                Some(e) if e == 0.5 => write!(f, "sqrt({base})"),
                Some(e) if e < 0.0 => {
                    let inverse = Expr::pow((**base).clone(), Expr::Num(-e));
                    write!(f, "1/{}", wrap(&inverse, PREC_POW))
                }
                _ => write!(f, "{}^{}", wrap(base, PREC_ATOM), wrap(exponent, PREC_ATOM)),
            },
            Expr::Call(func, arg) => write!(f, "{}({arg})", func.name()),
        }
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Num(value)
    }
}

impl From<i32> for Expr {
    fn from(value: i32) -> Self {
        Expr::Num(f64::from(value))
    }
}

impl From<&str> for Expr {
    fn from(name: &str) -> Self {
        Expr::Sym(name.to_string())
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $build:expr) => {
        impl $trait for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                ($build)(self, rhs)
            }
        }

        impl $trait<&Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                ($build)(self.clone(), rhs.clone())
            }
        }

        impl $trait<&Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                ($build)(self, rhs.clone())
            }
        }

        impl $trait<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                ($build)(self, Expr::Num(rhs))
            }
        }

        impl $trait<f64> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                ($build)(self.clone(), Expr::Num(rhs))
            }
        }

        impl $trait<Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                ($build)(Expr::Num(self), rhs)
            }
        }
    };
}

impl_binary_op!(Add, add, |a: Expr, b: Expr| Expr::add_all(vec![a, b]));
impl_binary_op!(Sub, sub, |a: Expr, b: Expr| Expr::add_all(vec![a, Expr::scaled(-1.0, b)]));
impl_binary_op!(Mul, mul, |a: Expr, b: Expr| Expr::mul_all(vec![a, b]));
impl_binary_op!(Div, div, |a: Expr, b: Expr| Expr::mul_all(vec![a, Expr::pow(b, Expr::Num(-1.0))]));

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::scaled(-1.0, self)
    }
}

impl Neg for &Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::scaled(-1.0, self.clone())
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct ExprVisitor;

impl<'de> Visitor<'de> for ExprVisitor {
    type Value = Expr;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a number or an expression string")
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Expr, E> {
        Ok(Expr::Num(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Expr, E> {
        Ok(Expr::Num(value as f64))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Expr, E> {
        Ok(Expr::Num(value as f64))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Expr, E> {
        crate::equation_engine::parse(value).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Expr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Expr, D::Error> {
        deserializer.deserialize_any(ExprVisitor)
    }
}

/// `lhs == rhs`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Equation {
    pub lhs: Expr,
    pub rhs: Expr,
}

impl Equation {
    pub fn new(lhs: Expr, rhs: Expr) -> Self {
        Self { lhs, rhs }
    }

    /// `lhs - rhs`, zero on solutions.
    pub fn residual(&self) -> Expr {
        &self.lhs - &self.rhs
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} == {}", self.lhs, self.rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::sym("x")
    }

    #[test]
    fn sums_collect_like_terms_and_fold_constants() {
        let expr = x() + 2.0 * x() + Expr::num(3.0) - Expr::num(1.0);
        assert_eq!(expr, Expr::add_all(vec![3.0 * x(), Expr::num(2.0)]));
        assert_eq!((x() - x()), Expr::zero());
    }

    #[test]
    fn products_collect_like_bases() {
        let expr = x() * x() * Expr::pow(x(), Expr::num(-2.0));
        assert_eq!(expr, Expr::one());
        let squared = x() * x();
        assert_eq!(squared, Expr::pow(x(), Expr::num(2.0)));
        assert!((Expr::num(0.0) * x()).is_zero());
    }

    #[test]
    fn numeric_powers_fold_only_when_exact() {
        assert_eq!(Expr::sqrt(Expr::num(4.0)), Expr::num(2.0));
        assert!(matches!(Expr::sqrt(Expr::num(2.0)), Expr::Pow(_, _)));
        assert_eq!(Expr::sqrt(Expr::num(2.0)) * Expr::sqrt(Expr::num(2.0)), Expr::num(2.0));
    }

    #[test]
    fn special_function_values_fold() {
        assert_eq!(Expr::sin(Expr::zero()), Expr::zero());
        assert_eq!(Expr::cos(Expr::zero()), Expr::one());
        assert_eq!(Expr::exp(Expr::zero()), Expr::one());
        assert_eq!(Expr::cos(-x()), Expr::cos(x()));
        assert_eq!(Expr::sin(-x()), -Expr::sin(x()));
    }

    #[test]
    fn display_is_readable() {
        let k = Expr::sym("k");
        let m = Expr::sym("m");
        let expr = -(k.clone() * Expr::fun("x__body")) / m.clone();
        assert_eq!(expr.to_string(), "-k*x__body(t)/m");

        let expr = Expr::sym("b") - Expr::sym("a");
        assert_eq!(expr.to_string(), "b - a");

        let expr = m * Expr::deriv("x", 2);
        assert_eq!(expr.to_string(), "m*diff(x(t), t, 2)");

        assert_eq!(Expr::sqrt(k).to_string(), "sqrt(k)");
    }

    #[test]
    fn subs_and_eval_agree() {
        let expr = Expr::sym("a") * Expr::time() + Expr::sin(Expr::time());
        let bindings = HashMap::from([("a".to_string(), 2.0), (TIME.to_string(), 0.5)]);
        let value = expr.eval(&bindings).expect("all symbols are bound");
        assert!((value - (1.0 + 0.5_f64.sin())).abs() < 1e-12);

        let replaced = expr.subs_one("a", &Expr::num(2.0));
        assert_eq!(replaced.free_symbols(), BTreeSet::from([TIME.to_string()]));
    }

    #[test]
    fn eval_reports_unbound_symbols() {
        let err = Expr::sym("k").eval(&HashMap::new()).expect_err("k is unbound");
        assert!(err.to_string().contains("k"));
        let err = Expr::fun("x").eval(&HashMap::new()).expect_err("x(t) cannot be evaluated");
        assert!(err.to_string().contains("x"));
    }

    #[test]
    fn expressions_serialize_as_strings() {
        let expr = Expr::sym("g") * Expr::sym("m");
        let json = serde_json::to_string(&expr).expect("serialize");
        assert_eq!(json, "\"g*m\"");
        let back: Expr = serde_json::from_str("\"g*m\"").expect("deserialize");
        assert_eq!(back, expr);
        let number: Expr = serde_json::from_str("-9.81").expect("deserialize number");
        assert_eq!(number, Expr::num(-9.81));
    }

    #[test]
    fn equations_serialize_sides_in_display_form() {
        let equation = Equation::new(Expr::sym("m") * Expr::deriv("x", 2), -(Expr::sym("k") * Expr::fun("x")));
        let json = serde_json::to_value(&equation).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({"lhs": "m*diff(x(t), t, 2)", "rhs": "-k*x(t)"})
        );
    }
}
