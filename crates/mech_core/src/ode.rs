//! Closed-form solutions of the equations of motion.
//!
//! Every equation is brought to the normalized form
//!
//! ```text
//! q'' + p q' + c q = g(t)
//! ```
//!
//! with `p` and `c` constant in time and `g` a polynomial in `t`. The
//! homogeneous solution is picked from the sign of `c` (no damping) or of the
//! discriminant `p^2/4 - c` under the current [`Assumptions`]; the particular
//! solution is found by undetermined coefficients.

use crate::error::{ModelError, SolveError};
use crate::symbolic::{Assumptions, Equation, Expr, Sign, TIME};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Names of the free constants of a general solution.
pub const FREE_CONSTANTS: [&str; 2] = ["_K1", "_K2"];

/// Position and velocity of one coordinate at time `t0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialCondition {
    pub t0: Expr,
    pub position: Expr,
    pub velocity: Expr,
}

impl InitialCondition {
    pub fn new(t0: impl Into<Expr>, position: impl Into<Expr>, velocity: impl Into<Expr>) -> Self {
        Self {
            t0: t0.into(),
            position: position.into(),
            velocity: velocity.into(),
        }
    }
}

/// The equation of motion of one coordinate of a particle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinateEquation {
    /// Coordinate name in the space (`x`, `r`, ...).
    pub coordinate: String,
    /// Name of the coordinate function `q(t)` solved for.
    pub function: String,
    pub equation: Equation,
}

/// Equations per particle label, one per coordinate.
pub type Equations = BTreeMap<String, Vec<CoordinateEquation>>;
/// Solutions per particle label, in coordinate order.
pub type Solutions = BTreeMap<String, Vec<Expr>>;
/// Initial conditions per particle label, in coordinate order.
pub type InitialConditions = BTreeMap<String, Vec<InitialCondition>>;

struct Normalized {
    p: Expr,
    c: Expr,
    forcing: Vec<Expr>,
}

fn normalize(equation: &Equation, function: &str) -> Result<Normalized, SolveError> {
    let form = equation
        .residual()
        .linear_form(function)
        .map_err(|reason| SolveError::NotLinear {
            function: function.to_string(),
            reason: reason.to_string(),
        })?;

    if form.acceleration.is_zero() {
        return Err(SolveError::Degenerate {
            function: function.to_string(),
        });
    }
    for coefficient in [&form.acceleration, &form.velocity, &form.position] {
        if coefficient.depends_on_time() {
            return Err(SolveError::TimeDependentCoefficient {
                function: function.to_string(),
                coefficient: coefficient.to_string(),
            });
        }
    }

    let leading = &form.acceleration;
    let g = -(&form.forcing / leading);
    let forcing = g.time_polynomial().map_err(|term| SolveError::UnsupportedForcing {
        function: function.to_string(),
        term: term.to_string(),
    })?;

    Ok(Normalized {
        p: (&form.velocity / leading).expand(),
        c: (&form.position / leading).expand(),
        forcing,
    })
}

/// Shape of the homogeneous solution.
#[derive(Debug, Clone, PartialEq)]
enum Homogeneous {
    /// `q'' = 0`.
    Free,
    /// `q'' + omega^2 q = 0`.
    Oscillatory { omega: Expr },
    /// `q'' - kappa^2 q = 0`.
    Hyperbolic { kappa: Expr },
    /// `q'' + p q' = 0`.
    Damped { p: Expr },
    /// Distinct real roots `sigma +- mu`.
    Overdamped { sigma: Expr, mu: Expr },
    /// Complex roots `sigma +- i nu`.
    Underdamped { sigma: Expr, nu: Expr },
    /// Double root `sigma`.
    Critical { sigma: Expr },
}

fn undecidable(function: &str, expr: &Expr) -> SolveError {
    SolveError::UndecidableSign {
        function: function.to_string(),
        expr: expr.to_string(),
    }
}

fn classify(p: &Expr, c: &Expr, assumptions: &Assumptions, function: &str) -> Result<Homogeneous, SolveError> {
    match (p.is_zero(), c.is_zero()) {
        (true, true) => Ok(Homogeneous::Free),
        (true, false) => match assumptions.sign(c) {
            Some(Sign::Positive) => Ok(Homogeneous::Oscillatory {
                omega: Expr::sqrt(c.clone()),
            }),
            Some(Sign::Negative) => Ok(Homogeneous::Hyperbolic {
                kappa: Expr::sqrt(-c),
            }),
            Some(Sign::Zero) => Ok(Homogeneous::Free),
            None => Err(undecidable(function, c)),
        },
        (false, true) => Ok(Homogeneous::Damped { p: p.clone() }),
        (false, false) => {
            let sigma = Expr::scaled(-0.5, p.clone());
            let delta = (Expr::pow(p.clone(), Expr::num(2.0)) / 4.0 - c.clone()).expand();
            // p^2/4 >= 0, so a negative c settles the discriminant.
            let sign = match assumptions.sign(c) {
                Some(Sign::Negative) => Some(Sign::Positive),
                _ => assumptions.sign(&delta),
            };
            match sign {
                Some(Sign::Positive) => Ok(Homogeneous::Overdamped {
                    sigma,
                    mu: Expr::sqrt(delta),
                }),
                Some(Sign::Negative) => Ok(Homogeneous::Underdamped {
                    sigma,
                    nu: Expr::sqrt(-delta),
                }),
                Some(Sign::Zero) => Ok(Homogeneous::Critical { sigma }),
                None => Err(undecidable(function, &delta)),
            }
        }
    }
}

impl Homogeneous {
    /// Basis multiplied by the free constants `_K1`, `_K2`.
    fn general_basis(&self, t: &Expr) -> [Expr; 2] {
        match self {
            Homogeneous::Free => [Expr::one(), t.clone()],
            Homogeneous::Oscillatory { omega } => [Expr::sin(omega * t), Expr::cos(omega * t)],
            Homogeneous::Hyperbolic { kappa } => [Expr::exp(kappa * t), Expr::exp(-(kappa * t))],
            Homogeneous::Damped { p } => [Expr::one(), Expr::exp(-(p * t))],
            Homogeneous::Overdamped { sigma, mu } => [
                Expr::exp((sigma + mu) * t.clone()),
                Expr::exp((sigma - mu) * t.clone()),
            ],
            Homogeneous::Underdamped { sigma, nu } => {
                let decay = Expr::exp(sigma * t);
                [&decay * &Expr::sin(nu * t), decay * Expr::cos(nu * t)]
            }
            Homogeneous::Critical { sigma } => {
                let decay = Expr::exp(sigma * t);
                [decay.clone(), t * &decay]
            }
        }
    }

    /// Basis with `phi1(0) = 1, phi1'(0) = 0` and `phi2(0) = 0, phi2'(0) = 1`,
    /// in the shifted time `tau`.
    fn fundamental_basis(&self, tau: &Expr) -> [Expr; 2] {
        match self {
            Homogeneous::Free => [Expr::one(), tau.clone()],
            Homogeneous::Oscillatory { omega } => {
                [Expr::cos(omega * tau), Expr::sin(omega * tau) / omega.clone()]
            }
            Homogeneous::Hyperbolic { kappa } => {
                [Expr::cosh(kappa * tau), Expr::sinh(kappa * tau) / kappa.clone()]
            }
            Homogeneous::Damped { p } => [
                Expr::one(),
                (Expr::one() - Expr::exp(-(p * tau))) / p.clone(),
            ],
            Homogeneous::Overdamped { sigma, mu } => {
                let decay = Expr::exp(sigma * tau);
                let sinh = Expr::sinh(mu * tau);
                [
                    &decay * &(Expr::cosh(mu * tau) - sigma / mu * sinh.clone()),
                    decay * sinh / mu.clone(),
                ]
            }
            Homogeneous::Underdamped { sigma, nu } => {
                let decay = Expr::exp(sigma * tau);
                let sin = Expr::sin(nu * tau);
                [
                    &decay * &(Expr::cos(nu * tau) - sigma / nu * sin.clone()),
                    decay * sin / nu.clone(),
                ]
            }
            Homogeneous::Critical { sigma } => {
                let decay = Expr::exp(sigma * tau);
                [&decay * &(Expr::one() - sigma * tau), tau * &decay]
            }
        }
    }
}

/// Polynomial particular solution of `q'' + p q' + c q = sum g_i t^i`.
fn particular(p: &Expr, c: &Expr, forcing: &[Expr], t: &Expr) -> Expr {
    let power = |n: usize| Expr::pow(t.clone(), Expr::num(n as f64));
    let degree = forcing.len();

    if !c.is_zero() {
        let mut a = vec![Expr::zero(); degree + 2];
        for i in (0..degree).rev() {
            let rest = p * &a[i + 1] * ((i + 1) as f64) + &a[i + 2] * (((i + 2) * (i + 1)) as f64);
            a[i] = ((&forcing[i] - &rest) / c.clone()).expand();
        }
        return Expr::add_all((0..degree).map(|i| &a[i] * &power(i)).collect());
    }

    if !p.is_zero() {
        // The velocity solves y' + p y = g; integrate it once.
        let mut b = vec![Expr::zero(); degree + 1];
        for i in (0..degree).rev() {
            let rest = &b[i + 1] * ((i + 1) as f64);
            b[i] = ((&forcing[i] - &rest) / p.clone()).expand();
        }
        return Expr::add_all(
            (0..degree)
                .map(|i| &b[i] * &power(i + 1) / ((i + 1) as f64))
                .collect(),
        );
    }

    Expr::add_all(
        forcing
            .iter()
            .enumerate()
            .map(|(i, g)| g * &power(i + 2) / (((i + 1) * (i + 2)) as f64))
            .collect(),
    )
}

/// Solves `equation` for the coordinate function `function`.
///
/// Without initial conditions the result contains the free constants
/// [`FREE_CONSTANTS`].
pub fn solve_equation(
    equation: &Equation,
    function: &str,
    assumptions: &Assumptions,
    initial: Option<&InitialCondition>,
) -> Result<Expr, SolveError> {
    let Normalized { p, c, forcing } = normalize(equation, function)?;
    let homogeneous = classify(&p, &c, assumptions, function)?;
    let t = Expr::time();
    let xp = particular(&p, &c, &forcing, &t);
    debug!(function, ?homogeneous, "solving equation of motion");

    let solution = match initial {
        None => {
            let [phi1, phi2] = homogeneous.general_basis(&t);
            Expr::sym(FREE_CONSTANTS[0]) * phi1 + Expr::sym(FREE_CONSTANTS[1]) * phi2 + xp
        }
        Some(initial) => {
            let tau = &t - &initial.t0;
            let [phi1, phi2] = homogeneous.fundamental_basis(&tau);
            let c1 = &initial.position - &xp.subs_one(TIME, &initial.t0);
            let c2 = &initial.velocity - &xp.diff(TIME).subs_one(TIME, &initial.t0);
            c1 * phi1 + c2 * phi2 + xp
        }
    };
    Ok(solution)
}

/// Solves every equation, optionally with initial conditions per particle.
pub fn solve_equations(
    equations: &Equations,
    assumptions: &Assumptions,
    initial_conditions: Option<&InitialConditions>,
) -> Result<Solutions, ModelError> {
    if let Some(initial_conditions) = initial_conditions {
        if let Some(label) = initial_conditions.keys().find(|label| !equations.contains_key(*label)) {
            return Err(ModelError::UnknownParticle(label.clone()));
        }
    }

    let mut solutions = Solutions::new();
    for (label, particle_equations) in equations {
        let initial = match initial_conditions {
            None => None,
            Some(initial_conditions) => {
                let entries = initial_conditions.get(label).map_or(&[][..], Vec::as_slice);
                if entries.len() != particle_equations.len() {
                    return Err(SolveError::InitialConditionsLength {
                        label: label.clone(),
                        expected: particle_equations.len(),
                        got: entries.len(),
                    }
                    .into());
                }
                Some(entries)
            }
        };

        let mut particle_solutions = Vec::with_capacity(particle_equations.len());
        for (i, equation) in particle_equations.iter().enumerate() {
            let condition = initial.map(|entries| &entries[i]);
            particle_solutions.push(solve_equation(
                &equation.equation,
                &equation.function,
                assumptions,
                condition,
            )?);
        }
        solutions.insert(label.clone(), particle_solutions);
    }
    Ok(solutions)
}

/// Replaces `function(t)` and its derivatives in `expr` by `solution` and
/// its time derivatives.
pub fn substitute_function(expr: &Expr, function: &str, solution: &Expr) -> Expr {
    expr.map_nodes(&|node| match node {
        Expr::Fun(name) if name == function => Some(solution.clone()),
        Expr::Deriv(name, order) if name == function => {
            Some((0..*order).fold(solution.clone(), |acc, _| acc.diff(TIME)))
        }
        _ => None,
    })
}
