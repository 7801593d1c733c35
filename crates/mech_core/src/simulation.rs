//! Numerical integration of assembled equations of motion.

use crate::equation_engine::{Compiler, MotionSystem};
use crate::ode::Equations;
use crate::solvers::StepperKind;
use crate::symbolic::{Expr, TIME};
use crate::traits::{DynamicalSystem, Steppable};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Placeholder standing for `q''` while an equation is solved for it.
const ACCELERATION: &str = "__acceleration";

/// Upper bound on the number of integration steps of one run.
pub const MAX_STEPS: usize = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateEntry {
    pub position: f64,
    pub velocity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericalSettings {
    #[serde(default)]
    pub stepper: StepperKind,
    #[serde(default)]
    pub t0: f64,
    pub t_end: f64,
    pub dt: f64,
    /// Values of every free symbol of the equations.
    #[serde(default)]
    pub parameters: BTreeMap<String, f64>,
    /// Initial position and velocity per particle, in coordinate order.
    pub initial_state: BTreeMap<String, Vec<StateEntry>>,
}

/// Sampled solution; `positions[i]` and `velocities[i]` hold the state of
/// every coordinate function at `times[i]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    pub functions: Vec<String>,
    pub times: Vec<f64>,
    pub positions: Vec<Vec<f64>>,
    pub velocities: Vec<Vec<f64>>,
}

impl Trajectory {
    /// Positions and velocities of one coordinate function over time.
    pub fn series(&self, function: &str) -> Option<(Vec<f64>, Vec<f64>)> {
        let idx = self.functions.iter().position(|name| name == function)?;
        let positions = self.positions.iter().map(|row| row[idx]).collect();
        let velocities = self.velocities.iter().map(|row| row[idx]).collect();
        Some((positions, velocities))
    }
}

/// Solves `residual = 0` for the second derivative of `function`.
fn acceleration(residual: &Expr, function: &str) -> Result<Expr> {
    let marked = residual.map_nodes(&|node| match node {
        Expr::Deriv(name, 2) if name == function => Some(Expr::sym(ACCELERATION)),
        _ => None,
    });
    let scale = marked.diff(ACCELERATION);
    if scale.contains_symbol(ACCELERATION) {
        bail!("Equation for `{function}` is not linear in its second derivative");
    }
    if scale.is_zero() {
        bail!("Equation for `{function}` does not contain its second derivative");
    }
    let rest = marked.subs_one(ACCELERATION, &Expr::zero());
    Ok(-(rest / scale))
}

fn check_settings(settings: &NumericalSettings) -> Result<()> {
    if !(settings.dt.is_finite() && settings.dt > 0.0) {
        bail!("Time step must be positive and finite, got {}", settings.dt);
    }
    if !(settings.t_end.is_finite() && settings.t0.is_finite()) || settings.t_end <= settings.t0 {
        bail!(
            "End time must be greater than the start time, got t0 = {} and t_end = {}",
            settings.t0,
            settings.t_end
        );
    }
    Ok(())
}

/// Number of steps needed to cover `[t0, t_end]`, the last one possibly shorter.
fn step_count(settings: &NumericalSettings) -> Result<usize> {
    let span = settings.t_end - settings.t0;
    let steps = ((span / settings.dt) - 1e-9).ceil().max(1.0);
    if !steps.is_finite() || steps > MAX_STEPS as f64 {
        bail!(
            "Integration from t0 = {} to t_end = {} with dt = {} needs {steps:e} steps, more than the limit of {MAX_STEPS}",
            settings.t0,
            settings.t_end,
            settings.dt
        );
    }
    Ok(steps as usize)
}

/// Integrates `equations` from `settings.t0` to `settings.t_end`.
pub fn integrate(equations: &Equations, settings: &NumericalSettings) -> Result<Trajectory> {
    check_settings(settings)?;
    let steps = step_count(settings)?;

    let mut functions = Vec::new();
    let mut accelerations = Vec::new();
    let mut positions = Vec::new();
    let mut velocities = Vec::new();
    for (label, particle_equations) in equations {
        let state = settings
            .initial_state
            .get(label)
            .with_context(|| format!("Missing initial state of particle `{label}`"))?;
        if state.len() != particle_equations.len() {
            bail!(
                "Initial state of particle `{label}` should have {} entries, got {}",
                particle_equations.len(),
                state.len()
            );
        }
        for (equation, entry) in particle_equations.iter().zip(state) {
            accelerations.push(acceleration(&equation.equation.residual(), &equation.function)?);
            functions.push(equation.function.clone());
            positions.push(entry.position);
            velocities.push(entry.velocity);
        }
    }

    let symbols: BTreeSet<String> = accelerations
        .iter()
        .flat_map(Expr::free_symbols)
        .filter(|name| name != TIME)
        .collect();
    let mut param_names = Vec::with_capacity(symbols.len());
    let mut param_values = Vec::with_capacity(symbols.len());
    for name in symbols {
        let value = settings
            .parameters
            .get(&name)
            .with_context(|| format!("Missing value for parameter `{name}`"))?;
        param_values.push(*value);
        param_names.push(name);
    }

    let compiler = Compiler::new(&functions, &param_names);
    let mut bytecodes = Vec::with_capacity(accelerations.len());
    for (function, expr) in functions.iter().zip(&accelerations) {
        debug!(function = %function, acceleration = %expr, "compiling acceleration");
        let code = compiler
            .compile(expr)
            .with_context(|| format!("Failed to compile the acceleration of `{function}`"))?;
        bytecodes.push(code);
    }

    let system = MotionSystem::new(bytecodes, param_values);
    let n = functions.len();
    let mut state: Vec<f64> = positions.into_iter().chain(velocities).collect();
    let mut stepper = settings.stepper.build::<f64>(system.dimension());

    info!(
        coordinates = n,
        steps,
        stepper = stepper.name(),
        "Integrating equations of motion"
    );

    let mut trajectory = Trajectory {
        functions,
        times: Vec::new(),
        positions: Vec::new(),
        velocities: Vec::new(),
    };
    let mut record = |t: f64, state: &[f64]| {
        trajectory.times.push(t);
        trajectory.positions.push(state[..n].to_vec());
        trajectory.velocities.push(state[n..].to_vec());
    };

    let mut t = settings.t0;
    record(t, &state);
    for i in 0..steps {
        let dt = if i + 1 == steps {
            settings.t_end - t
        } else {
            settings.dt
        };
        stepper.step(&system, &mut t, &mut state, dt);
        if i + 1 == steps {
            t = settings.t_end;
        }
        if state.iter().any(|value| !value.is_finite()) {
            bail!("State became non-finite at t = {t}");
        }
        record(t, &state);
    }

    info!(samples = trajectory.times.len(), "Integration finished");
    Ok(trajectory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ode::CoordinateEquation;
    use crate::symbolic::Equation;
    use approx::assert_relative_eq;

    fn oscillator() -> Equations {
        // m x'' = -k x
        let equation = Equation::new(
            Expr::sym("m") * Expr::deriv("x__body", 2),
            -(Expr::sym("k") * Expr::fun("x__body")),
        );
        Equations::from([(
            "body".to_string(),
            vec![CoordinateEquation {
                coordinate: "x".to_string(),
                function: "x__body".to_string(),
                equation,
            }],
        )])
    }

    fn settings() -> NumericalSettings {
        NumericalSettings {
            stepper: StepperKind::Rk4,
            t0: 0.0,
            t_end: 1.0,
            dt: 0.01,
            parameters: BTreeMap::from([("k".to_string(), 4.0), ("m".to_string(), 1.0)]),
            initial_state: BTreeMap::from([(
                "body".to_string(),
                vec![StateEntry {
                    position: 1.0,
                    velocity: 0.0,
                }],
            )]),
        }
    }

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        match result {
            Ok(value) => panic!("expected error, got {value:?}"),
            Err(err) => {
                let message = format!("{err:#}");
                assert!(
                    message.contains(needle),
                    "expected error to contain \"{needle}\", got \"{message}\""
                );
            }
        }
    }

    #[test]
    fn acceleration_is_isolated_from_the_equation() {
        let residual = Expr::sym("m") * Expr::fun("r") * Expr::deriv("r", 2) + Expr::sym("k");
        let accel = acceleration(&residual, "r").expect("linear in r''");
        assert_eq!(accel, -(Expr::sym("k") / (Expr::sym("m") * Expr::fun("r"))));
    }

    #[test]
    fn oscillator_matches_closed_form() {
        let trajectory = integrate(&oscillator(), &settings()).expect("integrates");
        assert_eq!(trajectory.times.len(), 101);
        assert_relative_eq!(*trajectory.times.last().expect("samples"), 1.0);

        let (positions, velocities) = trajectory.series("x__body").expect("known function");
        for (i, t) in trajectory.times.iter().enumerate() {
            assert_relative_eq!(positions[i], (2.0 * t).cos(), epsilon = 1e-7);
            assert_relative_eq!(velocities[i], -2.0 * (2.0 * t).sin(), epsilon = 1e-7);
        }
        assert!(trajectory.series("y__body").is_none());
    }

    #[test]
    fn last_step_lands_on_end_time() {
        let mut settings = settings();
        settings.t_end = 0.105;
        settings.dt = 0.02;
        let trajectory = integrate(&oscillator(), &settings).expect("integrates");
        assert_eq!(trajectory.times.len(), 7);
        assert_eq!(*trajectory.times.last().expect("samples"), 0.105);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut bad = settings();
        bad.dt = 0.0;
        assert_err_contains(integrate(&oscillator(), &bad), "Time step must be positive");

        let mut bad = settings();
        bad.t_end = -1.0;
        assert_err_contains(integrate(&oscillator(), &bad), "End time must be greater");

        let mut bad = settings();
        bad.parameters.remove("k");
        assert_err_contains(integrate(&oscillator(), &bad), "Missing value for parameter `k`");

        let mut bad = settings();
        bad.initial_state.clear();
        assert_err_contains(integrate(&oscillator(), &bad), "Missing initial state of particle `body`");
    }

    #[test]
    fn too_many_steps_are_rejected() {
        let mut bad = settings();
        bad.t_end = 1e12;
        bad.dt = 1e-6;
        assert_err_contains(integrate(&oscillator(), &bad), "more than the limit of 10000000");

        let mut bad = settings();
        bad.t0 = -f64::MAX;
        bad.t_end = f64::MAX;
        assert_err_contains(integrate(&oscillator(), &bad), "more than the limit");
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let json = r#"{
            "t_end": 2.0,
            "dt": 0.1,
            "initial_state": {"body": [{"position": 1.0, "velocity": 0.0}]}
        }"#;
        let settings: NumericalSettings = serde_json::from_str(json).expect("valid settings");
        assert_eq!(settings.stepper, StepperKind::Tsit5);
        assert_eq!(settings.t0, 0.0);
        assert!(settings.parameters.is_empty());
    }
}
