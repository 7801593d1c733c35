//! Classical mechanics systems of point particles.
//!
//! A [`ClassicalMechanicsSystem`] combines particles, forces and potentials
//! between particles, forces and potentials from the environment, and a
//! Euclidean space. `analyze` turns them into one equation of motion
//! `m * a_q == F_q` per particle and coordinate; `solve` and `simulate` work
//! from those equations.
//!
//! Users write forces and potentials with plain coordinate symbols
//! (`x__body`, `v_x__body`); the equations use the coordinate functions
//! `x__body(t)` and their time derivatives instead.

use crate::base::{
    check_elements, check_elements_interactions, check_environment_interactions, check_space,
    interactions_of, parameter_symbol, Component, ElementsInteraction, EnvironmentInteraction,
    Interaction, SystemSummary,
};
use crate::error::ModelError;
use crate::ode::{self, CoordinateEquation, Equations, InitialConditions, Solutions};
use crate::simulation::{self, NumericalSettings, Trajectory};
use crate::spaces::EuclideanSpace;
use crate::symbolic::{Assumptions, Equation, Expr};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};

/// How coordinate, velocity and mass symbols are named for a particle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SymbolNaming {
    /// `x__body`, `v_x__body`, `m__body`.
    #[default]
    Component,
    /// `x_body`, `v_x_body`, `m_body`.
    Newtonian,
}

impl SymbolNaming {
    pub fn separator(self) -> &'static str {
        match self {
            SymbolNaming::Component => crate::base::LABEL_SEPARATOR,
            SymbolNaming::Newtonian => "_",
        }
    }

    pub fn coordinate(self, coordinate: &str, particle: &str) -> String {
        format!("{coordinate}{}{particle}", self.separator())
    }

    pub fn velocity(self, coordinate: &str, particle: &str) -> String {
        format!("v_{}", self.coordinate(coordinate, particle))
    }

    pub fn mass(self, particle: &str) -> String {
        format!("m{}{particle}", self.separator())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointParticle {
    pub label: String,
    /// Mass; symbolic when unset.
    #[serde(default)]
    pub m: Option<f64>,
}

impl PointParticle {
    pub fn new(label: impl Into<String>, m: Option<f64>) -> Self {
        Self {
            label: label.into(),
            m,
        }
    }

    fn check(&self) -> Result<(), ModelError> {
        match self.m {
            Some(m) if !(m.is_finite() && m > 0.0) => Err(ModelError::InvalidMass {
                label: self.label.clone(),
                value: m,
            }),
            _ => Ok(()),
        }
    }

    fn mass(&self, naming: SymbolNaming) -> Expr {
        match self.m {
            Some(m) => Expr::num(m),
            None => Expr::sym(naming.mass(&self.label)),
        }
    }
}

impl Component for PointParticle {
    fn label(&self) -> &str {
        &self.label
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalForce {
    pub label: String,
    pub element_1_label: String,
    pub element_2_label: String,
    /// Force on the first element, one component per coordinate.
    #[serde(rename = "F", default)]
    pub force: Option<Vec<Expr>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalPotential {
    pub label: String,
    pub element_1_label: String,
    pub element_2_label: String,
    #[serde(rename = "V", default)]
    pub potential: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalForce {
    pub label: String,
    pub element_label: String,
    #[serde(rename = "F", default)]
    pub force: Option<Vec<Expr>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalPotential {
    pub label: String,
    pub element_label: String,
    #[serde(rename = "V", default)]
    pub potential: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum InternalInteraction {
    Force(InternalForce),
    Potential(InternalPotential),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExternalInteraction {
    Force(ExternalForce),
    Potential(ExternalPotential),
}

impl Component for InternalInteraction {
    fn label(&self) -> &str {
        match self {
            InternalInteraction::Force(force) => &force.label,
            InternalInteraction::Potential(potential) => &potential.label,
        }
    }
}

impl ElementsInteraction for InternalInteraction {
    fn element_1_label(&self) -> &str {
        match self {
            InternalInteraction::Force(force) => &force.element_1_label,
            InternalInteraction::Potential(potential) => &potential.element_1_label,
        }
    }

    fn element_2_label(&self) -> &str {
        match self {
            InternalInteraction::Force(force) => &force.element_2_label,
            InternalInteraction::Potential(potential) => &potential.element_2_label,
        }
    }
}

impl Component for ExternalInteraction {
    fn label(&self) -> &str {
        match self {
            ExternalInteraction::Force(force) => &force.label,
            ExternalInteraction::Potential(potential) => &potential.label,
        }
    }
}

impl EnvironmentInteraction for ExternalInteraction {
    fn element_label(&self) -> &str {
        match self {
            ExternalInteraction::Force(force) => &force.element_label,
            ExternalInteraction::Potential(potential) => &potential.element_label,
        }
    }
}

/// Force vector of an interaction; unset components become `F{coord}__{labels}`.
fn force_vector(
    force: Option<&Vec<Expr>>,
    labels: &[&str],
    space: &EuclideanSpace,
) -> Result<Vec<Expr>, ModelError> {
    match force {
        Some(components) if components.len() != space.n_dim() => Err(ModelError::ForceDimension {
            label: labels[0].to_string(),
            expected: space.n_dim(),
            got: components.len(),
        }),
        Some(components) => Ok(components.clone()),
        None => Ok(space
            .coordinates()
            .iter()
            .map(|coordinate| Expr::sym(parameter_symbol(&format!("F{coordinate}"), labels)))
            .collect()),
    }
}

/// `-grad V` with respect to the coordinates of `particle`.
fn potential_force(
    potential: Option<&Expr>,
    labels: &[&str],
    particle: &str,
    space: &EuclideanSpace,
    naming: SymbolNaming,
) -> Vec<Expr> {
    let potential = match potential {
        Some(potential) => potential.clone(),
        None => {
            let symbol = parameter_symbol("V", labels);
            warn!(potential = %symbol, "Unset potential contributes no force");
            Expr::sym(symbol)
        }
    };
    let symbols: Vec<String> = space
        .coordinates()
        .iter()
        .map(|coordinate| naming.coordinate(coordinate, particle))
        .collect();
    space
        .gradient(&potential, &symbols)
        .into_iter()
        .map(|component| -component)
        .collect()
}

/// Closed-form results of the `DynamicEquations` method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicEquations {
    pub formulas: Equations,
    pub solutions: Solutions,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SimulationResults {
    pub dynamic_equations: Option<DynamicEquations>,
    pub trajectory: Option<Trajectory>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SimulationMethod {
    DynamicEquations {
        #[serde(default)]
        initial_conditions: Option<InitialConditions>,
    },
    Numerical(NumericalSettings),
}

impl Default for SimulationMethod {
    fn default() -> Self {
        SimulationMethod::DynamicEquations {
            initial_conditions: None,
        }
    }
}

/// Classical mechanics system of point particles.
#[derive(Debug, Clone, Default)]
pub struct ClassicalMechanicsSystem {
    pub particles: Vec<PointParticle>,
    pub internal_interactions: Vec<InternalInteraction>,
    pub external_interactions: Vec<ExternalInteraction>,
    pub space: Option<EuclideanSpace>,
    naming: SymbolNaming,
    assumptions: Assumptions,
    equations: Option<Equations>,
    results: SimulationResults,
}

impl ClassicalMechanicsSystem {
    pub fn new(
        particles: Vec<PointParticle>,
        internal_interactions: Vec<InternalInteraction>,
        external_interactions: Vec<ExternalInteraction>,
        space: Option<EuclideanSpace>,
    ) -> Self {
        Self {
            particles,
            internal_interactions,
            external_interactions,
            space,
            ..Self::default()
        }
    }

    pub fn with_naming(mut self, naming: SymbolNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn naming(&self) -> SymbolNaming {
        self.naming
    }

    /// Declares `symbol` strictly positive for the solver.
    pub fn assume_positive(&mut self, symbol: impl Into<String>) -> &mut Self {
        self.assumptions.assume_positive(symbol);
        self
    }

    pub fn assumptions(&self) -> &Assumptions {
        &self.assumptions
    }

    /// Equations derived by the last `analyze`.
    pub fn equations(&self) -> Option<&Equations> {
        self.equations.as_ref()
    }

    pub fn results(&self) -> &SimulationResults {
        &self.results
    }

    fn validate(&self) -> Result<&EuclideanSpace, ModelError> {
        check_elements(&self.particles)?;
        for particle in &self.particles {
            particle.check()?;
        }
        check_elements_interactions(&self.particles, &self.internal_interactions)?;
        check_environment_interactions(&self.particles, &self.external_interactions)?;
        check_space(self.space.as_ref())
    }

    /// Coordinate and velocity symbols of every particle, mapped to the
    /// coordinate functions of time.
    fn time_bindings(&self, space: &EuclideanSpace) -> HashMap<String, Expr> {
        let mut bindings = HashMap::new();
        for particle in &self.particles {
            for coordinate in space.coordinates() {
                let function = self.naming.coordinate(coordinate, &particle.label);
                bindings.insert(
                    self.naming.velocity(coordinate, &particle.label),
                    Expr::deriv(function.as_str(), 1),
                );
                bindings.insert(function.clone(), Expr::fun(function));
            }
        }
        bindings
    }

    /// Total force on `particle`, one component per coordinate.
    fn total_force(&self, particle: &str, space: &EuclideanSpace) -> Result<Vec<Expr>, ModelError> {
        let mut total = vec![Expr::zero(); space.n_dim()];
        let mut add = |components: Vec<Expr>| {
            for (sum, component) in total.iter_mut().zip(components) {
                *sum = &*sum + &component;
            }
        };

        for interaction in interactions_of(particle, &self.internal_interactions, &self.external_interactions) {
            match interaction {
                Interaction::Elements(InternalInteraction::Force(force)) => {
                    let labels = [
                        force.label.as_str(),
                        force.element_1_label.as_str(),
                        force.element_2_label.as_str(),
                    ];
                    add(force_vector(force.force.as_ref(), &labels, space)?);
                }
                Interaction::Elements(InternalInteraction::Potential(potential)) => {
                    let labels = [
                        potential.label.as_str(),
                        potential.element_1_label.as_str(),
                        potential.element_2_label.as_str(),
                    ];
                    add(potential_force(potential.potential.as_ref(), &labels, particle, space, self.naming));
                }
                Interaction::Environment(ExternalInteraction::Force(force)) => {
                    let labels = [force.label.as_str(), force.element_label.as_str()];
                    add(force_vector(force.force.as_ref(), &labels, space)?);
                }
                Interaction::Environment(ExternalInteraction::Potential(potential)) => {
                    let labels = [potential.label.as_str(), potential.element_label.as_str()];
                    add(potential_force(potential.potential.as_ref(), &labels, particle, space, self.naming));
                }
            }
        }

        // A shared potential also acts on its second element.
        for interaction in &self.internal_interactions {
            if let InternalInteraction::Potential(potential) = interaction {
                if potential.element_2_label == particle {
                    let labels = [
                        potential.label.as_str(),
                        potential.element_1_label.as_str(),
                        potential.element_2_label.as_str(),
                    ];
                    add(potential_force(potential.potential.as_ref(), &labels, particle, space, self.naming));
                }
            }
        }
        Ok(total)
    }

    /// Validates the system and derives its equations of motion.
    pub fn analyze(&mut self) -> Result<&Equations, ModelError> {
        let space = self.validate()?;
        let bindings = self.time_bindings(space);
        let mut equations = Equations::new();
        let mut masses = Vec::new();

        for particle in &self.particles {
            let label = particle.label.as_str();
            let mass = particle.mass(self.naming);
            if particle.m.is_none() {
                masses.push(self.naming.mass(label));
            }

            let functions: Vec<String> = space
                .coordinates()
                .iter()
                .map(|coordinate| self.naming.coordinate(coordinate, label))
                .collect();
            let accelerations = space.accelerations(&functions);
            let force = self.total_force(label, space)?;

            let mut particle_equations = Vec::with_capacity(functions.len());
            for (i, coordinate) in space.coordinates().iter().enumerate() {
                let lhs = &mass * &accelerations[i].expr(&functions[i]);
                let rhs = force[i].subs(&bindings);
                let equation = Equation::new(lhs, rhs);
                debug!(particle = label, %equation, "Derived equation of motion");
                particle_equations.push(CoordinateEquation {
                    coordinate: coordinate.to_string(),
                    function: functions[i].clone(),
                    equation,
                });
            }
            equations.insert(label.to_string(), particle_equations);
        }

        for mass in masses {
            self.assumptions.assume_positive(mass);
        }
        info!(
            particles = self.particles.len(),
            internal_interactions = self.internal_interactions.len(),
            external_interactions = self.external_interactions.len(),
            "Analyzed classical mechanics system"
        );
        Ok(self.equations.insert(equations))
    }

    /// Solves the analyzed equations, with free constants `_K1`, `_K2` when
    /// no initial conditions are given.
    pub fn solve(&self, initial_conditions: Option<&InitialConditions>) -> Result<Solutions, ModelError> {
        let equations = self.equations.as_ref().ok_or(ModelError::NotAnalyzed)?;
        let solutions = ode::solve_equations(equations, &self.assumptions, initial_conditions)?;
        info!(particles = solutions.len(), "Solved equations of motion");
        Ok(solutions)
    }

    /// Runs the simulation method and stores its results.
    pub fn simulate(&mut self, method: SimulationMethod) -> anyhow::Result<&SimulationResults> {
        self.analyze()?;
        match method {
            SimulationMethod::DynamicEquations { initial_conditions } => {
                let solutions = self.solve(initial_conditions.as_ref())?;
                let formulas = self.equations.clone().unwrap_or_default();
                self.results.dynamic_equations = Some(DynamicEquations { formulas, solutions });
            }
            SimulationMethod::Numerical(settings) => {
                let equations = self.equations.as_ref().ok_or(ModelError::NotAnalyzed)?;
                self.results.trajectory = Some(simulation::integrate(equations, &settings)?);
            }
        }
        Ok(&self.results)
    }
}

impl fmt::Display for ClassicalMechanicsSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let summary = SystemSummary {
            name: "ClassicalMechanicsSystem",
            elements: self.particles.len(),
            elements_interactions: self.internal_interactions.len(),
            environment_interactions: self.external_interactions.len(),
        };
        write!(f, "{summary}")
    }
}
