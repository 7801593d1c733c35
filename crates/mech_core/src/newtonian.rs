//! Newtonian model of point particles in three-dimensional Cartesian space.
//!
//! The model is described only by its forces: a map from particle label to
//! named force vectors. Particles are the labels of that map plus every label
//! implied by a symbol such as `x_spring` or `m_body`.

use crate::error::ModelError;
use crate::mechanics::{ClassicalMechanicsSystem, ExternalForce, ExternalInteraction, PointParticle, SymbolNaming};
use crate::ode::{Equations, InitialConditions, Solutions};
use crate::simulation::{self, NumericalSettings, Trajectory};
use crate::spaces::EuclideanSpace;
use crate::symbolic::{Assumptions, Expr};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Force vectors per particle label and force label.
pub type Forces = BTreeMap<String, BTreeMap<String, Vec<Expr>>>;

pub const SPACE_DIM: usize = 3;
/// Reserved symbol prefixes; `{prefix}_{label}` refers to particle `label`.
pub const VARIABLES: [&str; 7] = ["m", "x", "y", "z", "v_x", "v_y", "v_z"];
/// Label of the single particle of a model without forces.
pub const DEFAULT_PARTICLE: &str = "particle";

const NAMING: SymbolNaming = SymbolNaming::Newtonian;

fn wrong_name(name: &str) -> ModelError {
    ModelError::WrongVariableName(name.to_string())
}

/// Particle label a symbol refers to, if any.
///
/// The name is split at its last underscore. A prefix that starts like a
/// reserved name must be exactly a reserved name, and a bare reserved name
/// (or one used as a suffix) is rejected.
fn symbol_particle(name: &str) -> Result<Option<&str>, ModelError> {
    let Some((prefix, suffix)) = name.rsplit_once('_') else {
        return if VARIABLES.contains(&name) {
            Err(wrong_name(name))
        } else {
            Ok(None)
        };
    };
    if VARIABLES.iter().any(|reserved| prefix.starts_with(reserved)) {
        if !VARIABLES.contains(&prefix) || suffix.is_empty() {
            return Err(wrong_name(name));
        }
        return Ok(Some(suffix));
    }
    if VARIABLES.contains(&suffix) {
        return Err(wrong_name(name));
    }
    Ok(None)
}

/// Labels of the particles described by `forces`, sorted and deduplicated.
pub fn check_particles_labels(forces: Option<&Forces>) -> Result<Vec<String>, ModelError> {
    let Some(forces) = forces else {
        return Ok(vec![DEFAULT_PARTICLE.to_string()]);
    };
    let mut labels: BTreeSet<String> = forces.keys().cloned().collect();
    for vector in forces.values().flat_map(BTreeMap::values) {
        for component in vector {
            for symbol in component.free_symbols() {
                if let Some(label) = symbol_particle(&symbol)? {
                    labels.insert(label.to_string());
                }
            }
        }
    }
    Ok(labels.into_iter().collect())
}

fn describe_vector(vector: &[Expr]) -> String {
    let components: Vec<String> = vector.iter().map(Expr::to_string).collect();
    format!("[{}]", components.join(", "))
}

/// Checks that a force vector has three components and rewrites coordinate
/// symbols `x_p` as functions of time `x_p(t)` and velocity symbols `v_x_p`
/// as their derivatives.
pub fn check_force_vector(vector: &[Expr]) -> Result<Vec<Expr>, ModelError> {
    if vector.len() != SPACE_DIM {
        return Err(ModelError::ForceVectorLength(describe_vector(vector)));
    }
    Ok(vector
        .iter()
        .map(|component| {
            component.map_nodes(&|node| {
                let Expr::Sym(name) = node else {
                    return None;
                };
                let (prefix, particle) = name.rsplit_once('_')?;
                match prefix.strip_prefix("v_") {
                    Some(coordinate) if VARIABLES[1..4].contains(&coordinate) => {
                        Some(Expr::deriv(NAMING.coordinate(coordinate, particle), 1))
                    }
                    _ if VARIABLES[1..4].contains(&prefix) => Some(Expr::fun(name.as_str())),
                    _ => None,
                }
            })
        })
        .collect())
}

/// Newtonian model of point particles.
#[derive(Debug, Clone, Default)]
pub struct NewtonianPointParticlesModel {
    forces: Option<Forces>,
    assumptions: Assumptions,
    system: Option<ClassicalMechanicsSystem>,
}

impl NewtonianPointParticlesModel {
    pub fn new(forces: Option<Forces>) -> Self {
        Self {
            forces,
            ..Self::default()
        }
    }

    pub fn particles_labels(&self) -> Result<Vec<String>, ModelError> {
        check_particles_labels(self.forces.as_ref())
    }

    /// Declared forces, with an empty entry for every implied particle.
    pub fn forces(&self) -> Result<Forces, ModelError> {
        let mut forces = self.forces.clone().unwrap_or_default();
        for label in self.particles_labels()? {
            forces.entry(label).or_default();
        }
        Ok(forces)
    }

    /// Declares `symbol` positive, also for an already analyzed model.
    pub fn assume_positive(&mut self, symbol: impl Into<String>) -> &mut Self {
        let symbol = symbol.into();
        if let Some(system) = self.system.as_mut() {
            system.assume_positive(symbol.as_str());
        }
        self.assumptions.assume_positive(symbol);
        self
    }

    fn build_system(&self) -> Result<ClassicalMechanicsSystem, ModelError> {
        let forces = self.forces()?;
        let particles = forces.keys().map(|label| PointParticle::new(label.as_str(), None)).collect();

        let mut interactions = Vec::new();
        for (particle, particle_forces) in &forces {
            for (label, vector) in particle_forces {
                interactions.push(ExternalInteraction::Force(ExternalForce {
                    label: label.clone(),
                    element_label: particle.clone(),
                    force: Some(check_force_vector(vector)?),
                }));
            }
        }

        let space = EuclideanSpace::cartesian("space", SPACE_DIM)?;
        let mut system =
            ClassicalMechanicsSystem::new(particles, vec![], interactions, Some(space)).with_naming(NAMING);
        for symbol in self.assumptions.iter() {
            system.assume_positive(symbol);
        }
        Ok(system)
    }

    /// Derives `m_p * q_p'' == sum F` for every particle and coordinate.
    pub fn analyze(&mut self) -> Result<&Equations, ModelError> {
        let system = self.system.insert(self.build_system()?);
        system.analyze()
    }

    pub fn equations(&self) -> Option<&Equations> {
        self.system.as_ref().and_then(ClassicalMechanicsSystem::equations)
    }

    pub fn solve(&self, initial_conditions: Option<&InitialConditions>) -> Result<Solutions, ModelError> {
        self.system
            .as_ref()
            .ok_or(ModelError::NotAnalyzed)?
            .solve(initial_conditions)
    }

    /// Integrates the analyzed equations numerically.
    pub fn simulate_numerically(&self, settings: &NumericalSettings) -> anyhow::Result<Trajectory> {
        let equations = self.equations().ok_or(ModelError::NotAnalyzed)?;
        simulation::integrate(equations, settings)
    }
}

impl fmt::Display for NewtonianPointParticlesModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.particles_labels().map_or(0, |labels| labels.len());
        write!(f, "NewtonianPointParticlesModel with {count} point particle(s)")
    }
}
