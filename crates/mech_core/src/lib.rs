pub mod base;
pub mod config;
pub mod equation_engine;
pub mod error;
pub mod mechanics;
pub mod newtonian;
pub mod ode;
pub mod simulation;
pub mod solvers;
pub mod spaces;
pub mod symbolic;
/// The `mech_core` crate models classical mechanics systems of point particles.
/// Systems are described symbolically, turned into Newton's equations of motion,
/// and then solved in closed form or integrated numerically.
///
/// Key components:
/// - **Symbolic**: `Expr` expressions with differentiation, substitution and sign assumptions.
/// - **Mechanics**: `ClassicalMechanicsSystem` (particles, forces, potentials, Euclidean space) and the
///   force-only `NewtonianPointParticlesModel`.
/// - **ODE**: closed-form solutions of linear second-order equations with constant coefficients.
/// - **Equation Engine**: parser and bytecode VM used to evaluate accelerations numerically.
/// - **Solvers**: explicit Runge-Kutta integrators (RK4, Tsit5).
pub mod traits;

pub use error::{ModelError, SolveError};
pub use mechanics::ClassicalMechanicsSystem;
pub use newtonian::NewtonianPointParticlesModel;
pub use symbolic::{Equation, Expr};
