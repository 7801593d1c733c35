use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// Scalar type the bytecode VM and the integrators operate on.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {
    /// Converts a literal, yielding NaN when the type cannot represent it.
    fn lit(value: f64) -> Self {
        Self::from_f64(value).unwrap_or_else(Self::nan)
    }
}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// A first-order system `x' = f(t, x)`.
///
/// Equations of motion are second order; they are integrated in the
/// position/velocity form `[q, q']' = [q', q'']`.
pub trait DynamicalSystem<T: Scalar> {
    /// Length of the state vector.
    fn dimension(&self) -> usize;

    /// Writes `f(t, x)` into `out`.
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// A fixed-step integrator.
pub trait Steppable<T: Scalar> {
    /// Advances `state` from `t` to `t + dt` and updates `t`.
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T);
}
