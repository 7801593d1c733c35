use crate::traits::{DynamicalSystem, Scalar, Steppable};
use serde::{Deserialize, Serialize};

/// Butcher tableau of an explicit Runge-Kutta method.
///
/// Row `s` of `a` holds the weights of the stages before `s`.
#[derive(Debug)]
pub struct Tableau {
    pub name: &'static str,
    pub c: &'static [f64],
    pub a: &'static [&'static [f64]],
    pub b: &'static [f64],
}

impl Tableau {
    pub fn stages(&self) -> usize {
        self.b.len()
    }
}

/// Classic Runge-Kutta 4th order.
pub static RK4: Tableau = Tableau {
    name: "rk4",
    c: &[0.0, 0.5, 0.5, 1.0],
    a: &[&[], &[0.5], &[0.0, 0.5], &[0.0, 0.0, 1.0]],
    b: &[1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0],
};

/// Tsitouras 5/4, advanced with its 5th order weights.
pub static TSIT5: Tableau = Tableau {
    name: "tsit5",
    c: &[0.0, 0.161, 0.327, 0.9, 0.9800255409045097, 1.0],
    a: &[
        &[],
        &[0.161],
        &[-0.008480655492356989, 0.335480655492357],
        &[2.898, -6.359447987781783, 4.361447987781783],
        &[
            5.325864858437957,
            -11.748883564062828,
            7.495539342889693,
            -0.09249506636030195,
        ],
        &[
            5.86145544294642,
            -12.92096931784711,
            8.159367898576159,
            -0.071584973281401,
            -0.02826857949054663,
        ],
    ],
    b: &[
        0.09646076681806523,
        0.01,
        0.4798896504144996,
        1.379008574103742,
        -3.290069515436099,
        2.324710524099774,
    ],
};

/// Fixed-step explicit Runge-Kutta integrator driven by a [`Tableau`].
pub struct RungeKutta<T: Scalar> {
    tableau: &'static Tableau,
    k: Vec<Vec<T>>,
    tmp: Vec<T>,
}

impl<T: Scalar> RungeKutta<T> {
    pub fn new(tableau: &'static Tableau, dim: usize) -> Self {
        Self {
            tableau,
            k: vec![vec![T::zero(); dim]; tableau.stages()],
            tmp: vec![T::zero(); dim],
        }
    }

    pub fn rk4(dim: usize) -> Self {
        Self::new(&RK4, dim)
    }

    pub fn tsit5(dim: usize) -> Self {
        Self::new(&TSIT5, dim)
    }

    pub fn name(&self) -> &'static str {
        self.tableau.name
    }
}

impl<T: Scalar> Steppable<T> for RungeKutta<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let t0 = *t;
        let tableau = self.tableau;
        let (k, tmp) = (&mut self.k, &mut self.tmp);

        for stage in 0..tableau.stages() {
            tmp.copy_from_slice(state);
            for (j, &weight) in tableau.a[stage].iter().enumerate() {
                if weight == 0.0 {
                    continue;
                }
                let scale = T::lit(weight) * dt;
                for (y, slope) in tmp.iter_mut().zip(&k[j]) {
                    *y = *y + scale * *slope;
                }
            }
            system.apply(t0 + T::lit(tableau.c[stage]) * dt, tmp, &mut k[stage]);
        }

        for (stage, &weight) in tableau.b.iter().enumerate() {
            let scale = T::lit(weight) * dt;
            for (y, slope) in state.iter_mut().zip(&k[stage]) {
                *y = *y + scale * *slope;
            }
        }

        *t = t0 + dt;
    }
}

/// Integrator selection for numerical simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepperKind {
    Rk4,
    #[default]
    Tsit5,
}

impl StepperKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "rk4" => Some(StepperKind::Rk4),
            "tsit5" => Some(StepperKind::Tsit5),
            _ => None,
        }
    }

    pub fn build<T: Scalar>(self, dim: usize) -> RungeKutta<T> {
        match self {
            StepperKind::Rk4 => RungeKutta::rk4(dim),
            StepperKind::Tsit5 => RungeKutta::tsit5(dim),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Decay;

    impl DynamicalSystem<f64> for Decay {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = -x[0];
        }
    }

    /// x'' = -x as [x, v].
    struct Oscillator;

    impl DynamicalSystem<f64> for Oscillator {
        fn dimension(&self) -> usize {
            2
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = x[1];
            out[1] = -x[0];
        }
    }

    fn integrate(
        kind: StepperKind,
        system: &impl DynamicalSystem<f64>,
        state: &mut [f64],
        steps: usize,
        dt: f64,
    ) -> f64 {
        let mut stepper = kind.build::<f64>(system.dimension());
        let mut t = 0.0;
        for _ in 0..steps {
            stepper.step(system, &mut t, state, dt);
        }
        t
    }

    #[test]
    fn tableaus_are_consistent() {
        for tableau in [&RK4, &TSIT5] {
            assert_eq!(tableau.a.len(), tableau.stages());
            assert_eq!(tableau.c.len(), tableau.stages());
            assert_relative_eq!(tableau.b.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
            for (row, c) in tableau.a.iter().zip(tableau.c) {
                // Published Tsit5 coefficients satisfy the row-sum condition to about 1e-6.
                assert_relative_eq!(row.iter().sum::<f64>(), *c, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn rk4_integrates_exponential_decay() {
        let mut state = [1.0];
        let t = integrate(StepperKind::Rk4, &Decay, &mut state, 10, 0.1);
        assert_relative_eq!(t, 1.0, epsilon = 1e-12);
        assert_relative_eq!(state[0], (-1.0_f64).exp(), epsilon = 1e-6);
    }

    #[test]
    fn tsit5_tracks_harmonic_oscillator() {
        let mut state = [1.0, 0.0];
        let t = integrate(StepperKind::Tsit5, &Oscillator, &mut state, 100, 0.01);
        assert_relative_eq!(state[0], t.cos(), epsilon = 1e-6);
        assert_relative_eq!(state[1], -t.sin(), epsilon = 1e-6);
    }

    #[test]
    fn stepper_kind_parses_names() {
        assert_eq!(StepperKind::from_name("RK4"), Some(StepperKind::Rk4));
        assert_eq!(StepperKind::from_name("tsit5"), Some(StepperKind::Tsit5));
        assert_eq!(StepperKind::from_name("euler"), None);

        let kind: StepperKind = serde_json::from_str("\"rk4\"").expect("valid kind");
        assert_eq!(kind, StepperKind::Rk4);
        assert_eq!(kind.build::<f64>(2).name(), "rk4");
    }
}
