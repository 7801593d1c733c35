use crate::base::Component;
use crate::error::ModelError;
use crate::symbolic::Expr;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest supported number of spatial dimensions.
pub const MAX_DIM: usize = 3;

static CARTESIAN: [&str; MAX_DIM] = ["x", "y", "z"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSystem {
    #[default]
    Cartesian,
    Polar,
    Spherical,
    Cylindrical,
}

impl CoordinateSystem {
    pub fn name(self) -> &'static str {
        match self {
            CoordinateSystem::Cartesian => "cartesian",
            CoordinateSystem::Polar => "polar",
            CoordinateSystem::Spherical => "spherical",
            CoordinateSystem::Cylindrical => "cylindrical",
        }
    }

    /// Coordinate systems available in `n_dim` dimensions.
    pub fn allowed(n_dim: usize) -> &'static [CoordinateSystem] {
        match n_dim {
            2 => &[CoordinateSystem::Cartesian, CoordinateSystem::Polar],
            3 => &[
                CoordinateSystem::Cartesian,
                CoordinateSystem::Spherical,
                CoordinateSystem::Cylindrical,
            ],
            _ => &[CoordinateSystem::Cartesian],
        }
    }

    fn describe_allowed(n_dim: usize) -> String {
        let names: Vec<String> = Self::allowed(n_dim)
            .iter()
            .map(|system| format!("`{}`", system.name()))
            .collect();
        match names.as_slice() {
            [single] => single.clone(),
            [init @ .., last] => format!("either {} or {}", init.join(", "), last),
            [] => String::new(),
        }
    }
}

impl fmt::Display for CoordinateSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Acceleration component along one frame direction: `scale * q'' + rest`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAcceleration {
    pub scale: Expr,
    pub rest: Expr,
}

impl FrameAcceleration {
    fn plain() -> Self {
        Self {
            scale: Expr::one(),
            rest: Expr::zero(),
        }
    }

    /// The full component for the coordinate function `function`.
    pub fn expr(&self, function: &str) -> Expr {
        &self.scale * &Expr::deriv(function, 2) + self.rest.clone()
    }
}

/// Validated on construction; fields are only reachable through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EuclideanSpace {
    label: String,
    n_dim: usize,
    coordinate_system: CoordinateSystem,
}

impl EuclideanSpace {
    pub fn new(
        label: impl Into<String>,
        n_dim: usize,
        coordinate_system: CoordinateSystem,
    ) -> Result<Self, ModelError> {
        if !(1..=MAX_DIM).contains(&n_dim) {
            return Err(ModelError::InvalidDimension(n_dim));
        }
        if !CoordinateSystem::allowed(n_dim).contains(&coordinate_system) {
            return Err(ModelError::InvalidCoordinateSystem {
                n_dim,
                system: coordinate_system.name().to_string(),
                allowed: CoordinateSystem::describe_allowed(n_dim),
            });
        }
        Ok(Self {
            label: label.into(),
            n_dim,
            coordinate_system,
        })
    }

    pub fn cartesian(label: impl Into<String>, n_dim: usize) -> Result<Self, ModelError> {
        Self::new(label, n_dim, CoordinateSystem::Cartesian)
    }

    pub fn n_dim(&self) -> usize {
        self.n_dim
    }

    pub fn coordinate_system(&self) -> CoordinateSystem {
        self.coordinate_system
    }

    pub fn coordinates(&self) -> &'static [&'static str] {
        match self.coordinate_system {
            CoordinateSystem::Cartesian => &CARTESIAN[..self.n_dim],
            CoordinateSystem::Polar => &["r", "ph"],
            CoordinateSystem::Spherical => &["r", "th", "ph"],
            CoordinateSystem::Cylindrical => &["rh", "ph", "z"],
        }
    }

    /// Acceleration components in the orthonormal frame of the coordinate
    /// system, for the coordinate functions `functions` (one per coordinate).
    pub fn accelerations(&self, functions: &[String]) -> Vec<FrameAcceleration> {
        let q = |i: usize| Expr::fun(functions[i].as_str());
        let dq = |i: usize| Expr::deriv(functions[i].as_str(), 1);
        let squared = |e: Expr| Expr::pow(e, Expr::num(2.0));

        match self.coordinate_system {
            CoordinateSystem::Cartesian => vec![FrameAcceleration::plain(); self.n_dim],
            CoordinateSystem::Polar | CoordinateSystem::Cylindrical => {
                let mut components = vec![
                    FrameAcceleration {
                        scale: Expr::one(),
                        rest: -(q(0) * squared(dq(1))),
                    },
                    FrameAcceleration {
                        scale: q(0),
                        rest: 2.0 * dq(0) * dq(1),
                    },
                ];
                if self.coordinate_system == CoordinateSystem::Cylindrical {
                    components.push(FrameAcceleration::plain());
                }
                components
            }
            CoordinateSystem::Spherical => {
                let (sin_th, cos_th) = (Expr::sin(q(1)), Expr::cos(q(1)));
                vec![
                    FrameAcceleration {
                        scale: Expr::one(),
                        rest: -(q(0) * squared(dq(1)))
                            - q(0) * squared(sin_th.clone()) * squared(dq(2)),
                    },
                    FrameAcceleration {
                        scale: q(0),
                        rest: 2.0 * dq(0) * dq(1) - q(0) * &sin_th * &cos_th * squared(dq(2)),
                    },
                    FrameAcceleration {
                        scale: q(0) * &sin_th,
                        rest: 2.0 * dq(0) * dq(2) * &sin_th + 2.0 * q(0) * dq(1) * dq(2) * cos_th,
                    },
                ]
            }
        }
    }

    /// Frame components of the gradient of `potential` with respect to the
    /// coordinate symbols `symbols`.
    pub fn gradient(&self, potential: &Expr, symbols: &[String]) -> Vec<Expr> {
        let partial = |i: usize| potential.diff(&symbols[i]);
        let q = |i: usize| Expr::sym(symbols[i].as_str());

        match self.coordinate_system {
            CoordinateSystem::Cartesian => (0..self.n_dim).map(partial).collect(),
            CoordinateSystem::Polar => vec![partial(0), partial(1) / q(0)],
            CoordinateSystem::Spherical => vec![
                partial(0),
                partial(1) / q(0),
                partial(2) / (q(0) * Expr::sin(q(1))),
            ],
            CoordinateSystem::Cylindrical => vec![partial(0), partial(1) / q(0), partial(2)],
        }
    }
}

impl Component for EuclideanSpace {
    fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn coordinates_follow_the_coordinate_system() {
        let line = EuclideanSpace::cartesian("line", 1).expect("valid space");
        assert_eq!(line.coordinates(), ["x"]);
        let plane = EuclideanSpace::new("plane", 2, CoordinateSystem::Polar).expect("valid space");
        assert_eq!(plane.coordinates(), ["r", "ph"]);
        let space = EuclideanSpace::new("space", 3, CoordinateSystem::Cylindrical).expect("valid space");
        assert_eq!(space.coordinates(), ["rh", "ph", "z"]);
    }

    #[test]
    fn invalid_dimensions_and_systems_are_rejected() {
        let err = EuclideanSpace::cartesian("space", 4).expect_err("too many dimensions");
        assert!(err.to_string().contains("between 1 and 3. Got 4"));

        let err = EuclideanSpace::new("space", 3, CoordinateSystem::Polar).expect_err("polar is 2D");
        assert_eq!(
            err.to_string(),
            "Parameter `coordinate_system` should be equal to either `cartesian`, `spherical` or \
             `cylindrical` for 3 dimension(s). Got `polar` instead."
        );

        let err = EuclideanSpace::new("line", 1, CoordinateSystem::Spherical).expect_err("1D");
        assert!(err.to_string().contains("equal to `cartesian` for 1"));
    }

    #[test]
    fn polar_acceleration_has_centripetal_term() {
        let plane = EuclideanSpace::new("plane", 2, CoordinateSystem::Polar).expect("valid space");
        let functions = vec!["r__p".to_string(), "ph__p".to_string()];
        let accelerations = plane.accelerations(&functions);
        assert_eq!(accelerations[0].scale, Expr::one());
        assert_eq!(
            accelerations[0].rest,
            -(Expr::fun("r__p") * Expr::pow(Expr::deriv("ph__p", 1), Expr::num(2.0)))
        );
        assert_eq!(accelerations[1].scale, Expr::fun("r__p"));
        assert_eq!(
            accelerations[0].expr("r__p").to_string(),
            "diff(r__p(t), t, 2) - r__p(t)*diff(ph__p(t), t)^2"
        );
    }

    /// Evaluates every frame component with `state[i] = [q, q', q'']` of `functions[i]`.
    fn evaluate_frame(accelerations: &[FrameAcceleration], functions: &[String], state: &[[f64; 3]]) -> Vec<f64> {
        let lookup = |name: &str| functions.iter().position(|function| function == name);
        let numeric = |node: &Expr| match node {
            Expr::Fun(name) => lookup(name).map(|i| Expr::num(state[i][0])),
            Expr::Deriv(name, order) => lookup(name).map(|i| Expr::num(state[i][*order as usize])),
            _ => None,
        };
        accelerations
            .iter()
            .zip(functions)
            .map(|(component, function)| {
                component
                    .expr(function)
                    .map_nodes(&numeric)
                    .eval(&HashMap::new())
                    .expect("numeric expression")
            })
            .collect()
    }

    #[test]
    fn spherical_accelerations_match_the_textbook_formulas() {
        let space = EuclideanSpace::new("space", 3, CoordinateSystem::Spherical).expect("valid space");
        let functions: Vec<String> = ["r__p", "th__p", "ph__p"].iter().map(|s| s.to_string()).collect();
        let accelerations = space.accelerations(&functions);
        assert_eq!(accelerations.len(), 3);

        let [r, dr, ddr]: [f64; 3] = [1.7, -0.4, 0.9];
        let [th, dth, ddth]: [f64; 3] = [0.6, 1.3, -0.2];
        let [dph, ddph]: [f64; 2] = [0.8, 0.5];
        let values = evaluate_frame(&accelerations, &functions, &[[r, dr, ddr], [th, dth, ddth], [2.1, dph, ddph]]);

        let (sin, cos) = (th.sin(), th.cos());
        let a_r = ddr - r * dth * dth - r * sin * sin * dph * dph;
        let a_th = r * ddth + 2.0 * dr * dth - r * sin * cos * dph * dph;
        let a_ph = r * sin * ddph + 2.0 * dr * dph * sin + 2.0 * r * dth * dph * cos;
        assert!((values[0] - a_r).abs() < 1e-12, "a_r = {}, expected {a_r}", values[0]);
        assert!((values[1] - a_th).abs() < 1e-12, "a_th = {}, expected {a_th}", values[1]);
        assert!((values[2] - a_ph).abs() < 1e-12, "a_ph = {}, expected {a_ph}", values[2]);
    }

    #[test]
    fn cylindrical_accelerations_extend_polar_with_a_plain_axis() {
        let space = EuclideanSpace::new("space", 3, CoordinateSystem::Cylindrical).expect("valid space");
        let functions: Vec<String> = ["rh__p", "ph__p", "z__p"].iter().map(|s| s.to_string()).collect();
        let accelerations = space.accelerations(&functions);
        assert_eq!(accelerations.len(), 3);
        assert_eq!(accelerations[2], FrameAcceleration::plain());

        let [rh, drh, ddrh]: [f64; 3] = [2.5, 0.3, -1.1];
        let [dph, ddph]: [f64; 2] = [0.7, 0.2];
        let values = evaluate_frame(&accelerations, &functions, &[[rh, drh, ddrh], [1.0, dph, ddph], [4.0, -2.0, 9.81]]);
        assert!((values[0] - (ddrh - rh * dph * dph)).abs() < 1e-12);
        assert!((values[1] - (rh * ddph + 2.0 * drh * dph)).abs() < 1e-12);
        assert!((values[2] - 9.81).abs() < 1e-12);
    }

    #[test]
    fn spherical_gradient_uses_metric_factors() {
        let space = EuclideanSpace::new("space", 3, CoordinateSystem::Spherical).expect("valid space");
        let symbols: Vec<String> = ["r", "th", "ph"].iter().map(|s| s.to_string()).collect();
        // V = r*th*ph
        let potential = Expr::sym("r") * Expr::sym("th") * Expr::sym("ph");
        let gradient = space.gradient(&potential, &symbols);
        let bindings = HashMap::from([
            ("r".to_string(), 2.0),
            ("th".to_string(), 0.5),
            ("ph".to_string(), 3.0),
        ]);
        let values: Vec<f64> = gradient
            .iter()
            .map(|component| component.eval(&bindings).expect("bound"))
            .collect();
        assert!((values[0] - 1.5).abs() < 1e-12);
        assert!((values[1] - 3.0).abs() < 1e-12);
        assert!((values[2] - 0.5 / 0.5_f64.sin()).abs() < 1e-12);
    }
}
