//! JSON descriptions of mechanical systems.
//!
//! ```json
//! {
//!   "space": {"label": "line", "n_dim": 1},
//!   "particles": [{"label": "body", "m": 2.0}],
//!   "external_interactions": [
//!     {"kind": "force", "label": "spring", "element_label": "body", "F": ["-k*x__body"]}
//!   ],
//!   "positive": ["k"]
//! }
//! ```

use crate::error::ModelError;
use crate::mechanics::{ClassicalMechanicsSystem, ExternalInteraction, InternalInteraction, PointParticle};
use crate::newtonian::{Forces, NewtonianPointParticlesModel};
use crate::spaces::{CoordinateSystem, EuclideanSpace};
use serde::{Deserialize, Serialize};

fn default_space_label() -> String {
    "space".to_string()
}

fn default_n_dim() -> usize {
    3
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpaceConfig {
    #[serde(default = "default_space_label")]
    pub label: String,
    #[serde(default = "default_n_dim")]
    pub n_dim: usize,
    #[serde(default)]
    pub coordinate_system: CoordinateSystem,
}

impl SpaceConfig {
    pub fn build(&self) -> Result<EuclideanSpace, ModelError> {
        EuclideanSpace::new(self.label.as_str(), self.n_dim, self.coordinate_system)
    }
}

/// Description of a [`ClassicalMechanicsSystem`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub space: Option<SpaceConfig>,
    #[serde(default)]
    pub particles: Vec<PointParticle>,
    #[serde(default)]
    pub internal_interactions: Vec<InternalInteraction>,
    #[serde(default)]
    pub external_interactions: Vec<ExternalInteraction>,
    /// Symbols assumed positive when solving.
    #[serde(default)]
    pub positive: Vec<String>,
}

impl SystemConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn build(&self) -> Result<ClassicalMechanicsSystem, ModelError> {
        let space = self.space.as_ref().map(SpaceConfig::build).transpose()?;
        let mut system = ClassicalMechanicsSystem::new(
            self.particles.clone(),
            self.internal_interactions.clone(),
            self.external_interactions.clone(),
            space,
        );
        for symbol in &self.positive {
            system.assume_positive(symbol.as_str());
        }
        Ok(system)
    }
}

/// Description of a [`NewtonianPointParticlesModel`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewtonianConfig {
    #[serde(default)]
    pub forces: Option<Forces>,
    #[serde(default)]
    pub positive: Vec<String>,
}

impl NewtonianConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn build(&self) -> NewtonianPointParticlesModel {
        let mut model = NewtonianPointParticlesModel::new(self.forces.clone());
        for symbol in &self.positive {
            model.assume_positive(symbol.as_str());
        }
        model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Component;
    use crate::symbolic::Expr;

    const SPRING: &str = r#"{
        "space": {"label": "line", "n_dim": 1},
        "particles": [{"label": "body", "m": 2.0}],
        "external_interactions": [
            {"kind": "force", "label": "spring", "element_label": "body", "F": ["-k*x__body"]}
        ],
        "positive": ["k"]
    }"#;

    #[test]
    fn system_config_builds_a_system() {
        let config = SystemConfig::from_json_str(SPRING).expect("valid config");
        assert_eq!(config.space.as_ref().map(|space| space.n_dim), Some(1));
        assert_eq!(
            config.space.as_ref().map(|space| space.coordinate_system),
            Some(CoordinateSystem::Cartesian)
        );

        let mut system = config.build().expect("valid space");
        assert!(system.assumptions().is_positive("k"));
        let equations = system.analyze().expect("valid system");
        let equation = &equations["body"][0].equation;
        assert_eq!(equation.lhs, 2.0 * Expr::deriv("x__body", 2));
        assert_eq!(equation.rhs, -(Expr::sym("k") * Expr::fun("x__body")));
    }

    #[test]
    fn space_defaults_to_three_cartesian_dimensions() {
        let config = SystemConfig::from_json_str(r#"{"space": {}}"#).expect("valid config");
        let space = config.space.expect("space").build().expect("valid space");
        assert_eq!(space.label(), "space");
        assert_eq!(space.n_dim(), 3);
        assert_eq!(space.coordinate_system(), CoordinateSystem::Cartesian);
        assert_eq!(space.coordinates(), ["x", "y", "z"]);
    }

    #[test]
    fn out_of_range_space_fails_at_build_time() {
        let config = SystemConfig::from_json_str(
            r#"{"space": {"n_dim": 4}, "particles": [{"label": "body", "m": 1.0}]}"#,
        )
        .expect("valid json");
        let err = config.build().expect_err("four dimensions");
        assert!(matches!(err, ModelError::InvalidDimension(4)));

        let config = SystemConfig::from_json_str(
            r#"{"space": {"n_dim": 3, "coordinate_system": "polar"}, "particles": [{"label": "body", "m": 1.0}]}"#,
        )
        .expect("valid json");
        let err = config.build().expect_err("polar is 2D");
        assert!(matches!(err, ModelError::InvalidCoordinateSystem { n_dim: 3, .. }));
    }

    #[test]
    fn invalid_configs_are_reported() {
        let err = SystemConfig::from_json_str(r#"{"particles": 3}"#).expect_err("bad particles");
        assert!(matches!(err, ModelError::Config(_)));

        let config = SystemConfig::from_json_str(r#"{"space": {"n_dim": 1, "coordinate_system": "polar"}}"#)
            .expect("valid json");
        assert!(config.build().is_err());
    }

    #[test]
    fn newtonian_config_builds_a_model() {
        let json = r#"{
            "forces": {"body": {"weight": [0, "-m_body*g", 0]}},
            "positive": ["g"]
        }"#;
        let mut model = NewtonianConfig::from_json_str(json).expect("valid config").build();
        assert_eq!(model.particles_labels().expect("valid labels"), ["body"]);
        assert_eq!(model.analyze().expect("valid model")["body"].len(), 3);
    }
}
