//! WASM wrapper around the Newtonian point particles model.

use crate::{js_error, js_error_chain, optional_from_js, to_js};
use mech_core::config::NewtonianConfig;
use mech_core::newtonian::NewtonianPointParticlesModel;
use mech_core::ode::InitialConditions;
use mech_core::simulation::NumericalSettings;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmNewtonianModel {
    model: NewtonianPointParticlesModel,
}

#[wasm_bindgen]
impl WasmNewtonianModel {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<WasmNewtonianModel, JsValue> {
        console_error_panic_hook::set_once();

        let config = NewtonianConfig::from_json_str(config_json).map_err(js_error)?;
        Ok(WasmNewtonianModel {
            model: config.build(),
        })
    }

    pub fn summary(&self) -> String {
        self.model.to_string()
    }

    pub fn particles_labels(&self) -> Result<Vec<String>, JsValue> {
        self.model.particles_labels().map_err(js_error)
    }

    pub fn forces(&self) -> Result<JsValue, JsValue> {
        let forces = self.model.forces().map_err(js_error)?;
        to_js(&forces)
    }

    pub fn analyze(&mut self) -> Result<JsValue, JsValue> {
        let equations = self.model.analyze().map_err(js_error)?;
        to_js(equations)
    }

    pub fn solve(&self, initial_conditions: JsValue) -> Result<JsValue, JsValue> {
        let initial_conditions: Option<InitialConditions> = optional_from_js(initial_conditions)?;
        let solutions = self
            .model
            .solve(initial_conditions.as_ref())
            .map_err(js_error)?;
        to_js(&solutions)
    }

    pub fn simulate_numerically(&self, settings: JsValue) -> Result<JsValue, JsValue> {
        let settings: NumericalSettings = serde_wasm_bindgen::from_value(settings).map_err(js_error)?;
        let trajectory = self
            .model
            .simulate_numerically(&settings)
            .map_err(js_error_chain)?;
        to_js(&trajectory)
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::WasmNewtonianModel;
    use wasm_bindgen::JsValue;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn model_without_forces_has_one_particle() {
        let model = WasmNewtonianModel::new("{}").expect("valid config");
        assert_eq!(model.particles_labels().expect("labels"), ["particle"]);
        assert_eq!(model.summary(), "NewtonianPointParticlesModel with 1 point particle(s)");
    }

    #[wasm_bindgen_test]
    fn reserved_names_are_rejected() {
        let model = WasmNewtonianModel::new(r#"{"forces": {"body": {"weight": [0, "m*g", 0]}}}"#)
            .expect("valid config");
        let err = model.particles_labels().err().expect("reserved name");
        assert_eq!(err.as_string().as_deref(), Some("Wrong variable name `m` was found."));
    }

    #[wasm_bindgen_test]
    fn falling_body_is_solved() {
        let mut model = WasmNewtonianModel::new(r#"{"forces": {"body": {"weight": [0, "-m_body*g", 0]}}}"#)
            .expect("valid config");
        assert!(model.analyze().is_ok());
        assert!(model.solve(JsValue::UNDEFINED).is_ok());
    }
}
