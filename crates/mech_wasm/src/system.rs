//! WASM wrapper around a classical mechanics system.

use crate::{js_error, js_error_chain, optional_from_js, to_js};
use mech_core::config::SystemConfig;
use mech_core::mechanics::{ClassicalMechanicsSystem, SimulationMethod};
use mech_core::ode::InitialConditions;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmMechanicsSystem {
    system: ClassicalMechanicsSystem,
}

#[wasm_bindgen]
impl WasmMechanicsSystem {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<WasmMechanicsSystem, JsValue> {
        console_error_panic_hook::set_once();

        let config = SystemConfig::from_json_str(config_json).map_err(js_error)?;
        let system = config.build().map_err(js_error)?;
        Ok(WasmMechanicsSystem { system })
    }

    pub fn summary(&self) -> String {
        self.system.to_string()
    }

    /// Equations of motion per particle label.
    pub fn analyze(&mut self) -> Result<JsValue, JsValue> {
        let equations = self.system.analyze().map_err(js_error)?;
        to_js(equations)
    }

    /// Closed-form solutions; `initial_conditions` may be `undefined`.
    pub fn solve(&self, initial_conditions: JsValue) -> Result<JsValue, JsValue> {
        let initial_conditions: Option<InitialConditions> = optional_from_js(initial_conditions)?;
        let solutions = self
            .system
            .solve(initial_conditions.as_ref())
            .map_err(js_error)?;
        to_js(&solutions)
    }

    /// Runs a simulation; `undefined` selects the symbolic method.
    pub fn simulate(&mut self, method: JsValue) -> Result<JsValue, JsValue> {
        let method: SimulationMethod = optional_from_js(method)?.unwrap_or_default();
        let results = self.system.simulate(method).map_err(js_error_chain)?;
        to_js(results)
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::WasmMechanicsSystem;
    use wasm_bindgen::JsValue;
    use wasm_bindgen_test::wasm_bindgen_test;

    const SPRING: &str = r#"{
        "space": {"label": "line", "n_dim": 1},
        "particles": [{"label": "body", "m": 1.0}],
        "external_interactions": [
            {"kind": "force", "label": "push", "element_label": "body", "F": [2]}
        ]
    }"#;

    #[wasm_bindgen_test]
    fn system_reports_summary() {
        let system = WasmMechanicsSystem::new(SPRING).expect("valid config");
        assert_eq!(
            system.summary(),
            "ClassicalMechanicsSystem with 1 element(s), 0 elements interactions and 1 environment interactions."
        );
    }

    #[wasm_bindgen_test]
    fn system_rejects_invalid_json() {
        assert!(WasmMechanicsSystem::new("{").is_err());
    }

    #[wasm_bindgen_test]
    fn solve_requires_analyze() {
        let system = WasmMechanicsSystem::new(SPRING).expect("valid config");
        let err = system.solve(JsValue::UNDEFINED).err().expect("not analyzed");
        assert_eq!(
            err.as_string().as_deref(),
            Some("Call the method `analyze` before the `solve`.")
        );
    }

    #[wasm_bindgen_test]
    fn analyze_then_simulate() {
        let mut system = WasmMechanicsSystem::new(SPRING).expect("valid config");
        assert!(system.analyze().is_ok());
        assert!(system.solve(JsValue::NULL).is_ok());
        assert!(system.simulate(JsValue::UNDEFINED).is_ok());
    }
}
