//! WASM bridge for the `mech_core` mechanics models.
//!
//! Systems are described with the JSON configs of `mech_core::config`;
//! results cross the boundary as plain JS objects.

use serde::Serialize;
use serde_wasm_bindgen::Serializer;
use wasm_bindgen::prelude::*;

mod newtonian;
mod system;

pub use newtonian::WasmNewtonianModel;
pub use system::WasmMechanicsSystem;

pub(crate) fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Reports an `anyhow` error with its whole context chain.
pub(crate) fn js_error_chain(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{err:#}"))
}

pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// `None` for `undefined` and `null`, the decoded value otherwise.
pub(crate) fn optional_from_js<T: serde::de::DeserializeOwned>(value: JsValue) -> Result<Option<T>, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(None);
    }
    serde_wasm_bindgen::from_value(value).map(Some).map_err(js_error)
}
