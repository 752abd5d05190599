//! `wasm-bindgen` boundary, feature `wasm`.
//!
//! Plain getter methods that hand a `JsValue` back via
//! `serde_wasm_bindgen::to_value`, backed by the same safe Rust API the
//! FFI boundary wraps. Never wires `getrandom`/browser entropy into
//! anything that feeds solver state — the only seed this boundary ever
//! forwards is the explicit one in `SimConfig`.

use crate::reg::RegInputs;
use crate::{SimConfig, Simulation};
use wasm_bindgen::prelude::*;

/// A simulation handle usable from JavaScript. Thin wrapper: every method
/// here forwards straight into [`Simulation`]'s safe API.
#[wasm_bindgen]
pub struct NegcoreSimulation {
    inner: Simulation,
}

#[wasm_bindgen]
impl NegcoreSimulation {
    /// Create a new simulation. Throws a `JsValue` error string on invalid
    /// configuration rather than returning a sentinel, the idiomatic
    /// `wasm-bindgen` failure mode.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<NegcoreSimulation, JsValue> {
        console_error_panic_hook::set_once();
        let config: SimConfig = serde_wasm_bindgen::from_value(config)
            .map_err(|e| JsValue::from_str(&format!("invalid config: {e}")))?;
        let inner = Simulation::create(&config).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(NegcoreSimulation { inner })
    }

    /// Advance by `dt_seconds` with a uniform `rainfall_flux`. REG inputs
    /// default to zero forcing — a richer forcing surface belongs to the
    /// external collaborator this crate exposes hooks to, not this
    /// boundary.
    #[wasm_bindgen(js_name = step)]
    pub fn step(&mut self, dt_seconds: f64, rainfall_flux: f64) -> i32 {
        self.inner.step(dt_seconds, rainfall_flux, RegInputs::default()) as i32
    }

    #[wasm_bindgen(js_name = resetFromBinary)]
    pub fn reset_from_binary(&mut self, bytes: &[u8]) -> i32 {
        self.inner.reset_from_binary(bytes) as i32
    }

    #[wasm_bindgen(js_name = getStateBinary)]
    pub fn get_state_binary(&self) -> Vec<u8> {
        self.inner.state_binary()
    }

    #[wasm_bindgen(js_name = getStateJson)]
    pub fn get_state_json(&self) -> JsValue {
        match serde_json::from_str::<serde_json::Value>(&self.inner.state_json()) {
            Ok(value) => serde_wasm_bindgen::to_value(&value).unwrap_or(JsValue::NULL),
            Err(_) => JsValue::NULL,
        }
    }

    #[wasm_bindgen(js_name = getStateHash)]
    pub fn get_state_hash(&self) -> js_sys::BigInt {
        js_sys::BigInt::from(self.inner.state_hash())
    }

    #[wasm_bindgen(js_name = getErrorFlags)]
    pub fn get_error_flags(&self) -> u32 {
        self.inner.error_flags()
    }

    #[wasm_bindgen(js_name = getLastError)]
    pub fn get_last_error(&self) -> Option<String> {
        self.inner.last_error().map(str::to_string)
    }

    #[wasm_bindgen(js_name = tickMillis)]
    pub fn tick_millis(&self) -> js_sys::BigInt {
        js_sys::BigInt::from(self.inner.tick_millis())
    }
}
