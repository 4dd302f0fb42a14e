//! WASM entry points for browser use.

use wasm_bindgen::prelude::*;

use crate::config::ValidatorConfig;
use crate::error::ValidatorError;
use crate::finding::Finding;
use crate::report::format_report;
use crate::request::{ValidationOutcome, ValidationRequest, validate_request};

/// Validate a custom node script with the default conventions.
/// Returns `{status: "ok", ...outcome}` or `{status: "fault", code, phase, message}`.
#[wasm_bindgen]
pub fn validate_custom_node(request_json: &str) -> JsValue {
    let result = validate_custom_node_inner(request_json, None);
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

/// Same as `validate_custom_node`, with a (partial) `ValidatorConfig` JSON.
#[wasm_bindgen]
pub fn validate_custom_node_with_config(request_json: &str, config_json: &str) -> JsValue {
    let result = validate_custom_node_inner(request_json, Some(config_json));
    serde_wasm_bindgen::to_value(&result).unwrap_or(JsValue::NULL)
}

fn validate_custom_node_inner(request_json: &str, config_json: Option<&str>) -> ValidateResult {
    let config = match config_json.map(ValidatorConfig::from_json).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => return ValidateResult::Fault(FaultDto::from(e)),
    };

    let request = match ValidationRequest::from_json(request_json) {
        Ok(r) => r,
        Err(e) => return ValidateResult::Fault(FaultDto::from(e)),
    };

    match validate_request(&request, &config) {
        Ok(outcome) => ValidateResult::Ok(outcome),
        Err(e) => ValidateResult::Fault(FaultDto::from(e)),
    }
}

/// Render a JSON array of findings as a text report.
#[wasm_bindgen]
pub fn format_findings(findings_json: &str) -> String {
    format_findings_inner(findings_json)
}

fn format_findings_inner(findings_json: &str) -> String {
    match serde_json::from_str::<Vec<Finding>>(findings_json) {
        Ok(findings) => format_report(&findings),
        Err(e) => format!("Failed to parse findings JSON: {}", e),
    }
}

// ---------------------------------------------------------------------------
// DTOs for serialization to JS
// ---------------------------------------------------------------------------

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct FaultDto {
    code: String,
    phase: String,
    message: String,
}

impl From<ValidatorError> for FaultDto {
    fn from(e: ValidatorError) -> Self {
        FaultDto {
            code: e.code().into(),
            phase: e.phase().to_string(),
            message: e.to_string(),
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status")]
enum ValidateResult {
    #[serde(rename = "ok")]
    Ok(ValidationOutcome),
    #[serde(rename = "fault")]
    Fault(FaultDto),
}
