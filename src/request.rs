//! Tool-layer request and outcome envelopes.
//!
//! The tool layer hands over a JSON arguments object; the outcome carries
//! the raw findings for machine consumers plus the rendered report.

use serde::{Deserialize, Serialize};

use crate::config::ValidatorConfig;
use crate::error::ValidatorError;
use crate::finding::{Finding, Port, Severity};
use crate::report::format_report;
use crate::validate::{NodeScript, Validator};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRequest {
    #[serde(alias = "code", alias = "scriptSource")]
    pub script: String,
    #[serde(default)]
    pub outputs: Vec<Port>,
    #[serde(default)]
    pub inputs: Vec<Port>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<Port>>,
    #[serde(default, alias = "llmEnabled", skip_serializing_if = "Option::is_none")]
    pub llm_enabled: Option<bool>,
}

impl ValidationRequest {
    pub fn from_json(json: &str) -> Result<Self, ValidatorError> {
        serde_json::from_str(json).map_err(|e| {
            ValidatorError::InvalidRequest(format!("Failed to parse request JSON: {}", e))
        })
    }

    pub fn script(&self) -> NodeScript<'_> {
        let mut node = NodeScript::new(&self.script, &self.outputs).with_inputs(&self.inputs);
        if let Some(properties) = &self.properties {
            node = node.with_properties(properties);
        }
        if let Some(enabled) = self.llm_enabled {
            node = node.with_llm_enabled(enabled);
        }
        node
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// No finding blocks the script.
    pub valid: bool,
    pub error_count: usize,
    pub warning_count: usize,
    pub info_count: usize,
    pub findings: Vec<Finding>,
    pub report: String,
}

impl ValidationOutcome {
    pub fn from_findings(findings: Vec<Finding>) -> Self {
        let count = |s: Severity| findings.iter().filter(|f| f.severity == s).count();
        let error_count = count(Severity::Error);
        let warning_count = count(Severity::Warning);
        let info_count = count(Severity::Info);
        let report = format_report(&findings);
        ValidationOutcome {
            valid: error_count == 0,
            error_count,
            warning_count,
            info_count,
            findings,
            report,
        }
    }
}

pub fn validate_request(
    request: &ValidationRequest,
    config: &ValidatorConfig,
) -> Result<ValidationOutcome, ValidatorError> {
    let findings = Validator::new(config.clone()).validate(&request.script())?;
    Ok(ValidationOutcome::from_findings(findings))
}
