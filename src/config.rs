//! Validator configuration.
//!
//! Every field has a default, so a partial JSON document is enough to
//! override a single convention.

use serde::{Deserialize, Serialize};

use crate::error::ValidatorError;

const MIN_ANALYSIS_STACK: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidatorConfig {
    /// Name of the top-level function the platform invokes.
    pub entry_function: String,
    /// Reserved local whose properties become the node's outputs.
    pub result_identifier: String,
    /// Fewer declared parameters than this is flagged.
    pub min_entry_params: usize,
    /// Positional index of the inputs object in the entry signature.
    pub inputs_param: usize,
    /// Positional index of the node properties object.
    pub properties_param: usize,
    /// Positional index of the LLM helper.
    pub llm_param: usize,
    pub max_source_bytes: usize,
    /// Limit on the estimated syntax depth, checked before parsing.
    pub max_nesting_depth: usize,
    /// Stack reserved for the thread that parses and analyses the script.
    pub analysis_stack_bytes: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        ValidatorConfig {
            entry_function: "processData".into(),
            result_identifier: "outputs".into(),
            min_entry_params: 1,
            inputs_param: 0,
            properties_param: 1,
            llm_param: 2,
            max_source_bytes: 256 * 1024,
            max_nesting_depth: 512,
            analysis_stack_bytes: 64 * 1024 * 1024,
        }
    }
}

impl ValidatorConfig {
    pub fn from_json(json: &str) -> Result<Self, ValidatorError> {
        let config: ValidatorConfig = serde_json::from_str(json)
            .map_err(|e| ValidatorError::InvalidConfig(format!("Failed to parse config JSON: {}", e)))?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), ValidatorError> {
        if self.entry_function.trim().is_empty() {
            return Err(ValidatorError::InvalidConfig(
                "entryFunction must not be empty".into(),
            ));
        }
        if self.result_identifier.trim().is_empty() {
            return Err(ValidatorError::InvalidConfig(
                "resultIdentifier must not be empty".into(),
            ));
        }
        if self.max_nesting_depth == 0 {
            return Err(ValidatorError::InvalidConfig(
                "maxNestingDepth must be at least 1".into(),
            ));
        }
        if self.analysis_stack_bytes < MIN_ANALYSIS_STACK {
            return Err(ValidatorError::InvalidConfig(format!(
                "analysisStackBytes must be at least {}",
                MIN_ANALYSIS_STACK
            )));
        }
        Ok(())
    }
}
