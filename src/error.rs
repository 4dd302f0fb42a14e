//! Faults of the validator itself.
//!
//! A bad script is never an error here: it produces findings. These variants
//! mean the validator could not run to completion, so callers can tell
//! "the script is bad" apart from "the validator broke".

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Guard,
    Parse,
    Request,
    Config,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Guard => write!(f, "Guard"),
            Phase::Parse => write!(f, "Parse"),
            Phase::Request => write!(f, "Request"),
            Phase::Config => write!(f, "Config"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidatorError {
    #[error("script is {len} bytes, which exceeds the {limit}-byte limit")]
    SourceTooLarge { len: usize, limit: usize },

    #[error("script nests expressions {depth} levels deep, which exceeds the limit of {limit}")]
    NestingTooDeep { depth: usize, limit: usize },

    #[error("analysis aborted unexpectedly: {0}")]
    ParserFault(String),

    #[error("invalid validation request: {0}")]
    InvalidRequest(String),

    #[error("invalid validator config: {0}")]
    InvalidConfig(String),
}

impl ValidatorError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidatorError::SourceTooLarge { .. } => "F001",
            ValidatorError::NestingTooDeep { .. } => "F002",
            ValidatorError::ParserFault(_) => "F003",
            ValidatorError::InvalidRequest(_) => "F004",
            ValidatorError::InvalidConfig(_) => "F005",
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            ValidatorError::SourceTooLarge { .. } | ValidatorError::NestingTooDeep { .. } => {
                Phase::Guard
            }
            ValidatorError::ParserFault(_) => Phase::Parse,
            ValidatorError::InvalidRequest(_) => Phase::Request,
            ValidatorError::InvalidConfig(_) => Phase::Config,
        }
    }

    /// `[Phase:code] message`, the form the tool layer shows to callers.
    pub fn describe(&self) -> String {
        format!("[{}:{}] {}", self.phase(), self.code(), self)
    }
}
