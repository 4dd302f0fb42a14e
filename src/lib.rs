pub mod config;
pub mod error;
pub mod finding;
pub mod parse;
pub mod report;
pub mod request;
pub mod validate;
pub mod wasm;

pub use config::ValidatorConfig;
pub use error::ValidatorError;
pub use finding::{Finding, FindingKind, Location, Port, Severity};
pub use report::format_report;
pub use validate::{NodeScript, Validator, validate};
