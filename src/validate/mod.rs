//! Validation pipeline.
//!
//! Guard → parse → entry point → outputs → security → best practice. A
//! syntax error stops the pipeline with that single finding; otherwise every
//! phase runs and findings are returned in phase order. Everything after the
//! guard runs on a dedicated analysis thread.

pub mod catalogue;
pub mod entry;
pub mod flow;
pub mod outputs;
pub mod params;
pub mod practice;
pub mod security;

use tracing::debug;

use crate::config::ValidatorConfig;
use crate::error::ValidatorError;
use crate::finding::{Finding, Port};
use crate::parse::{self, ParseResult};

/// A custom node's script together with the node's declared interface.
#[derive(Debug, Clone, Copy)]
pub struct NodeScript<'a> {
    pub source: &'a str,
    pub outputs: &'a [Port],
    pub inputs: &'a [Port],
    /// `None` disables the undeclared-property check.
    pub properties: Option<&'a [Port]>,
    /// `None` means unknown; only an explicit `false` is checked.
    pub llm_enabled: Option<bool>,
}

impl<'a> NodeScript<'a> {
    pub fn new(source: &'a str, outputs: &'a [Port]) -> Self {
        NodeScript {
            source,
            outputs,
            inputs: &[],
            properties: None,
            llm_enabled: None,
        }
    }

    pub fn with_inputs(mut self, inputs: &'a [Port]) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_properties(mut self, properties: &'a [Port]) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn with_llm_enabled(mut self, enabled: bool) -> Self {
        self.llm_enabled = Some(enabled);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidatorConfig,
}

impl Validator {
    pub fn new(config: ValidatorConfig) -> Self {
        Validator { config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Validate one script. `Err` is reserved for inputs the validator
    /// refuses to analyse; every problem with the script itself is a finding.
    pub fn validate(&self, node: &NodeScript<'_>) -> Result<Vec<Finding>, ValidatorError> {
        let config = &self.config;
        debug!(
            source_len = node.source.len(),
            outputs = node.outputs.len(),
            inputs = node.inputs.len(),
            "validating script"
        );
        parse::check_limits(node.source, config)?;

        let findings =
            parse::with_analysis_stack(config.analysis_stack_bytes, || self.analyse(node))?;
        debug!(findings = findings.len(), "validation finished");
        Ok(findings)
    }

    fn analyse(&self, node: &NodeScript<'_>) -> Result<Vec<Finding>, ValidatorError> {
        let config = &self.config;
        let parsed = match parse::parse_script(node.source)? {
            ParseResult::Script(parsed) => parsed,
            ParseResult::SyntaxError(finding) => {
                debug!(message = %finding.message, "syntax error; skipping remaining checks");
                return Ok(vec![finding]);
            }
        };

        let mut findings = Vec::new();

        let entry = entry::check_entry(&parsed, config, &mut findings);
        debug!(found = entry.is_some(), "entry point checked");

        let writes = entry.as_ref().map(|entry| {
            outputs::check_outputs(entry, &parsed, node.outputs, config, &mut findings)
        });
        if let Some(writes) = &writes {
            debug!(written = writes.names.len(), dynamic = writes.dynamic, "outputs checked");
        }

        let before = findings.len();
        security::check_security(&parsed, &mut findings);
        debug!(hits = findings.len() - before, "security scan done");

        let before = findings.len();
        practice::check_practice(
            &parsed,
            entry.as_ref(),
            writes.as_ref(),
            node,
            config,
            &mut findings,
        );
        debug!(hits = findings.len() - before, "best-practice checks done");

        Ok(findings)
    }
}

/// Validate with the default conventions.
pub fn validate(
    source: &str,
    outputs: &[Port],
    inputs: &[Port],
) -> Result<Vec<Finding>, ValidatorError> {
    Validator::default().validate(&NodeScript::new(source, outputs).with_inputs(inputs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finding::{FindingKind, Severity};

    fn ports(names: &[&str]) -> Vec<Port> {
        names.iter().map(|n| Port::new(*n)).collect()
    }

    fn codes(findings: &[Finding]) -> Vec<&str> {
        findings.iter().map(|f| f.code.as_str()).collect()
    }

    #[test]
    fn syntax_error_short_circuits() {
        let f = validate("function processData(inputs) { eval(", &ports(&["x"]), &[]).unwrap();
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].kind, FindingKind::SyntaxError);
    }

    #[test]
    fn phases_report_in_order() {
        let src = "function processData(inputs) {\n  outputs.extra = eval(inputs.a);\n  outputs.v = JSON.parse(inputs.b);\n}";
        let f = validate(src, &ports(&["v"]), &ports(&["a", "b"])).unwrap();
        assert_eq!(codes(&f), vec!["O001", "S001", "B004"]);
    }

    #[test]
    fn missing_entry_still_runs_security() {
        let f = validate("const x = eval('1');", &ports(&["x"]), &[]).unwrap();
        assert_eq!(codes(&f), vec!["E001", "S001"]);
    }

    #[test]
    fn guard_rejects_oversized_source() {
        let config = ValidatorConfig {
            max_source_bytes: 8,
            ..ValidatorConfig::default()
        };
        let err = Validator::new(config)
            .validate(&NodeScript::new("function processData(inputs) {}", &[]))
            .unwrap_err();
        assert_eq!(err.code(), "F001");
    }

    #[test]
    fn deep_but_permitted_nesting_is_analysed() {
        let src = format!(
            "function processData(inputs) {{ outputs.v = {}inputs.a{}; }}",
            "(".repeat(450),
            ")".repeat(450)
        );
        let outputs = ports(&["v"]);
        let f = validate(&src, &outputs, &ports(&["a"])).unwrap();
        assert!(f.is_empty(), "{:?}", f);
    }

    #[test]
    fn bracket_free_chains_are_refused() {
        let chains = [
            format!("function processData(inputs) {{ outputs.v = {}inputs.a; }}", "!".repeat(50_000)),
            format!("function processData(inputs) {{ outputs.v = {}0; }}", "inputs.a ? 1 : ".repeat(20_000)),
            format!("function processData(inputs) {{ {}1; }}", "outputs.v = ".repeat(50_000)),
        ];
        for src in &chains {
            let err = validate(src, &ports(&["v"]), &[]).unwrap_err();
            assert_eq!(err.code(), "F002");
        }
    }

    #[test]
    fn custom_entry_name() {
        let config = ValidatorConfig {
            entry_function: "run".into(),
            ..ValidatorConfig::default()
        };
        let outputs = ports(&["y"]);
        let f = Validator::new(config)
            .validate(&NodeScript::new("function run(inputs) { outputs.y = inputs.x; }", &outputs))
            .unwrap();
        assert!(f.is_empty(), "{:?}", f);
    }

    #[test]
    fn same_input_same_output() {
        let src = "function processData(inputs) { if (inputs.a) { outputs.t = eval(inputs.a); } }";
        let outputs = ports(&["t", "u"]);
        let first = validate(src, &outputs, &[]).unwrap();
        let second = validate(src, &outputs, &[]).unwrap();
        assert_eq!(first, second);
        assert!(first.iter().any(|f| f.severity == Severity::Error));
    }
}
