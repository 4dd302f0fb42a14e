//! Parse phase: script text → swc syntax tree.
//!
//! The script is parsed as a classic script body (not a module). Any parser
//! diagnostic, recoverable or not, is reported as a single syntax-error
//! finding; no later phase runs on a tree the parser had to repair.

pub mod guard;

use std::panic::AssertUnwindSafe;

use swc_common::{FileName, SourceMap, Span, Spanned, sync::Lrc};
use swc_ecma_ast::{EsVersion, Script};
use swc_ecma_parser::lexer::Lexer;
use swc_ecma_parser::{EsSyntax, Parser, StringInput, Syntax};
use tracing::warn;

use crate::error::ValidatorError;
use crate::finding::{Finding, Location};

pub use guard::{check_limits, with_analysis_stack};

/// A successfully parsed script plus the source map needed to turn spans
/// back into line/column positions.
pub struct ParsedScript {
    cm: Lrc<SourceMap>,
    pub script: Script,
}

impl ParsedScript {
    pub fn locate(&self, span: Span) -> Option<Location> {
        locate(&self.cm, span)
    }
}

pub enum ParseResult {
    Script(ParsedScript),
    SyntaxError(Finding),
}

/// Parse `source`. A parser panic surfaces as `ValidatorError::ParserFault`,
/// never as a syntax-error finding.
pub fn parse_script(source: &str) -> Result<ParseResult, ValidatorError> {
    std::panic::catch_unwind(AssertUnwindSafe(|| parse_inner(source))).map_err(|payload| {
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        warn!(source_len = source.len(), %detail, "script parser panicked");
        ValidatorError::ParserFault(detail)
    })
}

fn parse_inner(source: &str) -> ParseResult {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(
        FileName::Custom("node-script.js".into()).into(),
        source.to_string(),
    );

    let lexer = Lexer::new(
        Syntax::Es(EsSyntax::default()),
        EsVersion::Es2022,
        StringInput::from(&*fm),
        None,
    );
    let mut parser = Parser::new_from(lexer);
    let result = parser.parse_script();

    let mut errors = parser.take_errors();
    let script = match result {
        Ok(script) => script,
        Err(fatal) => {
            errors.push(fatal);
            return ParseResult::SyntaxError(first_syntax_error(&cm, errors));
        }
    };
    if !errors.is_empty() {
        return ParseResult::SyntaxError(first_syntax_error(&cm, errors));
    }

    ParseResult::Script(ParsedScript { cm, script })
}

/// Earliest diagnostic by source position.
fn first_syntax_error(cm: &Lrc<SourceMap>, errors: Vec<swc_ecma_parser::error::Error>) -> Finding {
    let first = errors.into_iter().min_by_key(|e| e.span().lo());
    match first {
        Some(err) => Finding::syntax_error(
            format!("Syntax error: {}", err.kind().msg()),
            locate(cm, err.span()),
        ),
        None => Finding::syntax_error("Syntax error: script could not be parsed", None),
    }
}

fn locate(cm: &Lrc<SourceMap>, span: Span) -> Option<Location> {
    if span.is_dummy() {
        return None;
    }
    let loc = cm.lookup_char_pos(span.lo());
    Some(Location {
        line: loc.line,
        column: loc.col.0 + 1,
    })
}
