//! Resource guards applied before the parser ever sees the script.
//!
//! The parser is recursive, so pathological nesting is rejected up front
//! instead of relying on the parser's own limits.

use tracing::warn;

use crate::config::ValidatorConfig;
use crate::error::ValidatorError;

pub fn check_limits(source: &str, config: &ValidatorConfig) -> Result<(), ValidatorError> {
    if source.len() > config.max_source_bytes {
        warn!(
            len = source.len(),
            limit = config.max_source_bytes,
            "script rejected: source too large"
        );
        return Err(ValidatorError::SourceTooLarge {
            len: source.len(),
            limit: config.max_source_bytes,
        });
    }

    let depth = max_nesting_depth(source);
    if depth > config.max_nesting_depth {
        warn!(
            depth,
            limit = config.max_nesting_depth,
            "script rejected: nesting too deep"
        );
        return Err(ValidatorError::NestingTooDeep {
            depth,
            limit: config.max_nesting_depth,
        });
    }

    Ok(())
}

#[derive(Clone, Copy)]
enum Lex {
    Code,
    LineComment,
    BlockComment,
    Quoted(u8),
    Template,
}

/// What the last significant token could be followed by.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Last {
    Operator,
    Value,
    /// `if (..)`, `else`, `do`: the next statement nests inside.
    Header,
}

struct Open {
    weight: usize,
    substitution: bool,
    header: bool,
}

/// Statement starters that can never continue an expression.
const STATEMENT_WORDS: &[&str] = &[
    "return", "throw", "const", "let", "var", "break", "continue", "switch", "try", "case",
    "default",
];
/// Words that nest what follows them one level deeper.
const NESTING_WORDS: &[&str] = &[
    "if", "else", "for", "while", "do", "with", "typeof", "void", "delete", "await", "new",
    "yield", "in", "instanceof",
];
const HEADER_WORDS: &[&str] = &["if", "for", "while", "with"];

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

fn one_of(word: &[u8], words: &[&str]) -> bool {
    words.iter().any(|w| w.as_bytes() == word)
}

fn is_operator(b: u8) -> bool {
    matches!(
        b,
        b'!' | b'~' | b'+' | b'-' | b'*' | b'/' | b'%' | b'<' | b'>' | b'=' | b'&' | b'|'
            | b'^' | b'?' | b'.'
    )
}

/// A line starting with one of these continues the previous expression.
fn continues_line(b: u8) -> bool {
    is_operator(b) || matches!(b, b'(' | b'[' | b'`' | b':' | b')' | b']' | b'}' | b',')
}

/// Estimated syntax-tree depth of the script.
///
/// Brackets count one level each. Inside one bracket level, unary operators,
/// operator runs, nesting keywords and chained calls accumulate until a `;`,
/// a `,`, a statement keyword or a line break that ends a statement. This is
/// what bounds the recursion of a bracket-free chain such as `!!!!x` or
/// `a = a = a`.
///
/// Regex literals are not tokenized, so brackets inside them are counted as
/// code. That can only over-estimate depth.
pub fn max_nesting_depth(source: &str) -> usize {
    let bytes = source.as_bytes();
    let mut state = Lex::Code;
    let mut open: Vec<Open> = Vec::new();
    let mut carried = 0usize;
    let mut chain = 0usize;
    let mut max = 0usize;
    let mut last = Last::Operator;
    let mut in_run = false;
    let mut line_ended = false;
    let mut after_header_word = false;
    let mut after_dot = false;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        let next = bytes.get(i + 1).copied();
        match state {
            Lex::Code => {
                if b.is_ascii_whitespace() {
                    if b == b'\n' && last == Last::Value {
                        line_ended = true;
                    }
                    in_run = false;
                    i += 1;
                    continue;
                }
                if b == b'/' && next == Some(b'/') {
                    state = Lex::LineComment;
                    i += 2;
                    continue;
                }
                if b == b'/' && next == Some(b'*') {
                    state = Lex::BlockComment;
                    i += 2;
                    continue;
                }

                if is_word_byte(b) {
                    let start = i;
                    while i < bytes.len() && is_word_byte(bytes[i]) {
                        i += 1;
                    }
                    let word = &bytes[start..i];
                    if line_ended {
                        line_ended = false;
                        if !one_of(word, &["else", "in", "instanceof"]) {
                            chain = 0;
                        }
                    }
                    in_run = false;
                    // `x.return` and `x.if` are plain property names.
                    let property = after_dot;
                    after_dot = false;
                    after_header_word = !property && one_of(word, HEADER_WORDS);
                    if property {
                        last = Last::Value;
                    } else if one_of(word, STATEMENT_WORDS) {
                        chain = 0;
                        last = Last::Operator;
                    } else if one_of(word, NESTING_WORDS) {
                        chain += 1;
                        last = if one_of(word, &["else", "do"]) {
                            Last::Header
                        } else {
                            Last::Operator
                        };
                    } else {
                        last = Last::Value;
                    }
                    max = max.max(carried + chain);
                    continue;
                }

                if line_ended {
                    line_ended = false;
                    if !continues_line(b) {
                        chain = 0;
                    }
                }
                let header_paren = after_header_word && b == b'(';
                after_header_word = false;
                after_dot = b == b'.';
                match b {
                    b'\'' | b'"' => {
                        state = Lex::Quoted(b);
                        last = Last::Value;
                        in_run = false;
                    }
                    b'`' => {
                        state = Lex::Template;
                        last = Last::Value;
                        in_run = false;
                    }
                    b'(' | b'[' | b'{' => {
                        open.push(Open {
                            weight: chain + 1,
                            substitution: false,
                            header: header_paren,
                        });
                        carried += chain + 1;
                        chain = 0;
                        last = Last::Operator;
                        in_run = false;
                    }
                    b')' | b']' | b'}' => {
                        last = Last::Value;
                        if let Some(level) = open.pop() {
                            carried -= level.weight;
                            chain = level.weight;
                            if level.substitution {
                                state = Lex::Template;
                            }
                            if level.header {
                                last = Last::Header;
                            }
                        }
                        in_run = false;
                    }
                    b';' | b',' => {
                        chain = 0;
                        last = Last::Operator;
                        in_run = false;
                    }
                    b'!' | b'~' | b'+' | b'-' => {
                        chain += 1;
                        last = Last::Operator;
                        in_run = true;
                    }
                    _ if is_operator(b) => {
                        if !in_run {
                            chain += 1;
                        }
                        last = Last::Operator;
                        in_run = true;
                    }
                    _ => {
                        last = Last::Operator;
                        in_run = false;
                    }
                }
                max = max.max(carried + chain);
            }
            Lex::LineComment => {
                if b == b'\n' {
                    state = Lex::Code;
                    if last == Last::Value {
                        line_ended = true;
                    }
                }
            }
            Lex::BlockComment => {
                if b == b'*' && next == Some(b'/') {
                    state = Lex::Code;
                    i += 1;
                }
            }
            Lex::Quoted(quote) => {
                if b == b'\\' {
                    i += 1;
                } else if b == quote || b == b'\n' {
                    state = Lex::Code;
                }
            }
            Lex::Template => {
                if b == b'\\' {
                    i += 1;
                } else if b == b'`' {
                    state = Lex::Code;
                } else if b == b'$' && next == Some(b'{') {
                    open.push(Open {
                        weight: chain + 1,
                        substitution: true,
                        header: false,
                    });
                    carried += chain + 1;
                    chain = 0;
                    last = Last::Operator;
                    max = max.max(carried);
                    state = Lex::Code;
                    i += 1;
                }
            }
        }
        i += 1;
    }

    max
}

/// Run `analyse` on a dedicated thread with `stack_bytes` of stack.
///
/// Parsing and every visitor recurse once per syntax level, so the analysis
/// gets its own stack instead of whatever the caller's thread happens to have.
#[cfg(not(target_arch = "wasm32"))]
pub fn with_analysis_stack<T, F>(stack_bytes: usize, analyse: F) -> Result<T, ValidatorError>
where
    T: Send,
    F: FnOnce() -> Result<T, ValidatorError> + Send,
{
    std::thread::scope(|scope| {
        let handle = std::thread::Builder::new()
            .name("script-analysis".to_string())
            .stack_size(stack_bytes)
            .spawn_scoped(scope, analyse)
            .map_err(|e| {
                warn!(error = %e, "could not start analysis thread");
                ValidatorError::ParserFault(format!("could not start analysis thread: {}", e))
            })?;
        match handle.join() {
            Ok(result) => result,
            Err(_) => {
                warn!("analysis thread panicked");
                Err(ValidatorError::ParserFault("analysis thread panicked".into()))
            }
        }
    })
}

/// wasm32 has no threads; the host's stack is all there is.
#[cfg(target_arch = "wasm32")]
pub fn with_analysis_stack<T, F>(_stack_bytes: usize, analyse: F) -> Result<T, ValidatorError>
where
    F: FnOnce() -> Result<T, ValidatorError>,
{
    analyse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_mixed_brackets() {
        assert_eq!(max_nesting_depth("f(a[{b: 1}])"), 3);
        assert_eq!(max_nesting_depth("a; b; c;"), 0);
    }

    #[test]
    fn ignores_brackets_in_strings_and_comments() {
        let src = "const s = '(((('; // ((((\n/* [[[[ */ const t = \"{{\"; const u = `((`;";
        assert_eq!(max_nesting_depth(src), max_nesting_depth("const s = 1;"));
    }

    #[test]
    fn escaped_quote_does_not_end_string() {
        assert_eq!(max_nesting_depth(r#"const s = "\"(((";"#), 1);
    }

    #[test]
    fn rejects_oversized_source() {
        let config = ValidatorConfig {
            max_source_bytes: 4,
            ..ValidatorConfig::default()
        };
        let err = check_limits("12345", &config).unwrap_err();
        assert_eq!(err, ValidatorError::SourceTooLarge { len: 5, limit: 4 });
    }

    #[test]
    fn rejects_deep_nesting() {
        let config = ValidatorConfig {
            max_nesting_depth: 3,
            ..ValidatorConfig::default()
        };
        let src = "((((1))))";
        let err = check_limits(src, &config).unwrap_err();
        assert_eq!(err, ValidatorError::NestingTooDeep { depth: 4, limit: 3 });
        assert!(check_limits("(((1)))", &config).is_ok());
    }

    #[test]
    fn bracket_free_chains_count_as_depth() {
        let bang = format!("outputs.x = {}a;", "!".repeat(50_000));
        assert!(max_nesting_depth(&bang) >= 50_000);

        let ternary = format!("outputs.x = {}0;", "a ? 1 : ".repeat(20_000));
        assert!(max_nesting_depth(&ternary) >= 20_000);

        let assign = format!("{}1;", "a = ".repeat(50_000));
        assert!(max_nesting_depth(&assign) >= 50_000);

        let calls = format!("f{};", "()".repeat(10_000));
        assert!(max_nesting_depth(&calls) >= 10_000);
    }

    #[test]
    fn chains_spanning_lines_still_accumulate() {
        let members = format!("x{}", "\n  .next()".repeat(5_000));
        assert!(max_nesting_depth(&members) >= 5_000);

        let ifs = format!("{}x = 1;", "if (a)\n".repeat(5_000));
        assert!(max_nesting_depth(&ifs) >= 5_000);

        let substitutions = format!("{}x{}", "`${".repeat(1_000), "}`".repeat(1_000));
        assert!(max_nesting_depth(&substitutions) >= 1_000);
    }

    #[test]
    fn keywords_as_property_names_do_not_reset() {
        let members = format!("x{};", ".return".repeat(5_000));
        assert!(max_nesting_depth(&members) >= 5_000);
        let optional = format!("x{};", "?.default".repeat(5_000));
        assert!(max_nesting_depth(&optional) >= 5_000);
    }

    #[test]
    fn statement_boundaries_reset_chains() {
        let semicolons = "total = total + 1;\n".repeat(2_000);
        assert!(max_nesting_depth(&semicolons) <= 3);

        let asi = "total = total + 1\n".repeat(2_000);
        assert!(max_nesting_depth(&asi) <= 3);

        let blocks = "if (inputs.a) {\n  outputs.a = 1\n}\n".repeat(500);
        assert!(max_nesting_depth(&blocks) <= 8);
    }

    #[test]
    fn ordinary_script_stays_well_under_default() {
        let src = r#"
function processData(inputs, properties, llm) {
  const items = (inputs.items || []).filter((item) => item && typeof item.value === 'number');
  if (items.length === 0) {
    outputs.total = 0;
  } else if (items.length === 1) {
    outputs.total = items[0].value;
  } else {
    outputs.total = items.reduce((sum, { value }) => sum + value * (properties.scale ?? 1), 0);
  }
  outputs.label = `${items.length} item${items.length === 1 ? '' : 's'}`;
}
"#;
        let depth = max_nesting_depth(src);
        assert!(depth < 32, "depth {}", depth);
    }

    #[test]
    fn analysis_runs_on_a_named_thread() {
        let name = with_analysis_stack(2 * 1024 * 1024, || {
            Ok(std::thread::current().name().map(str::to_string))
        })
        .unwrap();
        assert_eq!(name.as_deref(), Some("script-analysis"));
    }

    #[test]
    fn panic_during_analysis_is_a_fault() {
        let err = with_analysis_stack(2 * 1024 * 1024, || -> Result<(), ValidatorError> {
            panic!("visitor bug")
        })
        .unwrap_err();
        assert_eq!(err.code(), "F003");
    }
}
