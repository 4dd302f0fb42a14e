//! Security rules (S001–S010).
//!
//! Constructs that escape the node sandbox or reach resources a custom node
//! must not touch. All are hard blocks except busy-waiting, which is only
//! discouraged.

use crate::finding::{Finding, FindingKind, Severity};
use crate::parse::ParsedScript;
use crate::validate::catalogue::{Matcher, PatternRule, scan};

pub static SECURITY_RULES: &[PatternRule<Severity>] = &[
    PatternRule {
        code: "S001",
        matcher: Matcher::Call(&["eval"]),
        severity: Severity::Error,
        message: "`{target}` evaluates a string as code, which is not allowed in custom node scripts",
    },
    PatternRule {
        code: "S001",
        matcher: Matcher::Reference(&["eval"]),
        severity: Severity::Error,
        message: "`{target}` refers to eval; any alias of it evaluates strings as code, which is not allowed in custom node scripts",
    },
    PatternRule {
        code: "S002",
        matcher: Matcher::Call(&["Function"]),
        severity: Severity::Error,
        message: "`{target}` builds a function from a string, which is dynamic code evaluation and is not allowed",
    },
    PatternRule {
        code: "S002",
        matcher: Matcher::New(&["Function"]),
        severity: Severity::Error,
        message: "`{target}` builds a function from a string, which is dynamic code evaluation and is not allowed",
    },
    PatternRule {
        code: "S002",
        matcher: Matcher::Reference(&["Function"]),
        severity: Severity::Error,
        message: "`{target}` refers to the Function constructor, which builds functions from strings and is not allowed",
    },
    PatternRule {
        code: "S002",
        matcher: Matcher::FunctionConstructor,
        severity: Severity::Error,
        message: "`{target}` is the Function constructor reached through a function value; it builds functions from strings and is not allowed",
    },
    PatternRule {
        code: "S003",
        matcher: Matcher::CallWithCodeString(&["setTimeout", "setInterval", "setImmediate"]),
        severity: Severity::Error,
        message: "`{target}` evaluates the string as code; pass a function instead",
    },
    PatternRule {
        code: "S004",
        matcher: Matcher::Call(&["require"]),
        severity: Severity::Error,
        message: "`{target}` loads a module; custom node scripts cannot load libraries",
    },
    PatternRule {
        code: "S004",
        matcher: Matcher::Reference(&["require"]),
        severity: Severity::Error,
        message: "`{target}` refers to the module loader; custom node scripts cannot load libraries",
    },
    PatternRule {
        code: "S005",
        matcher: Matcher::DynamicImport,
        severity: Severity::Error,
        message: "`{target}` loads a module at runtime; custom node scripts cannot load libraries",
    },
    PatternRule {
        code: "S006",
        matcher: Matcher::MemberOf(&["fs", "Deno"]),
        severity: Severity::Error,
        message: "`{target}` accesses the filesystem, which is not available to custom node scripts",
    },
    PatternRule {
        code: "S006",
        matcher: Matcher::Ident(&["__dirname", "__filename"]),
        severity: Severity::Error,
        message: "`{target}` exposes the host filesystem layout, which is not available to custom node scripts",
    },
    PatternRule {
        code: "S007",
        matcher: Matcher::Call(&["fetch"]),
        severity: Severity::Error,
        message: "`{target}` makes a direct network call; use an HTTP Request node in the workflow instead",
    },
    PatternRule {
        code: "S007",
        matcher: Matcher::New(&["XMLHttpRequest", "WebSocket", "EventSource"]),
        severity: Severity::Error,
        message: "`{target}` opens a direct network connection; use an HTTP Request node in the workflow instead",
    },
    PatternRule {
        code: "S007",
        matcher: Matcher::MemberCall(&[("navigator", "sendBeacon")]),
        severity: Severity::Error,
        message: "`{target}` makes a direct network call; use an HTTP Request node in the workflow instead",
    },
    PatternRule {
        code: "S008",
        matcher: Matcher::MemberOf(&["process"]),
        severity: Severity::Error,
        message: "`{target}` touches the host process (environment, subprocesses, exit), which is not allowed",
    },
    PatternRule {
        code: "S009",
        matcher: Matcher::Ident(&["globalThis"]),
        severity: Severity::Error,
        message: "`{target}` exposes the global object and can be used to escape the sandbox",
    },
    PatternRule {
        code: "S009",
        matcher: Matcher::ConstructorChain,
        severity: Severity::Error,
        message: "`{target}` reaches the Function constructor through the prototype chain and can be used to escape the sandbox",
    },
    PatternRule {
        code: "S010",
        matcher: Matcher::BusyWait,
        severity: Severity::Warning,
        message: "`{target}` busy-waits on the clock and blocks the worker; avoid synchronous sleeping",
    },
];

pub fn check_security(parsed: &ParsedScript, findings: &mut Vec<Finding>) {
    for hit in scan(SECURITY_RULES, &parsed.script) {
        let rule = &SECURITY_RULES[hit.rule];
        findings.push(Finding::new(
            rule.code,
            FindingKind::Security,
            rule.severity,
            rule.render(&hit.target),
            parsed.locate(hit.span),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{ParseResult, parse_script};

    fn run(source: &str) -> Vec<Finding> {
        let parsed = match parse_script(source).unwrap() {
            ParseResult::Script(p) => p,
            ParseResult::SyntaxError(f) => panic!("{}", f),
        };
        let mut findings = Vec::new();
        check_security(&parsed, &mut findings);
        findings
    }

    fn codes(source: &str) -> Vec<String> {
        run(source).into_iter().map(|f| f.code).collect()
    }

    #[test]
    fn eval_is_an_error() {
        let f = run("function processData(inputs) { return eval(inputs.code); }");
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].code, "S001");
        assert_eq!(f[0].severity, Severity::Error);
        assert!(f[0].message.contains("`eval()`"));
        assert!(f[0].location.is_some());
    }

    #[test]
    fn function_constructor_both_forms() {
        assert_eq!(codes("Function('return 1')(); new Function('a', 'return a');"), vec!["S002", "S002"]);
    }

    #[test]
    fn string_timer_only_when_body_is_string() {
        assert_eq!(codes("setTimeout('doIt()', 10);"), vec!["S003"]);
        assert!(codes("setTimeout(() => doIt(), 10);").is_empty());
    }

    #[test]
    fn module_loading() {
        assert_eq!(codes("const fs = require('fs'); import('os');"), vec!["S004", "S005"]);
    }

    #[test]
    fn filesystem_access() {
        assert_eq!(codes("fs.readFileSync('/etc/passwd'); const d = __dirname;"), vec!["S006", "S006"]);
    }

    #[test]
    fn network_calls() {
        assert_eq!(
            codes("fetch('https://x'); new XMLHttpRequest(); navigator.sendBeacon('/x');"),
            vec!["S007", "S007", "S007"]
        );
    }

    #[test]
    fn process_access_each_occurrence_reported() {
        let f = run("const a = process.env.SECRET;\nprocess.exit(1);");
        assert_eq!(f.len(), 2);
        assert!(f[0].message.contains("`process.env`"));
        assert_eq!(f[1].location.map(|l| l.line), Some(2));
    }

    #[test]
    fn sandbox_escapes() {
        assert_eq!(codes("globalThis.x = 1;"), vec!["S009"]);
        assert_eq!(codes("({}).constructor.constructor('return this')();"), vec!["S009"]);
    }

    #[test]
    fn busy_wait_is_only_a_warning() {
        let f = run("const end = Date.now() + 100; while (Date.now() < end) {}");
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].code, "S010");
        assert_eq!(f[0].severity, Severity::Warning);
    }

    #[test]
    fn clean_script_has_no_findings() {
        assert!(codes("function processData(inputs) { outputs.total = inputs.a + inputs.b; }").is_empty());
    }

    #[test]
    fn optional_call_of_eval() {
        assert_eq!(codes("function processData(inputs) { return eval?.(inputs.c); }"), vec!["S001"]);
        assert_eq!(codes("window.eval?.('1');"), vec!["S001"]);
    }

    #[test]
    fn indirect_eval_through_comma() {
        let f = run("function processData(inputs) { return (0, eval)(inputs.c); }");
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].code, "S001");
        assert!(f[0].message.contains("`eval()`"));
    }

    #[test]
    fn aliased_dynamic_code_is_reported_at_the_reference() {
        assert_eq!(codes("const e = eval; e('1');"), vec!["S001"]);
        assert_eq!(codes("const r = require; r('fs');"), vec!["S004"]);
        assert_eq!(codes("const F = window.Function; F('return 1')();"), vec!["S002"]);
        assert_eq!(codes("run(eval);"), vec!["S001"]);
        assert_eq!(codes("const { x } = { x: eval };"), vec!["S001"]);
    }

    #[test]
    fn direct_calls_are_not_reported_twice() {
        assert_eq!(codes("eval('1'); (eval)('2'); require('fs'); new Function('x');"), vec!["S001", "S001", "S004", "S002"]);
    }

    #[test]
    fn constructor_of_a_function_value() {
        assert_eq!(codes("(() => {}).constructor('return this')();"), vec!["S002"]);
        assert_eq!(codes("const F = (async function () {}).constructor;"), vec!["S002"]);
        assert_eq!(codes("Object.getPrototypeOf(function* () {}).constructor('yield 1');"), vec!["S002"]);
        assert!(codes("const t = ({}).constructor; const n = (5).constructor;").is_empty());
    }

    #[test]
    fn process_reached_through_a_global_object() {
        let f = run("const s = window.process.env.SECRET;\nconst e = globalThis.process.env;");
        assert_eq!(
            f.iter().map(|f| f.code.as_str()).collect::<Vec<_>>(),
            vec!["S008", "S008", "S009"]
        );
        assert!(f[0].message.contains("`window.process.env`"));
        assert_eq!(codes("self.fs.readFileSync('/etc/passwd');"), vec!["S006"]);
    }
}
