//! Logical defect analyzer: AST, control-flow, and data-flow passes over the
//! current source, invisible to execution.
//!
//! The analyzer fails closed: source that does not parse yields exactly one
//! Syntax defect and nothing else. Findings are values with confidences; the
//! analyzer itself never returns an error.

pub mod cfg;
pub mod dataflow;
pub mod parser;
pub mod patterns;

use crate::config::RepairConfig;
use crate::defect::{AnalysisTier, DefectDescriptor, DefectKind, LogicRule};
use crate::language::Language;
use crate::oracle::OracleResult;

/// Run the full battery against `source`. Failing oracles contribute
/// observed Behavioral defects and raise the confidence of logical findings
/// (never to 1.0).
pub fn analyze(
    source: &str,
    language: Language,
    oracle_results: &[OracleResult],
    config: &RepairConfig,
) -> Vec<DefectDescriptor> {
    // Fail closed: an unparseable unit gets one Syntax defect, nothing else.
    if language.has_parse_gate() {
        match parser::syntax_error_line(source, language) {
            Some(Err(line)) => {
                return vec![DefectDescriptor::observed(
                    DefectKind::Syntax,
                    Some(line),
                    "source does not parse",
                )
                .with_snippet_from(source)];
            }
            Some(Ok(())) => {}
            None => {}
        }
    }

    let mut findings = match language {
        Language::Python => python_passes(source, config),
        _ => patterns::heuristic_rules(source, language, config.break_scan_window),
    };

    let any_oracle_failed = oracle_results.iter().any(|r| !r.passed);
    if any_oracle_failed {
        for finding in &mut findings {
            if matches!(finding.kind, DefectKind::Logical(_)) {
                finding.confidence = (finding.confidence + config.oracle_confidence_boost).min(0.99);
            }
        }
    }

    findings.extend(oracle_results.iter().filter_map(|r| r.to_defect()));
    findings.extend(oracle_delta_hints(oracle_results));

    findings
        .into_iter()
        .map(|finding| finding.with_snippet_from(source))
        .collect()
}

fn python_passes(source: &str, config: &RepairConfig) -> Vec<DefectDescriptor> {
    let Some(tree) = parser::parse(source, Language::Python) else {
        // Parser failure (not a syntax error in the source) degrades to the
        // heuristic battery rather than dropping analysis entirely.
        return patterns::heuristic_rules(source, Language::Python, config.break_scan_window);
    };
    let root = tree.root_node();
    let mut findings = Vec::new();

    for (function, graph) in cfg::function_cfgs(root, source) {
        for line in graph.unreachable_lines() {
            findings.push(DefectDescriptor::inferred(
                LogicRule::UnreachableCode,
                Some(line),
                format!("statement in '{function}' is unreachable from the entry"),
                AnalysisTier::Exact,
            ));
        }
    }

    for finding in cfg::infinite_loops(root, source) {
        let message = if finding.stuck_vars.is_empty() {
            "'while True' loop with no break".to_string()
        } else {
            format!(
                "loop condition depends on {} but the body never writes {}",
                finding.stuck_vars.join(", "),
                if finding.stuck_vars.len() == 1 { "it" } else { "them" }
            )
        };
        findings.push(DefectDescriptor::inferred(
            LogicRule::InfiniteLoop,
            Some(finding.line),
            message,
            AnalysisTier::Exact,
        ));
    }

    for (name, line) in dataflow::uninitialized_uses(root, source) {
        findings.push(DefectDescriptor::inferred(
            LogicRule::UninitializedUse,
            Some(line),
            format!("'{name}' is used before any definition in scope"),
            AnalysisTier::Exact,
        ));
    }

    findings.extend(patterns::python_ast_rules(root, source));
    findings
}

/// Behavioral deltas that hint at a specific rule: an expected/actual pair
/// exactly one apart is the classic off-by-one signature.
fn oracle_delta_hints(oracle_results: &[OracleResult]) -> Vec<DefectDescriptor> {
    let mut hints = Vec::new();
    for result in oracle_results.iter().filter(|r| !r.passed) {
        let expected = result.oracle.expected_stdout.trim().parse::<i64>();
        let actual = result.actual_stdout.trim().parse::<i64>();
        if let (Ok(expected), Ok(actual)) = (expected, actual) {
            if (expected - actual).abs() == 1 {
                hints.push(DefectDescriptor::inferred(
                    LogicRule::OffByOne,
                    None,
                    format!("oracle expected {expected} but got {actual}: off by exactly one"),
                    AnalysisTier::Heuristic,
                ));
            }
        }
    }
    hints
}
