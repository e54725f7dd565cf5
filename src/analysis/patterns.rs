//! Pattern-rule battery.
//!
//! Two families, both run unconditionally and independently: AST-backed
//! rules for Python (exact tier) and regex rules for the heuristic-tier
//! languages. Every rule carries its fixed base confidence via
//! [`LogicRule::base_confidence`].

use regex::Regex;
use std::sync::OnceLock;
use tree_sitter::Node;

use super::parser::{descendants_of_kind, node_line, node_text};
use crate::defect::{AnalysisTier, DefectDescriptor, LogicRule};
use crate::language::Language;

// ---------------------------------------------------------------------------
// Exact tier: Python AST rules
// ---------------------------------------------------------------------------

pub fn python_ast_rules(root: Node, source: &str) -> Vec<DefectDescriptor> {
    let mut findings = Vec::new();
    off_by_one_ranges(root, source, &mut findings);
    recursion_without_base_case(root, source, &mut findings);
    constant_comparisons(root, source, &mut findings);
    inconsistent_returns(root, source, &mut findings);
    empty_loop_bodies(root, &mut findings);
    findings
}

/// Off-by-one ranges correlated with adjacent indexing: a loop over
/// `range(...)` whose body indexes with `i + 1`, or a `range(1, ...)` whose
/// body indexes with the bare loop variable.
fn off_by_one_ranges(root: Node, source: &str, findings: &mut Vec<DefectDescriptor>) {
    for loop_node in descendants_of_kind(root, "for_statement") {
        let Some(target) = loop_node.child_by_field_name("left") else {
            continue;
        };
        if target.kind() != "identifier" {
            continue;
        }
        let loop_var = node_text(target, source);
        let Some(iter) = loop_node.child_by_field_name("right") else {
            continue;
        };
        if !is_range_call(iter, source) {
            continue;
        }
        let Some(body) = loop_node.child_by_field_name("body") else {
            continue;
        };

        for subscript in descendants_of_kind(body, "subscript") {
            let Some(index) = subscript.child_by_field_name("subscript") else {
                continue;
            };
            let index_text = node_text(index, source).replace(' ', "");
            if index_text == format!("{loop_var}+1") {
                findings.push(DefectDescriptor::inferred(
                    LogicRule::OffByOne,
                    Some(node_line(subscript)),
                    format!(
                        "loop over range indexes with '{loop_var} + 1'; the last iteration runs past the end"
                    ),
                    AnalysisTier::Exact,
                ));
            } else if index_text == loop_var && range_starts_at_one(iter, source) {
                findings.push(DefectDescriptor::inferred(
                    LogicRule::OffByOne,
                    Some(node_line(loop_node)),
                    format!("range starts at 1 but '{loop_var}' also indexes from the start"),
                    AnalysisTier::Exact,
                ));
            }
        }
    }
}

fn is_range_call(node: Node, source: &str) -> bool {
    node.kind() == "call"
        && node
            .child_by_field_name("function")
            .map(|f| node_text(f, source) == "range")
            .unwrap_or(false)
}

fn range_starts_at_one(call: Node, source: &str) -> bool {
    let Some(args) = call.child_by_field_name("arguments") else {
        return false;
    };
    let mut cursor = args.walk();
    let first = args.named_children(&mut cursor).next();
    matches!(first, Some(arg) if arg.kind() == "integer" && node_text(arg, source) == "1")
        && args.named_child_count() >= 2
}

/// A function that calls itself with no conditional early return cannot stop
/// recursing.
fn recursion_without_base_case(root: Node, source: &str, findings: &mut Vec<DefectDescriptor>) {
    for func in descendants_of_kind(root, "function_definition") {
        let Some(name_node) = func.child_by_field_name("name") else {
            continue;
        };
        let name = node_text(name_node, source);
        let Some(body) = func.child_by_field_name("body") else {
            continue;
        };
        let is_recursive = descendants_of_kind(body, "call").iter().any(|call| {
            call.child_by_field_name("function")
                .map(|f| node_text(f, source) == name)
                .unwrap_or(false)
        });
        if !is_recursive {
            continue;
        }
        let has_conditional_return = descendants_of_kind(body, "if_statement")
            .iter()
            .any(|branch| !descendants_of_kind(*branch, "return_statement").is_empty());
        if !has_conditional_return {
            findings.push(DefectDescriptor::inferred(
                LogicRule::MissingBaseCase,
                Some(node_line(func)),
                format!("recursive function '{name}' has no conditional early return (base case)"),
                AnalysisTier::Exact,
            ));
        }
    }
}

/// Comparisons decidable at a glance: two literals, or a comparison against
/// a boolean literal.
fn constant_comparisons(root: Node, source: &str, findings: &mut Vec<DefectDescriptor>) {
    for cmp in descendants_of_kind(root, "comparison_operator") {
        let mut cursor = cmp.walk();
        let operands: Vec<Node> = cmp.named_children(&mut cursor).collect();
        if operands.len() != 2 {
            continue;
        }
        let literal = |n: &Node| {
            matches!(
                n.kind(),
                "integer" | "float" | "string" | "true" | "false" | "none"
            )
        };
        let boolean = |n: &Node| matches!(n.kind(), "true" | "false");
        if operands.iter().all(literal) {
            findings.push(DefectDescriptor::inferred(
                LogicRule::AlwaysTrueCondition,
                Some(node_line(cmp)),
                format!("comparison '{}' is decided at parse time", node_text(cmp, source)),
                AnalysisTier::Exact,
            ));
        } else if operands.iter().any(boolean) {
            findings.push(DefectDescriptor::inferred(
                LogicRule::RedundantBooleanComparison,
                Some(node_line(cmp)),
                "comparison against a boolean literal; use the value directly".to_string(),
                AnalysisTier::Exact,
            ));
        }
    }
}

/// Functions where some paths return a value and others return bare.
fn inconsistent_returns(root: Node, source: &str, findings: &mut Vec<DefectDescriptor>) {
    for func in descendants_of_kind(root, "function_definition") {
        let Some(body) = func.child_by_field_name("body") else {
            continue;
        };
        let returns = descendants_of_kind(body, "return_statement");
        let with_value = returns.iter().filter(|r| r.named_child_count() > 0).count();
        let bare = returns.len() - with_value;
        if with_value > 0 && bare > 0 {
            let name = func
                .child_by_field_name("name")
                .map(|n| node_text(n, source))
                .unwrap_or("<anonymous>");
            findings.push(DefectDescriptor::inferred(
                LogicRule::InconsistentReturn,
                Some(node_line(func)),
                format!("'{name}' returns a value on some paths and None on others"),
                AnalysisTier::Exact,
            ));
        }
    }
}

/// Loops whose entire body is `pass`.
fn empty_loop_bodies(root: Node, findings: &mut Vec<DefectDescriptor>) {
    for kind in ["while_statement", "for_statement"] {
        for loop_node in descendants_of_kind(root, kind) {
            let Some(body) = loop_node.child_by_field_name("body") else {
                continue;
            };
            if body.named_child_count() == 1
                && body.named_child(0).map(|n| n.kind()) == Some("pass_statement")
            {
                findings.push(DefectDescriptor::inferred(
                    LogicRule::EmptyControlBody,
                    Some(node_line(loop_node)),
                    "loop body is just 'pass'".to_string(),
                    AnalysisTier::Exact,
                ));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Heuristic tier: regex rules for C, C++, Java, JavaScript, Go
// ---------------------------------------------------------------------------

fn rx(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("pattern regex"))
}

pub fn heuristic_rules(
    source: &str,
    language: Language,
    break_scan_window: usize,
) -> Vec<DefectDescriptor> {
    static ASSIGN_IN_COND: OnceLock<Regex> = OnceLock::new();
    static WHILE_TRUE: OnceLock<Regex> = OnceLock::new();
    static GO_FOREVER: OnceLock<Regex> = OnceLock::new();
    static CONTROL_SEMI: OnceLock<Regex> = OnceLock::new();
    static FOR_FROM_ONE: OnceLock<Regex> = OnceLock::new();
    static LE_LENGTH: OnceLock<Regex> = OnceLock::new();
    static BOOL_LITERAL: OnceLock<Regex> = OnceLock::new();
    static FUNC_DECL: OnceLock<Regex> = OnceLock::new();

    let assign_in_cond = rx(
        &ASSIGN_IN_COND,
        r"(?:if|while)\s*\(\s*[A-Za-z_][\w\[\].]*\s*=\s*[^=]",
    );
    let while_true = rx(
        &WHILE_TRUE,
        r"while\s*\(\s*(?:true|1)\s*\)|for\s*\(\s*;\s*;\s*\)",
    );
    let go_forever = rx(&GO_FOREVER, r"^\s*for\s*\{");
    let control_semi = rx(&CONTROL_SEMI, r"\b(?:if|for|while)\s*\([^)]*\)\s*;\s*$");
    let for_from_one = rx(&FOR_FROM_ONE, r"for\s*\(\s*(?:\w+\s+)?\w+\s*=\s*1\s*;[^;]*<=");
    let le_length = rx(&LE_LENGTH, r"<=\s*\w+(?:\.length|\.size\(\)|\.length\(\))");
    let bool_literal = rx(&BOOL_LITERAL, r"[=!]=\s*(?:true|false)\b");
    let func_decl = rx(
        &FUNC_DECL,
        r"^\s*(int|float|double|long|short|bool|char|std::string|String)\s+(\w+)\s*\([^)]*\)\s*\{?\s*$",
    );

    let c_like = matches!(
        language,
        Language::C | Language::Cpp | Language::Java | Language::JavaScript
    );
    let lines: Vec<&str> = source.lines().collect();
    let mut findings = Vec::new();

    let is_comment =
        |line: &str| line.trim_start().starts_with("//") || line.trim_start().starts_with('*');

    for (idx, line) in lines.iter().enumerate() {
        if is_comment(line) {
            continue;
        }
        let lineno = idx as u32 + 1;

        if c_like && assign_in_cond.is_match(line) {
            findings.push(DefectDescriptor::inferred(
                LogicRule::AssignmentInCondition,
                Some(lineno),
                "assignment in condition; did you mean '==' ?".to_string(),
                AnalysisTier::Heuristic,
            ));
        }

        let forever = (c_like && while_true.is_match(line))
            || (language == Language::Go && go_forever.is_match(line));
        if forever {
            let window_end = (idx + break_scan_window).min(lines.len());
            let has_break = lines[idx..window_end]
                .iter()
                .any(|body_line| body_line.contains("break"));
            if !has_break {
                findings.push(DefectDescriptor::inferred(
                    LogicRule::InfiniteLoop,
                    Some(lineno),
                    "unconditional loop with no break in sight".to_string(),
                    AnalysisTier::Heuristic,
                ));
            }
        }

        if c_like && control_semi.is_match(line) {
            findings.push(DefectDescriptor::inferred(
                LogicRule::EmptyControlBody,
                Some(lineno),
                "semicolon right after the condition makes the body empty".to_string(),
                AnalysisTier::Heuristic,
            ));
        }

        if for_from_one.is_match(line) || le_length.is_match(line) {
            findings.push(DefectDescriptor::inferred(
                LogicRule::OffByOne,
                Some(lineno),
                "loop bounds look off by one ('<=' against a length, or counting from 1)"
                    .to_string(),
                AnalysisTier::Heuristic,
            ));
        }

        if c_like && bool_literal.is_match(line) {
            findings.push(DefectDescriptor::inferred(
                LogicRule::RedundantBooleanComparison,
                Some(lineno),
                "comparison against a boolean literal".to_string(),
                AnalysisTier::Heuristic,
            ));
        }
    }

    // Missing return for value-returning functions (C/C++/Java only; the
    // single-pass brace scan is knowingly crude — heuristic tier).
    if matches!(language, Language::C | Language::Cpp | Language::Java) {
        let mut current: Option<(u32, String, bool)> = None; // (decl line, name, saw return)
        for (idx, line) in lines.iter().enumerate() {
            if let Some(caps) = func_decl.captures(line) {
                let name = caps[2].to_string();
                if name != "main" {
                    current = Some((idx as u32 + 1, name, false));
                } else {
                    current = None;
                }
                continue;
            }
            if let Some((decl_line, name, saw_return)) = current.as_mut() {
                if line.contains("return") {
                    *saw_return = true;
                }
                if line.trim_start().starts_with('}') {
                    if !*saw_return {
                        findings.push(DefectDescriptor::inferred(
                            LogicRule::InconsistentReturn,
                            Some(*decl_line),
                            format!("'{name}' declares a return type but never returns a value"),
                            AnalysisTier::Heuristic,
                        ));
                    }
                    current = None;
                }
            }
        }
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::parser::parse;
    use crate::defect::DefectKind;

    fn python_findings(source: &str) -> Vec<DefectDescriptor> {
        let tree = parse(source, Language::Python).unwrap();
        python_ast_rules(tree.root_node(), source)
    }

    fn has_rule(findings: &[DefectDescriptor], rule: LogicRule) -> bool {
        findings
            .iter()
            .any(|d| d.kind == DefectKind::Logical(rule))
    }

    #[test]
    fn off_by_one_plus_one_indexing() {
        let source = "def total(arr, n):\n    total = 0\n    for i in range(0, n):\n        total += arr[i + 1]\n    return total\n";
        let findings = python_findings(source);
        assert!(has_rule(&findings, LogicRule::OffByOne));
    }

    #[test]
    fn clean_indexing_not_flagged() {
        let source = "def total(arr, n):\n    t = 0\n    for i in range(0, n):\n        t += arr[i]\n    return t\n";
        assert!(!has_rule(&python_findings(source), LogicRule::OffByOne));
    }

    #[test]
    fn factorial_without_base_case_flagged_strongly() {
        let source = "def factorial(n):\n    return n * factorial(n - 1)\n";
        let findings = python_findings(source);
        let finding = findings
            .iter()
            .find(|d| d.kind == DefectKind::Logical(LogicRule::MissingBaseCase))
            .expect("base-case finding");
        assert!(finding.confidence >= 0.7);
    }

    #[test]
    fn factorial_with_base_case_is_clean() {
        let source =
            "def factorial(n):\n    if n <= 1:\n        return 1\n    return n * factorial(n - 1)\n";
        assert!(!has_rule(&python_findings(source), LogicRule::MissingBaseCase));
    }

    #[test]
    fn literal_comparison_flagged() {
        let findings = python_findings("if 1 == 1:\n    print('yes')\n");
        assert!(has_rule(&findings, LogicRule::AlwaysTrueCondition));
    }

    #[test]
    fn boolean_literal_comparison_flagged() {
        let findings = python_findings("flag = True\nif flag == True:\n    print('x')\n");
        assert!(has_rule(&findings, LogicRule::RedundantBooleanComparison));
    }

    #[test]
    fn mixed_returns_flagged() {
        let source =
            "def f(x):\n    if x:\n        return 1\n    return\n";
        assert!(has_rule(&python_findings(source), LogicRule::InconsistentReturn));
    }

    #[test]
    fn c_assignment_in_condition() {
        let source = "#include <stdio.h>\nint main() {\n    int x = 3;\n    if (x = 5) {\n        printf(\"five\\n\");\n    }\n    return 0;\n}\n";
        let findings = heuristic_rules(source, Language::C, 20);
        let finding = findings
            .iter()
            .find(|d| d.kind == DefectKind::Logical(LogicRule::AssignmentInCondition))
            .expect("assignment-in-condition");
        assert_eq!(finding.line, Some(4));
        assert!((finding.confidence - 0.95).abs() < f64::EPSILON);
        assert_eq!(finding.tier, AnalysisTier::Heuristic);
    }

    #[test]
    fn equality_comparison_not_flagged() {
        let source = "if (x == 5) {\n}\nwhile (y <= 3) {\n    y++;\n}\n";
        let findings = heuristic_rules(source, Language::C, 20);
        assert!(!has_rule(&findings, LogicRule::AssignmentInCondition));
    }

    #[test]
    fn java_while_true_without_break() {
        let source = "public class Main {\n    public static void main(String[] a) {\n        while (true) {\n            System.out.println(1);\n        }\n    }\n}\n";
        let findings = heuristic_rules(source, Language::Java, 20);
        assert!(has_rule(&findings, LogicRule::InfiniteLoop));
    }

    #[test]
    fn java_while_true_with_break_ok() {
        let source = "while (true) {\n    break;\n}\n";
        let findings = heuristic_rules(source, Language::Java, 20);
        assert!(!has_rule(&findings, LogicRule::InfiniteLoop));
    }

    #[test]
    fn go_bare_for_without_break() {
        let source = "package main\nfunc main() {\n    for {\n        x := 1\n        _ = x\n    }\n}\n";
        let findings = heuristic_rules(source, Language::Go, 20);
        assert!(has_rule(&findings, LogicRule::InfiniteLoop));
    }

    #[test]
    fn semicolon_after_condition() {
        let source = "for (int i = 0; i < n; i++) ;\n";
        let findings = heuristic_rules(source, Language::Cpp, 20);
        assert!(has_rule(&findings, LogicRule::EmptyControlBody));
    }

    #[test]
    fn le_length_bound_flagged() {
        let source = "for (int i = 0; i <= arr.length; i++) {\n    sum += arr[i];\n}\n";
        let findings = heuristic_rules(source, Language::Java, 20);
        assert!(has_rule(&findings, LogicRule::OffByOne));
    }

    #[test]
    fn missing_return_in_value_function() {
        let source = "int add(int a, int b)\n{\n    int c = a + b;\n}\n";
        let findings = heuristic_rules(source, Language::C, 20);
        assert!(has_rule(&findings, LogicRule::InconsistentReturn));
    }
}
