//! Data-flow facts for Python: ordered define/use events per scope.
//!
//! Scopes are the module plus each function body. An identifier's first use
//! must be preceded by an in-scope define (builtins excluded); a violation
//! is an uninitialized-use finding. Function bodies treat every module-level
//! name as defined regardless of position, since the body runs after the
//! module does — only module-level code is order-sensitive.

use std::collections::HashSet;
use tree_sitter::Node;

use super::parser::{descendants_of_kind, node_line, node_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Define,
    Use,
}

#[derive(Debug, Clone)]
pub struct DataFlowEvent {
    pub name: String,
    pub line: u32,
    pub kind: EventKind,
}

/// Python builtins that count as always-defined.
const BUILTINS: &[&str] = &[
    "print", "len", "range", "int", "str", "float", "bool", "list", "dict", "set", "tuple",
    "sum", "min", "max", "abs", "round", "enumerate", "zip", "map", "filter", "sorted",
    "reversed", "input", "open", "type", "isinstance", "issubclass", "repr", "hash", "id",
    "iter", "next", "any", "all", "ord", "chr", "divmod", "pow", "format", "super",
    "Exception", "ValueError", "TypeError", "IndexError", "KeyError", "ZeroDivisionError",
    "RuntimeError", "StopIteration", "AttributeError", "NameError", "OverflowError",
    "NotImplementedError", "None", "True", "False", "self", "__name__",
];

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Names the module scope defines anywhere (assignments, defs, imports).
fn module_level_defines(root: Node, source: &str) -> HashSet<String> {
    ordered_events(root, source, true)
        .into_iter()
        .filter(|event| event.kind == EventKind::Define)
        .map(|event| event.name)
        .collect()
}

/// Uses with no preceding in-scope define, as `(name, line)` pairs, one per
/// name per scope.
pub fn uninitialized_uses(root: Node, source: &str) -> Vec<(String, u32)> {
    let mut findings = Vec::new();
    let module_defines = module_level_defines(root, source);

    // Module scope: strictly order-sensitive.
    scan_scope(
        &ordered_events(root, source, true),
        &HashSet::new(),
        &mut findings,
    );

    // Function scopes: parameters plus every module-level name are the
    // prelude; the body itself is order-sensitive.
    for func in descendants_of_kind(root, "function_definition") {
        let mut prelude = module_defines.clone();
        if let Some(params) = func.child_by_field_name("parameters") {
            for ident in descendants_of_kind(params, "identifier") {
                prelude.insert(node_text(ident, source).to_string());
            }
        }
        if let Some(body) = func.child_by_field_name("body") {
            scan_scope(&ordered_events(body, source, false), &prelude, &mut findings);
        }
    }
    findings
}

fn scan_scope(
    events: &[DataFlowEvent],
    prelude: &HashSet<String>,
    findings: &mut Vec<(String, u32)>,
) {
    let mut defined: HashSet<&str> = prelude.iter().map(String::as_str).collect();
    let mut reported: HashSet<&str> = HashSet::new();
    for event in events {
        match event.kind {
            EventKind::Define => {
                defined.insert(event.name.as_str());
            }
            EventKind::Use => {
                if !defined.contains(event.name.as_str())
                    && !is_builtin(&event.name)
                    && reported.insert(event.name.as_str())
                {
                    findings.push((event.name.clone(), event.line));
                }
            }
        }
    }
}

/// Collect define/use events for one scope in evaluation order. With
/// `is_module` set, nested function bodies are skipped (their events belong
/// to the inner scope) while the function names themselves still define.
pub fn ordered_events(scope: Node, source: &str, is_module: bool) -> Vec<DataFlowEvent> {
    let mut events = Vec::new();
    let mut cursor = scope.walk();
    for child in scope.named_children(&mut cursor) {
        collect(child, source, &mut events, is_module);
    }
    events
}

fn collect(node: Node, source: &str, events: &mut Vec<DataFlowEvent>, skip_nested_bodies: bool) {
    match node.kind() {
        "function_definition" | "class_definition" => {
            if let Some(name) = node.child_by_field_name("name") {
                push(events, name, source, EventKind::Define);
            }
            // Inner scope; its params and body are analyzed separately.
            let _ = skip_nested_bodies;
        }
        "assignment" => {
            // Right side evaluates first
            if let Some(right) = node.child_by_field_name("right") {
                collect(right, source, events, skip_nested_bodies);
            }
            if let Some(left) = node.child_by_field_name("left") {
                collect_targets(left, source, events, skip_nested_bodies);
            }
        }
        "augmented_assignment" => {
            // `x += 1` reads x before writing it
            if let Some(right) = node.child_by_field_name("right") {
                collect(right, source, events, skip_nested_bodies);
            }
            if let Some(left) = node.child_by_field_name("left") {
                if left.kind() == "identifier" {
                    push(events, left, source, EventKind::Use);
                    push(events, left, source, EventKind::Define);
                } else {
                    collect(left, source, events, skip_nested_bodies);
                }
            }
        }
        "named_expression" => {
            if let Some(value) = node.child_by_field_name("value") {
                collect(value, source, events, skip_nested_bodies);
            }
            if let Some(name) = node.child_by_field_name("name") {
                push(events, name, source, EventKind::Define);
            }
        }
        "for_statement" => {
            if let Some(right) = node.child_by_field_name("right") {
                collect(right, source, events, skip_nested_bodies);
            }
            if let Some(left) = node.child_by_field_name("left") {
                collect_targets(left, source, events, skip_nested_bodies);
            }
            if let Some(body) = node.child_by_field_name("body") {
                let mut cursor = body.walk();
                for child in body.named_children(&mut cursor) {
                    collect(child, source, events, skip_nested_bodies);
                }
            }
        }
        "list_comprehension" | "set_comprehension" | "dictionary_comprehension"
        | "generator_expression" => {
            // Comprehension clauses bind before the body expression runs
            let mut cursor = node.walk();
            let children: Vec<Node> = node.named_children(&mut cursor).collect();
            for child in children.iter().filter(|c| c.kind() == "for_in_clause") {
                if let Some(right) = child.child_by_field_name("right") {
                    collect(right, source, events, skip_nested_bodies);
                }
                if let Some(left) = child.child_by_field_name("left") {
                    collect_targets(left, source, events, skip_nested_bodies);
                }
            }
            for child in children.iter().filter(|c| c.kind() != "for_in_clause") {
                collect(*child, source, events, skip_nested_bodies);
            }
        }
        "import_statement" | "import_from_statement" => {
            // Every name an import touches counts as defined; precise
            // aliased-import handling is not worth false positives here.
            for ident in descendants_of_kind(node, "identifier") {
                push(events, ident, source, EventKind::Define);
            }
        }
        "global_statement" | "nonlocal_statement" => {
            for ident in descendants_of_kind(node, "identifier") {
                push(events, ident, source, EventKind::Define);
            }
        }
        "lambda" => {
            // Own scope; skipped rather than half-analyzed
        }
        "attribute" => {
            // `obj.attr`: only the object is a variable reference
            if let Some(object) = node.child_by_field_name("object") {
                collect(object, source, events, skip_nested_bodies);
            }
        }
        "keyword_argument" => {
            if let Some(value) = node.child_by_field_name("value") {
                collect(value, source, events, skip_nested_bodies);
            }
        }
        "identifier" => {
            push(events, node, source, EventKind::Use);
        }
        _ => {
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                collect(child, source, events, skip_nested_bodies);
            }
        }
    }
}

/// Assignment-target position: bare identifiers (and tuple/list patterns of
/// them) define; subscript or attribute targets are uses of their bases.
fn collect_targets(
    target: Node,
    source: &str,
    events: &mut Vec<DataFlowEvent>,
    skip_nested_bodies: bool,
) {
    match target.kind() {
        "identifier" => push(events, target, source, EventKind::Define),
        "pattern_list" | "tuple_pattern" | "list_pattern" => {
            let mut cursor = target.walk();
            for child in target.named_children(&mut cursor) {
                collect_targets(child, source, events, skip_nested_bodies);
            }
        }
        // `xs[i] = v` and `obj.field = v` read their bases
        _ => collect(target, source, events, skip_nested_bodies),
    }
}

fn push(events: &mut Vec<DataFlowEvent>, node: Node, source: &str, kind: EventKind) {
    events.push(DataFlowEvent {
        name: node_text(node, source).to_string(),
        line: node_line(node),
        kind,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::parser::parse;
    use crate::language::Language;

    fn uses(source: &str) -> Vec<(String, u32)> {
        let tree = parse(source, Language::Python).unwrap();
        uninitialized_uses(tree.root_node(), source)
    }

    #[test]
    fn use_before_define_at_module_level() {
        let findings = uses("print(total)\ntotal = 0\n");
        assert_eq!(findings, vec![("total".to_string(), 1)]);
    }

    #[test]
    fn define_before_use_is_clean() {
        assert!(uses("total = 0\nprint(total)\n").is_empty());
    }

    #[test]
    fn augmented_assignment_reads_first() {
        let findings = uses("count += 1\n");
        assert_eq!(findings, vec![("count".to_string(), 1)]);
    }

    #[test]
    fn parameters_are_defined_in_function_scope() {
        assert!(uses("def f(n):\n    return n + 1\n").is_empty());
    }

    #[test]
    fn module_names_visible_inside_functions_regardless_of_order() {
        // helper() is called inside f before helper's textual definition;
        // legal because f only runs after the module finishes loading.
        let source = "def f():\n    return helper()\ndef helper():\n    return 1\n";
        assert!(uses(source).is_empty());
    }

    #[test]
    fn builtins_are_not_flagged() {
        assert!(uses("xs = [3, 1, 2]\nprint(sorted(xs), len(xs))\n").is_empty());
    }

    #[test]
    fn loop_target_defines_before_body() {
        assert!(uses("for i in range(3):\n    print(i)\n").is_empty());
    }

    #[test]
    fn comprehension_variable_is_bound() {
        assert!(uses("xs = [1, 2]\nys = [x * 2 for x in xs]\n").is_empty());
    }

    #[test]
    fn subscript_assignment_uses_its_base() {
        let findings = uses("xs[0] = 1\n");
        assert_eq!(findings, vec![("xs".to_string(), 1)]);
    }

    #[test]
    fn each_name_reported_once() {
        let findings = uses("print(a)\nprint(a)\n");
        assert_eq!(findings.len(), 1);
    }
}
