//! Tree-sitter parser pool for the exact-tier languages.
//!
//! Parsers are expensive to construct but reusable, so each thread keeps its
//! own pre-configured instance per grammar. Only Python and JavaScript carry
//! grammars here; the remaining languages are analyzed heuristically and
//! never reach this module.

use std::cell::RefCell;
use tree_sitter::{Node, Parser, Tree};

use crate::language::Language;

thread_local! {
    static PYTHON_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        // Grammar mismatch surfaces at parse time as None
        let _ = p.set_language(&tree_sitter_python::LANGUAGE.into());
        p
    });

    static JS_PARSER: RefCell<Parser> = RefCell::new({
        let mut p = Parser::new();
        let _ = p.set_language(&tree_sitter_javascript::LANGUAGE.into());
        p
    });
}

/// Parse `source` with the pooled parser for `language`. Returns `None` for
/// languages without a grammar or if the parser itself fails (distinct from
/// a tree containing error nodes).
pub fn parse(source: &str, language: Language) -> Option<Tree> {
    match language {
        Language::Python => PYTHON_PARSER.with(|p| p.borrow_mut().parse(source, None)),
        Language::JavaScript => JS_PARSER.with(|p| p.borrow_mut().parse(source, None)),
        _ => None,
    }
}

/// Whether the parse tree contains syntax error nodes. `None` when the
/// language has no grammar to check against.
pub fn syntax_error_line(source: &str, language: Language) -> Option<Result<(), u32>> {
    let tree = parse(source, language)?;
    let root = tree.root_node();
    if !root.has_error() {
        return Some(Ok(()));
    }
    Some(Err(first_error_line(root).unwrap_or(1)))
}

fn first_error_line(node: Node) -> Option<u32> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row as u32 + 1);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            if let Some(line) = first_error_line(child) {
                return Some(line);
            }
        }
    }
    None
}

/// Slice of `source` covered by `node`.
pub fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    &source[node.start_byte()..node.end_byte()]
}

/// 1-based line of a node's start.
pub fn node_line(node: Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// Preorder traversal applying `visit` to every node.
pub fn walk<'t>(node: Node<'t>, visit: &mut impl FnMut(Node<'t>)) {
    visit(node);
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        walk(child, visit);
    }
}

/// Collect all descendant nodes (including `root`) of the given kind.
pub fn descendants_of_kind<'t>(root: Node<'t>, kind: &str) -> Vec<Node<'t>> {
    let mut found = Vec::new();
    walk(root, &mut |node| {
        if node.kind() == kind {
            found.push(node);
        }
    });
    found
}
