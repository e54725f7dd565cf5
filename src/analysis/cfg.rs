//! Control-flow graphs for Python functions.
//!
//! One graph per function (plus one for the module top level), rebuilt on
//! every analysis call and never persisted across iterations. Edges cover
//! all transfers: sequential flow, branches, loop back-edges, and the early
//! exits (`return`, `break`, `continue`).

use tree_sitter::Node;

use super::parser::{descendants_of_kind, node_line, node_text, walk};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfgNodeKind {
    Entry,
    Exit,
    Statement,
    Branch,
    LoopHeader,
}

#[derive(Debug)]
pub struct CfgNode {
    pub line: Option<u32>,
    pub kind: CfgNodeKind,
    pub succs: Vec<usize>,
}

#[derive(Debug)]
pub struct ControlFlowGraph {
    pub nodes: Vec<CfgNode>,
    pub entry: usize,
    pub exit: usize,
}

impl ControlFlowGraph {
    /// Lines of nodes not reachable by forward traversal from the entry.
    pub fn unreachable_lines(&self) -> Vec<u32> {
        let mut visited = vec![false; self.nodes.len()];
        let mut stack = vec![self.entry];
        while let Some(idx) = stack.pop() {
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            for &succ in &self.nodes[idx].succs {
                if !visited[succ] {
                    stack.push(succ);
                }
            }
        }
        let mut lines: Vec<u32> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(idx, node)| {
                !visited[*idx] && !matches!(node.kind, CfgNodeKind::Entry | CfgNodeKind::Exit)
            })
            .filter_map(|(_, node)| node.line)
            .collect();
        lines.sort_unstable();
        lines.dedup();
        lines
    }

    /// True when some loop header has a back-edge pointing at it.
    pub fn has_back_edge(&self) -> bool {
        self.nodes.iter().enumerate().any(|(idx, node)| {
            matches!(node.kind, CfgNodeKind::LoopHeader)
                && self
                    .nodes
                    .iter()
                    .enumerate()
                    .any(|(other, n)| other > idx && n.succs.contains(&idx))
        })
    }
}

/// Build a CFG per function definition, plus one for the module top level
/// (labelled `<module>`).
pub fn function_cfgs(root: Node, source: &str) -> Vec<(String, ControlFlowGraph)> {
    let mut graphs = Vec::new();
    for func in descendants_of_kind(root, "function_definition") {
        let name = func
            .child_by_field_name("name")
            .map(|n| node_text(n, source).to_string())
            .unwrap_or_else(|| "<anonymous>".to_string());
        if let Some(body) = func.child_by_field_name("body") {
            graphs.push((name, build_cfg(body)));
        }
    }
    graphs.push(("<module>".to_string(), build_cfg(root)));
    graphs
}

struct LoopCtx {
    header: usize,
    breaks: Vec<usize>,
}

struct Builder {
    nodes: Vec<CfgNode>,
    loops: Vec<LoopCtx>,
}

const ENTRY: usize = 0;
const EXIT: usize = 1;

fn build_cfg(block: Node) -> ControlFlowGraph {
    let mut builder = Builder {
        nodes: vec![
            CfgNode {
                line: None,
                kind: CfgNodeKind::Entry,
                succs: Vec::new(),
            },
            CfgNode {
                line: None,
                kind: CfgNodeKind::Exit,
                succs: Vec::new(),
            },
        ],
        loops: Vec::new(),
    };
    let exits = builder.process_block(block, vec![ENTRY]);
    builder.connect(&exits, EXIT);
    ControlFlowGraph {
        nodes: builder.nodes,
        entry: ENTRY,
        exit: EXIT,
    }
}

impl Builder {
    fn add(&mut self, line: u32, kind: CfgNodeKind) -> usize {
        self.nodes.push(CfgNode {
            line: Some(line),
            kind,
            succs: Vec::new(),
        });
        self.nodes.len() - 1
    }

    fn connect(&mut self, preds: &[usize], to: usize) {
        for &pred in preds {
            if !self.nodes[pred].succs.contains(&to) {
                self.nodes[pred].succs.push(to);
            }
        }
    }

    /// Process a statement list; returns the dangling exits that flow into
    /// whatever comes next. Statements after a terminator still get nodes
    /// (with no incoming edges), which is exactly what makes them
    /// unreachable in the traversal.
    fn process_block(&mut self, block: Node, mut preds: Vec<usize>) -> Vec<usize> {
        let mut cursor = block.walk();
        let statements: Vec<Node> = block
            .named_children(&mut cursor)
            .filter(|n| n.kind() != "comment")
            .collect();
        for stmt in statements {
            preds = self.process_statement(stmt, preds);
        }
        preds
    }

    fn process_statement(&mut self, stmt: Node, preds: Vec<usize>) -> Vec<usize> {
        let line = node_line(stmt);
        match stmt.kind() {
            "if_statement" => {
                let branch = self.add(line, CfgNodeKind::Branch);
                self.connect(&preds, branch);
                let mut exits = Vec::new();
                if let Some(consequence) = stmt.child_by_field_name("consequence") {
                    exits.extend(self.process_block(consequence, vec![branch]));
                }
                let mut has_else = false;
                let mut cursor = stmt.walk();
                let alternatives: Vec<Node> =
                    stmt.children_by_field_name("alternative", &mut cursor).collect();
                for alt in alternatives {
                    match alt.kind() {
                        "elif_clause" => {
                            if let Some(block) = alt.child_by_field_name("consequence") {
                                exits.extend(self.process_block(block, vec![branch]));
                            }
                        }
                        "else_clause" => {
                            has_else = true;
                            if let Some(block) = alt.child_by_field_name("body") {
                                exits.extend(self.process_block(block, vec![branch]));
                            }
                        }
                        _ => {}
                    }
                }
                if !has_else {
                    // Condition may be false: fall through past the if
                    exits.push(branch);
                }
                exits
            }
            "while_statement" | "for_statement" => {
                let header = self.add(line, CfgNodeKind::LoopHeader);
                self.connect(&preds, header);
                self.loops.push(LoopCtx {
                    header,
                    breaks: Vec::new(),
                });
                if let Some(body) = stmt.child_by_field_name("body") {
                    let body_exits = self.process_block(body, vec![header]);
                    self.connect(&body_exits, header); // back-edge
                }
                let ctx = self.loops.pop().expect("loop context");
                let mut exits = vec![ctx.header];
                exits.extend(ctx.breaks);
                exits
            }
            "return_statement" => {
                let node = self.add(line, CfgNodeKind::Statement);
                self.connect(&preds, node);
                self.connect(&[node], EXIT);
                Vec::new()
            }
            "break_statement" => {
                let node = self.add(line, CfgNodeKind::Statement);
                self.connect(&preds, node);
                if let Some(ctx) = self.loops.last_mut() {
                    ctx.breaks.push(node);
                }
                Vec::new()
            }
            "continue_statement" => {
                let node = self.add(line, CfgNodeKind::Statement);
                self.connect(&preds, node);
                let header = self.loops.last().map(|ctx| ctx.header);
                if let Some(header) = header {
                    self.connect(&[node], header);
                }
                Vec::new()
            }
            _ => {
                let node = self.add(line, CfgNodeKind::Statement);
                self.connect(&preds, node);
                vec![node]
            }
        }
    }
}

/// A loop that data-flow says can never terminate.
#[derive(Debug)]
pub struct InfiniteLoopFinding {
    pub line: u32,
    /// Condition variables never written in the body (empty when the
    /// condition is a bare `True`).
    pub stuck_vars: Vec<String>,
}

/// Loop headers whose condition variables are never written in the loop body
/// and whose body contains no `break`.
///
/// Conservative by design: a loop made finite through aliasing or an opaque
/// call that mutates the condition's operands will still be reported, and a
/// loop terminated by `sys.exit` inside a helper will not be. Detection is
/// limited to what the define/use scan of the body can prove.
pub fn infinite_loops(root: Node, source: &str) -> Vec<InfiniteLoopFinding> {
    let mut findings = Vec::new();
    for loop_node in descendants_of_kind(root, "while_statement") {
        let Some(condition) = loop_node.child_by_field_name("condition") else {
            continue;
        };
        let Some(body) = loop_node.child_by_field_name("body") else {
            continue;
        };
        let has_break = !descendants_of_kind(body, "break_statement").is_empty();
        if has_break {
            continue;
        }

        if condition.kind() == "true" {
            findings.push(InfiniteLoopFinding {
                line: node_line(loop_node),
                stuck_vars: Vec::new(),
            });
            continue;
        }

        let condition_vars: Vec<String> = descendants_of_kind(condition, "identifier")
            .iter()
            .map(|n| node_text(*n, source).to_string())
            .collect();
        if condition_vars.is_empty() {
            continue;
        }
        let written = written_names(body, source);
        let mut stuck: Vec<String> = condition_vars
            .into_iter()
            .filter(|var| !written.contains(var))
            .collect();
        stuck.sort();
        stuck.dedup();
        if !stuck.is_empty() {
            findings.push(InfiniteLoopFinding {
                line: node_line(loop_node),
                stuck_vars: stuck,
            });
        }
    }
    findings
}

/// Names assigned anywhere within `node` (plain, augmented, and loop-target
/// assignments).
fn written_names(node: Node, source: &str) -> Vec<String> {
    let mut written = Vec::new();
    walk(node, &mut |n| {
        let target = match n.kind() {
            "assignment" | "augmented_assignment" => n.child_by_field_name("left"),
            "for_statement" => n.child_by_field_name("left"),
            _ => None,
        };
        if let Some(target) = target {
            for ident in descendants_of_kind(target, "identifier") {
                written.push(node_text(ident, source).to_string());
            }
        }
    });
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::parser::parse;
    use crate::language::Language;

    fn cfgs(source: &str) -> Vec<(String, ControlFlowGraph)> {
        let tree = parse(source, Language::Python).unwrap();
        function_cfgs(tree.root_node(), source)
    }

    #[test]
    fn code_after_return_is_unreachable() {
        let source = "def f():\n    return 42\n    print('never')\n";
        let graphs = cfgs(source);
        let (_, graph) = graphs.iter().find(|(name, _)| name == "f").unwrap();
        assert_eq!(graph.unreachable_lines(), vec![3]);
    }

    #[test]
    fn straight_line_code_is_fully_reachable() {
        let source = "def f():\n    x = 1\n    return x\n";
        let graphs = cfgs(source);
        let (_, graph) = graphs.iter().find(|(name, _)| name == "f").unwrap();
        assert!(graph.unreachable_lines().is_empty());
    }

    #[test]
    fn branches_do_not_create_false_unreachability() {
        let source = "def f(x):\n    if x:\n        return 1\n    return 2\n";
        let graphs = cfgs(source);
        let (_, graph) = graphs.iter().find(|(name, _)| name == "f").unwrap();
        assert!(graph.unreachable_lines().is_empty());
    }

    #[test]
    fn loops_have_back_edges() {
        let source = "def f(n):\n    while n > 0:\n        n -= 1\n    return n\n";
        let graphs = cfgs(source);
        let (_, graph) = graphs.iter().find(|(name, _)| name == "f").unwrap();
        assert!(graph.has_back_edge());
        assert!(graph.unreachable_lines().is_empty());
    }

    #[test]
    fn while_with_unwritten_condition_var_is_infinite() {
        let source = "i = 0\nwhile i < 10:\n    print(i)\n";
        let tree = parse(source, Language::Python).unwrap();
        let findings = infinite_loops(tree.root_node(), source);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 2);
        assert_eq!(findings[0].stuck_vars, vec!["i".to_string()]);
    }

    #[test]
    fn incremented_loop_is_not_flagged() {
        let source = "i = 0\nwhile i < 10:\n    i += 1\n";
        let tree = parse(source, Language::Python).unwrap();
        assert!(infinite_loops(tree.root_node(), source).is_empty());
    }

    #[test]
    fn while_true_without_break_is_infinite() {
        let source = "while True:\n    print('spin')\n";
        let tree = parse(source, Language::Python).unwrap();
        let findings = infinite_loops(tree.root_node(), source);
        assert_eq!(findings.len(), 1);
        assert!(findings[0].stuck_vars.is_empty());
    }

    #[test]
    fn while_true_with_break_is_fine() {
        let source = "while True:\n    break\n";
        let tree = parse(source, Language::Python).unwrap();
        assert!(infinite_loops(tree.root_node(), source).is_empty());
    }
}
