//! Patch candidate generator.
//!
//! Candidates are always whole-file rewrites. Generation is total: every
//! defect kind yields at least one correctness candidate, with a
//! comment-out-the-line fallback for anything unrecognized. Efficiency
//! candidates appear only on request and are capped at two to bound the
//! scorer's fan-out. Generation order carries no ranking meaning — the
//! scorer treats it purely as the final tie-break.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::defect::{DefectDescriptor, DefectKind, LogicRule};
use crate::language::Language;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchCategory {
    Correctness,
    Efficiency,
}

/// One proposed whole-file rewrite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchCandidate {
    pub id: String,
    pub description: String,
    pub category: PatchCategory,
    /// Full replacement text for the source unit.
    pub text: String,
    /// The defect this candidate was generated for.
    pub origin: DefectKind,
}

const EFFICIENCY_CAP: usize = 2;

/// Generate ranked-for-nothing candidates for `defect` against `source`.
pub fn generate(
    defect: &DefectDescriptor,
    source: &str,
    language: Language,
    allow_efficiency: bool,
) -> Vec<PatchCandidate> {
    let mut drafts: Vec<(String, String)> = Vec::new(); // (description, text)

    match &defect.kind {
        DefectKind::Runtime(class) if is_index_class(class) => {
            index_patches(defect, source, language, &mut drafts);
        }
        DefectKind::Runtime(class) if is_name_class(class) => {
            name_patches(defect, source, language, &mut drafts);
        }
        DefectKind::Runtime(class) if is_zero_division_class(class) => {
            zero_division_patches(defect, source, language, &mut drafts);
        }
        DefectKind::Syntax | DefectKind::Compile => {
            syntax_patches(defect, source, language, &mut drafts);
        }
        DefectKind::Timeout | DefectKind::Logical(LogicRule::InfiniteLoop) => {
            loop_patches(defect, source, language, &mut drafts);
        }
        DefectKind::Logical(LogicRule::MissingBaseCase) => {
            base_case_patches(defect, source, language, &mut drafts);
        }
        DefectKind::Logical(LogicRule::OffByOne) => {
            off_by_one_patches(defect, source, &mut drafts);
        }
        DefectKind::Logical(LogicRule::UnreachableCode) => {
            if let Some(line) = defect.line {
                if let Some(text) = remove_line(source, line) {
                    drafts.push(("remove the unreachable statement".to_string(), text));
                }
            }
        }
        DefectKind::Logical(LogicRule::AssignmentInCondition) => {
            if let Some(text) = rewrite_line(source, defect.line, |line| {
                Some(assignment_to_equality(line)?)
            }) {
                drafts.push(("replace '=' with '==' in the condition".to_string(), text));
            }
        }
        DefectKind::Logical(LogicRule::RedundantBooleanComparison) => {
            if let Some(text) = rewrite_line(source, defect.line, strip_boolean_comparison) {
                drafts.push(("drop the comparison against the boolean literal".to_string(), text));
            }
        }
        DefectKind::Logical(LogicRule::EmptyControlBody) => {
            if let Some(text) = rewrite_line(source, defect.line, |line| {
                let trimmed = line.trim_end();
                trimmed
                    .strip_suffix(';')
                    .map(|kept| kept.to_string())
            }) {
                drafts.push(("remove the semicolon that empties the body".to_string(), text));
            }
        }
        _ => {}
    }

    // Generation must be total.
    if drafts.is_empty() {
        drafts.push(fallback_patch(defect, source, language));
    }

    // A candidate identical to the current text can never help.
    drafts.retain(|(_, text)| text != source);
    if drafts.is_empty() {
        drafts.push(fallback_patch(defect, source, language));
    }

    let mut candidates: Vec<PatchCandidate> = drafts
        .into_iter()
        .enumerate()
        .map(|(idx, (description, text))| PatchCandidate {
            id: format!("patch_{idx}"),
            description,
            category: PatchCategory::Correctness,
            text,
            origin: defect.kind.clone(),
        })
        .collect();

    if allow_efficiency {
        let base = candidates.len();
        for (offset, (description, text)) in efficiency_patches(source, language)
            .into_iter()
            .take(EFFICIENCY_CAP)
            .enumerate()
        {
            candidates.push(PatchCandidate {
                id: format!("patch_{}", base + offset),
                description,
                category: PatchCategory::Efficiency,
                text,
                origin: defect.kind.clone(),
            });
        }
    }

    candidates
}

fn is_index_class(class: &str) -> bool {
    matches!(
        class,
        "IndexError" | "ArrayIndexOutOfBoundsException" | "RangeError" | "panic"
    )
}

fn is_name_class(class: &str) -> bool {
    matches!(class, "NameError" | "ReferenceError" | "UnboundLocalError")
}

fn is_zero_division_class(class: &str) -> bool {
    matches!(class, "ZeroDivisionError" | "ArithmeticException")
}

// ---------------------------------------------------------------------------
// Index / bounds errors
// ---------------------------------------------------------------------------

fn index_patches(
    defect: &DefectDescriptor,
    source: &str,
    language: Language,
    drafts: &mut Vec<(String, String)>,
) {
    static OFFSET_INDEX: OnceLock<Regex> = OnceLock::new();
    static RANGE_PLUS_ONE: OnceLock<Regex> = OnceLock::new();
    let offset_index = OFFSET_INDEX
        .get_or_init(|| Regex::new(r"\[\s*(\w+)\s*\+\s*1\s*\]").expect("index regex"));
    let range_plus_one = RANGE_PLUS_ONE
        .get_or_init(|| Regex::new(r"range\(([^()]*len\([^()]*\))\s*\+\s*1\)").expect("range regex"));

    // Drop a `+ 1` offset on the faulty line.
    if let Some(text) = rewrite_line(source, defect.line, |line| {
        if offset_index.is_match(line) {
            Some(offset_index.replace_all(line, "[$1]").into_owned())
        } else {
            None
        }
    }) {
        drafts.push(("index with the loop variable itself, not one past it".to_string(), text));
    }

    // Tighten an over-long range bound on the faulty line or the loop header
    // just above it.
    for candidate_line in nearby_lines(defect.line, 3) {
        if let Some(text) = rewrite_line(source, Some(candidate_line), |line| {
            if range_plus_one.is_match(line) {
                Some(range_plus_one.replace_all(line, "range($1)").into_owned())
            } else if line.contains("<=") && line.trim_start().starts_with("for") {
                Some(line.replacen("<=", "<", 1))
            } else {
                None
            }
        }) {
            drafts.push(("tighten the loop bound by one".to_string(), text));
            break;
        }
    }

    // Guard the access (interpreted languages only; a structural rewrite is
    // too invasive for the C family at this tier).
    if language == Language::Python {
        if let Some(line_no) = defect.line {
            if let Some(text) = guard_python_index(source, line_no) {
                drafts.push(("guard the index against the collection length".to_string(), text));
            }
        }
    }
}

fn guard_python_index(source: &str, line_no: u32) -> Option<String> {
    static SUBSCRIPT: OnceLock<Regex> = OnceLock::new();
    let subscript =
        SUBSCRIPT.get_or_init(|| Regex::new(r"(\w+)\[\s*(\w+)\s*\]").expect("subscript regex"));

    let (mut lines, trailing) = split_lines(source);
    let idx = line_no.checked_sub(1)? as usize;
    let line = lines.get(idx)?.clone();
    let caps = subscript.captures(&line)?;
    let (collection, index) = (caps[1].to_string(), caps[2].to_string());
    if index.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let indent = indent_of(&line);
    lines[idx] = format!("{indent}if {index} < len({collection}):");
    lines.insert(idx + 1, format!("    {line}"));
    Some(join_lines(lines, trailing))
}

// ---------------------------------------------------------------------------
// Syntax / compile errors
// ---------------------------------------------------------------------------

fn syntax_patches(
    defect: &DefectDescriptor,
    source: &str,
    language: Language,
    drafts: &mut Vec<(String, String)>,
) {
    if let Some(text) = rewrite_line(source, defect.line, assignment_to_equality) {
        drafts.push(("replace '=' with '==' in the condition".to_string(), text));
    }

    if language == Language::Python {
        if let Some(text) = rewrite_line(source, defect.line, |line| {
            let trimmed = line.trim_end();
            let starts_block = ["if ", "elif ", "else", "for ", "while ", "def ", "class "]
                .iter()
                .any(|kw| trimmed.trim_start().starts_with(kw));
            if starts_block && !trimmed.ends_with(':') {
                Some(format!("{trimmed}:"))
            } else {
                None
            }
        }) {
            drafts.push(("add the missing ':' at the end of the block header".to_string(), text));
        }
    } else if defect.message.contains("expected ';'") || defect.message.contains("expected \";\"") {
        // gcc points at the line after the one missing the semicolon.
        for candidate_line in nearby_lines(defect.line, 1) {
            if let Some(text) = rewrite_line(source, Some(candidate_line), |line| {
                let trimmed = line.trim_end();
                if trimmed.is_empty() || trimmed.ends_with(';') || trimmed.ends_with('{') {
                    None
                } else {
                    Some(format!("{trimmed};"))
                }
            }) {
                drafts.push(("add the missing ';'".to_string(), text));
            }
        }
    }
}

/// `if (x = 5)` family: the first bare `=` inside a condition becomes `==`.
fn assignment_to_equality(line: &str) -> Option<String> {
    static BARE_ASSIGN: OnceLock<Regex> = OnceLock::new();
    let bare_assign = BARE_ASSIGN.get_or_init(|| {
        Regex::new(r"((?:if|while|elif)\s*\(?\s*[\w\[\].]+\s*)=(\s*[^=])").expect("assign regex")
    });
    if bare_assign.is_match(line) {
        Some(bare_assign.replace(line, "$1==$2").into_owned())
    } else {
        None
    }
}

fn strip_boolean_comparison(line: &str) -> Option<String> {
    static BOOL_CMP: OnceLock<Regex> = OnceLock::new();
    let bool_cmp = BOOL_CMP
        .get_or_init(|| Regex::new(r"\s*==\s*(?:True|true)\b").expect("bool regex"));
    if bool_cmp.is_match(line) {
        Some(bool_cmp.replace_all(line, "").into_owned())
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Name errors
// ---------------------------------------------------------------------------

fn name_patches(
    defect: &DefectDescriptor,
    source: &str,
    language: Language,
    drafts: &mut Vec<(String, String)>,
) {
    let Some(missing) = missing_name(&defect.message) else {
        return;
    };

    // Closest defined identifier within edit distance 2 is probably a typo.
    if let Some(closest) = closest_identifier(&missing, source) {
        if let Some(text) = rewrite_line(source, defect.line, |line| {
            if line.contains(&missing) {
                Some(line.replace(&missing, &closest))
            } else {
                None
            }
        }) {
            drafts.push((format!("rename '{missing}' to '{closest}'"), text));
        }
    }

    // Otherwise define it as zero just before first use.
    if let Some(line_no) = defect.line {
        let (mut lines, trailing) = split_lines(source);
        if let Some(idx) = line_no.checked_sub(1).map(|i| i as usize) {
            if idx < lines.len() {
                let indent = indent_of(&lines[idx]);
                let declaration = match language {
                    Language::Python => format!("{indent}{missing} = 0"),
                    Language::JavaScript => format!("{indent}let {missing} = 0;"),
                    Language::Go => format!("{indent}{missing} := 0"),
                    _ => format!("{indent}int {missing} = 0;"),
                };
                lines.insert(idx, declaration);
                drafts.push((
                    format!("initialize '{missing}' before its first use"),
                    join_lines(lines, trailing),
                ));
            }
        }
    }
}

fn missing_name(message: &str) -> Option<String> {
    static QUOTED: OnceLock<Regex> = OnceLock::new();
    static BARE: OnceLock<Regex> = OnceLock::new();
    let quoted = QUOTED.get_or_init(|| Regex::new(r"'(\w+)'").expect("quoted regex"));
    let bare = BARE.get_or_init(|| Regex::new(r"^(\w+) is not defined").expect("bare regex"));
    if let Some(caps) = quoted.captures(message) {
        return Some(caps[1].to_string());
    }
    bare.captures(message).map(|caps| caps[1].to_string())
}

fn closest_identifier(target: &str, source: &str) -> Option<String> {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    let ident = IDENT.get_or_init(|| Regex::new(r"[A-Za-z_]\w*").expect("ident regex"));
    let mut best: Option<(usize, String)> = None;
    for m in ident.find_iter(source) {
        let candidate = m.as_str();
        if candidate == target {
            continue;
        }
        let distance = levenshtein(target, candidate);
        if distance > 0 && distance <= 2 {
            match &best {
                Some((best_distance, _)) if *best_distance <= distance => {}
                _ => best = Some((distance, candidate.to_string())),
            }
        }
    }
    best.map(|(_, name)| name)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        cur[0] = i;
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            cur[j] = (prev[j] + 1).min(cur[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[b.len()]
}

// ---------------------------------------------------------------------------
// Division by zero
// ---------------------------------------------------------------------------

fn zero_division_patches(
    defect: &DefectDescriptor,
    source: &str,
    language: Language,
    drafts: &mut Vec<(String, String)>,
) {
    static DIVISION: OnceLock<Regex> = OnceLock::new();
    let division = DIVISION
        .get_or_init(|| Regex::new(r"/\s*([A-Za-z_]\w*)").expect("division regex"));

    let Some(line_no) = defect.line else { return };
    let (mut lines, trailing) = split_lines(source);
    let Some(idx) = line_no.checked_sub(1).map(|i| i as usize) else {
        return;
    };
    let Some(line) = lines.get(idx).cloned() else {
        return;
    };
    let Some(caps) = division.captures(&line) else {
        return;
    };
    let denominator = caps[1].to_string();
    let indent = indent_of(&line);

    match language {
        Language::Python => {
            lines[idx] = format!("{indent}if {denominator} != 0:");
            lines.insert(idx + 1, format!("    {line}"));
        }
        _ => {
            lines[idx] = format!("{indent}if ({denominator} != 0) {{");
            lines.insert(idx + 1, line.clone());
            lines.insert(idx + 2, format!("{indent}}}"));
        }
    }
    drafts.push((
        format!("guard the division against '{denominator}' being zero"),
        join_lines(lines, trailing),
    ));
}

// ---------------------------------------------------------------------------
// Loops that never finish
// ---------------------------------------------------------------------------

fn loop_patches(
    defect: &DefectDescriptor,
    source: &str,
    language: Language,
    drafts: &mut Vec<(String, String)>,
) {
    static WHILE_VAR: OnceLock<Regex> = OnceLock::new();
    let while_var = WHILE_VAR
        .get_or_init(|| Regex::new(r"while\s*\(?\s*([A-Za-z_]\w*)").expect("while regex"));

    let (lines, trailing) = split_lines(source);
    let header_idx = defect
        .line
        .and_then(|l| l.checked_sub(1))
        .map(|l| l as usize)
        .filter(|&idx| idx < lines.len() && lines[idx].contains("while"))
        .or_else(|| lines.iter().position(|line| line.contains("while")));
    let Some(header_idx) = header_idx else { return };
    let header = &lines[header_idx];
    let header_indent = indent_of(header);

    let body_end = python_block_end(&lines, header_idx);

    if let Some(caps) = while_var.captures(header) {
        let var = caps[1].to_string();
        if var != "True" && var != "true" {
            let mut patched = lines.clone();
            let increment = match language {
                Language::Python => format!("{header_indent}    {var} += 1"),
                _ => format!("{header_indent}    {var}++;"),
            };
            patched.insert(body_end, increment);
            drafts.push((
                format!("advance '{var}' inside the loop body"),
                join_lines(patched, trailing),
            ));
        }
    }

    let mut patched = lines.clone();
    let break_line = match language {
        Language::Python => format!("{header_indent}    break"),
        _ => format!("{header_indent}    break;"),
    };
    patched.insert(body_end, break_line);
    drafts.push((
        "break out of the loop at the end of the body".to_string(),
        join_lines(patched, trailing),
    ));
}

/// Index one past the last line of the block opened at `header_idx`,
/// judged by indentation (good enough for both Python blocks and braced
/// bodies written one statement per line).
fn python_block_end(lines: &[String], header_idx: usize) -> usize {
    let header_indent = indent_of(&lines[header_idx]).len();
    let mut end = header_idx + 1;
    for (idx, line) in lines.iter().enumerate().skip(header_idx + 1) {
        if line.trim().is_empty() {
            continue;
        }
        if indent_of(line).len() > header_indent {
            end = idx + 1;
        } else {
            break;
        }
    }
    end
}

// ---------------------------------------------------------------------------
// Missing base case
// ---------------------------------------------------------------------------

fn base_case_patches(
    defect: &DefectDescriptor,
    source: &str,
    language: Language,
    drafts: &mut Vec<(String, String)>,
) {
    static DEF: OnceLock<Regex> = OnceLock::new();
    static C_FUNC: OnceLock<Regex> = OnceLock::new();
    let def = DEF
        .get_or_init(|| Regex::new(r"def\s+\w+\(\s*([A-Za-z_]\w*)").expect("def regex"));
    let c_func = C_FUNC.get_or_init(|| {
        Regex::new(r"\w+\s+\w+\(\s*\w+\s+([A-Za-z_]\w*)\s*\)").expect("c func regex")
    });

    let (mut lines, trailing) = split_lines(source);
    let header_idx = defect
        .line
        .and_then(|l| l.checked_sub(1))
        .map(|l| l as usize)
        .filter(|&idx| idx < lines.len())
        .unwrap_or(0);

    match language {
        Language::Python => {
            let Some(caps) = def.captures(&lines[header_idx]) else {
                return;
            };
            let param = caps[1].to_string();
            lines.insert(header_idx + 1, format!("    if {param} <= 1:"));
            lines.insert(header_idx + 2, "        return 1".to_string());
        }
        _ => {
            let Some(caps) = c_func.captures(&lines[header_idx]) else {
                return;
            };
            let param = caps[1].to_string();
            // Body may open on the header line or the next one
            let insert_at = if lines[header_idx].contains('{') {
                header_idx + 1
            } else {
                header_idx + 2
            };
            lines.insert(
                insert_at.min(lines.len()),
                format!("    if ({param} <= 1) return 1;"),
            );
        }
    }
    drafts.push((
        "add a conditional early return as the base case".to_string(),
        join_lines(lines, trailing),
    ));
}

// ---------------------------------------------------------------------------
// Off-by-one
// ---------------------------------------------------------------------------

fn off_by_one_patches(defect: &DefectDescriptor, source: &str, drafts: &mut Vec<(String, String)>) {
    static OFFSET_INDEX: OnceLock<Regex> = OnceLock::new();
    let offset_index = OFFSET_INDEX
        .get_or_init(|| Regex::new(r"\[\s*(\w+)\s*\+\s*1\s*\]").expect("index regex"));

    if let Some(text) = rewrite_line(source, defect.line, |line| {
        if offset_index.is_match(line) {
            Some(offset_index.replace_all(line, "[$1]").into_owned())
        } else {
            None
        }
    }) {
        drafts.push(("index with the loop variable itself".to_string(), text));
    }
    if let Some(text) = rewrite_line(source, defect.line, |line| {
        if line.contains("<=") {
            Some(line.replacen("<=", "<", 1))
        } else {
            None
        }
    }) {
        drafts.push(("use a strict '<' bound".to_string(), text));
    }
    if let Some(text) = rewrite_line(source, defect.line, |line| {
        if line.contains("range(1,") {
            Some(line.replacen("range(1,", "range(0,", 1))
        } else {
            None
        }
    }) {
        drafts.push(("start the range at 0".to_string(), text));
    }
}

// ---------------------------------------------------------------------------
// Efficiency candidates
// ---------------------------------------------------------------------------

fn efficiency_patches(source: &str, language: Language) -> Vec<(String, String)> {
    let mut drafts = Vec::new();
    if language != Language::Python {
        return drafts;
    }

    // Memoize a self-recursive function.
    static DEF_NAME: OnceLock<Regex> = OnceLock::new();
    let def_name = DEF_NAME
        .get_or_init(|| Regex::new(r"def\s+(\w+)\s*\(").expect("def regex"));
    let (lines, trailing) = split_lines(source);
    for (idx, line) in lines.iter().enumerate() {
        if let Some(caps) = def_name.captures(line) {
            let name = caps[1].to_string();
            let body_end = python_block_end(&lines, idx);
            let recursive = lines[idx + 1..body_end]
                .iter()
                .any(|body_line| body_line.contains(&format!("{name}(")));
            if recursive && !source.contains("lru_cache") {
                let mut patched = lines.clone();
                patched.insert(idx, format!("{}@lru_cache(maxsize=None)", indent_of(line)));
                patched.insert(0, "from functools import lru_cache".to_string());
                drafts.push((
                    format!("memoize recursive '{name}' with lru_cache"),
                    join_lines(patched, trailing),
                ));
                break;
            }
        }
    }

    // Hoist a loop-invariant len() out of a while condition.
    static WHILE_LEN: OnceLock<Regex> = OnceLock::new();
    let while_len = WHILE_LEN
        .get_or_init(|| Regex::new(r"while\s+(\w+)\s*<\s*len\((\w+)\)").expect("while regex"));
    for (idx, line) in lines.iter().enumerate() {
        if let Some(caps) = while_len.captures(line) {
            let (var, collection) = (caps[1].to_string(), caps[2].to_string());
            let indent = indent_of(line);
            let mut patched = lines.clone();
            patched[idx] = format!("{indent}while {var} < {collection}_len:");
            patched.insert(idx, format!("{indent}{collection}_len = len({collection})"));
            drafts.push((
                format!("hoist len({collection}) out of the loop condition"),
                join_lines(patched, trailing),
            ));
            break;
        }
    }

    drafts
}

// ---------------------------------------------------------------------------
// Fallback and line plumbing
// ---------------------------------------------------------------------------

fn fallback_patch(
    defect: &DefectDescriptor,
    source: &str,
    language: Language,
) -> (String, String) {
    let line_no = defect.line.unwrap_or(1);
    let prefix = language.comment_prefix();
    let text = rewrite_line(source, Some(line_no), |line| {
        Some(format!(
            "{}{prefix} disabled pending manual review: {}",
            indent_of(line),
            line.trim_start()
        ))
    })
    .unwrap_or_else(|| source.to_string());
    (
        format!("comment out line {line_no} pending manual review"),
        text,
    )
}

fn split_lines(source: &str) -> (Vec<String>, bool) {
    let trailing = source.ends_with('\n');
    (source.lines().map(str::to_string).collect(), trailing)
}

fn join_lines(lines: Vec<String>, trailing_newline: bool) -> String {
    let mut joined = lines.join("\n");
    if trailing_newline {
        joined.push('\n');
    }
    joined
}

fn indent_of(line: &str) -> String {
    line.chars().take_while(|c| c.is_whitespace()).collect()
}

/// Apply `edit` to the 1-based `line`; `None` when the edit does not apply.
fn rewrite_line(
    source: &str,
    line: Option<u32>,
    edit: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    let line_no = line?;
    let (mut lines, trailing) = split_lines(source);
    let idx = line_no.checked_sub(1)? as usize;
    let current = lines.get(idx)?;
    let replacement = edit(current)?;
    if replacement == *current {
        return None;
    }
    lines[idx] = replacement;
    Some(join_lines(lines, trailing))
}

fn remove_line(source: &str, line: u32) -> Option<String> {
    let (mut lines, trailing) = split_lines(source);
    let idx = line.checked_sub(1)? as usize;
    if idx >= lines.len() {
        return None;
    }
    lines.remove(idx);
    Some(join_lines(lines, trailing))
}

fn nearby_lines(line: Option<u32>, radius: u32) -> Vec<u32> {
    let Some(center) = line else { return Vec::new() };
    let mut ordered = vec![center];
    for offset in 1..=radius {
        if center > offset {
            ordered.push(center - offset);
        }
        ordered.push(center + offset);
    }
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defect::AnalysisTier;

    fn runtime_defect(class: &str, line: u32, message: &str) -> DefectDescriptor {
        DefectDescriptor::observed(DefectKind::Runtime(class.to_string()), Some(line), message)
    }

    #[test]
    fn index_error_strips_plus_one_offset() {
        let source = "arr = [1, 2, 3]\nfor i in range(0, 3):\n    print(arr[i + 1])\n";
        let defect = runtime_defect("IndexError", 3, "list index out of range");
        let candidates = generate(&defect, source, Language::Python, false);
        assert!(candidates
            .iter()
            .any(|c| c.text.contains("arr[i]") && !c.text.contains("i + 1")));
    }

    #[test]
    fn every_candidate_is_a_full_file_rewrite() {
        let source = "arr = [1]\nprint(arr[5])\n";
        let defect = runtime_defect("IndexError", 2, "list index out of range");
        for candidate in generate(&defect, source, Language::Python, false) {
            assert!(candidate.text.contains("arr = [1]"), "lost the first line");
        }
    }

    #[test]
    fn assignment_in_condition_becomes_equality() {
        let source = "int main() {\n    int x = 3;\n    if (x = 5) {\n    }\n    return 0;\n}\n";
        let defect = DefectDescriptor::inferred(
            LogicRule::AssignmentInCondition,
            Some(3),
            "assignment in condition",
            AnalysisTier::Heuristic,
        );
        let candidates = generate(&defect, source, Language::C, false);
        assert!(candidates.iter().any(|c| c.text.contains("if (x == 5)")));
        // Unrelated '=' untouched
        assert!(candidates.iter().all(|c| c.text.contains("int x = 3;")));
    }

    #[test]
    fn name_error_offers_typo_rename() {
        let source = "counter = 0\nprint(countr)\n";
        let defect = runtime_defect("NameError", 2, "name 'countr' is not defined");
        let candidates = generate(&defect, source, Language::Python, false);
        assert!(candidates
            .iter()
            .any(|c| c.description.contains("rename") && c.text.contains("print(counter)")));
    }

    #[test]
    fn missing_base_case_inserts_conditional_return() {
        let source = "def factorial(n):\n    return n * factorial(n - 1)\n";
        let defect = DefectDescriptor::inferred(
            LogicRule::MissingBaseCase,
            Some(1),
            "no base case",
            AnalysisTier::Exact,
        );
        let candidates = generate(&defect, source, Language::Python, false);
        let patched = &candidates[0].text;
        assert!(patched.contains("if n <= 1:"));
        assert!(patched.contains("return 1"));
        // Base case lands before the recursive call
        assert!(patched.find("if n <= 1:").unwrap() < patched.find("factorial(n - 1)").unwrap());
    }

    #[test]
    fn infinite_loop_gets_increment_and_break_candidates() {
        let source = "i = 0\nwhile i < 10:\n    print(i)\n";
        let defect = DefectDescriptor::inferred(
            LogicRule::InfiniteLoop,
            Some(2),
            "i never written",
            AnalysisTier::Exact,
        );
        let candidates = generate(&defect, source, Language::Python, false);
        assert!(candidates.iter().any(|c| c.text.contains("i += 1")));
        assert!(candidates.iter().any(|c| c.text.contains("break")));
    }

    #[test]
    fn unknown_kind_still_yields_fallback() {
        let defect = DefectDescriptor::observed(DefectKind::Unknown, Some(1), "???");
        let candidates = generate(&defect, "mystery()\n", Language::Python, false);
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].text.contains("# disabled pending manual review"));
    }

    #[test]
    fn ids_follow_generation_order() {
        let source = "arr = [1, 2]\nfor i in range(0, 2):\n    print(arr[i + 1])\n";
        let defect = runtime_defect("IndexError", 3, "list index out of range");
        let candidates = generate(&defect, source, Language::Python, false);
        for (idx, candidate) in candidates.iter().enumerate() {
            assert_eq!(candidate.id, format!("patch_{idx}"));
        }
    }

    #[test]
    fn efficiency_candidates_only_when_allowed_and_capped() {
        let source = "def fib(n):\n    if n <= 1:\n        return n\n    return fib(n - 1) + fib(n - 2)\n\ni = 0\nwhile i < len(xs):\n    i += 1\n";
        let defect = runtime_defect("NameError", 7, "name 'xs' is not defined");

        let without = generate(&defect, source, Language::Python, false);
        assert!(without
            .iter()
            .all(|c| c.category == PatchCategory::Correctness));

        let with = generate(&defect, source, Language::Python, true);
        let efficiency: Vec<_> = with
            .iter()
            .filter(|c| c.category == PatchCategory::Efficiency)
            .collect();
        assert!(!efficiency.is_empty());
        assert!(efficiency.len() <= 2);
        assert!(efficiency
            .iter()
            .any(|c| c.text.contains("lru_cache") || c.text.contains("_len")));
    }

    #[test]
    fn zero_division_guarded() {
        let source = "a = 10\nb = 0\nprint(a / b)\n";
        let defect = runtime_defect("ZeroDivisionError", 3, "division by zero");
        let candidates = generate(&defect, source, Language::Python, false);
        assert!(candidates.iter().any(|c| c.text.contains("if b != 0:")));
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("counter", "countr"), 1);
        assert_eq!(levenshtein("abc", "abc"), 0);
        assert_eq!(levenshtein("abc", "xyz"), 3);
    }
}
