//! Error classifier: stderr/traceback grammars per language.
//!
//! Classification degrades gracefully: whatever the sandbox produced, this
//! module returns either `None` (success) or some descriptor — never an
//! error. Timeout and memory violations are taken from the outcome flags
//! directly and never go through stderr parsing.

use regex::Regex;
use std::sync::OnceLock;

use crate::defect::{DefectDescriptor, DefectKind};
use crate::language::Language;
use crate::sandbox::ExecutionOutcome;

/// Map a failing outcome to the most specific defect we can recover.
pub fn classify(
    outcome: &ExecutionOutcome,
    source: &str,
    language: Language,
) -> Option<DefectDescriptor> {
    if outcome.success() {
        return None;
    }
    if outcome.timed_out {
        return Some(DefectDescriptor::observed(
            DefectKind::Timeout,
            None,
            outcome.stderr.clone(),
        ));
    }
    if outcome.out_of_memory {
        return Some(DefectDescriptor::observed(
            DefectKind::OutOfMemory,
            None,
            "memory limit exceeded",
        ));
    }

    let parsed = match language {
        Language::Python => parse_python(&outcome.stderr),
        Language::JavaScript => parse_javascript(&outcome.stderr),
        Language::C | Language::Cpp => parse_c_family(&outcome.stderr, outcome.exit_code),
        Language::Java => parse_java(&outcome.stderr),
        Language::Go => parse_go(&outcome.stderr),
    };

    let descriptor = parsed.unwrap_or_else(|| unknown_fallback(outcome));
    Some(descriptor.with_snippet_from(source))
}

fn unknown_fallback(outcome: &ExecutionOutcome) -> DefectDescriptor {
    let message = if outcome.stderr.trim().is_empty() {
        match outcome.exit_code {
            Some(code) => format!("process exited with status {code} and empty stderr"),
            None => "process terminated by signal with empty stderr".to_string(),
        }
    } else {
        outcome.stderr.trim().to_string()
    };
    DefectDescriptor::observed(DefectKind::Unknown, None, message)
}

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("classifier regex"))
}

// ---------------------------------------------------------------------------
// Python: SyntaxError block form, otherwise traceback with the innermost
// user frame and a final "Class: message" line.
// ---------------------------------------------------------------------------

fn parse_python(stderr: &str) -> Option<DefectDescriptor> {
    static FRAME: OnceLock<Regex> = OnceLock::new();
    static FINAL: OnceLock<Regex> = OnceLock::new();
    let frame = regex(&FRAME, r#"File\s+"[^"]+",\s+line\s+(\d+)"#);
    let final_line = regex(
        &FINAL,
        r"(?m)^(\w+(?:Error|Exception|Warning)?)\s*:\s*(.*)$",
    );

    // Innermost frame = last File "...", line N occurrence.
    let line = frame
        .captures_iter(stderr)
        .last()
        .and_then(|caps| caps[1].parse::<u32>().ok());

    let (class, message) = final_line
        .captures_iter(stderr)
        .last()
        .map(|caps| (caps[1].to_string(), caps[2].trim().to_string()))?;

    let kind = match class.as_str() {
        "SyntaxError" | "IndentationError" | "TabError" => DefectKind::Syntax,
        _ => DefectKind::Runtime(class.clone()),
    };
    let message = if message.is_empty() { class } else { message };
    Some(DefectDescriptor::observed(kind, line, message))
}

// ---------------------------------------------------------------------------
// JavaScript (node): header "/path/file.js:LINE" for syntax errors, stack
// frames "(file.js:LINE:COL)" for runtime ones, final "SomeError: message".
// ---------------------------------------------------------------------------

fn parse_javascript(stderr: &str) -> Option<DefectDescriptor> {
    static CLASS: OnceLock<Regex> = OnceLock::new();
    static LINE: OnceLock<Regex> = OnceLock::new();
    let class_re = regex(&CLASS, r"(?m)^(\w*Error):\s*(.*)$");
    let line_re = regex(&LINE, r"\.(?:js|mjs|cjs):(\d+)");

    let caps = class_re.captures_iter(stderr).last()?;
    let class = caps[1].to_string();
    let message = caps[2].trim().to_string();
    let line = line_re
        .captures(stderr)
        .and_then(|caps| caps[1].parse::<u32>().ok());

    let kind = if class == "SyntaxError" {
        DefectKind::Syntax
    } else {
        DefectKind::Runtime(class)
    };
    Some(DefectDescriptor::observed(kind, line, message))
}

// ---------------------------------------------------------------------------
// C / C++: gcc-style "file.c:LINE:COL: error: message" at compile time; a
// signal death at run time (empty stderr, no exit code) is a crash.
// ---------------------------------------------------------------------------

fn parse_c_family(stderr: &str, exit_code: Option<i32>) -> Option<DefectDescriptor> {
    static COMPILE: OnceLock<Regex> = OnceLock::new();
    let compile = regex(
        &COMPILE,
        r"(?m)^[^:\n]+\.(?:c|cc|cpp|cxx):(\d+):(?:\d+:)?\s*(?:fatal\s+)?error:\s*(.*)$",
    );

    if let Some(caps) = compile.captures(stderr) {
        let line = caps[1].parse::<u32>().ok();
        return Some(DefectDescriptor::observed(
            DefectKind::Compile,
            line,
            caps[2].trim().to_string(),
        ));
    }
    if stderr.contains("Segmentation fault") || exit_code.is_none() {
        return Some(DefectDescriptor::observed(
            DefectKind::Runtime("SegmentationFault".to_string()),
            None,
            "process crashed (killed by signal)",
        ));
    }
    None
}

// ---------------------------------------------------------------------------
// Java: "File.java:LINE: error: message" from javac; runtime exceptions as
// Exception in thread "main" java.lang.Something: message
//     at Main.main(Main.java:LINE)
// ---------------------------------------------------------------------------

fn parse_java(stderr: &str) -> Option<DefectDescriptor> {
    static COMPILE: OnceLock<Regex> = OnceLock::new();
    static RUNTIME: OnceLock<Regex> = OnceLock::new();
    static FRAME: OnceLock<Regex> = OnceLock::new();
    let compile = regex(
        &COMPILE,
        r"(?m)^[^:\n]+\.java:(\d+):\s*error:\s*(.*)$",
    );
    let runtime = regex(
        &RUNTIME,
        r#"Exception in thread "[^"]+"\s+([\w.]+)(?::\s*(.*))?"#,
    );
    let frame = regex(&FRAME, r"\(\w+\.java:(\d+)\)");

    if let Some(caps) = compile.captures(stderr) {
        let line = caps[1].parse::<u32>().ok();
        return Some(DefectDescriptor::observed(
            DefectKind::Compile,
            line,
            caps[2].trim().to_string(),
        ));
    }
    if let Some(caps) = runtime.captures(stderr) {
        let class = caps[1]
            .rsplit('.')
            .next()
            .unwrap_or("RuntimeException")
            .to_string();
        let message = caps
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| class.clone());
        // Innermost user frame is the first one printed.
        let line = frame
            .captures(stderr)
            .and_then(|caps| caps[1].parse::<u32>().ok());
        return Some(DefectDescriptor::observed(
            DefectKind::Runtime(class),
            line,
            message,
        ));
    }
    None
}

// ---------------------------------------------------------------------------
// Go: "./main.go:LINE:COL: message" at build time ("syntax error" messages
// are syntax defects), "panic: message" plus a goroutine trace at run time.
// ---------------------------------------------------------------------------

fn parse_go(stderr: &str) -> Option<DefectDescriptor> {
    static COMPILE: OnceLock<Regex> = OnceLock::new();
    static PANIC: OnceLock<Regex> = OnceLock::new();
    static FRAME: OnceLock<Regex> = OnceLock::new();
    let compile = regex(&COMPILE, r"(?m)\.go:(\d+):(?:\d+:)?\s*(.*)$");
    let panic = regex(&PANIC, r"(?m)^panic:\s*(.*)$");
    let frame = regex(&FRAME, r"\.go:(\d+)");

    if let Some(caps) = panic.captures(stderr) {
        let line = frame
            .captures_iter(stderr)
            .next()
            .and_then(|caps| caps[1].parse::<u32>().ok());
        return Some(DefectDescriptor::observed(
            DefectKind::Runtime("panic".to_string()),
            line,
            caps[1].trim().to_string(),
        ));
    }
    if let Some(caps) = compile.captures(stderr) {
        let line = caps[1].parse::<u32>().ok();
        let message = caps[2].trim().to_string();
        let kind = if message.contains("syntax error") {
            DefectKind::Syntax
        } else {
            DefectKind::Compile
        };
        return Some(DefectDescriptor::observed(kind, line, message));
    }
    None
}
