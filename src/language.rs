//! Supported languages and their capability table.
//!
//! `Language` is a closed enum: adding a language means filling in every
//! capability here, and the compiler enforces it. The table covers file
//! naming, compile/run command lines, the stderr grammar used by the
//! classifier, and the analysis tier the defect analyzer can offer.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::defect::AnalysisTier;

/// Languages the sandbox and analyzer understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    Python,
    JavaScript,
    C,
    Cpp,
    Java,
    Go,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::Python,
        Language::JavaScript,
        Language::C,
        Language::Cpp,
        Language::Java,
        Language::Go,
    ];

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "py" | "pyi" => Some(Language::Python),
            "js" | "mjs" | "cjs" => Some(Language::JavaScript),
            "c" => Some(Language::C),
            "cpp" | "cc" | "cxx" => Some(Language::Cpp),
            "java" => Some(Language::Java),
            "go" => Some(Language::Go),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Java => "java",
            Language::Go => "go",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Language::Python => "py",
            Language::JavaScript => "js",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Java => "java",
            Language::Go => "go",
        }
    }

    /// The executable whose presence makes this language usable. Probed once
    /// per session; absence is a `ConfigurationError`, not a compile failure.
    pub fn toolchain(&self) -> &'static str {
        match self {
            Language::Python => "python3",
            Language::JavaScript => "node",
            Language::C => "gcc",
            Language::Cpp => "g++",
            Language::Java => "javac",
            Language::Go => "go",
        }
    }

    pub fn is_compiled(&self) -> bool {
        matches!(
            self,
            Language::C | Language::Cpp | Language::Java | Language::Go
        )
    }

    /// How deep the defect analyzer can see. Python gets the full
    /// AST/CFG/DFA treatment; everything else is pattern heuristics (even
    /// JavaScript, whose tree-sitter grammar is used only as a parse gate).
    pub fn analysis_tier(&self) -> AnalysisTier {
        match self {
            Language::Python => AnalysisTier::Exact,
            _ => AnalysisTier::Heuristic,
        }
    }

    /// Whether a tree-sitter grammar is available to reject unparseable
    /// source before analysis.
    pub fn has_parse_gate(&self) -> bool {
        matches!(self, Language::Python | Language::JavaScript)
    }

    /// File name the source is written under inside the sandbox workspace.
    /// Java insists the file match the public class, so the name is
    /// extracted from the source text.
    pub fn source_file_name(&self, source: &str) -> String {
        match self {
            Language::Java => {
                let class = java_class_name(source).unwrap_or_else(|| "Main".to_string());
                format!("{class}.java")
            }
            _ => format!("main.{}", self.extension()),
        }
    }

    /// Compiler argv for compiled languages, `None` for interpreted ones.
    pub fn compile_command(&self, source_file: &Path, artifact: &Path) -> Option<Vec<String>> {
        let src = source_file.display().to_string();
        let out = artifact.display().to_string();
        match self {
            Language::Python | Language::JavaScript => None,
            Language::C => Some(vec![
                "gcc".into(),
                src,
                "-o".into(),
                out,
                "-std=c11".into(),
                "-Wall".into(),
            ]),
            Language::Cpp => Some(vec![
                "g++".into(),
                src,
                "-o".into(),
                out,
                "-std=c++17".into(),
                "-Wall".into(),
            ]),
            Language::Java => Some(vec!["javac".into(), src]),
            Language::Go => Some(vec!["go".into(), "build".into(), "-o".into(), out, src]),
        }
    }

    /// Argv that actually runs the program. For compiled languages
    /// `artifact` is the compiler output; for interpreted ones it is the
    /// source file itself.
    pub fn run_command(&self, artifact: &Path, source: &str) -> Vec<String> {
        match self {
            Language::Python => vec!["python3".into(), artifact.display().to_string()],
            Language::JavaScript => vec!["node".into(), artifact.display().to_string()],
            Language::C | Language::Cpp | Language::Go => vec![artifact.display().to_string()],
            Language::Java => {
                let class = java_class_name(source).unwrap_or_else(|| "Main".to_string());
                vec!["java".into(), class]
            }
        }
    }

    /// Line-comment prefix, used by the conservative fallback patch.
    pub fn comment_prefix(&self) -> &'static str {
        match self {
            Language::Python => "#",
            _ => "//",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Extract the public (or failing that, any) class name from Java source.
pub fn java_class_name(source: &str) -> Option<String> {
    let public = regex::Regex::new(r"public\s+class\s+(\w+)").ok()?;
    if let Some(caps) = public.captures(source) {
        return Some(caps[1].to_string());
    }
    let any = regex::Regex::new(r"class\s+(\w+)").ok()?;
    any.captures(source).map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn extension_round_trip() {
        for lang in Language::ALL {
            assert_eq!(Language::from_extension(lang.extension()), Some(lang));
        }
        assert_eq!(Language::from_extension("tsx"), None);
    }

    #[test]
    fn interpreted_languages_have_no_compile_step() {
        let src = PathBuf::from("main.py");
        let out = PathBuf::from("main.out");
        assert!(Language::Python.compile_command(&src, &out).is_none());
        assert!(Language::JavaScript.compile_command(&src, &out).is_none());
        assert!(Language::Cpp.compile_command(&src, &out).is_some());
    }

    #[test]
    fn java_file_named_after_public_class() {
        let source = "public class Fibonacci {\n    public static void main(String[] a) {}\n}";
        assert_eq!(Language::Java.source_file_name(source), "Fibonacci.java");
        // No class at all falls back to Main
        assert_eq!(Language::Java.source_file_name("int x;"), "Main.java");
    }

    #[test]
    fn only_python_is_exact_tier() {
        assert_eq!(Language::Python.analysis_tier(), AnalysisTier::Exact);
        assert_eq!(Language::JavaScript.analysis_tier(), AnalysisTier::Heuristic);
        assert!(Language::JavaScript.has_parse_gate());
        assert!(!Language::Java.has_parse_gate());
    }
}
