//! Defect descriptors: the structured currency of the repair pipeline.
//!
//! Every problem the engine can observe or infer becomes a
//! [`DefectDescriptor`]. Execution-derived descriptors carry confidence 1.0;
//! analysis-derived ones are always below that, and additionally carry the
//! tier of the analysis that produced them so consumers can discount
//! heuristic findings.

use serde::{Deserialize, Serialize};

/// How a finding was derived. Exact findings come from a real AST walk with
/// control- and data-flow backing; heuristic ones from pattern matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisTier {
    Exact,
    Heuristic,
}

/// The closed set of logical-defect rules the analyzer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicRule {
    InfiniteLoop,
    UnreachableCode,
    OffByOne,
    MissingBaseCase,
    UninitializedUse,
    AlwaysTrueCondition,
    InconsistentReturn,
    AssignmentInCondition,
    RedundantBooleanComparison,
    EmptyControlBody,
}

impl LogicRule {
    /// Fixed base confidence per rule. Raised (never to 1.0) when a failing
    /// oracle corroborates the finding.
    pub fn base_confidence(&self) -> f64 {
        match self {
            LogicRule::AssignmentInCondition => 0.95,
            LogicRule::EmptyControlBody => 0.9,
            LogicRule::InfiniteLoop => 0.85,
            LogicRule::UnreachableCode => 0.85,
            LogicRule::MissingBaseCase => 0.8,
            LogicRule::UninitializedUse => 0.75,
            LogicRule::AlwaysTrueCondition => 0.7,
            LogicRule::InconsistentReturn => 0.7,
            LogicRule::OffByOne => 0.65,
            LogicRule::RedundantBooleanComparison => 0.6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LogicRule::InfiniteLoop => "infinite_loop",
            LogicRule::UnreachableCode => "unreachable_code",
            LogicRule::OffByOne => "off_by_one",
            LogicRule::MissingBaseCase => "missing_base_case",
            LogicRule::UninitializedUse => "uninitialized_use",
            LogicRule::AlwaysTrueCondition => "always_true_condition",
            LogicRule::InconsistentReturn => "inconsistent_return",
            LogicRule::AssignmentInCondition => "assignment_in_condition",
            LogicRule::RedundantBooleanComparison => "redundant_boolean_comparison",
            LogicRule::EmptyControlBody => "empty_control_body",
        }
    }
}

/// What kind of problem a descriptor reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "detail")]
pub enum DefectKind {
    /// Source does not parse (interpreter error or parse-gate rejection).
    Syntax,
    /// Compiler rejected the source (compiled languages only).
    Compile,
    /// The program crashed; the string is the language's exception or crash
    /// class ("IndexError", "NullPointerException", "panic", ...).
    Runtime(String),
    /// Wall-clock limit hit; derived from the outcome flag, never stderr.
    Timeout,
    /// Memory ceiling hit; derived from the outcome flag, never stderr.
    OutOfMemory,
    /// Analyzer rule finding.
    Logical(LogicRule),
    /// A supplied oracle failed on an otherwise clean run.
    Behavioral,
    /// Execution failed but stderr matched no grammar. Carries nothing; the
    /// raw text lives in the descriptor message.
    Unknown,
}

impl DefectKind {
    /// Stable key for deduplication across classifier and analyzer findings.
    pub fn dedup_label(&self) -> String {
        match self {
            DefectKind::Syntax => "syntax".to_string(),
            DefectKind::Compile => "compile".to_string(),
            DefectKind::Runtime(class) => format!("runtime:{class}"),
            DefectKind::Timeout => "timeout".to_string(),
            DefectKind::OutOfMemory => "out_of_memory".to_string(),
            DefectKind::Logical(rule) => format!("logical:{}", rule.name()),
            DefectKind::Behavioral => "behavioral".to_string(),
            DefectKind::Unknown => "unknown".to_string(),
        }
    }
}

/// One detected problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefectDescriptor {
    pub kind: DefectKind,
    /// 1-based line nearest the fault, when one could be recovered.
    pub line: Option<u32>,
    pub message: String,
    /// Source line text at `line`, best effort.
    pub snippet: Option<String>,
    /// 1.0 for execution-derived defects, strictly less for analysis.
    pub confidence: f64,
    pub tier: AnalysisTier,
}

impl DefectDescriptor {
    /// An observed (execution- or oracle-derived) defect: confidence 1.0,
    /// exact tier.
    pub fn observed(kind: DefectKind, line: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            kind,
            line,
            message: message.into(),
            snippet: None,
            confidence: 1.0,
            tier: AnalysisTier::Exact,
        }
    }

    /// An inferred defect from the analyzer.
    pub fn inferred(
        rule: LogicRule,
        line: Option<u32>,
        message: impl Into<String>,
        tier: AnalysisTier,
    ) -> Self {
        Self {
            kind: DefectKind::Logical(rule),
            line,
            message: message.into(),
            snippet: None,
            confidence: rule.base_confidence(),
            tier,
        }
    }

    pub fn with_snippet_from(mut self, source: &str) -> Self {
        if let Some(line) = self.line {
            self.snippet = source
                .lines()
                .nth(line.saturating_sub(1) as usize)
                .map(|text| text.trim_end().to_string());
        }
        self
    }

    pub fn is_execution_derived(&self) -> bool {
        !matches!(self.kind, DefectKind::Logical(_))
    }
}

/// Merge classifier and analyzer findings: dedup by (kind, line), rank
/// execution-derived first, then by descending confidence.
pub fn merge_defects(
    execution: impl IntoIterator<Item = DefectDescriptor>,
    analysis: impl IntoIterator<Item = DefectDescriptor>,
) -> Vec<DefectDescriptor> {
    let mut seen = std::collections::HashSet::new();
    let mut merged: Vec<DefectDescriptor> = Vec::new();
    for defect in execution.into_iter().chain(analysis) {
        let key = (defect.kind.dedup_label(), defect.line);
        if seen.insert(key) {
            merged.push(defect);
        }
    }
    merged.sort_by(|a, b| {
        b.is_execution_derived()
            .cmp(&a.is_execution_derived())
            .then(
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observed_defects_have_full_confidence() {
        let defect = DefectDescriptor::observed(
            DefectKind::Runtime("IndexError".into()),
            Some(3),
            "list index out of range",
        );
        assert_eq!(defect.confidence, 1.0);
        assert!(defect.is_execution_derived());
    }

    #[test]
    fn inferred_defects_use_rule_confidence() {
        let defect = DefectDescriptor::inferred(
            LogicRule::OffByOne,
            Some(2),
            "range starts at 1",
            AnalysisTier::Exact,
        );
        assert!((defect.confidence - 0.65).abs() < f64::EPSILON);
        assert!(!defect.is_execution_derived());
    }

    #[test]
    fn snippet_extraction_is_one_based() {
        let source = "first\nsecond\nthird";
        let defect = DefectDescriptor::observed(DefectKind::Syntax, Some(2), "boom")
            .with_snippet_from(source);
        assert_eq!(defect.snippet.as_deref(), Some("second"));
    }

    #[test]
    fn merge_dedups_by_kind_and_line() {
        let exec = vec![DefectDescriptor::observed(
            DefectKind::Runtime("IndexError".into()),
            Some(4),
            "from traceback",
        )];
        let analysis = vec![
            // Same kind+line as an execution finding is dropped
            DefectDescriptor {
                kind: DefectKind::Runtime("IndexError".into()),
                line: Some(4),
                message: "duplicate".into(),
                snippet: None,
                confidence: 0.5,
                tier: AnalysisTier::Heuristic,
            },
            DefectDescriptor::inferred(
                LogicRule::OffByOne,
                Some(4),
                "range off by one",
                AnalysisTier::Exact,
            ),
        ];
        let merged = merge_defects(exec, analysis);
        assert_eq!(merged.len(), 2);
        assert!(merged[0].is_execution_derived());
        assert_eq!(merged[0].message, "from traceback");
    }

    #[test]
    fn execution_findings_rank_first_regardless_of_order() {
        let analysis = vec![DefectDescriptor::inferred(
            LogicRule::InfiniteLoop,
            Some(1),
            "loop",
            AnalysisTier::Exact,
        )];
        let exec = vec![DefectDescriptor::observed(DefectKind::Timeout, None, "timed out")];
        let merged = merge_defects(exec, analysis);
        assert!(matches!(merged[0].kind, DefectKind::Timeout));
    }
}
