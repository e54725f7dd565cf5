//! Test oracles: externally supplied (input, expected-output) pairs.
//!
//! Oracles catch behavioral defects that execute cleanly. A run that exits
//! zero but prints the wrong answer is still a failure for the repair loop,
//! and a failing oracle is reported as an observed `Behavioral` defect with
//! confidence 1.0 — it happened, it was not inferred.

use serde::{Deserialize, Serialize};

use crate::defect::{DefectDescriptor, DefectKind};
use crate::error::RepairError;
use crate::language::Language;
use crate::sandbox::Executor;

/// One expected behavior: feed `stdin`, expect `expected_stdout` (compared
/// after trimming trailing whitespace per line).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOracle {
    pub stdin: Option<String>,
    pub expected_stdout: String,
    /// Optional label surfaced in defect messages and reports.
    pub name: Option<String>,
}

impl TestOracle {
    pub fn expecting(expected_stdout: impl Into<String>) -> Self {
        Self {
            stdin: None,
            expected_stdout: expected_stdout.into(),
            name: None,
        }
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Outcome of checking one oracle against the current source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleResult {
    pub oracle: TestOracle,
    pub actual_stdout: String,
    pub passed: bool,
}

impl OracleResult {
    /// Behavioral defect for a failed oracle; `None` when it passed.
    pub fn to_defect(&self) -> Option<DefectDescriptor> {
        if self.passed {
            return None;
        }
        let label = self
            .oracle
            .name
            .clone()
            .unwrap_or_else(|| "oracle".to_string());
        Some(DefectDescriptor::observed(
            DefectKind::Behavioral,
            None,
            format!(
                "{label} failed: expected {:?}, got {:?}",
                self.oracle.expected_stdout.trim(),
                self.actual_stdout.trim()
            ),
        ))
    }
}

/// Run every oracle against `source`. Each oracle is an independent sandbox
/// run; a crash or timeout during an oracle run counts as a failure of that
/// oracle, not an error.
pub async fn check_oracles(
    executor: &dyn Executor,
    source: &str,
    language: Language,
    oracles: &[TestOracle],
) -> Result<Vec<OracleResult>, RepairError> {
    let mut results = Vec::with_capacity(oracles.len());
    for oracle in oracles {
        let outcome = executor
            .execute(source, language, oracle.stdin.as_deref())
            .await?;
        let passed = outcome.success() && outputs_match(&outcome.stdout, &oracle.expected_stdout);
        results.push(OracleResult {
            oracle: oracle.clone(),
            actual_stdout: outcome.stdout,
            passed,
        });
    }
    Ok(results)
}

fn outputs_match(actual: &str, expected: &str) -> bool {
    let normalize = |text: &str| {
        text.lines()
            .map(|line| line.trim_end().to_string())
            .collect::<Vec<_>>()
            .join("\n")
            .trim_end()
            .to_string()
    };
    normalize(actual) == normalize(expected)
}
