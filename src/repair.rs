//! Repair loop controller.
//!
//! The state machine driving one session: execute the current source, and on
//! failure diagnose (classifier + analyzer findings merged), generate patch
//! candidates, score them empirically, apply the winner behind a backup, and
//! go around again. Termination follows from the monotonic bounded iteration
//! counter; reaching Fixed does not. The controller is the sole writer of the
//! source unit and its backup chain — every other component works on
//! immutable snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::analysis;
use crate::classify;
use crate::config::RepairConfig;
use crate::defect::{merge_defects, DefectDescriptor};
use crate::error::RepairError;
use crate::generate;
use crate::oracle::{check_oracles, TestOracle};
use crate::policy::{AllowAll, LanguagePlugin, RulePolicy};
use crate::sandbox::Executor;
use crate::score;
use crate::source::{BackupChain, SourceUnit};

/// How one iteration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationStatus {
    /// The applied patch's verification run succeeded.
    Fixed,
    /// A patch was applied but the program still fails; the loop continues.
    Retrying,
    /// No defect or no viable candidate; the session stops here.
    Failed,
}

/// Where the session came to rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Fixed,
    Failed,
    BudgetExhausted,
}

/// Append-only audit entry for one repair iteration. Records are written
/// once, in order, and never revised afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based iteration index.
    pub index: u32,
    /// Defects observed when this iteration diagnosed the source.
    pub defects: Vec<DefectDescriptor>,
    /// Every candidate handed to the scorer, in generation order.
    pub candidate_ids: Vec<String>,
    pub selected: Option<String>,
    pub score: Option<i64>,
    pub status: IterationStatus,
    /// Backup chain index holding the pre-patch text, for applied patches.
    pub backup: Option<u32>,
    /// The applied candidate scored non-positive; stagnation watchpoint.
    pub low_confidence: bool,
    pub recorded_at: DateTime<Utc>,
}

/// Everything a reporting collaborator needs: the full ordered audit trail,
/// original and final text, and the untouched backup chain.
#[derive(Debug, Serialize, Deserialize)]
pub struct RepairReport {
    pub session_id: Uuid,
    pub terminal: TerminalState,
    pub original_text: String,
    pub final_source: SourceUnit,
    pub records: Vec<IterationRecord>,
    pub backups: BackupChain,
    /// Defects still observable when the session stopped; empty on Fixed.
    pub unresolved: Vec<DefectDescriptor>,
}

impl RepairReport {
    pub fn fixed(&self) -> bool {
        self.terminal == TerminalState::Fixed
    }
}

/// One repair session from Start to a terminal state.
pub struct RepairController<'a> {
    executor: &'a dyn Executor,
    config: RepairConfig,
    policy: &'a dyn RulePolicy,
    plugins: Vec<&'a dyn LanguagePlugin>,
    oracles: Vec<TestOracle>,
}

impl<'a> RepairController<'a> {
    pub fn new(executor: &'a dyn Executor, config: RepairConfig) -> Self {
        Self {
            executor,
            config,
            policy: &AllowAll,
            plugins: Vec::new(),
            oracles: Vec::new(),
        }
    }

    /// Filter generated candidates through an external allow/deny policy.
    pub fn with_policy(mut self, policy: &'a dyn RulePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Append a language-specific patch template pack after the built-ins.
    pub fn with_plugin(mut self, plugin: &'a dyn LanguagePlugin) -> Self {
        self.plugins.push(plugin);
        self
    }

    /// Behavioral oracles checked whenever the program executes cleanly. A
    /// clean run that fails an oracle still counts as a failure.
    pub fn with_oracles(mut self, oracles: Vec<TestOracle>) -> Self {
        self.oracles = oracles;
        self
    }

    /// Run the session to a terminal state. Only configuration and workspace
    /// errors abort; every defect is data the loop feeds back into patching.
    pub async fn repair(&self, unit: SourceUnit) -> Result<RepairReport, RepairError> {
        let session_id = Uuid::new_v4();
        let language = unit.language;
        let original_text = unit.text.clone();
        let mut current = unit;
        let mut backups = BackupChain::new();
        let mut records: Vec<IterationRecord> = Vec::new();
        let mut iteration: u32 = 0;
        // Record for the most recently applied patch; its status depends on
        // the verification run at the top of the next cycle, so it is
        // appended there and never revised after the fact.
        let mut pending: Option<IterationRecord> = None;

        info!(%session_id, %language, max_iterations = self.config.max_iterations, "repair session started");

        loop {
            // Executing: success/failure always derives from a real outcome.
            let outcome = self.executor.execute(&current.text, language, None).await?;
            let oracle_results = if outcome.success() {
                check_oracles(self.executor, &current.text, language, &self.oracles).await?
            } else {
                Vec::new()
            };
            let succeeded = outcome.success() && oracle_results.iter().all(|r| r.passed);

            if let Some(mut record) = pending.take() {
                record.status = if succeeded {
                    IterationStatus::Fixed
                } else {
                    IterationStatus::Retrying
                };
                records.push(record);
            }

            if succeeded {
                info!(%session_id, iterations = iteration, "program executes successfully");
                return Ok(RepairReport {
                    session_id,
                    terminal: TerminalState::Fixed,
                    original_text,
                    final_source: current,
                    records,
                    backups,
                    unresolved: Vec::new(),
                });
            }

            // Diagnosing
            let execution_defect = classify::classify(&outcome, &current.text, language);
            let analysis_findings =
                analysis::analyze(&current.text, language, &oracle_results, &self.config);
            let defects = merge_defects(execution_defect, analysis_findings);
            debug!(%session_id, iteration, defects = defects.len(), "diagnosed failing execution");

            if iteration >= self.config.max_iterations {
                warn!(%session_id, iterations = iteration, "iteration budget exhausted");
                return Ok(RepairReport {
                    session_id,
                    terminal: TerminalState::BudgetExhausted,
                    original_text,
                    final_source: current,
                    records,
                    backups,
                    unresolved: defects,
                });
            }

            if defects.is_empty() {
                // Classification degrades to Unknown rather than nothing, so
                // this transition exists for completeness, not expectation.
                iteration += 1;
                records.push(failed_record(iteration, Vec::new(), Vec::new()));
                warn!(%session_id, "execution failed but no defect could be produced");
                return Ok(RepairReport {
                    session_id,
                    terminal: TerminalState::Failed,
                    original_text,
                    final_source: current,
                    records,
                    backups,
                    unresolved: Vec::new(),
                });
            }

            // Patching: built-in heuristics first, then plugin templates, all
            // filtered through the rule policy before scoring.
            let primary = &defects[0];
            let mut candidates = generate::generate(
                primary,
                &current.text,
                language,
                self.config.allow_efficiency_patches,
            );
            for plugin in &self.plugins {
                candidates.extend(plugin.generate_patches(primary, &current.text, language));
            }
            candidates.retain(|c| self.policy.is_allowed(&c.id));
            candidates.truncate(self.policy.max_candidates_per_iteration());
            let candidate_ids: Vec<String> = candidates.iter().map(|c| c.id.clone()).collect();

            let selection = score::select(
                self.executor,
                candidates,
                &outcome,
                &current.text,
                language,
                &self.config,
            )
            .await?;

            let Some(scored) = selection else {
                iteration += 1;
                records.push(failed_record(iteration, defects.clone(), candidate_ids));
                warn!(%session_id, "no viable candidate survived the policy filter");
                return Ok(RepairReport {
                    session_id,
                    terminal: TerminalState::Failed,
                    original_text,
                    final_source: current,
                    records,
                    backups,
                    unresolved: defects,
                });
            };

            // Verifying: backup strictly before the overwrite.
            iteration += 1;
            backups.push(iteration, &current, self.config.backup_dir.as_deref())?;
            let low_confidence = scored.score <= 0;
            if low_confidence {
                warn!(
                    %session_id,
                    iteration,
                    candidate = %scored.candidate.id,
                    score = scored.score,
                    "applying low-confidence patch"
                );
            } else {
                info!(
                    %session_id,
                    iteration,
                    candidate = %scored.candidate.id,
                    score = scored.score,
                    "applying selected patch"
                );
            }
            current = current.replaced_with(scored.candidate.text.clone());
            pending = Some(IterationRecord {
                index: iteration,
                defects,
                candidate_ids,
                selected: Some(scored.candidate.id.clone()),
                score: Some(scored.score),
                status: IterationStatus::Retrying,
                backup: Some(iteration),
                low_confidence,
                recorded_at: Utc::now(),
            });
        }
    }
}

fn failed_record(
    index: u32,
    defects: Vec<DefectDescriptor>,
    candidate_ids: Vec<String>,
) -> IterationRecord {
    IterationRecord {
        index,
        defects,
        candidate_ids,
        selected: None,
        score: None,
        status: IterationStatus::Failed,
        backup: None,
        low_confidence: false,
        recorded_at: Utc::now(),
    }
}
