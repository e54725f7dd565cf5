//! Patch scorer and selector.
//!
//! Every candidate is re-executed through the sandbox seam, each run in its
//! own disposable workspace, and all runs in flight concurrently — candidate
//! evaluations share no mutable state. A candidate whose own execution
//! crashes or times out simply scores from that failing outcome; it never
//! aborts selection. The best candidate is returned even when its score is
//! non-positive, because an error-type change can unblock a later iteration;
//! the controller records such applications as low-confidence.

use futures::future::join_all;
use tracing::debug;

use crate::config::RepairConfig;
use crate::diff;
use crate::error::RepairError;
use crate::generate::PatchCandidate;
use crate::language::Language;
use crate::sandbox::{ExecutionOutcome, Executor};

/// A candidate together with the empirical evidence it was scored on.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub candidate: PatchCandidate,
    pub score: i64,
    /// The outcome the score was computed from.
    pub outcome: ExecutionOutcome,
    /// Line-level edit distance from the pre-patch source.
    pub changed_lines: usize,
}

/// Errors observable in one outcome.
///
/// The model is 0/1 per execution: the sandbox backend surfaces a single
/// classified diagnostic per run, so success counts zero errors and any
/// failure counts one. This is an implementation choice, not a hidden
/// assumption — backends that expose multi-diagnostic counts would need a
/// multiset generalization here.
fn error_count(outcome: &ExecutionOutcome) -> i64 {
    i64::from(!outcome.success())
}

/// Score one candidate outcome against the pre-patch outcome.
///
/// +100 for a successful run, +20 per error removed, -50 per error
/// introduced, +10 for an edit within the small-diff threshold, else a
/// per-line penalty proportional to the lines beyond it. A successful run is
/// never scored below the base success reward: with the 0/1 error model the
/// best a failing candidate can earn is the small-diff bonus, so the floor
/// keeps every fix ranked above every non-fix no matter how large its edit.
pub fn score(
    errors_before: i64,
    outcome: &ExecutionOutcome,
    changed_lines: usize,
    config: &RepairConfig,
) -> i64 {
    let errors_after = error_count(outcome);
    let mut total = 0;
    total += 20 * (errors_before - errors_after).max(0);
    total -= 50 * (errors_after - errors_before).max(0);
    if changed_lines <= config.small_diff_threshold {
        total += 10;
    } else {
        let excess = (changed_lines - config.small_diff_threshold) as i64;
        total -= excess * config.diff_penalty_per_line;
    }
    if outcome.success() {
        // The edit-size penalty differentiates among succeeding candidates
        // but must not drag one below a failing candidate's best total.
        total = (total + 100).max(100);
    }
    total
}

/// Evaluate every candidate concurrently and pick the winner.
///
/// Highest score wins; exact ties prefer the smaller edit, then the
/// earlier-generated candidate. `None` only when `candidates` is empty.
pub async fn select(
    executor: &dyn Executor,
    candidates: Vec<PatchCandidate>,
    prior_outcome: &ExecutionOutcome,
    source: &str,
    language: Language,
    config: &RepairConfig,
) -> Result<Option<ScoredCandidate>, RepairError> {
    if candidates.is_empty() {
        return Ok(None);
    }
    let errors_before = error_count(prior_outcome);

    let evaluations = join_all(candidates.into_iter().map(|candidate| async move {
        let outcome = executor.execute(&candidate.text, language, None).await?;
        Ok::<_, RepairError>((candidate, outcome))
    }))
    .await;

    let mut best: Option<ScoredCandidate> = None;
    for evaluation in evaluations {
        let (candidate, outcome) = evaluation?;
        let changed_lines = diff::changed_lines(source, &candidate.text);
        let value = score(errors_before, &outcome, changed_lines, config);
        debug!(
            candidate = %candidate.id,
            score = value,
            changed_lines,
            success = outcome.success(),
            "evaluated candidate"
        );
        // Strictly-better comparison keeps the earliest candidate on a full
        // tie, since evaluations arrive in generation order.
        let better = match &best {
            None => true,
            Some(current) => {
                value > current.score
                    || (value == current.score && changed_lines < current.changed_lines)
            }
        };
        if better {
            best = Some(ScoredCandidate {
                candidate,
                score: value,
                outcome,
                changed_lines,
            });
        }
    }
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defect::DefectKind;
    use crate::generate::PatchCategory;
    use async_trait::async_trait;
    use std::time::Duration;

    fn ok_outcome() -> ExecutionOutcome {
        ExecutionOutcome {
            stdout: "ok".into(),
            stderr: String::new(),
            exit_code: Some(0),
            elapsed: Duration::from_millis(3),
            timed_out: false,
            out_of_memory: false,
        }
    }

    fn failed_outcome(stderr: &str) -> ExecutionOutcome {
        ExecutionOutcome {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(1),
            elapsed: Duration::from_millis(3),
            timed_out: false,
            out_of_memory: false,
        }
    }

    fn timeout_outcome() -> ExecutionOutcome {
        ExecutionOutcome {
            stdout: String::new(),
            stderr: "execution timed out".into(),
            exit_code: None,
            elapsed: Duration::from_secs(5),
            timed_out: true,
            out_of_memory: false,
        }
    }

    fn candidate(id: &str, text: &str) -> PatchCandidate {
        PatchCandidate {
            id: id.to_string(),
            description: id.to_string(),
            category: PatchCategory::Correctness,
            text: text.to_string(),
            origin: DefectKind::Unknown,
        }
    }

    /// Executor scripted on source content: "BUG" fails, "SPIN" times out,
    /// anything else succeeds.
    struct MarkerExecutor;

    #[async_trait]
    impl Executor for MarkerExecutor {
        async fn execute(
            &self,
            source: &str,
            _language: Language,
            _stdin: Option<&str>,
        ) -> Result<ExecutionOutcome, RepairError> {
            if source.contains("SPIN") {
                Ok(timeout_outcome())
            } else if source.contains("BUG") {
                Ok(failed_outcome("Error: still broken"))
            } else {
                Ok(ok_outcome())
            }
        }
    }

    async fn pick(candidates: Vec<PatchCandidate>, source: &str) -> Option<ScoredCandidate> {
        select(
            &MarkerExecutor,
            candidates,
            &failed_outcome("Error: broken"),
            source,
            Language::Python,
            &RepairConfig::default(),
        )
        .await
        .unwrap()
    }

    #[test]
    fn success_from_failure_with_small_diff_scores_130() {
        let config = RepairConfig::default();
        assert_eq!(score(1, &ok_outcome(), 2, &config), 130);
    }

    #[test]
    fn still_failing_candidate_scores_from_diff_alone() {
        let config = RepairConfig::default();
        assert_eq!(score(1, &failed_outcome("x"), 2, &config), 10);
        // The first diff beyond the threshold is already penalized
        assert_eq!(score(1, &failed_outcome("x"), 3, &config), -10);
        assert_eq!(score(1, &failed_outcome("x"), 5, &config), -30);
    }

    #[test]
    fn success_is_never_outscored_by_any_failure() {
        let config = RepairConfig::default();
        let huge_success = score(1, &ok_outcome(), 50, &config);
        let best_failure = score(1, &failed_outcome("x"), 0, &config);
        assert_eq!(huge_success, 100);
        assert!(huge_success > best_failure);
    }

    #[test]
    fn introduced_error_is_penalized() {
        let config = RepairConfig::default();
        // Prior outcome was clean, candidate broke it
        assert_eq!(score(0, &failed_outcome("x"), 2, &config), -40);
    }

    #[tokio::test]
    async fn succeeding_candidate_always_beats_failing_one() {
        let source = "line BUG\nsecond\nthird\n";
        // The failing candidate is a two-line edit; the succeeding one
        // rewrites the whole file, far past the penalty threshold. Success
        // must still win.
        let rewrite: String = (0..20).map(|n| format!("statement {n}\n")).collect();
        let selected = pick(
            vec![
                candidate("patch_0", "line BUG!\nsecond\nthird\n"),
                candidate("patch_1", &rewrite),
            ],
            source,
        )
        .await
        .unwrap();
        assert_eq!(selected.candidate.id, "patch_1");
        assert!(selected.outcome.success());
        assert!(selected.score >= 100);
    }

    #[tokio::test]
    async fn equal_scores_prefer_the_smaller_edit() {
        let source = "a BUG\nb\n";
        // Both succeed within the small-diff threshold (identical scores);
        // replacing a line counts two changes, deleting it counts one.
        let selected = pick(
            vec![
                candidate("patch_0", "a fixed\nb\n"),
                candidate("patch_1", "b\n"),
            ],
            source,
        )
        .await
        .unwrap();
        assert_eq!(selected.candidate.id, "patch_1");
        assert_eq!(selected.changed_lines, 1);
    }

    #[tokio::test]
    async fn full_tie_keeps_the_earliest_candidate() {
        let source = "x BUG\n";
        let selected = pick(
            vec![
                candidate("patch_0", "x fixed\n"),
                candidate("patch_1", "x fixed\n"),
            ],
            source,
        )
        .await
        .unwrap();
        assert_eq!(selected.candidate.id, "patch_0");
    }

    #[tokio::test]
    async fn timeout_during_scoring_never_aborts_selection() {
        let source = "v BUG\n";
        let selected = pick(
            vec![
                candidate("patch_0", "v SPIN\n"),
                candidate("patch_1", "v fine\n"),
            ],
            source,
        )
        .await
        .unwrap();
        assert_eq!(selected.candidate.id, "patch_1");
    }

    #[tokio::test]
    async fn best_candidate_returned_even_when_non_positive() {
        let source = "w BUG\n";
        // Every candidate still fails and rewrites the whole file.
        let selected = pick(
            vec![candidate(
                "patch_0",
                "one BUG\ntwo\nthree\nfour\nfive\nsix\nseven\n",
            )],
            source,
        )
        .await
        .unwrap();
        assert!(selected.score <= 0);
        assert_eq!(selected.candidate.id, "patch_0");
    }

    #[tokio::test]
    async fn empty_candidate_list_selects_nothing() {
        assert!(pick(vec![], "x\n").await.is_none());
    }
}
