//! Session configuration.
//!
//! Both structs are plain values threaded explicitly through calls; there are
//! no ambient globals. Defaults mirror the constants the scoring and sandbox
//! behavior was tuned against — they are knobs, not principled numbers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Resource bounds for one sandboxed execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Wall-clock limit for running the program. On expiry the process group
    /// is force-killed and the outcome is marked timed out.
    pub time_limit: Duration,
    /// Separate limit for compiler invocations, which legitimately take
    /// longer than the programs they produce.
    pub compile_time_limit: Duration,
    /// Address-space ceiling in bytes, applied via `RLIMIT_AS` on unix.
    pub memory_limit: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            time_limit: Duration::from_secs(5),
            compile_time_limit: Duration::from_secs(10),
            memory_limit: 512 * 1024 * 1024,
        }
    }
}

/// Tuning for the repair loop, candidate generation, and scoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairConfig {
    /// Hard bound on repair iterations; termination follows from this.
    pub max_iterations: u32,
    /// Whether the generator may emit efficiency-category candidates
    /// (always capped at two per defect).
    pub allow_efficiency_patches: bool,
    /// A candidate changing at most this many lines earns the small-diff
    /// bonus.
    pub small_diff_threshold: usize,
    /// Penalty per changed line beyond `small_diff_threshold`.
    pub diff_penalty_per_line: i64,
    /// How many lines below a `while (true)`-style header to scan for a
    /// `break` before calling the loop infinite (heuristic tier only).
    pub break_scan_window: usize,
    /// Added to each logical finding's confidence when a supplied oracle
    /// fails, capped at 0.99 so analysis findings never masquerade as
    /// observed ones.
    pub oracle_confidence_boost: f64,
    /// When set, each accepted patch writes the pre-patch text here as
    /// `iter-NNN.<ext>` before the overwrite. The in-memory backup chain is
    /// the primary record either way.
    pub backup_dir: Option<PathBuf>,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            allow_efficiency_patches: false,
            small_diff_threshold: 2,
            diff_penalty_per_line: 10,
            break_scan_window: 20,
            oracle_confidence_boost: 0.15,
            backup_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_bounded() {
        let sandbox = SandboxConfig::default();
        assert!(sandbox.time_limit < sandbox.compile_time_limit);
        assert!(sandbox.memory_limit > 0);

        let repair = RepairConfig::default();
        assert!(repair.max_iterations > 0);
        assert!(repair.oracle_confidence_boost < 1.0);
        assert!(repair.backup_dir.is_none());
    }
}
