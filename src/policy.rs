//! Trait seams for the excluded collaborators.
//!
//! The rule-policy DSL loader and per-language patch template packs live
//! outside this crate; the controller consumes them through these traits.

use crate::defect::DefectDescriptor;
use crate::generate::PatchCandidate;
use crate::language::Language;

/// Allow/deny filter applied to generated candidates before scoring.
pub trait RulePolicy: Send + Sync {
    fn is_allowed(&self, candidate_id: &str) -> bool;
    /// Upper bound on candidates handed to the scorer per iteration.
    fn max_candidates_per_iteration(&self) -> usize;
}

/// Default policy: everything allowed, fan-out bounded only by the scorer's
/// natural candidate count.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAll;

impl RulePolicy for AllowAll {
    fn is_allowed(&self, _candidate_id: &str) -> bool {
        true
    }

    fn max_candidates_per_iteration(&self) -> usize {
        usize::MAX
    }
}

/// Extension point for language-specific patch templates beyond the built-in
/// heuristics. Plugin candidates are appended after built-ins, so built-in
/// ordering (and therefore tie-breaking) is unaffected.
pub trait LanguagePlugin: Send + Sync {
    fn generate_patches(
        &self,
        defect: &DefectDescriptor,
        source: &str,
        language: Language,
    ) -> Vec<PatchCandidate>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_all_is_permissive() {
        let policy = AllowAll;
        assert!(policy.is_allowed("patch_0"));
        assert!(policy.is_allowed("anything"));
        assert_eq!(policy.max_candidates_per_iteration(), usize::MAX);
    }
}
