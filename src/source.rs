//! Source units and the immutable backup chain.
//!
//! The controller owns exactly one current [`SourceUnit`] per session and
//! replaces it wholesale when a patch is accepted; the replaced text is
//! pushed onto a [`BackupChain`] first. The chain is the primary record —
//! the optional on-disk projection exists for operators who want to resume a
//! budget-exhausted session by hand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::RepairError;
use crate::language::Language;

/// The program under repair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceUnit {
    pub language: Language,
    pub text: String,
    pub identity: Uuid,
}

impl SourceUnit {
    pub fn new(language: Language, text: impl Into<String>) -> Self {
        Self {
            language,
            text: text.into(),
            identity: Uuid::new_v4(),
        }
    }

    /// A replacement unit: same identity and language, new text.
    pub fn replaced_with(&self, text: impl Into<String>) -> Self {
        Self {
            language: self.language,
            text: text.into(),
            identity: self.identity,
        }
    }
}

/// One retained pre-patch version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Iteration index whose accepted patch replaced this text.
    pub iteration: u32,
    pub text: String,
    pub recorded_at: DateTime<Utc>,
    /// On-disk projection path, when a backup directory is configured.
    pub path: Option<PathBuf>,
}

/// Append-only arena of pre-patch snapshots. The core never removes entries.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BackupChain {
    snapshots: Vec<Snapshot>,
}

impl BackupChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `text` as the backup for `iteration`, projecting to disk first
    /// when `dir` is set. The write happens before the caller overwrites the
    /// current unit, so a backup always exists for every accepted patch.
    pub fn push(
        &mut self,
        iteration: u32,
        unit: &SourceUnit,
        dir: Option<&Path>,
    ) -> Result<&Snapshot, RepairError> {
        let path = match dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                let file = dir.join(format!(
                    "iter-{iteration:03}.{}",
                    unit.language.extension()
                ));
                std::fs::write(&file, &unit.text)?;
                Some(file)
            }
            None => None,
        };
        self.snapshots.push(Snapshot {
            iteration,
            text: unit.text.clone(),
            recorded_at: Utc::now(),
            path,
        });
        Ok(self.snapshots.last().expect("just pushed"))
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn get(&self, iteration: u32) -> Option<&Snapshot> {
        self.snapshots.iter().find(|s| s.iteration == iteration)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacement_keeps_identity() {
        let unit = SourceUnit::new(Language::Python, "print(1)");
        let replaced = unit.replaced_with("print(2)");
        assert_eq!(unit.identity, replaced.identity);
        assert_eq!(replaced.text, "print(2)");
    }

    #[test]
    fn chain_is_append_only_and_indexed_by_iteration() {
        let unit = SourceUnit::new(Language::Python, "v1");
        let mut chain = BackupChain::new();
        chain.push(1, &unit, None).unwrap();
        chain.push(2, &unit.replaced_with("v2"), None).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.get(1).unwrap().text, "v1");
        assert_eq!(chain.get(2).unwrap().text, "v2");
    }

    #[test]
    fn disk_projection_written_before_return() {
        let dir = tempfile::tempdir().unwrap();
        let unit = SourceUnit::new(Language::JavaScript, "console.log(1);");
        let mut chain = BackupChain::new();
        let snap = chain.push(3, &unit, Some(dir.path())).unwrap();
        let path = snap.path.clone().unwrap();
        assert!(path.ends_with("iter-003.js"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "console.log(1);");
    }
}
