//! Remedy: an autonomous program-repair engine.
//!
//! Given a source unit (text plus declared language) that fails to execute
//! correctly or fails a supplied test oracle, the engine classifies the
//! defect, synthesizes candidate fixes, validates each by re-execution in an
//! isolated sandbox, applies the highest-scoring fix, and repeats until the
//! program succeeds or the iteration budget is exhausted.
//!
//! The crate is a library; command-line surfaces, policy loaders, and report
//! renderers are external collaborators built on [`RepairReport`] and the
//! trait seams in [`policy`].

pub mod analysis;
pub mod classify;
pub mod config;
pub mod defect;
pub mod diff;
pub mod error;
pub mod generate;
pub mod language;
pub mod oracle;
pub mod policy;
pub mod repair;
pub mod sandbox;
pub mod score;
pub mod source;

pub use config::{RepairConfig, SandboxConfig};
pub use defect::{AnalysisTier, DefectDescriptor, DefectKind, LogicRule};
pub use error::RepairError;
pub use generate::{PatchCandidate, PatchCategory};
pub use language::Language;
pub use oracle::TestOracle;
pub use policy::{AllowAll, LanguagePlugin, RulePolicy};
pub use repair::{
    IterationRecord, IterationStatus, RepairController, RepairReport, TerminalState,
};
pub use sandbox::{ExecutionOutcome, Executor, ProcessSandbox};
pub use score::ScoredCandidate;
pub use source::SourceUnit;
