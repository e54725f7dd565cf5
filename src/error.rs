//! Fatal error taxonomy.
//!
//! Only conditions that abort a session live here. Everything the repair loop
//! can recover from (syntax, compile, runtime, timeout, logical findings) is
//! data, not an error: see [`crate::defect::DefectDescriptor`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepairError {
    /// Unsupported language or missing toolchain. Fatal: aborts the whole
    /// session, never retried, never downgraded to a compile failure.
    #[error("configuration error for {language}: {detail}")]
    Configuration { language: String, detail: String },

    /// A core invariant was violated (e.g. analysis invoked on source that
    /// bypassed the parse gate). Indicates a bug in this crate; surfaced,
    /// never swallowed.
    #[error("internal invariant violated: {0}")]
    Internal(String),

    /// Sandbox workspace or backup projection I/O failure.
    #[error("workspace I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl RepairError {
    pub fn is_fatal(&self) -> bool {
        // Every variant here ends the session; the method exists so call
        // sites read as intent rather than as a blanket `Err` check.
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_names_language() {
        let err = RepairError::Configuration {
            language: "go".to_string(),
            detail: "toolchain not found: go".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("go"));
        assert!(msg.contains("toolchain not found"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: RepairError = io.into();
        assert!(matches!(err, RepairError::Io(_)));
    }
}
