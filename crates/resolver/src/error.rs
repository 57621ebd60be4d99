//! Error types for the resolver
//!
//! Library errors use `thiserror`; the binary boundary wraps them in
//! `anyhow`. Every variant maps to one caller-visible failure class:
//! - `InvalidFingerprint`: caller input rejected, never a system fault
//! - `Busy`: a generation control operation raced a running generation
//! - `StoreUnavailable`: any datastore failure, lookup or generation
//! - `GenerationFailed`: fatal generation outcome, index state unknown
//! - `Configuration`: invalid or unloadable configuration

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResolverError {
    /// A fingerprint failed format validation. Reported to the caller,
    /// never retried.
    #[error("invalid fingerprint {value:?} (expected 32 lowercase hex characters)")]
    InvalidFingerprint { value: String },

    /// A generation control operation was attempted while a run was in
    /// progress. The caller may retry once the run has finished.
    #[error("a generation run is already in progress")]
    Busy,

    /// A datastore operation failed. Aborts a generation run if it occurs
    /// mid-run; propagated as-is on the lookup path.
    #[error("reverse-index store unavailable: {source}")]
    StoreUnavailable {
        #[from]
        source: sqlx::Error,
    },

    /// A generation run terminated abnormally. The partial state of the
    /// store cannot be distinguished from "nothing committed", so the only
    /// recovery is a rebuild.
    #[error("generation run failed: {details}; the reverse index should be rebuilt from scratch")]
    GenerationFailed { details: String },

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {details}")]
    Configuration { details: String },
}

impl ResolverError {
    pub fn invalid_fingerprint(value: impl Into<String>) -> Self {
        Self::InvalidFingerprint {
            value: value.into(),
        }
    }

    pub fn generation_failed(details: impl Into<String>) -> Self {
        Self::GenerationFailed {
            details: details.into(),
        }
    }

    pub fn configuration(details: impl Into<String>) -> Self {
        Self::Configuration {
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_fingerprint_display_includes_value() {
        let err = ResolverError::invalid_fingerprint("XYZ");
        let display = format!("{err}");
        assert!(display.contains("XYZ"));
        assert!(display.contains("32 lowercase hex"));
    }

    #[test]
    fn generation_failed_recommends_rebuild() {
        let err = ResolverError::generation_failed("worker exited abnormally");
        assert!(format!("{err}").contains("rebuilt from scratch"));
    }
}
