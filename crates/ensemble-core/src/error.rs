//! Error types for the ensemble engine.

use thiserror::Error;
use uuid::Uuid;

use crate::constraint::ConstraintCode;

/// Result type alias using the engine's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error type. The engine never panics through its API boundary;
/// every outward operation returns one of these kinds.
#[derive(Error, Debug)]
pub enum Error {
    /// Context or profile failed validation.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// No template matches the requested occasion and dressiness.
    #[error("No template for occasion '{occasion}' at dressiness {dressiness}")]
    NoTemplate { occasion: String, dressiness: u8 },

    /// A template matched but hard constraints pruned every path.
    /// Carries the dominant violation code and the slot where the beam
    /// emptied.
    #[error("No bundle: {code} at slot {slot} ({reason})")]
    NoBundle {
        code: ConstraintCode,
        slot: String,
        reason: String,
    },

    /// The request deadline expired. `partial` is true when a complete
    /// terminal was available and returned alongside this marker.
    #[error("Deadline exceeded (partial terminal available: {partial})")]
    Deadline { partial: bool },

    /// Wrapped candidate-index failure, surfaced to the caller.
    #[error("Index error: {0}")]
    Index(String),

    /// Inflight request limit reached; the host surfaces this as BUSY.
    #[error("Engine at capacity ({inflight} inflight)")]
    Busy { inflight: usize },

    /// Invariant violation (a bug). Includes the ruleset version and a
    /// trace id for correlation.
    #[error("Internal error [ruleset {ruleset_version}, trace {trace_id}]: {message}")]
    Internal {
        message: String,
        ruleset_version: String,
        trace_id: Uuid,
    },
}

impl Error {
    /// Build an `Internal` error with a fresh trace id.
    pub fn internal(message: impl Into<String>, ruleset_version: impl Into<String>) -> Self {
        Error::Internal {
            message: message.into(),
            ruleset_version: ruleset_version.into(),
            trace_id: Uuid::new_v4(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::InvalidInput(format!("malformed document: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_template_display() {
        let err = Error::NoTemplate {
            occasion: "work_office".to_string(),
            dressiness: 4,
        };
        assert_eq!(
            err.to_string(),
            "No template for occasion 'work_office' at dressiness 4"
        );
    }

    #[test]
    fn test_no_bundle_display_carries_code_and_slot() {
        let err = Error::NoBundle {
            code: ConstraintCode::StrictCoordIncomplete,
            slot: "bottom".to_string(),
            reason: "group g1 missing member for bottom".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("STRICT_COORD_INCOMPLETE"));
        assert!(msg.contains("bottom"));
    }

    #[test]
    fn test_internal_carries_ruleset_version() {
        let err = Error::internal("state desync", "rs-2024.1");
        assert!(err.to_string().contains("rs-2024.1"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
