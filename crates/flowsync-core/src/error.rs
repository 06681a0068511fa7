// ── Core error types ──
//
// Errors surfaced by the reconciliation engine. Expected conditions
// (unknown key on unregister, absent row on an operator trigger) are
// NOT errors -- they come back as `Option`/`bool` from the registries.

use thiserror::Error;

use crate::table::TableId;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Provisioning errors ──────────────────────────────────────────
    #[error("Only IP flows are supported (flow {flow_id})")]
    UnsupportedTransport { flow_id: String },

    #[error("Unknown action: {action}")]
    UnknownAction { action: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Entity not found: {entity_type} with id {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Environment errors ───────────────────────────────────────────
    #[error("Timed out after {timeout_ms}ms waiting for {what}")]
    Timeout { what: String, timeout_ms: u64 },

    #[error("Table {table} unavailable: {message}")]
    Table { table: TableId, message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }

    pub(crate) fn provisioned_not_found(id: impl ToString) -> Self {
        Self::NotFound {
            entity_type: "provisioned flow".into(),
            identifier: id.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::validation(format!("malformed message payload: {err}"))
    }
}
