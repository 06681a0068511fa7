//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help text.

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use flowsync_config::ConfigError;
use flowsync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(flowsync::not_found),
        help("List what exists with: flowsync {list_command}")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("Unknown element '{element}'")]
    #[diagnostic(
        code(flowsync::unknown_element),
        help("Add an [elements.{element}] profile to the config file, or pass --tables.")
    )]
    UnknownElement { element: String },

    // ── Input ────────────────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    #[diagnostic(code(flowsync::validation))]
    Validation { message: String },

    #[error("Provisioning rejected: {message}")]
    #[diagnostic(code(flowsync::rejected))]
    Rejected { message: String },

    #[error("Invalid JSON in {path}")]
    #[diagnostic(code(flowsync::invalid_json))]
    InvalidJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // ── Timing ───────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(
        code(flowsync::timeout),
        help("Raise bootstrap_timeout_secs in the element profile, or check the interface table.")
    )]
    Timeout { message: String },

    // ── Storage / config ─────────────────────────────────────────────
    #[error("Table store error: {message}")]
    #[diagnostic(code(flowsync::table))]
    Table { message: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(
        code(flowsync::config),
        help("Check the config file shown by: flowsync config path")
    )]
    Config { message: String },

    #[error("Could not access {path}")]
    #[diagnostic(code(flowsync::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {0}")]
    #[diagnostic(code(flowsync::internal))]
    Internal(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } | Self::UnknownElement { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::InvalidJson { .. } => exit_code::USAGE,
            Self::Rejected { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Table { .. } | Self::Config { .. } | Self::Io { .. } | Self::Internal(_) => {
                exit_code::GENERAL
            }
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::NotFound {
                entity_type,
                identifier,
            } => {
                let list_command = if entity_type.contains("provisioned") {
                    "provisioned"
                } else {
                    "flows rx"
                };
                Self::NotFound {
                    resource_type: entity_type,
                    identifier,
                    list_command: list_command.into(),
                }
            }
            CoreError::ValidationFailed { message } => Self::Validation { message },
            err @ (CoreError::UnsupportedTransport { .. } | CoreError::UnknownAction { .. }) => {
                Self::Rejected {
                    message: err.to_string(),
                }
            }
            err @ CoreError::Timeout { .. } => Self::Timeout {
                message: err.to_string(),
            },
            err @ CoreError::Table { .. } => Self::Table {
                message: err.to_string(),
            },
            CoreError::Internal(message) => Self::Internal(message),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownElement { element } => Self::UnknownElement { element },
            other => Self::Config {
                message: other.to_string(),
            },
        }
    }
}
