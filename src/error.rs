//! Error types for usermig.
//!
//! ## Rules
//!
//! - `thiserror` for enum derivation, no manual `Display` impls.
//! - Row validation failures never escalate past the roster parser.
//! - Every `ApiError` names the NerdGraph operation that produced it.

use serde_json::Value;
use thiserror::Error;

/// Reason a roster row was rejected. The row is dropped and the run continues.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("File does not have the correct header fields (missing {column})")]
    MissingColumn { column: String },

    #[error("Email address is invalid")]
    InvalidEmail,

    #[error("User type is invalid")]
    InvalidUserType,

    #[error("Name or Groups is empty")]
    EmptyNameOrGroups,
}

/// Failure of a single NerdGraph operation.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The GraphQL document could not be rendered from the query parameters.
    #[error("{operation}: malformed query: {reason}")]
    MalformedQuery { operation: String, reason: String },

    /// The request never completed or returned a non-2xx status.
    #[error("{operation}: transport failure{}: {message}", .status.as_ref().map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Transport {
        operation: String,
        status: Option<u16>,
        message: String,
    },

    /// The response body was not valid JSON.
    #[error("{operation}: JSON deserialization failed: {message}")]
    Decode { operation: String, message: String },

    /// The server answered with a top-level `errors` array. The full response
    /// is kept so partial data can still be inspected.
    #[error("{operation}: GraphQL error: {message}")]
    GraphQl {
        operation: String,
        message: String,
        response: Value,
    },

    /// An expected field is absent from the response.
    #[error("{operation}: unexpected response shape, missing {path}")]
    UnexpectedShape { operation: String, path: String },
}

impl ApiError {
    /// Name of the operation that failed.
    pub fn operation(&self) -> &str {
        match self {
            ApiError::MalformedQuery { operation, .. }
            | ApiError::Transport { operation, .. }
            | ApiError::Decode { operation, .. }
            | ApiError::GraphQl { operation, .. }
            | ApiError::UnexpectedShape { operation, .. } => operation,
        }
    }
}

/// Failure reading the TSV roster itself (not a bad row).
#[derive(Debug, Error)]
pub enum RosterError {
    #[error("Failed to read roster {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write roster: {0}")]
    Write(#[from] csv::Error),
}

/// Run-level failure. Any of these terminates the run.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("User {email} not found")]
    UserNotFound { email: String },

    #[error("No users found in the tsv file")]
    NoValidRows,

    #[error("Setting {0} is required for this mode")]
    MissingSetting(&'static str),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MigrationError>;

/// Failure loading or bootstrapping the YAML configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Refusing to over-write an existing file: {path}")]
    AlreadyExists { path: String },

    #[error("Failed to write configuration {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unknown log level {0:?}")]
    InvalidLogLevel(String),

    #[error("No api_key configured and NEW_RELIC_API_KEY is not set")]
    MissingApiKey,

    #[error("No tsv roster configured")]
    MissingRoster,
}
