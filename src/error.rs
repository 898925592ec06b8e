//! Error types for debrid-dl
//!
//! This module provides the error taxonomy for the library:
//! - Domain-specific error types (Job, Provider, PostProcess, Database)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for debrid-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for debrid-dl
///
/// Per-job failures (link resolution, provider exhaustion, transfer and extraction
/// failures) end up as the `error_message` of the job record; everything else is
/// returned to the caller of the public API.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "providers")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Job lifecycle error (unknown job, invalid state for the operation)
    #[error("job error: {0}")]
    Job(#[from] JobError),

    /// Unlocking provider error (surfaced once every provider has failed)
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Post-processing error (extraction, move)
    #[error("post-processing error: {0}")]
    PostProcess(#[from] PostProcessError),

    /// Submitted container could not be parsed or misses required fields
    #[error("malformed container: {0}")]
    MalformedContainer(String),

    /// The link points to a resource that is gone or could not be resolved
    #[error("link resolution failed: {0}")]
    LinkResolution(String),

    /// The external transfer process failed
    #[error("transfer failed: {0}")]
    TransferProcess(String),

    /// Invalid caller input (bad URL, empty id list, ...)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// External tool execution failed (curl, unrar, 7z, ...)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// Job lifecycle errors
#[derive(Debug, Error)]
pub enum JobError {
    /// Job not found in the store
    #[error("job {id} not found")]
    NotFound {
        /// The job ID that was not found
        id: String,
    },

    /// Cannot perform operation in current state
    #[error("cannot {operation} job {id} in state {current_state}")]
    InvalidState {
        /// The job ID that is in an invalid state for the operation
        id: String,
        /// The operation that was attempted (e.g., "pause", "resume")
        operation: String,
        /// The current state that prevents the operation
        current_state: String,
    },
}

/// Errors raised by a single unlocking provider
///
/// The provider chain recovers from these by moving on to the next provider; they only
/// reach a job record when every enabled provider has failed.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure talking to the provider
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with an error envelope
    #[error("{provider} returned {code}: {message}")]
    Api {
        /// Provider name
        provider: &'static str,
        /// Provider-specific error code
        code: String,
        /// Provider-supplied message
        message: String,
    },

    /// The provider does not offer the requested capability
    #[error("{provider} does not support {operation}")]
    Unsupported {
        /// Provider name
        provider: &'static str,
        /// The operation that was attempted
        operation: &'static str,
    },

    /// Container processing exceeded the configured wait
    #[error("{provider} did not finish processing within {elapsed:?}")]
    Timeout {
        /// Provider name
        provider: &'static str,
        /// Time spent waiting
        elapsed: Duration,
    },

    /// The provider reported the remote job as failed
    #[error("{provider} reported job {provider_job_id} as failed: {message}")]
    JobFailed {
        /// Provider name
        provider: &'static str,
        /// Provider-side job id
        provider_job_id: String,
        /// Reason given by the provider
        message: String,
    },

    /// The response could not be understood
    #[error("{provider} sent an unexpected response: {message}")]
    InvalidResponse {
        /// Provider name
        provider: &'static str,
        /// What was wrong with it
        message: String,
    },

    /// No provider is able to perform the operation
    #[error("no provider available: {0}")]
    NotConfigured(String),
}

/// Post-processing errors (extraction, move)
#[derive(Debug, Error)]
pub enum PostProcessError {
    /// Archive extraction failed
    #[error("extraction failed for {archive}: {reason}")]
    ExtractionFailed {
        /// The archive file that failed to extract
        archive: PathBuf,
        /// The tool output or reason extraction failed
        reason: String,
    },

    /// File move/copy failed
    #[error("failed to move {source_path} to {dest_path}: {reason}")]
    MoveFailed {
        /// The source path of the file being moved
        source_path: PathBuf,
        /// The destination path where the file should be moved
        dest_path: PathBuf,
        /// The reason the move failed
        reason: String,
    },

    /// An in-flight move or extraction was cancelled
    #[error("move to {dest_path} aborted")]
    MoveAborted {
        /// The destination that was being written
        dest_path: PathBuf,
    },

    /// Invalid path encountered during post-processing
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// The invalid path that was encountered
        path: PathBuf,
        /// The reason the path is invalid
        reason: String,
    },
}

/// API error response format
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "job_not_found",
///     "message": "job error: job 3f2a... not found",
///     "details": { "job_id": "3f2a..." }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "not_found", "validation_error")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::InvalidInput(_) => 400,
            Error::MalformedContainer(_) => 422,

            // 404 Not Found
            Error::Job(JobError::NotFound { .. }) => 404,

            // 409 Conflict
            Error::Job(JobError::InvalidState { .. }) => 409,

            // 422 Unprocessable Entity - Semantic errors
            Error::PostProcess(_) => 422,
            Error::LinkResolution(_) => 422,

            // 500 Internal Server Error - Server-side issues
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Serialization(_) => 500,
            Error::TransferProcess(_) => 500,
            Error::Other(_) => 500,

            // 502 Bad Gateway - External service errors
            Error::Provider(ProviderError::Timeout { .. }) => 504,
            Error::Provider(_) => 502,
            Error::Network(_) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
            Error::ExternalTool(_) => 503,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Job(e) => match e {
                JobError::NotFound { .. } => "job_not_found",
                JobError::InvalidState { .. } => "invalid_state",
            },
            Error::Provider(e) => match e {
                ProviderError::Timeout { .. } => "provider_timeout",
                ProviderError::NotConfigured(_) => "provider_not_configured",
                _ => "provider_error",
            },
            Error::PostProcess(e) => match e {
                PostProcessError::ExtractionFailed { .. } => "extraction_failed",
                PostProcessError::MoveFailed { .. } => "move_failed",
                PostProcessError::MoveAborted { .. } => "move_aborted",
                PostProcessError::InvalidPath { .. } => "invalid_path",
            },
            Error::MalformedContainer(_) => "malformed_container",
            Error::LinkResolution(_) => "link_resolution_failed",
            Error::TransferProcess(_) => "transfer_failed",
            Error::InvalidInput(_) => "validation_error",
            Error::Io(_) => "io_error",
            Error::ShuttingDown => "shutting_down",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::Job(JobError::NotFound { id }) => Some(serde_json::json!({
                "job_id": id,
            })),
            Error::Job(JobError::InvalidState {
                id,
                operation,
                current_state,
            }) => Some(serde_json::json!({
                "job_id": id,
                "operation": operation,
                "current_state": current_state,
            })),
            Error::PostProcess(PostProcessError::ExtractionFailed { archive, .. }) => {
                Some(serde_json::json!({
                    "archive": archive,
                }))
            }
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}
