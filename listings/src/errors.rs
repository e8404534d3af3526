use std::borrow::Cow;

use thiserror::Error;

/// Top-level error type returned by the planner, stores, and client facade.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// Malformed or out-of-range filter value. Surfaced to callers as a client error.
    #[error("invalid parameter `{field}`: {message}")]
    InvalidParameter { field: String, message: String },

    /// Internal invariant violation while assembling a pipeline.
    #[error("invalid pipeline: {message}")]
    InvalidPipeline { message: String },

    /// Underlying MongoDB command failed.
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// Storage returned something the planner cannot interpret, or a non-driver store failed.
    #[error("storage error: {message}")]
    Storage { message: Cow<'static, str> },

    /// Execution exceeded the configured query deadline and was cancelled.
    #[error("query timed out after {elapsed_ms} ms")]
    Timeout { elapsed_ms: u64 },

    /// No collection profile is registered under the requested name.
    #[error("unknown collection: {name}")]
    UnknownCollection { name: String },

    /// Configuration could not be loaded or failed validation.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl PlannerError {
    pub fn invalid_parameter(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_pipeline(message: impl Into<String>) -> Self {
        Self::InvalidPipeline {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Errors caused by the request itself rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidParameter { .. } | Self::UnknownCollection { .. })
    }

    /// Storage-side failures a caller may reasonably retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Mongo(_) | Self::Storage { .. } | Self::Timeout { .. })
    }

    /// HTTP status an outer handler should map this error to.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidParameter { .. } => 400,
            Self::UnknownCollection { .. } => 404,
            Self::Mongo(_) | Self::Storage { .. } => 503,
            Self::Timeout { .. } => 504,
            Self::InvalidPipeline { .. } | Self::Config { .. } => 500,
        }
    }
}

pub type PlannerResult<T> = Result<T, PlannerError>;
