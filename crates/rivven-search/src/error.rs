//! Error types for rivven-search
//!
//! Failures fall into three classes:
//! - Fatal (configuration, invariant, provisioning): the affected table or
//!   event cannot make safe progress and the error propagates to the caller
//! - Transport: the target store could not be reached; retriable by the caller
//! - Soft write failures are not errors at all; they are reported as a zero
//!   success count by the executor

use std::fmt;
use thiserror::Error;

/// Result type for rivven-search operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid sync configuration (rules, column maps, targets)
    Configuration,
    /// A programming invariant was violated by the caller
    Invariant,
    /// The target index could not be provisioned
    Provisioning,
    /// Network / IO failure talking to the target store (retriable)
    Transport,
    /// Document or response (de)serialization failed
    Serialization,
    /// The source-metadata collaborator failed
    Metadata,
    /// Unknown/other errors
    Other,
}

impl ErrorCategory {
    /// Whether errors in this category abort the unit of work
    #[inline]
    pub const fn is_fatal(self) -> bool {
        matches!(
            self,
            Self::Configuration | Self::Invariant | Self::Provisioning
        )
    }

    /// Whether errors in this category are generally retriable
    #[inline]
    pub const fn is_retriable(self) -> bool {
        matches!(self, Self::Transport)
    }
}

/// Main error type for rivven-search
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum SyncError {
    /// Generic configuration error
    #[error("configuration error: {message}")]
    Config { message: String },

    /// A column map could not be parsed as structured data
    #[error("invalid column map for rule '{rule}': {message}")]
    InvalidColumnMapping { rule: String, message: String },

    /// A column directive has more parts than `name,type`
    #[error("invalid directive '{directive}' for column '{column}': expected 'name', 'name,type' or ',type'")]
    InvalidDirective { column: String, directive: String },

    /// An explicit target field type is not in the supported set
    #[error("unsupported target field type '{field_type}' for column '{column}'")]
    UnsupportedFieldType { column: String, field_type: String },

    /// A table or rule pattern is not a valid regular expression
    #[error("invalid table pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// No sync group of the source database covers the table
    #[error("table {db_id}.{table} is not covered by any sync group")]
    TableNotConfigured { db_id: String, table: String },

    /// No target store is registered under the id
    #[error("unknown target database: {target_db_id}")]
    UnknownTarget { target_db_id: String },

    /// A change event carried a DML kind outside insert/update/delete
    #[error("unknown dml kind: {kind}")]
    UnknownDmlKind { kind: String },

    /// A batch mixes targets or contains non-insert requests
    #[error("invalid batch: {message}")]
    InvalidBatch { message: String },

    /// The target store did not acknowledge index creation
    #[error("index creation for '{index}' was not acknowledged")]
    IndexNotAcknowledged { index: String },

    /// Transport failure talking to the target store
    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The target store answered a request with an error status
    #[error("store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Serialization failure
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// Source metadata lookup failed
    #[error("metadata error: {message}")]
    Metadata { message: String },

    /// Internal error
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl SyncError {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config { .. }
            | Self::InvalidColumnMapping { .. }
            | Self::InvalidDirective { .. }
            | Self::UnsupportedFieldType { .. }
            | Self::InvalidPattern { .. }
            | Self::TableNotConfigured { .. }
            | Self::UnknownTarget { .. } => ErrorCategory::Configuration,
            Self::UnknownDmlKind { .. } | Self::InvalidBatch { .. } => ErrorCategory::Invariant,
            Self::IndexNotAcknowledged { .. } => ErrorCategory::Provisioning,
            Self::Transport { .. } => ErrorCategory::Transport,
            Self::Rejected { status, .. } if *status >= 500 => ErrorCategory::Transport,
            Self::Rejected { .. } => ErrorCategory::Other,
            Self::Serialization { .. } => ErrorCategory::Serialization,
            Self::Metadata { .. } => ErrorCategory::Metadata,
            Self::Internal { .. } => ErrorCategory::Other,
        }
    }

    /// Whether this error aborts processing of the affected table or event
    #[inline]
    pub fn is_fatal(&self) -> bool {
        self.category().is_fatal()
    }

    /// Whether this error is retriable
    #[inline]
    pub fn is_retriable(&self) -> bool {
        self.category().is_retriable()
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error with source
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a rejected-request error
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a metadata error
    pub fn metadata(message: impl Into<String>) -> Self {
        Self::Metadata {
            message: message.into(),
        }
    }

    /// Create an invalid batch error
    pub fn invalid_batch(message: impl Into<String>) -> Self {
        Self::InvalidBatch {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for SyncError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::config(e.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(e: std::io::Error) -> Self {
        Self::transport_with_source("io failure", e)
    }
}

#[cfg(feature = "elasticsearch")]
impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::serialization(e.to_string())
        } else {
            Self::transport_with_source(e.to_string(), e)
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Invariant => write!(f, "invariant"),
            Self::Provisioning => write!(f, "provisioning"),
            Self::Transport => write!(f, "transport"),
            Self::Serialization => write!(f, "serialization"),
            Self::Metadata => write!(f, "metadata"),
            Self::Other => write!(f, "other"),
        }
    }
}
