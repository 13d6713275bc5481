//! Unified error taxonomy for the agent fleet runtime.
//!
//! Every error surfaced by a fleet crate carries a stable, machine-readable
//! [`ErrorCode`], a human-readable message, an optional cause, and arbitrary
//! structured context. RPC handlers translate [`ErrorCode`] to a transport
//! status; retry helpers consult [`ErrorCode::is_retryable`] directly rather
//! than re-deriving it from strings.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Broad family an [`ErrorCode`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Key or identifier absent.
    NotFound,
    /// Malformed request or encoding.
    Validation,
    /// Missing, invalid, or expired credentials.
    Unauthenticated,
    /// Policy rejected a resource read.
    AccessDenied,
    /// Resource already exists (usually swallowed by callers).
    Conflict,
    /// Network/availability failure, retry-eligible.
    Transient,
    /// Deadline exceeded or upstream cancel.
    Cancelled,
    /// Anything else.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "not_found",
            Self::Validation => "validation",
            Self::Unauthenticated => "unauthenticated",
            Self::AccessDenied => "access_denied",
            Self::Conflict => "conflict",
            Self::Transient => "transient",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Machine-readable, stable error code.
///
/// Serializes to `SCREAMING_SNAKE_CASE` and is guaranteed not to change
/// across patch releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Storage key or index identifier not found.
    NotFound,
    /// Malformed request, missing required field, or bad identifier encoding.
    InvalidArgument,
    /// Graph query or identifier string failed to parse.
    ParseFailed,
    /// HMAC/JWT token missing, invalid, or expired.
    Unauthenticated,
    /// Policy evaluation denied the read.
    AccessDenied,
    /// Bucket or resource already exists.
    Conflict,
    /// Network failure, 429, 5xx, or UNAVAILABLE — safe to retry.
    Unavailable,
    /// Deadline exceeded or caller cancelled.
    Cancelled,
    /// Unexpected resource type tag during deserialization.
    UnknownType,
    /// Secret or config value required but not set.
    MissingSecret,
    /// Catch-all for unexpected internal failures.
    Internal,
}

impl ErrorCode {
    /// Returns the broad [`ErrorCategory`] this code belongs to.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound => ErrorCategory::NotFound,
            Self::InvalidArgument | Self::ParseFailed | Self::UnknownType => {
                ErrorCategory::Validation
            }
            Self::Unauthenticated | Self::MissingSecret => ErrorCategory::Unauthenticated,
            Self::AccessDenied => ErrorCategory::AccessDenied,
            Self::Conflict => ErrorCategory::Conflict,
            Self::Unavailable => ErrorCategory::Transient,
            Self::Cancelled => ErrorCategory::Cancelled,
            Self::Internal => ErrorCategory::Internal,
        }
    }

    /// Whether a retry helper may re-attempt an operation that failed with
    /// this code. Only [`ErrorCategory::Transient`] is retryable; auth,
    /// validation, access, and not-found failures are never retried.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.category(), ErrorCategory::Transient)
    }

    /// Stable `&'static str` representation (e.g. `"NOT_FOUND"`).
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::ParseFailed => "PARSE_FAILED",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::Conflict => "CONFLICT",
            Self::Unavailable => "UNAVAILABLE",
            Self::Cancelled => "CANCELLED",
            Self::UnknownType => "UNKNOWN_TYPE",
            Self::MissingSecret => "MISSING_SECRET",
            Self::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified fleet error.
///
/// # Examples
///
/// ```
/// use fleet_error::{ErrorCode, FleetError};
///
/// let err = FleetError::new(ErrorCode::NotFound, "no such key")
///     .with_context("key", "resources/common.Message.abc.json");
/// assert_eq!(err.code, ErrorCode::NotFound);
/// ```
pub struct FleetError {
    /// Machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
    /// Optional underlying cause.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    /// Arbitrary structured context for diagnostics.
    pub context: BTreeMap<String, serde_json::Value>,
}

impl FleetError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
            context: BTreeMap::new(),
        }
    }

    /// Attach a key-value pair to the diagnostic context.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.context.insert(key.into(), v);
        }
        self
    }

    /// Attach an underlying cause.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Shorthand for `self.code.category()`.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Shorthand for `self.code.is_retryable()`.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }

    /// Convenience constructor for [`ErrorCode::NotFound`].
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Convenience constructor for [`ErrorCode::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArgument, message)
    }

    /// Convenience constructor for [`ErrorCode::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

impl fmt::Debug for FleetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("FleetError");
        d.field("code", &self.code);
        d.field("message", &self.message);
        if let Some(ref src) = self.source {
            d.field("source", &src.to_string());
        }
        if !self.context.is_empty() {
            d.field("context", &self.context);
        }
        d.finish()
    }
}

impl fmt::Display for FleetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)?;
        if !self.context.is_empty() {
            // Deterministic output thanks to BTreeMap.
            if let Ok(ctx) = serde_json::to_string(&self.context) {
                write!(f, " {ctx}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for FleetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Serializable snapshot of a [`FleetError`] (without the opaque source).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FleetErrorDto {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
    /// Structured context.
    pub context: BTreeMap<String, serde_json::Value>,
    /// String representation of the source error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_message: Option<String>,
}

impl From<&FleetError> for FleetErrorDto {
    fn from(err: &FleetError) -> Self {
        Self {
            code: err.code,
            message: err.message.clone(),
            context: err.context.clone(),
            source_message: err.source.as_ref().map(|s| s.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_only_for_transient() {
        assert!(ErrorCode::Unavailable.is_retryable());
        assert!(!ErrorCode::NotFound.is_retryable());
        assert!(!ErrorCode::Unauthenticated.is_retryable());
        assert!(!ErrorCode::AccessDenied.is_retryable());
        assert!(!ErrorCode::InvalidArgument.is_retryable());
    }

    #[test]
    fn display_includes_code_and_message() {
        let err = FleetError::new(ErrorCode::Conflict, "bucket exists");
        assert_eq!(err.to_string(), "[CONFLICT] bucket exists");
    }

    #[test]
    fn context_round_trips_through_dto() {
        let err = FleetError::new(ErrorCode::NotFound, "missing").with_context("key", "a.b");
        let dto = FleetErrorDto::from(&err);
        assert_eq!(dto.context.get("key").unwrap(), "a.b");
    }
}
