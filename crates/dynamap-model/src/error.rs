//! Transport errors.
//!
//! A transport reports every failure as a [`StoreError`]. The mapper never
//! inspects or wraps the code; it hands the error back to the caller as-is.

use std::error::Error;
use std::fmt;

type BoxError = Box<dyn Error + Send + Sync>;

/// Error codes a store can answer with, plus [`Self::TransportFailure`] for
/// exchanges that never produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum StoreErrorCode {
    /// The table does not exist.
    ResourceNotFoundException,
    /// A condition expression did not hold.
    ConditionalCheckFailedException,
    /// The table is over its provisioned capacity.
    ProvisionedThroughputExceededException,
    /// The account is over its request rate.
    RequestLimitExceeded,
    /// The request was rejected as malformed.
    #[default]
    ValidationException,
    /// The request body could not be read.
    SerializationException,
    /// The store failed while serving the request.
    InternalServerError,
    /// The caller may not perform the request.
    AccessDeniedException,
    /// No answer: connection, timeout or body read failure.
    TransportFailure,
}

impl StoreErrorCode {
    /// The code as it appears in an error response's `__type`.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceNotFoundException => "ResourceNotFoundException",
            Self::ConditionalCheckFailedException => "ConditionalCheckFailedException",
            Self::ProvisionedThroughputExceededException => {
                "ProvisionedThroughputExceededException"
            }
            Self::RequestLimitExceeded => "RequestLimitExceeded",
            Self::ValidationException => "ValidationException",
            Self::SerializationException => "SerializationException",
            Self::InternalServerError => "InternalServerError",
            Self::AccessDeniedException => "AccessDeniedException",
            Self::TransportFailure => "TransportFailure",
        }
    }
}

impl fmt::Display for StoreErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed transport call.
#[derive(Debug)]
pub struct StoreError {
    /// What went wrong.
    pub code: StoreErrorCode,
    /// Detail from the store, or the code itself when none was given.
    pub message: String,
    /// Lower-level cause, such as an I/O error.
    pub source: Option<BoxError>,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreError({}): {}", self.code, self.message)
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_deref().map(|e| e as &(dyn Error + 'static))
    }
}

impl StoreError {
    /// An error whose message is its code.
    #[must_use]
    pub fn new(code: StoreErrorCode) -> Self {
        Self::with_message(code, code.as_str())
    }

    /// An error with a message.
    #[must_use]
    pub fn with_message(code: StoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying cause.
    #[must_use]
    pub fn with_source(mut self, source: impl Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// See [`StoreErrorCode::ResourceNotFoundException`].
    #[must_use]
    pub fn resource_not_found(message: impl Into<String>) -> Self {
        Self::with_message(StoreErrorCode::ResourceNotFoundException, message)
    }

    /// See [`StoreErrorCode::ValidationException`].
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_message(StoreErrorCode::ValidationException, message)
    }

    /// See [`StoreErrorCode::InternalServerError`].
    #[must_use]
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::with_message(StoreErrorCode::InternalServerError, message)
    }

    /// See [`StoreErrorCode::TransportFailure`].
    #[must_use]
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self::with_message(StoreErrorCode::TransportFailure, message)
    }
}

/// Build a [`StoreError`] from a code name and an optional message.
///
/// ```
/// use dynamap_model::store_error;
/// use dynamap_model::error::StoreErrorCode;
///
/// let err = store_error!(RequestLimitExceeded);
/// assert_eq!(err.code, StoreErrorCode::RequestLimitExceeded);
///
/// let err = store_error!(ResourceNotFoundException, "no table USERS");
/// assert_eq!(err.message, "no table USERS");
/// ```
#[macro_export]
macro_rules! store_error {
    ($code:ident) => {
        $crate::error::StoreError::new($crate::error::StoreErrorCode::$code)
    };
    ($code:ident, $msg:expr) => {
        $crate::error::StoreError::with_message($crate::error::StoreErrorCode::$code, $msg)
    };
}
