//! Error types for the ledger.
//!
//! Internally the crate uses `anyhow` (see [`Res`]). At the public boundary every failure is
//! wrapped in [`Error`], which carries an [`ErrorType`] so callers can decide whether to retry,
//! surface the problem to the user, or treat it as a bug.

use std::fmt::{Debug, Display, Formatter};

/// Internal result type.
pub(crate) type Res<T> = std::result::Result<T, anyhow::Error>;

/// Public result type.
pub type Result<T> = std::result::Result<T, Error>;

/// The category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    /// A referenced transaction or account does not exist.
    NotFound,
    /// Malformed input such as a non-positive amount, an installment count below two or an
    /// invalid month.
    InvalidArgument,
    /// The underlying store failed.
    StoreFailure,
    /// The ledger is not in a shape we can act on, e.g. a lineage chain is broken or cyclic.
    InconsistentState,
    /// The home directory or its configuration file is missing or invalid.
    Config,
}

impl Display for ErrorType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorType::NotFound => "not found",
            ErrorType::InvalidArgument => "invalid argument",
            ErrorType::StoreFailure => "store failure",
            ErrorType::InconsistentState => "inconsistent state",
            ErrorType::Config => "configuration error",
        };
        f.write_str(s)
    }
}

/// The public error type.
pub struct Error {
    error_type: ErrorType,
    source: anyhow::Error,
}

impl Error {
    pub(crate) fn new(error_type: ErrorType, source: impl Into<anyhow::Error>) -> Self {
        Self {
            error_type,
            source: source.into(),
        }
    }

    pub(crate) fn not_found(message: impl Display) -> Self {
        Self::new(ErrorType::NotFound, anyhow::anyhow!("{message}"))
    }

    pub(crate) fn invalid(message: impl Display) -> Self {
        Self::new(ErrorType::InvalidArgument, anyhow::anyhow!("{message}"))
    }

    pub(crate) fn inconsistent(message: impl Display) -> Self {
        Self::new(ErrorType::InconsistentState, anyhow::anyhow!("{message}"))
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:?}", self.error_type, self.source)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {:#}", self.error_type, self.source)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let inner: &(dyn std::error::Error + Send + Sync + 'static) = self.source.as_ref();
        Some(inner)
    }
}

/// Converts an internal `anyhow` result into the public [`Result`], tagging it with an
/// [`ErrorType`].
pub(crate) trait IntoResult<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T, E> IntoResult<T> for std::result::Result<T, E>
where
    E: Into<anyhow::Error>,
{
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| Error::new(error_type, e))
    }
}
