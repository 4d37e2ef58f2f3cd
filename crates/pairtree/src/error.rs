// A single opaque public `Error` wraps a private `ErrorKind`, and each kind
// carries its own payload struct. Individual kinds can gain detail (or be
// reorganized) without changing the public API.
//
// The internal crate reports `&'static str` errors. Those only describe
// violated invariants during construction, so we wrap them in a single
// `Internal` kind rather than trying to classify them.

use pairtree_internal::DataKind;

/// The error type for every fallible operation in this crate
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct Error {
    kind: ErrorKind,
}

/// Coarse classification of an [`Error`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The configuration is invalid (e.g. `minsep >= maxsep`, an unknown
    /// split method, an unsupported data-class/coordinate combination)
    Configuration,
    /// The input arrays are invalid (e.g. mismatched lengths, negative
    /// weights, non-finite values)
    Input,
    /// An invariant was violated while constructing a tree. This indicates a
    /// bug.
    Internal,
}

/// The underlying internal error type
#[non_exhaustive]
#[derive(Clone, Debug, thiserror::Error)]
enum ErrorKind {
    /// An error that occurs when the separation range is invalid
    #[error(transparent)]
    SeparationRange(SeparationRangeError),
    /// An error that occurs when a numeric parameter is invalid
    #[error(transparent)]
    Parameter(ParameterError),
    /// An error that occurs when an unknown split method is requested
    #[error(transparent)]
    SplitMethod(SplitMethodError),
    /// An error that occurs when the observable components supplied with a
    /// catalog don't match the data class
    #[error(transparent)]
    Variant(VariantError),
    /// An error that occurs when a catalog holds no objects
    #[error(transparent)]
    Empty(EmptyError),
    /// An error that occurs when an input array has the wrong length
    #[error(transparent)]
    Length(LengthError),
    /// An error that occurs when an input array holds an invalid value
    #[error(transparent)]
    InvalidValue(InvalidValueError),
    /// An invariant violation reported by `pairtree_internal`
    #[error(transparent)]
    Internal(InternalError),
}

// define constructor methods for Error
impl Error {
    /// produce an error indicating that the separation range is invalid
    pub(crate) fn separation_range(minsep: f64, maxsep: f64, requirement: &'static str) -> Self {
        Error {
            kind: ErrorKind::SeparationRange(SeparationRangeError {
                minsep,
                maxsep,
                requirement,
            }),
        }
    }

    /// produce an error indicating that a numeric parameter is invalid
    pub(crate) fn parameter(name: &'static str, value: String, requirement: &'static str) -> Self {
        Error {
            kind: ErrorKind::Parameter(ParameterError {
                name,
                value,
                requirement,
            }),
        }
    }

    /// produce an error indicating that an unknown split method was requested
    pub(crate) fn split_method(actual: String, choices: Vec<String>) -> Self {
        Error {
            kind: ErrorKind::SplitMethod(SplitMethodError { actual, choices }),
        }
    }

    /// produce an error indicating that the number of observable components
    /// doesn't match the data class
    pub(crate) fn variant(data_kind: DataKind, expected: usize, actual: usize) -> Self {
        Error {
            kind: ErrorKind::Variant(VariantError {
                data_kind,
                expected,
                actual,
            }),
        }
    }

    pub(crate) fn empty() -> Self {
        Error {
            kind: ErrorKind::Empty(EmptyError),
        }
    }

    /// produce an error indicating that an input array has the wrong length
    pub(crate) fn length(array: &'static str, expected: usize, actual: usize) -> Self {
        Error {
            kind: ErrorKind::Length(LengthError {
                array,
                expected,
                actual,
            }),
        }
    }

    /// produce an error identifying the first invalid record
    pub(crate) fn invalid_value(
        array: &'static str,
        index: usize,
        value: f64,
        requirement: &'static str,
    ) -> Self {
        Error {
            kind: ErrorKind::InvalidValue(InvalidValueError {
                array,
                index,
                value,
                requirement,
            }),
        }
    }

    /// wraps an invariant violation reported by `pairtree_internal`
    pub(crate) fn internal(message: &'static str) -> Self {
        Error {
            kind: ErrorKind::Internal(InternalError(message)),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self.kind {
            ErrorKind::SeparationRange(_)
            | ErrorKind::Parameter(_)
            | ErrorKind::SplitMethod(_)
            | ErrorKind::Variant(_) => ErrorCategory::Configuration,
            ErrorKind::Empty(_) | ErrorKind::Length(_) | ErrorKind::InvalidValue(_) => {
                ErrorCategory::Input
            }
            ErrorKind::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// the index of the offending input record (if the error concerns a
    /// specific record)
    pub fn record_index(&self) -> Option<usize> {
        match self.kind {
            ErrorKind::InvalidValue(ref err) => Some(err.index),
            _ => None,
        }
    }
}

/// An error that occurs when the separation range is invalid
#[derive(Clone, Debug, thiserror::Error)]
#[error("invalid separation range (minsep = {minsep}, maxsep = {maxsep}): {requirement}")]
struct SeparationRangeError {
    minsep: f64,
    maxsep: f64,
    requirement: &'static str,
}

/// An error that occurs when a numeric parameter is invalid
#[derive(Clone, Debug, thiserror::Error)]
#[error("{name} has a value of {value}. It {requirement}")]
struct ParameterError {
    name: &'static str,
    value: String,
    requirement: &'static str,
}

/// An error that occurs when an unknown split method is requested
#[derive(Clone, Debug, thiserror::Error)]
#[error("{actual} is not a split method. Choices include: {choices:?}")]
struct SplitMethodError {
    actual: String,
    choices: Vec<String>,
}

/// An error that occurs when the observable components supplied with a
/// catalog don't match the data class
#[derive(Clone, Debug, thiserror::Error)]
#[error(
    "the {} data class expects {expected} observable component(s), but {actual} were provided",
    .data_kind.name()
)]
struct VariantError {
    data_kind: DataKind,
    expected: usize,
    actual: usize,
}

#[derive(Clone, Debug, thiserror::Error)]
#[error("the catalog must hold at least 1 object")]
struct EmptyError;

/// An error that occurs when an input array has the wrong length
#[derive(Clone, Debug, thiserror::Error)]
#[error("the {array} array holds {actual} elements. It should hold {expected}")]
struct LengthError {
    array: &'static str,
    expected: usize,
    actual: usize,
}

/// An error that identifies the first invalid input record
#[derive(Clone, Debug, thiserror::Error)]
#[error("{array}[{index}] has a value of {value}. It {requirement}")]
struct InvalidValueError {
    array: &'static str,
    index: usize,
    value: f64,
    requirement: &'static str,
}

#[derive(Clone, Debug, thiserror::Error)]
#[error("internal error during tree construction: {0}")]
struct InternalError(&'static str);
