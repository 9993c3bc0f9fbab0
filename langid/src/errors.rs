//! Definition of errors.

use std::error::Error;
use std::fmt;

pub type Result<T, E = LangIdError> = std::result::Result<T, E>;

#[derive(Debug)]
pub enum LangIdError {
    Validation(ValidationError),
    InvalidArgument(InvalidArgumentError),
    InvalidModel(InvalidModelError),
    DecodeError(bincode::error::DecodeError),
    EncodeError(bincode::error::EncodeError),
    IOError(std::io::Error),
}

impl LangIdError {
    pub(crate) fn validation<S>(msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::Validation(ValidationError { msg: msg.into() })
    }

    pub(crate) fn invalid_argument<S>(arg: &'static str, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::InvalidArgument(InvalidArgumentError {
            arg,
            msg: msg.into(),
        })
    }

    pub(crate) fn invalid_model<S>(msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::InvalidModel(InvalidModelError { msg: msg.into() })
    }
}

impl fmt::Display for LangIdError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Validation(e) => e.fmt(f),
            Self::InvalidArgument(e) => e.fmt(f),
            Self::InvalidModel(e) => e.fmt(f),
            Self::DecodeError(e) => e.fmt(f),
            Self::EncodeError(e) => e.fmt(f),
            Self::IOError(e) => e.fmt(f),
        }
    }
}

impl Error for LangIdError {}

/// Error used when an internal consistency check fails.
///
/// This corresponds to conditions that indicate a logic error rather than bad
/// input, such as the tokenizer attempting to demote a position that does not
/// hold the word sentinel, or classifying an empty token stream.
#[derive(Debug)]
pub struct ValidationError {
    /// Error message.
    pub(crate) msg: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ValidationError: {}", self.msg)
    }
}

impl Error for ValidationError {}

/// Error used when the argument is invalid.
#[derive(Debug)]
pub struct InvalidArgumentError {
    /// Name of the argument.
    pub(crate) arg: &'static str,

    /// Error message.
    pub(crate) msg: String,
}

impl fmt::Display for InvalidArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InvalidArgumentError: {}: {}", self.arg, self.msg)
    }
}

impl Error for InvalidArgumentError {}

/// Error used when a checkpoint is invalid.
#[derive(Debug)]
pub struct InvalidModelError {
    /// Error message.
    pub(crate) msg: String,
}

impl fmt::Display for InvalidModelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InvalidModelError: {}", self.msg)
    }
}

impl Error for InvalidModelError {}

impl From<bincode::error::DecodeError> for LangIdError {
    fn from(error: bincode::error::DecodeError) -> Self {
        Self::DecodeError(error)
    }
}

impl From<bincode::error::EncodeError> for LangIdError {
    fn from(error: bincode::error::EncodeError) -> Self {
        Self::EncodeError(error)
    }
}

impl From<std::io::Error> for LangIdError {
    fn from(error: std::io::Error) -> Self {
        Self::IOError(error)
    }
}
