//! The [`TilerError`] type.

use std::fmt;

/// Errors reported by the tiler and its pixel utilities.
#[derive(Debug)]
pub enum TilerError {
    /// A size or count argument was out of its valid domain.
    InvalidArgument { name: &'static str, value: String },
    /// An operation was attempted in a state that does not allow it.
    PreconditionViolation(&'static str),
    /// The rendering host failed (readback, offscreen target, drawing).
    Host(Box<dyn std::error::Error + Send + Sync>),
    /// Writing the finished image failed.
    Io(String),
}

impl TilerError {
    pub(crate) fn invalid(name: &'static str, value: impl fmt::Display) -> Self {
        Self::InvalidArgument {
            name,
            value: value.to_string(),
        }
    }

    pub(crate) fn host<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Host(Box::new(err))
    }
}

impl fmt::Display for TilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument { name, value } => {
                write!(f, "invalid argument: {name} = {value}")
            }
            Self::PreconditionViolation(what) => write!(f, "precondition violated: {what}"),
            Self::Host(e) => write!(f, "render host error: {e}"),
            Self::Io(msg) => write!(f, "image output failed: {msg}"),
        }
    }
}

impl std::error::Error for TilerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Host(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TilerError>;
