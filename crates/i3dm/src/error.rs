//! Error types for the i3dm crate.

use std::fmt;

use crate::content::ContentState;

/// Result type for i3dm operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading or inspecting tile content.
///
/// Errors are `Clone` so a single rejection can be observed by every holder
/// of a promise.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Fetching the tile bytes failed.
    FetchFailed {
        /// The URL that failed.
        url: String,
        /// The error message.
        message: String,
    },
    /// The model builder reported failure.
    BuildFailed {
        /// The error message.
        message: String,
    },
    /// The content was destroyed before the operation could complete.
    Destroyed,
    /// The tile bytes could not be decoded.
    Decode(i3dm_decode::DecodeError),
    /// A caller passed an argument outside its valid range.
    InvalidArgument {
        /// The argument or operation at fault.
        context: &'static str,
        /// Description of what was invalid.
        detail: String,
    },
    /// An operation was called in a state that does not permit it.
    InvalidState {
        /// The operation that was attempted.
        operation: &'static str,
        /// The state the content was in.
        state: ContentState,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::FetchFailed { url, message } => {
                write!(f, "fetching {url} failed: {message}")
            }
            Error::BuildFailed { message } => write!(f, "model build failed: {message}"),
            Error::Destroyed => write!(f, "content is destroyed"),
            Error::Decode(e) => write!(f, "decode error: {e}"),
            Error::InvalidArgument { context, detail } => {
                write!(f, "invalid {context}: {detail}")
            }
            Error::InvalidState { operation, state } => {
                write!(f, "cannot {operation} while content is {state:?}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<i3dm_decode::DecodeError> for Error {
    fn from(e: i3dm_decode::DecodeError) -> Self {
        Error::Decode(e)
    }
}
