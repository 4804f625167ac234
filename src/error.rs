//! Error type for the façade layer.
//!
//! Three families of failure reach callers:
//!
//! - **Construction**: a native object could not be created (bad buffer
//!   size, unreadable file). No partial handle is ever returned.
//! - **Metadata**: a field is missing, has another type, or is read-only,
//!   or the image is null.
//! - **Invocation**: the operation name is unknown, an argument does not
//!   match the operation's declared property, or the operation itself failed.
//!
//! Errors raised inside an operation's `build` arrive as
//! [`OperationError`](crate::operation::OperationError) and are wrapped in
//! [`Error::OperationFailed`] together with the operation name.

use crate::value::ValueType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Construction failed: {0}")]
    Construction(String),
    #[error("\"{0}\" is not a known image format")]
    UnknownFormat(String),

    #[error("Field \"{0}\" not found")]
    MissingField(String),
    #[error("Field \"{field}\" is of type {found}, not {expected}")]
    FieldType {
        field: String,
        expected: ValueType,
        found: ValueType,
    },
    #[error("Field \"{0}\" is a read-only header field")]
    ReadOnlyField(String),
    #[error("Null image has no header or fields")]
    NullImage,

    #[error("Operation \"{0}\" not found")]
    UnknownOperation(String),
    #[error("{operation}: no argument named \"{argument}\"")]
    UnknownArgument { operation: String, argument: String },
    #[error("{operation}: argument \"{argument}\" is an {declared}, not an {requested}")]
    ArgumentDirection {
        operation: String,
        argument: String,
        declared: &'static str,
        requested: &'static str,
    },
    #[error("{operation}: argument \"{argument}\" expects {expected}, got {found}")]
    ArgumentType {
        operation: String,
        argument: String,
        expected: ValueType,
        found: ValueType,
    },
    #[error("{operation}: argument \"{argument}\" value {value} is outside {min}..={max}")]
    ArgumentRange {
        operation: String,
        argument: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{operation}: invalid value for \"{argument}\": {reason}")]
    InvalidArgument {
        operation: String,
        argument: String,
        reason: String,
    },
    #[error("{operation}: required argument \"{argument}\" not set")]
    MissingArgument { operation: String, argument: String },
    #[error("{operation}: output \"{argument}\" was not produced")]
    MissingOutput { operation: String, argument: String },
    #[error("{operation}: {message}")]
    OperationFailed { operation: String, message: String },
}

impl Error {
    /// True for errors raised while invoking an operation, as opposed to
    /// construction or metadata errors.
    pub fn is_invocation(&self) -> bool {
        matches!(
            self,
            Error::UnknownOperation(_)
                | Error::UnknownArgument { .. }
                | Error::ArgumentDirection { .. }
                | Error::ArgumentType { .. }
                | Error::ArgumentRange { .. }
                | Error::InvalidArgument { .. }
                | Error::MissingArgument { .. }
                | Error::MissingOutput { .. }
                | Error::OperationFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
