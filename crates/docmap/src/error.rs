//! Error types for mapping operations.

use std::fmt;

/// Which way a value was travelling when an operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Object to document.
    Encode,
    /// Document to object.
    Decode,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Encode => f.write_str("encode"),
            Direction::Decode => f.write_str("decode"),
        }
    }
}

/// Error type for mapping operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    // Document errors
    /// Bytes do not form a structurally valid document.
    #[error("malformed document: {reason} (len={len})")]
    MalformedDocument { reason: &'static str, len: usize },

    // Configuration errors
    /// No reader/writer strategy exists for the type.
    #[error("unsupported type {type_name} ({direction})")]
    UnsupportedType {
        type_name: &'static str,
        direction: Direction,
    },
    /// A builder was handed a registration it cannot accept.
    #[error("invalid registration: {0}")]
    InvalidRegistration(String),

    // Operation errors
    /// A marshall/unmarshall call failed; wraps the underlying cause.
    #[error("unable to {direction} {target} ({context})")]
    Marshalling {
        direction: Direction,
        target: &'static str,
        context: String,
        #[source]
        source: Box<Error>,
    },

    // Value errors
    /// Expected one value kind but found another.
    #[error("expected {expected}, found {found}")]
    UnexpectedType {
        expected: &'static str,
        found: &'static str,
    },
    /// A required document field is absent.
    #[error("missing field `{field}` for {type_name}")]
    MissingField {
        field: String,
        type_name: &'static str,
    },
    /// A registered decoder produced a value of the wrong type.
    #[error("decoder registered for {expected} produced another type")]
    TypeMismatch { expected: &'static str },
    /// Integer does not fit the target width.
    #[error("integer {value} out of range for {target}")]
    IntegerOutOfRange { value: i64, target: &'static str },
    /// Finite double does not fit the target width.
    #[error("float {value} out of range for {target}")]
    FloatOutOfRange { value: f64, target: &'static str },
    /// Fixed-size sequence has the wrong number of elements.
    #[error("expected {expected} elements, found {found}")]
    LengthMismatch { expected: usize, found: usize },
    /// Text is not a valid object id.
    #[error("invalid object id: {0}")]
    InvalidObjectId(#[from] bson::oid::Error),
    /// f64 is NaN or Infinity (not representable in JSON).
    #[error("cannot encode non-finite float {0} as JSON")]
    NonFiniteFloat(f64),
    /// Error raised by a caller-supplied coder.
    #[error("{0}")]
    Custom(String),

    // Codec errors
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("bson encode: {0}")]
    Encode(#[from] bson::ser::Error),
    #[error("bson decode: {0}")]
    Decode(#[from] bson::de::Error),
    #[error("bson raw: {0}")]
    Raw(#[from] bson::raw::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Build an error from a caller-supplied coder.
    pub fn custom(msg: impl fmt::Display) -> Self {
        Error::Custom(msg.to_string())
    }

    #[must_use]
    pub fn is_malformed_document(&self) -> bool {
        matches!(self, Error::MalformedDocument { .. })
    }

    #[must_use]
    pub fn is_unsupported_type(&self) -> bool {
        matches!(self, Error::UnsupportedType { .. })
    }

    #[must_use]
    pub fn is_invalid_registration(&self) -> bool {
        matches!(self, Error::InvalidRegistration(_))
    }

    #[must_use]
    pub fn is_marshalling(&self) -> bool {
        matches!(self, Error::Marshalling { .. })
    }

    /// Direction of a failed marshall/unmarshall, if this error carries one.
    #[must_use]
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Error::Marshalling { direction, .. } | Error::UnsupportedType { direction, .. } => {
                Some(*direction)
            }
            _ => None,
        }
    }

    /// Wrap `self` as the cause of a failed marshall/unmarshall call.
    ///
    /// Unsupported types and malformed documents keep their own kind so
    /// callers can tell a configuration problem from a bad value.
    pub(crate) fn into_marshalling(
        self,
        direction: Direction,
        target: &'static str,
        context: impl FnOnce() -> String,
    ) -> Self {
        match self {
            e @ (Error::UnsupportedType { .. } | Error::MalformedDocument { .. }) => e,
            source => Error::Marshalling {
                direction,
                target,
                context: context(),
                source: Box::new(source),
            },
        }
    }
}

/// Result type alias for mapping operations.
pub type Result<T> = std::result::Result<T, Error>;
