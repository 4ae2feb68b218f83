use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bit access out of bounds: {bits} bits at position {position} (length {length})")]
    Bounds {
        position: usize,
        bits: usize,
        length: usize,
    },

    #[error("cannot rewind {bits} bits from position {position}")]
    Rewind { position: usize, bits: usize },

    #[error("integer access of {bits} bits exceeds 64")]
    TooWide { bits: usize },

    #[error("frame error: {0}")]
    Frame(String),

    #[error("marker bits of {field} failed validation")]
    TimestampMarker { field: &'static str },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("config error: {0}")]
    Config(String),
}

impl TsError {
    /// True for failures caused by reading, writing or rewinding outside a buffer.
    pub fn is_bounds(&self) -> bool {
        matches!(self, TsError::Bounds { .. } | TsError::Rewind { .. })
    }
}

pub type Result<T> = std::result::Result<T, TsError>;

/// Recoverable conditions found while decoding.
///
/// Decoders fix these up locally (skip or truncate the offending field) and
/// keep going, attaching the warning to the decoded value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A declared length does not fit the container it lives in.
    MalformedSection {
        field: &'static str,
        declared: usize,
        available: usize,
    },
    /// A timestamp was decoded but one of its marker bits was 0.
    TimestampMarker { field: &'static str },
    /// A fixed-value tag did not hold its expected value.
    UnexpectedTag { field: &'static str, tag: u8 },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MalformedSection {
                field,
                declared,
                available,
            } => write!(
                f,
                "malformed {}: declared {} bytes, {} available",
                field, declared, available
            ),
            Warning::TimestampMarker { field } => {
                write!(f, "{} has a cleared marker bit, value unreliable", field)
            }
            Warning::UnexpectedTag { field, tag } => {
                write!(f, "unexpected {} tag {:#06b}", field, tag)
            }
        }
    }
}
