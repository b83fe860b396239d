use crate::boxes::{AtomBox, FourCC};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("malformed box at offset {offset}: declared size {size} is smaller than its header")]
    MalformedBox { offset: u64, size: u32 },

    #[error("read of {needed} bytes at offset {offset} runs past the end ({size} bytes)")]
    OutOfBounds {
        offset: usize,
        needed: usize,
        size: usize,
    },

    #[error("invalid count in {schema}::{field}[{index}]: {reason}")]
    InvalidCount {
        schema: String,
        field: String,
        index: usize,
        reason: String,
    },

    #[error("invalid value in {schema}::{field}[{index}]: {value}, expected: {expected}")]
    UnexpectedValue {
        schema: String,
        field: String,
        index: usize,
        value: String,
        expected: String,
    },

    #[error("invalid field descriptor `{descriptor}`: {reason}")]
    InvalidDescriptor { descriptor: String, reason: String },

    #[error("invalid count expression `{expr}`: {reason}")]
    InvalidExpression { expr: String, reason: String },

    #[error("schema `{0}` is not registered")]
    UnknownSchema(String),

    #[error("nested schemas form a cycle through `{0}`")]
    SchemaCycle(String),

    #[error("invalid type name length: `{0}`")]
    InvalidTypeName(String),
}

pub type Result<T> = std::result::Result<T, ParseError>;

/// A fatal parse error together with the boxes committed before it happened.
///
/// `partial` holds the forest as it stood at the failure: every root box and
/// every already appended sibling/ancestor, with their payloads decoded.
#[derive(thiserror::Error, Debug)]
#[error("{error}")]
pub struct ParseFailure {
    #[source]
    pub error: ParseError,
    pub partial: crate::tree::ParseResult,
}

impl ParseFailure {
    pub fn roots(&self) -> impl Iterator<Item = &AtomBox> {
        self.partial.roots()
    }
}

/// Conditions that do not stop the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Neither a container nor a registered schema; kept without payload.
    UnknownBoxType { typ: FourCC, offset: u64 },
    /// A size of zero ended the scan of the enclosing container.
    ZeroSizeBox { offset: u64 },
    /// Fewer than a header's worth of bytes left at the end of a container.
    TrailingBytes { offset: u64, len: u64 },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::UnknownBoxType { typ, offset } => {
                write!(f, "unknown box type `{}` at offset {}", typ.as_str_lossy(), offset)
            }
            Warning::ZeroSizeBox { offset } => {
                write!(f, "zero-size box at offset {} ends its container", offset)
            }
            Warning::TrailingBytes { offset, len } => {
                write!(f, "{} trailing bytes at offset {}", len, offset)
            }
        }
    }
}
