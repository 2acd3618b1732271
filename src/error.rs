//! Information about the (de)serialization failure and the location at which it failed.

use std::fmt::{Debug, Display};

use crate::schema::FieldKind;
use crate::wire::{ByteOffset, TlvTagKind};

pub type Result<T> = std::result::Result<T, Error>;

// --- Error ----------------------------------------------------------------------------------------------------------

/// Details of a (de)serialization failure and the location in the data where the problem occurred.
///
/// An error consists of an [ErrorKind] that identifies the kind of error that occurred, and an [ErrorLocation] that
/// describes where in the data the problem occurred.
#[derive(Debug)]
#[non_exhaustive]
pub struct Error {
    kind: ErrorKind,
    location: ErrorLocation,
}

impl Error {
    pub(crate) fn new(kind: ErrorKind, location: ErrorLocation) -> Self {
        Self { kind, location }
    }

    pub(crate) fn at(kind: ErrorKind, offset: impl Into<ByteOffset>) -> Self {
        Self::new(kind, ErrorLocation::at(offset.into()))
    }

    pub(crate) fn contract(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidType(msg.into()), ErrorLocation::unknown())
    }

    /// Get details about the kind of error that occurred.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Get details about where in the data the error occurred.
    pub fn location(&self) -> &ErrorLocation {
        &self.location
    }

    /// The legacy numeric error code from spec.md §6.4, for callers bridging to a C-style ABI.
    pub fn code(&self) -> i32 {
        match &self.kind {
            ErrorKind::BufferTooSmall => -1,
            ErrorKind::InvalidType(_) | ErrorKind::Structural(_) | ErrorKind::Io(_) => -2,
            ErrorKind::CompressionFailed => -3,
            ErrorKind::EncryptionFailed => -4,
            ErrorKind::AllocatorFailed => -5,
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind, ErrorLocation::unknown())
    }
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (at {})", self.kind, self.location)
    }
}

// --- ErrorKind --------------------------------------------------------------------------------------------------------

/// Details about the kind of error that occurred, matching the taxonomy of spec.md §6.4 and §7.
#[derive(Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A capacity error during encode: the output buffer is too small for the bytes that would be written.
    BufferTooSmall,
    /// A contract error: null/missing descriptor data, an unsupported field kind, a missing allocator, etc.
    InvalidType(String),
    /// A structural error while decoding a malformed TLV stream.
    Structural(StructuralError),
    /// The caller-supplied allocator returned a null pointer.
    AllocatorFailed,
    /// Reserved for future compression support; never returned by this crate today.
    CompressionFailed,
    /// Reserved for future encryption support; never returned by this crate today.
    EncryptionFailed,
    /// Wraps an I/O failure encountered while reading from or writing to a `Read`/`Write` implementation.
    Io(std::io::Error),
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::BufferTooSmall => f.write_str("output buffer too small"),
            ErrorKind::InvalidType(msg) => write!(f, "invalid type: {msg}"),
            ErrorKind::Structural(e) => write!(f, "malformed TLV stream: {e}"),
            ErrorKind::AllocatorFailed => f.write_str("allocator returned null"),
            ErrorKind::CompressionFailed => f.write_str("compression failed"),
            ErrorKind::EncryptionFailed => f.write_str("encryption failed"),
            ErrorKind::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl From<std::io::Error> for ErrorKind {
    fn from(e: std::io::Error) -> Self {
        ErrorKind::Io(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::new(ErrorKind::Io(e), ErrorLocation::unknown())
    }
}

// --- StructuralError --------------------------------------------------------------------------------------------------

/// (De)serialization failure due to a TLV byte stream that does not conform to the wire format of spec.md §6.1.
#[derive(Debug)]
#[non_exhaustive]
pub enum StructuralError {
    /// `header + length` would read past the end of the remaining buffer.
    Truncated { remaining: usize, needed: usize },
    /// More frames were popped off the descent stack than were pushed.
    StackUnderflow,
    /// Nesting depth exceeded the cap of 32 from spec.md §3.2.
    MaxDepthExceeded { max: usize },
    /// More than 1024 TLV elements were decoded in one call, the cap from spec.md §3.2.
    MaxElementsExceeded { max: usize },
    /// A descriptor names more than 128 fields, the cap from spec.md §3.2.
    TooManyFields { max: usize },
    /// An array's sibling size field has a `size_field_size` outside `{1, 2, 4, 8}`.
    InvalidArraySizeFieldWidth(usize),
    /// A field's offset/size falls outside `[0, type_size)` of its parent descriptor.
    FieldOutOfBounds { field: &'static str, offset: usize, size: usize, type_size: usize },
    /// A struct or struct-array field did not carry a nested `TypeDescriptor`.
    MissingNestedDescriptor { field: &'static str },
    /// The decoder could not align a decoded element to any field in the descriptor tree.
    UnmatchedElement { idx: u32, level: u32 },
    /// A string field's bytes were not valid UTF-8 / did not contain the expected NUL terminator.
    InvalidString,
    /// A discriminator field referenced a kind other than `Int32` or `String`.
    InvalidDiscriminatorKind(FieldKind),
    /// The wire tag byte did not match one of the eight tag codes of spec.md §6.1.
    InvalidTag(u16),
    /// An operation expected the given tag kind but found a mismatched nesting shape.
    UnexpectedTagKind { expected: TlvTagKind, actual: TlvTagKind },
}

impl Display for StructuralError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructuralError::Truncated { remaining, needed } => {
                write!(f, "element needs {needed} bytes but only {remaining} remain")
            }
            StructuralError::StackUnderflow => f.write_str("traversal descent stack underflow"),
            StructuralError::MaxDepthExceeded { max } => write!(f, "nesting depth exceeds {max}"),
            StructuralError::MaxElementsExceeded { max } => {
                write!(f, "decoded element count exceeds {max}")
            }
            StructuralError::TooManyFields { max } => write!(f, "field count exceeds {max}"),
            StructuralError::InvalidArraySizeFieldWidth(w) => {
                write!(f, "array size field width {w} is not one of 1, 2, 4, 8")
            }
            StructuralError::FieldOutOfBounds { field, offset, size, type_size } => write!(
                f,
                "field `{field}` at offset {offset} size {size} exceeds type size {type_size}"
            ),
            StructuralError::MissingNestedDescriptor { field } => {
                write!(f, "field `{field}` has no nested type descriptor")
            }
            StructuralError::UnmatchedElement { idx, level } => {
                write!(f, "no field matches decoded element idx={idx} level={level}")
            }
            StructuralError::InvalidString => f.write_str("invalid string bytes"),
            StructuralError::InvalidDiscriminatorKind(kind) => {
                write!(f, "discriminator kind {kind:?} is not Int32 or String")
            }
            StructuralError::InvalidTag(tag) => write!(f, "invalid TLV tag byte {tag:#x}"),
            StructuralError::UnexpectedTagKind { expected, actual } => {
                write!(f, "expected tag kind {expected:?}, found {actual:?}")
            }
        }
    }
}

impl From<StructuralError> for ErrorKind {
    fn from(e: StructuralError) -> Self {
        ErrorKind::Structural(e)
    }
}

impl From<StructuralError> for Error {
    fn from(e: StructuralError) -> Self {
        Error::new(ErrorKind::Structural(e), ErrorLocation::unknown())
    }
}

// --- ErrorLocation --------------------------------------------------------------------------------------------------

/// Details about where in the data the error occurred.
#[derive(Clone, Debug, Default)]
pub struct ErrorLocation {
    offset: Option<ByteOffset>,
    field_path: Vec<&'static str>,
}

impl Display for ErrorLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unknown() {
            return f.write_str("unknown location");
        }

        let mut sep_str = "";
        #[rustfmt::skip]
        let mut sep = || { let s = sep_str; sep_str = ", "; s };

        if let Some(offset) = self.offset {
            write!(f, "{}pos: {} bytes", sep(), *offset)?;
        }
        if !self.field_path.is_empty() {
            write!(f, "{}field path: {}", sep(), self.field_path.join("."))?;
        }
        Ok(())
    }
}

impl ErrorLocation {
    pub(crate) fn at(offset: ByteOffset) -> Self {
        Self { offset: Some(offset), ..Default::default() }
    }

    pub(crate) fn unknown() -> Self {
        Self::default()
    }

    pub(crate) fn with_field(mut self, name: &'static str) -> Self {
        self.field_path.push(name);
        self
    }

    pub fn is_unknown(&self) -> bool {
        self.offset.is_none() && self.field_path.is_empty()
    }

    pub fn offset(&self) -> Option<ByteOffset> {
        self.offset
    }

    pub fn field_path(&self) -> &[&'static str] {
        &self.field_path
    }
}
