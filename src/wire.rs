//! Low-level wire primitives: the TLV element header and the tag alphabet of spec.md §6.1.
//!
//! A TLV element on the wire is exactly `tag_be16 || length_be32 || value[length]` (spec.md §3.3, §6.1). The `tag`
//! names the *structural* shape of the element (a leaf field, a nested record, a list, ...) rather than a primitive
//! value type — the value's own interpretation comes from the schema descriptor the traversal engine is walking in
//! lockstep, not from the wire itself.

use std::convert::TryFrom;
use std::fmt::{Debug, Display};
use std::io::{Read, Write};

use crate::error::{Result, StructuralError};

// --- ByteOffset -------------------------------------------------------------------------------------------------

/// An offset into a buffer of encoded TLV bytes, used only for error reporting.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ByteOffset(pub u64);

impl std::ops::Deref for ByteOffset {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Debug for ByteOffset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ByteOffset {
    fn from(v: u64) -> Self {
        ByteOffset(v)
    }
}

impl From<usize> for ByteOffset {
    fn from(v: usize) -> Self {
        ByteOffset(v as u64)
    }
}

impl From<u32> for ByteOffset {
    fn from(v: u32) -> Self {
        ByteOffset(v as u64)
    }
}

// --- TlvTagKind -------------------------------------------------------------------------------------------------

/// The tag alphabet of spec.md §6.1/§4.2: what shape of payload a TLV element's `value` holds.
#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TlvTagKind {
    /// A leaf primitive value.
    Field = 0x01,
    /// A nested record: `value` is a concatenated sub-stream of TLV elements.
    Nested = 0x02,
    /// An array of primitives: `value` is a concatenation of element bytes.
    List = 0x03,
    /// An array of records: `value` is a concatenation of nested sub-streams.
    NestedList = 0x04,
    /// Reserved: a compressed leaf value. Never emitted; skipped on decode.
    CompressedValue = 0x05,
    /// Reserved: an encrypted leaf value. Never emitted; skipped on decode.
    EncryptedValue = 0x06,
    /// Reserved: a compressed nested record. Never emitted; skipped on decode.
    CompressedNested = 0x07,
    /// Reserved: an encrypted nested record. Never emitted; skipped on decode.
    EncryptedNested = 0x08,
}

impl TlvTagKind {
    /// Reserved tags carry no semantics this crate implements; they exist only to be skipped on decode
    /// (spec.md §4.2 "reserved, not emitted, silently skipped on decode").
    pub fn is_reserved(self) -> bool {
        matches!(
            self,
            TlvTagKind::CompressedValue
                | TlvTagKind::EncryptedValue
                | TlvTagKind::CompressedNested
                | TlvTagKind::EncryptedNested
        )
    }

    /// Whether this tag's value recurses into a sub-stream of TLV elements (`Nested`/`NestedList`).
    pub fn is_recursive(self) -> bool {
        matches!(self, TlvTagKind::Nested | TlvTagKind::NestedList)
    }
}

impl TryFrom<u16> for TlvTagKind {
    type Error = StructuralError;

    fn try_from(value: u16) -> std::result::Result<Self, Self::Error> {
        match value {
            0x01 => Ok(TlvTagKind::Field),
            0x02 => Ok(TlvTagKind::Nested),
            0x03 => Ok(TlvTagKind::List),
            0x04 => Ok(TlvTagKind::NestedList),
            0x05 => Ok(TlvTagKind::CompressedValue),
            0x06 => Ok(TlvTagKind::EncryptedValue),
            0x07 => Ok(TlvTagKind::CompressedNested),
            0x08 => Ok(TlvTagKind::EncryptedNested),
            other => Err(StructuralError::InvalidTag(other)),
        }
    }
}

impl Display for TlvTagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Debug::fmt(self, f)
    }
}

// --- TlvHeader --------------------------------------------------------------------------------------------------

/// The fixed 6-byte `tag || length` header that precedes every TLV element's value (spec.md §4.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TlvHeader {
    pub tag: u16,
    pub length: u32,
}

impl TlvHeader {
    pub const SIZE: usize = 6;

    pub fn new(tag: TlvTagKind, length: u32) -> Self {
        Self { tag: tag as u16, length }
    }

    pub fn tag_kind(&self) -> std::result::Result<TlvTagKind, StructuralError> {
        TlvTagKind::try_from(self.tag)
    }

    pub fn read<R: Read>(src: &mut R) -> Result<Self> {
        let mut tag_bytes = [0u8; 2];
        let mut len_bytes = [0u8; 4];
        src.read_exact(&mut tag_bytes)?;
        src.read_exact(&mut len_bytes)?;
        Ok(Self { tag: u16::from_be_bytes(tag_bytes), length: u32::from_be_bytes(len_bytes) })
    }

    /// Parse the header from the start of `buf`, returning it without consuming `buf`.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(StructuralError::Truncated { remaining: buf.len(), needed: Self::SIZE }.into());
        }
        let tag = u16::from_be_bytes([buf[0], buf[1]]);
        let length = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]);
        Ok(Self { tag, length })
    }

    pub fn write<W: Write>(&self, dst: &mut W) -> Result<()> {
        dst.write_all(&self.tag.to_be_bytes())?;
        dst.write_all(&self.length.to_be_bytes())?;
        Ok(())
    }

    pub fn write_to_slice(&self, dst: &mut [u8]) {
        dst[0..2].copy_from_slice(&self.tag.to_be_bytes());
        dst[2..6].copy_from_slice(&self.length.to_be_bytes());
    }
}
