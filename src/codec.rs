//! The TLV Codec (spec.md §4.2): low-level encode/decode of the wire format.
//!
//! Encoding here is a pure byte-buffer operation — the Traversal Engine (see [`crate::traversal`]) decides *what*
//! TLV elements to write, and calls into the small helpers below to actually place header bytes. Decoding is
//! push-style: [`decode`] streams the buffer once and calls [`TlvVisitor::element`] for every element it finds,
//! including the structural `Nested`/`NestedList` elements themselves (not just their leaf children) — the
//! Traversal Engine relies on seeing those to know when to push/pop a descent frame (spec.md §4.3 rule 2/3).

use std::convert::TryFrom;

use crate::error::{Result, StructuralError};
use crate::schema::MAX_ELEMENTS;
use crate::wire::{TlvHeader, TlvTagKind};

/// A single decoded TLV element, as surfaced to a [`TlvVisitor`].
#[derive(Debug)]
pub struct TlvElement<'a> {
    /// 0-based sibling index at this element's nesting level.
    pub idx: u32,
    /// Nesting depth; the top level is 0.
    pub level: u32,
    pub tag: TlvTagKind,
    pub length: u32,
    /// For `Field`/`List`: the leaf value bytes. For `Nested`/`NestedList`: the as-yet-unparsed sub-stream, handed
    /// over purely for informational/diagnostic purposes — the decoder itself performs the recursion.
    pub value: &'a [u8],
}

/// Receives decoded TLV elements from [`decode`], in wire order, depth-first.
pub trait TlvVisitor {
    fn element(&mut self, el: TlvElement<'_>) -> Result<()>;
}

struct Budget {
    remaining: usize,
    max: usize,
}

impl Budget {
    fn consume(&mut self) -> Result<()> {
        if self.remaining == 0 {
            return Err(StructuralError::MaxElementsExceeded { max: self.max }.into());
        }
        self.remaining -= 1;
        Ok(())
    }
}

/// Decode every TLV element in `buffer`, depth-first, calling `visitor.element(..)` for each one (spec.md §4.2),
/// using the crate-wide default element cap.
pub fn decode(buffer: &[u8], visitor: &mut dyn TlvVisitor) -> Result<()> {
    decode_with_limit(buffer, visitor, MAX_ELEMENTS)
}

/// As [`decode`], but with a caller-chosen element cap (spec.md §3.2, tunable via [`crate::config::Limits`]).
pub fn decode_with_limit(buffer: &[u8], visitor: &mut dyn TlvVisitor, max_elements: usize) -> Result<()> {
    let mut budget = Budget { remaining: max_elements, max: max_elements };
    decode_level(buffer, 0, &mut budget, visitor)
}

fn decode_level(buffer: &[u8], level: u32, budget: &mut Budget, visitor: &mut dyn TlvVisitor) -> Result<()> {
    let mut offset = 0usize;
    let mut idx = 0u32;

    while offset < buffer.len() {
        let remaining = &buffer[offset..];
        let header = TlvHeader::parse(remaining)?;
        let value_len = header.length as usize;
        let needed = TlvHeader::SIZE + value_len;
        if remaining.len() < needed {
            return Err(StructuralError::Truncated { remaining: remaining.len(), needed }.into());
        }
        let value = &remaining[TlvHeader::SIZE..needed];

        budget.consume()?;

        // Unknown/reserved tags are silently skipped but still advance the cursor (spec.md §4.2).
        if let Ok(kind) = header.tag_kind() {
            if !kind.is_reserved() {
                visitor.element(TlvElement { idx, level, tag: kind, length: header.length, value })?;

                if kind.is_recursive() {
                    decode_level(value, level + 1, budget, visitor)?;
                }
            }
        }
        // A tag byte outside 1..=8 is not "reserved" in the strict enum sense, but spec.md §4.2 says unknown
        // tags are silently skipped too, not fatal — `tag_kind()` returning `Err` falls through the same way.

        offset += needed;
        idx += 1;
    }

    Ok(())
}

/// Write a leaf `Field`/`List` element's header + value into `out`, returning the total bytes written.
/// Returns `Err(BufferTooSmall)` if `out` cannot hold `6 + value.len()` bytes.
pub fn write_leaf(tag: TlvTagKind, value: &[u8], out: &mut [u8]) -> Result<usize> {
    let total = TlvHeader::SIZE + value.len();
    if out.len() < total {
        return Err(crate::error::ErrorKind::BufferTooSmall.into());
    }
    let length = u32::try_from(value.len())
        .map_err(|_| crate::error::Error::contract("value length exceeds u32::MAX"))?;
    TlvHeader::new(tag, length).write_to_slice(&mut out[..TlvHeader::SIZE]);
    out[TlvHeader::SIZE..total].copy_from_slice(value);
    Ok(total)
}

/// Reserve space for a `Nested`/`NestedList` header at the front of `out`, returning the offset at which the
/// recursive child encoding should begin. The caller writes the header once the child length is known, via
/// [`finish_nested`].
pub fn begin_nested(out: &[u8]) -> Result<usize> {
    if out.len() < TlvHeader::SIZE {
        return Err(crate::error::ErrorKind::BufferTooSmall.into());
    }
    Ok(TlvHeader::SIZE)
}

/// Back-patch a `Nested`/`NestedList` header once the byte length of its children is known.
pub fn finish_nested(tag: TlvTagKind, child_len: usize, out: &mut [u8]) -> Result<usize> {
    let length = u32::try_from(child_len)
        .map_err(|_| crate::error::Error::contract("nested length exceeds u32::MAX"))?;
    TlvHeader::new(tag, length).write_to_slice(&mut out[..TlvHeader::SIZE]);
    Ok(TlvHeader::SIZE + child_len)
}
