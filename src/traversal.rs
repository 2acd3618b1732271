//! The Traversal Engine (spec.md §4.3): walks a [`TypeDescriptor`] tree and a TLV event stream in lockstep.
//!
//! Encoding walks the descriptor tree by ordinary recursion, one stack frame per nesting level, because the whole
//! input record already exists in memory (spec.md §9 Design Notes: "a natural recursive walk, not a manual
//! stack"). Decoding is the mirror image: the TLV stream arrives push-style one element at a time from
//! [`crate::codec::decode`], so matching it against the descriptor tree needs an explicit descent stack — the
//! [`TraversalEngine`] below, capped at [`MAX_DEPTH`] frames, same as the encode side's recursion limit.

use std::convert::TryInto;

use crate::codec::{self, begin_nested, finish_nested, write_leaf, TlvElement, TlvVisitor};
use crate::error::{Error, Result, StructuralError};
use crate::materializer::record::{read_field, read_ptr, read_uint};
use crate::materializer::{LeafValue, Materializer};
use crate::schema::{ArrayBuiltinKind, DiscriminatorTag, FieldDescriptor, FieldKind, TypeDescriptor, MAX_DEPTH};
use crate::wire::TlvTagKind;

// --- Encode -----------------------------------------------------------------------------------------------------

/// Encode `record`, a byte-for-byte in-memory instance of `desc`, into `out` (spec.md §4.2/§4.3).
pub fn encode_record(desc: &TypeDescriptor, record: &[u8], out: &mut [u8]) -> Result<usize> {
    encode_record_at_depth(desc, record, out, 0)
}

fn encode_record_at_depth(desc: &TypeDescriptor, record: &[u8], out: &mut [u8], depth: usize) -> Result<usize> {
    if depth >= MAX_DEPTH {
        return Err(StructuralError::MaxDepthExceeded { max: MAX_DEPTH }.into());
    }
    let mut written = 0usize;
    for field in desc.fields {
        if field.is_optional() && !is_field_present(record, field)? {
            continue;
        }
        written += encode_field(field, record, &mut out[written..], depth)?;
    }
    Ok(written)
}

fn encode_field(field: &FieldDescriptor, record: &[u8], out: &mut [u8], depth: usize) -> Result<usize> {
    match field.kind {
        FieldKind::Struct => {
            let nested =
                field.nested.ok_or(StructuralError::MissingNestedDescriptor { field: field.name })?;
            let header_at = begin_nested(out)?;
            let sub_record = read_field(record, field)?;
            let child_len = encode_record_at_depth(nested, sub_record, &mut out[header_at..], depth + 1)?;
            finish_nested(TlvTagKind::Nested, child_len, out)
        }
        FieldKind::Array => encode_array(field, record, out, depth),
        FieldKind::String => {
            let bytes = encode_string_value(field, record)?;
            write_leaf(TlvTagKind::Field, &bytes, out)
        }
        _ => {
            let bytes = read_field(record, field)?;
            write_leaf(TlvTagKind::Field, bytes, out)
        }
    }
}

fn encode_string_value(field: &FieldDescriptor, record: &[u8]) -> Result<Vec<u8>> {
    if field.is_fixed_string() {
        let buf = read_field(record, field)?;
        let end = buf.iter().position(|&b| b == 0).map(|p| p + 1).unwrap_or(buf.len());
        Ok(buf[..end].to_vec())
    } else {
        let ptr = read_ptr(record, field.offset)?;
        if ptr.is_null() {
            return Ok(Vec::new());
        }
        // SAFETY: a non-null pointer-backed String field holds a pointer to caller-owned bytes, terminated by a
        // NUL, per spec.md §4.4a's pointer convention.
        Ok(unsafe { nul_terminated_bytes(ptr) })
    }
}

/// # Safety
/// `ptr` must point to a NUL-terminated byte sequence that the caller guarantees is valid for reads.
unsafe fn nul_terminated_bytes(ptr: *const u8) -> Vec<u8> {
    let mut len = 0usize;
    while *ptr.add(len) != 0 {
        len += 1;
    }
    std::slice::from_raw_parts(ptr, len + 1).to_vec()
}

fn encode_array(field: &FieldDescriptor, record: &[u8], out: &mut [u8], depth: usize) -> Result<usize> {
    let array = field
        .array
        .as_ref()
        .ok_or_else(|| Error::contract(format!("field `{}` has Array kind but no ArraySpec", field.name)))?;
    let count = read_uint(record, array.size_field_offset, array.size_field_size)? as usize;
    let elem_size = field.nested.map(|n| n.type_size).unwrap_or(field.size);
    let total = elem_size
        .checked_mul(count)
        .ok_or_else(|| Error::contract(format!("array `{}` byte length overflows", field.name)))?;
    let base = array_base(field, record, total)?;

    if let Some(nested) = field.nested {
        let header_at = begin_nested(out)?;
        let mut written = 0usize;
        for i in 0..count {
            let elem_bytes = &base[i * elem_size..(i + 1) * elem_size];
            written += encode_record_at_depth(nested, elem_bytes, &mut out[header_at + written..], depth + 1)?;
        }
        finish_nested(TlvTagKind::NestedList, written, out)
    } else {
        let bytes = primitive_array_bytes(field, base, count, array.builtin_kind)?;
        write_leaf(TlvTagKind::List, &bytes, out)
    }
}

fn array_base<'a>(field: &FieldDescriptor, record: &'a [u8], total_len: usize) -> Result<&'a [u8]> {
    if field.is_dynamic_array() {
        let ptr = read_ptr(record, field.offset)?;
        if ptr.is_null() {
            if total_len == 0 {
                return Ok(&[]);
            }
            return Err(Error::contract(format!(
                "array `{}` pointer is null but element count implies {} bytes",
                field.name, total_len
            )));
        }
        // SAFETY: a non-null dynamic array pointer references `total_len` readable bytes, populated by the
        // caller through the same `Allocator` contract the record materializer uses on decode (spec.md §4.5).
        Ok(unsafe { std::slice::from_raw_parts(ptr, total_len) })
    } else {
        record
            .get(field.offset..field.offset + total_len)
            .ok_or_else(|| Error::contract(format!("array `{}` exceeds record bounds", field.name)))
    }
}

fn primitive_array_bytes(
    field: &FieldDescriptor,
    base: &[u8],
    count: usize,
    builtin_kind: ArrayBuiltinKind,
) -> Result<Vec<u8>> {
    match builtin_kind {
        ArrayBuiltinKind::Blob | ArrayBuiltinKind::Float => Ok(base.to_vec()),
        ArrayBuiltinKind::String => {
            let ptr_size = std::mem::size_of::<usize>();
            if field.size != ptr_size {
                return Err(Error::contract("String array element slot width must equal pointer width"));
            }
            let mut out = Vec::new();
            for i in 0..count {
                let slot = &base[i * ptr_size..(i + 1) * ptr_size];
                let mut buf = [0u8; std::mem::size_of::<usize>()];
                buf.copy_from_slice(slot);
                let ptr = usize::from_ne_bytes(buf) as *const u8;
                if ptr.is_null() {
                    out.push(0);
                    continue;
                }
                // SAFETY: see `nul_terminated_bytes`; each slot is a caller-populated string pointer.
                out.extend_from_slice(&unsafe { nul_terminated_bytes(ptr) });
            }
            Ok(out)
        }
    }
}

fn is_field_present(record: &[u8], field: &FieldDescriptor) -> Result<bool> {
    let disc = field
        .discriminator
        .as_ref()
        .ok_or_else(|| Error::contract(format!("field `{}` is OPTIONAL with no discriminator", field.name)))?;
    match &disc.tag_value {
        DiscriminatorTag::Int32(expected) => {
            let bytes = record
                .get(disc.tag_offset..disc.tag_offset + 4)
                .ok_or_else(|| Error::contract("discriminator offset out of bounds"))?;
            let actual = i32::from_ne_bytes(bytes.try_into().unwrap());
            Ok(actual == *expected)
        }
        DiscriminatorTag::String(expected) => {
            let ptr = read_ptr(record, disc.tag_offset)?;
            if ptr.is_null() {
                return Ok(expected.is_empty());
            }
            // SAFETY: see `nul_terminated_bytes`.
            let bytes = unsafe { nul_terminated_bytes(ptr) };
            let actual = &bytes[..bytes.len().saturating_sub(1)];
            Ok(actual == expected.as_bytes())
        }
    }
}

// --- Decode -----------------------------------------------------------------------------------------------------

#[derive(Clone, Debug)]
enum Observed {
    Int(i64),
    Str(String),
}

fn observed_from_bytes(kind: FieldKind, bytes: &[u8]) -> Option<Observed> {
    use FieldKind::*;
    match kind {
        Int8 => Some(Observed::Int(bytes[0] as i8 as i64)),
        UInt8 => Some(Observed::Int(bytes[0] as i64)),
        Int16 => Some(Observed::Int(i16::from_ne_bytes([bytes[0], bytes[1]]) as i64)),
        UInt16 => Some(Observed::Int(u16::from_ne_bytes([bytes[0], bytes[1]]) as i64)),
        Int32 => Some(Observed::Int(i32::from_ne_bytes(bytes.try_into().ok()?) as i64)),
        UInt32 => Some(Observed::Int(u32::from_ne_bytes(bytes.try_into().ok()?) as i64)),
        Int64 => Some(Observed::Int(i64::from_ne_bytes(bytes.try_into().ok()?))),
        UInt64 => Some(Observed::Int(u64::from_ne_bytes(bytes.try_into().ok()?) as i64)),
        String => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            std::str::from_utf8(&bytes[..end]).ok().map(|s| Observed::Str(s.to_string()))
        }
        _ => None,
    }
}

struct ArrayProgress {
    total: usize,
    index: usize,
}

struct Frame {
    desc: &'static TypeDescriptor,
    field_idx: usize,
    seen: Vec<(usize, Observed)>,
    array: Option<ArrayProgress>,
}

impl Frame {
    fn root(desc: &'static TypeDescriptor) -> Self {
        Self { desc, field_idx: 0, seen: Vec::new(), array: None }
    }

    fn element(desc: &'static TypeDescriptor, index: usize, total: usize) -> Self {
        Self { desc, field_idx: 0, seen: Vec::new(), array: Some(ArrayProgress { total, index }) }
    }
}

/// Drives a [`Materializer`] from a decoded TLV event stream, aligning each event to the matching field of the
/// descriptor tree (spec.md §4.3).
pub struct TraversalEngine<'m> {
    stack: Vec<Frame>,
    materializer: &'m mut dyn Materializer,
    max_depth: usize,
}

impl<'m> TraversalEngine<'m> {
    pub fn new(root: &'static TypeDescriptor, materializer: &'m mut dyn Materializer) -> Self {
        Self::with_max_depth(root, materializer, MAX_DEPTH)
    }

    pub fn with_max_depth(root: &'static TypeDescriptor, materializer: &'m mut dyn Materializer, max_depth: usize) -> Self {
        Self { stack: vec![Frame::root(root)], materializer, max_depth }
    }

    /// Drain any frames left open by trailing absent-optional fields or empty trailing structs/arrays, then
    /// signal end-of-stream to the materializer (spec.md §4.4b/§4.4c).
    pub fn finish(mut self) -> Result<()> {
        self.settle()?;
        if self.stack.len() != 1 {
            return Err(StructuralError::StackUnderflow.into());
        }
        self.materializer.finish()
    }

    fn is_present(&self, field: &FieldDescriptor) -> Result<bool> {
        let disc = field
            .discriminator
            .as_ref()
            .ok_or_else(|| Error::contract(format!("field `{}` is OPTIONAL with no discriminator", field.name)))?;
        let top = self.stack.last().ok_or(StructuralError::StackUnderflow)?;
        let observed = top.seen.iter().rev().find(|(off, _)| *off == disc.tag_offset);
        let Some((_, val)) = observed else {
            // The discriminator field was never decoded at this level (e.g. it was itself an absent optional),
            // so the field it gates is treated as absent too.
            return Ok(false);
        };
        match (&disc.tag_value, val) {
            (DiscriminatorTag::Int32(expected), Observed::Int(actual)) => Ok(*expected as i64 == *actual),
            (DiscriminatorTag::String(expected), Observed::Str(actual)) => Ok(expected == actual),
            _ => Err(StructuralError::InvalidDiscriminatorKind(disc.kind()).into()),
        }
    }

    fn skip_absent_optionals(&mut self) -> Result<()> {
        loop {
            let field = {
                let top = match self.stack.last() {
                    Some(t) => t,
                    None => return Ok(()),
                };
                if top.field_idx >= top.desc.fields.len() {
                    return Ok(());
                }
                let field = &top.desc.fields[top.field_idx];
                if !field.is_optional() {
                    return Ok(());
                }
                field
            };
            if self.is_present(field)? {
                return Ok(());
            }
            self.stack.last_mut().unwrap().field_idx += 1;
        }
    }

    /// Pop frames whose fields are fully consumed, advancing array elements and parent field cursors as needed.
    /// Runs before matching every incoming event, and once more at end-of-stream.
    fn settle(&mut self) -> Result<()> {
        loop {
            self.skip_absent_optionals()?;
            let Some(top) = self.stack.last() else { break };
            if top.field_idx < top.desc.fields.len() {
                break;
            }
            if self.stack.len() == 1 {
                // The root record itself is exhausted; nothing more to settle.
                break;
            }
            let is_array_elem = top.array.is_some();
            if is_array_elem {
                let (desc, total, index) = {
                    let prog = self.stack.last().unwrap().array.as_ref().unwrap();
                    (self.stack.last().unwrap().desc, prog.total, prog.index)
                };
                self.stack.pop();
                self.materializer.leave_array_element()?;
                if index + 1 < total {
                    let next = index + 1;
                    self.materializer.enter_array_element(next)?;
                    self.stack.push(Frame::element(desc, next, total));
                } else {
                    self.materializer.leave_array()?;
                    self.stack.last_mut().ok_or(StructuralError::StackUnderflow)?.field_idx += 1;
                }
            } else {
                self.stack.pop();
                self.materializer.leave_struct()?;
                self.stack.last_mut().ok_or(StructuralError::StackUnderflow)?.field_idx += 1;
            }
        }
        Ok(())
    }

    fn array_count(&self, field: &FieldDescriptor) -> Result<usize> {
        let array = field
            .array
            .as_ref()
            .ok_or_else(|| Error::contract(format!("field `{}` has Array kind but no ArraySpec", field.name)))?;
        let top = self.stack.last().ok_or(StructuralError::StackUnderflow)?;
        let observed = top.seen.iter().rev().find(|(off, _)| *off == array.size_field_offset);
        match observed {
            Some((_, Observed::Int(v))) => Ok(*v as usize),
            _ => Err(Error::contract(format!(
                "array `{}` decoded before its sibling size field at offset {}",
                field.name, array.size_field_offset
            ))),
        }
    }
}

impl<'m> TlvVisitor for TraversalEngine<'m> {
    fn element(&mut self, el: TlvElement<'_>) -> Result<()> {
        self.settle()?;

        let (desc, field_idx) = {
            let top = self.stack.last().ok_or(StructuralError::StackUnderflow)?;
            (top.desc, top.field_idx)
        };
        let field: &'static FieldDescriptor = desc.fields.get(field_idx).ok_or(StructuralError::UnmatchedElement {
            idx: el.idx,
            level: el.level,
        })?;

        match (field.kind, el.tag) {
            (FieldKind::Struct, TlvTagKind::Nested) => {
                let nested =
                    field.nested.ok_or(StructuralError::MissingNestedDescriptor { field: field.name })?;
                if self.stack.len() >= self.max_depth {
                    return Err(StructuralError::MaxDepthExceeded { max: self.max_depth }.into());
                }
                self.materializer.enter_struct(field, desc, nested)?;
                self.stack.push(Frame::root(nested));
            }
            (FieldKind::Array, TlvTagKind::NestedList) if field.nested.is_some() => {
                let nested = field.nested.unwrap();
                let count = self.array_count(field)?;
                if self.stack.len() >= self.max_depth {
                    return Err(StructuralError::MaxDepthExceeded { max: self.max_depth }.into());
                }
                self.materializer.enter_array(field, desc, nested, count)?;
                if count == 0 {
                    self.materializer.leave_array()?;
                    self.stack.last_mut().unwrap().field_idx += 1;
                } else {
                    self.materializer.enter_array_element(0)?;
                    self.stack.push(Frame::element(nested, 0, count));
                }
            }
            (FieldKind::Array, TlvTagKind::List) => {
                let array = field.array.as_ref().unwrap();
                let count = self.array_count(field)?;
                self.materializer.leaf(
                    field,
                    desc,
                    LeafValue::PrimitiveArray { bytes: el.value, count, builtin_kind: array.builtin_kind },
                )?;
                self.stack.last_mut().unwrap().field_idx += 1;
            }
            (_, TlvTagKind::Field) if field.kind.is_primitive() => {
                self.materializer.leaf(field, desc, LeafValue::Scalar(el.value))?;
                if let Some(observed) = observed_from_bytes(field.kind, el.value) {
                    self.stack.last_mut().unwrap().seen.push((field.offset, observed));
                }
                self.stack.last_mut().unwrap().field_idx += 1;
            }
            (expected_kind, actual_tag) => {
                return Err(Error::contract(format!(
                    "field `{}` ({:?}) does not accept a {:?} element",
                    field.name, expected_kind, actual_tag
                )));
            }
        }
        Ok(())
    }
}

/// Decode `buffer` against `root`, driving `materializer` with every aligned leaf and structural transition, using
/// the crate-wide default limits.
pub fn decode_into(root: &'static TypeDescriptor, buffer: &[u8], materializer: &mut dyn Materializer) -> Result<()> {
    decode_into_with_limits(root, buffer, materializer, crate::config::Limits::new())
}

/// As [`decode_into`], but with caller-chosen [`crate::config::Limits`] (spec.md §3.2).
pub fn decode_into_with_limits(
    root: &'static TypeDescriptor,
    buffer: &[u8],
    materializer: &mut dyn Materializer,
    limits: crate::config::Limits,
) -> Result<()> {
    let mut engine = TraversalEngine::with_max_depth(root, materializer, limits.max_depth);
    codec::decode_with_limit(buffer, &mut engine, limits.max_elements)?;
    engine.finish()
}
