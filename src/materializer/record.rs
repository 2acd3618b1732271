//! The binary record materializer (spec.md §4.4a): reconstructs an in-memory record byte-for-byte compatible
//! with the layout a [`TypeDescriptor`](crate::schema::TypeDescriptor) describes, using a caller-supplied
//! [`Allocator`] for strings and dynamic arrays.
//!
//! Nested (non-array) structs are embedded inline, exactly like a C struct member. Dynamic arrays and pointer-based
//! strings live in separately allocated blocks, referenced by a native `usize` pointer value stored inline at the
//! field's offset. Every allocation made while reconstructing one record is tracked in a single flat undo list; on
//! decode failure the caller frees the whole list through the same allocator that produced it, closing the
//! "top-level-only" partial-free gap spec.md §9 calls out — the previous version only unwound allocations made at
//! the root level, leaking anything allocated while reconstructing a nested struct or array.

use std::convert::TryInto;

use crate::alloc::{require_alloc, Allocator};
use crate::error::{Error, ErrorKind, Result};
use crate::schema::{ArrayBuiltinKind, FieldDescriptor, FieldKind, TypeDescriptor};

use super::{LeafValue, Materializer};

/// One heap allocation made while reconstructing a record, tracked so it can be freed later.
#[derive(Debug)]
struct RawAlloc {
    ptr: *mut u8,
    len: usize,
}

/// A reconstructed in-memory record, plus the side allocations (strings, dynamic arrays) it owns.
#[derive(Debug)]
pub struct RecordBuf {
    bytes: Vec<u8>,
    owned: Vec<RawAlloc>,
}

impl RecordBuf {
    fn new(desc: &TypeDescriptor) -> Self {
        Self { bytes: vec![0u8; desc.type_size], owned: Vec::new() }
    }

    /// The reconstructed record's bytes, laid out exactly as `desc` describes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Free every side allocation made while building this record, through `allocator`. Frees in reverse
    /// allocation order (LIFO), matching the nesting order they were made in.
    pub fn release(&mut self, allocator: &dyn Allocator) {
        while let Some(alloc) = self.owned.pop() {
            // SAFETY: every entry in `owned` was produced by exactly one `allocator.allocate(len)` call and is
            // removed from the list as soon as it is freed, so no pointer is ever freed twice.
            unsafe { allocator.deallocate(alloc.ptr, alloc.len) };
        }
    }
}

/// A bounds-checked view into either `RecordBuf::bytes` or a side allocation, used while writing leaf values.
#[derive(Clone, Copy)]
struct Target {
    ptr: *mut u8,
    len: usize,
}

impl Target {
    fn write_at(&self, offset: usize, data: &[u8]) -> Result<()> {
        if offset.checked_add(data.len()).map_or(true, |end| end > self.len) {
            return Err(Error::contract("write would exceed target bounds"));
        }
        // SAFETY: bounds were just checked against `self.len`, which by construction never exceeds the live
        // allocation this `Target` was created from.
        unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), self.ptr.add(offset), data.len()) };
        Ok(())
    }

    fn zero_fill(&self, offset: usize, len: usize) -> Result<()> {
        if offset.checked_add(len).map_or(true, |end| end > self.len) {
            return Err(Error::contract("zero-fill would exceed target bounds"));
        }
        unsafe { std::ptr::write_bytes(self.ptr.add(offset), 0, len) };
        Ok(())
    }

    fn write_usize_at(&self, offset: usize, value: usize) -> Result<()> {
        self.write_at(offset, &value.to_ne_bytes())
    }

    fn sub(&self, offset: usize, len: usize) -> Result<Target> {
        if offset.checked_add(len).map_or(true, |end| end > self.len) {
            return Err(Error::contract("sub-target would exceed parent bounds"));
        }
        Ok(Target { ptr: unsafe { self.ptr.add(offset) }, len })
    }

    fn field_offset(&self, field: &FieldDescriptor) -> Result<Target> {
        self.sub(field.offset, field.size)
    }
}

struct ArrayCtx {
    base: Target,
    elem_size: usize,
}

/// Implements [`Materializer`] by writing decoded leaves directly into an in-memory [`RecordBuf`].
pub struct RecordMaterializer<'a> {
    record: RecordBuf,
    allocator: &'a dyn Allocator,
    targets: Vec<Target>,
    arrays: Vec<ArrayCtx>,
}

impl<'a> RecordMaterializer<'a> {
    pub fn new(desc: &TypeDescriptor, allocator: &'a dyn Allocator) -> Self {
        let record = RecordBuf::new(desc);
        let root = Target { ptr: record.bytes.as_ptr() as *mut u8, len: record.bytes.len() };
        Self { record, allocator, targets: vec![root], arrays: Vec::new() }
    }

    /// Consume the materializer, returning the reconstructed record. Ownership of every side allocation made
    /// along the way transfers to the returned `RecordBuf`; the caller must eventually call
    /// [`RecordBuf::release`].
    pub fn into_record(self) -> RecordBuf {
        self.record
    }

    /// On decode failure, free everything allocated so far instead of handing it to the caller.
    pub fn release_on_error(mut self, allocator: &dyn Allocator) {
        self.record.release(allocator);
    }

    fn current(&self) -> Result<Target> {
        self.targets.last().copied().ok_or_else(|| Error::contract("record materializer target stack underflow"))
    }

    fn track(&mut self, ptr: *mut u8, len: usize) {
        self.record.owned.push(RawAlloc { ptr, len });
    }

    fn write_string(&mut self, target: &Target, field: &FieldDescriptor, value: &[u8]) -> Result<()> {
        if field.is_fixed_string() {
            let cap = field.size;
            let n = value.len().min(cap);
            target.write_at(field.offset, &value[..n])?;
            if n < cap {
                target.zero_fill(field.offset + n, cap - n)?;
            }
            return Ok(());
        }
        if value.is_empty() {
            // Zero-length strings leave the pointer null (spec.md §4.4a).
            target.write_usize_at(field.offset, 0)?;
            return Ok(());
        }
        let ptr = require_alloc(self.allocator, value.len())?;
        unsafe { std::ptr::copy_nonoverlapping(value.as_ptr(), ptr, value.len()) };
        self.track(ptr, value.len());
        target.write_usize_at(field.offset, ptr as usize)?;
        Ok(())
    }

    fn write_primitive_array(
        &mut self,
        target: &Target,
        field: &FieldDescriptor,
        bytes: &[u8],
        count: usize,
        builtin_kind: ArrayBuiltinKind,
    ) -> Result<()> {
        if builtin_kind == ArrayBuiltinKind::String {
            return self.write_string_array(target, field, bytes, count);
        }
        if field.is_dynamic_array() {
            if bytes.is_empty() {
                target.write_usize_at(field.offset, 0)?;
                return Ok(());
            }
            let ptr = require_alloc(self.allocator, bytes.len())?;
            unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len()) };
            self.track(ptr, bytes.len());
            target.write_usize_at(field.offset, ptr as usize)?;
        } else {
            target.write_at(field.offset, bytes)?;
        }
        Ok(())
    }

    /// Array elements with `builtin_kind == String` are themselves pointer-sized slots, each holding a pointer to
    /// one NUL-terminated string; `bytes` is those strings concatenated back to back (spec.md §4.2's "array of
    /// primitive, special case String: concatenate NUL-terminated element bytes").
    fn write_string_array(&mut self, target: &Target, field: &FieldDescriptor, bytes: &[u8], count: usize) -> Result<()> {
        let ptr_size = std::mem::size_of::<usize>();
        if field.size != ptr_size {
            return Err(Error::contract("String array element slot width must equal pointer width"));
        }
        let slots_len = count * ptr_size;
        let slots_target = if field.is_dynamic_array() {
            if count == 0 {
                target.write_usize_at(field.offset, 0)?;
                return Ok(());
            }
            let ptr = require_alloc(self.allocator, slots_len)?;
            self.track(ptr, slots_len);
            target.write_usize_at(field.offset, ptr as usize)?;
            Target { ptr, len: slots_len }
        } else {
            target.field_offset(field)?
        };

        let mut rest = bytes;
        for i in 0..count {
            let nul_at = rest.iter().position(|&b| b == 0).map(|p| p + 1).unwrap_or(rest.len());
            let (one, tail) = rest.split_at(nul_at);
            rest = tail;
            if one.is_empty() {
                slots_target.write_usize_at(i * ptr_size, 0)?;
                continue;
            }
            let ptr = require_alloc(self.allocator, one.len())?;
            unsafe { std::ptr::copy_nonoverlapping(one.as_ptr(), ptr, one.len()) };
            self.track(ptr, one.len());
            slots_target.write_usize_at(i * ptr_size, ptr as usize)?;
        }
        Ok(())
    }
}

impl<'a> Materializer for RecordMaterializer<'a> {
    fn enter_struct(&mut self, field: &FieldDescriptor, _parent: &TypeDescriptor, _nested: &'static TypeDescriptor) -> Result<()> {
        let current = self.current()?;
        let child = current.field_offset(field)?;
        self.targets.push(child);
        Ok(())
    }

    fn leave_struct(&mut self) -> Result<()> {
        self.targets.pop().ok_or_else(|| Error::contract("record materializer: leave_struct with no active struct"))?;
        Ok(())
    }

    fn enter_array(
        &mut self,
        field: &FieldDescriptor,
        _parent: &TypeDescriptor,
        nested: &'static TypeDescriptor,
        element_count: usize,
    ) -> Result<()> {
        let current = self.current()?;
        let elem_size = nested.type_size;
        let total = elem_size.saturating_mul(element_count);

        let base = if field.is_dynamic_array() {
            if element_count == 0 {
                current.write_usize_at(field.offset, 0)?;
                Target { ptr: std::ptr::null_mut(), len: 0 }
            } else {
                let ptr = require_alloc(self.allocator, total)?;
                unsafe { std::ptr::write_bytes(ptr, 0, total) };
                self.track(ptr, total);
                current.write_usize_at(field.offset, ptr as usize)?;
                Target { ptr, len: total }
            }
        } else {
            let field_target = current.field_offset(field)?;
            let len = total.min(field_target.len);
            field_target.sub(0, len)?
        };

        self.arrays.push(ArrayCtx { base, elem_size });
        Ok(())
    }

    fn enter_array_element(&mut self, index: usize) -> Result<()> {
        let ctx = self.arrays.last().ok_or_else(|| Error::contract("enter_array_element with no active array"))?;
        let elem = ctx.base.sub(index * ctx.elem_size, ctx.elem_size)?;
        self.targets.push(elem);
        Ok(())
    }

    fn leave_array_element(&mut self) -> Result<()> {
        self.targets.pop().ok_or_else(|| Error::contract("leave_array_element with no active element"))?;
        Ok(())
    }

    fn leave_array(&mut self) -> Result<()> {
        self.arrays.pop().ok_or_else(|| Error::contract("leave_array with no active array"))?;
        Ok(())
    }

    fn leaf(&mut self, field: &FieldDescriptor, _parent: &TypeDescriptor, value: LeafValue<'_>) -> Result<()> {
        let target = self.current()?;
        match value {
            LeafValue::Scalar(bytes) => {
                if matches!(field.kind, FieldKind::String) {
                    self.write_string(&target, field, bytes)?;
                } else {
                    target.write_at(field.offset, bytes)?;
                }
            }
            LeafValue::PrimitiveArray { bytes, count, builtin_kind } => {
                self.write_primitive_array(&target, field, bytes, count, builtin_kind)?;
            }
        }
        Ok(())
    }
}

/// Read a scalar field's raw bytes directly out of an encode-side record (spec.md §4.2 encoder contract).
pub(crate) fn read_field<'a>(record: &'a [u8], field: &FieldDescriptor) -> Result<&'a [u8]> {
    record
        .get(field.offset..field.offset + field.size)
        .ok_or_else(|| Error::contract(format!("field `{}` out of bounds of encode-side record", field.name)))
}

/// Read a native-endian pointer value stored inline at `offset` (spec.md §4.4a pointer convention).
pub(crate) fn read_ptr(record: &[u8], offset: usize) -> Result<*const u8> {
    let bytes = record
        .get(offset..offset + std::mem::size_of::<usize>())
        .ok_or_else(|| Error::contract("pointer field out of bounds"))?;
    let mut buf = [0u8; std::mem::size_of::<usize>()];
    buf.copy_from_slice(bytes);
    Ok(usize::from_ne_bytes(buf) as *const u8)
}

/// Read an unsigned integer of `width` bytes (1, 2, 4, or 8) at `offset`, native-endian.
pub(crate) fn read_uint(record: &[u8], offset: usize, width: usize) -> Result<u64> {
    let bytes = record
        .get(offset..offset + width)
        .ok_or_else(|| Error::contract("size field out of bounds"))?;
    Ok(match width {
        1 => bytes[0] as u64,
        2 => u16::from_ne_bytes([bytes[0], bytes[1]]) as u64,
        4 => u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64,
        8 => u64::from_ne_bytes(bytes.try_into().unwrap()),
        other => return Err(ErrorKind::InvalidType(format!("unsupported size field width {other}")).into()),
    })
}
