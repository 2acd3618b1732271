//! The Schema Model: immutable type descriptors built once and consumed read-only by the rest of the crate
//! (spec.md §3.1, §4.1).
//!
//! Building descriptors from source-level declarations (the registration macro sugar) is an external collaborator
//! and out of scope (spec.md §1) — this module defines only the descriptor data model itself. A caller builds a
//! `TypeDescriptor` once, normally behind a `std::sync::OnceLock`, and everything downstream treats it as read-only.

use std::sync::OnceLock;

use bitflags::bitflags;

use crate::error::{Error, Result, StructuralError};

/// Maximum field count per descriptor (spec.md §3.2).
pub const MAX_FIELDS: usize = 128;
/// Maximum nesting depth during traversal (spec.md §3.2).
pub const MAX_DEPTH: usize = 32;
/// Maximum TLV elements decoded per call (spec.md §3.2).
pub const MAX_ELEMENTS: usize = 1024;

// --- FieldKind --------------------------------------------------------------------------------------------------

/// The wire shape of a field's value (spec.md §3.1 `kind`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Bool,
    Blob,
    String,
    Array,
    Struct,
}

impl FieldKind {
    /// The in-memory size of one value of this kind, for the fixed-width primitive kinds. Returns `None` for
    /// `Blob`/`String`/`Array`/`Struct`, whose size is carried by the field descriptor instead.
    pub fn fixed_width(self) -> Option<usize> {
        use FieldKind::*;
        match self {
            Int8 | UInt8 | Bool => Some(1),
            Int16 | UInt16 => Some(2),
            Int32 | UInt32 | Float32 => Some(4),
            Int64 | UInt64 | Float64 => Some(8),
            Blob | String | Array | Struct => None,
        }
    }

    pub fn is_primitive(self) -> bool {
        !matches!(self, FieldKind::Array | FieldKind::Struct)
    }
}

// --- FieldOpts --------------------------------------------------------------------------------------------------

bitflags! {
    /// Per-field option bitset (spec.md §3.1 `opts`).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct FieldOpts: u8 {
        /// The field's presence on the wire is gated by a discriminator in an earlier sibling field.
        const OPTIONAL = 1 << 0;
        /// Reserved: the field's value should be compressed. Never acted on by this crate (spec.md §1).
        const COMPRESSED = 1 << 1;
        /// Reserved: the field's value should be encrypted. Never acted on by this crate (spec.md §1).
        const ENCRYPTED = 1 << 2;
        /// An `Array` field's storage is a pointer to heap-allocated elements rather than an inline region.
        const ARRAY_DYNAMIC = 1 << 3;
        /// A `String` field's storage is an inline fixed-capacity buffer rather than a pointer.
        const STRING_FIXED = 1 << 4;
    }
}

// --- DiscriminatorTag -------------------------------------------------------------------------------------------

/// The expected value of a discriminator, selecting whether an `Optional` field is present (spec.md §3.1).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiscriminatorTag {
    Int32(i32),
    String(String),
}

/// Where to find the discriminator for an `Optional` field, and what value makes the field present.
#[derive(Clone, Debug)]
pub struct DiscriminatorSpec {
    /// Byte offset of the discriminator field within the same record. Must be strictly less than the offset of
    /// the `Optional` field it gates (spec.md §3.2).
    pub tag_offset: usize,
    /// Expected discriminator value.
    pub tag_value: DiscriminatorTag,
}

impl DiscriminatorSpec {
    pub fn kind(&self) -> FieldKind {
        match &self.tag_value {
            DiscriminatorTag::Int32(_) => FieldKind::Int32,
            DiscriminatorTag::String(_) => FieldKind::String,
        }
    }
}

// --- ArraySpec --------------------------------------------------------------------------------------------------

/// Tunes wire/JSON handling of a non-struct element array (spec.md §3.1 `builtin_kind`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayBuiltinKind {
    Blob,
    Float,
    String,
}

/// Array-specific metadata for an `Array` kind field (spec.md §3.1).
#[derive(Clone, Debug)]
pub struct ArraySpec {
    /// Byte offset, within the same record, of the sibling field holding the element count.
    pub size_field_offset: usize,
    /// Width in bytes of the size field; must be one of 1, 2, 4, 8 (spec.md §3.1, §4.3).
    pub size_field_size: usize,
    /// How to interpret non-struct array elements on the wire and in JSON.
    pub builtin_kind: ArrayBuiltinKind,
}

impl ArraySpec {
    pub fn validate(&self) -> Result<()> {
        if !matches!(self.size_field_size, 1 | 2 | 4 | 8) {
            return Err(StructuralError::InvalidArraySizeFieldWidth(self.size_field_size).into());
        }
        Ok(())
    }
}

// --- FieldDescriptor --------------------------------------------------------------------------------------------

/// Metadata for a single field of a record type (spec.md §3.1).
#[derive(Clone, Debug)]
pub struct FieldDescriptor {
    /// Source identifier.
    pub name: &'static str,
    /// External name used in JSON; falls back to `name` when unset.
    pub label: Option<&'static str>,
    pub kind: FieldKind,
    /// Byte offset within the parent record.
    pub offset: usize,
    /// Byte size of one element of this field.
    pub size: usize,
    pub opts: FieldOpts,
    /// Present for `Struct` fields and arrays of `Struct`.
    pub nested: Option<&'static TypeDescriptor>,
    /// Present when `opts` contains `OPTIONAL`.
    pub discriminator: Option<DiscriminatorSpec>,
    /// Present when `kind` is `Array`.
    pub array: Option<ArraySpec>,
}

impl FieldDescriptor {
    /// The JSON key for this field: `label` if set, else `name` (spec.md §4.4b).
    pub fn json_label(&self) -> &'static str {
        self.label.unwrap_or(self.name)
    }

    pub fn is_optional(&self) -> bool {
        self.opts.contains(FieldOpts::OPTIONAL)
    }

    pub fn is_dynamic_array(&self) -> bool {
        self.opts.contains(FieldOpts::ARRAY_DYNAMIC)
    }

    pub fn is_fixed_string(&self) -> bool {
        self.opts.contains(FieldOpts::STRING_FIXED)
    }

    /// True for `Struct` fields and for `Array` fields whose elements are themselves records.
    pub fn is_struct_like(&self) -> bool {
        matches!(self.kind, FieldKind::Struct) || self.array_is_struct()
    }

    /// Validate this field's invariants against its parent's `type_size` (spec.md §3.2).
    pub fn validate(&self, type_size: usize) -> Result<()> {
        if self.offset.checked_add(self.size).map_or(true, |end| end > type_size) {
            return Err(StructuralError::FieldOutOfBounds {
                field: self.name,
                offset: self.offset,
                size: self.size,
                type_size,
            }
            .into());
        }
        if matches!(self.kind, FieldKind::Struct) && self.nested.is_none() {
            return Err(StructuralError::MissingNestedDescriptor { field: self.name }.into());
        }
        if let Some(array) = &self.array {
            array.validate()?;
        }
        if self.is_optional() {
            let disc = self
                .discriminator
                .as_ref()
                .ok_or_else(|| Error::contract(format!("field `{}` marked OPTIONAL with no discriminator", self.name)))?;
            if disc.tag_offset >= self.offset {
                return Err(Error::contract(format!(
                    "field `{}` discriminator offset {} must precede field offset {}",
                    self.name, disc.tag_offset, self.offset
                )));
            }
        }
        Ok(())
    }

    fn array_is_struct(&self) -> bool {
        matches!(self.kind, FieldKind::Array) && self.nested.is_some()
    }
}

// --- TypeDescriptor ---------------------------------------------------------------------------------------------

/// Immutable metadata for a record type (spec.md §3.1).
#[derive(Clone, Debug)]
pub struct TypeDescriptor {
    /// Human-readable tag; diagnostic only.
    pub type_name: &'static str,
    /// Byte size of the in-memory record, used to stride through arrays of records.
    pub type_size: usize,
    /// Ordered fields; order is significant and defines wire order.
    pub fields: &'static [FieldDescriptor],
}

impl TypeDescriptor {
    /// Validate the descriptor's static invariants (spec.md §3.2). Callers normally do this once, e.g. inside the
    /// `OnceLock` initializer that builds the descriptor, so the rest of the crate can assume valid descriptors
    /// (spec.md §4.1 "the core assumes they are valid").
    pub fn validate(&self) -> Result<()> {
        if self.fields.len() > MAX_FIELDS {
            return Err(StructuralError::TooManyFields { max: MAX_FIELDS }.into());
        }
        for field in self.fields {
            field.validate(self.type_size)?;
        }
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A type whose layout is described by a [`TypeDescriptor`] (spec.md §4.1's `type_info_for(T)` contract).
///
/// Implementations normally back `type_descriptor()` with a `static` `OnceLock<TypeDescriptor>`, mirroring the
/// teacher's `S_SERIALIZE_BEGIN`/`S_SERIALIZE_END` one-shot-initialized `static bool initialized` pattern but using
/// `OnceLock` for a race-safe equivalent (spec.md §5, SPEC_FULL.md §5).
pub trait Described {
    fn type_descriptor() -> &'static TypeDescriptor;
}

/// Helper for implementing [`Described`]: lazily builds and validates a descriptor exactly once.
pub fn described_once(
    cell: &'static OnceLock<TypeDescriptor>,
    build: impl FnOnce() -> TypeDescriptor,
) -> &'static TypeDescriptor {
    cell.get_or_init(|| {
        let info = build();
        if let Err(e) = info.validate() {
            panic!("invalid type descriptor for `{}`: {}", info.type_name, e);
        }
        info
    })
}
