//! Hand-authored descriptors and record builders standing in for the schema-registration macro sugar (out of
//! scope per spec.md §1). Offsets are packed with no alignment padding, since every read in this crate goes
//! through a byte slice rather than a typed pointer cast, so packing has no effect on correctness.

use crate::schema::{
    ArrayBuiltinKind, ArraySpec, DiscriminatorSpec, DiscriminatorTag, FieldDescriptor, FieldKind, FieldOpts,
    TypeDescriptor,
};

pub const PTR_SIZE: usize = std::mem::size_of::<usize>();

// --- Simple -------------------------------------------------------------------------------------------------

pub const SIMPLE_TYPE_SIZE: usize = 9 + 2 * PTR_SIZE + 32;

static SIMPLE_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor {
        name: "id",
        label: Some("Id"),
        kind: FieldKind::Int32,
        offset: 0,
        size: 4,
        opts: FieldOpts::empty(),
        nested: None,
        discriminator: None,
        array: None,
    },
    FieldDescriptor {
        name: "value",
        label: None,
        kind: FieldKind::Float32,
        offset: 4,
        size: 4,
        opts: FieldOpts::empty(),
        nested: None,
        discriminator: None,
        array: None,
    },
    FieldDescriptor {
        name: "active",
        label: None,
        kind: FieldKind::Bool,
        offset: 8,
        size: 1,
        opts: FieldOpts::empty(),
        nested: None,
        discriminator: None,
        array: None,
    },
    FieldDescriptor {
        name: "name",
        label: None,
        kind: FieldKind::String,
        offset: 9,
        size: PTR_SIZE,
        opts: FieldOpts::empty(),
        nested: None,
        discriminator: None,
        array: None,
    },
    FieldDescriptor {
        name: "passport",
        label: Some("PassportNumber"),
        kind: FieldKind::String,
        offset: 9 + PTR_SIZE,
        size: PTR_SIZE,
        opts: FieldOpts::empty(),
        nested: None,
        discriminator: None,
        array: None,
    },
    FieldDescriptor {
        name: "blob",
        label: Some("Data"),
        kind: FieldKind::Blob,
        offset: 9 + 2 * PTR_SIZE,
        size: 32,
        opts: FieldOpts::empty(),
        nested: None,
        discriminator: None,
        array: None,
    },
];

pub static SIMPLE_DESC: TypeDescriptor =
    TypeDescriptor { type_name: "Simple", type_size: SIMPLE_TYPE_SIZE, fields: SIMPLE_FIELDS };

// --- Nested ---------------------------------------------------------------------------------------------------

pub const NESTED_TYPE_SIZE: usize = 4 + SIMPLE_TYPE_SIZE + PTR_SIZE;

static NESTED_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor {
        name: "id",
        label: None,
        kind: FieldKind::Int32,
        offset: 0,
        size: 4,
        opts: FieldOpts::empty(),
        nested: None,
        discriminator: None,
        array: None,
    },
    FieldDescriptor {
        name: "sub",
        label: None,
        kind: FieldKind::Struct,
        offset: 4,
        size: SIMPLE_TYPE_SIZE,
        opts: FieldOpts::empty(),
        nested: Some(&SIMPLE_DESC),
        discriminator: None,
        array: None,
    },
    FieldDescriptor {
        name: "name",
        label: None,
        kind: FieldKind::String,
        offset: 4 + SIMPLE_TYPE_SIZE,
        size: PTR_SIZE,
        opts: FieldOpts::empty(),
        nested: None,
        discriminator: None,
        array: None,
    },
];

pub static NESTED_DESC: TypeDescriptor =
    TypeDescriptor { type_name: "Nested", type_size: NESTED_TYPE_SIZE, fields: NESTED_FIELDS };

// --- Super-nested ---------------------------------------------------------------------------------------------

pub const SUPER_NESTED_TYPE_SIZE: usize = NESTED_TYPE_SIZE + 4 + SIMPLE_TYPE_SIZE;

static SUPER_NESTED_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor {
        name: "sub",
        label: None,
        kind: FieldKind::Struct,
        offset: 0,
        size: NESTED_TYPE_SIZE,
        opts: FieldOpts::empty(),
        nested: Some(&NESTED_DESC),
        discriminator: None,
        array: None,
    },
    FieldDescriptor {
        name: "id",
        label: None,
        kind: FieldKind::Int32,
        offset: NESTED_TYPE_SIZE,
        size: 4,
        opts: FieldOpts::empty(),
        nested: None,
        discriminator: None,
        array: None,
    },
    FieldDescriptor {
        name: "ss",
        label: None,
        kind: FieldKind::Struct,
        offset: NESTED_TYPE_SIZE + 4,
        size: SIMPLE_TYPE_SIZE,
        opts: FieldOpts::empty(),
        nested: Some(&SIMPLE_DESC),
        discriminator: None,
        array: None,
    },
];

pub static SUPER_NESTED_DESC: TypeDescriptor =
    TypeDescriptor { type_name: "SuperNested", type_size: SUPER_NESTED_TYPE_SIZE, fields: SUPER_NESTED_FIELDS };

// --- Discriminated union ---------------------------------------------------------------------------------------

pub const ENUM_VALUE_1: i32 = 1;
pub const ENUM_VALUE_2: i32 = 2;

pub const UNION_TYPE_SIZE: usize = 8 + PTR_SIZE;

static UNION_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor {
        name: "id",
        label: None,
        kind: FieldKind::Int32,
        offset: 0,
        size: 4,
        opts: FieldOpts::empty(),
        nested: None,
        discriminator: None,
        array: None,
    },
    FieldDescriptor {
        name: "data_value",
        label: None,
        kind: FieldKind::Int32,
        offset: 4,
        size: 4,
        opts: FieldOpts::OPTIONAL,
        nested: None,
        discriminator: Some(DiscriminatorSpec { tag_offset: 0, tag_value: DiscriminatorTag::Int32(ENUM_VALUE_2) }),
        array: None,
    },
    FieldDescriptor {
        name: "data_name",
        label: None,
        kind: FieldKind::String,
        offset: 8,
        size: PTR_SIZE,
        opts: FieldOpts::OPTIONAL,
        nested: None,
        discriminator: Some(DiscriminatorSpec { tag_offset: 0, tag_value: DiscriminatorTag::Int32(ENUM_VALUE_1) }),
        array: None,
    },
];

pub static UNION_DESC: TypeDescriptor =
    TypeDescriptor { type_name: "Union", type_size: UNION_TYPE_SIZE, fields: UNION_FIELDS };

// --- Struct arrays ----------------------------------------------------------------------------------------------

pub const ARRAY_TYPE_SIZE: usize = 8 + 2 * SIMPLE_TYPE_SIZE + PTR_SIZE;

static ARRAY_FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor {
        name: "static_count",
        label: None,
        kind: FieldKind::UInt32,
        offset: 0,
        size: 4,
        opts: FieldOpts::empty(),
        nested: None,
        discriminator: None,
        array: None,
    },
    FieldDescriptor {
        name: "dynamic_count",
        label: None,
        kind: FieldKind::UInt32,
        offset: 4,
        size: 4,
        opts: FieldOpts::empty(),
        nested: None,
        discriminator: None,
        array: None,
    },
    FieldDescriptor {
        name: "static_entries",
        label: None,
        kind: FieldKind::Array,
        offset: 8,
        size: 2 * SIMPLE_TYPE_SIZE,
        opts: FieldOpts::empty(),
        nested: Some(&SIMPLE_DESC),
        discriminator: None,
        array: Some(ArraySpec { size_field_offset: 0, size_field_size: 4, builtin_kind: ArrayBuiltinKind::Blob }),
    },
    FieldDescriptor {
        name: "dynamic_entries",
        label: None,
        kind: FieldKind::Array,
        offset: 8 + 2 * SIMPLE_TYPE_SIZE,
        size: PTR_SIZE,
        opts: FieldOpts::ARRAY_DYNAMIC,
        nested: Some(&SIMPLE_DESC),
        discriminator: None,
        array: Some(ArraySpec { size_field_offset: 4, size_field_size: 4, builtin_kind: ArrayBuiltinKind::Blob }),
    },
];

pub static ARRAY_DESC: TypeDescriptor =
    TypeDescriptor { type_name: "ArrayRecord", type_size: ARRAY_TYPE_SIZE, fields: ARRAY_FIELDS };

// --- Record builders --------------------------------------------------------------------------------------------

/// Keeps the backing buffers of pointer fields alive for as long as a built record is used. Dropping this before
/// the record is encoded would leave dangling pointers behind.
#[derive(Default)]
pub struct Anchors {
    bufs: Vec<Box<[u8]>>,
}

impl Anchors {
    pub fn new() -> Self {
        Self::default()
    }

    fn anchor(&mut self, bytes: Vec<u8>) -> usize {
        let boxed: Box<[u8]> = bytes.into_boxed_slice();
        let ptr = boxed.as_ptr() as usize;
        self.bufs.push(boxed);
        ptr
    }

    /// Anchor an arbitrary byte buffer (e.g. a dynamic array's concatenated elements) and return its address.
    pub fn anchor_bytes(&mut self, bytes: Vec<u8>) -> usize {
        self.anchor(bytes)
    }

    /// Write a pointer-based string field: `None` leaves the pointer null; `Some(s)` anchors a NUL-terminated
    /// copy of `s` and writes its address.
    pub fn write_string(&mut self, rec: &mut [u8], offset: usize, s: Option<&str>) {
        let ptr = match s {
            None => 0usize,
            Some(s) => {
                let mut bytes = s.as_bytes().to_vec();
                bytes.push(0);
                self.anchor(bytes)
            }
        };
        rec[offset..offset + PTR_SIZE].copy_from_slice(&ptr.to_ne_bytes());
    }
}

pub struct SimpleArgs<'a> {
    pub id: i32,
    pub value: f32,
    pub active: bool,
    pub name: Option<&'a str>,
    pub passport: Option<&'a str>,
}

impl Default for SimpleArgs<'_> {
    fn default() -> Self {
        Self { id: 42, value: 3.14, active: true, name: Some("Hello, World!"), passport: Some("1234567890") }
    }
}

pub fn build_simple(anchors: &mut Anchors, args: SimpleArgs<'_>) -> Vec<u8> {
    let mut rec = vec![0u8; SIMPLE_TYPE_SIZE];
    rec[0..4].copy_from_slice(&args.id.to_ne_bytes());
    rec[4..8].copy_from_slice(&args.value.to_ne_bytes());
    rec[8] = args.active as u8;
    anchors.write_string(&mut rec, 9, args.name);
    anchors.write_string(&mut rec, 9 + PTR_SIZE, args.passport);
    rec[9 + 2 * PTR_SIZE..9 + 2 * PTR_SIZE + 4].copy_from_slice(&[0x01, 0x02, 0x03, 0x04]);
    rec
}

pub fn build_nested(anchors: &mut Anchors, id: i32, sub: &[u8], name: &str) -> Vec<u8> {
    let mut rec = vec![0u8; NESTED_TYPE_SIZE];
    rec[0..4].copy_from_slice(&id.to_ne_bytes());
    rec[4..4 + SIMPLE_TYPE_SIZE].copy_from_slice(sub);
    anchors.write_string(&mut rec, 4 + SIMPLE_TYPE_SIZE, Some(name));
    rec
}

pub fn build_super_nested(id: i32, sub: &[u8], ss: &[u8]) -> Vec<u8> {
    let mut rec = vec![0u8; SUPER_NESTED_TYPE_SIZE];
    rec[0..NESTED_TYPE_SIZE].copy_from_slice(sub);
    rec[NESTED_TYPE_SIZE..NESTED_TYPE_SIZE + 4].copy_from_slice(&id.to_ne_bytes());
    rec[NESTED_TYPE_SIZE + 4..].copy_from_slice(ss);
    rec
}

pub fn build_union(anchors: &mut Anchors, id: i32, data_value: i32, data_name: Option<&str>) -> Vec<u8> {
    let mut rec = vec![0u8; UNION_TYPE_SIZE];
    rec[0..4].copy_from_slice(&id.to_ne_bytes());
    rec[4..8].copy_from_slice(&data_value.to_ne_bytes());
    anchors.write_string(&mut rec, 8, data_name);
    rec
}

/// Builds an `ArrayRecord`: `static_entries` holds `static_elems` inline (capacity `2 * SIMPLE_TYPE_SIZE`, so at
/// most 2 elements); `dynamic_entries` is a heap block anchored for the caller, holding `dynamic_elems`.
pub fn build_array_record(anchors: &mut Anchors, static_elems: &[Vec<u8>], dynamic_elems: &[Vec<u8>]) -> Vec<u8> {
    let mut rec = vec![0u8; ARRAY_TYPE_SIZE];
    rec[0..4].copy_from_slice(&(static_elems.len() as u32).to_ne_bytes());
    rec[4..8].copy_from_slice(&(dynamic_elems.len() as u32).to_ne_bytes());
    let static_off = 8;
    for (i, elem) in static_elems.iter().enumerate() {
        let at = static_off + i * SIMPLE_TYPE_SIZE;
        rec[at..at + SIMPLE_TYPE_SIZE].copy_from_slice(elem);
    }
    let dyn_field_off = 8 + 2 * SIMPLE_TYPE_SIZE;
    if dynamic_elems.is_empty() {
        rec[dyn_field_off..dyn_field_off + PTR_SIZE].copy_from_slice(&0usize.to_ne_bytes());
    } else {
        let mut block = Vec::with_capacity(dynamic_elems.len() * SIMPLE_TYPE_SIZE);
        for elem in dynamic_elems {
            block.extend_from_slice(elem);
        }
        let ptr = anchors.anchor_bytes(block);
        rec[dyn_field_off..dyn_field_off + PTR_SIZE].copy_from_slice(&ptr.to_ne_bytes());
    }
    rec
}

/// Reads `len` bytes from a pointer field of an already-decoded record.
pub fn read_ptr_bytes(bytes: &[u8], offset: usize, len: usize) -> Option<Vec<u8>> {
    let mut buf = [0u8; PTR_SIZE];
    buf.copy_from_slice(&bytes[offset..offset + PTR_SIZE]);
    let ptr = usize::from_ne_bytes(buf) as *const u8;
    if ptr.is_null() {
        return None;
    }
    // SAFETY: decoded dynamic-array pointers reference a `len`-byte allocation made by the same decode call.
    Some(unsafe { std::slice::from_raw_parts(ptr, len) }.to_vec())
}

/// Reads a pointer-based string field of an already-decoded record (`ptr` read as a native `usize`, then walked
/// to the trailing NUL), mirroring `traversal::nul_terminated_bytes` for test assertions.
pub fn read_string_field(bytes: &[u8], offset: usize) -> Option<String> {
    let mut buf = [0u8; PTR_SIZE];
    buf.copy_from_slice(&bytes[offset..offset + PTR_SIZE]);
    let ptr = usize::from_ne_bytes(buf) as *const u8;
    if ptr.is_null() {
        return None;
    }
    let mut len = 0usize;
    // SAFETY: decoded pointer fields always reference a NUL-terminated allocation made by the same decode call.
    unsafe {
        while *ptr.add(len) != 0 {
            len += 1;
        }
        Some(String::from_utf8_lossy(std::slice::from_raw_parts(ptr, len)).into_owned())
    }
}
