//! Boundary behaviors (spec.md §8.2): capacity, depth, and element-count limits.

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;

use super::fixtures::*;
use crate::config::{DeserializeOptions, Limits, SerializeOptions};
use crate::de::deserialize;
use crate::error::{ErrorKind, StructuralError};
use crate::schema::{FieldDescriptor, FieldKind, FieldOpts, TypeDescriptor};
use crate::ser::{serialize, serialize_to_vec};

/// spec.md §8.2: encoding into a buffer one byte short of what's needed fails with `BufferTooSmall`.
#[test]
fn buffer_too_small_on_serialize() {
    let mut anchors = Anchors::new();
    let record = build_simple(&mut anchors, SimpleArgs::default());
    let full = serialize_to_vec(SerializeOptions::new(), &SIMPLE_DESC, &record).unwrap();
    assert_eq!(full.len(), 102);

    let mut out = vec![0u8; full.len() - 1];
    let err = serialize(SerializeOptions::new(), &SIMPLE_DESC, &record, &mut out).unwrap_err();
    assert_matches!(err.kind(), ErrorKind::BufferTooSmall);

    let mut out = vec![0u8; full.len()];
    serialize(SerializeOptions::new(), &SIMPLE_DESC, &record, &mut out).unwrap();
}

/// spec.md §8.2: a truncated TLV stream (header claims more bytes than remain) is a structural decode error.
#[test]
fn truncated_input_errors() {
    let mut anchors = Anchors::new();
    let record = build_simple(&mut anchors, SimpleArgs::default());
    let encoded = serialize_to_vec(SerializeOptions::new(), &SIMPLE_DESC, &record).unwrap();

    let truncated = &encoded[..encoded.len() - 1];
    let err = deserialize(DeserializeOptions::record(), &SIMPLE_DESC, truncated).unwrap_err();
    assert_matches!(err.kind(), ErrorKind::Structural(StructuralError::Truncated { .. }));
}

/// spec.md §3.2/§8.2: decoding more TLV elements than `Limits::max_elements` allows fails, while the exact count
/// still succeeds.
#[test]
fn max_elements_limit_is_enforced() {
    let mut anchors = Anchors::new();
    let record = build_simple(&mut anchors, SimpleArgs::default());
    let encoded = serialize_to_vec(SerializeOptions::new(), &SIMPLE_DESC, &record).unwrap();

    // `Simple` decodes to exactly 6 top-level elements: id, value, active, name, passport, blob.
    let tight = DeserializeOptions::record().with_limits(Limits::new().with_max_elements(6));
    deserialize(tight, &SIMPLE_DESC, &encoded).unwrap();

    let too_tight = DeserializeOptions::record().with_limits(Limits::new().with_max_elements(5));
    let err = deserialize(too_tight, &SIMPLE_DESC, &encoded).unwrap_err();
    assert_matches!(err.kind(), ErrorKind::Structural(StructuralError::MaxElementsExceeded { max: 5 }));
}

/// Builds a chain of `levels` nested `Struct` wrappers around a single `Int32` leaf field, each level built via
/// `Box::leak` (acceptable for test-only scaffolding, see `fixtures.rs`'s rationale for static descriptors).
fn chain_descriptor(levels: usize) -> &'static TypeDescriptor {
    let leaf_fields: &'static [FieldDescriptor] = Box::leak(Box::new([FieldDescriptor {
        name: "v",
        label: None,
        kind: FieldKind::Int32,
        offset: 0,
        size: 4,
        opts: FieldOpts::empty(),
        nested: None,
        discriminator: None,
        array: None,
    }]));
    let mut desc: &'static TypeDescriptor =
        Box::leak(Box::new(TypeDescriptor { type_name: "ChainLeaf", type_size: 4, fields: leaf_fields }));
    for _ in 0..levels {
        let fields: &'static [FieldDescriptor] = Box::leak(Box::new([FieldDescriptor {
            name: "sub",
            label: None,
            kind: FieldKind::Struct,
            offset: 0,
            size: desc.type_size,
            opts: FieldOpts::empty(),
            nested: Some(desc),
            discriminator: None,
            array: None,
        }]));
        desc = Box::leak(Box::new(TypeDescriptor { type_name: "ChainLevel", type_size: desc.type_size, fields }));
    }
    desc
}

/// spec.md §3.2/§8.2: decoding stays within a caller-tightened `max_depth`, one level of nesting below the cap
/// succeeds and one level at the cap fails, mirroring the literal 32/33-level cap at a size small enough to
/// construct directly.
#[test]
fn max_depth_limit_is_enforced() {
    const MAX_DEPTH: usize = 2;
    let record = 7i32.to_ne_bytes().to_vec();

    let shallow = chain_descriptor(1);
    let encoded_shallow = serialize_to_vec(SerializeOptions::new(), shallow, &record).unwrap();
    let limits = DeserializeOptions::record().with_limits(Limits::new().with_max_depth(MAX_DEPTH));
    deserialize(limits, shallow, &encoded_shallow).unwrap();

    let deep = chain_descriptor(2);
    let encoded_deep = serialize_to_vec(SerializeOptions::new(), deep, &record).unwrap();
    let limits = DeserializeOptions::record().with_limits(Limits::new().with_max_depth(MAX_DEPTH));
    let err = deserialize(limits, deep, &encoded_deep).unwrap_err();
    assert_matches!(err.kind(), ErrorKind::Structural(StructuralError::MaxDepthExceeded { max: MAX_DEPTH }));
}
