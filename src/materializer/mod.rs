//! Materializer dispatch (spec.md §4.3 "Materializer dispatch", §4.4): what the Traversal Engine hands decoded
//! leaves and structural transitions to.
//!
//! The engine itself only knows how to align a wire event to a field in the descriptor tree; it has no opinion
//! about the shape of the output. That opinion lives here, in three implementations of the [`Materializer`] trait:
//! a binary record rebuilder ([`record`]), a JSON text renderer ([`json`]), and a custom per-leaf visitor
//! ([`visitor`]).

pub mod json;
pub mod record;
pub mod visitor;

use crate::error::Result;
use crate::schema::{ArrayBuiltinKind, FieldDescriptor, TypeDescriptor};

/// A decoded leaf value, still in wire bytes, tagged with enough shape information for a materializer to interpret
/// it without needing to re-examine the field descriptor itself.
#[derive(Debug)]
pub enum LeafValue<'a> {
    /// A single primitive field's raw bytes (`Field` tag), host-order, `field.size` bytes long.
    Scalar(&'a [u8]),
    /// An array of primitives (`List` tag): the whole concatenated element buffer, plus how many elements and how
    /// to interpret them.
    PrimitiveArray { bytes: &'a [u8], count: usize, builtin_kind: ArrayBuiltinKind },
}

/// Receives structural transitions and leaf values from the Traversal Engine during decode (spec.md §4.3/§4.4).
///
/// Calls arrive in wire order. For any nested record, `enter_struct` is always followed eventually by exactly one
/// matching `leave_struct`; for any struct array, `enter_array` is followed by `element_count` pairs of
/// `enter_array_element`/`leave_array_element` and then one `leave_array`. Implementations do not need to track
/// nesting depth themselves; the engine drives calls so that the sequence always balances.
pub trait Materializer {
    fn enter_struct(&mut self, field: &FieldDescriptor, parent: &TypeDescriptor, nested: &'static TypeDescriptor) -> Result<()>;

    fn leave_struct(&mut self) -> Result<()>;

    fn enter_array(
        &mut self,
        field: &FieldDescriptor,
        parent: &TypeDescriptor,
        nested: &'static TypeDescriptor,
        element_count: usize,
    ) -> Result<()>;

    fn enter_array_element(&mut self, index: usize) -> Result<()>;

    fn leave_array_element(&mut self) -> Result<()>;

    fn leave_array(&mut self) -> Result<()>;

    fn leaf(&mut self, field: &FieldDescriptor, parent: &TypeDescriptor, value: LeafValue<'_>) -> Result<()>;

    /// Called once after the last wire event has been processed, so a materializer can flush any buffered state
    /// (spec.md §4.4b/§4.4c "a final end-of-stream call drains all outstanding closers").
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
