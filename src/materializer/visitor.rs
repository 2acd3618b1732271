//! The custom visitor materializer (spec.md §4.4c): hands every decoded leaf to a caller-supplied callback
//! instead of reconstructing a record or rendering JSON.
//!
//! A final call with an empty path and a sentinel [`LeafValue::Scalar`] of zero length is not used here; instead
//! [`Materializer::finish`] is a first-class call the callback can distinguish from leaf calls, which is the more
//! idiomatic Rust shape for "an end-of-stream signal" than overloading the leaf signature with null arguments.

use crate::error::Result;
use crate::schema::{FieldDescriptor, TypeDescriptor};

use super::{LeafValue, Materializer};

/// One step of the path from the record root to a decoded leaf.
#[derive(Clone, Copy, Debug)]
pub enum PathSegment {
    Field(&'static str),
    Index(usize),
}

/// The full path from the record root to the leaf currently being visited.
pub struct LeafPath<'a> {
    segments: &'a [PathSegment],
}

impl<'a> LeafPath<'a> {
    pub fn segments(&self) -> &'a [PathSegment] {
        self.segments
    }
}

impl std::fmt::Display for LeafPath<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            match seg {
                PathSegment::Field(name) => write!(f, "{name}")?,
                PathSegment::Index(idx) => write!(f, "[{idx}]")?,
            }
        }
        Ok(())
    }
}

/// Receives one call per decoded leaf, with the path from the record root. Implemented by closures via the
/// blanket impl below for the common case.
pub trait LeafCallback {
    fn leaf(&mut self, path: LeafPath<'_>, field: &FieldDescriptor, value: LeafValue<'_>) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<F> LeafCallback for F
where
    F: FnMut(LeafPath<'_>, &FieldDescriptor, LeafValue<'_>) -> Result<()>,
{
    fn leaf(&mut self, path: LeafPath<'_>, field: &FieldDescriptor, value: LeafValue<'_>) -> Result<()> {
        self(path, field, value)
    }
}

/// Adapts a [`LeafCallback`] into a [`Materializer`], tracking the field/index path as the engine descends.
pub struct VisitorMaterializer<C> {
    callback: C,
    path: Vec<PathSegment>,
}

impl<C: LeafCallback> VisitorMaterializer<C> {
    pub fn new(callback: C) -> Self {
        Self { callback, path: Vec::new() }
    }

    pub fn into_inner(self) -> C {
        self.callback
    }
}

impl<C: LeafCallback> Materializer for VisitorMaterializer<C> {
    fn enter_struct(&mut self, field: &FieldDescriptor, _parent: &TypeDescriptor, _nested: &'static TypeDescriptor) -> Result<()> {
        self.path.push(PathSegment::Field(field.name));
        Ok(())
    }

    fn leave_struct(&mut self) -> Result<()> {
        self.path.pop();
        Ok(())
    }

    fn enter_array(
        &mut self,
        field: &FieldDescriptor,
        _parent: &TypeDescriptor,
        _nested: &'static TypeDescriptor,
        _element_count: usize,
    ) -> Result<()> {
        self.path.push(PathSegment::Field(field.name));
        Ok(())
    }

    fn enter_array_element(&mut self, index: usize) -> Result<()> {
        self.path.push(PathSegment::Index(index));
        Ok(())
    }

    fn leave_array_element(&mut self) -> Result<()> {
        self.path.pop();
        Ok(())
    }

    fn leave_array(&mut self) -> Result<()> {
        self.path.pop();
        Ok(())
    }

    fn leaf(&mut self, field: &FieldDescriptor, _parent: &TypeDescriptor, value: LeafValue<'_>) -> Result<()> {
        let mut path = self.path.clone();
        path.push(PathSegment::Field(field.name));
        self.callback.leaf(LeafPath { segments: &path }, field, value)
    }

    fn finish(&mut self) -> Result<()> {
        self.callback.finish()
    }
}
