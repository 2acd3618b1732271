//! Configuration for encode/decode calls (spec.md §3.2 limits, grounded in the teacher's `de::Config` /
//! `from_reader` configuration layer).
//!
//! The three caps spec.md §3.2 names — 128 fields, 32 levels of nesting, 1024 decoded elements per call — are
//! validated unconditionally against the descriptor and the codec (see [`crate::schema`] and [`crate::codec`]).
//! [`Limits`] lets a caller additionally tighten those ceilings for a single call, e.g. to bound how much work an
//! untrusted input can demand; it can only lower the crate-wide ceilings, never raise them.

use crate::schema::{MAX_DEPTH, MAX_ELEMENTS, MAX_FIELDS};

/// Per-call ceilings, defaulting to the crate-wide maximums from spec.md §3.2.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub max_fields: usize,
    pub max_depth: usize,
    pub max_elements: usize,
}

impl Limits {
    pub const fn new() -> Self {
        Self { max_fields: MAX_FIELDS, max_depth: MAX_DEPTH, max_elements: MAX_ELEMENTS }
    }

    /// Tighten `max_elements`, the most useful knob for bounding decode work against an untrusted input.
    pub fn with_max_elements(mut self, max_elements: usize) -> Self {
        self.max_elements = max_elements.min(MAX_ELEMENTS);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.min(MAX_DEPTH);
        self
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::new()
    }
}

/// What shape [`crate::de::deserialize`] should materialize into (spec.md §6.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    /// Reconstruct an in-memory record through the given allocator.
    Record,
    /// Render as a JSON text document.
    Json,
}

/// Options for [`crate::ser::serialize`]/[`crate::ser::serialize_to_vec`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SerializeOptions {
    pub limits: Limits,
}

impl SerializeOptions {
    pub const fn new() -> Self {
        Self { limits: Limits::new() }
    }
}

/// Options for [`crate::de::deserialize`].
#[derive(Clone, Copy, Debug)]
pub struct DeserializeOptions {
    pub limits: Limits,
    pub format: Format,
}

impl DeserializeOptions {
    pub const fn record() -> Self {
        Self { limits: Limits::new(), format: Format::Record }
    }

    pub const fn json() -> Self {
        Self { limits: Limits::new(), format: Format::Json }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}
