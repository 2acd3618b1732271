//! Public deserialize entry point (spec.md §6.3/§6.4), mirroring the teacher's `de::from_slice`/`Config` split.

use tracing::{trace, warn};

use crate::alloc::{Allocator, SystemAllocator};
use crate::config::{DeserializeOptions, Format};
use crate::error::Result;
use crate::materializer::json::JsonMaterializer;
use crate::materializer::record::RecordBuf;
use crate::materializer::record::RecordMaterializer;
use crate::materializer::visitor::{LeafCallback, VisitorMaterializer};
use crate::schema::TypeDescriptor;
use crate::traversal::decode_into_with_limits;

/// The materialized result of a decode call (spec.md §6.3: target selects the shape of the output).
pub enum DeserializeOutput {
    /// [`Format::Record`]: the reconstructed in-memory record. The caller owns every side allocation inside it
    /// and must eventually call [`RecordBuf::release`] with the same allocator used here.
    Record(RecordBuf),
    /// [`Format::Json`]: the rendered JSON document.
    Json(String),
    /// [`deserialize_with_visitor`]: the custom visitor received every leaf directly; there is no payload to
    /// hand back (spec.md §6.3 "for Custom, target is unused").
    Custom,
}

/// Decode `input` against `desc`, materializing it as `opts.format` describes.
///
/// Uses [`SystemAllocator`] for any heap allocations the record materializer needs. Use
/// [`deserialize_with_allocator`] to supply a different one.
pub fn deserialize(opts: DeserializeOptions, desc: &'static TypeDescriptor, input: &[u8]) -> Result<DeserializeOutput> {
    deserialize_with_allocator(opts, desc, input, &SystemAllocator)
}

/// As [`deserialize`], with an explicit [`Allocator`] for the `Format::Record` case (ignored for `Format::Json`).
pub fn deserialize_with_allocator(
    opts: DeserializeOptions,
    desc: &'static TypeDescriptor,
    input: &[u8],
    allocator: &dyn Allocator,
) -> Result<DeserializeOutput> {
    trace!(type_name = desc.type_name, input_len = input.len(), format = ?opts.format, "deserialize");
    match opts.format {
        Format::Record => {
            let mut materializer = RecordMaterializer::new(desc, allocator);
            match decode_into_with_limits(desc, input, &mut materializer, opts.limits) {
                Ok(()) => Ok(DeserializeOutput::Record(materializer.into_record())),
                Err(e) => {
                    warn!(error = %e, "decode failed, releasing partially built record");
                    materializer.release_on_error(allocator);
                    Err(e)
                }
            }
        }
        Format::Json => {
            let mut materializer = JsonMaterializer::new();
            decode_into_with_limits(desc, input, &mut materializer, opts.limits)?;
            Ok(DeserializeOutput::Json(materializer.into_string()))
        }
    }
}

/// Decode `input` against `desc`, handing every leaf directly to `callback` instead of materializing a record or
/// JSON document (spec.md §4.4c / §6.3's `Custom` target).
pub fn deserialize_with_visitor<C: LeafCallback>(
    opts: DeserializeOptions,
    desc: &'static TypeDescriptor,
    input: &[u8],
    callback: C,
) -> Result<DeserializeOutput> {
    trace!(type_name = desc.type_name, input_len = input.len(), "deserialize_with_visitor");
    let mut materializer = VisitorMaterializer::new(callback);
    decode_into_with_limits(desc, input, &mut materializer, opts.limits)?;
    Ok(DeserializeOutput::Custom)
}
