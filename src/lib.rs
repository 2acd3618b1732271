//! A schema-driven, self-describing TLV (Tag-Length-Value) (de)serializer.
//!
//! Records are described once, at startup, by a [`schema::TypeDescriptor`] tree rather than by a compile-time
//! derive macro — this crate treats that descriptor tree as the only source of truth about a record's layout and
//! never inspects Rust types directly. Encoding walks an in-memory record alongside its descriptor and emits a
//! flat stream of TLV elements; decoding walks the same descriptor alongside the decoded TLV stream and drives one
//! of three materializers: a binary record rebuilder, a JSON text renderer, or a custom per-leaf callback.
//!
//! # TLV wire format
//!
//! Every element on the wire is `tag (2 bytes, big-endian) || length (4 bytes, big-endian) || value[length]`. The
//! tag names the element's *structural* shape — a leaf field, a nested record, an array of either — not a
//! primitive value type; a leaf's actual value type comes from the schema descriptor the decoder is walking in
//! lockstep, not from the wire itself. See [`wire`] for the full tag alphabet.
//!
//! # Usage
//!
//! ```ignore
//! use tlv_codec::config::{SerializeOptions, DeserializeOptions};
//! use tlv_codec::{serialize_to_vec, deserialize};
//!
//! let bytes = serialize_to_vec(SerializeOptions::new(), MyRecord::type_descriptor(), &record_bytes)?;
//! let decoded = deserialize(DeserializeOptions::record(), MyRecord::type_descriptor(), &bytes)?;
//! ```
//!
//! # Error handling
//!
//! Encode/decode failures return an [`error::Error`] carrying an [`error::ErrorKind`] plus an
//! [`error::ErrorLocation`] pinpointing where in the data or field path the problem occurred. Decoding from an
//! untrusted source should always go through [`config::Limits`] to bound worst-case work; defaults match
//! the fixed ceilings this crate otherwise enforces unconditionally (128 fields, 32 levels of nesting, 1024
//! decoded elements per call).
//!
//! For logging or diagnosing a decode failure, [`util::TlvPrinter::render`] renders the raw TLV bytes as an
//! indented tree independent of any schema.

pub mod alloc;
pub mod codec;
pub mod config;
pub mod de;
pub mod error;
pub mod materializer;
pub mod schema;
pub mod ser;
pub mod traversal;
pub mod util;
pub mod wire;

#[doc(inline)]
pub use config::{DeserializeOptions, Format, Limits, SerializeOptions};
#[doc(inline)]
pub use de::{deserialize, deserialize_with_allocator, deserialize_with_visitor, DeserializeOutput};
#[doc(inline)]
pub use error::{Error, ErrorKind, Result};
#[doc(inline)]
pub use schema::{Described, FieldDescriptor, FieldKind, FieldOpts, TypeDescriptor};
#[doc(inline)]
pub use ser::{serialize, serialize_to_vec};
#[doc(inline)]
pub use util::TlvPrinter;

#[cfg(test)]
mod tests;
