//! Public serialize entry points (spec.md §6.2/§6.4), mirroring the teacher's `ser::to_vec`/`to_writer` split.

use tracing::trace;

use crate::config::SerializeOptions;
use crate::error::Result;
use crate::schema::TypeDescriptor;
use crate::traversal;

/// Encode `record` (a byte-for-byte in-memory instance of `desc`) into `out`, returning the number of bytes
/// written. Returns `Err(BufferTooSmall)` if `out` is not large enough (spec.md §6.2/§6.4).
pub fn serialize(opts: SerializeOptions, desc: &TypeDescriptor, record: &[u8], out: &mut [u8]) -> Result<usize> {
    let _ = opts;
    trace!(type_name = desc.type_name, out_len = out.len(), "serialize");
    traversal::encode_record(desc, record, out)
}

/// As [`serialize`], but growing a freshly allocated `Vec<u8>` instead of requiring a pre-sized buffer.
pub fn serialize_to_vec(opts: SerializeOptions, desc: &TypeDescriptor, record: &[u8]) -> Result<Vec<u8>> {
    // No cheap upper bound on the encoded size is available without walking the descriptor tree, so start from
    // the in-memory record size (a reasonable floor for most schemas) and grow on `BufferTooSmall`.
    let mut cap = record.len().max(64);
    loop {
        let mut out = vec![0u8; cap];
        match serialize(opts, desc, record, &mut out) {
            Ok(n) => {
                out.truncate(n);
                return Ok(out);
            }
            Err(e) if matches!(e.kind(), crate::error::ErrorKind::BufferTooSmall) => {
                cap = cap.saturating_mul(2);
            }
            Err(e) => return Err(e),
        }
    }
}
