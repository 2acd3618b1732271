//! Diagnostic utilities. `TlvPrinter` renders a raw TLV byte stream as an indented, human-readable tree, grounded
//! in the teacher's `util::PrettyPrinter` ("render TTLV bytes in a compact textual representation ... for later
//! diagnostic purposes").
//!
//! This walks the wire bytes itself rather than going through [`crate::codec::decode`], because
//! `codec::decode` deliberately hides reserved/unknown tags from its `TlvVisitor` (that filtering is the schema
//! traversal's contract, not a property of the wire) — a diagnostic dump wants to show everything that's
//! actually there.

use std::fmt::Write as _;

use crate::error::Result;
use crate::wire::TlvHeader;

/// Renders a TLV byte stream as indented text, one line per element, independent of any schema descriptor.
/// Useful in logs when a decode fails and the descriptor-level error alone doesn't explain what was actually on
/// the wire.
pub struct TlvPrinter {
    out: String,
}

impl TlvPrinter {
    pub fn new() -> Self {
        Self { out: String::new() }
    }

    /// Render `buffer`'s TLV elements into an indented tree.
    pub fn render(buffer: &[u8]) -> Result<String> {
        let mut printer = Self::new();
        printer.render_level(buffer, 0)?;
        Ok(printer.out)
    }

    fn render_level(&mut self, buffer: &[u8], level: usize) -> Result<()> {
        let indent = "  ".repeat(level);
        let mut offset = 0usize;
        let mut idx = 0u32;
        while offset < buffer.len() {
            let remaining = &buffer[offset..];
            let header = TlvHeader::parse(remaining)?;
            let needed = TlvHeader::SIZE + header.length as usize;
            if remaining.len() < needed {
                writeln!(self.out, "{indent}#{idx} tag={:#06x} len={} (truncated)", header.tag, header.length).unwrap();
                break;
            }
            let value = &remaining[TlvHeader::SIZE..needed];

            match header.tag_kind() {
                Ok(kind) if kind.is_recursive() => {
                    writeln!(self.out, "{indent}#{idx} {:?} len={}", kind, header.length).unwrap();
                    self.render_level(value, level + 1)?;
                }
                Ok(kind) if kind.is_reserved() => {
                    writeln!(self.out, "{indent}#{idx} {:?} (reserved) len={}", kind, header.length).unwrap();
                }
                Ok(kind) => {
                    writeln!(self.out, "{indent}#{idx} {:?} len={} bytes={}", kind, header.length, hex(value)).unwrap();
                }
                Err(_) => {
                    writeln!(self.out, "{indent}#{idx} tag={:#06x} (unknown) len={}", header.tag, header.length).unwrap();
                }
            }

            offset += needed;
            idx += 1;
        }
        Ok(())
    }
}

impl Default for TlvPrinter {
    fn default() -> Self {
        Self::new()
    }
}

fn hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes.iter().take(64) {
        write!(s, "{b:02x}").unwrap();
    }
    if bytes.len() > 64 {
        s.push_str("...");
    }
    s
}
