//! Append-only byte buffer with varint/fixed primitives and nested
//! length-delimited framing, built on `prost`'s own wire-format primitives
//! rather than reimplementing varint/zigzag/IEEE-754 encoding by hand.
//!
//! The encoder (`crate::encoder`) treats `Writer` as a black-box API: it
//! never inspects buffer state directly, only calls `tag`/`fork`/`ldelim`
//! and the per-scalar-kind write methods.

use prost::bytes::{BufMut, Bytes, BytesMut};
use prost::encoding::{encode_varint, WireType};

/// A length-delimited region opened by [`Writer::fork`] and not yet closed
/// by a matching [`Writer::ldelim`].
#[derive(Debug)]
struct Fork {
    buf: BytesMut,
}

/// The wire-format output buffer.
///
/// `fork` pushes a fresh buffer onto an internal stack; `ldelim` pops it,
/// writes its length as a varint into the new top of stack, then appends
/// the popped bytes. Every `fork` must be matched by exactly one `ldelim`
/// before [`Writer::finish`] is called.
#[derive(Debug)]
pub struct Writer {
    root: BytesMut,
    stack: Vec<Fork>,
}

impl Default for Writer {
    fn default() -> Self {
        Writer::new()
    }
}

impl Writer {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Writer {
            root: BytesMut::new(),
            stack: Vec::new(),
        }
    }

    fn buf(&mut self) -> &mut BytesMut {
        match self.stack.last_mut() {
            Some(fork) => &mut fork.buf,
            None => &mut self.root,
        }
    }

    /// The number of forks currently open (zero once balanced).
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Writes a field tag: `(field_id << 3) | wire_type`.
    pub fn tag(&mut self, field_id: u32, wire_type: WireType) -> &mut Self {
        prost::encoding::encode_key(field_id, wire_type, self.buf());
        self
    }

    /// Opens a nested length-delimited region.
    pub fn fork(&mut self) -> &mut Self {
        self.stack.push(Fork {
            buf: BytesMut::new(),
        });
        self
    }

    /// Closes the most recently opened region, prefixing its captured bytes
    /// with their length (as a varint) in the enclosing buffer.
    ///
    /// # Panics
    ///
    /// Panics if there is no open fork to close; the encoder guarantees this
    /// never happens by construction (every `fork` call it makes is always
    /// paired with an `ldelim` on every exit path, including error paths).
    pub fn ldelim(&mut self) -> &mut Self {
        let fork = self.stack.pop().expect("ldelim called without a matching fork");
        let parent = self.buf();
        encode_varint(fork.buf.len() as u64, parent);
        parent.put_slice(&fork.buf);
        self
    }

    pub fn double(&mut self, value: f64) -> &mut Self {
        self.buf().put_f64_le(value);
        self
    }

    pub fn float(&mut self, value: f32) -> &mut Self {
        self.buf().put_f32_le(value);
        self
    }

    pub fn int32(&mut self, value: i32) -> &mut Self {
        encode_varint(value as u64, self.buf());
        self
    }

    pub fn int64(&mut self, value: i64) -> &mut Self {
        encode_varint(value as u64, self.buf());
        self
    }

    pub fn uint32(&mut self, value: u32) -> &mut Self {
        encode_varint(value as u64, self.buf());
        self
    }

    pub fn uint64(&mut self, value: u64) -> &mut Self {
        encode_varint(value, self.buf());
        self
    }

    pub fn sint32(&mut self, value: i32) -> &mut Self {
        encode_varint(zigzag32(value) as u64, self.buf());
        self
    }

    pub fn sint64(&mut self, value: i64) -> &mut Self {
        encode_varint(zigzag64(value), self.buf());
        self
    }

    pub fn fixed32(&mut self, value: u32) -> &mut Self {
        self.buf().put_u32_le(value);
        self
    }

    pub fn fixed64(&mut self, value: u64) -> &mut Self {
        self.buf().put_u64_le(value);
        self
    }

    pub fn sfixed32(&mut self, value: i32) -> &mut Self {
        self.buf().put_i32_le(value);
        self
    }

    pub fn sfixed64(&mut self, value: i64) -> &mut Self {
        self.buf().put_i64_le(value);
        self
    }

    pub fn bool(&mut self, value: bool) -> &mut Self {
        self.buf().put_u8(value as u8);
        self
    }

    pub fn string(&mut self, value: &str) -> &mut Self {
        self.bytes(value.as_bytes())
    }

    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        let buf = self.buf();
        encode_varint(value.len() as u64, buf);
        buf.put_slice(value);
        self
    }

    /// Consumes the writer and returns the finished byte buffer.
    ///
    /// # Panics
    ///
    /// Panics if any `fork` is still unmatched by an `ldelim` (property 8 of
    /// the core's testable properties: "Writer bracket balance").
    pub fn finish(self) -> Bytes {
        assert!(
            self.stack.is_empty(),
            "finish called with {} unclosed fork(s)",
            self.stack.len()
        );
        self.root.freeze()
    }
}

fn zigzag32(value: i32) -> u32 {
    ((value << 1) ^ (value >> 31)) as u32
}

fn zigzag64(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_scalar() {
        let mut w = Writer::new();
        w.tag(1, WireType::Varint).int32(150);
        assert_eq!(&w.finish()[..], b"\x08\x96\x01");
    }

    #[test]
    fn fork_ldelim_nests_length_prefix() {
        let mut w = Writer::new();
        w.tag(2, WireType::LengthDelimited);
        w.fork();
        w.string("hi");
        w.ldelim();
        assert_eq!(&w.finish()[..], b"\x12\x02\x68\x69");
    }

    #[test]
    fn zigzag_matches_reference_values() {
        assert_eq!(zigzag32(0), 0);
        assert_eq!(zigzag32(-1), 1);
        assert_eq!(zigzag32(1), 2);
        assert_eq!(zigzag64(-1), 1);
    }

    #[test]
    #[should_panic(expected = "unclosed fork")]
    fn finish_panics_on_unbalanced_fork() {
        let mut w = Writer::new();
        w.fork();
        w.finish();
    }
}
