//! BER encoder for nested LDAP structures
//!
//! The length of a SEQUENCE is only known once its content has been
//! written. Each open sequence therefore gets a frame with its own buffer;
//! `encode_end_sequence` prefixes the buffered content with its BER length
//! and appends both to the parent. Frames are pooled per depth, so sibling
//! sequences reuse the same buffer allocation.
//!
//! # Usage Example
//!
//! ```rust
//! use ldap_asn1::ber::BerEncoder;
//!
//! let mut encoder = BerEncoder::new();
//! encoder.encode_start_sequence()?;
//! encoder.encode_integer(5)?;
//! encoder.encode_octet_string("ab")?;
//! encoder.encode_end_sequence()?;
//! let bytes = encoder.take_output()?;
//! assert_eq!(bytes.as_ref(), &[0x30, 0x07, 0x02, 0x01, 0x05, 0x04, 0x02, 0x61, 0x62]);
//! # Ok::<(), ldap_asn1::LdapError>(())
//! ```

use crate::ber::frame::{EncodeFrame, FrameStack};
use crate::ber::types::{
    self, BerLength, BOOLEAN, ENUMERATED, INTEGER, NULL, OCTET_STRING, SEQUENCE, SET,
};
use crate::error::{LdapError, LdapResult};
use bytes::{BufMut, Bytes, BytesMut};

/// BER encoder for nested structures
///
/// Root level elements are written to the output buffer, which is handed to
/// the transport with [`BerEncoder::take_output`].
///
/// # Error Handling
///
/// Encoding only fails on contract violations: ending a sequence that was
/// never started, taking the output while sequences are open, or content
/// longer than a 4-byte BER length can describe.
#[derive(Debug, Default)]
pub struct BerEncoder {
    output: BytesMut,
    frames: FrameStack<EncodeFrame>,
}

impl BerEncoder {
    /// Create a new BER encoder
    pub fn new() -> Self {
        Self {
            output: BytesMut::new(),
            frames: FrameStack::new(),
        }
    }

    /// Create a new BER encoder with initial output capacity
    ///
    /// # Arguments
    /// * `capacity` - Bytes reserved for completed root level elements
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            output: BytesMut::with_capacity(capacity),
            frames: FrameStack::new(),
        }
    }

    /// Buffer receiving the next element: the innermost open sequence, or
    /// the output at the root level
    fn target(&mut self) -> &mut BytesMut {
        match self.frames.current_mut() {
            Some(frame) => &mut frame.buffer,
            None => &mut self.output,
        }
    }

    /// Encode a TLV (Tag-Length-Value) triplet
    ///
    /// # Arguments
    /// * `tag` - Single tag byte, written as-is
    /// * `value` - Content bytes
    ///
    /// # Errors
    /// `ElementTooLarge` when `value` does not fit a 4-byte BER length.
    pub fn encode_tlv(&mut self, tag: u8, value: &[u8]) -> LdapResult<()> {
        let length = BerLength::new(tag, value.len())?;
        let target = self.target();
        target.put_u8(tag);
        length.encode_into(target);
        target.put_slice(value);
        Ok(())
    }

    /// Encode a BOOLEAN
    pub fn encode_boolean(&mut self, value: bool) -> LdapResult<()> {
        self.encode_boolean_with_tag(BOOLEAN, value)
    }

    /// Encode a BOOLEAN under an explicit tag
    pub fn encode_boolean_with_tag(&mut self, tag: u8, value: bool) -> LdapResult<()> {
        self.encode_tlv(tag, &[if value { 0xFF } else { 0x00 }])
    }

    /// Encode a 32-bit INTEGER
    pub fn encode_integer(&mut self, value: i32) -> LdapResult<()> {
        self.encode_long_with_tag(INTEGER, value as i64)
    }

    /// Encode a 32-bit INTEGER under an explicit tag
    pub fn encode_integer_with_tag(&mut self, tag: u8, value: i32) -> LdapResult<()> {
        self.encode_long_with_tag(tag, value as i64)
    }

    /// Encode a 64-bit INTEGER
    pub fn encode_long(&mut self, value: i64) -> LdapResult<()> {
        self.encode_long_with_tag(INTEGER, value)
    }

    /// Encode a 64-bit INTEGER under an explicit tag
    ///
    /// Uses the minimal two's complement form: 127 takes one byte, 128 two.
    ///
    /// # Arguments
    /// * `tag` - Tag byte, e.g. an APPLICATION tag for AbandonRequest
    /// * `value` - Value to encode
    pub fn encode_long_with_tag(&mut self, tag: u8, value: i64) -> LdapResult<()> {
        let bytes = types::encode_integer_value(value);
        self.encode_tlv(tag, bytes.as_slice())
    }

    /// Encode an ENUMERATED value
    pub fn encode_enumerated(&mut self, value: i32) -> LdapResult<()> {
        self.encode_long_with_tag(ENUMERATED, value as i64)
    }

    /// Encode an ENUMERATED value under an explicit tag
    pub fn encode_enumerated_with_tag(&mut self, tag: u8, value: i32) -> LdapResult<()> {
        self.encode_long_with_tag(tag, value as i64)
    }

    /// Encode a NULL
    pub fn encode_null(&mut self) -> LdapResult<()> {
        self.encode_null_with_tag(NULL)
    }

    /// Encode a NULL under an explicit tag
    pub fn encode_null_with_tag(&mut self, tag: u8) -> LdapResult<()> {
        self.encode_tlv(tag, &[])
    }

    /// Encode an OCTET STRING from bytes or a string
    pub fn encode_octet_string<V: AsRef<[u8]>>(&mut self, value: V) -> LdapResult<()> {
        self.encode_tlv(OCTET_STRING, value.as_ref())
    }

    /// Encode an OCTET STRING under an explicit tag
    pub fn encode_octet_string_with_tag<V: AsRef<[u8]>>(
        &mut self,
        tag: u8,
        value: V,
    ) -> LdapResult<()> {
        self.encode_tlv(tag, value.as_ref())
    }

    /// Start a SEQUENCE
    pub fn encode_start_sequence(&mut self) -> LdapResult<()> {
        self.encode_start_sequence_with_tag(SEQUENCE)
    }

    /// Start a constructed element under an explicit tag
    ///
    /// The tag is written immediately; the length follows at
    /// [`BerEncoder::encode_end_sequence`].
    pub fn encode_start_sequence_with_tag(&mut self, tag: u8) -> LdapResult<()> {
        self.target().put_u8(tag);
        self.frames.push().tag = tag;
        Ok(())
    }

    /// End the innermost sequence
    ///
    /// Writes the BER length of the buffered content followed by the
    /// content into the parent sequence, or into the output at the root.
    ///
    /// # Errors
    /// `UnbalancedSequence` when no sequence is open.
    pub fn encode_end_sequence(&mut self) -> LdapResult<()> {
        let Some((parent, frame)) = self.frames.split_top() else {
            return Err(LdapError::UnbalancedSequence);
        };
        let length = BerLength::new(frame.tag, frame.buffer.len())?;
        let target = match parent {
            Some(parent) => &mut parent.buffer,
            None => &mut self.output,
        };
        length.encode_into(target);
        target.extend_from_slice(&frame.buffer);
        frame.buffer.clear();

        self.frames.pop();
        Ok(())
    }

    /// Start a SET
    pub fn encode_start_set(&mut self) -> LdapResult<()> {
        self.encode_start_sequence_with_tag(SET)
    }

    /// Start a SET under an explicit tag
    pub fn encode_start_set_with_tag(&mut self, tag: u8) -> LdapResult<()> {
        self.encode_start_sequence_with_tag(tag)
    }

    /// End the innermost SET
    pub fn encode_end_set(&mut self) -> LdapResult<()> {
        self.encode_end_sequence()
    }

    /// Number of open sequences
    pub fn depth(&self) -> usize {
        self.frames.depth()
    }

    /// Number of completed root level bytes waiting in the output
    pub fn buffered(&self) -> usize {
        self.output.len()
    }

    /// Get a reference to the completed root level bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.output
    }

    /// Take the completed output, leaving the encoder empty
    ///
    /// # Returns
    /// Every completed root level element, ready for the transport.
    ///
    /// # Errors
    /// `UnbalancedSequence` while a sequence is still open: its tag has
    /// already been written but its length and content have not.
    pub fn take_output(&mut self) -> LdapResult<Bytes> {
        if self.depth() > 0 {
            return Err(LdapError::UnbalancedSequence);
        }
        Ok(self.output.split().freeze())
    }

    /// Discard the output and every open sequence
    pub fn clear(&mut self) {
        self.output.clear();
        self.frames.clear();
    }
}
