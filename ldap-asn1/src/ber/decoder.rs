//! Incremental BER decoder
//!
//! The decoder never performs I/O. Bytes are handed to it with
//! [`BerDecoder::feed`] in whatever fragments the transport delivers, and
//! every read either completes, fails with a terminal error, or returns
//! [`LdapError::Incomplete`]. After `Incomplete` the same call can be made
//! again once more bytes were fed: the header parsing state is kept in the
//! decoder, so no progress is lost and no byte is read twice.
//!
//! # Usage Example
//!
//! ```rust
//! use ldap_asn1::ber::{BerDecoder, BerDecoderSettings};
//!
//! let mut decoder = BerDecoder::new(BerDecoderSettings::default());
//! decoder.feed(&[0x02, 0x01]);
//! assert!(!decoder.element_available()?);
//! decoder.feed(&[0x05]);
//! assert_eq!(decoder.decode_integer()?, 5);
//! # Ok::<(), ldap_asn1::LdapError>(())
//! ```
//!
//! # Nesting
//!
//! `decode_start_sequence` opens a frame bounded by the declared sequence
//! length. Every consumed byte, header or value, counts against the
//! innermost frame, and a child can never declare more than its parent has
//! left, so reads cannot run past a sequence into its siblings.
//! `decode_end_sequence` discards whatever the caller did not read.

use crate::ber::frame::{DecodeFrame, FrameStack};
use crate::ber::types::{self, BerLength, LengthPrefix};
use crate::error::{LdapError, LdapResult};
use bytes::{Buf, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

/// Decoder configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BerDecoderSettings {
    /// Largest declared element length accepted at any depth; 0 = unlimited
    pub max_element_size: usize,
}

impl BerDecoderSettings {
    /// Settings with the given maximum element size (0 = unlimited)
    pub fn new(max_element_size: usize) -> Self {
        Self { max_element_size }
    }

    fn limit(&self) -> Option<usize> {
        (self.max_element_size > 0).then_some(self.max_element_size)
    }
}

/// Header parsing progress for the next element
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CursorState {
    /// Waiting for the tag byte
    #[default]
    NeedTag,
    /// Tag known, waiting for the first length byte
    NeedFirstLengthByte,
    /// Long form length, waiting for the big-endian length bytes
    NeedMoreLengthBytes,
    /// Header complete, value bytes not consumed yet
    NeedValueBytes,
    /// Value of a skipped element partly discarded, rest not buffered yet
    SkippingValue,
}

#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    state: CursorState,
    tag: u8,
    length: usize,
    /// Long form length bytes still to read
    length_bytes: u8,
    /// Value bytes of a skipped element discarded so far
    skipped: usize,
}

impl Cursor {
    fn reset(&mut self) {
        *self = Cursor::default();
    }
}

/// Incremental BER decoder
///
/// Single owner, not shared between tasks. The root level has no length
/// budget: there, the available data is whatever has been fed so far.
#[derive(Debug, Default)]
pub struct BerDecoder {
    input: BytesMut,
    settings: BerDecoderSettings,
    frames: FrameStack<DecodeFrame>,
    cursor: Cursor,
    /// Bytes consumed since creation (header and value bytes)
    consumed: u64,
}

impl BerDecoder {
    /// Create a new BER decoder
    pub fn new(settings: BerDecoderSettings) -> Self {
        Self {
            input: BytesMut::new(),
            settings,
            frames: FrameStack::new(),
            cursor: Cursor::default(),
            consumed: 0,
        }
    }

    /// Append bytes received from the transport
    ///
    /// # Arguments
    /// * `data` - Next fragment of the stream, of any size
    pub fn feed(&mut self, data: &[u8]) {
        self.input.extend_from_slice(data);
    }

    /// Input buffer a transport appends to in place of `feed`
    pub(crate) fn input_mut(&mut self) -> &mut BytesMut {
        &mut self.input
    }

    /// Decoder configuration
    pub fn settings(&self) -> &BerDecoderSettings {
        &self.settings
    }

    /// Number of fed bytes not consumed yet
    pub fn buffered(&self) -> usize {
        self.input.len()
    }

    /// Number of open sequences
    pub fn depth(&self) -> usize {
        self.frames.depth()
    }

    /// Total number of bytes consumed so far
    pub fn total_bytes_read(&self) -> u64 {
        self.consumed
    }

    /// Header parsing state of the next element
    pub fn state(&self) -> CursorState {
        self.cursor.state
    }

    /// True at the root level between elements with nothing buffered
    pub fn is_idle(&self) -> bool {
        self.depth() == 0 && self.cursor.state == CursorState::NeedTag && self.input.is_empty()
    }

    /// Drop all buffered input, open sequences and parsing state
    pub fn reset(&mut self) {
        self.input.clear();
        self.frames.clear();
        self.cursor.reset();
        self.consumed = 0;
    }

    /// Whether another element follows in the current sequence
    ///
    /// Inside a sequence this is decided by the remaining length budget. At
    /// the root it only reports whether any byte of a next element has been
    /// buffered.
    pub fn has_next_element(&self) -> bool {
        let pending = match self.cursor.state {
            CursorState::NeedTag => 0,
            CursorState::SkippingValue => self.cursor.length - self.cursor.skipped,
            _ => return true,
        };
        match self.remaining_budget() {
            Some(remaining) => remaining > pending,
            None => self.input.len() > pending,
        }
    }

    /// Whether the next element, value included, is completely buffered
    ///
    /// Advances header parsing as far as the buffered bytes allow without
    /// consuming any value byte. Returns `false` at the end of the current
    /// sequence. Length violations are reported as soon as the length is
    /// known, before any value byte is needed.
    pub fn element_available(&mut self) -> LdapResult<bool> {
        if self.cursor.state == CursorState::SkippingValue && !self.continue_skip() {
            return Ok(false);
        }
        if self.frame_exhausted() {
            return Ok(false);
        }
        if !self.advance_header()? {
            return Ok(false);
        }
        Ok(self.input.len() >= self.cursor.length)
    }

    /// Tag of the next element, or `None` at the end of the current sequence
    pub fn peek_tag(&mut self) -> LdapResult<Option<u8>> {
        self.finish_skip()?;
        if self.frame_exhausted() {
            return Ok(None);
        }
        if self.cursor.state == CursorState::NeedTag && !self.step_tag()? {
            return Err(LdapError::Incomplete);
        }
        Ok(Some(self.cursor.tag))
    }

    /// Declared length of the next element, or `None` at the end of the
    /// current sequence
    pub fn peek_length(&mut self) -> LdapResult<Option<usize>> {
        self.finish_skip()?;
        if self.frame_exhausted() {
            return Ok(None);
        }
        self.begin_element()?;
        Ok(Some(self.cursor.length))
    }

    /// Decode a BOOLEAN; any non-zero content byte is true
    pub fn decode_boolean(&mut self) -> LdapResult<bool> {
        let value = self.read_primitive(|length| {
            if length == 1 {
                Ok(())
            } else {
                Err(LdapError::InvalidBooleanLength { length })
            }
        })?;
        Ok(value[0] != 0)
    }

    /// Decode a 32-bit INTEGER (1-4 content bytes)
    ///
    /// Values wider than 4 bytes are rejected with `InvalidIntegerLength`;
    /// use [`BerDecoder::decode_long`] for the full 1-8 byte range.
    ///
    /// # Returns
    /// The sign-extended value.
    pub fn decode_integer(&mut self) -> LdapResult<i32> {
        let value = self.read_primitive(integer_length_check(4))?;
        Ok(types::decode_integer_value(&value)? as i32)
    }

    /// Decode a 64-bit INTEGER (1-8 content bytes)
    pub fn decode_long(&mut self) -> LdapResult<i64> {
        let value = self.read_primitive(integer_length_check(8))?;
        types::decode_integer_value(&value)
    }

    /// Decode an ENUMERATED value (1-4 content bytes, like `decode_integer`)
    pub fn decode_enumerated(&mut self) -> LdapResult<i32> {
        self.decode_integer()
    }

    /// Decode a NULL
    pub fn decode_null(&mut self) -> LdapResult<()> {
        self.read_primitive(|length| {
            if length == 0 {
                Ok(())
            } else {
                Err(LdapError::InvalidNullLength { length })
            }
        })?;
        Ok(())
    }

    /// Decode an OCTET STRING
    pub fn decode_octet_string(&mut self) -> LdapResult<Bytes> {
        self.read_primitive(|_| Ok(()))
    }

    /// Decode an OCTET STRING holding UTF-8 text
    pub fn decode_octet_string_as_string(&mut self) -> LdapResult<String> {
        let value = self.decode_octet_string()?;
        String::from_utf8(value.to_vec())
            .map_err(|e| LdapError::InvalidData(format!("Octet string is not valid UTF-8: {}", e)))
    }

    /// Decode any element as its tag and raw value bytes
    ///
    /// # Returns
    /// `(tag, value)`; constructed values are returned undecoded.
    pub fn decode_element(&mut self) -> LdapResult<(u8, Bytes)> {
        self.begin_element()?;
        let tag = self.cursor.tag;
        let value = self.read_primitive(|_| Ok(()))?;
        Ok((tag, value))
    }

    /// Skip the next element, primitive or constructed
    ///
    /// Value bytes are discarded as they arrive, so skipping never buffers
    /// more than one fed fragment. While the value is incomplete the call
    /// returns `Incomplete`; calling again continues the skip. Any other
    /// read made in the meantime first finishes the pending skip.
    ///
    /// # Returns
    /// The number of value bytes skipped.
    pub fn skip_element(&mut self) -> LdapResult<usize> {
        if self.cursor.state != CursorState::SkippingValue {
            self.begin_element()?;
            self.cursor.skipped = 0;
            self.cursor.state = CursorState::SkippingValue;
        }
        let length = self.cursor.length;
        if self.continue_skip() {
            Ok(length)
        } else {
            Err(LdapError::Incomplete)
        }
    }

    /// Open a SEQUENCE (or any constructed element)
    ///
    /// Only the header must be buffered.
    ///
    /// # Returns
    /// The element's tag, so callers can tell CHOICE alternatives apart.
    ///
    /// # Errors
    /// `SequenceLengthExceeded` when the declared length does not fit the
    /// enclosing sequence, `ElementTooLarge` above the configured maximum.
    pub fn decode_start_sequence(&mut self) -> LdapResult<u8> {
        self.begin_element()?;
        let tag = self.cursor.tag;
        let limit = self.consumed + self.cursor.length as u64;
        self.frames.push().limit = limit;
        self.cursor.reset();
        log::trace!(
            "Opened sequence 0x{:02X} of {} bytes at depth {}",
            tag,
            limit - self.consumed,
            self.depth()
        );
        Ok(tag)
    }

    /// Close the innermost sequence, discarding its unread remainder
    ///
    /// When the remainder is not fully buffered yet, the buffered part is
    /// discarded and `Incomplete` is returned; calling again continues the
    /// drain.
    pub fn decode_end_sequence(&mut self) -> LdapResult<()> {
        let Some(remaining) = self.remaining_budget() else {
            return Err(LdapError::UnbalancedSequence);
        };
        self.cursor.reset();

        if remaining > 0 {
            let n = remaining.min(self.input.len());
            if n > 0 {
                log::debug!(
                    "Discarding {} unread bytes of sequence at depth {}",
                    n,
                    self.depth()
                );
                self.discard(n);
            }
            if n < remaining {
                return Err(LdapError::Incomplete);
            }
        }

        self.frames.pop();
        log::trace!("Closed sequence, depth now {}", self.depth());
        Ok(())
    }

    /// Open a SET; identical to a SEQUENCE for decoding purposes
    pub fn decode_start_set(&mut self) -> LdapResult<u8> {
        self.decode_start_sequence()
    }

    /// Close a SET
    pub fn decode_end_set(&mut self) -> LdapResult<()> {
        self.decode_end_sequence()
    }

    fn remaining_budget(&self) -> Option<usize> {
        self.frames
            .current()
            .map(|frame| frame.remaining(self.consumed))
    }

    /// Discard buffered value bytes of the element being skipped
    ///
    /// Returns `true` once the whole value has been discarded.
    fn continue_skip(&mut self) -> bool {
        let pending = self.cursor.length - self.cursor.skipped;
        let n = pending.min(self.input.len());
        if n > 0 {
            self.discard(n);
            self.cursor.skipped += n;
        }
        if n < pending {
            return false;
        }
        self.cursor.reset();
        true
    }

    fn finish_skip(&mut self) -> LdapResult<()> {
        if self.cursor.state == CursorState::SkippingValue && !self.continue_skip() {
            return Err(LdapError::Incomplete);
        }
        Ok(())
    }

    fn frame_exhausted(&self) -> bool {
        self.cursor.state == CursorState::NeedTag && self.remaining_budget() == Some(0)
    }

    /// Fail when consuming `n` more bytes would leave the current sequence
    fn check_limit(&self, n: usize) -> LdapResult<()> {
        if let Some(remaining) = self.remaining_budget() {
            if n > remaining {
                log::warn!(
                    "Element exceeds enclosing sequence: {} bytes requested, {} remaining",
                    n,
                    remaining
                );
                return Err(LdapError::SequenceLengthExceeded {
                    requested: n,
                    remaining,
                });
            }
        }
        Ok(())
    }

    fn begin_element(&mut self) -> LdapResult<()> {
        if self.advance_header()? {
            Ok(())
        } else {
            Err(LdapError::Incomplete)
        }
    }

    fn step_tag(&mut self) -> LdapResult<bool> {
        self.check_limit(1)?;
        if self.input.is_empty() {
            return Ok(false);
        }
        self.cursor.tag = self.take_byte();
        self.cursor.state = CursorState::NeedFirstLengthByte;
        Ok(true)
    }

    /// Run the header state machine as far as the buffered bytes allow
    ///
    /// Returns `true` once the tag and length are known.
    fn advance_header(&mut self) -> LdapResult<bool> {
        loop {
            match self.cursor.state {
                CursorState::NeedTag => {
                    if !self.step_tag()? {
                        return Ok(false);
                    }
                }
                CursorState::NeedFirstLengthByte => {
                    self.check_limit(1)?;
                    if self.input.is_empty() {
                        return Ok(false);
                    }
                    let first_byte = self.take_byte();
                    match BerLength::decode_prefix(first_byte)? {
                        LengthPrefix::Short(length) => self.finish_length(length)?,
                        LengthPrefix::Long(count) => {
                            self.cursor.length_bytes = count;
                            self.cursor.state = CursorState::NeedMoreLengthBytes;
                        }
                    }
                }
                CursorState::NeedMoreLengthBytes => {
                    let count = self.cursor.length_bytes as usize;
                    self.check_limit(count)?;
                    if self.input.len() < count {
                        return Ok(false);
                    }
                    let length = BerLength::decode_long(&self.input[..count])?;
                    self.discard(count);
                    self.cursor.length_bytes = 0;
                    self.finish_length(length)?;
                }
                CursorState::NeedValueBytes => return Ok(true),
                CursorState::SkippingValue => {
                    if !self.continue_skip() {
                        return Ok(false);
                    }
                }
            }
        }
    }

    fn finish_length(&mut self, length: usize) -> LdapResult<()> {
        let tag = self.cursor.tag;
        if let Some(max) = self.settings.limit() {
            if length > max {
                log::warn!(
                    "Rejecting element 0x{:02X}: declared length {} exceeds maximum {}",
                    tag,
                    length,
                    max
                );
                return Err(LdapError::ElementTooLarge { tag, length, max });
            }
        }
        self.check_limit(length)?;
        self.cursor.length = length;
        self.cursor.state = CursorState::NeedValueBytes;
        Ok(())
    }

    /// Consume the value of a primitive element once it is fully buffered
    ///
    /// `check` validates the declared length before any value byte is
    /// required.
    fn read_primitive<F>(&mut self, check: F) -> LdapResult<Bytes>
    where
        F: FnOnce(usize) -> LdapResult<()>,
    {
        self.begin_element()?;
        let length = self.cursor.length;
        check(length)?;
        if self.input.len() < length {
            return Err(LdapError::Incomplete);
        }
        let value = self.take_bytes(length);
        self.cursor.reset();
        Ok(value)
    }

    fn take_byte(&mut self) -> u8 {
        self.consumed += 1;
        self.input.get_u8()
    }

    fn take_bytes(&mut self, n: usize) -> Bytes {
        self.consumed += n as u64;
        self.input.split_to(n).freeze()
    }

    fn discard(&mut self, n: usize) {
        self.consumed += n as u64;
        self.input.advance(n);
    }
}

fn integer_length_check(max: usize) -> impl FnOnce(usize) -> LdapResult<()> {
    move |length| {
        if (1..=max).contains(&length) {
            Ok(())
        } else {
            Err(LdapError::InvalidIntegerLength { length, max })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ber::encoder::BerEncoder;
    use crate::ber::types::{BOOLEAN, INTEGER, OCTET_STRING, SEQUENCE, SET};

    // SEQUENCE { INTEGER 5, OCTET STRING "ab", SEQUENCE { BOOLEAN true } }
    const NESTED: [u8; 14] = [
        0x30, 0x0C, 0x02, 0x01, 0x05, 0x04, 0x02, 0x61, 0x62, 0x30, 0x03, 0x01, 0x01, 0xFF,
    ];

    fn decoder_with(data: &[u8]) -> BerDecoder {
        let mut decoder = BerDecoder::default();
        decoder.feed(data);
        decoder
    }

    #[test]
    fn test_decode_nested_sequence() {
        let mut decoder = decoder_with(&NESTED);

        assert_eq!(decoder.decode_start_sequence().unwrap(), SEQUENCE);
        assert_eq!(decoder.decode_integer().unwrap(), 5);
        assert_eq!(decoder.decode_octet_string().unwrap().as_ref(), b"ab");
        assert_eq!(decoder.decode_start_sequence().unwrap(), SEQUENCE);
        assert_eq!(decoder.depth(), 2);
        assert!(decoder.decode_boolean().unwrap());
        assert!(!decoder.has_next_element());
        decoder.decode_end_sequence().unwrap();
        assert!(!decoder.has_next_element());
        decoder.decode_end_sequence().unwrap();

        assert!(!decoder.has_next_element());
        assert!(decoder.is_idle());
        assert_eq!(decoder.total_bytes_read(), NESTED.len() as u64);
    }

    #[test]
    fn test_element_available_byte_by_byte() {
        let mut decoder = BerDecoder::default();
        for (i, byte) in NESTED.iter().enumerate() {
            assert!(!decoder.element_available().unwrap(), "available after {} bytes", i);
            decoder.feed(&[*byte]);
        }
        assert!(decoder.element_available().unwrap());
        // header consumed exactly once
        assert_eq!(decoder.total_bytes_read(), 2);

        decoder.decode_start_sequence().unwrap();
        assert_eq!(decoder.decode_integer().unwrap(), 5);
        assert_eq!(decoder.decode_octet_string().unwrap().as_ref(), b"ab");
        decoder.decode_start_sequence().unwrap();
        assert!(decoder.decode_boolean().unwrap());
        decoder.decode_end_sequence().unwrap();
        decoder.decode_end_sequence().unwrap();
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_state_machine_resumes_long_form_length() {
        let value = vec![0x5Au8; 200];
        let mut encoded = vec![OCTET_STRING, 0x81, 0xC8];
        encoded.extend_from_slice(&value);

        let mut decoder = BerDecoder::default();
        decoder.feed(&encoded[..1]);
        assert!(!decoder.element_available().unwrap());
        assert_eq!(decoder.state(), CursorState::NeedFirstLengthByte);

        decoder.feed(&encoded[1..2]);
        assert!(!decoder.element_available().unwrap());
        assert_eq!(decoder.state(), CursorState::NeedMoreLengthBytes);

        decoder.feed(&encoded[2..3]);
        assert!(!decoder.element_available().unwrap());
        assert_eq!(decoder.state(), CursorState::NeedValueBytes);
        assert_eq!(decoder.total_bytes_read(), 3);

        for i in 3..encoded.len() - 1 {
            decoder.feed(&encoded[i..i + 1]);
            assert!(!decoder.element_available().unwrap());
        }
        decoder.feed(&encoded[encoded.len() - 1..]);
        assert!(decoder.element_available().unwrap());
        assert_eq!(decoder.decode_octet_string().unwrap().as_ref(), value.as_slice());
        assert_eq!(decoder.state(), CursorState::NeedTag);
    }

    #[test]
    fn test_incomplete_read_keeps_progress() {
        let mut decoder = decoder_with(&[INTEGER, 0x02, 0x01]);
        assert!(decoder.decode_integer().unwrap_err().is_incomplete());
        assert_eq!(decoder.state(), CursorState::NeedValueBytes);
        assert_eq!(decoder.total_bytes_read(), 2);

        decoder.feed(&[0x00]);
        assert_eq!(decoder.decode_integer().unwrap(), 256);
    }

    #[test]
    fn test_start_sequence_needs_only_header() {
        let mut decoder = decoder_with(&[SEQUENCE]);
        assert!(decoder.decode_start_sequence().unwrap_err().is_incomplete());
        decoder.feed(&[0x03, 0x01]);
        assert_eq!(decoder.decode_start_sequence().unwrap(), SEQUENCE);
        assert!(!decoder.element_available().unwrap());
        decoder.feed(&[0x01, 0x00]);
        assert!(!decoder.decode_boolean().unwrap());
        decoder.decode_end_sequence().unwrap();
    }

    #[test]
    fn test_child_past_sequence_end_fails() {
        // declared length 6, children need 7
        let mut decoder =
            decoder_with(&[0x30, 0x06, 0x02, 0x01, 0x05, 0x04, 0x02, 0x61, 0x62]);
        decoder.decode_start_sequence().unwrap();
        assert_eq!(decoder.decode_integer().unwrap(), 5);
        let err = decoder.decode_octet_string().unwrap_err();
        assert!(matches!(
            err,
            LdapError::SequenceLengthExceeded {
                requested: 2,
                remaining: 1
            }
        ));
    }

    #[test]
    fn test_nested_sequence_larger_than_parent_fails() {
        let mut decoder = decoder_with(&[0x30, 0x03, 0x30, 0x05, 0x01, 0x01, 0xFF]);
        decoder.decode_start_sequence().unwrap();
        assert!(matches!(
            decoder.decode_start_sequence(),
            Err(LdapError::SequenceLengthExceeded { .. })
        ));
    }

    #[test]
    fn test_header_past_sequence_end_fails() {
        // one byte left in the sequence, but the child header needs two
        let mut decoder = decoder_with(&[0x30, 0x04, 0x02, 0x01, 0x05, 0x04, 0x00]);
        decoder.decode_start_sequence().unwrap();
        decoder.decode_integer().unwrap();
        assert!(matches!(
            decoder.decode_octet_string(),
            Err(LdapError::SequenceLengthExceeded {
                requested: 1,
                remaining: 0
            })
        ));
    }

    #[test]
    fn test_max_element_size_checked_before_value() {
        let mut decoder = BerDecoder::new(BerDecoderSettings::new(16));
        // only the header of a 200 byte string has arrived
        decoder.feed(&[OCTET_STRING, 0x81, 0xC8]);
        let err = decoder.element_available().unwrap_err();
        assert!(matches!(
            err,
            LdapError::ElementTooLarge {
                tag: OCTET_STRING,
                length: 200,
                max: 16
            }
        ));
    }

    #[test]
    fn test_max_element_size_applies_when_nested() {
        let mut decoder = BerDecoder::new(BerDecoderSettings::new(16));
        decoder.feed(&[SEQUENCE, 0x05, OCTET_STRING, 0x64]);
        decoder.decode_start_sequence().unwrap();
        assert!(matches!(
            decoder.peek_length(),
            Err(LdapError::ElementTooLarge { length: 100, .. })
        ));

        let mut decoder = BerDecoder::new(BerDecoderSettings::new(1024));
        decoder.feed(&[SEQUENCE, 0x82, 0x10, 0x00]);
        assert!(matches!(
            decoder.decode_start_sequence(),
            Err(LdapError::ElementTooLarge { length: 4096, .. })
        ));
    }

    #[test]
    fn test_unlimited_by_default() {
        let mut encoder = BerEncoder::new();
        encoder.encode_octet_string(vec![7u8; 70_000]).unwrap();
        let mut decoder = decoder_with(&encoder.take_output().unwrap());
        assert_eq!(decoder.decode_octet_string().unwrap().len(), 70_000);
    }

    #[test]
    fn test_invalid_length_encoding() {
        let mut decoder = decoder_with(&[OCTET_STRING, 0x85, 0, 0, 0, 0, 1]);
        assert!(matches!(
            decoder.peek_length(),
            Err(LdapError::InvalidLengthEncoding { count: 5 })
        ));

        let mut decoder = decoder_with(&[SEQUENCE, 0x80]);
        assert!(matches!(
            decoder.element_available(),
            Err(LdapError::InvalidLengthEncoding { count: 0 })
        ));
    }

    #[test]
    fn test_primitive_length_violations() {
        let mut decoder = decoder_with(&[BOOLEAN, 0x02, 0xFF, 0xFF]);
        assert!(matches!(
            decoder.decode_boolean(),
            Err(LdapError::InvalidBooleanLength { length: 2 })
        ));

        let mut decoder = decoder_with(&[0x05, 0x01, 0x00]);
        assert!(matches!(
            decoder.decode_null(),
            Err(LdapError::InvalidNullLength { length: 1 })
        ));

        let mut decoder = decoder_with(&[INTEGER, 0x00]);
        assert!(matches!(
            decoder.decode_integer(),
            Err(LdapError::InvalidIntegerLength { length: 0, max: 4 })
        ));

        let five_bytes = [INTEGER, 0x05, 0x01, 0x02, 0x03, 0x04, 0x05];
        let mut decoder = decoder_with(&five_bytes);
        assert!(matches!(
            decoder.decode_integer(),
            Err(LdapError::InvalidIntegerLength { length: 5, max: 4 })
        ));
        let mut decoder = decoder_with(&five_bytes);
        assert_eq!(decoder.decode_long().unwrap(), 0x01_0203_0405);
    }

    #[test]
    fn test_integer_length_checked_before_value_arrives() {
        let mut decoder = decoder_with(&[INTEGER, 0x09]);
        assert!(matches!(
            decoder.decode_long(),
            Err(LdapError::InvalidIntegerLength { length: 9, max: 8 })
        ));
    }

    #[test]
    fn test_skip_element_resumes_at_sibling() {
        let mut data = NESTED.to_vec();
        data.extend_from_slice(&[INTEGER, 0x01, 0x07]);
        let mut decoder = decoder_with(&data);
        assert_eq!(decoder.skip_element().unwrap(), 12);
        assert_eq!(decoder.decode_integer().unwrap(), 7);

        let mut decoder = decoder_with(&data);
        decoder.decode_start_sequence().unwrap();
        assert_eq!(decoder.skip_element().unwrap(), 1);
        assert_eq!(decoder.skip_element().unwrap(), 2);
        assert_eq!(decoder.skip_element().unwrap(), 3);
        assert!(!decoder.has_next_element());
        decoder.decode_end_sequence().unwrap();
        assert_eq!(decoder.decode_integer().unwrap(), 7);
    }

    #[test]
    fn test_skip_discards_value_as_it_arrives() {
        const LENGTH: usize = 0x10_0000;
        const CHUNK: usize = 0x1_0000;
        let mut decoder = decoder_with(&[OCTET_STRING, 0x83, 0x10, 0x00, 0x00]);
        assert!(decoder.skip_element().unwrap_err().is_incomplete());
        assert_eq!(decoder.state(), CursorState::SkippingValue);

        let chunk = vec![0xEEu8; CHUNK];
        for i in 0..LENGTH / CHUNK {
            decoder.feed(&chunk);
            let result = decoder.skip_element();
            assert_eq!(decoder.buffered(), 0);
            if i + 1 < LENGTH / CHUNK {
                assert!(result.unwrap_err().is_incomplete());
            } else {
                assert_eq!(result.unwrap(), LENGTH);
            }
        }
        assert_eq!(decoder.state(), CursorState::NeedTag);
        assert_eq!(decoder.total_bytes_read(), 5 + LENGTH as u64);

        decoder.feed(&[INTEGER, 0x01, 0x07]);
        assert_eq!(decoder.decode_integer().unwrap(), 7);
    }

    #[test]
    fn test_read_after_partial_skip_finishes_it() {
        let mut decoder = decoder_with(&[OCTET_STRING, 0x04, b'a']);
        assert!(decoder.skip_element().unwrap_err().is_incomplete());
        assert!(!decoder.element_available().unwrap());
        assert!(decoder.peek_tag().unwrap_err().is_incomplete());

        decoder.feed(&[b'b', b'c', b'd', INTEGER, 0x01]);
        assert!(!decoder.element_available().unwrap());
        decoder.feed(&[0x2A]);
        assert_eq!(decoder.decode_integer().unwrap(), 42);
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_partial_skip_at_sequence_end() {
        let mut decoder = decoder_with(&[SEQUENCE, 0x05, OCTET_STRING, 0x03, b'a']);
        decoder.decode_start_sequence().unwrap();
        assert!(decoder.skip_element().unwrap_err().is_incomplete());
        assert!(!decoder.has_next_element());

        decoder.feed(b"bc");
        assert_eq!(decoder.peek_tag().unwrap(), None);
        decoder.decode_end_sequence().unwrap();
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_end_sequence_during_partial_skip() {
        let mut data = NESTED.to_vec();
        data.extend_from_slice(&[INTEGER, 0x01, 0x07]);
        let mut decoder = decoder_with(&data[..8]);

        decoder.decode_start_sequence().unwrap();
        decoder.decode_integer().unwrap();
        // "ab" has only its first value byte buffered
        assert!(decoder.skip_element().unwrap_err().is_incomplete());
        decoder.feed(&data[8..]);
        decoder.decode_end_sequence().unwrap();
        assert_eq!(decoder.decode_integer().unwrap(), 7);
    }

    /// Encodes one element of every kind, each followed by INTEGER 99
    fn every_kind_of_element() -> Vec<(&'static str, Vec<u8>)> {
        fn encoded(build: impl FnOnce(&mut BerEncoder)) -> Vec<u8> {
            let mut encoder = BerEncoder::new();
            build(&mut encoder);
            encoder.encode_integer(99).unwrap();
            encoder.take_output().unwrap().to_vec()
        }

        vec![
            ("boolean", encoded(|e| e.encode_boolean(true).unwrap())),
            ("integer", encoded(|e| e.encode_long(-1 << 40).unwrap())),
            ("enumerated", encoded(|e| e.encode_enumerated(3).unwrap())),
            ("null", encoded(|e| e.encode_null().unwrap())),
            ("octet string", encoded(|e| e.encode_octet_string(vec![1u8; 200]).unwrap())),
            ("context primitive", encoded(|e| e.encode_octet_string_with_tag(0x80, "pw").unwrap())),
            (
                "sequence",
                encoded(|e| {
                    e.encode_start_sequence().unwrap();
                    e.encode_integer(1).unwrap();
                    e.encode_start_sequence().unwrap();
                    e.encode_null().unwrap();
                    e.encode_end_sequence().unwrap();
                    e.encode_end_sequence().unwrap();
                }),
            ),
            (
                "set",
                encoded(|e| {
                    e.encode_start_set().unwrap();
                    e.encode_octet_string("x").unwrap();
                    e.encode_octet_string("y").unwrap();
                    e.encode_end_set().unwrap();
                }),
            ),
            (
                "context constructed",
                encoded(|e| {
                    e.encode_start_sequence_with_tag(0xA3).unwrap();
                    e.encode_octet_string("PLAIN").unwrap();
                    e.encode_end_sequence().unwrap();
                }),
            ),
            (
                "empty sequence",
                encoded(|e| {
                    e.encode_start_sequence().unwrap();
                    e.encode_end_sequence().unwrap();
                }),
            ),
        ]
    }

    #[test]
    fn test_skip_every_kind_of_element() {
        for (kind, data) in every_kind_of_element() {
            let mut decoder = decoder_with(&data);
            let expected = decoder.peek_length().unwrap().unwrap();
            assert_eq!(decoder.skip_element().unwrap(), expected, "{}", kind);
            assert_eq!(decoder.decode_integer().unwrap(), 99, "{}", kind);
            assert!(decoder.is_idle(), "{}", kind);
        }
    }

    #[test]
    fn test_skip_every_kind_of_element_byte_by_byte() {
        for (kind, data) in every_kind_of_element() {
            let mut decoder = BerDecoder::default();
            let mut bytes = data.iter();
            let skipped = loop {
                match decoder.skip_element() {
                    Ok(n) => break n,
                    Err(e) if e.is_incomplete() => {
                        let byte = bytes.next().expect("element ended early");
                        decoder.feed(&[*byte]);
                    }
                    Err(e) => panic!("{}: {:?}", kind, e),
                }
                assert!(decoder.buffered() <= 1, "{}", kind);
            };
            // everything but the trailing INTEGER 99 was consumed
            assert_eq!(decoder.total_bytes_read(), data.len() as u64 - 3, "{}", kind);
            assert_eq!(decoder.state(), CursorState::NeedTag, "{}", kind);
            assert!(skipped < data.len(), "{}", kind);

            let rest: Vec<u8> = bytes.copied().collect();
            decoder.feed(&rest);
            assert_eq!(decoder.decode_integer().unwrap(), 99, "{}", kind);
        }
    }

    #[test]
    fn test_round_trip_set_nested_in_sequences() {
        let mut encoder = BerEncoder::new();
        encoder.encode_start_sequence().unwrap();
        encoder.encode_integer(1).unwrap();
        encoder.encode_start_sequence().unwrap();
        encoder.encode_octet_string("cn").unwrap();
        encoder.encode_start_set().unwrap();
        encoder.encode_octet_string("alice").unwrap();
        encoder.encode_octet_string("bob").unwrap();
        encoder.encode_end_set().unwrap();
        encoder.encode_end_sequence().unwrap();
        encoder.encode_boolean(false).unwrap();
        encoder.encode_end_sequence().unwrap();

        let mut decoder = decoder_with(&encoder.take_output().unwrap());
        assert_eq!(decoder.decode_start_sequence().unwrap(), SEQUENCE);
        assert_eq!(decoder.decode_integer().unwrap(), 1);
        assert_eq!(decoder.decode_start_sequence().unwrap(), SEQUENCE);
        assert_eq!(decoder.decode_octet_string_as_string().unwrap(), "cn");
        assert_eq!(decoder.decode_start_set().unwrap(), SET);
        assert_eq!(decoder.depth(), 3);
        let mut values = Vec::new();
        while decoder.has_next_element() {
            values.push(decoder.decode_octet_string_as_string().unwrap());
        }
        assert_eq!(values, ["alice", "bob"]);
        decoder.decode_end_set().unwrap();
        assert!(!decoder.has_next_element());
        decoder.decode_end_sequence().unwrap();
        assert!(!decoder.decode_boolean().unwrap());
        decoder.decode_end_sequence().unwrap();
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_skip_after_peek() {
        let mut decoder = decoder_with(&[0x05, 0x00, 0x0A, 0x01, 0x02, 0x01, 0x01, 0x00]);
        assert_eq!(decoder.peek_tag().unwrap(), Some(0x05));
        decoder.skip_element().unwrap();
        assert_eq!(decoder.peek_length().unwrap(), Some(1));
        decoder.skip_element().unwrap();
        assert!(!decoder.decode_boolean().unwrap());
    }

    #[test]
    fn test_end_sequence_drains_unread_elements() {
        let mut data = NESTED.to_vec();
        data.extend_from_slice(&[INTEGER, 0x01, 0x07]);
        let mut decoder = decoder_with(&data);

        decoder.decode_start_sequence().unwrap();
        assert_eq!(decoder.decode_integer().unwrap(), 5);
        decoder.decode_end_sequence().unwrap();
        assert_eq!(decoder.depth(), 0);
        assert_eq!(decoder.decode_integer().unwrap(), 7);
    }

    #[test]
    fn test_end_sequence_drain_resumes() {
        let mut data = NESTED.to_vec();
        data.extend_from_slice(&[INTEGER, 0x01, 0x07]);
        let mut decoder = decoder_with(&data[..7]);

        decoder.decode_start_sequence().unwrap();
        decoder.decode_integer().unwrap();
        assert!(decoder.decode_end_sequence().unwrap_err().is_incomplete());
        assert_eq!(decoder.depth(), 1);

        decoder.feed(&data[7..]);
        decoder.decode_end_sequence().unwrap();
        assert_eq!(decoder.depth(), 0);
        assert_eq!(decoder.decode_integer().unwrap(), 7);
    }

    #[test]
    fn test_end_sequence_after_peek_discards_child() {
        let mut decoder = decoder_with(&NESTED);
        decoder.decode_start_sequence().unwrap();
        assert_eq!(decoder.peek_length().unwrap(), Some(1));
        decoder.decode_end_sequence().unwrap();
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_unbalanced_end_sequence() {
        let mut decoder = decoder_with(&NESTED);
        assert!(matches!(
            decoder.decode_end_sequence(),
            Err(LdapError::UnbalancedSequence)
        ));
    }

    #[test]
    fn test_peek_keeps_progress() {
        let mut decoder = decoder_with(&[OCTET_STRING]);
        assert_eq!(decoder.peek_tag().unwrap(), Some(OCTET_STRING));
        assert_eq!(decoder.peek_tag().unwrap(), Some(OCTET_STRING));
        assert!(decoder.peek_length().unwrap_err().is_incomplete());

        decoder.feed(&[0x02]);
        assert_eq!(decoder.peek_length().unwrap(), Some(2));
        assert!(!decoder.element_available().unwrap());

        decoder.feed(b"ab");
        assert_eq!(decoder.decode_octet_string().unwrap().as_ref(), b"ab");
        assert!(!decoder.has_next_element());
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_peek_at_sequence_end() {
        let mut decoder = decoder_with(&[0x30, 0x03, 0x01, 0x01, 0xFF]);
        decoder.decode_start_sequence().unwrap();
        assert!(decoder.decode_boolean().unwrap());
        assert_eq!(decoder.peek_tag().unwrap(), None);
        assert_eq!(decoder.peek_length().unwrap(), None);
        assert!(!decoder.element_available().unwrap());
        assert!(!decoder.has_next_element());
        decoder.decode_end_sequence().unwrap();
    }

    #[test]
    fn test_decode_element_with_context_tag() {
        let mut decoder = decoder_with(&[0x80, 0x03, b'a', b'b', b'c']);
        let (tag, value) = decoder.decode_element().unwrap();
        assert_eq!(tag, 0x80);
        assert_eq!(value.as_ref(), b"abc");
    }

    #[test]
    fn test_octet_string_as_string() {
        let mut decoder = decoder_with(&[OCTET_STRING, 0x03, b'c', b'=', b'x']);
        assert_eq!(decoder.decode_octet_string_as_string().unwrap(), "c=x");

        let mut decoder = decoder_with(&[OCTET_STRING, 0x02, 0xC3, 0x28]);
        assert!(matches!(
            decoder.decode_octet_string_as_string(),
            Err(LdapError::InvalidData(_))
        ));
    }

    #[test]
    fn test_set_is_decoded_like_sequence() {
        let mut decoder = decoder_with(&[0x31, 0x03, 0x02, 0x01, 0x2A]);
        assert_eq!(decoder.decode_start_set().unwrap(), SET);
        assert_eq!(decoder.decode_enumerated().unwrap(), 42);
        decoder.decode_end_set().unwrap();
    }

    #[test]
    fn test_round_trip_primitives() {
        let longs = [
            0,
            -1,
            1,
            127,
            128,
            -128,
            -129,
            255,
            256,
            i32::MAX as i64,
            i32::MIN as i64,
            1 << 40,
            -(1 << 40),
            i64::MAX,
            i64::MIN,
        ];
        let long_string = vec![0xA5u8; 2000];

        let mut encoder = BerEncoder::new();
        encoder.encode_boolean(true).unwrap();
        encoder.encode_boolean(false).unwrap();
        for value in longs {
            encoder.encode_long(value).unwrap();
        }
        encoder.encode_integer(i32::MIN).unwrap();
        encoder.encode_null().unwrap();
        encoder.encode_octet_string(b"").unwrap();
        encoder.encode_octet_string(&long_string).unwrap();
        encoder.encode_enumerated(3).unwrap();

        let mut decoder = decoder_with(&encoder.take_output().unwrap());
        assert!(decoder.decode_boolean().unwrap());
        assert!(!decoder.decode_boolean().unwrap());
        for value in longs {
            assert_eq!(decoder.decode_long().unwrap(), value);
        }
        assert_eq!(decoder.decode_integer().unwrap(), i32::MIN);
        decoder.decode_null().unwrap();
        assert!(decoder.decode_octet_string().unwrap().is_empty());
        assert_eq!(decoder.decode_octet_string().unwrap().as_ref(), long_string.as_slice());
        assert_eq!(decoder.decode_enumerated().unwrap(), 3);
        assert!(decoder.is_idle());
    }

    #[test]
    fn test_round_trip_deep_nesting() {
        const DEPTH: i32 = 6;
        let mut encoder = BerEncoder::new();
        for level in 0..DEPTH {
            encoder.encode_start_sequence().unwrap();
            encoder.encode_integer(level).unwrap();
        }
        encoder.encode_octet_string(vec![1u8; 300]).unwrap();
        for _ in 0..DEPTH {
            encoder.encode_end_sequence().unwrap();
        }

        let mut decoder = decoder_with(&encoder.take_output().unwrap());
        for level in 0..DEPTH {
            decoder.decode_start_sequence().unwrap();
            assert_eq!(decoder.decode_integer().unwrap(), level);
        }
        assert_eq!(decoder.decode_octet_string().unwrap().len(), 300);
        for _ in 0..DEPTH {
            assert!(!decoder.has_next_element());
            decoder.decode_end_sequence().unwrap();
        }
        assert!(decoder.is_idle());
        assert_eq!(decoder.frames.pooled(), DEPTH as usize);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut decoder = decoder_with(&NESTED[..5]);
        decoder.decode_start_sequence().unwrap();
        decoder.reset();
        assert!(decoder.is_idle());
        assert_eq!(decoder.total_bytes_read(), 0);
    }
}
