//! BER codec bound to a transport
//!
//! [`BerStream`] wraps the sans-io [`BerDecoder`] and [`BerEncoder`] around a
//! [`StreamAccessor`]. Every decode operation runs the decoder and, while it
//! reports [`LdapError::Incomplete`], has the transport append another chunk
//! straight onto the decoder's input buffer and retries. The decoder keeps its header state between attempts, so
//! fragments of any size are handled.

use crate::ber::decoder::{BerDecoder, BerDecoderSettings};
use crate::ber::encoder::BerEncoder;
use crate::error::{LdapError, LdapResult};
use bytes::Bytes;
use ldap_transport::StreamAccessor;

/// Default number of bytes requested from the transport per read
pub const DEFAULT_READ_CHUNK_SIZE: usize = 8192;

/// BER decoder and encoder driving a transport
#[derive(Debug)]
pub struct BerStream<S: StreamAccessor> {
    transport: S,
    decoder: BerDecoder,
    encoder: BerEncoder,
    chunk_size: usize,
}

impl<S: StreamAccessor> BerStream<S> {
    /// Create a stream over `transport`
    pub fn new(transport: S, settings: BerDecoderSettings) -> Self {
        Self::with_chunk_size(transport, settings, DEFAULT_READ_CHUNK_SIZE)
    }

    /// Create a stream reading at most `chunk_size` bytes per transport read
    pub fn with_chunk_size(transport: S, settings: BerDecoderSettings, chunk_size: usize) -> Self {
        Self {
            transport,
            decoder: BerDecoder::new(settings),
            encoder: BerEncoder::new(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Get a reference to the transport
    pub fn transport(&self) -> &S {
        &self.transport
    }

    /// Get a mutable reference to the transport
    pub fn transport_mut(&mut self) -> &mut S {
        &mut self.transport
    }

    /// Get a reference to the decoder
    pub fn decoder(&self) -> &BerDecoder {
        &self.decoder
    }

    /// Get a mutable reference to the decoder
    pub fn decoder_mut(&mut self) -> &mut BerDecoder {
        &mut self.decoder
    }

    /// Get a mutable reference to the encoder
    pub fn encoder(&mut self) -> &mut BerEncoder {
        &mut self.encoder
    }

    /// Consume the stream, returning the transport
    pub fn into_inner(self) -> S {
        self.transport
    }

    /// Read one chunk from the transport into the decoder
    ///
    /// # Returns
    /// The number of bytes read, 0 on EOF.
    pub async fn fill(&mut self) -> LdapResult<usize> {
        let n = self
            .transport
            .read_into(self.decoder.input_mut(), self.chunk_size)
            .await?;
        if n > 0 {
            log::trace!("Fed {} bytes, {} buffered", n, self.decoder.buffered());
        }
        Ok(n)
    }

    /// Run `op` until it stops reporting `Incomplete`
    async fn drive<T, F>(&mut self, mut op: F) -> LdapResult<T>
    where
        F: FnMut(&mut BerDecoder) -> LdapResult<T>,
    {
        loop {
            match op(&mut self.decoder) {
                Err(LdapError::Incomplete) => {
                    if self.fill().await? == 0 {
                        return Err(truncated());
                    }
                }
                result => return result,
            }
        }
    }

    /// Wait until the next element is completely buffered
    ///
    /// Returns `false` at the end of the current sequence, or when the
    /// transport reaches EOF cleanly between two root level elements.
    pub async fn wait_for_element(&mut self) -> LdapResult<bool> {
        loop {
            if self.decoder.element_available()? {
                return Ok(true);
            }
            if self.decoder.depth() > 0 && !self.decoder.has_next_element() {
                return Ok(false);
            }
            if self.fill().await? == 0 {
                return if self.decoder.is_idle() {
                    Ok(false)
                } else {
                    Err(truncated())
                };
            }
        }
    }

    /// Tag of the next element
    ///
    /// Returns `None` at the end of the current sequence, or on a clean EOF
    /// between two root level elements.
    pub async fn peek_tag(&mut self) -> LdapResult<Option<u8>> {
        loop {
            match self.decoder.peek_tag() {
                Err(LdapError::Incomplete) => {
                    if self.fill().await? == 0 {
                        return if self.decoder.is_idle() {
                            Ok(None)
                        } else {
                            Err(truncated())
                        };
                    }
                }
                result => return result,
            }
        }
    }

    /// Declared length of the next element
    pub async fn peek_length(&mut self) -> LdapResult<Option<usize>> {
        self.drive(BerDecoder::peek_length).await
    }

    /// Whether another element follows in the current sequence
    ///
    /// At the root level this waits for the first byte of the next element
    /// and reports `false` on a clean EOF.
    pub async fn has_next_element(&mut self) -> LdapResult<bool> {
        if self.decoder.depth() > 0 {
            return Ok(self.decoder.has_next_element());
        }
        Ok(self.peek_tag().await?.is_some())
    }

    /// Decode a BOOLEAN
    pub async fn decode_boolean(&mut self) -> LdapResult<bool> {
        self.drive(BerDecoder::decode_boolean).await
    }

    /// Decode a 32-bit INTEGER
    pub async fn decode_integer(&mut self) -> LdapResult<i32> {
        self.drive(BerDecoder::decode_integer).await
    }

    /// Decode a 64-bit INTEGER
    pub async fn decode_long(&mut self) -> LdapResult<i64> {
        self.drive(BerDecoder::decode_long).await
    }

    /// Decode an ENUMERATED value
    pub async fn decode_enumerated(&mut self) -> LdapResult<i32> {
        self.drive(BerDecoder::decode_enumerated).await
    }

    /// Decode a NULL
    pub async fn decode_null(&mut self) -> LdapResult<()> {
        self.drive(BerDecoder::decode_null).await
    }

    /// Decode an OCTET STRING
    pub async fn decode_octet_string(&mut self) -> LdapResult<Bytes> {
        self.drive(BerDecoder::decode_octet_string).await
    }

    /// Decode an OCTET STRING holding UTF-8 text
    pub async fn decode_octet_string_as_string(&mut self) -> LdapResult<String> {
        self.drive(BerDecoder::decode_octet_string_as_string).await
    }

    /// Decode any element as its tag and raw value bytes
    pub async fn decode_element(&mut self) -> LdapResult<(u8, Bytes)> {
        self.drive(BerDecoder::decode_element).await
    }

    /// Skip the next element
    pub async fn skip_element(&mut self) -> LdapResult<usize> {
        self.drive(BerDecoder::skip_element).await
    }

    /// Open a SEQUENCE
    pub async fn decode_start_sequence(&mut self) -> LdapResult<u8> {
        self.drive(BerDecoder::decode_start_sequence).await
    }

    /// Close the innermost SEQUENCE, draining its unread remainder
    pub async fn decode_end_sequence(&mut self) -> LdapResult<()> {
        self.drive(BerDecoder::decode_end_sequence).await
    }

    /// Open a SET
    pub async fn decode_start_set(&mut self) -> LdapResult<u8> {
        self.drive(BerDecoder::decode_start_set).await
    }

    /// Close the innermost SET
    pub async fn decode_end_set(&mut self) -> LdapResult<()> {
        self.drive(BerDecoder::decode_end_set).await
    }

    /// Write everything encoded so far to the transport
    pub async fn flush(&mut self) -> LdapResult<()> {
        let output = self.encoder.take_output()?;
        if !output.is_empty() {
            self.transport.write_all(&output).await?;
            log::trace!("Wrote {} bytes", output.len());
        }
        self.transport.flush().await
    }

    /// Close the transport
    pub async fn close(&mut self) -> LdapResult<()> {
        self.transport.close().await
    }
}

fn truncated() -> LdapError {
    LdapError::Transport(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "Connection closed in the middle of a BER element",
    ))
}
