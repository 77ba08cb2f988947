//! Byte stream abstraction consumed by the BER codec
//!
//! The codec never needs exact-size reads: its decoder accepts whatever
//! fragment arrives and asks for more until an element is complete. A
//! transport therefore only appends "whatever is available, up to a limit"
//! to the decoder's own input buffer, which saves a copy through an
//! intermediate chunk. Writes always hand over one fully encoded message.

use crate::error::LdapResult;
use async_trait::async_trait;
use bytes::BytesMut;
use std::time::Duration;

/// Bidirectional byte stream to a directory peer
#[async_trait]
pub trait StreamAccessor: Send + Sync {
    /// Set the timeout applied to each read and write
    ///
    /// `None` waits forever.
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> LdapResult<()>;

    /// Append the next available bytes to `buf`
    ///
    /// # Arguments
    /// * `buf` - Buffer to append to; existing content is left untouched
    /// * `max` - Upper bound on the number of bytes appended
    ///
    /// # Returns
    /// Number of bytes appended, 0 once the peer has closed the stream.
    async fn read_into(&mut self, buf: &mut BytesMut, max: usize) -> LdapResult<usize>;

    /// Write all of `data`
    async fn write_all(&mut self, data: &[u8]) -> LdapResult<()>;

    /// Push written data to the peer
    async fn flush(&mut self) -> LdapResult<()>;

    fn is_closed(&self) -> bool;

    /// Shut the stream down; later reads and writes fail
    async fn close(&mut self) -> LdapResult<()>;
}

/// Transport that must be connected before use
#[async_trait]
pub trait TransportLayer: StreamAccessor {
    /// Connect to the configured peer
    async fn open(&mut self) -> LdapResult<()>;
}
