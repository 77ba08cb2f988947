//! In-memory transport
//!
//! Incoming data is scripted as a queue of chunks. Each `read_into` call
//! delivers at most one chunk (or the part of it within the caller's limit), which
//! reproduces the arbitrary fragmentation of a real socket. Written bytes are
//! captured for inspection.

use crate::error::{LdapError, LdapResult};
use crate::stream::{StreamAccessor, TransportLayer};
use async_trait::async_trait;
use bytes::BytesMut;
use std::collections::VecDeque;
use std::time::Duration;

/// In-memory transport replaying scripted incoming fragments
#[derive(Debug, Default)]
pub struct MemoryTransport {
    incoming: VecDeque<Vec<u8>>,
    outgoing: Vec<u8>,
    timeout: Option<Duration>,
    closed: bool,
    reads: usize,
}

impl MemoryTransport {
    /// Create an open transport with nothing to read
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an open transport that will deliver `chunks` in order
    pub fn with_chunks<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Vec<u8>>,
    {
        let mut transport = Self::new();
        for chunk in chunks {
            transport.push_incoming(chunk);
        }
        transport
    }

    /// Create an open transport delivering `data` one byte per read
    pub fn byte_by_byte(data: &[u8]) -> Self {
        Self::with_chunks(data.iter().map(|b| vec![*b]))
    }

    /// Queue another incoming chunk; empty chunks are ignored
    pub fn push_incoming(&mut self, chunk: impl Into<Vec<u8>>) {
        let chunk = chunk.into();
        if !chunk.is_empty() {
            self.incoming.push_back(chunk);
        }
    }

    /// Number of bytes still waiting to be read
    pub fn pending(&self) -> usize {
        self.incoming.iter().map(Vec::len).sum()
    }

    /// Number of `read_into` calls that returned data
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Bytes written so far
    pub fn written(&self) -> &[u8] {
        &self.outgoing
    }

    /// Take the bytes written so far
    pub fn take_written(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.outgoing)
    }

    /// Configured timeout (recorded, not enforced)
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn ensure_open(&self) -> LdapResult<()> {
        if self.closed {
            return Err(LdapError::Transport(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Memory transport is closed",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TransportLayer for MemoryTransport {
    async fn open(&mut self) -> LdapResult<()> {
        self.closed = false;
        Ok(())
    }
}

#[async_trait]
impl StreamAccessor for MemoryTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> LdapResult<()> {
        self.timeout = timeout;
        Ok(())
    }

    async fn read_into(&mut self, buf: &mut BytesMut, max: usize) -> LdapResult<usize> {
        self.ensure_open()?;
        if max == 0 {
            return Ok(0);
        }
        let Some(mut chunk) = self.incoming.pop_front() else {
            return Ok(0);
        };

        let n = chunk.len().min(max);
        buf.extend_from_slice(&chunk[..n]);
        if n < chunk.len() {
            let rest = chunk.split_off(n);
            self.incoming.push_front(rest);
        }
        self.reads += 1;
        log::trace!("Memory transport delivered {} bytes", n);
        Ok(n)
    }

    async fn write_all(&mut self, data: &[u8]) -> LdapResult<()> {
        self.ensure_open()?;
        self.outgoing.extend_from_slice(data);
        Ok(())
    }

    async fn flush(&mut self) -> LdapResult<()> {
        self.ensure_open()
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> LdapResult<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_follow_chunk_boundaries() {
        let mut transport = MemoryTransport::with_chunks([vec![1, 2, 3], vec![4]]);
        let mut buf = BytesMut::new();

        assert_eq!(transport.read_into(&mut buf, 8).await.unwrap(), 3);
        assert_eq!(&buf[..], &[1, 2, 3]);
        assert_eq!(transport.read_into(&mut buf, 8).await.unwrap(), 1);
        assert_eq!(&buf[..], &[1, 2, 3, 4]);
        assert_eq!(transport.read_into(&mut buf, 8).await.unwrap(), 0);
        assert_eq!(transport.reads(), 2);
    }

    #[tokio::test]
    async fn test_limit_keeps_remainder() {
        let mut transport = MemoryTransport::with_chunks([vec![1, 2, 3, 4, 5]]);
        let mut buf = BytesMut::from(&[9u8][..]);

        assert_eq!(transport.read_into(&mut buf, 2).await.unwrap(), 2);
        assert_eq!(transport.pending(), 3);
        assert_eq!(&buf[..], &[9, 1, 2]);

        assert_eq!(transport.read_into(&mut buf, 0).await.unwrap(), 0);
        assert_eq!(transport.pending(), 3);

        assert_eq!(transport.read_into(&mut buf, 16).await.unwrap(), 3);
        assert_eq!(&buf[..], &[9, 1, 2, 3, 4, 5]);
        assert_eq!(transport.pending(), 0);
    }

    #[tokio::test]
    async fn test_writes_are_captured() {
        let mut transport = MemoryTransport::new();
        transport.write_all(b"abc").await.unwrap();
        transport.write_all(b"de").await.unwrap();
        transport.flush().await.unwrap();
        assert_eq!(transport.written(), b"abcde");
        assert_eq!(transport.take_written(), b"abcde".to_vec());
        assert!(transport.written().is_empty());
    }

    #[tokio::test]
    async fn test_closed_transport_rejects_io() {
        let mut transport = MemoryTransport::new();
        transport.close().await.unwrap();
        assert!(transport.is_closed());
        assert!(transport.write_all(b"x").await.is_err());
        let mut buf = BytesMut::new();
        assert!(transport.read_into(&mut buf, 1).await.is_err());

        transport.open().await.unwrap();
        assert!(transport.write_all(b"x").await.is_ok());
    }
}
