//! TCP transport implementation

use crate::error::{LdapError, LdapResult};
use crate::stream::{StreamAccessor, TransportLayer};
use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Well-known LDAP port
pub const DEFAULT_LDAP_PORT: u16 = 389;

/// Wrapper for TcpStream that implements Debug
struct DebugTcpStream(TcpStream);

impl fmt::Debug for DebugTcpStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpStream")
            .field("peer", &self.0.peer_addr().ok())
            .finish()
    }
}

impl Deref for DebugTcpStream {
    type Target = TcpStream;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DebugTcpStream {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// TCP transport layer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpSettings {
    pub address: SocketAddr,
    pub timeout: Option<Duration>,
}

impl TcpSettings {
    /// Create new TCP settings with a 30 second timeout
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Create TCP settings with timeout
    pub fn with_timeout(address: SocketAddr, timeout: Duration) -> Self {
        Self {
            address,
            timeout: Some(timeout),
        }
    }
}

/// TCP transport layer implementation
#[derive(Debug)]
pub struct TcpTransport {
    stream: Option<DebugTcpStream>,
    settings: TcpSettings,
    closed: bool,
}

impl TcpTransport {
    /// Create a new TCP transport layer
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
            closed: true,
        }
    }

    /// Create TCP transport from an address string such as `"127.0.0.1:389"`
    pub fn from_address(address: &str) -> LdapResult<Self> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| LdapError::InvalidData(format!("Invalid TCP address: {}", e)))?;
        Ok(Self::new(TcpSettings::new(addr)))
    }

    /// Create TCP transport from an already-connected TcpStream (for server use)
    ///
    /// # Arguments
    /// * `stream` - The already-connected TCP stream
    /// * `timeout` - Optional read/write timeout
    pub fn from_connected_stream(stream: TcpStream, timeout: Option<Duration>) -> LdapResult<Self> {
        let address = stream.peer_addr()?;
        Ok(Self {
            stream: Some(DebugTcpStream(stream)),
            settings: TcpSettings { address, timeout },
            closed: false,
        })
    }

    /// Get the transport settings
    pub fn settings(&self) -> &TcpSettings {
        &self.settings
    }

    fn stream_mut(&mut self) -> LdapResult<&mut DebugTcpStream> {
        self.stream.as_mut().ok_or_else(|| {
            LdapError::Transport(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "TCP stream not connected",
            ))
        })
    }
}

#[async_trait]
impl TransportLayer for TcpTransport {
    async fn open(&mut self) -> LdapResult<()> {
        if !self.closed {
            return Err(LdapError::Transport(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        // Apply timeout to connection establishment if specified
        let stream = if let Some(timeout) = self.settings.timeout {
            tokio::time::timeout(timeout, TcpStream::connect(self.settings.address))
                .await
                .map_err(|_| LdapError::Timeout)??
        } else {
            TcpStream::connect(self.settings.address).await?
        };
        stream.set_nodelay(true)?;
        log::debug!("Connected to {}", self.settings.address);

        self.stream = Some(DebugTcpStream(stream));
        self.closed = false;
        Ok(())
    }
}

#[async_trait]
impl StreamAccessor for TcpTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> LdapResult<()> {
        self.settings.timeout = timeout;
        Ok(())
    }

    async fn read_into(&mut self, buf: &mut BytesMut, max: usize) -> LdapResult<usize> {
        if max == 0 {
            return Ok(0);
        }
        let timeout = self.settings.timeout;
        let stream = self.stream_mut()?;

        buf.reserve(max);
        let mut limited = (&mut *buf).limit(max);
        let result = if let Some(timeout) = timeout {
            tokio::time::timeout(timeout, stream.read_buf(&mut limited))
                .await
                .map_err(|_| LdapError::Timeout)?
                .map_err(LdapError::Transport)
        } else {
            stream.read_buf(&mut limited).await.map_err(LdapError::Transport)
        };

        match result {
            Ok(0) => {
                self.closed = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.closed = true;
                Err(e)
            }
        }
    }

    async fn write_all(&mut self, data: &[u8]) -> LdapResult<()> {
        let timeout = self.settings.timeout;
        let stream = self.stream_mut()?;

        if let Some(timeout) = timeout {
            tokio::time::timeout(timeout, stream.write_all(data))
                .await
                .map_err(|_| LdapError::Timeout)?
                .map_err(LdapError::Transport)
        } else {
            stream.write_all(data).await.map_err(LdapError::Transport)
        }
    }

    async fn flush(&mut self) -> LdapResult<()> {
        let stream = self.stream_mut()?;
        stream.flush().await.map_err(LdapError::Transport)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> LdapResult<()> {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_tcp_settings() {
        let addr: SocketAddr = "127.0.0.1:389".parse().unwrap();
        let settings = TcpSettings::new(addr);
        assert_eq!(settings.address, addr);
        assert!(settings.timeout.is_some());
        assert_eq!(addr.port(), DEFAULT_LDAP_PORT);
    }

    #[test]
    fn test_invalid_address() {
        let err = TcpTransport::from_address("not an address").unwrap_err();
        assert!(matches!(err, LdapError::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_read_before_open_fails() {
        let mut transport = TcpTransport::from_address("127.0.0.1:389").unwrap();
        let mut buf = BytesMut::new();
        assert!(transport.is_closed());
        assert!(matches!(
            transport.read_into(&mut buf, 4).await,
            Err(LdapError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_echo_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut transport =
                TcpTransport::from_connected_stream(stream, Some(Duration::from_secs(5))).unwrap();
            let mut buf = BytesMut::new();
            while buf.len() < 5 {
                let want = 5 - buf.len();
                let n = transport.read_into(&mut buf, want).await.unwrap();
                assert!(n > 0);
            }
            transport.write_all(&buf).await.unwrap();
            transport.flush().await.unwrap();
        });

        let mut client = TcpTransport::new(TcpSettings::with_timeout(addr, Duration::from_secs(5)));
        client.open().await.unwrap();
        assert!(!client.is_closed());
        client.write_all(&[0x30, 0x03, 0x02, 0x01, 0x05]).await.unwrap();
        client.flush().await.unwrap();

        let mut echoed = BytesMut::from(&[0xFFu8][..]);
        while echoed.len() < 6 {
            let n = client.read_into(&mut echoed, 64).await.unwrap();
            assert!(n > 0);
        }
        assert_eq!(&echoed[..], &[0xFF, 0x30, 0x03, 0x02, 0x01, 0x05]);

        // Server side is done; the next read sees end of stream
        server.await.unwrap();
        assert_eq!(client.read_into(&mut echoed, 64).await.unwrap(), 0);
        assert!(client.is_closed());
        client.close().await.unwrap();
    }
}
