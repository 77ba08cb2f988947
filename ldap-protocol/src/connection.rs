//! Message exchange over a transport
//!
//! [`LdapConnection`] encodes outgoing messages straight into the stream's
//! encoder and decodes incoming ones once the whole envelope is buffered.
//! Message IDs are allocated from 1 to `i32::MAX` and wrap back to 1.

use crate::control::Control;
use crate::error::LdapResult;
use crate::message::{LdapMessage, ProtocolOp};
use ldap_asn1::ber::DEFAULT_READ_CHUNK_SIZE;
use ldap_asn1::{BerDecoderSettings, BerStream};
use ldap_transport::StreamAccessor;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default upper bound for a single incoming message (16 MiB)
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Largest accepted message, 0 = unlimited
    pub max_message_size: usize,
    /// Transport timeout applied when the connection is created
    pub timeout: Option<Duration>,
    /// Bytes requested from the transport per read
    pub read_chunk_size: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            timeout: Some(Duration::from_secs(30)),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

/// LDAP connection over a byte transport
#[derive(Debug)]
pub struct LdapConnection<S: StreamAccessor> {
    stream: BerStream<S>,
    settings: ConnectionSettings,
    next_id: i32,
}

impl<S: StreamAccessor> LdapConnection<S> {
    /// Create a connection, applying the configured transport timeout
    pub async fn new(mut transport: S, settings: ConnectionSettings) -> LdapResult<Self> {
        transport.set_timeout(settings.timeout).await?;
        let stream = BerStream::with_chunk_size(
            transport,
            BerDecoderSettings::new(settings.max_message_size),
            settings.read_chunk_size,
        );
        Ok(Self {
            stream,
            settings,
            next_id: 1,
        })
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Get a reference to the transport
    pub fn transport(&self) -> &S {
        self.stream.transport()
    }

    /// Allocate the next message ID
    pub fn next_message_id(&mut self) -> i32 {
        let id = self.next_id;
        self.next_id = if id == i32::MAX { 1 } else { id + 1 };
        id
    }

    /// Encode and write a message
    ///
    /// On failure nothing of `message` stays in the encoder, so the next
    /// send starts from an empty buffer.
    pub async fn send(&mut self, message: &LdapMessage) -> LdapResult<()> {
        if let Err(e) = self.encode_and_flush(message).await {
            log::warn!("Failed to send message {}: {}", message.message_id, e);
            self.stream.encoder().clear();
            return Err(e);
        }
        log::debug!(
            "Sent message {} (op 0x{:02X}, {} controls)",
            message.message_id,
            message.op.tag(),
            message.controls.len()
        );
        Ok(())
    }

    async fn encode_and_flush(&mut self, message: &LdapMessage) -> LdapResult<()> {
        message.encode(self.stream.encoder())?;
        self.stream.flush().await
    }

    /// Send `op` under a freshly allocated message ID
    ///
    /// # Returns
    /// The message ID used.
    pub async fn request(&mut self, op: ProtocolOp, controls: Vec<Control>) -> LdapResult<i32> {
        let message_id = self.next_message_id();
        let message = LdapMessage::new(message_id, op).with_controls(controls);
        self.send(&message).await?;
        Ok(message_id)
    }

    /// Receive the next message
    ///
    /// Returns `None` when the peer closed the connection between messages.
    pub async fn receive(&mut self) -> LdapResult<Option<LdapMessage>> {
        if !self.stream.wait_for_element().await? {
            log::debug!("Connection closed by peer");
            return Ok(None);
        }
        let message = LdapMessage::decode(self.stream.decoder_mut())?;
        log::debug!(
            "Received message {} (op 0x{:02X})",
            message.message_id,
            message.op.tag()
        );
        Ok(Some(message))
    }

    /// Send an unbind request and close the transport
    pub async fn unbind(&mut self) -> LdapResult<()> {
        self.request(ProtocolOp::UnbindRequest, Vec::new()).await?;
        self.close().await
    }

    /// Close the transport
    pub async fn close(&mut self) -> LdapResult<()> {
        self.stream.close().await
    }

    /// Consume the connection, returning the transport
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }
}
