//! LDAP message envelope and protocol operations
//!
//! ```text
//! LDAPMessage ::= SEQUENCE {
//!      messageID       INTEGER,
//!      protocolOp      CHOICE { ... },
//!      controls       [0] Controls OPTIONAL }
//! ```
//!
//! Only the wire shape is handled here. Values such as DNs, result codes or
//! SASL credentials are carried as-is without being interpreted.

use crate::control::{self, Control};
use crate::error::{LdapError, LdapResult};
use crate::result::OperationResult;
use bytes::Bytes;
use ldap_asn1::{BerDecoder, BerEncoder};

/// Protocol version written in bind requests
pub const LDAP_VERSION_3: i32 = 3;

/// Protocol operation tags
pub mod tags {
    pub const BIND_REQUEST: u8 = 0x60;
    pub const BIND_RESPONSE: u8 = 0x61;
    pub const UNBIND_REQUEST: u8 = 0x42;
    pub const SEARCH_RESULT_DONE: u8 = 0x65;
    pub const DELETE_REQUEST: u8 = 0x4A;
    pub const DELETE_RESPONSE: u8 = 0x6B;
    pub const ABANDON_REQUEST: u8 = 0x50;
    pub const EXTENDED_REQUEST: u8 = 0x77;
    pub const EXTENDED_RESPONSE: u8 = 0x78;

    /// Simple authentication [0]
    pub const AUTH_SIMPLE: u8 = 0x80;
    /// SASL authentication [3]
    pub const AUTH_SASL: u8 = 0xA3;
    /// serverSaslCreds [7]
    pub const SERVER_SASL_CREDS: u8 = 0x87;
    /// requestName [0]
    pub const EXTENDED_REQUEST_NAME: u8 = 0x80;
    /// requestValue [1]
    pub const EXTENDED_REQUEST_VALUE: u8 = 0x81;
    /// responseName [10]
    pub const EXTENDED_RESPONSE_NAME: u8 = 0x8A;
    /// responseValue [11]
    pub const EXTENDED_RESPONSE_VALUE: u8 = 0x8B;
}

/// Authentication choice of a bind request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindAuthentication {
    Simple(Bytes),
    Sasl {
        mechanism: String,
        credentials: Option<Bytes>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindRequest {
    pub version: i32,
    pub name: String,
    pub authentication: BindAuthentication,
}

impl BindRequest {
    /// Version 3 simple bind
    pub fn simple(name: impl Into<String>, password: impl Into<Bytes>) -> Self {
        Self {
            version: LDAP_VERSION_3,
            name: name.into(),
            authentication: BindAuthentication::Simple(password.into()),
        }
    }

    /// Version 3 SASL bind
    pub fn sasl(mechanism: impl Into<String>, credentials: Option<Bytes>) -> Self {
        Self {
            version: LDAP_VERSION_3,
            name: String::new(),
            authentication: BindAuthentication::Sasl {
                mechanism: mechanism.into(),
                credentials,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindResponse {
    pub result: OperationResult,
    pub server_sasl_creds: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedRequest {
    pub name: String,
    pub value: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedResponse {
    pub result: OperationResult,
    pub name: Option<String>,
    pub value: Option<Bytes>,
}

/// Supported protocol operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolOp {
    BindRequest(BindRequest),
    BindResponse(BindResponse),
    UnbindRequest,
    SearchResultDone(OperationResult),
    DeleteRequest(String),
    DeleteResponse(OperationResult),
    AbandonRequest(i32),
    ExtendedRequest(ExtendedRequest),
    ExtendedResponse(ExtendedResponse),
}

impl ProtocolOp {
    /// Application tag of the operation
    pub fn tag(&self) -> u8 {
        match self {
            ProtocolOp::BindRequest(_) => tags::BIND_REQUEST,
            ProtocolOp::BindResponse(_) => tags::BIND_RESPONSE,
            ProtocolOp::UnbindRequest => tags::UNBIND_REQUEST,
            ProtocolOp::SearchResultDone(_) => tags::SEARCH_RESULT_DONE,
            ProtocolOp::DeleteRequest(_) => tags::DELETE_REQUEST,
            ProtocolOp::DeleteResponse(_) => tags::DELETE_RESPONSE,
            ProtocolOp::AbandonRequest(_) => tags::ABANDON_REQUEST,
            ProtocolOp::ExtendedRequest(_) => tags::EXTENDED_REQUEST,
            ProtocolOp::ExtendedResponse(_) => tags::EXTENDED_RESPONSE,
        }
    }

    pub fn encode(&self, encoder: &mut BerEncoder) -> LdapResult<()> {
        let tag = self.tag();
        match self {
            ProtocolOp::BindRequest(request) => {
                encoder.encode_start_sequence_with_tag(tag)?;
                encoder.encode_integer(request.version)?;
                encoder.encode_octet_string(&request.name)?;
                match &request.authentication {
                    BindAuthentication::Simple(password) => {
                        encoder.encode_octet_string_with_tag(tags::AUTH_SIMPLE, password)?;
                    }
                    BindAuthentication::Sasl {
                        mechanism,
                        credentials,
                    } => {
                        encoder.encode_start_sequence_with_tag(tags::AUTH_SASL)?;
                        encoder.encode_octet_string(mechanism)?;
                        if let Some(credentials) = credentials {
                            encoder.encode_octet_string(credentials)?;
                        }
                        encoder.encode_end_sequence()?;
                    }
                }
                encoder.encode_end_sequence()
            }
            ProtocolOp::BindResponse(response) => {
                encoder.encode_start_sequence_with_tag(tag)?;
                response.result.encode_components(encoder)?;
                if let Some(creds) = &response.server_sasl_creds {
                    encoder.encode_octet_string_with_tag(tags::SERVER_SASL_CREDS, creds)?;
                }
                encoder.encode_end_sequence()
            }
            ProtocolOp::UnbindRequest => encoder.encode_null_with_tag(tag),
            ProtocolOp::SearchResultDone(result) | ProtocolOp::DeleteResponse(result) => {
                encoder.encode_start_sequence_with_tag(tag)?;
                result.encode_components(encoder)?;
                encoder.encode_end_sequence()
            }
            ProtocolOp::DeleteRequest(dn) => encoder.encode_octet_string_with_tag(tag, dn),
            ProtocolOp::AbandonRequest(id) => encoder.encode_integer_with_tag(tag, *id),
            ProtocolOp::ExtendedRequest(request) => {
                encoder.encode_start_sequence_with_tag(tag)?;
                encoder.encode_octet_string_with_tag(tags::EXTENDED_REQUEST_NAME, &request.name)?;
                if let Some(value) = &request.value {
                    encoder.encode_octet_string_with_tag(tags::EXTENDED_REQUEST_VALUE, value)?;
                }
                encoder.encode_end_sequence()
            }
            ProtocolOp::ExtendedResponse(response) => {
                encoder.encode_start_sequence_with_tag(tag)?;
                response.result.encode_components(encoder)?;
                if let Some(name) = &response.name {
                    encoder.encode_octet_string_with_tag(tags::EXTENDED_RESPONSE_NAME, name)?;
                }
                if let Some(value) = &response.value {
                    encoder.encode_octet_string_with_tag(tags::EXTENDED_RESPONSE_VALUE, value)?;
                }
                encoder.encode_end_sequence()
            }
        }
    }

    /// Decode the operation; the whole operation must be buffered
    pub fn decode(decoder: &mut BerDecoder) -> LdapResult<Self> {
        let tag = decoder
            .peek_tag()?
            .ok_or_else(|| LdapError::Protocol("Message has no protocol operation".to_string()))?;

        let op = match tag {
            tags::BIND_REQUEST => {
                decoder.decode_start_sequence()?;
                let version = decoder.decode_integer()?;
                let name = decoder.decode_octet_string_as_string()?;
                let authentication = match decoder.peek_tag()? {
                    Some(tags::AUTH_SIMPLE) => {
                        BindAuthentication::Simple(decoder.decode_octet_string()?)
                    }
                    Some(tags::AUTH_SASL) => {
                        decoder.decode_start_sequence()?;
                        let mechanism = decoder.decode_octet_string_as_string()?;
                        let credentials = if decoder.has_next_element() {
                            Some(decoder.decode_octet_string()?)
                        } else {
                            None
                        };
                        decoder.decode_end_sequence()?;
                        BindAuthentication::Sasl {
                            mechanism,
                            credentials,
                        }
                    }
                    other => {
                        return Err(LdapError::Protocol(format!(
                            "Unsupported bind authentication choice {:02X?}",
                            other
                        )));
                    }
                };
                decoder.decode_end_sequence()?;
                ProtocolOp::BindRequest(BindRequest {
                    version,
                    name,
                    authentication,
                })
            }
            tags::BIND_RESPONSE => {
                decoder.decode_start_sequence()?;
                let result = OperationResult::decode_components(decoder)?;
                let server_sasl_creds = optional_octet_string(decoder, tags::SERVER_SASL_CREDS)?;
                decoder.decode_end_sequence()?;
                ProtocolOp::BindResponse(BindResponse {
                    result,
                    server_sasl_creds,
                })
            }
            tags::UNBIND_REQUEST => {
                decoder.decode_null()?;
                ProtocolOp::UnbindRequest
            }
            tags::SEARCH_RESULT_DONE => ProtocolOp::SearchResultDone(decode_result(decoder)?),
            tags::DELETE_REQUEST => {
                ProtocolOp::DeleteRequest(decoder.decode_octet_string_as_string()?)
            }
            tags::DELETE_RESPONSE => ProtocolOp::DeleteResponse(decode_result(decoder)?),
            tags::ABANDON_REQUEST => ProtocolOp::AbandonRequest(decoder.decode_integer()?),
            tags::EXTENDED_REQUEST => {
                decoder.decode_start_sequence()?;
                let name = decoder.decode_octet_string_as_string()?;
                let value = optional_octet_string(decoder, tags::EXTENDED_REQUEST_VALUE)?;
                decoder.decode_end_sequence()?;
                ProtocolOp::ExtendedRequest(ExtendedRequest { name, value })
            }
            tags::EXTENDED_RESPONSE => {
                decoder.decode_start_sequence()?;
                let result = OperationResult::decode_components(decoder)?;
                let name = if decoder.peek_tag()? == Some(tags::EXTENDED_RESPONSE_NAME) {
                    Some(decoder.decode_octet_string_as_string()?)
                } else {
                    None
                };
                let value = optional_octet_string(decoder, tags::EXTENDED_RESPONSE_VALUE)?;
                decoder.decode_end_sequence()?;
                ProtocolOp::ExtendedResponse(ExtendedResponse {
                    result,
                    name,
                    value,
                })
            }
            _ => {
                return Err(LdapError::Protocol(format!(
                    "Unsupported protocol operation tag 0x{:02X}",
                    tag
                )));
            }
        };
        Ok(op)
    }
}

fn decode_result(decoder: &mut BerDecoder) -> LdapResult<OperationResult> {
    decoder.decode_start_sequence()?;
    let result = OperationResult::decode_components(decoder)?;
    decoder.decode_end_sequence()?;
    Ok(result)
}

fn optional_octet_string(decoder: &mut BerDecoder, tag: u8) -> LdapResult<Option<Bytes>> {
    if decoder.peek_tag()? == Some(tag) {
        Ok(Some(decoder.decode_octet_string()?))
    } else {
        Ok(None)
    }
}

/// LDAPMessage envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdapMessage {
    pub message_id: i32,
    pub op: ProtocolOp,
    pub controls: Vec<Control>,
}

impl LdapMessage {
    pub fn new(message_id: i32, op: ProtocolOp) -> Self {
        Self {
            message_id,
            op,
            controls: Vec::new(),
        }
    }

    /// Attach controls
    pub fn with_controls(mut self, controls: Vec<Control>) -> Self {
        self.controls = controls;
        self
    }

    /// Encode the message into `encoder`
    pub fn encode(&self, encoder: &mut BerEncoder) -> LdapResult<()> {
        encoder.encode_start_sequence()?;
        encoder.encode_integer(self.message_id)?;
        self.op.encode(encoder)?;
        control::encode_controls(encoder, &self.controls)?;
        encoder.encode_end_sequence()
    }

    /// Encode the message to bytes
    pub fn to_bytes(&self) -> LdapResult<Bytes> {
        let mut encoder = BerEncoder::new();
        self.encode(&mut encoder)?;
        encoder.take_output()
    }

    /// Decode a message that is completely buffered in `decoder`
    ///
    /// Elements following the controls inside the envelope are discarded.
    pub fn decode(decoder: &mut BerDecoder) -> LdapResult<Self> {
        decoder.decode_start_sequence()?;
        let message_id = decoder.decode_integer()?;
        let op = ProtocolOp::decode(decoder)?;
        let controls = control::decode_controls(decoder)?;
        decoder.decode_end_sequence()?;
        Ok(Self {
            message_id,
            op,
            controls,
        })
    }

    /// Decode the next message once it is completely buffered
    ///
    /// Returns `None` while bytes of the message are still missing, so the
    /// decoding itself never observes a partial message.
    pub fn try_decode(decoder: &mut BerDecoder) -> LdapResult<Option<Self>> {
        if !decoder.element_available()? {
            return Ok(None);
        }
        Self::decode(decoder).map(Some)
    }
}
