//! ASN.1 BER codec for the LDAP toolkit
//!
//! This crate provides the incremental BER decoder, the nested sequence
//! encoder and the transport-bound [`BerStream`] used by the LDAP message
//! layer.

pub mod error;
pub mod ber;

pub use error::{LdapError, LdapResult};
pub use ber::{
    BerDecoder, BerDecoderSettings, BerEncoder, BerLength, BerStream, BerTag, BerTagClass,
    CursorState,
};
