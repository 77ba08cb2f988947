//! LDAP message layer
//!
//! This crate maps LDAP messages onto the BER codec of `ldap-asn1` and
//! exchanges them over an `ldap-transport` stream.

pub mod connection;
pub mod control;
pub mod error;
pub mod message;
pub mod result;

pub use connection::{ConnectionSettings, LdapConnection, DEFAULT_MAX_MESSAGE_SIZE};
pub use control::Control;
pub use error::{LdapError, LdapResult};
pub use message::{
    BindAuthentication, BindRequest, BindResponse, ExtendedRequest, ExtendedResponse,
    LdapMessage, ProtocolOp,
};
pub use result::OperationResult;
