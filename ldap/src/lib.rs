//! LDAP BER toolkit
//!
//! A streaming BER/ASN.1 codec and the LDAP message layer built on it.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `ldap-core`: Error handling
//! - `ldap-asn1`: Incremental BER decoder, nested sequence encoder, `BerStream`
//! - `ldap-transport`: Transport layer (TCP, in-memory)
//! - `ldap-protocol`: LDAP message envelope, operations and connection
//!
//! # Usage
//!
//! ```no_run
//! use ldap::protocol::{BindRequest, ConnectionSettings, LdapConnection, ProtocolOp};
//! use ldap::transport::{TcpSettings, TcpTransport, TransportLayer};
//!
//! # async fn run() -> ldap::LdapResult<()> {
//! let mut transport = TcpTransport::new(TcpSettings::new("127.0.0.1:389".parse().unwrap()));
//! transport.open().await?;
//!
//! let mut conn = LdapConnection::new(transport, ConnectionSettings::default()).await?;
//! let bind = ProtocolOp::BindRequest(BindRequest::simple("cn=admin,dc=example,dc=com", "secret"));
//! conn.request(bind, Vec::new()).await?;
//! let response = conn.receive().await?;
//! # Ok(())
//! # }
//! ```

// Re-export core types
pub use ldap_core::{LdapError, LdapResult};

// Re-export the BER codec
pub mod asn1 {
    pub use ldap_asn1::ber::*;
}

// Re-export transports
pub mod transport {
    pub use ldap_transport::*;
}

// Re-export the message layer
pub mod protocol {
    pub use ldap_protocol::*;
}
