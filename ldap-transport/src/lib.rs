//! Transport layer module for the LDAP toolkit
//!
//! This crate provides the byte transport abstraction consumed by the BER
//! codec, with a TCP implementation and an in-memory implementation that
//! replays scripted fragments.

pub mod error;
pub mod memory;
pub mod stream;
pub mod tcp;

pub use error::{LdapError, LdapResult};
pub use memory::MemoryTransport;
pub use stream::{StreamAccessor, TransportLayer};
pub use tcp::{TcpSettings, TcpTransport, DEFAULT_LDAP_PORT};
