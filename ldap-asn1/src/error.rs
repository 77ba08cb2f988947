//! Error types for the BER codec

pub use ldap_core::error::{LdapError, LdapResult};
