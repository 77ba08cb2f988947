//! Error types re-exported from `ldap-core`

pub use ldap_core::error::{LdapError, LdapResult};
