//! Core types and utilities for the LDAP BER toolkit
//!
//! This crate provides the error type shared by the codec, transport and
//! protocol crates of the workspace.

pub mod error;

pub use error::{LdapError, LdapResult};
