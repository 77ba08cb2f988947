//! BER (Basic Encoding Rules) codec for LDAP
//!
//! Every LDAP PDU is a BER encoded ASN.1 structure. Each value is a TLV
//! (Tag-Length-Value) triplet:
//!
//! ```text
//! [Tag] [Length] [Value]
//! ```
//!
//! ## Tag Encoding
//!
//! ```text
//! Bits: 8 7 6 5 4 3 2 1
//!       C C P T T T T T
//! ```
//! - CC = Class (00=Universal, 01=Application, 10=Context, 11=Private)
//! - P = Primitive (0) or Constructed (1)
//! - TTTTT = Tag number (0-30). LDAP never needs the extended form.
//!
//! ## Length Encoding
//!
//! - **Short form** (1 byte): lengths 0-127
//! - **Long form**: first byte `0x80 | n` followed by `n` big-endian length
//!   bytes, with `n` between 1 and 4. Indefinite lengths are rejected.
//!
//! # Layers
//!
//! - [`BerDecoder`] is a sans-io incremental decoder. It is fed arbitrary
//!   fragments and reports [`crate::LdapError::Incomplete`] until an element
//!   can be completed.
//! - [`BerEncoder`] buffers nested sequences and writes their lengths once
//!   they are closed.
//! - [`BerStream`] drives both over a transport, reading until each decode
//!   operation can complete.

pub mod decoder;
pub mod encoder;
mod frame;
pub mod stream;
pub mod types;

pub use decoder::{BerDecoder, BerDecoderSettings, CursorState};
pub use encoder::BerEncoder;
pub use stream::{BerStream, DEFAULT_READ_CHUNK_SIZE};
pub use types::{BerLength, BerTag, BerTagClass, IntegerBytes, LengthPrefix};
