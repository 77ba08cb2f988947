//! BER encoding types (Tag, Length, Integer primitives)

use crate::error::{LdapError, LdapResult};
use bytes::BufMut;

/// Universal BOOLEAN tag
pub const BOOLEAN: u8 = 0x01;
/// Universal INTEGER tag
pub const INTEGER: u8 = 0x02;
/// Universal OCTET STRING tag
pub const OCTET_STRING: u8 = 0x04;
/// Universal NULL tag
pub const NULL: u8 = 0x05;
/// Universal ENUMERATED tag
pub const ENUMERATED: u8 = 0x0A;
/// Universal SEQUENCE tag (constructed)
pub const SEQUENCE: u8 = 0x30;
/// Universal SET tag (constructed)
pub const SET: u8 = 0x31;

/// Largest length-of-length count accepted in long form lengths
pub const MAX_LENGTH_BYTES: u8 = 4;

/// Largest length a BER length prefix can carry
pub const MAX_ENCODABLE_LENGTH: usize = u32::MAX as usize;

/// BER Tag Class
///
/// ASN.1 defines four tag classes:
/// - **Universal**: Standard ASN.1 types (INTEGER, OCTET STRING, etc.)
/// - **Application**: Application-specific types (LDAP protocol operations)
/// - **Context-specific**: Context-dependent types (used in SEQUENCE/SET)
/// - **Private**: Private/implementation-specific types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BerTagClass {
    /// Universal class (00)
    Universal = 0,
    /// Application class (01)
    Application = 1,
    /// Context-specific class (10)
    ContextSpecific = 2,
    /// Private class (11)
    Private = 3,
}

impl BerTagClass {
    /// Get tag class from bits 7-6 of a tag byte
    pub const fn from_bits(bits: u8) -> Self {
        match (bits >> 6) & 0x03 {
            0 => BerTagClass::Universal,
            1 => BerTagClass::Application,
            2 => BerTagClass::ContextSpecific,
            _ => BerTagClass::Private,
        }
    }

    /// Convert tag class to bits (for encoding)
    pub const fn to_bits(self) -> u8 {
        (self as u8) << 6
    }
}

/// BER Tag
///
/// LDAP only ever uses single-byte tags, so tag numbers are limited to 0-30:
///
/// ```text
/// Bits: 8 7 6 5 4 3 2 1
///       C C P T T T T T
/// ```
/// Where CC is the class, P the constructed flag and TTTTT the tag number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BerTag {
    /// Tag class
    class: BerTagClass,
    /// Whether this is a constructed type
    constructed: bool,
    /// Tag number (0-30)
    number: u8,
}

impl BerTag {
    /// Create a new BER tag; `number` must be in 0-30
    pub const fn new(class: BerTagClass, constructed: bool, number: u8) -> Self {
        Self {
            class,
            constructed,
            number: number & 0x1F,
        }
    }

    /// Create a Universal class tag
    pub const fn universal(constructed: bool, number: u8) -> Self {
        Self::new(BerTagClass::Universal, constructed, number)
    }

    /// Create an Application class tag
    pub const fn application(constructed: bool, number: u8) -> Self {
        Self::new(BerTagClass::Application, constructed, number)
    }

    /// Create a Context-specific class tag
    pub const fn context_specific(constructed: bool, number: u8) -> Self {
        Self::new(BerTagClass::ContextSpecific, constructed, number)
    }

    /// Create a Private class tag
    pub const fn private(constructed: bool, number: u8) -> Self {
        Self::new(BerTagClass::Private, constructed, number)
    }

    /// Get tag class
    pub const fn class(&self) -> BerTagClass {
        self.class
    }

    /// Check if tag is constructed
    pub const fn is_constructed(&self) -> bool {
        self.constructed
    }

    /// Get tag number
    pub const fn number(&self) -> u8 {
        self.number
    }

    /// Encode tag to its single wire byte
    pub const fn to_byte(&self) -> u8 {
        let constructed_bit = if self.constructed { 0x20 } else { 0x00 };
        self.class.to_bits() | constructed_bit | self.number
    }

    /// Decode a single wire byte
    ///
    /// Returns error for the extended tag form (tag number bits all set),
    /// which LDAP does not use.
    pub fn from_byte(byte: u8) -> LdapResult<Self> {
        if byte & 0x1F == 0x1F {
            return Err(LdapError::InvalidData(format!(
                "Extended tag form is not supported: 0x{:02X}",
                byte
            )));
        }
        Ok(Self::new(
            BerTagClass::from_bits(byte),
            byte & 0x20 != 0,
            byte & 0x1F,
        ))
    }
}

/// First byte of a BER length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPrefix {
    /// Short form: the length itself (0-127)
    Short(usize),
    /// Long form: number of big-endian length bytes that follow (1-4)
    Long(u8),
}

/// BER Length encoding
///
/// Short form (lengths 0-127):
/// ```text
/// Byte: 0 L L L L L L L
/// ```
///
/// Long form:
/// ```text
/// First byte:  1 N N N N N N N  (N = number of length bytes, 1-4)
/// Following bytes: big-endian length value
/// ```
///
/// Indefinite length (`0x80`) is rejected like any other count outside 1-4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BerLength(u32);

impl BerLength {
    /// Create a length, failing when it does not fit four length bytes
    pub fn new(tag: u8, length: usize) -> LdapResult<Self> {
        u32::try_from(length)
            .map(BerLength)
            .map_err(|_| LdapError::ElementTooLarge {
                tag,
                length,
                max: MAX_ENCODABLE_LENGTH,
            })
    }

    /// Get the length value
    pub fn value(&self) -> usize {
        self.0 as usize
    }

    /// Number of bytes the encoded length occupies
    pub fn encoded_len(&self) -> usize {
        if self.0 < 0x80 {
            1
        } else {
            1 + Self::significant_bytes(self.0)
        }
    }

    fn significant_bytes(value: u32) -> usize {
        4 - (value.leading_zeros() / 8) as usize
    }

    /// Append the encoded length, using the minimal number of bytes
    pub fn encode_into<B: BufMut>(&self, buf: &mut B) {
        if self.0 < 0x80 {
            buf.put_u8(self.0 as u8);
            return;
        }
        let count = Self::significant_bytes(self.0);
        buf.put_u8(0x80 | count as u8);
        buf.put_slice(&self.0.to_be_bytes()[4 - count..]);
    }

    /// Encode length to a new vector
    pub fn encode(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut result);
        result
    }

    /// Interpret the first length byte
    pub fn decode_prefix(first_byte: u8) -> LdapResult<LengthPrefix> {
        if first_byte & 0x80 == 0 {
            return Ok(LengthPrefix::Short(first_byte as usize));
        }
        let count = first_byte & 0x7F;
        if count == 0 || count > MAX_LENGTH_BYTES {
            log::warn!("Rejecting BER length with {} length-of-length bytes", count);
            return Err(LdapError::InvalidLengthEncoding { count });
        }
        Ok(LengthPrefix::Long(count))
    }

    /// Accumulate the big-endian bytes following a long form prefix
    pub fn decode_long(bytes: &[u8]) -> LdapResult<usize> {
        if bytes.is_empty() || bytes.len() > MAX_LENGTH_BYTES as usize {
            return Err(LdapError::InvalidLengthEncoding {
                count: bytes.len() as u8,
            });
        }
        Ok(bytes
            .iter()
            .fold(0usize, |length, &byte| (length << 8) | byte as usize))
    }

    /// Decode a complete length from the start of `data`
    ///
    /// # Returns
    /// `Ok(None)` when `data` does not hold the whole length yet, otherwise
    /// the length value and the number of bytes it occupied.
    pub fn decode(data: &[u8]) -> LdapResult<Option<(usize, usize)>> {
        let Some(&first_byte) = data.first() else {
            return Ok(None);
        };
        match Self::decode_prefix(first_byte)? {
            LengthPrefix::Short(length) => Ok(Some((length, 1))),
            LengthPrefix::Long(count) => {
                let count = count as usize;
                if data.len() < 1 + count {
                    return Ok(None);
                }
                let length = Self::decode_long(&data[1..1 + count])?;
                Ok(Some((length, 1 + count)))
            }
        }
    }
}

/// Minimal two's complement representation of an integer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntegerBytes {
    bytes: [u8; 8],
    width: usize,
}

impl IntegerBytes {
    /// Big-endian content octets
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[8 - self.width..]
    }

    /// Number of content octets (1-8)
    pub fn len(&self) -> usize {
        self.width
    }

    /// Always false; an integer takes at least one byte
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Encode `value` using the fewest two's complement bytes that sign-extend
/// back to it
pub fn encode_integer_value(value: i64) -> IntegerBytes {
    let width = (1..8)
        .find(|&width| {
            let shift = 64 - 8 * width;
            (value << shift) >> shift == value
        })
        .unwrap_or(8);
    IntegerBytes {
        bytes: value.to_be_bytes(),
        width,
    }
}

/// Decode big-endian two's complement content octets (1-8 bytes)
pub fn decode_integer_value(bytes: &[u8]) -> LdapResult<i64> {
    let Some(&first) = bytes.first() else {
        return Err(LdapError::InvalidIntegerLength { length: 0, max: 8 });
    };
    if bytes.len() > 8 {
        return Err(LdapError::InvalidIntegerLength {
            length: bytes.len(),
            max: 8,
        });
    }

    let seed: i64 = if first & 0x80 != 0 { -1 } else { 0 };
    Ok(bytes
        .iter()
        .fold(seed, |value, &byte| (value << 8) | byte as i64))
}
