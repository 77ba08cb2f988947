//! Request and response controls

use crate::error::LdapResult;
use bytes::Bytes;
use ldap_asn1::ber::types::{BOOLEAN, OCTET_STRING};
use ldap_asn1::{BerDecoder, BerEncoder};

/// Context tag [0] of the control list in the message envelope
pub const CONTROLS_TAG: u8 = 0xA0;

/// Control ::= SEQUENCE { controlType, criticality DEFAULT FALSE, controlValue OPTIONAL }
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub oid: String,
    pub critical: bool,
    pub value: Option<Bytes>,
}

impl Control {
    /// Create a non-critical control without a value
    pub fn new(oid: impl Into<String>) -> Self {
        Self {
            oid: oid.into(),
            critical: false,
            value: None,
        }
    }

    /// Mark the control as critical
    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    /// Attach a control value
    pub fn with_value(mut self, value: impl Into<Bytes>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Encode the control; the criticality is only written when true
    pub fn encode(&self, encoder: &mut BerEncoder) -> LdapResult<()> {
        encoder.encode_start_sequence()?;
        encoder.encode_octet_string(&self.oid)?;
        if self.critical {
            encoder.encode_boolean(true)?;
        }
        if let Some(value) = &self.value {
            encoder.encode_octet_string(value)?;
        }
        encoder.encode_end_sequence()
    }

    /// Decode a control, skipping components it does not know
    pub fn decode(decoder: &mut BerDecoder) -> LdapResult<Self> {
        decoder.decode_start_sequence()?;
        let mut control = Self::new(decoder.decode_octet_string_as_string()?);
        while let Some(tag) = decoder.peek_tag()? {
            match tag {
                BOOLEAN => control.critical = decoder.decode_boolean()?,
                OCTET_STRING => control.value = Some(decoder.decode_octet_string()?),
                _ => {
                    decoder.skip_element()?;
                }
            }
        }
        decoder.decode_end_sequence()?;
        Ok(control)
    }
}

/// Encode a non-empty control list under [0]
pub fn encode_controls(encoder: &mut BerEncoder, controls: &[Control]) -> LdapResult<()> {
    if controls.is_empty() {
        return Ok(());
    }
    encoder.encode_start_sequence_with_tag(CONTROLS_TAG)?;
    for control in controls {
        control.encode(encoder)?;
    }
    encoder.encode_end_sequence()
}

/// Decode the [0] control list, or nothing when the next element is not one
pub fn decode_controls(decoder: &mut BerDecoder) -> LdapResult<Vec<Control>> {
    let mut controls = Vec::new();
    if decoder.peek_tag()? != Some(CONTROLS_TAG) {
        return Ok(controls);
    }
    decoder.decode_start_sequence()?;
    while decoder.has_next_element() {
        controls.push(Control::decode(decoder)?);
    }
    decoder.decode_end_sequence()?;
    Ok(controls)
}
