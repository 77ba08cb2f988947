//! LDAPResult components shared by the response operations

use crate::error::LdapResult;
use ldap_asn1::BerDecoder;
use ldap_asn1::BerEncoder;

/// Context tag [3] of the referral list
pub const REFERRAL_TAG: u8 = 0xA3;

/// Result code reported for a successful operation
pub const SUCCESS: i32 = 0;

/// LDAPResult: result code, matched DN, diagnostic message and referrals
///
/// The result code is kept as the raw ENUMERATED value; no meaning is
/// attached to it beyond [`SUCCESS`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationResult {
    pub result_code: i32,
    pub matched_dn: String,
    pub diagnostic_message: String,
    pub referrals: Vec<String>,
}

impl OperationResult {
    /// Create a result with the given code and empty strings
    pub fn new(result_code: i32) -> Self {
        Self {
            result_code,
            ..Self::default()
        }
    }

    /// Create a successful result
    pub fn success() -> Self {
        Self::new(SUCCESS)
    }

    /// Set the diagnostic message
    pub fn with_diagnostic_message(mut self, message: impl Into<String>) -> Self {
        self.diagnostic_message = message.into();
        self
    }

    pub fn is_success(&self) -> bool {
        self.result_code == SUCCESS
    }

    /// Encode the components into the enclosing response sequence
    pub fn encode_components(&self, encoder: &mut BerEncoder) -> LdapResult<()> {
        encoder.encode_enumerated(self.result_code)?;
        encoder.encode_octet_string(&self.matched_dn)?;
        encoder.encode_octet_string(&self.diagnostic_message)?;
        if !self.referrals.is_empty() {
            encoder.encode_start_sequence_with_tag(REFERRAL_TAG)?;
            for referral in &self.referrals {
                encoder.encode_octet_string(referral)?;
            }
            encoder.encode_end_sequence()?;
        }
        Ok(())
    }

    /// Decode the components from an already opened response sequence
    pub fn decode_components(decoder: &mut BerDecoder) -> LdapResult<Self> {
        let result_code = decoder.decode_enumerated()?;
        let matched_dn = decoder.decode_octet_string_as_string()?;
        let diagnostic_message = decoder.decode_octet_string_as_string()?;

        let mut referrals = Vec::new();
        if decoder.peek_tag()? == Some(REFERRAL_TAG) {
            decoder.decode_start_sequence()?;
            while decoder.has_next_element() {
                referrals.push(decoder.decode_octet_string_as_string()?);
            }
            decoder.decode_end_sequence()?;
        }

        Ok(Self {
            result_code,
            matched_dn,
            diagnostic_message,
            referrals,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ldap_asn1::BerDecoderSettings;

    #[test]
    fn test_result_without_referrals() {
        let mut encoder = BerEncoder::new();
        OperationResult::new(49)
            .with_diagnostic_message("bad")
            .encode_components(&mut encoder)
            .unwrap();
        assert_eq!(
            encoder.as_bytes(),
            &[0x0A, 0x01, 0x31, 0x04, 0x00, 0x04, 0x03, b'b', b'a', b'd']
        );
    }

    #[test]
    fn test_result_with_referrals_round_trip() {
        let result = OperationResult {
            result_code: 10,
            matched_dn: "dc=example,dc=com".to_string(),
            diagnostic_message: String::new(),
            referrals: vec![
                "ldap://a.example.com/".to_string(),
                "ldap://b.example.com/".to_string(),
            ],
        };

        let mut encoder = BerEncoder::new();
        encoder.encode_start_sequence().unwrap();
        result.encode_components(&mut encoder).unwrap();
        encoder.encode_end_sequence().unwrap();

        let mut decoder = BerDecoder::new(BerDecoderSettings::default());
        decoder.feed(&encoder.take_output().unwrap());
        decoder.decode_start_sequence().unwrap();
        let decoded = OperationResult::decode_components(&mut decoder).unwrap();
        decoder.decode_end_sequence().unwrap();

        assert_eq!(decoded, result);
        assert!(!decoded.is_success());
    }
}
