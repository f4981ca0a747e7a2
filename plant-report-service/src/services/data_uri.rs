//! `data:` URI encoding for images passed between the browser and the API.

use base64::{
    alphabet,
    engine::{general_purpose::STANDARD, DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine as _,
};
use std::fmt;
use thiserror::Error;

/// Decoder that accepts both padded and unpadded input, as browsers and
/// hand-built payloads produce either.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error)]
pub enum DataUriError {
    #[error("missing data: prefix")]
    MissingPrefix,

    #[error("data URI is not base64 encoded")]
    NotBase64,

    #[error("invalid base64 payload: {0}")]
    InvalidPayload(#[from] base64::DecodeError),
}

/// Binary content together with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl DataUri {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Parse `data:<mime>;base64,<payload>`.
    pub fn parse(input: &str) -> Result<Self, DataUriError> {
        let rest = input
            .trim()
            .strip_prefix("data:")
            .ok_or(DataUriError::MissingPrefix)?;
        let (meta, payload) = rest.split_once(',').ok_or(DataUriError::NotBase64)?;
        let mime_type = meta
            .strip_suffix(";base64")
            .ok_or(DataUriError::NotBase64)?;

        Ok(Self {
            mime_type: mime_type.to_string(),
            data: decode_base64(payload)?,
        })
    }
}

impl fmt::Display for DataUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "data:{};base64,{}",
            self.mime_type,
            encode_base64(&self.data)
        )
    }
}

/// Decode an image sent either as a full data URI or as bare base64.
pub fn decode_image_payload(input: &str) -> Result<Vec<u8>, DataUriError> {
    let input = input.trim();
    if input.starts_with("data:") {
        Ok(DataUri::parse(input)?.data)
    } else {
        decode_base64(input)
    }
}

/// Standard padded base64, the form the model API and data URIs expect.
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

fn decode_base64(payload: &str) -> Result<Vec<u8>, DataUriError> {
    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(LENIENT.decode(compact)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_data_uri() {
        let uri = DataUri::new("image/png", b"hello".to_vec());
        assert_eq!(uri.to_string(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn parses_what_it_formats() {
        let original = DataUri::new("image/jpeg", vec![0xff, 0xd8, 0xff, 0x00, 0x10]);
        let parsed = DataUri::parse(&original.to_string()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn tolerates_wrapped_and_unpadded_payloads() {
        let parsed = DataUri::parse("data:image/png;base64,aGVs\nbG8").unwrap();
        assert_eq!(parsed.data, b"hello");
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(matches!(
            DataUri::parse("image/png;base64,aGVsbG8="),
            Err(DataUriError::MissingPrefix)
        ));
    }

    #[test]
    fn rejects_non_base64_uri() {
        assert!(matches!(
            DataUri::parse("data:text/plain,hello"),
            Err(DataUriError::NotBase64)
        ));
    }

    #[test]
    fn rejects_garbage_payload() {
        assert!(matches!(
            DataUri::parse("data:image/png;base64,not*base64!"),
            Err(DataUriError::InvalidPayload(_))
        ));
    }

    #[test]
    fn image_payload_accepts_bare_base64() {
        assert_eq!(decode_image_payload("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(
            decode_image_payload("data:image/webp;base64,aGVsbG8=").unwrap(),
            b"hello"
        );
    }
}
