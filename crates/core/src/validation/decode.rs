//! Strict JSON decoding.

use thiserror::Error;

use crate::types::Order;

/// Why a payload could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorCategory {
    /// Not well-formed JSON.
    Syntax,
    /// Well-formed JSON that does not match the schema (unknown field, wrong type).
    Data,
    /// The payload ended early.
    Eof,
    /// Failure reading the input.
    Io,
}

/// A payload that is not a well-formed order document.
#[derive(Debug, Error)]
#[error("decode order: {source}")]
pub struct DecodeError {
    #[from]
    source: serde_json::Error,
}

impl DecodeError {
    #[must_use]
    pub fn category(&self) -> DecodeErrorCategory {
        match self.source.classify() {
            serde_json::error::Category::Syntax => DecodeErrorCategory::Syntax,
            serde_json::error::Category::Data => DecodeErrorCategory::Data,
            serde_json::error::Category::Eof => DecodeErrorCategory::Eof,
            serde_json::error::Category::Io => DecodeErrorCategory::Io,
        }
    }

    /// 1-based line of the failure (0 if unknown).
    #[must_use]
    pub fn line(&self) -> usize {
        self.source.line()
    }

    /// 1-based column of the failure (0 if unknown).
    #[must_use]
    pub fn column(&self) -> usize {
        self.source.column()
    }
}

/// Decode a message payload into an [`Order`].
///
/// Unknown fields at any level are a hard failure, as is anything after the
/// top-level document other than whitespace.
///
/// # Errors
///
/// Returns [`DecodeError`] if the payload is not valid JSON or does not match
/// the order schema.
pub fn decode_order(bytes: &[u8]) -> Result<Order, DecodeError> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_decodes_valid_payload() {
        let expected = fixtures::valid_order("ord-1");
        let bytes = serde_json::to_vec(&expected).unwrap();

        let order = decode_order(&bytes).unwrap();
        assert_eq!(order, expected);
        assert_eq!(order.items.len(), 2);
    }

    #[test]
    fn test_unknown_top_level_field_is_data_error() {
        let err = decode_order(br#"{"order_uid": "x", "extra": true}"#).unwrap_err();
        assert_eq!(err.category(), DecodeErrorCategory::Data);
        assert!(err.to_string().contains("extra"));
    }

    #[test]
    fn test_unknown_item_field_is_rejected() {
        let err = decode_order(br#"{"items": [{"chrt_id": 1, "colour": "red"}]}"#).unwrap_err();
        assert_eq!(err.category(), DecodeErrorCategory::Data);
    }

    #[test]
    fn test_wrong_type_is_rejected() {
        let err = decode_order(br#"{"sm_id": "ninety-nine"}"#).unwrap_err();
        assert_eq!(err.category(), DecodeErrorCategory::Data);
    }

    #[test]
    fn test_malformed_json() {
        let err = decode_order(b"{not json").unwrap_err();
        assert_eq!(err.category(), DecodeErrorCategory::Syntax);
        assert_eq!(err.line(), 1);
    }

    #[test]
    fn test_truncated_json() {
        let err = decode_order(br#"{"order_uid": "x""#).unwrap_err();
        assert_eq!(err.category(), DecodeErrorCategory::Eof);
    }

    #[test]
    fn test_trailing_garbage() {
        assert!(decode_order(br#"{"order_uid": "x"} {}"#).is_err());
    }
}
