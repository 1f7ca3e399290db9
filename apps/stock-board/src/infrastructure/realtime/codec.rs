//! Realtime Frame Codec
//!
//! A text frame holds one JSON object or an array of them. Objects are routed
//! on their `type` field; anything other than `realtime-price` is ignored.
//! Each element decodes on its own, so one bad message does not cost the rest
//! of its frame.

use super::messages::{REALTIME_PRICE_TYPE, RealtimePriceMessage};
use crate::domain::instrument::PriceDelta;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame is not an object or array of objects.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),
}

/// One decoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    /// A price delta.
    PriceUpdate(PriceDelta),
    /// A message of another type.
    Ignored {
        /// Its `type`, if it had one.
        kind: Option<String>,
    },
}

/// Result of decoding one frame.
#[derive(Debug, Default)]
pub struct DecodedFrame {
    /// Messages that decoded, in frame order.
    pub messages: Vec<StreamMessage>,
    /// Elements that did not.
    pub malformed: Vec<CodecError>,
}

/// JSON codec for realtime frames.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text frame.
    ///
    /// Elements that are not objects, or `realtime-price` messages that do
    /// not decode, land in [`DecodedFrame::malformed`].
    ///
    /// # Errors
    ///
    /// Returns an error if the frame as a whole is not a JSON object or array.
    pub fn decode(&self, text: &str) -> Result<DecodedFrame, CodecError> {
        let trimmed = text.trim();

        let values: Vec<serde_json::Value> = if trimmed.starts_with('[') {
            serde_json::from_str(trimmed)?
        } else if trimmed.starts_with('{') {
            vec![serde_json::from_str(trimmed)?]
        } else {
            return Err(CodecError::InvalidFormat(format!(
                "expected JSON array or object, got: {}...",
                trimmed.chars().take(50).collect::<String>()
            )));
        };

        let mut frame = DecodedFrame::default();
        for value in values {
            match self.decode_value(value) {
                Ok(message) => frame.messages.push(message),
                Err(e) => frame.malformed.push(e),
            }
        }
        Ok(frame)
    }

    fn decode_value(&self, value: serde_json::Value) -> Result<StreamMessage, CodecError> {
        if !value.is_object() {
            return Err(CodecError::InvalidFormat(format!(
                "expected object, got: {value}"
            )));
        }

        let kind = value.get("type").and_then(|t| t.as_str()).map(str::to_string);
        match kind.as_deref() {
            Some(REALTIME_PRICE_TYPE) => {
                let msg: RealtimePriceMessage = serde_json::from_value(value)?;
                Ok(StreamMessage::PriceUpdate(msg.into()))
            }
            _ => Ok(StreamMessage::Ignored { kind }),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    #[test]
    fn decode_single_price_object() {
        let codec = JsonCodec::new();

        let frame = codec
            .decode(r#"{"type":"realtime-price","code":"005930","price":1050,"change_rate":5.0}"#)
            .unwrap();

        assert!(frame.malformed.is_empty());
        assert_eq!(
            frame.messages,
            vec![StreamMessage::PriceUpdate(
                PriceDelta::new("005930")
                    .with_price(Decimal::from(1050))
                    .with_change_rate(Decimal::from(5))
            )]
        );
    }

    #[test]
    fn decode_array_mixed_types() {
        let codec = JsonCodec::new();

        let messages = codec
            .decode(
                r#"[{"type":"news","id":1},
                    {"type":"realtime-price","code":"000660","volume":12},
                    {"code":"no-type"}]"#,
            )
            .unwrap()
            .messages;

        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages[0],
            StreamMessage::Ignored {
                kind: Some("news".to_string())
            }
        );
        assert!(matches!(&messages[1], StreamMessage::PriceUpdate(d) if d.volume == Some(12)));
        assert_eq!(messages[2], StreamMessage::Ignored { kind: None });
    }

    #[test]
    fn decode_empty_array() {
        let frame = JsonCodec::new().decode("[]").unwrap();

        assert!(frame.messages.is_empty());
        assert!(frame.malformed.is_empty());
    }

    #[test]
    fn price_message_without_code_is_malformed() {
        let frame = JsonCodec::new()
            .decode(r#"{"type":"realtime-price","price":1}"#)
            .unwrap();

        assert!(frame.messages.is_empty());
        assert!(matches!(frame.malformed.as_slice(), [CodecError::Json(_)]));
    }

    #[test]
    fn bad_element_does_not_drop_its_neighbours() {
        let frame = JsonCodec::new()
            .decode(
                r#"[{"type":"realtime-price","code":"005930","price":1050},
                    {"type":"realtime-price","price":1},
                    {"type":"realtime-price","code":"000660","volume":"lots"},
                    {"type":"realtime-price","code":"035720","volume":3}]"#,
            )
            .unwrap();

        assert_eq!(
            frame.messages,
            vec![
                StreamMessage::PriceUpdate(PriceDelta::new("005930").with_price(Decimal::from(1050))),
                StreamMessage::PriceUpdate(PriceDelta::new("035720").with_volume(3)),
            ]
        );
        assert_eq!(frame.malformed.len(), 2);
    }

    #[test]
    fn non_json_is_invalid_format() {
        let result = JsonCodec::new().decode("ping");

        assert!(matches!(result, Err(CodecError::InvalidFormat(_))));
    }

    #[test]
    fn scalar_elements_are_malformed() {
        let frame = JsonCodec::new()
            .decode(r#"[1, {"type":"heartbeat"}, "x"]"#)
            .unwrap();

        assert_eq!(
            frame.messages,
            vec![StreamMessage::Ignored {
                kind: Some("heartbeat".to_string())
            }]
        );
        assert_eq!(frame.malformed.len(), 2);
        assert!(
            frame
                .malformed
                .iter()
                .all(|e| matches!(e, CodecError::InvalidFormat(_)))
        );
    }

    #[test]
    fn truncated_json_is_error() {
        let result = JsonCodec::new().decode(r#"{"type":"realtime-price""#);

        assert!(matches!(result, Err(CodecError::Json(_))));
    }
}
