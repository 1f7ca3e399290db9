//! Realtime Wire Types
//!
//! ```json
//! {"type": "realtime-price", "code": "005930", "price": 71200, "change_rate": 1.4, "volume": 1200}
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::instrument::PriceDelta;

/// `type` value of price messages.
pub const REALTIME_PRICE_TYPE: &str = "realtime-price";

/// Price message published by the realtime broadcaster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealtimePriceMessage {
    /// Stock code.
    pub code: String,
    /// Latest traded price.
    #[serde(default, alias = "currentPrice", alias = "current_price")]
    pub price: Option<Decimal>,
    /// Change rate in percent.
    #[serde(default, alias = "changeRate")]
    pub change_rate: Option<Decimal>,
    /// Accumulated volume.
    #[serde(default)]
    pub volume: Option<u64>,
}

impl From<RealtimePriceMessage> for PriceDelta {
    fn from(msg: RealtimePriceMessage) -> Self {
        Self {
            code: msg.code,
            current_price: msg.price,
            change_rate: msg.change_rate,
            volume: msg.volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn into_delta_keeps_absent_fields_absent() {
        let msg: RealtimePriceMessage =
            serde_json::from_str(r#"{"code":"005930","price":1050}"#).unwrap();

        let delta = PriceDelta::from(msg);

        assert_eq!(delta.code, "005930");
        assert_eq!(delta.current_price, Some(Decimal::from(1050)));
        assert_eq!(delta.change_rate, None);
        assert_eq!(delta.volume, None);
    }

    #[test]
    fn accepts_camel_case_rate() {
        let msg: RealtimePriceMessage =
            serde_json::from_str(r#"{"code":"1","changeRate":"-0.5","volume":7}"#).unwrap();

        assert_eq!(msg.change_rate, Some(Decimal::new(-5, 1)));
        assert_eq!(msg.volume, Some(7));
    }
}
