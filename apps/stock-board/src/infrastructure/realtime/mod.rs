//! Realtime Price Stream
//!
//! WebSocket adapter for the [`PriceStream`](crate::application::ports::PriceStream)
//! port. The upstream broadcaster relays raw JSON payloads; only
//! `realtime-price` messages become price deltas.

pub mod client;
pub mod codec;
pub mod messages;

pub use client::{PriceStreamClient, PriceStreamClientConfig, PriceStreamError};
pub use codec::{CodecError, DecodedFrame, JsonCodec, StreamMessage};
pub use messages::{REALTIME_PRICE_TYPE, RealtimePriceMessage};
