//! Price Stream Port (Driven Port)
//!
//! Realtime price deltas for one mounted board.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::instrument::PriceDelta;

/// Events reported by a running price stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Connection established.
    Connected,
    /// A price delta arrived.
    Update(PriceDelta),
    /// Connection closed, by either side.
    Closed,
    /// Connection could not be established or broke with an error.
    Failed(String),
}

/// Port for the realtime price stream.
///
/// `run` connects once, forwards events until the connection ends or `cancel`
/// fires, and returns. There is no reconnect: a dropped connection simply
/// ends the stream.
#[async_trait]
pub trait PriceStream: Send + Sync {
    /// Run the stream until it ends or is cancelled.
    async fn run(&self, events: mpsc::Sender<StreamEvent>, cancel: CancellationToken);
}
