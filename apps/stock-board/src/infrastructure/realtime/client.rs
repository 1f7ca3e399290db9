//! Realtime Price WebSocket Client
//!
//! Connects once to the broadcaster's `/ws/realtime-price` endpoint and
//! forwards price deltas to the session. No authentication, subscription or
//! reconnect: when the connection ends, the stream ends.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::codec::{JsonCodec, StreamMessage};
use crate::application::ports::{PriceStream, StreamEvent};
use crate::infrastructure::metrics::{self, Outcome};

// =============================================================================
// Error Type
// =============================================================================

/// Errors that end a realtime connection.
#[derive(Debug, thiserror::Error)]
pub enum PriceStreamError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the price stream client.
#[derive(Debug, Clone)]
pub struct PriceStreamClientConfig {
    /// WebSocket URL.
    pub url: String,
}

impl PriceStreamClientConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Why the read loop stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shutdown {
    /// Session cancelled; we close.
    Cancelled,
    /// Session stopped listening; we close.
    ReceiverGone,
    /// Server closed or the stream ended.
    Remote,
}

// =============================================================================
// Client
// =============================================================================

/// WebSocket client for realtime price deltas.
#[derive(Debug)]
pub struct PriceStreamClient {
    config: PriceStreamClientConfig,
    codec: JsonCodec,
}

impl PriceStreamClient {
    /// Create a new client.
    #[must_use]
    pub const fn new(config: PriceStreamClientConfig) -> Self {
        Self {
            config,
            codec: JsonCodec::new(),
        }
    }

    /// Connect and process frames until the connection ends or `cancel` fires.
    async fn connect_and_run(
        &self,
        events: &mpsc::Sender<StreamEvent>,
        cancel: &CancellationToken,
    ) -> Result<Shutdown, PriceStreamError> {
        tracing::info!(url = %self.config.url, "Connecting to realtime price stream");

        let connected = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!("Cancelled while connecting");
                return Ok(Shutdown::Cancelled);
            }
            result = tokio_tungstenite::connect_async(&self.config.url) => result,
        };
        let (ws_stream, _response) = match connected {
            Ok(ok) => ok,
            Err(e) => {
                metrics::record_stream_connection(Outcome::Failure);
                return Err(e.into());
            }
        };
        metrics::record_stream_connection(Outcome::Success);
        tracing::info!("Realtime price stream connected");

        let (mut write, mut read) = ws_stream.split();

        let shutdown = if events.send(StreamEvent::Connected).await.is_err() {
            Shutdown::ReceiverGone
        } else {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break Shutdown::Cancelled,
                    msg = read.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            if !self.forward_text(&text, events).await {
                                break Shutdown::ReceiverGone;
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(?frame, "Server sent close frame");
                            break Shutdown::Remote;
                        }
                        Some(Ok(_)) => {
                            // Binary, pong and raw frames carry nothing for us
                        }
                        Some(Err(e)) => return Err(e.into()),
                        None => {
                            tracing::info!("Realtime stream ended");
                            break Shutdown::Remote;
                        }
                    },
                }
            }
        };

        // Only an open connection we are leaving gets a close frame.
        if shutdown != Shutdown::Remote {
            tracing::info!(reason = ?shutdown, "Closing realtime price stream");
            if let Err(e) = write.send(Message::Close(None)).await {
                tracing::debug!(error = %e, "Close frame not sent");
            }
        }

        Ok(shutdown)
    }

    /// Decode a text frame and forward its deltas. Returns `false` once the
    /// receiver is gone.
    async fn forward_text(&self, text: &str, events: &mpsc::Sender<StreamEvent>) -> bool {
        let frame = match self.codec.decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed realtime frame");
                metrics::record_malformed_message();
                return true;
            }
        };

        for error in &frame.malformed {
            tracing::warn!(error = %error, "Dropping malformed realtime message");
            metrics::record_malformed_message();
        }

        for message in frame.messages {
            match message {
                StreamMessage::PriceUpdate(delta) => {
                    if events.send(StreamEvent::Update(delta)).await.is_err() {
                        return false;
                    }
                }
                StreamMessage::Ignored { kind } => {
                    tracing::trace!(?kind, "Ignoring realtime message");
                }
            }
        }
        true
    }
}

#[async_trait]
impl PriceStream for PriceStreamClient {
    async fn run(&self, events: mpsc::Sender<StreamEvent>, cancel: CancellationToken) {
        match self.connect_and_run(&events, &cancel).await {
            Ok(Shutdown::Remote) => {
                let _ = events.send(StreamEvent::Closed).await;
            }
            Ok(Shutdown::Cancelled | Shutdown::ReceiverGone) => {
                tracing::debug!("Realtime price stream stopped");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Realtime price stream error");
                let _ = events.send(StreamEvent::Failed(e.to_string())).await;
            }
        }
    }
}
