//! Search Debouncing
//!
//! Keystrokes replace the pending value and restart the quiet period. A value
//! is committed only once the quiet period passes with no newer input.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Default quiet period for search input.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(300);

/// Trailing-edge debouncer.
#[derive(Debug)]
pub struct Debouncer<T> {
    quiet: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    /// Create a debouncer with the given quiet period.
    #[must_use]
    pub const fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    /// Replace the pending value and restart the quiet period from `now`.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.quiet));
    }

    /// When the pending value becomes due.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|(_, due)| *due)
    }

    /// Take the pending value if its quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match &self.pending {
            Some((_, due)) if now >= *due => self.pending.take().map(|(value, _)| value),
            _ => None,
        }
    }

    /// Whether a value is waiting.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Drive a [`Debouncer`] from a channel, calling `commit` for each settled
/// value. Returns when the channel closes or `cancel` fires; a value still
/// pending at that point is dropped.
pub async fn run_debounced<T, F>(
    mut input: mpsc::UnboundedReceiver<T>,
    quiet: Duration,
    cancel: CancellationToken,
    mut commit: F,
) where
    T: Send,
    F: FnMut(T) + Send,
{
    let mut debouncer = Debouncer::new(quiet);

    loop {
        let deadline = debouncer.deadline();
        let settle = async move {
            match deadline {
                Some(due) => tokio::time::sleep_until(due).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            () = cancel.cancelled() => break,
            value = input.recv() => match value {
                Some(value) => debouncer.push(value, Instant::now()),
                None => break,
            },
            () = settle => {
                if let Some(value) = debouncer.poll(Instant::now()) {
                    commit(value);
                }
            }
        }
    }

    tracing::debug!(pending = debouncer.is_pending(), "Debounce task stopped");
}
