//! Board Session
//!
//! One mounted board: owns the view model and the background tasks that feed
//! it. Mounting starts
//!
//! - the snapshot load,
//! - the search debounce task,
//! - the realtime stream and its delta apply loop, if the market is open.
//!
//! [`BoardSession::observe_market`] re-checks the gate; when the market has
//! opened since the last check it refreshes the snapshot and starts the
//! stream, as a fresh mount would.
//!
//! Unmounting (or dropping the session) cancels everything. Results that land
//! after that point are discarded.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::debounce::{DEFAULT_QUIET_PERIOD, run_debounced};
use crate::application::ports::{
    LoadOutcome, MarketClock, NoopMetrics, PriceStream, SessionMetrics, SnapshotError,
    SnapshotSource, StreamEvent,
};
use crate::domain::instrument::{InstrumentRecord, MergeOutcome, PriceDelta};
use crate::domain::market_hours::is_market_open;
use crate::domain::view::{MarketFilter, SortSpec, ViewModel, ViewState, compute_projection};
use crate::domain::window::{WindowRequest, compute_window};

// =============================================================================
// Configuration
// =============================================================================

/// Session tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Quiet period before a search term is committed.
    pub search_debounce: Duration,
    /// Capacity of the stream event channel.
    pub event_capacity: usize,
    /// Criteria the view starts with.
    pub initial_view: ViewState,
    /// Where load, merge and projection outcomes are reported.
    pub metrics: Arc<dyn SessionMetrics>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            search_debounce: DEFAULT_QUIET_PERIOD,
            event_capacity: 1024,
            initial_view: ViewState::default(),
            metrics: Arc::new(NoopMetrics),
        }
    }
}

// =============================================================================
// Status Types
// =============================================================================

/// Snapshot load state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoadState {
    /// Load in flight.
    Loading,
    /// Snapshot applied.
    Ready {
        /// Instruments in the book.
        instruments: usize,
    },
    /// Load failed; `reload` may be called.
    Failed {
        /// Error text.
        message: String,
    },
}

impl LoadState {
    /// Whether the snapshot is loaded.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready { .. })
    }

    /// Whether the load finished, either way.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        !matches!(self, Self::Loading)
    }
}

/// Realtime stream status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamStatus {
    /// Market closed at mount; no connection attempted.
    Gated,
    /// Connection in progress.
    Connecting,
    /// Receiving deltas.
    Connected,
    /// Connection closed.
    Closed,
    /// Connection failed.
    Failed,
}

impl StreamStatus {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gated => "gated",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }

    /// Whether a connection is in progress or open.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

// =============================================================================
// Board Window
// =============================================================================

/// A materialized row of the board.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardRow {
    /// Position in the projection.
    pub index: usize,
    /// Absolute pixel offset.
    pub offset: f64,
    /// Row height in pixels.
    pub size: f64,
    /// Instrument shown in the row.
    #[serde(flatten)]
    pub record: InstrumentRecord,
}

/// The rows of a projection visible in one viewport.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardWindow {
    /// Rows in the whole projection.
    pub total_rows: usize,
    /// Height of the whole projection.
    pub total_height: f64,
    /// First materialized index.
    pub start: Option<usize>,
    /// Last materialized index, inclusive.
    pub end: Option<usize>,
    /// Materialized rows.
    pub rows: Vec<BoardRow>,
}

impl BoardWindow {
    /// Window `projection` (indices into `records`) for a viewport.
    #[must_use]
    pub fn build(records: &[InstrumentRecord], projection: &[usize], request: &WindowRequest) -> Self {
        let window = compute_window(projection.len(), request);
        let rows = window
            .rows
            .iter()
            .filter_map(|row| {
                let record = projection.get(row.index).and_then(|&i| records.get(i))?;
                Some(BoardRow {
                    index: row.index,
                    offset: row.offset,
                    size: row.size,
                    record: record.clone(),
                })
            })
            .collect();

        Self {
            total_rows: projection.len(),
            total_height: window.total_height,
            start: window.start(),
            end: window.end(),
            rows,
        }
    }
}

// =============================================================================
// Shared State
// =============================================================================

struct Shared {
    view: RwLock<ViewModel>,
    load_state: watch::Sender<LoadState>,
    stream_status: watch::Sender<StreamStatus>,
    deltas_applied: AtomicU64,
    load_generation: AtomicU64,
    stream_generation: AtomicU64,
    gate_open: AtomicBool,
    source: Arc<dyn SnapshotSource>,
    stream: Arc<dyn PriceStream>,
    event_capacity: usize,
    metrics: Arc<dyn SessionMetrics>,
    cancel: CancellationToken,
}

impl Shared {
    fn spawn_load(self: &Arc<Self>) {
        let generation = self.load_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.load_state.send_replace(LoadState::Loading);

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let result = tokio::select! {
                () = shared.cancel.cancelled() => None,
                result = shared.source.load() => Some(result),
            };
            match result {
                Some(result) => shared.finish_load(generation, result),
                None => {
                    tracing::debug!("Snapshot load abandoned on unmount");
                    shared.metrics.snapshot_load(LoadOutcome::Discarded);
                }
            }
        });
    }

    fn finish_load(&self, generation: u64, result: Result<Vec<InstrumentRecord>, SnapshotError>) {
        if self.cancel.is_cancelled() || generation != self.load_generation.load(Ordering::SeqCst) {
            tracing::debug!(generation, "Discarding stale snapshot result");
            self.metrics.snapshot_load(LoadOutcome::Discarded);
            return;
        }

        match result {
            Ok(records) => {
                let instruments = self.mutate_view(|view| {
                    view.load_snapshot(records);
                    view.book().len()
                });
                self.metrics.snapshot_load(LoadOutcome::Success);
                self.metrics.instruments(instruments);
                tracing::info!(instruments, "Snapshot loaded");
                self.load_state.send_replace(LoadState::Ready { instruments });
            }
            Err(e) => {
                self.metrics.snapshot_load(LoadOutcome::Failure);
                tracing::error!(error = %e, "Snapshot load failed");
                self.load_state.send_replace(LoadState::Failed {
                    message: e.to_string(),
                });
            }
        }
    }

    fn start_stream(self: &Arc<Self>) {
        let generation = self.stream_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.stream_status.send_replace(StreamStatus::Connecting);

        let (tx, rx) = mpsc::channel(self.event_capacity.max(1));
        let cancel = self.cancel.child_token();
        let stream = Arc::clone(&self.stream);
        tokio::spawn(async move {
            stream.run(tx, cancel).await;
        });

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            shared.apply_events(rx, generation).await;
        });
    }

    async fn apply_events(&self, mut events: mpsc::Receiver<StreamEvent>, generation: u64) {
        loop {
            let event = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                event = events.recv() => event,
            };

            // A newer stream owns the status from here on.
            if generation != self.stream_generation.load(Ordering::SeqCst) {
                tracing::debug!(generation, "Superseded stream loop exiting");
                break;
            }

            match event {
                Some(StreamEvent::Connected) => {
                    self.stream_status.send_replace(StreamStatus::Connected);
                }
                Some(StreamEvent::Update(delta)) => {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    self.apply_delta(&delta);
                }
                Some(StreamEvent::Closed) => {
                    self.stream_status.send_replace(StreamStatus::Closed);
                }
                Some(StreamEvent::Failed(message)) => {
                    tracing::warn!(%message, "Realtime stream failed");
                    self.stream_status.send_replace(StreamStatus::Failed);
                }
                None => {
                    self.stream_status.send_if_modified(|status| {
                        let live = status.is_live();
                        if live {
                            *status = StreamStatus::Closed;
                        }
                        live
                    });
                    break;
                }
            }
        }
    }

    fn apply_delta(&self, delta: &PriceDelta) {
        let outcome = self.mutate_view(|view| view.apply_delta(delta));
        self.metrics.delta(outcome);

        match outcome {
            MergeOutcome::Applied => {
                self.deltas_applied.fetch_add(1, Ordering::Relaxed);
            }
            MergeOutcome::UnknownCode => {
                tracing::debug!(code = %delta.code, "Delta for unknown instrument dropped");
            }
        }
    }

    /// Run a view mutation under the write lock and time it.
    fn mutate_view<R>(&self, f: impl FnOnce(&mut ViewModel) -> R) -> R {
        let started = Instant::now();
        let result = f(&mut self.view.write());
        self.metrics.projection(started.elapsed());
        result
    }
}

// =============================================================================
// Board Session
// =============================================================================

/// A mounted board view.
///
/// Must be mounted inside a Tokio runtime.
pub struct BoardSession {
    shared: Arc<Shared>,
    search_tx: mpsc::UnboundedSender<String>,
}

impl BoardSession {
    /// Mount a board: load the snapshot and, during market hours, subscribe
    /// to the realtime stream.
    #[must_use]
    pub fn mount(
        source: Arc<dyn SnapshotSource>,
        stream: Arc<dyn PriceStream>,
        clock: &dyn MarketClock,
        config: SessionConfig,
    ) -> Self {
        let (load_state, _) = watch::channel(LoadState::Loading);
        let (stream_status, _) = watch::channel(StreamStatus::Gated);
        let now = clock.now();
        let market_open = is_market_open(now);
        let shared = Arc::new(Shared {
            view: RwLock::new(ViewModel::with_state(config.initial_view)),
            load_state,
            stream_status,
            deltas_applied: AtomicU64::new(0),
            load_generation: AtomicU64::new(0),
            stream_generation: AtomicU64::new(0),
            gate_open: AtomicBool::new(market_open),
            source,
            stream,
            event_capacity: config.event_capacity,
            metrics: config.metrics,
            cancel: CancellationToken::new(),
        });

        let (search_tx, search_rx) = mpsc::unbounded_channel::<String>();
        let search_shared = Arc::clone(&shared);
        tokio::spawn(run_debounced(
            search_rx,
            config.search_debounce,
            shared.cancel.child_token(),
            move |term: String| {
                search_shared.mutate_view(|view| view.set_search_term(&term));
            },
        ));

        shared.spawn_load();

        if market_open {
            tracing::info!(%now, "Market open, starting realtime stream");
            shared.start_stream();
        } else {
            tracing::info!(%now, "Market closed, realtime stream not started");
        }

        Self { shared, search_tx }
    }

    /// Re-run the snapshot load. Ignored after unmount.
    pub fn reload(&self) {
        if self.shared.cancel.is_cancelled() {
            return;
        }
        tracing::info!("Reloading snapshot");
        self.shared.spawn_load();
    }

    /// Re-check the market-hours gate at `now`.
    ///
    /// When the market has opened since the previous check and no stream is
    /// live, the snapshot is reloaded and the stream started. Returns whether
    /// that happened. Closing transitions only update the recorded gate.
    pub fn observe_market(&self, now: DateTime<Utc>) -> bool {
        if self.shared.cancel.is_cancelled() {
            return false;
        }

        let open = is_market_open(now);
        let was_open = self.shared.gate_open.swap(open, Ordering::SeqCst);
        if !open || was_open {
            return false;
        }
        if self.stream_status().is_live() {
            tracing::debug!(%now, "Market opened with stream already live");
            return false;
        }

        tracing::info!(%now, "Market opened, refreshing snapshot and starting realtime stream");
        self.shared.spawn_load();
        self.shared.start_stream();
        true
    }

    /// Feed a keystroke into the debounced search.
    pub fn search(&self, term: &str) {
        if self.search_tx.send(term.to_string()).is_err() {
            tracing::debug!("Search input after unmount ignored");
        }
    }

    /// Change the market filter.
    pub fn set_market_filter(&self, filter: MarketFilter) {
        self.shared.mutate_view(|view| view.set_market_filter(filter));
    }

    /// Change the sort.
    pub fn set_sort(&self, sort: SortSpec) {
        self.shared.mutate_view(|view| view.set_sort(sort));
    }

    /// Current view criteria.
    #[must_use]
    pub fn view_state(&self) -> ViewState {
        self.shared.view.read().state().clone()
    }

    /// Read the view model under the read lock.
    pub fn read<R>(&self, f: impl FnOnce(&ViewModel) -> R) -> R {
        f(&self.shared.view.read())
    }

    /// Window of the session's own projection.
    #[must_use]
    pub fn window(&self, request: &WindowRequest) -> BoardWindow {
        let view = self.shared.view.read();
        BoardWindow::build(view.book().records(), view.projection_indices(), request)
    }

    /// Window of the book under caller-supplied criteria, leaving the
    /// session's own criteria untouched. `None` until the snapshot is loaded.
    #[must_use]
    pub fn query(&self, state: &ViewState, request: &WindowRequest) -> Option<BoardWindow> {
        if !self.load_state().is_ready() {
            return None;
        }
        let view = self.shared.view.read();
        let records = view.book().records();
        let projection = compute_projection(records, state);
        Some(BoardWindow::build(records, &projection, request))
    }

    /// Snapshot load state.
    #[must_use]
    pub fn load_state(&self) -> LoadState {
        self.shared.load_state.borrow().clone()
    }

    /// Watch load state changes.
    #[must_use]
    pub fn subscribe_load_state(&self) -> watch::Receiver<LoadState> {
        self.shared.load_state.subscribe()
    }

    /// Realtime stream status.
    #[must_use]
    pub fn stream_status(&self) -> StreamStatus {
        *self.shared.stream_status.borrow()
    }

    /// Watch stream status changes.
    #[must_use]
    pub fn subscribe_stream_status(&self) -> watch::Receiver<StreamStatus> {
        self.shared.stream_status.subscribe()
    }

    /// Deltas merged into the book so far.
    #[must_use]
    pub fn deltas_applied(&self) -> u64 {
        self.shared.deltas_applied.load(Ordering::Relaxed)
    }

    /// Instruments in the book.
    #[must_use]
    pub fn instrument_count(&self) -> usize {
        self.shared.view.read().book().len()
    }

    /// Whether the session is still mounted.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        !self.shared.cancel.is_cancelled()
    }

    /// Tear down: stop the stream, drop pending work.
    pub fn unmount(&self) {
        if self.shared.cancel.is_cancelled() {
            return;
        }
        self.shared.cancel.cancel();
        self.shared.stream_status.send_if_modified(|status| {
            let live = status.is_live();
            if live {
                *status = StreamStatus::Closed;
            }
            live
        });
        tracing::info!("Board session unmounted");
    }
}

impl Drop for BoardSession {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

impl std::fmt::Debug for BoardSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardSession")
            .field("load_state", &self.load_state())
            .field("stream_status", &self.stream_status())
            .field("mounted", &self.is_mounted())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal::Decimal;

    use super::*;
    use crate::application::ports::{FixedClock, MockSnapshotSource};
    use crate::domain::instrument::Market;
    use crate::domain::view::{SortDirection, SortKey};

    /// Stream fed by the test through a channel.
    struct ChannelStream {
        feed: parking_lot::Mutex<Option<mpsc::Receiver<StreamEvent>>>,
        started: Arc<AtomicBool>,
    }

    impl ChannelStream {
        fn new() -> (Arc<Self>, mpsc::Sender<StreamEvent>, Arc<AtomicBool>) {
            let (tx, rx) = mpsc::channel(16);
            let started = Arc::new(AtomicBool::new(false));
            let stream = Arc::new(Self {
                feed: parking_lot::Mutex::new(Some(rx)),
                started: started.clone(),
            });
            (stream, tx, started)
        }
    }

    #[async_trait]
    impl PriceStream for ChannelStream {
        async fn run(&self, events: mpsc::Sender<StreamEvent>, cancel: CancellationToken) {
            self.started.store(true, Ordering::SeqCst);
            let Some(mut feed) = self.feed.lock().take() else {
                return;
            };
            loop {
                tokio::select! {
                    () = cancel.cancelled() => return,
                    event = feed.recv() => match event {
                        Some(event) => {
                            if events.send(event).await.is_err() {
                                return;
                            }
                        }
                        None => return,
                    },
                }
            }
        }
    }

    fn record(code: &str, name: &str, price: i64) -> InstrumentRecord {
        InstrumentRecord {
            code: code.to_string(),
            name: name.to_string(),
            market: Market::Kospi,
            current_price: Decimal::from(price),
            change_rate: Decimal::ZERO,
            volume: 0,
            market_cap: None,
        }
    }

    fn source_with(records: Vec<InstrumentRecord>) -> Arc<MockSnapshotSource> {
        let mut source = MockSnapshotSource::new();
        source
            .expect_load()
            .returning(move || Ok(records.clone()));
        Arc::new(source)
    }

    /// Friday 2026-10-16 10:00 KST.
    fn open_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 10, 16, 1, 0, 0).single().unwrap())
    }

    /// Saturday 2026-10-17 10:00 KST.
    fn closed_clock() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 10, 17, 1, 0, 0).single().unwrap())
    }

    async fn ready(session: &BoardSession) -> LoadState {
        let mut rx = session.subscribe_load_state();
        rx.wait_for(LoadState::is_settled).await.unwrap().clone()
    }

    async fn eventually(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn loads_snapshot_on_mount() {
        let (stream, _tx, _) = ChannelStream::new();
        let session = BoardSession::mount(
            source_with(vec![record("005930", "Samsung", 1000), record("000660", "SK hynix", 2000)]),
            stream,
            &closed_clock(),
            SessionConfig::default(),
        );

        assert_eq!(ready(&session).await, LoadState::Ready { instruments: 2 });
        assert_eq!(session.read(ViewModel::projection_len), 2);
    }

    #[tokio::test]
    async fn closed_market_never_starts_stream() {
        let (stream, _tx, started) = ChannelStream::new();
        let session = BoardSession::mount(
            source_with(vec![record("005930", "Samsung", 1000)]),
            stream,
            &closed_clock(),
            SessionConfig::default(),
        );

        ready(&session).await;
        tokio::task::yield_now().await;

        assert_eq!(session.stream_status(), StreamStatus::Gated);
        assert!(!started.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn open_market_applies_deltas() {
        let (stream, tx, started) = ChannelStream::new();
        let session = BoardSession::mount(
            source_with(vec![record("005930", "Samsung", 1000)]),
            stream,
            &open_clock(),
            SessionConfig::default(),
        );
        ready(&session).await;

        tx.send(StreamEvent::Connected).await.unwrap();
        tx.send(StreamEvent::Update(
            PriceDelta::new("005930")
                .with_price(Decimal::from(1050))
                .with_change_rate(Decimal::from(5)),
        ))
        .await
        .unwrap();
        tx.send(StreamEvent::Update(PriceDelta::new("999999").with_volume(1)))
            .await
            .unwrap();

        eventually(|| session.deltas_applied() == 1).await;
        assert!(started.load(Ordering::SeqCst));
        assert_eq!(session.stream_status(), StreamStatus::Connected);
        let price = session.read(|view| view.projection().next().unwrap().current_price);
        assert_eq!(price, Decimal::from(1050));
        assert_eq!(session.instrument_count(), 1);
    }

    #[tokio::test]
    async fn failed_load_can_be_reloaded() {
        let mut source = MockSnapshotSource::new();
        let mut seq = mockall::Sequence::new();
        source
            .expect_load()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(SnapshotError::Status { status: 500 }));
        source
            .expect_load()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(vec![record("005930", "Samsung", 1000)]));
        let (stream, _tx, _) = ChannelStream::new();

        let session = BoardSession::mount(
            Arc::new(source),
            stream,
            &closed_clock(),
            SessionConfig::default(),
        );

        assert!(matches!(ready(&session).await, LoadState::Failed { .. }));

        session.reload();
        let mut rx = session.subscribe_load_state();
        let state = rx.wait_for(LoadState::is_ready).await.unwrap().clone();
        assert_eq!(state, LoadState::Ready { instruments: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn search_is_debounced() {
        let (stream, _tx, _) = ChannelStream::new();
        let session = BoardSession::mount(
            source_with(vec![record("005930", "Samsung", 1000), record("000660", "SK hynix", 2000)]),
            stream,
            &closed_clock(),
            SessionConfig::default(),
        );
        ready(&session).await;

        session.search("9");
        session.search("93");
        session.search("930");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(session.read(ViewModel::projection_len), 2);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let codes: Vec<String> =
            session.read(|view| view.projection().map(|r| r.code.clone()).collect());
        assert_eq!(codes, vec!["005930"]);
        assert_eq!(session.view_state().search_term, "930");
    }

    #[tokio::test]
    async fn query_uses_its_own_criteria() {
        let (stream, _tx, _) = ChannelStream::new();
        let session = BoardSession::mount(
            source_with(vec![record("A", "a", 1), record("B", "b", 2), record("C", "c", 3)]),
            stream,
            &closed_clock(),
            SessionConfig::default(),
        );
        ready(&session).await;

        let state = ViewState::default()
            .with_sort(SortSpec::new(SortKey::CurrentPrice, SortDirection::Descending));
        let window = session
            .query(&state, &WindowRequest::fixed(52.0, 104.0, 0.0, 0))
            .unwrap();

        assert_eq!(window.total_rows, 3);
        assert_eq!(window.start, Some(0));
        assert_eq!(window.end, Some(1));
        let codes: Vec<&str> = window.rows.iter().map(|r| r.record.code.as_str()).collect();
        assert_eq!(codes, vec!["C", "B"]);
        assert_eq!(session.view_state(), ViewState::default());
    }

    #[tokio::test]
    async fn query_before_load_is_none() {
        let mut source = MockSnapshotSource::new();
        source.expect_load().returning(|| {
            Err(SnapshotError::Transport {
                message: "refused".to_string(),
            })
        });
        let (stream, _tx, _) = ChannelStream::new();
        let session = BoardSession::mount(
            Arc::new(source),
            stream,
            &closed_clock(),
            SessionConfig::default(),
        );
        ready(&session).await;

        assert!(
            session
                .query(&ViewState::default(), &WindowRequest::fixed(52.0, 520.0, 0.0, 10))
                .is_none()
        );
    }

    #[tokio::test]
    async fn unmount_stops_applying_deltas() {
        let (stream, tx, _) = ChannelStream::new();
        let session = BoardSession::mount(
            source_with(vec![record("005930", "Samsung", 1000)]),
            stream,
            &open_clock(),
            SessionConfig::default(),
        );
        ready(&session).await;
        tx.send(StreamEvent::Connected).await.unwrap();
        eventually(|| session.stream_status() == StreamStatus::Connected).await;

        session.unmount();
        let _ = tx
            .send(StreamEvent::Update(PriceDelta::new("005930").with_price(Decimal::from(1))))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(!session.is_mounted());
        assert_eq!(session.stream_status(), StreamStatus::Closed);
        assert_eq!(session.deltas_applied(), 0);
        session.reload();
        assert_eq!(session.load_state(), LoadState::Ready { instruments: 1 });
    }

    /// Records every reported outcome.
    #[derive(Debug, Default)]
    struct RecordingMetrics {
        loads: parking_lot::Mutex<Vec<LoadOutcome>>,
        deltas: parking_lot::Mutex<Vec<MergeOutcome>>,
        instruments: AtomicUsize,
        projections: AtomicUsize,
    }

    impl SessionMetrics for RecordingMetrics {
        fn snapshot_load(&self, outcome: LoadOutcome) {
            self.loads.lock().push(outcome);
        }

        fn instruments(&self, count: usize) {
            self.instruments.store(count, Ordering::SeqCst);
        }

        fn delta(&self, outcome: MergeOutcome) {
            self.deltas.lock().push(outcome);
        }

        fn projection(&self, _elapsed: Duration) {
            self.projections.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// First run connects then closes; later runs stay connected until
    /// cancelled.
    #[derive(Default)]
    struct FlakyStream {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl PriceStream for FlakyStream {
        async fn run(&self, events: mpsc::Sender<StreamEvent>, cancel: CancellationToken) {
            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            let _ = events.send(StreamEvent::Connected).await;
            if run == 0 {
                let _ = events.send(StreamEvent::Closed).await;
                return;
            }
            cancel.cancelled().await;
        }
    }

    fn kst(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).single().unwrap() - chrono::Duration::hours(9)
    }

    #[tokio::test]
    async fn reports_outcomes_through_metrics_port() {
        let metrics = Arc::new(RecordingMetrics::default());
        let (stream, tx, _) = ChannelStream::new();
        let session = BoardSession::mount(
            source_with(vec![record("005930", "Samsung", 1000), record("000660", "SK hynix", 2000)]),
            stream,
            &open_clock(),
            SessionConfig {
                metrics: metrics.clone(),
                ..SessionConfig::default()
            },
        );
        ready(&session).await;

        tx.send(StreamEvent::Update(PriceDelta::new("005930").with_volume(5)))
            .await
            .unwrap();
        tx.send(StreamEvent::Update(PriceDelta::new("999999").with_volume(5)))
            .await
            .unwrap();
        eventually(|| metrics.deltas.lock().len() == 2).await;

        assert_eq!(*metrics.loads.lock(), vec![LoadOutcome::Success]);
        assert_eq!(metrics.instruments.load(Ordering::SeqCst), 2);
        assert_eq!(
            *metrics.deltas.lock(),
            vec![MergeOutcome::Applied, MergeOutcome::UnknownCode]
        );
        assert!(metrics.projections.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn market_opening_starts_gated_session() {
        let mut source = MockSnapshotSource::new();
        source
            .expect_load()
            .times(2)
            .returning(|| Ok(vec![record("005930", "Samsung", 1000)]));
        let (stream, _tx, started) = ChannelStream::new();
        let session = BoardSession::mount(
            Arc::new(source),
            stream,
            &FixedClock(kst(2026, 10, 16, 8, 59)),
            SessionConfig::default(),
        );
        ready(&session).await;
        assert_eq!(session.stream_status(), StreamStatus::Gated);

        assert!(!session.observe_market(kst(2026, 10, 16, 8, 59)));
        assert!(session.observe_market(kst(2026, 10, 16, 9, 0)));
        assert_eq!(session.stream_status(), StreamStatus::Connecting);
        eventually(|| started.load(Ordering::SeqCst)).await;

        // Still open: nothing new to do.
        assert!(!session.observe_market(kst(2026, 10, 16, 9, 1)));
        let mut rx = session.subscribe_load_state();
        rx.wait_for(LoadState::is_ready).await.unwrap();
    }

    #[tokio::test]
    async fn next_session_reopens_closed_stream() {
        let stream = Arc::new(FlakyStream::default());
        let session = BoardSession::mount(
            source_with(vec![record("005930", "Samsung", 1000)]),
            stream.clone(),
            &FixedClock(kst(2026, 10, 16, 10, 0)),
            SessionConfig::default(),
        );
        let mut status = session.subscribe_stream_status();
        status.wait_for(|s| *s == StreamStatus::Closed).await.unwrap();

        assert!(!session.observe_market(kst(2026, 10, 16, 16, 0)));
        assert!(!session.observe_market(kst(2026, 10, 17, 10, 0)));
        assert!(session.observe_market(kst(2026, 10, 19, 9, 0)));

        status
            .wait_for(|s| *s == StreamStatus::Connected)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(session.stream_status(), StreamStatus::Connected);
        assert_eq!(stream.runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn observe_market_after_unmount_is_ignored() {
        let (stream, _tx, started) = ChannelStream::new();
        let session = BoardSession::mount(
            source_with(Vec::new()),
            stream,
            &closed_clock(),
            SessionConfig::default(),
        );
        session.unmount();

        assert!(!session.observe_market(open_clock().0));
        tokio::task::yield_now().await;
        assert!(!started.load(Ordering::SeqCst));
        assert_eq!(session.stream_status(), StreamStatus::Gated);
    }

    #[test]
    fn status_serialization() {
        assert_eq!(
            serde_json::to_value(LoadState::Ready { instruments: 3 }).unwrap(),
            serde_json::json!({"state": "ready", "instruments": 3})
        );
        assert_eq!(
            serde_json::to_value(StreamStatus::Gated).unwrap(),
            serde_json::json!("gated")
        );
        assert_eq!(StreamStatus::Connecting.as_str(), "connecting");
    }

    #[test]
    fn board_window_serializes_flat_rows() {
        let records = vec![record("005930", "Samsung", 1000)];
        let window = BoardWindow::build(&records, &[0], &WindowRequest::fixed(52.0, 520.0, 0.0, 10));

        let json = serde_json::to_value(&window).unwrap();

        assert_eq!(json["totalRows"], 1);
        assert_eq!(json["totalHeight"], 52.0);
        assert_eq!(json["rows"][0]["code"], "005930");
        assert_eq!(json["rows"][0]["offset"], 0.0);
    }
}
