//! Board HTTP server: routes, handlers and shared state.
//!
//! `/api/stocks` answers from the mounted session's book with per-request
//! criteria; `/api/stocks/reload` re-runs the snapshot load.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::application::ports::MarketClock;
use crate::application::services::{BoardSession, LoadState, StreamStatus};
use crate::domain::market_hours::is_market_open;
use crate::domain::view::{MarketFilter, SortDirection, SortKey, SortSpec, ViewState};
use crate::domain::window::WindowRequest;
use crate::infrastructure::config::ViewSettings;
use crate::infrastructure::metrics::get_metrics_handle;

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: HealthStatus,
    /// Service version.
    pub version: String,
    /// Server uptime in seconds.
    pub uptime_secs: u64,
    /// Current time.
    pub current_time: DateTime<Utc>,
    /// Whether the KRX regular session is open now.
    pub market_open: bool,
    /// Snapshot load state.
    pub snapshot: LoadState,
    /// Realtime stream status.
    pub stream: StreamStatus,
    /// Instruments on the board.
    pub instruments: usize,
    /// Deltas merged since mount.
    pub deltas_applied: u64,
}

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Snapshot loaded, stream connected or not expected.
    Healthy,
    /// Snapshot loading, or stream down while it should be up.
    Degraded,
    /// Snapshot failed.
    Unhealthy,
}

fn determine_health_status(snapshot: &LoadState, stream: StreamStatus) -> HealthStatus {
    match snapshot {
        LoadState::Failed { .. } => HealthStatus::Unhealthy,
        LoadState::Loading => HealthStatus::Degraded,
        LoadState::Ready { .. } => match stream {
            StreamStatus::Gated | StreamStatus::Connected => HealthStatus::Healthy,
            StreamStatus::Connecting | StreamStatus::Closed | StreamStatus::Failed => {
                HealthStatus::Degraded
            }
        },
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StocksResponse<T: Serialize> {
    success: bool,
    stream_status: StreamStatus,
    data: T,
}

#[derive(Debug, Serialize)]
struct ReloadResponse {
    success: bool,
    snapshot: LoadState,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

// =============================================================================
// Query Parameters
// =============================================================================

/// Query string of `GET /api/stocks`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StocksQuery {
    /// Search term against name or code.
    pub search: Option<String>,
    /// `KOSPI`, `KOSDAQ` or `ALL`.
    pub market: Option<String>,
    /// Sort key name.
    pub sort: Option<String>,
    /// `asc` or `desc`.
    pub direction: Option<String>,
    /// Scroll offset in pixels.
    pub scroll: Option<f64>,
    /// Viewport height in pixels.
    pub viewport: Option<f64>,
}

impl StocksQuery {
    /// View criteria described by the query; unknown values use defaults.
    #[must_use]
    pub fn view_state(&self) -> ViewState {
        let defaults = SortSpec::default();
        let sort = SortSpec::new(
            self.sort.as_deref().and_then(SortKey::parse).unwrap_or(defaults.key),
            self.direction
                .as_deref()
                .and_then(SortDirection::parse)
                .unwrap_or(defaults.direction),
        );

        ViewState::default()
            .with_search(self.search.as_deref().unwrap_or_default())
            .with_market(
                self.market
                    .as_deref()
                    .map_or(MarketFilter::All, MarketFilter::from_str_lenient),
            )
            .with_sort(sort)
    }

    /// Viewport described by the query, on top of the configured defaults.
    #[must_use]
    pub fn window_request(&self, view: &ViewSettings) -> WindowRequest {
        WindowRequest::fixed(
            view.row_height,
            self.viewport.unwrap_or(view.viewport_height),
            self.scroll.unwrap_or(0.0),
            view.overscan,
        )
    }
}

// =============================================================================
// Server State
// =============================================================================

/// Shared state for the HTTP server.
pub struct BoardServerState {
    version: String,
    started_at: Instant,
    session: Arc<BoardSession>,
    view: ViewSettings,
    clock: Arc<dyn MarketClock>,
}

impl BoardServerState {
    /// Create new server state.
    #[must_use]
    pub fn new(
        version: String,
        session: Arc<BoardSession>,
        view: ViewSettings,
        clock: Arc<dyn MarketClock>,
    ) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            session,
            view,
            clock,
        }
    }
}

// =============================================================================
// Server
// =============================================================================

/// Build the board router.
#[must_use]
pub fn router(state: Arc<BoardServerState>) -> Router {
    Router::new()
        .route("/api/stocks", get(stocks_handler))
        .route("/api/stocks/reload", post(reload_handler))
        .route("/health", get(health_handler))
        .route("/healthz", get(liveness_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Board HTTP server.
pub struct BoardServer {
    port: u16,
    state: Arc<BoardServerState>,
    cancel: CancellationToken,
}

impl BoardServer {
    /// Create a new server.
    #[must_use]
    pub const fn new(port: u16, state: Arc<BoardServerState>, cancel: CancellationToken) -> Self {
        Self {
            port,
            state,
            cancel,
        }
    }

    /// Run until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `HttpServerError` if binding fails or the server fails while
    /// running.
    pub async fn run(self) -> Result<(), HttpServerError> {
        let app = router(self.state);

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| HttpServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Board server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await
            .map_err(|e| HttpServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Board server stopped");
        Ok(())
    }
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn stocks_handler(
    State(state): State<Arc<BoardServerState>>,
    Query(query): Query<StocksQuery>,
) -> Response {
    let criteria = query.view_state();
    let request = query.window_request(&state.view);

    match state.session.query(&criteria, &request) {
        Some(window) => Json(StocksResponse {
            success: true,
            stream_status: state.session.stream_status(),
            data: window,
        })
        .into_response(),
        None => {
            let error = match state.session.load_state() {
                LoadState::Failed { message } => message,
                _ => "snapshot is still loading".to_string(),
            };
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorBody {
                    success: false,
                    error,
                }),
            )
                .into_response()
        }
    }
}

async fn reload_handler(State(state): State<Arc<BoardServerState>>) -> Response {
    if !state.session.is_mounted() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorBody {
                success: false,
                error: "board is shutting down".to_string(),
            }),
        )
            .into_response();
    }

    state.session.reload();
    (
        StatusCode::ACCEPTED,
        Json(ReloadResponse {
            success: true,
            snapshot: state.session.load_state(),
        }),
    )
        .into_response()
}

async fn health_handler(State(state): State<Arc<BoardServerState>>) -> impl IntoResponse {
    let response = build_health_response(&state);
    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status_code, Json(response))
}

async fn liveness_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readiness_handler(State(state): State<Arc<BoardServerState>>) -> impl IntoResponse {
    if state.session.load_state().is_ready() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    get_metrics_handle().map_or_else(
        || {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [("content-type", "text/plain")],
                "Metrics not initialized".to_string(),
            )
        },
        |handle| {
            (
                StatusCode::OK,
                [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
                handle.render(),
            )
        },
    )
}

fn build_health_response(state: &BoardServerState) -> HealthResponse {
    let snapshot = state.session.load_state();
    let stream = state.session.stream_status();

    HealthResponse {
        status: determine_health_status(&snapshot, stream),
        version: state.version.clone(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        current_time: Utc::now(),
        market_open: is_market_open(state.clock.now()),
        snapshot,
        stream,
        instruments: state.session.instrument_count(),
        deltas_applied: state.session.deltas_applied(),
    }
}

// =============================================================================
// Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, thiserror::Error)]
pub enum HttpServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use chrono::TimeZone;
    use rust_decimal::Decimal;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    use super::*;
    use crate::application::ports::{
        FixedClock, MockSnapshotSource, PriceStream, SnapshotError, StreamEvent,
    };
    use crate::application::services::SessionConfig;
    use crate::domain::instrument::{InstrumentRecord, Market};

    struct IdleStream;

    #[async_trait]
    impl PriceStream for IdleStream {
        async fn run(&self, _events: mpsc::Sender<StreamEvent>, cancel: CancellationToken) {
            cancel.cancelled().await;
        }
    }

    fn record(code: &str, name: &str, market: Market, cap: u64) -> InstrumentRecord {
        InstrumentRecord {
            code: code.to_string(),
            name: name.to_string(),
            market,
            current_price: Decimal::from(1000),
            change_rate: Decimal::ZERO,
            volume: 10,
            market_cap: Some(cap),
        }
    }

    fn saturday() -> FixedClock {
        FixedClock(Utc.with_ymd_and_hms(2026, 10, 17, 1, 0, 0).single().unwrap())
    }

    async fn app_with(
        result: Result<Vec<InstrumentRecord>, SnapshotError>,
    ) -> (Router, Arc<BoardSession>) {
        let mut source = MockSnapshotSource::new();
        source.expect_load().returning(move || result.clone());
        app_with_source(source).await
    }

    async fn app_with_source(source: MockSnapshotSource) -> (Router, Arc<BoardSession>) {
        let session = Arc::new(BoardSession::mount(
            Arc::new(source),
            Arc::new(IdleStream),
            &saturday(),
            SessionConfig::default(),
        ));
        let mut rx = session.subscribe_load_state();
        rx.wait_for(LoadState::is_settled).await.unwrap();

        let state = Arc::new(BoardServerState::new(
            "test".to_string(),
            Arc::clone(&session),
            ViewSettings::default(),
            Arc::new(saturday()),
        ));
        (router(state), session)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        send(app, "GET", uri).await
    }

    async fn send(app: Router, method: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn board() -> Vec<InstrumentRecord> {
        vec![
            record("005930", "삼성전자", Market::Kospi, 400),
            record("000660", "SK하이닉스", Market::Kospi, 100),
            record("247540", "에코프로비엠", Market::Kosdaq, 20),
        ]
    }

    #[tokio::test]
    async fn stocks_default_order_is_market_cap_desc() {
        let (app, _session) = app_with(Ok(board())).await;

        let (status, json) = get_json(app, "/api/stocks").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["streamStatus"], "gated");
        assert_eq!(json["data"]["totalRows"], 3);
        assert_eq!(json["data"]["rows"][0]["code"], "005930");
        assert_eq!(json["data"]["rows"][2]["code"], "247540");
    }

    #[tokio::test]
    async fn stocks_applies_query_criteria() {
        let (app, _session) = app_with(Ok(board())).await;

        let (status, json) = get_json(
            app,
            "/api/stocks?market=KOSPI&sort=market_cap&direction=asc",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let codes: Vec<&str> = json["data"]["rows"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["code"].as_str().unwrap())
            .collect();
        assert_eq!(codes, vec!["000660", "005930"]);
    }

    #[tokio::test]
    async fn stocks_search_by_code() {
        let (app, _session) = app_with(Ok(board())).await;

        let (_, json) = get_json(app, "/api/stocks?search=930").await;

        assert_eq!(json["data"]["totalRows"], 1);
        assert_eq!(json["data"]["rows"][0]["name"], "삼성전자");
    }

    #[tokio::test]
    async fn stocks_unavailable_when_snapshot_failed() {
        let (app, _session) = app_with(Err(SnapshotError::Status { status: 502 })).await;

        let (status, json) = get_json(app, "/api/stocks").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "snapshot request failed with HTTP 502");
    }

    #[tokio::test]
    async fn reload_recovers_from_failed_snapshot() {
        let mut source = MockSnapshotSource::new();
        let mut seq = mockall::Sequence::new();
        source
            .expect_load()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(SnapshotError::Status { status: 502 }));
        source
            .expect_load()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(board()));
        let (app, session) = app_with_source(source).await;

        let (status, _) = get_json(app.clone(), "/api/stocks").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, json) = send(app.clone(), "POST", "/api/stocks/reload").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["success"], true);

        let mut rx = session.subscribe_load_state();
        rx.wait_for(LoadState::is_ready).await.unwrap();

        let (status, json) = get_json(app, "/api/stocks").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["totalRows"], 3);
    }

    #[tokio::test]
    async fn reload_after_unmount_is_unavailable() {
        let (app, session) = app_with(Ok(board())).await;
        session.unmount();

        let (status, json) = send(app, "POST", "/api/stocks/reload").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json["success"], false);
    }

    #[tokio::test]
    async fn reload_requires_post() {
        let (app, _session) = app_with(Ok(board())).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/stocks/reload")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn market_opening_shows_live_stream() {
        let (app, session) = app_with(Ok(board())).await;
        let (_, json) = get_json(app.clone(), "/health").await;
        assert_eq!(json["stream"], "gated");

        // Monday 2026-10-19 09:00 KST.
        let opening = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).single().unwrap();
        assert!(session.observe_market(opening));
        let mut rx = session.subscribe_load_state();
        rx.wait_for(LoadState::is_settled).await.unwrap();

        let (_, json) = get_json(app.clone(), "/health").await;
        assert_eq!(json["stream"], "connecting");
        assert_eq!(json["status"], "degraded");
        let (status, json) = get_json(app, "/api/stocks").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["streamStatus"], "connecting");
    }

    #[tokio::test]
    async fn health_reports_session() {
        let (app, _session) = app_with(Ok(board())).await;

        let (status, json) = get_json(app, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["market_open"], false);
        assert_eq!(json["snapshot"]["state"], "ready");
        assert_eq!(json["stream"], "gated");
        assert_eq!(json["instruments"], 3);
    }

    #[tokio::test]
    async fn readiness_follows_snapshot() {
        let (ready_app, _a) = app_with(Ok(board())).await;
        let (failed_app, _b) = app_with(Err(SnapshotError::Status { status: 500 })).await;

        let ready = ready_app
            .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let failed = failed_app
            .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(ready.status(), StatusCode::OK);
        assert_eq!(failed.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn health_status_rules() {
        let ready = LoadState::Ready { instruments: 1 };
        assert_eq!(
            determine_health_status(&ready, StreamStatus::Gated),
            HealthStatus::Healthy
        );
        assert_eq!(
            determine_health_status(&ready, StreamStatus::Failed),
            HealthStatus::Degraded
        );
        assert_eq!(
            determine_health_status(&LoadState::Loading, StreamStatus::Connected),
            HealthStatus::Degraded
        );
        assert_eq!(
            determine_health_status(
                &LoadState::Failed {
                    message: "x".to_string()
                },
                StreamStatus::Gated
            ),
            HealthStatus::Unhealthy
        );
    }

    #[test]
    fn query_defaults_and_parsing() {
        let query = StocksQuery {
            search: Some("  sam ".to_string()),
            market: Some("kosdaq".to_string()),
            sort: Some("volume".to_string()),
            direction: Some("asc".to_string()),
            scroll: Some(104.0),
            viewport: None,
        };

        let state = query.view_state();
        assert_eq!(state.search_term, "sam");
        assert_eq!(state.market_filter, MarketFilter::Only(Market::Kosdaq));
        assert_eq!(state.sort, SortSpec::new(SortKey::Volume, SortDirection::Ascending));

        let request = query.window_request(&ViewSettings::default());
        assert!((request.scroll_offset - 104.0).abs() < f64::EPSILON);
        assert!((request.viewport_height - 520.0).abs() < f64::EPSILON);
        assert_eq!(request.overscan, 10);

        assert_eq!(StocksQuery::default().view_state(), ViewState::default());
    }
}
