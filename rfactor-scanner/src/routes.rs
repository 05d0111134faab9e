//! HTTP routes for the scanner service.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use rfactor_common::config::ScanModeName;
use rfactor_common::{Error, ResultExt};

use crate::data::universe::{self, QUICK_SCAN_SIZE, TEST_SYMBOLS};
use crate::data::{CacheStats, FetchError, ScanMode, SymbolSnapshot};
use crate::export;
use crate::scanner::{
    assemble, rank, top_by_direction, ScanFilter, ScanOutcome, ScanProgress, ScanRecord,
    ScanSummary,
};
use crate::scoring::{Direction, ScoreResult, Signal};
use crate::ScannerState;

/// Rows per direction in the dashboard's top lists.
const TOP_N: usize = 10;

// ============================================================================
// Errors
// ============================================================================

/// Error body returned by every handler.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup_hint: Option<String>,
}

/// Handler error: a workspace error plus an optional provider hint.
#[derive(Debug)]
pub struct ApiError {
    error: Error,
    lookup_hint: Option<String>,
}

impl ApiError {
    fn with_hint(mut self, hint: Option<String>) -> Self {
        self.lookup_hint = hint;
        self
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self {
            error,
            lookup_hint: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.error.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::warn!(status = %status, error = %self.error, "Request failed");
        } else if !self.error.is_not_found() {
            tracing::debug!(status = %status, error = %self.error, "Request rejected");
        }
        let body = ErrorBody {
            error: self.error.to_string(),
            lookup_hint: self.lookup_hint,
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    pub provider: &'static str,
    pub market_suffix: String,
    pub cache: CacheStats,
}

#[derive(Debug, Serialize)]
pub struct UniverseResponse {
    pub count: usize,
    pub symbols: Vec<String>,
    pub test_symbols: Vec<&'static str>,
    pub quick_size: usize,
    pub default_mode: ScanModeName,
}

/// Scan request. `symbols` wins over `mode` when both are present.
#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub mode: Option<ScanModeName>,
    #[serde(default)]
    pub symbols: Option<Vec<String>>,
}

impl ScanRequest {
    fn into_mode(self, default_mode: ScanModeName) -> ScanMode {
        match (self.symbols, self.mode) {
            (Some(symbols), _) => ScanMode::custom(symbols),
            (None, Some(mode)) => mode.into(),
            (None, None) => default_mode.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub scan_id: String,
    pub outcome: ScanOutcome,
    pub message: &'static str,
    pub total: usize,
    pub succeeded: usize,
    pub failed: Vec<String>,
    pub failure_summary: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProgressResponse {
    pub running: bool,
    pub fraction: f64,
    pub message: Option<String>,
    pub progress: Option<ScanProgress>,
}

/// Query for the latest scan view.
///
/// `signal` and `direction` take comma-separated values; `all` disables
/// that filter.
#[derive(Debug, Default, Deserialize)]
pub struct LatestQuery {
    pub signal: Option<String>,
    pub direction: Option<String>,
    pub limit: Option<usize>,
}

impl LatestQuery {
    fn filter(&self) -> ApiResult<ScanFilter> {
        let mut filter = ScanFilter::default();
        if let Some(raw) = &self.signal {
            filter = filter.with_signals(parse_list::<Signal>(raw)?);
        }
        if let Some(raw) = &self.direction {
            filter = filter.with_directions(parse_list::<Direction>(raw)?);
        }
        Ok(filter)
    }
}

fn parse_list<T>(raw: &str) -> ApiResult<Vec<T>>
where
    T: FromStr<Err = String>,
{
    if raw.trim().eq_ignore_ascii_case("all") {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| T::from_str(s).map_err(|e| ApiError::from(Error::InvalidInput(e))))
        .collect()
}

#[derive(Debug, Serialize)]
pub struct LatestResponse {
    pub scan_id: String,
    pub completed_at: String,
    pub outcome: ScanOutcome,
    pub message: &'static str,
    pub summary: ScanSummary,
    pub records: Vec<ScanRecord>,
    pub top_upside: Vec<ScanRecord>,
    pub top_downside: Vec<ScanRecord>,
    pub failed: Vec<String>,
    pub failure_summary: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SymbolResponse {
    pub snapshot: SymbolSnapshot,
    pub score: ScoreResult,
    pub record: ScanRecord,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Health check endpoint
pub async fn health(State(state): State<Arc<ScannerState>>) -> Json<HealthResponse> {
    let fetcher = state.scanner.fetcher();
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        service: "rfactor-scanner",
        provider: fetcher.provider().name(),
        market_suffix: fetcher.provider().market_suffix().to_string(),
        cache: fetcher.cache().stats(),
    })
}

/// Symbol universe and scan presets
pub async fn get_universe(State(state): State<Arc<ScannerState>>) -> Json<UniverseResponse> {
    Json(UniverseResponse {
        count: state.universe.len(),
        symbols: state.universe.clone(),
        test_symbols: TEST_SYMBOLS.to_vec(),
        quick_size: QUICK_SCAN_SIZE.min(state.universe.len()),
        default_mode: state.config.scanner.default_mode,
    })
}

/// Run a scan and publish it as the latest result
pub async fn run_scan(
    State(state): State<Arc<ScannerState>>,
    body: Option<Json<ScanRequest>>,
) -> ApiResult<Json<ScanResponse>> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let mode = request.into_mode(state.config.scanner.default_mode);

    let result = state.run_scan(mode).await?;

    Ok(Json(ScanResponse {
        scan_id: result.scan_id.clone(),
        outcome: result.outcome,
        message: result.outcome.user_message(),
        total: result.total,
        succeeded: result.records.len(),
        failed: result.failed.clone(),
        failure_summary: result.failure_summary(),
    }))
}

/// Progress of the running (or last) scan
pub async fn get_progress(State(state): State<Arc<ScannerState>>) -> Json<ProgressResponse> {
    let progress = state.progress.last();
    Json(ProgressResponse {
        running: state.progress.is_running(),
        fraction: progress.as_ref().map(ScanProgress::fraction).unwrap_or(0.0),
        message: progress.as_ref().map(ScanProgress::message),
        progress,
    })
}

/// Ranked view of the latest scan
pub async fn get_latest(
    State(state): State<Arc<ScannerState>>,
    Query(query): Query<LatestQuery>,
) -> ApiResult<Json<LatestResponse>> {
    let filter = query.filter()?;
    let result = state
        .latest()
        .await
        .ok_or_else(|| Error::NotFound("No scan has completed yet".into()))?;

    let ranked = rank(&result.records, &filter);
    let summary = ScanSummary::compute(&result.records, &ranked);
    let top_upside = top_by_direction(&ranked, Direction::Upside, TOP_N);
    let top_downside = top_by_direction(&ranked, Direction::Downside, TOP_N);

    let mut records = ranked;
    if let Some(limit) = query.limit {
        records.truncate(limit);
    }

    Ok(Json(LatestResponse {
        scan_id: result.scan_id.clone(),
        completed_at: result.completed_at.to_rfc3339(),
        outcome: result.outcome,
        message: result.outcome.user_message(),
        summary,
        records,
        top_upside,
        top_downside,
        failed: result.failed.clone(),
        failure_summary: result.failure_summary(),
    }))
}

/// CSV download of the latest scan, filtered and ranked like `get_latest`
pub async fn get_latest_csv(
    State(state): State<Arc<ScannerState>>,
    Query(query): Query<LatestQuery>,
) -> ApiResult<Response> {
    let filter = query.filter()?;
    let result = state
        .latest()
        .await
        .ok_or_else(|| Error::NotFound("No scan has completed yet".into()))?;

    let mut ranked = rank(&result.records, &filter);
    if let Some(limit) = query.limit {
        ranked.truncate(limit);
    }

    let body = export::to_csv_string(&ranked)
        .map_err(|e| Error::Internal(e.to_string()))
        .context("CSV export")?;
    let file_name = export::export_file_name(&chrono::Local::now());

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
        .into_response())
}

/// Fetch and score one symbol
pub async fn get_symbol(
    State(state): State<Arc<ScannerState>>,
    Path(symbol): Path<String>,
) -> ApiResult<Json<SymbolResponse>> {
    let symbol = universe::normalize_symbols([symbol])
        .pop()
        .ok_or_else(|| Error::InvalidInput("Symbol is empty".into()))?;

    let diagnosed = state.scanner.diagnose(&symbol).await;
    state.scanner.fetcher().cache().clear_expired();

    match diagnosed {
        Ok(scored) => {
            let record = assemble(&scored.snapshot, &scored.score);
            Ok(Json(SymbolResponse {
                snapshot: scored.snapshot,
                score: scored.score,
                record,
            }))
        }
        Err(e) => Err(fetch_error(&state, &symbol, e)),
    }
}

fn fetch_error(state: &ScannerState, symbol: &str, e: FetchError) -> ApiError {
    if e.is_transport() {
        return Error::External(e.to_string()).into();
    }
    let hint = state.scanner.fetcher().provider().lookup_hint(symbol);
    ApiError::from(Error::NotFound(format!("{}: {}", symbol, e))).with_hint(hint)
}

// ============================================================================
// Router
// ============================================================================

/// Build the HTTP router with all routes and middleware.
pub fn router(state: Arc<ScannerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/universe", get(get_universe))
        .route("/api/v1/scan", post(run_scan))
        .route("/api/v1/scan/progress", get(get_progress))
        .route("/api/v1/scan/latest", get(get_latest))
        .route("/api/v1/scan/latest/csv", get(get_latest_csv))
        .route("/api/v1/symbols/:symbol", get(get_symbol))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Bar, DataProvider, ProviderError};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{Duration, TimeZone, Utc};
    use http_body_util::BodyExt;
    use rfactor_common::config::Config;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tower::ServiceExt;

    /// Serves a rising series for known symbols and 404s the rest.
    struct FixtureProvider {
        calls: AtomicU32,
    }

    #[async_trait]
    impl DataProvider for FixtureProvider {
        fn name(&self) -> &'static str {
            "fixture"
        }

        fn market_suffix(&self) -> &str {
            ".FX"
        }

        fn lookup_hint(&self, symbol: &str) -> Option<String> {
            Some(format!("https://example.test/quote/{}", symbol))
        }

        async fn fetch_bars(&self, symbol: &str) -> Result<Vec<Bar>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let last_close = match symbol {
                "UPMOVE" => 108.0,
                "FLAT" => 100.5,
                "DOWNMOVE" => 97.0,
                "OFFLINE" => return Err(ProviderError::Network("connection refused".into())),
                _ => return Err(ProviderError::SymbolNotFound(symbol.to_string())),
            };

            let start = Utc.with_ymd_and_hms(2024, 6, 3, 3, 45, 0).unwrap();
            let mut bars: Vec<Bar> = (0..20)
                .map(|i| Bar {
                    timestamp: start + Duration::days(i),
                    open: 100.0,
                    high: 101.0,
                    low: 99.0,
                    close: 100.0,
                    volume: 1_000.0,
                })
                .collect();
            if let Some(last) = bars.last_mut() {
                last.close = last_close;
                last.high = last_close.max(101.0);
                last.low = last_close.min(99.0);
            }
            Ok(bars)
        }
    }

    fn test_state() -> Arc<ScannerState> {
        test_state_with_ttl(Config::default().scanner.cache_ttl_secs)
    }

    fn test_state_with_ttl(cache_ttl_secs: u64) -> Arc<ScannerState> {
        let mut config = Config::default();
        config.scanner.request_delay_ms = 0;
        config.scanner.cache_ttl_secs = cache_ttl_secs;
        config.scanner.universe = Some(vec![
            "UPMOVE".into(),
            "FLAT".into(),
            "DOWNMOVE".into(),
            "MISSING".into(),
        ]);
        let provider = Arc::new(FixtureProvider {
            calls: AtomicU32::new(0),
        });
        Arc::new(ScannerState::with_provider(config, provider))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_scan(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/scan")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = router(test_state()).oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["provider"], "fixture");
        assert_eq!(json["market_suffix"], ".FX");
    }

    #[tokio::test]
    async fn test_universe_uses_config_override() {
        let response = router(test_state())
            .oneshot(get("/api/v1/universe"))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["count"], 4);
        assert_eq!(json["quick_size"], 4);
        assert_eq!(json["symbols"][0], "UPMOVE");
    }

    #[tokio::test]
    async fn test_latest_before_any_scan_is_404() {
        let response = router(test_state())
            .oneshot(get("/api/v1/scan/latest"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_scan_then_latest() {
        let state = test_state();
        let app = router(state.clone());

        let response = app
            .clone()
            .oneshot(post_scan(r#"{"mode": "full"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["outcome"], "partial");
        assert_eq!(json["succeeded"], 3);
        assert_eq!(json["failed"][0], "MISSING");

        let response = app.oneshot(get("/api/v1/scan/latest")).await.unwrap();
        let json = body_json(response).await;
        let records = json["records"].as_array().unwrap();
        assert_eq!(records.len(), 3);
        // UPMOVE (+8%) ranks first, FLAT (+0.5%) last
        assert_eq!(records[0]["symbol"], "UPMOVE");
        assert_eq!(records[0]["signal"], "ACTIVE");
        assert_eq!(records[2]["symbol"], "FLAT");
        assert_eq!(json["summary"]["total"], 3);
        assert_eq!(json["top_downside"][0]["symbol"], "DOWNMOVE");
    }

    #[tokio::test]
    async fn test_latest_filters_and_limit() {
        let state = test_state();
        let app = router(state.clone());
        app.clone()
            .oneshot(post_scan(r#"{"mode": "full"}"#))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(get("/api/v1/scan/latest?direction=downside"))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["records"].as_array().unwrap().len(), 1);

        let response = app
            .clone()
            .oneshot(get("/api/v1/scan/latest?signal=all&limit=1"))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["records"].as_array().unwrap().len(), 1);
        assert_eq!(json["summary"]["shown"], 3);

        let response = app
            .oneshot(get("/api/v1/scan/latest?signal=bogus"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_custom_symbols_are_normalized() {
        let state = test_state();
        let response = router(state.clone())
            .oneshot(post_scan(r#"{"symbols": [" upmove ", "", "UPMOVE"]}"#))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["total"], 1);
        assert_eq!(json["outcome"], "complete");
    }

    #[tokio::test]
    async fn test_empty_custom_list_is_rejected() {
        let response = router(test_state())
            .oneshot(post_scan(r#"{"symbols": ["  "]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_progress_after_scan() {
        let state = test_state();
        let app = router(state.clone());
        app.clone()
            .oneshot(post_scan(r#"{"mode": "full"}"#))
            .await
            .unwrap();

        let json = body_json(app.oneshot(get("/api/v1/scan/progress")).await.unwrap()).await;
        assert_eq!(json["running"], false);
        assert_eq!(json["fraction"], 1.0);
        assert_eq!(json["progress"]["symbol"], "MISSING");
    }

    #[tokio::test]
    async fn test_latest_csv_download() {
        let state = test_state();
        let app = router(state.clone());
        app.clone()
            .oneshot(post_scan(r#"{"mode": "full"}"#))
            .await
            .unwrap();

        let response = app.oneshot(get("/api/v1/scan/latest/csv")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains("rfactor_live_"));

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.starts_with("Symbol,LTP,Prev Close"));
        assert_eq!(text.lines().count(), 4);
    }

    #[tokio::test]
    async fn test_symbol_diagnostics() {
        let app = router(test_state());

        let response = app
            .clone()
            .oneshot(get("/api/v1/symbols/upmove"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["snapshot"]["symbol"], "UPMOVE");
        assert_eq!(json["score"]["direction"], "UPSIDE");

        let response = app
            .clone()
            .oneshot(get("/api/v1/symbols/MISSING"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["lookup_hint"], "https://example.test/quote/MISSING");

        let response = app.oneshot(get("/api/v1/symbols/OFFLINE")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_symbol_lookups_do_not_grow_cache() {
        let state = test_state_with_ttl(0);
        let app = router(state.clone());

        for symbol in ["UPMOVE", "MISSING", "GHOST1", "GHOST2"] {
            let uri = format!("/api/v1/symbols/{}", symbol);
            app.clone().oneshot(get(&uri)).await.unwrap();
        }

        let stats = state.scanner.fetcher().cache().stats();
        assert_eq!(stats.total_entries, 0);
    }
}
