//! Integration tests for the Yahoo chart adapter against a mock HTTP server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use rfactor_scanner::data::{
    DataProvider, FetchError, HistoryFetcher, ProviderError, SnapshotCache, YahooChartAdapter,
};

const DAY: i64 = 86_400;
const START: i64 = 1_717_386_300;

/// Chart payload with `n` sessions; the last close is `last_close`.
fn chart_body(n: usize, last_close: f64) -> serde_json::Value {
    let timestamps: Vec<i64> = (0..n as i64).map(|i| START + i * DAY).collect();
    let closes: Vec<f64> = (0..n)
        .map(|i| if i + 1 == n { last_close } else { 4_000.0 })
        .collect();
    let highs: Vec<f64> = closes.iter().map(|c| c.max(4_000.0) + 40.0).collect();
    let lows: Vec<f64> = closes.iter().map(|c| c.min(4_000.0) - 40.0).collect();

    json!({
        "chart": {
            "result": [{
                "meta": { "symbol": "HDFCAMC.NS", "currency": "INR" },
                "timestamp": timestamps,
                "indicators": {
                    "quote": [{
                        "open": vec![4_000.0; n],
                        "high": highs,
                        "low": lows,
                        "close": closes,
                        "volume": vec![250_000u64; n]
                    }]
                }
            }],
            "error": null
        }
    })
}

fn adapter(server: &MockServer) -> YahooChartAdapter {
    YahooChartAdapter::new(server.uri(), ".NS")
}

#[tokio::test]
async fn test_fetch_bars_requests_suffixed_ticker() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/HDFCAMC.NS"))
        .and(query_param("range", "1mo"))
        .and(query_param("interval", "1d"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chart_body(21, 4_200.0)))
        .expect(1)
        .mount(&server)
        .await;

    let bars = adapter(&server).fetch_bars("hdfcamc").await.unwrap();

    assert_eq!(bars.len(), 21);
    assert_eq!(bars[20].close, 4_200.0);
    assert_eq!(bars[0].volume, 250_000.0);
    assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
}

#[tokio::test]
async fn test_null_closes_are_skipped() {
    let server = MockServer::start().await;
    let body = json!({
        "chart": {
            "result": [{
                "timestamp": [START, START + DAY, START + 2 * DAY],
                "indicators": {
                    "quote": [{
                        "open": [10.0, null, 11.0],
                        "high": [10.5, null, 11.5],
                        "low": [9.5, null, 10.5],
                        "close": [10.0, null, 11.0],
                        "volume": [100, null, null]
                    }]
                }
            }],
            "error": null
        }
    });
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/TCS.NS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;

    let bars = adapter(&server).fetch_bars("TCS").await.unwrap();

    assert_eq!(bars.len(), 2);
    assert_eq!(bars[1].close, 11.0);
    assert_eq!(bars[1].volume, 0.0);
}

#[tokio::test]
async fn test_not_found_maps_to_symbol_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/NOPE.NS"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
            }
        })))
        .mount(&server)
        .await;

    let err = adapter(&server).fetch_bars("NOPE").await.unwrap_err();
    assert_eq!(err, ProviderError::SymbolNotFound("NOPE.NS".into()));
    assert!(!err.is_transport());
}

#[tokio::test]
async fn test_chart_error_payload_maps_to_symbol_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/GONE.NS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "chart": {
                "result": null,
                "error": { "code": "Not Found", "description": "delisted" }
            }
        })))
        .mount(&server)
        .await;

    let err = adapter(&server).fetch_bars("GONE").await.unwrap_err();
    assert!(matches!(err, ProviderError::SymbolNotFound(_)));
}

#[tokio::test]
async fn test_rate_limited_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "42"))
        .mount(&server)
        .await;

    let err = adapter(&server).fetch_bars("INFY").await.unwrap_err();
    assert_eq!(
        err,
        ProviderError::RateLimited {
            retry_after_secs: Some(42)
        }
    );
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_server_error_maps_to_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = adapter(&server).fetch_bars("INFY").await.unwrap_err();
    assert!(matches!(err, ProviderError::Unavailable(_)));
}

#[tokio::test]
async fn test_garbage_body_maps_to_malformed_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let err = adapter(&server).fetch_bars("INFY").await.unwrap_err();
    assert!(matches!(err, ProviderError::MalformedResponse(_)));
    assert!(!err.is_transport());
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    // Nothing listens on the discard port
    let adapter = YahooChartAdapter::with_window(
        "http://127.0.0.1:9",
        ".NS",
        "1mo",
        "1d",
        Duration::from_secs(2),
    );

    let err = adapter.fetch_bars("INFY").await.unwrap_err();
    assert!(matches!(err, ProviderError::Network(_)));
}

#[tokio::test]
async fn test_fetcher_over_http_caches_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/HDFCAMC.NS"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chart_body(21, 4_200.0)))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = HistoryFetcher::new(
        Arc::new(adapter(&server)),
        Arc::new(SnapshotCache::new(Duration::from_secs(60))),
    );

    let first = fetcher.fetch("HDFCAMC").await.unwrap();
    let second = fetcher.fetch("HDFCAMC").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.current_price, 4_200.0);
    assert_eq!(first.prev_close, 4_000.0);
    assert_eq!(first.avg_volume, 250_000.0);
}

#[tokio::test]
async fn test_fetcher_rejects_short_history() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chart_body(6, 4_100.0)))
        .mount(&server)
        .await;

    let fetcher = HistoryFetcher::new(
        Arc::new(adapter(&server)),
        Arc::new(SnapshotCache::new(Duration::from_secs(60))),
    );

    let err = fetcher.fetch_detailed("NEWLIST").await.unwrap_err();
    assert!(matches!(err, FetchError::InsufficientHistory { bars: 6, .. }));
}
