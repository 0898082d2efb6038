//! End-to-end tests against a bound server, using the typed API client

mod support;

use reqwest::StatusCode;
use url::Url;

use gary_daemon::http_server::api::client::{ApiClient, ApiError};
use gary_daemon::http_server::health::{
    LivezRequest, MetricsRequest, ReadyzRequest, VersionRequest,
};
use gary_daemon::http_server::lines::{JokeRequest, QuoteRequest};
use gary_daemon::http_server::namespace::{CountRequest, UrlRequest};
use gary_daemon::start_service;

use crate::support::{init_tracing, Fixture};

#[tokio::test]
async fn test_service_end_to_end() {
    init_tracing();
    let fixture = Fixture::new();
    fixture.write(&fixture.gary_dir, "Gary3.jpg", b"three");
    let quotes = fixture.write(fixture.root.path(), "quotes.json", br#"["only quote"]"#);

    let mut config = fixture.config();
    config.quotes_file = Some(quotes);

    let (_state, handle) = start_service(&config).await.unwrap();
    let remote = Url::parse(&format!("http://{}", handle.local_addr())).unwrap();
    let client = ApiClient::new(&remote).unwrap();

    let livez = client.call(LivezRequest {}).await.unwrap();
    assert_eq!(livez.status, "ok");

    let readyz = client.call(ReadyzRequest {}).await.unwrap();
    assert!(readyz.is_ok(), "unexpected readiness: {:?}", readyz);
    assert_eq!(readyz.files["gary"], 1);
    assert_eq!(readyz.files["goober"], 0);

    let version = client.call(VersionRequest {}).await.unwrap();
    assert_eq!(version.name, "gary-daemon");

    let url = client
        .call(UrlRequest {
            namespace: "gary".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(url.url, "http://localhost:8080/Gary/Gary3.jpg");
    assert_eq!(url.number, 3);

    let url = client
        .call(UrlRequest {
            namespace: "goober".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(url.url, "http://localhost:8080/Goober/goober8.jpg");

    let count = client
        .call(CountRequest {
            namespace: "gary".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(count.count, 1);

    let quote = client.call(QuoteRequest {}).await.unwrap();
    assert_eq!(quote.quote, "only quote");

    match client.call(JokeRequest {}).await {
        Err(ApiError::HttpStatus(status, _)) => assert_eq!(status, StatusCode::NOT_FOUND),
        other => panic!("expected 404 for unconfigured jokes, got {:?}", other),
    }

    let image = reqwest::get(format!("{}gary/image", remote)).await.unwrap();
    assert_eq!(image.status(), StatusCode::OK);
    assert_eq!(image.headers()["cache-control"], "no-store");
    assert_eq!(&image.bytes().await.unwrap()[..], b"three");

    // Every request above went through the metrics middleware
    let metrics = client.call(MetricsRequest {}).await.unwrap();
    assert!(metrics.requests >= 9, "unexpected metrics: {:?}", metrics);
    assert!(metrics.average_response_micros > 0.0);
    assert_eq!(metrics.image_cache.entries, 1);
    assert_eq!(metrics.image_cache.bytes, 5);

    handle.shutdown();
    handle.wait().await.unwrap();

    assert!(matches!(
        client.call(LivezRequest {}).await,
        Err(ApiError::Reqwest(_))
    ));
}
