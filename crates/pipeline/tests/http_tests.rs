//! HTTP collaborators against a loopback server.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use agri_common::{AgriError, Band, DateRange};
use pipeline::{
    AreaOfInterest, BandFetcher, HttpBandFetcher, PipelineConfig, SceneCatalog, StacCatalogClient,
};
use test_utils::aoi;

async fn serve(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn band_routes() -> Router {
    Router::new()
        .route("/B04.tif", get(|| async { vec![7u8; 64 * 1024] }))
        .route(
            "/slow.tif",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                vec![0u8; 16]
            }),
        )
}

#[tokio::test]
async fn test_band_streamed_to_file() {
    let addr = serve(band_routes()).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("red.tif");

    let fetcher = HttpBandFetcher::new(Duration::from_secs(10)).unwrap();
    let bytes = fetcher
        .fetch(Band::Red, &format!("http://{}/B04.tif", addr), &dest)
        .await
        .unwrap();

    assert_eq!(bytes, 64 * 1024);
    assert_eq!(std::fs::metadata(&dest).unwrap().len(), 64 * 1024);
}

#[tokio::test]
async fn test_band_not_found_is_acquisition_error() {
    let addr = serve(band_routes()).await;
    let dir = tempfile::tempdir().unwrap();

    let fetcher = HttpBandFetcher::new(Duration::from_secs(10)).unwrap();
    let err = fetcher
        .fetch(
            Band::Nir,
            &format!("http://{}/missing.tif", addr),
            &dir.path().join("nir.tif"),
        )
        .await
        .unwrap_err();

    match err {
        AgriError::Acquisition { band, message } => {
            assert_eq!(band, "nir");
            assert!(message.contains("404"), "{}", message);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_unwritable_destination_is_acquisition_error() {
    let addr = serve(band_routes()).await;
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("missing").join("red.tif");

    let fetcher = HttpBandFetcher::new(Duration::from_secs(10)).unwrap();
    let err = fetcher
        .fetch(Band::Red, &format!("http://{}/B04.tif", addr), &dest)
        .await
        .unwrap_err();

    assert!(matches!(err, AgriError::Acquisition { ref band, .. } if band == "red"));
    assert_eq!(err.stage(), "acquire");
}

#[tokio::test]
async fn test_slow_band_times_out() {
    let addr = serve(band_routes()).await;
    let dir = tempfile::tempdir().unwrap();

    let fetcher = HttpBandFetcher::new(Duration::from_millis(200)).unwrap();
    let err = fetcher
        .fetch(
            Band::Green,
            &format!("http://{}/slow.tif", addr),
            &dir.path().join("green.tif"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AgriError::AcquisitionTimeout { ref band, .. } if band == "green"));
    assert_eq!(err.stage(), "acquire");
}

fn item(id: &str, datetime: &str, cloud_cover: f64) -> Value {
    json!({
        "type": "Feature",
        "id": id,
        "properties": {"datetime": datetime, "eo:cloud_cover": cloud_cover},
        "assets": {
            "red": {"href": format!("https://example.com/{}/B04.tif", id)},
            "nir": {"href": format!("https://example.com/{}/B08.tif", id)}
        }
    })
}

/// Two pages: the first links to the second with a GET `next` link.
fn stac_routes(addr_hint: SocketAddr) -> Router {
    Router::new()
        .route(
            "/search",
            post(|State(addr): State<SocketAddr>, Json(body): Json<Value>| async move {
                assert_eq!(body["collections"][0], "sentinel-2-l2a");
                assert_eq!(body["datetime"], "2024-07-01/2024-07-31");
                Json(json!({
                    "type": "FeatureCollection",
                    "features": [
                        item("S2A_A", "2024-07-04T07:06:12.345Z", 12.0),
                        item("S2B_B", "2024-07-09T07:06:10Z", 35.0)
                    ],
                    "links": [{"rel": "next", "href": format!("http://{}/page2", addr)}]
                }))
            }),
        )
        .route(
            "/page2",
            get(|| async {
                Json(json!({
                    "type": "FeatureCollection",
                    "features": [item("S2B_C", "2024-07-14T07:06:15Z", 5.0)],
                    "links": []
                }))
            }),
        )
        .with_state(addr_hint)
}

#[tokio::test]
async fn test_stac_search_follows_pages_and_filters_cloud() {
    // Bind first so the handler can build absolute next links
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = stac_routes(addr);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = PipelineConfig {
        catalog_url: format!("http://{}", addr),
        ..PipelineConfig::default()
    };
    let client = StacCatalogClient::new(&config).unwrap();
    let range = DateRange::parse("2024-07-01", "2024-07-31").unwrap();
    let aoi = AreaOfInterest::from_ring(aoi::AL_AIN.to_vec());

    let scenes = client.search(&aoi, &range).await.unwrap();
    let ids: Vec<&str> = scenes.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["S2A_A", "S2B_C"]);
    assert_eq!(scenes[1].date.to_string(), "2024-07-14");
    assert_eq!(
        scenes[1].locator(Band::Nir),
        Some("https://example.com/S2B_C/B08.tif")
    );

    let best = pipeline::find_best_scene(&client, &aoi, &range).await.unwrap();
    assert_eq!(best.id, "S2B_C");
}

#[tokio::test]
async fn test_stac_server_error_is_catalog_error() {
    let app = Router::new().route(
        "/search",
        post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
    );
    let addr = serve(app).await;

    let config = PipelineConfig {
        catalog_url: format!("http://{}/", addr),
        ..PipelineConfig::default()
    };
    let client = StacCatalogClient::new(&config).unwrap();
    let range = DateRange::parse("2024-07-01", "2024-07-31").unwrap();
    let aoi = AreaOfInterest::from_ring(aoi::AL_AIN.to_vec());

    let err = client.search(&aoi, &range).await.unwrap_err();
    assert!(matches!(err, AgriError::Catalog(ref m) if m.contains("502")));
    assert_eq!(err.stage(), "search");
}
