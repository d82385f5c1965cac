//! Mock VHS analyzer backend shared by the integration tests.

#![allow(dead_code)]

use std::{collections::HashMap, collections::VecDeque, sync::Arc, time::Duration};

use bytes::Bytes;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use vhs_client::{BusyFlag, ClientConfig, ImageFile, Profile, VhsClient};
use warp::reply::Reply;
use warp::Filter;

/// What the mock saw of one analyze request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RecordedRequest {
    pub include_overlay: Option<String>,
    pub field: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Default)]
pub struct MockState {
    /// Answers given in order, one per analyze request.
    pub responses: VecDeque<(u16, Value)>,
    /// Answer once `responses` is exhausted.
    pub fallback: Option<(u16, Value)>,
    /// Holds every analyze answer back for this long.
    pub delay: Option<Duration>,
    pub health: Option<(u16, Value)>,
    /// Holds every health answer back for this long.
    pub health_delay: Option<Duration>,
    pub requests: Vec<RecordedRequest>,
    pub health_hits: usize,
}

pub fn sample_result() -> Value {
    json!({
        "success": true,
        "keypoints": [[101.0, 220.5], [388.0, 241.0], [240.0, 120.0], [236.5, 330.0]],
        "vhs_measurements": {
            "vhs_score": 9.7,
            "long_axis": 5.3,
            "short_axis": 4.4,
            "long_axis_vertebrae": 5,
            "short_axis_vertebrae": 4
        },
        "clinical_classification": {
            "classification": "normal",
            "severity": "none",
            "confidence": "high",
            "recommendation": "No cardiac enlargement detected",
            "clinical_notes": []
        },
        "metadata": {"model_version": "hrnet-1.2", "timestamp": "2026-10-19T08:00:00Z"},
        "overlay_image": "iVBORw0KGgo=",
        "processing_time_ms": 1532.0
    })
}

pub fn radiograph() -> ImageFile {
    ImageFile::new("rx.png", "image/png", b"\x89PNG\r\n\x1a\nradiograph pixels".to_vec())
}

async fn parse_upload(content_type: &str, body: Bytes) -> RecordedRequest {
    let mut recorded = RecordedRequest::default();
    let boundary = match multer::parse_boundary(content_type) {
        Ok(boundary) => boundary,
        Err(_) => return recorded,
    };
    let stream = futures_util::stream::iter(vec![Ok::<_, std::io::Error>(body)]);
    let mut multipart = multer::Multipart::new(stream, boundary);
    if let Ok(Some(field)) = multipart.next_field().await {
        recorded.field = field.name().map(str::to_string);
        recorded.file_name = field.file_name().map(str::to_string);
        recorded.content_type = field.content_type().map(|m| m.to_string());
        recorded.data = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
    }
    recorded
}

fn reply((status, body): (u16, Value)) -> warp::reply::Response {
    let status =
        warp::http::StatusCode::from_u16(status).unwrap_or(warp::http::StatusCode::OK);
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

fn mock_routes(
    state: Arc<Mutex<MockState>>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let analyze_state = state.clone();
    let analyze = warp::path!("v1" / "vhs" / "analyze")
        .and(warp::post())
        .and(warp::query::<HashMap<String, String>>())
        .and(warp::header::<String>("content-type"))
        .and(warp::body::bytes())
        .and(warp::any().map(move || analyze_state.clone()))
        .and_then(
            |query: HashMap<String, String>,
             content_type: String,
             body: Bytes,
             state: Arc<Mutex<MockState>>| async move {
                let mut recorded = parse_upload(&content_type, body).await;
                recorded.include_overlay = query.get("includeOverlay").cloned();

                let (answer, delay) = {
                    let mut s = state.lock().await;
                    s.requests.push(recorded);
                    let answer = s
                        .responses
                        .pop_front()
                        .or_else(|| s.fallback.clone())
                        .unwrap_or((500, json!({"success": false})));
                    (answer, s.delay)
                };

                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok::<_, warp::Rejection>(reply(answer))
            },
        );

    let health_state = state;
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(warp::any().map(move || health_state.clone()))
        .and_then(|state: Arc<Mutex<MockState>>| async move {
            let (answer, delay) = {
                let mut s = state.lock().await;
                s.health_hits += 1;
                let answer = s.health.clone().unwrap_or((
                    200,
                    json!({"status": "healthy", "timestamp": "2026-10-19T08:00:00Z"}),
                ));
                (answer, s.health_delay)
            };

            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, warp::Rejection>(reply(answer))
        });

    analyze.or(health)
}

/// Starts a mock backend on a random port. Returns its origin and state.
pub async fn start_mock_backend() -> (String, Arc<Mutex<MockState>>) {
    let state = Arc::new(Mutex::new(MockState::default()));
    let routes = mock_routes(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);
        warp::serve(routes).run_incoming(incoming).await;
    });

    (format!("http://127.0.0.1:{}", port), state)
}

/// Client of `base_url` with `retry_attempts` retries spaced by `retry_delay`.
pub fn client(base_url: &str, retry_attempts: u32, retry_delay: Duration) -> VhsClient {
    let mut config = ClientConfig::new(base_url, Profile::Development).unwrap();
    config.retry_attempts = retry_attempts;
    config.retry_delay = retry_delay;
    VhsClient::new(config, Arc::new(BusyFlag::new())).unwrap()
}
