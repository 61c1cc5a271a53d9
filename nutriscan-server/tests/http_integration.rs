//! HTTP integration tests for the NutriScan API
//!
//! Drive the full Axum router via `oneshot` with a stub classifier, so no
//! model artifacts are needed. The last test exercises a real ONNX model when
//! `NUTRISCAN_MODEL_DIR` points at one and skips otherwise.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use image::{ImageFormat, Rgb, RgbImage};
use nutriscan_core::{
    ClassifierError, ClassifierLoad, ImageClassifier, LabelTable, MacroRecord, NutriScanConfig,
    NutritionCatalog, Scanner,
};
use nutriscan_server::http::{build_router, HttpState};
use nutriscan_server::sessions::SessionRegistry;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Always predicts the same class index.
struct StubClassifier(usize);

#[async_trait]
impl ImageClassifier for StubClassifier {
    async fn classify(&self, _image: RgbImage) -> Result<usize, ClassifierError> {
        Ok(self.0)
    }

    fn name(&self) -> &str {
        "stub"
    }
}

fn catalog() -> Arc<NutritionCatalog> {
    Arc::new(NutritionCatalog::from_entries(vec![
        ("CHICKEN".to_string(), MacroRecord::new(239.0, 27.0, 0.0, 14.0)),
        ("RICE".to_string(), MacroRecord::new(130.0, 2.7, 28.0, 0.3)),
    ]))
}

fn make_state(classifier: ClassifierLoad, config: NutriScanConfig) -> Arc<HttpState> {
    Arc::new(HttpState {
        scanner: Arc::new(Scanner::new(classifier, catalog(), LabelTable::default(), 60)),
        sessions: Arc::new(SessionRegistry::new(Duration::from_secs(600))),
        config,
    })
}

fn stub_state(index: usize) -> Arc<HttpState> {
    make_state(
        ClassifierLoad::Loaded(Arc::new(StubClassifier(index))),
        NutriScanConfig::default(),
    )
}

fn meal_png() -> Vec<u8> {
    let img = RgbImage::from_fn(32, 24, |x, y| Rgb([(x * 8) as u8, (y * 10) as u8, 90]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn new_session(app: &axum::Router) -> String {
    let req = Request::builder()
        .method("POST")
        .uri("/sessions")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app, req).await;
    assert_eq!(status, StatusCode::CREATED);
    body["session_id"].as_str().unwrap().to_string()
}

fn scan_request(session: &str, bytes: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/sessions/{session}/scan"))
        .header("content-type", "image/png")
        .body(Body::from(bytes))
        .unwrap()
}

fn history_request(session: &str, method: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(format!("/sessions/{session}/history"))
        .body(Body::empty())
        .unwrap()
}

// ===========================================================================
// TEST 1: GET /version — returns version and protocol
// ===========================================================================
#[tokio::test]
async fn test_version_endpoint() {
    let app = build_router(stub_state(2));
    let req = Request::builder()
        .uri("/version")
        .body(Body::empty())
        .unwrap();

    let (status, json) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["version"].is_string());
    assert_eq!(json["protocol"], "nutriscan/1");
}

// ===========================================================================
// TEST 2: GET / — serves the single-page UI
// ===========================================================================
#[tokio::test]
async fn test_index_serves_html() {
    let app = build_router(stub_state(2));
    let req = Request::builder().uri("/").body(Body::empty()).unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("NutriScan AI"));
    // Expired sessions are renewed and non-JSON error bodies still render.
    assert!(html.contains("'session_not_found'"));
    assert!(html.contains("JSON.parse(text)"));
}

// ===========================================================================
// TEST 3: scan → history → clear, end to end
// ===========================================================================
#[tokio::test]
async fn test_scan_history_clear_flow() {
    let app = build_router(stub_state(2));
    let session = new_session(&app).await;

    let (status, body) = send(&app, scan_request(&session, meal_png())).await;
    assert_eq!(status, StatusCode::OK, "scan body: {body:?}");
    assert_eq!(body["status"], "success");
    assert_eq!(body["label"], "CHICKEN");
    assert_eq!(body["macros"]["calories"], 239.0);
    assert_eq!(body["macros"]["protein"], 27.0);
    assert_eq!(body["macros"]["carbs"], 0.0);
    assert_eq!(body["macros"]["fat"], 14.0);
    assert_eq!(body["chart"]["slices"][2]["label"], "Protein");

    let (status, history) = send(&app, history_request(&session, "GET")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["count"], 1);
    assert_eq!(history["entries"][0]["label"], "CHICKEN");

    for _ in 0..2 {
        let (status, _) = send(&app, history_request(&session, "DELETE")).await;
        assert_eq!(status, StatusCode::OK);
        let (_, history) = send(&app, history_request(&session, "GET")).await;
        assert_eq!(history["count"], 0);
    }
}

// ===========================================================================
// TEST 4: out-of-range class index → UNKNOWN warning, no history entry
// ===========================================================================
#[tokio::test]
async fn test_out_of_range_index_warns_without_history() {
    let app = build_router(stub_state(99));
    let session = new_session(&app).await;

    let (status, body) = send(&app, scan_request(&session, meal_png())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "no_nutrition_data");
    assert_eq!(body["label"], "UNKNOWN");

    let (_, history) = send(&app, history_request(&session, "GET")).await;
    assert_eq!(history["count"], 0);
}

// ===========================================================================
// TEST 5: sessions keep separate histories
// ===========================================================================
#[tokio::test]
async fn test_sessions_are_isolated() {
    let app = build_router(stub_state(13));
    let first = new_session(&app).await;
    let second = new_session(&app).await;

    let (_, body) = send(&app, scan_request(&first, meal_png())).await;
    assert_eq!(body["label"], "RICE");

    let (_, history) = send(&app, history_request(&second, "GET")).await;
    assert_eq!(history["count"], 0);
    let (_, history) = send(&app, history_request(&first, "GET")).await;
    assert_eq!(history["count"], 1);
}

// ===========================================================================
// TEST 6: classifier unavailable → 503, history untouched
// ===========================================================================
#[tokio::test]
async fn test_unavailable_model_returns_503() {
    let app = build_router(make_state(
        ClassifierLoad::Unavailable("model dir missing".to_string()),
        NutriScanConfig::default(),
    ));
    let session = new_session(&app).await;

    let (status, body) = send(&app, scan_request(&session, meal_png())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "model_unavailable");

    let (_, history) = send(&app, history_request(&session, "GET")).await;
    assert_eq!(history["count"], 0);
}

// ===========================================================================
// TEST 7: undecodable upload → 422
// ===========================================================================
#[tokio::test]
async fn test_garbage_upload_returns_422() {
    let app = build_router(stub_state(2));
    let session = new_session(&app).await;

    let (status, body) = send(&app, scan_request(&session, b"not an image".to_vec())).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["status"], "classification_error");
}

// ===========================================================================
// TEST 8: unknown and malformed session ids
// ===========================================================================
#[tokio::test]
async fn test_unknown_and_malformed_session_ids() {
    let app = build_router(stub_state(2));

    let unknown = uuid::Uuid::new_v4().to_string();
    let (status, _) = send(&app, history_request(&unknown, "GET")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, history_request("not-a-uuid", "GET")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ===========================================================================
// TEST 9: uploads over the configured limit are rejected
// ===========================================================================
#[tokio::test]
async fn test_oversized_upload_rejected() {
    let mut config = NutriScanConfig::default();
    config.http.max_upload_bytes = 64;
    let app = build_router(make_state(
        ClassifierLoad::Loaded(Arc::new(StubClassifier(2))),
        config,
    ));
    let session = new_session(&app).await;

    let (status, json) = send(&app, scan_request(&session, vec![0u8; 4096])).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    // The limit layer answers in plain text, which the UI must tolerate.
    assert!(json.is_null());
}

// ===========================================================================
// TEST 10: GET /health reports loaded classifier and catalog size
// ===========================================================================
#[tokio::test]
async fn test_health_endpoint() {
    let app = build_router(stub_state(2));
    let req = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let (status, json) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["classifier"]["backend"], "stub");
    assert_eq!(json["catalog_entries"], 2);
}

// ===========================================================================
// TEST 11: an evicted session answers 404 session_not_found; a new one works
// ===========================================================================
#[tokio::test]
async fn test_evicted_session_reports_code_and_new_session_recovers() {
    let state = Arc::new(HttpState {
        scanner: Arc::new(Scanner::new(
            ClassifierLoad::Loaded(Arc::new(StubClassifier(2))),
            catalog(),
            LabelTable::default(),
            60,
        )),
        sessions: Arc::new(SessionRegistry::new(Duration::ZERO)),
        config: NutriScanConfig::default(),
    });
    let app = build_router(state.clone());

    let stale = new_session(&app).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(state.sessions.sweep_idle().await, 1);

    let (status, json) = send(&app, scan_request(&stale, meal_png())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "session_not_found");

    let (status, json) = send(&app, history_request(&stale, "GET")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "session_not_found");

    let fresh = new_session(&app).await;
    assert_ne!(fresh, stale);
    let (status, json) = send(&app, scan_request(&fresh, meal_png())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["label"], "CHICKEN");
}

// ===========================================================================
// TEST 12: real ONNX model, when one is available
// ===========================================================================
#[tokio::test]
async fn test_real_model_scan_if_available() {
    let Ok(model_dir) = std::env::var("NUTRISCAN_MODEL_DIR") else {
        eprintln!("Skipping test_real_model_scan_if_available: NUTRISCAN_MODEL_DIR unset");
        return;
    };

    let mut config = NutriScanConfig::default();
    config.classifier.model_dir = model_dir;
    let load = nutriscan_core::load_classifier(&config.classifier);
    if !load.is_loaded() {
        eprintln!("Skipping test_real_model_scan_if_available: {load:?}");
        return;
    }

    let app = build_router(make_state(load, config));
    let session = new_session(&app).await;
    let (status, body) = send(&app, scan_request(&session, meal_png())).await;
    assert_eq!(status, StatusCode::OK, "scan body: {body:?}");
    assert!(body["label"].is_string());
}
