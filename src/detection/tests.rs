use super::*;
use crate::camera::{CameraController, SyntheticCamera};
use crate::config::{ApiMode, PosecamConfig};
use crate::error::DetectionError;
use crate::events::{EventBus, PosecamEvent};
use crate::frame::{FrameData, FrameFormat, ImageSourceInfo, LensFacing};
use crate::location::{GeoPoint, LocationProvider, NoLocation, StaticLocation};
use crate::pose::{LandmarkSet, LatestPoseSlot, PoseSnapshot};
use async_trait::async_trait;
use axum::extract::{Multipart, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::timeout;

#[derive(Debug, Clone)]
struct ReceivedField {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    text: String,
    len: usize,
}

/// What the fake webhook has seen so far
#[derive(Clone, Default)]
struct WebhookLog {
    requests: Arc<Mutex<Vec<Vec<ReceivedField>>>>,
    user_agents: Arc<Mutex<Vec<String>>>,
}

impl WebhookLog {
    fn record_agent(&self, headers: &HeaderMap) {
        let agent = headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        self.user_agents.lock().push(agent);
    }
}

#[derive(Clone)]
struct WebhookState {
    log: WebhookLog,
    status: StatusCode,
    body: String,
}

async fn receive(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> (StatusCode, String) {
    state.log.record_agent(&headers);
    let mut fields = Vec::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.unwrap_or_default();
        fields.push(ReceivedField {
            name,
            file_name,
            content_type,
            text: String::from_utf8_lossy(&data).into_owned(),
            len: data.len(),
        });
    }
    state.log.requests.lock().push(fields);
    (state.status, state.body.clone())
}

async fn probe(State(state): State<WebhookState>, headers: HeaderMap) -> StatusCode {
    state.log.record_agent(&headers);
    state.status
}

/// Serve a fake analysis webhook and return its URL
async fn spawn_webhook(status: StatusCode, body: &str) -> (String, WebhookLog) {
    let log = WebhookLog::default();
    let state = WebhookState {
        log: log.clone(),
        status,
        body: body.to_string(),
    };
    let app = Router::new()
        .route("/webhook/aid", post(receive).get(probe))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/webhook/aid", addr), log)
}

/// An address nothing listens on
async fn dead_endpoint() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/webhook/aid", addr)
}

struct CountingAnalyzer {
    calls: AtomicU32,
    delay: Duration,
}

impl CountingAnalyzer {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            delay,
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InjuryAnalyzer for CountingAnalyzer {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<Assessment, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(request.image_path.exists());
        tokio::time::sleep(self.delay).await;
        Ok(Assessment::new(false, 0.4, "None"))
    }

    async fn probe(&self) -> ProbeReport {
        ProbeReport {
            reachable: true,
            status: Some(200),
            message: "Webhook is accessible (HTTP 200)".to_string(),
        }
    }
}

struct Harness {
    reporter: DetectionReporter,
    camera: Arc<SyntheticCamera>,
    slot: Arc<LatestPoseSlot>,
    event_bus: EventBus,
    cache_dir: PathBuf,
    _scratch: TempDir,
}

fn test_config(scratch: &Path, endpoint: &str, mode: ApiMode) -> PosecamConfig {
    let mut config = PosecamConfig::default();
    config.camera.resolution = (32, 24);
    config.capture.cache_dir = scratch.join("cache").to_string_lossy().into_owned();
    config.webhook.endpoint = endpoint.to_string();
    config.webhook.timeout_secs = 5;
    config.webhook.mode = mode;
    config.webhook.mock_latency_ms = 10;
    config
}

async fn harness(
    analyzer: Arc<dyn InjuryAnalyzer>,
    config: PosecamConfig,
    scratch: TempDir,
    location: Arc<dyn LocationProvider>,
) -> Harness {
    let event_bus = EventBus::new(32);
    let camera = Arc::new(SyntheticCamera::new(config.camera.clone()));
    let controller = Arc::new(CameraController::new(camera.clone(), event_bus.clone()));
    controller.start(LensFacing::Back).await.unwrap();

    let slot = Arc::new(LatestPoseSlot::new());
    let reporter = DetectionReporter::new(
        &config,
        ReporterParts {
            analyzer,
            camera: controller,
            pose_slot: Arc::clone(&slot),
            location,
            event_bus: event_bus.clone(),
        },
    );

    Harness {
        reporter,
        camera,
        slot,
        event_bus,
        cache_dir: config.capture.cache_dir(),
        _scratch: scratch,
    }
}

async fn webhook_harness(endpoint: &str, location: Arc<dyn LocationProvider>) -> Harness {
    let scratch = TempDir::new().unwrap();
    let config = test_config(scratch.path(), endpoint, ApiMode::Real);
    let client = Arc::new(WebhookClient::new(&config.webhook).unwrap());
    harness(client, config, scratch, location).await
}

async fn counting_harness(analyzer: Arc<CountingAnalyzer>, mode: ApiMode) -> Harness {
    let scratch = TempDir::new().unwrap();
    let config = test_config(scratch.path(), "http://127.0.0.1:9/unused", mode);
    harness(analyzer, config, scratch, Arc::new(NoLocation)).await
}

fn cache_is_empty(dir: &Path) -> bool {
    match std::fs::read_dir(dir) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => true,
    }
}

async fn next_completed(events: &mut broadcast::Receiver<PosecamEvent>) -> DetectionResult {
    loop {
        let event = timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("timed out waiting for detection")
            .unwrap();
        if let PosecamEvent::DetectionCompleted { result, .. } = event {
            return result;
        }
    }
}

#[tokio::test]
async fn test_remote_result_from_webhook() {
    let (endpoint, log) = spawn_webhook(
        StatusCode::OK,
        r#"{"has_injury":true,"confidence":0.92,"injury_type":"Cut"}"#,
    )
    .await;
    let h = webhook_harness(
        &endpoint,
        Arc::new(StaticLocation(GeoPoint::new(52.52, 13.405))),
    )
    .await;

    let result = h.reporter.run_cycle(TriggerSource::Manual).await.unwrap();
    assert!(result.has_injury);
    assert!(result.message.contains("Cut"));
    assert!(result.message.contains("92%"));
    assert_eq!(result.provenance, Provenance::Remote);
    assert_eq!(result.source, TriggerSource::Manual);
    assert!(!h.reporter.is_processing());
    assert_eq!(h.reporter.latest_result(), Some(result));
    assert!(cache_is_empty(&h.cache_dir));

    assert_eq!(
        *log.user_agents.lock(),
        vec!["Android-Injury-Detection-App".to_string()]
    );

    let requests = log.requests.lock();
    assert_eq!(requests.len(), 1);
    let fields = &requests[0];
    let field = |name: &str| fields.iter().find(|f| f.name == name).cloned().unwrap();

    let image = field("image");
    assert_eq!(image.content_type.as_deref(), Some("image/jpeg"));
    let file_name = image.file_name.unwrap();
    assert!(file_name.starts_with("injury_detection_") && file_name.ends_with(".jpg"));
    assert!(image.len > 0);

    assert!(field("timestamp").text.parse::<i64>().is_ok());
    assert_eq!(field("source").text, "android_injury_detection");
    assert_eq!(field("lat").text, "52.52");
    assert_eq!(field("lng").text, "13.405");
}

#[tokio::test]
async fn test_location_fields_omitted_without_fix() {
    let (endpoint, log) = spawn_webhook(StatusCode::OK, r#"{"has_injury":false}"#).await;
    let h = webhook_harness(&endpoint, Arc::new(NoLocation)).await;

    let result = h.reporter.run_cycle(TriggerSource::Voice).await.unwrap();
    assert_eq!(result.message, "No injury detected");

    let requests = log.requests.lock();
    assert!(requests[0].iter().all(|f| f.name != "lat" && f.name != "lng"));
}

#[tokio::test]
async fn test_webhook_error_falls_back_to_simulated_result() {
    let (endpoint, log) =
        spawn_webhook(StatusCode::INTERNAL_SERVER_ERROR, "workflow crashed").await;
    let h = webhook_harness(&endpoint, Arc::new(NoLocation)).await;

    let result = h.reporter.run_cycle(TriggerSource::Voice).await.unwrap();
    assert!(result.provenance.is_simulated());
    assert!((0.15..=1.0).contains(&result.confidence));
    assert!(!h.reporter.is_processing());
    assert_eq!(log.requests.lock().len(), 1);
    assert!(cache_is_empty(&h.cache_dir));

    match result.provenance {
        Provenance::Simulated { reason } => assert!(reason.contains("500")),
        other => panic!("unexpected provenance {:?}", other),
    }
}

#[tokio::test]
async fn test_unparseable_and_empty_bodies_fall_back() {
    for body in ["", "Workflow was started"] {
        let (endpoint, _log) = spawn_webhook(StatusCode::OK, body).await;
        let h = webhook_harness(&endpoint, Arc::new(NoLocation)).await;

        let result = h.reporter.run_cycle(TriggerSource::Manual).await.unwrap();
        assert!(result.provenance.is_simulated(), "body {:?}", body);
        assert!((0.15..=1.0).contains(&result.confidence));
    }
}

#[tokio::test]
async fn test_unreachable_webhook_falls_back() {
    let endpoint = dead_endpoint().await;
    let h = webhook_harness(&endpoint, Arc::new(NoLocation)).await;

    let result = h.reporter.run_cycle(TriggerSource::Voice).await.unwrap();
    assert!(result.provenance.is_simulated());
    assert_eq!(h.reporter.state(), ReporterState::Idle);
}

#[tokio::test]
async fn test_busy_reporter_sends_exactly_one_request() {
    let analyzer = CountingAnalyzer::new(Duration::from_millis(200));
    let h = counting_harness(analyzer.clone(), ApiMode::Real).await;
    let mut events = h.event_bus.subscribe();

    assert_eq!(h.reporter.try_trigger(TriggerSource::Voice), TriggerOutcome::Started);
    assert_eq!(h.reporter.try_trigger(TriggerSource::Voice), TriggerOutcome::Busy);
    assert_eq!(h.reporter.try_trigger(TriggerSource::Manual), TriggerOutcome::Busy);
    assert!(h.reporter.is_processing());
    assert!(h.reporter.run_cycle(TriggerSource::Manual).await.is_none());

    let result = next_completed(&mut events).await;
    assert_eq!(result.source, TriggerSource::Voice);
    assert_eq!(result.provenance, Provenance::Remote);
    assert_eq!(analyzer.calls(), 1);
    assert!(!h.reporter.is_processing());

    // Idle again, so the next trigger is accepted
    assert_eq!(h.reporter.try_trigger(TriggerSource::Manual), TriggerOutcome::Started);
    next_completed(&mut events).await;
    assert_eq!(analyzer.calls(), 2);
}

#[tokio::test]
async fn test_capture_failure_returns_to_idle() {
    let analyzer = CountingAnalyzer::new(Duration::ZERO);
    let h = counting_harness(analyzer.clone(), ApiMode::Real).await;
    let mut events = h.event_bus.subscribe();

    let previous = h.reporter.run_cycle(TriggerSource::Manual).await.unwrap();
    h.camera.set_fail_stills(true);

    assert!(h.reporter.run_cycle(TriggerSource::Voice).await.is_none());
    assert_eq!(h.reporter.state(), ReporterState::Idle);
    assert_eq!(analyzer.calls(), 1);
    assert_eq!(h.reporter.latest_result(), Some(previous));

    let mut saw_failure = false;
    while let Ok(event) = events.try_recv() {
        if let PosecamEvent::CaptureFailed { message, .. } = event {
            assert!(message.starts_with("Image capture failed"));
            saw_failure = true;
        }
    }
    assert!(saw_failure);
}

#[tokio::test]
async fn test_mock_mode_never_calls_analyzer() {
    let analyzer = CountingAnalyzer::new(Duration::ZERO);
    let h = counting_harness(analyzer.clone(), ApiMode::Mock).await;

    let result = h.reporter.run_cycle(TriggerSource::Manual).await.unwrap();
    assert_eq!(analyzer.calls(), 0);
    assert_eq!(
        result.provenance,
        Provenance::Simulated {
            reason: "mock mode".to_string()
        }
    );

    h.reporter.set_api_mode(ApiMode::Real);
    assert_eq!(h.reporter.api_mode(), ApiMode::Real);
    h.reporter.run_cycle(TriggerSource::Manual).await.unwrap();
    assert_eq!(analyzer.calls(), 1);
}

#[tokio::test]
async fn test_latest_frame_trigger_uses_pose_slot() {
    let analyzer = CountingAnalyzer::new(Duration::ZERO);
    let h = counting_harness(analyzer.clone(), ApiMode::Real).await;

    // Nothing analyzed yet
    assert!(h.reporter.run_cycle(TriggerSource::LatestFrame).await.is_none());
    assert_eq!(analyzer.calls(), 0);

    let frame = FrameData::new(1, SystemTime::now(), vec![90; 16 * 8 * 3], 16, 8, FrameFormat::Rgb24);
    let source = ImageSourceInfo::for_frame(&frame).unwrap();
    h.slot.store(PoseSnapshot {
        frame,
        landmarks: LandmarkSet::new(),
        source,
    });

    let result = h.reporter.run_cycle(TriggerSource::LatestFrame).await.unwrap();
    assert_eq!(result.source, TriggerSource::LatestFrame);
    assert_eq!(analyzer.calls(), 1);
}

#[tokio::test]
async fn test_dismiss_result() {
    let analyzer = CountingAnalyzer::new(Duration::ZERO);
    let h = counting_harness(analyzer, ApiMode::Mock).await;

    h.reporter.run_cycle(TriggerSource::Manual).await.unwrap();
    assert!(h.reporter.dismiss_result().is_some());
    assert!(h.reporter.latest_result().is_none());
}

#[tokio::test]
async fn test_probe_reports() {
    let (endpoint, log) = spawn_webhook(StatusCode::OK, "").await;
    let scratch = TempDir::new().unwrap();
    let mut config = test_config(scratch.path(), &endpoint, ApiMode::Real);
    config.webhook.user_agent = "posecam-test/1.0".to_string();
    let client = WebhookClient::new(&config.webhook).unwrap();
    let report = client.probe().await;
    assert!(report.reachable);
    assert_eq!(report.message, "Webhook is accessible (HTTP 200)");
    assert_eq!(*log.user_agents.lock(), vec!["posecam-test/1.0".to_string()]);

    let (endpoint, _) = spawn_webhook(StatusCode::NOT_FOUND, "").await;
    let client = WebhookClient::new(&test_config(scratch.path(), &endpoint, ApiMode::Real).webhook)
        .unwrap();
    let report = client.probe().await;
    assert!(!report.reachable);
    assert_eq!(report.status, Some(404));
    assert_eq!(report.message, "Webhook returned error (HTTP 404)");

    let endpoint = dead_endpoint().await;
    let client = WebhookClient::new(&test_config(scratch.path(), &endpoint, ApiMode::Real).webhook)
        .unwrap();
    let report = client.probe().await;
    assert!(!report.reachable);
    assert!(report.status.is_none());
    assert!(report.message.starts_with("Network error: "));
}
