use super::mock;
use super::result::DetectionResult;
use super::temp::TempJpeg;
use super::trigger::{TriggerOutcome, TriggerSource};
use super::webhook::{AnalysisRequest, InjuryAnalyzer};
use crate::camera::CameraController;
use crate::config::{ApiMode, PosecamConfig};
use crate::error::{CameraError, DetectionError, PosecamError, Result};
use crate::events::{EventBus, PosecamEvent};
use crate::location::LocationProvider;
use crate::pose::LatestPoseSlot;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Where the reporter is in its capture-and-analyze cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReporterState {
    Idle,
    Capturing(TriggerSource),
    AwaitingResult(TriggerSource),
}

impl fmt::Display for ReporterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReporterState::Idle => write!(f, "idle"),
            ReporterState::Capturing(source) => write!(f, "capturing ({})", source),
            ReporterState::AwaitingResult(source) => write!(f, "awaiting result ({})", source),
        }
    }
}

struct ReporterInner {
    state: Mutex<ReporterState>,
    mode: Mutex<ApiMode>,
    latest: Mutex<Option<DetectionResult>>,
    analyzer: Arc<dyn InjuryAnalyzer>,
    camera: Arc<CameraController>,
    pose_slot: Arc<LatestPoseSlot>,
    location: Arc<dyn LocationProvider>,
    event_bus: EventBus,
    cache_dir: PathBuf,
    mock_latency: Duration,
    jpeg_quality: u8,
}

impl ReporterInner {
    /// The only place the state changes. Returns false if `from` did not hold.
    fn transition(&self, from: fn(&ReporterState) -> bool, to: ReporterState) -> bool {
        let mut state = self.state.lock();
        if !from(&state) {
            return false;
        }
        debug!("Reporter state {} -> {}", *state, to);
        *state = to;
        true
    }
}

/// Resets the reporter to Idle on every exit path of a cycle
struct CycleGuard {
    inner: Arc<ReporterInner>,
    source: TriggerSource,
}

impl CycleGuard {
    fn begin(inner: &Arc<ReporterInner>, source: TriggerSource) -> Option<Self> {
        if inner.transition(
            |s| *s == ReporterState::Idle,
            ReporterState::Capturing(source),
        ) {
            Some(Self {
                inner: Arc::clone(inner),
                source,
            })
        } else {
            None
        }
    }

    fn captured(&self) {
        self.inner.transition(
            |s| matches!(s, ReporterState::Capturing(_)),
            ReporterState::AwaitingResult(self.source),
        );
    }
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.inner.transition(|_| true, ReporterState::Idle);
    }
}

/// Runs capture-and-analyze cycles, one at a time
#[derive(Clone)]
pub struct DetectionReporter {
    inner: Arc<ReporterInner>,
}

/// Collaborators a reporter needs
pub struct ReporterParts {
    pub analyzer: Arc<dyn InjuryAnalyzer>,
    pub camera: Arc<CameraController>,
    pub pose_slot: Arc<LatestPoseSlot>,
    pub location: Arc<dyn LocationProvider>,
    pub event_bus: EventBus,
}

impl DetectionReporter {
    pub fn new(config: &PosecamConfig, parts: ReporterParts) -> Self {
        info!(
            "Detection reporter using {:?} API mode, cache dir {}",
            config.webhook.mode,
            config.capture.cache_dir
        );
        Self {
            inner: Arc::new(ReporterInner {
                state: Mutex::new(ReporterState::Idle),
                mode: Mutex::new(config.webhook.mode),
                latest: Mutex::new(None),
                analyzer: parts.analyzer,
                camera: parts.camera,
                pose_slot: parts.pose_slot,
                location: parts.location,
                event_bus: parts.event_bus,
                cache_dir: config.capture.cache_dir(),
                mock_latency: config.webhook.mock_latency(),
                jpeg_quality: config.camera.jpeg_quality,
            }),
        }
    }

    /// Start a cycle in the background unless one is already running
    pub fn try_trigger(&self, source: TriggerSource) -> TriggerOutcome {
        let guard = match CycleGuard::begin(&self.inner, source) {
            Some(guard) => guard,
            None => {
                debug!("Trigger from {} ignored, reporter is busy", source);
                return TriggerOutcome::Busy;
            }
        };

        let reporter = self.clone();
        tokio::spawn(async move {
            reporter.execute(guard).await;
        });
        TriggerOutcome::Started
    }

    /// Run a whole cycle inline. None if busy or the capture failed.
    pub async fn run_cycle(&self, source: TriggerSource) -> Option<DetectionResult> {
        let guard = CycleGuard::begin(&self.inner, source)?;
        self.execute(guard).await
    }

    async fn execute(&self, guard: CycleGuard) -> Option<DetectionResult> {
        let inner = &self.inner;
        let source = guard.source;
        let cycle_id = Uuid::new_v4().to_string();

        self.publish(PosecamEvent::DetectionStarted {
            cycle_id: cycle_id.clone(),
            source,
        });

        let taken_at = Utc::now();
        let image = match self.capture(source, taken_at).await {
            Ok(image) => image,
            Err(e) => {
                warn!("Capture for detection {} failed: {}", cycle_id, e);
                drop(guard);
                self.publish(PosecamEvent::CaptureFailed {
                    cycle_id,
                    message: e.user_message(),
                });
                return None;
            }
        };
        guard.captured();

        let mode = self.api_mode();
        let result = match mode {
            ApiMode::Real => {
                let request = AnalysisRequest {
                    image_path: image.path().to_path_buf(),
                    taken_at,
                    location: inner.location.current(),
                };
                match inner.analyzer.analyze(&request).await {
                    Ok(assessment) => DetectionResult::remote(assessment, source),
                    Err(e) => {
                        warn!("Webhook analysis failed, using simulated result: {}", e);
                        DetectionResult::simulated(mock::assess(), source, e.to_string())
                    }
                }
            }
            ApiMode::Mock => {
                debug!("Mock API mode, simulating {:?} of latency", inner.mock_latency);
                tokio::time::sleep(inner.mock_latency).await;
                DetectionResult::simulated(mock::assess(), source, "mock mode")
            }
        };
        drop(image);

        info!("Detection {} finished: {}", cycle_id, result.message);
        *inner.latest.lock() = Some(result.clone());
        drop(guard);

        self.publish(PosecamEvent::DetectionCompleted {
            cycle_id,
            result: result.clone(),
        });
        Some(result)
    }

    async fn capture(&self, source: TriggerSource, taken_at: DateTime<Utc>) -> Result<TempJpeg> {
        let inner = &self.inner;
        let jpeg = match source {
            TriggerSource::LatestFrame => {
                let snapshot = inner.pose_slot.latest().ok_or_else(|| CameraError::StillCapture {
                    details: "no analyzed frame available yet".to_string(),
                })?;
                snapshot.frame.to_jpeg(inner.jpeg_quality)?
            }
            TriggerSource::Voice | TriggerSource::Manual => inner.camera.capture_still().await?.jpeg,
        };

        TempJpeg::write(&inner.cache_dir, taken_at.timestamp_millis(), &jpeg)
            .await
            .map_err(|e| PosecamError::Detection(DetectionError::TempFile(e)))
    }

    fn publish(&self, event: PosecamEvent) {
        if let Err(e) = self.inner.event_bus.publish(event) {
            error!("Failed to publish detection event: {}", e);
        }
    }

    pub fn state(&self) -> ReporterState {
        *self.inner.state.lock()
    }

    pub fn is_processing(&self) -> bool {
        self.state() != ReporterState::Idle
    }

    pub fn api_mode(&self) -> ApiMode {
        *self.inner.mode.lock()
    }

    pub fn set_api_mode(&self, mode: ApiMode) {
        let mut current = self.inner.mode.lock();
        if *current != mode {
            info!("API mode {:?} -> {:?}", *current, mode);
            *current = mode;
        }
    }

    pub fn latest_result(&self) -> Option<DetectionResult> {
        self.inner.latest.lock().clone()
    }

    pub fn dismiss_result(&self) -> Option<DetectionResult> {
        self.inner.latest.lock().take()
    }
}
