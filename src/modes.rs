use crate::camera::CameraController;
use crate::detection::{DetectionReporter, DetectionResult, TriggerOutcome, TriggerSource};
use crate::error::{CameraError, PoseError, PosecamError, Result};
use crate::events::{EventBus, PosecamEvent};
use crate::frame::LensFacing;
use crate::overlay::PoseRenderer;
use crate::pose::{LatestPoseSlot, PoseSnapshot};
use chrono::Utc;
use image::RgbaImage;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 10.0;

/// Capture modes in selector order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CaptureMode {
    #[default]
    Photo,
    Video,
    Document,
    Injury,
    Pose,
}

impl CaptureMode {
    pub const ALL: [CaptureMode; 5] = [
        CaptureMode::Photo,
        CaptureMode::Video,
        CaptureMode::Document,
        CaptureMode::Injury,
        CaptureMode::Pose,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            CaptureMode::Photo => "PHOTO",
            CaptureMode::Video => "VIDEO",
            CaptureMode::Document => "AI DOC",
            CaptureMode::Injury => "INJURY",
            CaptureMode::Pose => "POSE",
        }
    }

    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Everything the camera screen shows besides the preview itself
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CameraUiState {
    pub selected_mode: CaptureMode,
    pub flash_on: bool,
    pub recording: bool,
    pub front_camera: bool,
    pub processing: bool,
    pub zoom: f32,
    pub last_capture: Option<PathBuf>,
    pub injury_message: Option<String>,
    pub error: Option<String>,
}

impl Default for CameraUiState {
    fn default() -> Self {
        Self {
            selected_mode: CaptureMode::Photo,
            flash_on: false,
            recording: false,
            front_camera: false,
            processing: false,
            zoom: MIN_ZOOM,
            last_capture: None,
            injury_message: None,
            error: None,
        }
    }
}

/// What a shutter press did
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Saved(PathBuf),
    Recording(bool),
    Detection(TriggerOutcome),
}

/// Draw the overlay of a pose snapshot onto its upright frame
pub fn compose_pose_image(
    renderer: &PoseRenderer,
    snapshot: &PoseSnapshot,
) -> std::result::Result<RgbaImage, PoseError> {
    let image = snapshot.upright_image()?;

    #[cfg(feature = "raster")]
    {
        let commands = renderer.render(&snapshot.landmarks, snapshot.source, snapshot.source.size());
        Ok(crate::overlay::rasterize(&commands, image))
    }

    #[cfg(not(feature = "raster"))]
    {
        let _ = renderer;
        warn!("Raster backend disabled, saving pose frame without overlay");
        Ok(image)
    }
}

/// Encode an RGBA image as PNG bytes
pub fn encode_png(image: RgbaImage) -> std::result::Result<Vec<u8>, CameraError> {
    let mut output = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(image)
        .write_to(&mut output, image::ImageOutputFormat::Png)
        .map_err(|e| CameraError::Encoding {
            details: e.to_string(),
        })?;
    Ok(output.into_inner())
}

/// Collaborators of the mode controller
pub struct ModeParts {
    pub camera: Arc<CameraController>,
    pub reporter: DetectionReporter,
    pub pose_slot: Arc<LatestPoseSlot>,
    pub renderer: PoseRenderer,
    pub event_bus: EventBus,
}

/// Drives the camera screen: mode selection, toggles and shutter dispatch
pub struct ModeController {
    state: Mutex<CameraUiState>,
    camera: Arc<CameraController>,
    reporter: DetectionReporter,
    pose_slot: Arc<LatestPoseSlot>,
    renderer: PoseRenderer,
    event_bus: EventBus,
    capture_dir: PathBuf,
}

impl ModeController {
    pub fn new(capture_dir: PathBuf, parts: ModeParts) -> Self {
        let state = CameraUiState {
            front_camera: parts.camera.facing() == Some(LensFacing::Front),
            ..CameraUiState::default()
        };
        Self {
            state: Mutex::new(state),
            camera: parts.camera,
            reporter: parts.reporter,
            pose_slot: parts.pose_slot,
            renderer: parts.renderer,
            event_bus: parts.event_bus,
            capture_dir,
        }
    }

    pub fn snapshot(&self) -> CameraUiState {
        self.state.lock().clone()
    }

    pub fn mode(&self) -> CaptureMode {
        self.state.lock().selected_mode
    }

    /// Select by selector index. Out-of-range indices are ignored.
    pub fn select_mode(&self, index: usize) -> Option<CaptureMode> {
        let mode = match CaptureMode::from_index(index) {
            Some(mode) => mode,
            None => {
                debug!("Ignoring mode index {}", index);
                return None;
            }
        };

        self.state.lock().selected_mode = mode;
        self.publish(PosecamEvent::ModeChanged { mode });
        Some(mode)
    }

    pub fn next_mode(&self) -> CaptureMode {
        let next = self.mode().next();
        self.select_mode(next.index());
        next
    }

    pub fn toggle_flash(&self) -> bool {
        let mut state = self.state.lock();
        state.flash_on = !state.flash_on;
        state.flash_on
    }

    pub async fn switch_camera(&self) -> Result<LensFacing> {
        match self.camera.toggle_facing().await {
            Ok(facing) => {
                self.state.lock().front_camera = facing == LensFacing::Front;
                Ok(facing)
            }
            Err(e) => {
                self.record_error(&e);
                Err(e)
            }
        }
    }

    /// Returns the zoom actually applied
    pub fn set_zoom(&self, zoom: f32) -> f32 {
        let zoom = if zoom.is_nan() {
            MIN_ZOOM
        } else {
            zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        };
        self.state.lock().zoom = zoom;
        zoom
    }

    pub fn start_recording(&self) {
        self.state.lock().recording = true;
        info!("Recording started");
    }

    pub fn stop_recording(&self) {
        self.state.lock().recording = false;
        info!("Recording stopped");
    }

    /// Shutter press in the current mode
    pub async fn capture(&self) -> Result<CaptureOutcome> {
        let mode = self.mode();
        debug!("Capture in {} mode", mode);

        let outcome = match mode {
            CaptureMode::Photo => self.save_still("photo").await.map(CaptureOutcome::Saved),
            CaptureMode::Document => self.save_still("document").await.map(CaptureOutcome::Saved),
            CaptureMode::Pose => self.save_pose().await.map(CaptureOutcome::Saved),
            CaptureMode::Video => {
                let recording = !self.state.lock().recording;
                if recording {
                    self.start_recording();
                } else {
                    self.stop_recording();
                }
                Ok(CaptureOutcome::Recording(recording))
            }
            CaptureMode::Injury => Ok(CaptureOutcome::Detection(
                self.trigger_detection(TriggerSource::Manual),
            )),
        };

        match &outcome {
            Ok(CaptureOutcome::Saved(path)) => {
                self.state.lock().last_capture = Some(path.clone());
                self.publish(PosecamEvent::CaptureSaved {
                    mode,
                    path: path.clone(),
                });
            }
            Ok(_) => {}
            Err(e) => self.record_error(e),
        }
        outcome
    }

    /// Start a detection cycle and reflect it in the processing flag
    pub fn trigger_detection(&self, source: TriggerSource) -> TriggerOutcome {
        // Held across the trigger so a fast completion cannot clear the flag first
        let mut state = self.state.lock();
        let outcome = self.reporter.try_trigger(source);
        if outcome == TriggerOutcome::Started {
            state.processing = true;
        }
        outcome
    }

    /// Fold a finished detection into the screen state
    pub fn on_detection_completed(&self, result: &DetectionResult) {
        let mut state = self.state.lock();
        state.processing = false;
        state.injury_message = Some(result.message.clone());
    }

    pub fn on_capture_failed(&self, message: &str) {
        let mut state = self.state.lock();
        state.processing = false;
        state.error = Some(message.to_string());
    }

    pub fn clear_error(&self) {
        self.state.lock().error = None;
    }

    /// Drop the shown detection message and the reporter's latest result
    pub fn clear_results(&self) {
        self.state.lock().injury_message = None;
        self.reporter.dismiss_result();
    }

    async fn save_still(&self, prefix: &str) -> Result<PathBuf> {
        let still = self.camera.capture_still().await?;
        let path = self.capture_path(prefix, "jpg");
        write_file(&path, &still.jpeg).await?;
        info!("Saved {} capture to {}", prefix, path.display());
        Ok(path)
    }

    async fn save_pose(&self) -> Result<PathBuf> {
        let snapshot = self.pose_slot.latest().ok_or_else(|| CameraError::StillCapture {
            details: "no pose has been detected yet".to_string(),
        })?;
        let renderer = self.renderer.clone();

        let png = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let image = compose_pose_image(&renderer, &snapshot)?;
            Ok(encode_png(image)?)
        })
        .await
        .map_err(|e| PosecamError::component("modes", e.to_string()))??;

        let path = self.capture_path("pose", "png");
        write_file(&path, &png).await?;
        info!("Saved pose snapshot to {}", path.display());
        Ok(path)
    }

    fn capture_path(&self, prefix: &str, extension: &str) -> PathBuf {
        self.capture_dir.join(format!(
            "{}_{}.{}",
            prefix,
            Utc::now().timestamp_millis(),
            extension
        ))
    }

    fn record_error(&self, error: &PosecamError) {
        warn!("Capture error: {}", error);
        self.state.lock().error = Some(error.user_message());
    }

    fn publish(&self, event: PosecamEvent) {
        if let Err(e) = self.event_bus.publish(event) {
            error!("Failed to publish mode event: {}", e);
        }
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}
