use super::types::{ComponentState, ShutdownReason};
use crate::camera::{CameraController, FrameSource, SyntheticCamera};
use crate::config::PosecamConfig;
use crate::detection::{DetectionReporter, InjuryAnalyzer, ReporterParts, WebhookClient};
use crate::error::Result;
use crate::events::EventBus;
use crate::frame::Size;
use crate::keyboard_input::KeyboardInputHandler;
use crate::location;
use crate::modes::{ModeController, ModeParts};
use crate::overlay::PoseRenderer;
use crate::pose::{DemoExtractor, LatestPoseSlot, PoseAnalyzer, PoseIntegration};
use crate::voice::{ListenerState, SpeechRecognizer};
use parking_lot::Mutex as SyncMutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Main application coordinator that manages all system components
pub struct PosecamOrchestrator {
    pub(super) config: PosecamConfig,
    pub(super) event_bus: EventBus,

    // Components
    pub(super) camera: Arc<CameraController>,
    pub(super) pose_integration: PoseIntegration,
    pub(super) pose_slot: Arc<LatestPoseSlot>,
    pub(super) webhook: Arc<WebhookClient>,
    pub(super) reporter: DetectionReporter,
    pub(super) modes: Arc<ModeController>,
    pub(super) keyboard_handler: Option<KeyboardInputHandler>,
    pub(super) keyboard_enabled: bool,
    /// Held until `start` hands it to the listener
    pub(super) voice_recognizer: Option<SyncMutex<Box<dyn SpeechRecognizer>>>,
    pub(super) voice_task: Option<JoinHandle<ListenerState>>,
    pub(super) dispatch_task: Option<JoinHandle<()>>,

    // Lifecycle management
    pub(super) component_states: Arc<Mutex<HashMap<String, ComponentState>>>,
    pub(super) shutdown_sender: Option<oneshot::Sender<ShutdownReason>>,
    pub(super) shutdown_receiver: Option<oneshot::Receiver<ShutdownReason>>,
    pub(super) cancellation_token: CancellationToken,
}

impl PosecamOrchestrator {
    /// Create a new orchestrator backed by the synthetic camera and demo extractor
    pub async fn new(config: PosecamConfig) -> Result<Self> {
        let source: Arc<dyn FrameSource> = Arc::new(SyntheticCamera::new(config.camera.clone()));
        Self::with_source(config, source)
    }

    /// Create an orchestrator around an existing frame source
    pub fn with_source(config: PosecamConfig, source: Arc<dyn FrameSource>) -> Result<Self> {
        let event_bus = EventBus::new(config.system.event_bus_capacity);
        let (shutdown_sender, shutdown_receiver) = oneshot::channel();

        let camera = Arc::new(CameraController::new(source, event_bus.clone()));
        let pose_slot = Arc::new(LatestPoseSlot::new());
        let renderer = PoseRenderer::new(config.overlay.clone());

        let (display_width, display_height) = config.analysis.display_resolution;
        let analyzer = PoseAnalyzer::new(
            Arc::new(DemoExtractor::new()),
            renderer.clone(),
            camera.tracker(),
            Arc::clone(&pose_slot),
            config.analysis.process_interval(),
            Size::new(display_width as f32, display_height as f32),
        );
        let pose_integration = PoseIntegration::new(analyzer, event_bus.clone());

        let webhook = Arc::new(WebhookClient::new(&config.webhook)?);
        let reporter = DetectionReporter::new(
            &config,
            ReporterParts {
                analyzer: Arc::clone(&webhook) as Arc<dyn InjuryAnalyzer>,
                camera: Arc::clone(&camera),
                pose_slot: Arc::clone(&pose_slot),
                location: location::from_config(&config.capture),
                event_bus: event_bus.clone(),
            },
        );

        let modes = Arc::new(ModeController::new(
            config.capture.capture_dir(),
            ModeParts {
                camera: Arc::clone(&camera),
                reporter: reporter.clone(),
                pose_slot: Arc::clone(&pose_slot),
                renderer,
                event_bus: event_bus.clone(),
            },
        ));

        let keyboard_handler = Some(KeyboardInputHandler::new(event_bus.clone()));
        let keyboard_enabled = config.system.keyboard_controls;

        Ok(Self {
            config,
            event_bus,
            camera,
            pose_integration,
            pose_slot,
            webhook,
            reporter,
            modes,
            keyboard_handler,
            keyboard_enabled,
            voice_recognizer: None,
            voice_task: None,
            dispatch_task: None,
            component_states: Arc::new(Mutex::new(HashMap::new())),
            shutdown_sender: Some(shutdown_sender),
            shutdown_receiver: Some(shutdown_receiver),
            cancellation_token: CancellationToken::new(),
        })
    }

    /// Enable or disable the keyboard input handler
    pub fn set_keyboard_enabled(&mut self, enabled: bool) {
        self.keyboard_enabled = enabled;
    }

    /// Use `recognizer` as the voice source instead of standard input
    pub fn set_voice_recognizer(&mut self, recognizer: Box<dyn SpeechRecognizer>) {
        self.voice_recognizer = Some(SyncMutex::new(recognizer));
    }

    pub fn config(&self) -> &PosecamConfig {
        &self.config
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn camera(&self) -> Arc<CameraController> {
        Arc::clone(&self.camera)
    }

    pub fn reporter(&self) -> &DetectionReporter {
        &self.reporter
    }

    pub fn modes(&self) -> Arc<ModeController> {
        Arc::clone(&self.modes)
    }

    pub fn pose_slot(&self) -> Arc<LatestPoseSlot> {
        Arc::clone(&self.pose_slot)
    }
}
