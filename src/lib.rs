pub mod app;
pub mod camera;
pub mod config;
pub mod detection;
pub mod error;
pub mod events;
pub mod frame;
pub mod keyboard_input;
pub mod location;
pub mod modes;
pub mod overlay;
pub mod pose;
pub mod recovery;
pub mod voice;

pub use app::{ComponentState, PosecamOrchestrator, ShutdownReason};
pub use camera::{CameraController, CapturedStill, FrameSource, SyntheticCamera};
pub use config::{ApiMode, PosecamConfig};
pub use detection::{
    DetectionReporter, DetectionResult, InjuryAnalyzer, Provenance, ReporterState, TriggerSource,
    WebhookClient,
};
pub use error::{PosecamError, Result};
pub use events::{EventBus, EventFilter, EventReceiver, PosecamEvent, UserCommand};
pub use frame::{FrameData, FrameFormat, ImageSourceInfo, LensFacing, Size};
pub use location::{GeoPoint, LocationProvider};
pub use modes::{CaptureMode, ModeController};
pub use overlay::{CoordinateTransform, DrawCommand, PoseRenderer};
pub use pose::{LandmarkExtractor, LandmarkSet, LatestPoseSlot, PoseAnalyzer};
pub use recovery::{RecoveryAction, RecoveryConfig, RecoveryManager};
pub use voice::{PhraseMatcher, SpeechRecognizer, VoiceListener};
