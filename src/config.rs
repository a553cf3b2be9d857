use crate::frame::LensFacing;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct PosecamConfig {
    pub camera: CameraConfig,
    pub analysis: AnalysisConfig,
    pub overlay: OverlayConfig,
    pub webhook: WebhookConfig,
    pub voice: VoiceConfig,
    pub capture: CaptureConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraConfig {
    /// Camera resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub resolution: (u32, u32),

    /// Frames per second
    #[serde(default = "default_camera_fps")]
    pub fps: u32,

    /// Lens used when the camera is first bound
    #[serde(default)]
    pub facing: LensFacing,

    /// Sensor rotation reported with every frame (0, 90, 180, 270)
    #[serde(default)]
    pub rotation_degrees: u32,

    /// JPEG quality for still captures
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Minimum spacing between frames handed to the landmark extractor
    #[serde(default = "default_process_interval_ms")]
    pub process_interval_ms: u64,

    /// Size of the overlay surface (width, height)
    #[serde(default = "default_display_resolution")]
    pub display_resolution: (u32, u32),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OverlayConfig {
    #[serde(default = "default_dot_radius")]
    pub dot_radius: f32,

    #[serde(default = "default_glow_radius")]
    pub glow_radius: f32,

    /// Minimum stroke width for limbs and connectors
    #[serde(default = "default_base_stroke")]
    pub base_stroke: f32,

    /// Multiplier applied to the summed endpoint confidence of a limb
    #[serde(default = "default_thickness_scale")]
    pub thickness_scale: f32,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ApiMode {
    /// Post captures to the webhook, falling back to simulated results
    #[default]
    Real,
    /// Never touch the network
    Mock,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct WebhookConfig {
    /// Analysis endpoint receiving multipart captures
    #[serde(default = "default_webhook_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Value of the `source` form field
    #[serde(default = "default_source_tag")]
    pub source_tag: String,

    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub mode: ApiMode,

    /// Artificial latency of simulated results in mock mode
    #[serde(default = "default_mock_latency_ms")]
    pub mock_latency_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct VoiceConfig {
    #[serde(default = "default_voice_enabled")]
    pub enabled: bool,

    /// Phrases that start an injury detection when heard
    #[serde(default = "default_trigger_phrases")]
    pub phrases: Vec<String>,

    #[serde(default = "default_restart_base_delay_ms")]
    pub restart_base_delay_ms: u64,

    #[serde(default = "default_restart_max_delay_ms")]
    pub restart_max_delay_ms: u64,

    /// Consecutive recognizer failures tolerated before giving up
    #[serde(default = "default_max_restart_attempts")]
    pub max_restart_attempts: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Directory receiving saved photos, documents and pose snapshots
    #[serde(default = "default_capture_path")]
    pub path: String,

    /// Scratch directory for temporary JPEG files
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Fixed location attached to detection requests
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Enable single-key controls on the terminal
    #[serde(default)]
    pub keyboard_controls: bool,
}

impl PosecamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("posecam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default(
                "camera.resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("camera.fps", default_camera_fps())?
            .set_default("camera.facing", "back")?
            .set_default("camera.rotation_degrees", 0)?
            .set_default("camera.jpeg_quality", default_jpeg_quality() as u64)?
            .set_default(
                "analysis.process_interval_ms",
                default_process_interval_ms(),
            )?
            .set_default(
                "analysis.display_resolution",
                vec![
                    default_display_resolution().0,
                    default_display_resolution().1,
                ],
            )?
            .set_default("overlay.dot_radius", default_dot_radius() as f64)?
            .set_default("overlay.glow_radius", default_glow_radius() as f64)?
            .set_default("overlay.base_stroke", default_base_stroke() as f64)?
            .set_default("overlay.thickness_scale", default_thickness_scale() as f64)?
            .set_default("webhook.endpoint", default_webhook_endpoint())?
            .set_default("webhook.user_agent", default_user_agent())?
            .set_default("webhook.source_tag", default_source_tag())?
            .set_default("webhook.timeout_secs", default_webhook_timeout_secs())?
            .set_default("webhook.mode", "real")?
            .set_default("webhook.mock_latency_ms", default_mock_latency_ms())?
            .set_default("voice.enabled", default_voice_enabled())?
            .set_default("voice.phrases", default_trigger_phrases())?
            .set_default(
                "voice.restart_base_delay_ms",
                default_restart_base_delay_ms(),
            )?
            .set_default("voice.restart_max_delay_ms", default_restart_max_delay_ms())?
            .set_default(
                "voice.max_restart_attempts",
                default_max_restart_attempts(),
            )?
            .set_default("capture.path", default_capture_path())?
            .set_default("capture.cache_dir", default_cache_dir())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default("system.keyboard_controls", false)?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // POSECAM_WEBHOOK__ENDPOINT style overrides
            .add_source(
                Environment::with_prefix("POSECAM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: PosecamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.camera.resolution.0 == 0 || self.camera.resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if !matches!(self.camera.rotation_degrees, 0 | 90 | 180 | 270) {
            return Err(ConfigError::Message(format!(
                "Camera rotation must be 0, 90, 180 or 270 (got {})",
                self.camera.rotation_degrees
            )));
        }

        if self.camera.jpeg_quality == 0 || self.camera.jpeg_quality > 100 {
            return Err(ConfigError::Message(
                "JPEG quality must be between 1 and 100".to_string(),
            ));
        }

        if self.analysis.process_interval_ms == 0 {
            return Err(ConfigError::Message(
                "Analysis process_interval_ms must be greater than 0".to_string(),
            ));
        }

        if self.analysis.display_resolution.0 == 0 || self.analysis.display_resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Display resolution must be greater than 0".to_string(),
            ));
        }

        if self.overlay.base_stroke <= 0.0 || self.overlay.dot_radius <= 0.0 {
            return Err(ConfigError::Message(
                "Overlay stroke and radius must be positive".to_string(),
            ));
        }

        if self.webhook.endpoint.trim().is_empty() {
            return Err(ConfigError::Message(
                "Webhook endpoint must not be empty".to_string(),
            ));
        }

        if self.webhook.source_tag.trim().is_empty() {
            return Err(ConfigError::Message(
                "Webhook source_tag must not be empty".to_string(),
            ));
        }

        if self.webhook.timeout_secs == 0 {
            return Err(ConfigError::Message(
                "Webhook timeout must be greater than 0".to_string(),
            ));
        }

        if self.voice.enabled && self.voice.phrases.iter().all(|p| p.trim().is_empty()) {
            return Err(ConfigError::Message(
                "Voice trigger needs at least one phrase".to_string(),
            ));
        }

        if self.voice.max_restart_attempts == 0 {
            return Err(ConfigError::Message(
                "Voice max_restart_attempts must be greater than 0".to_string(),
            ));
        }

        if self.capture.latitude.is_some() != self.capture.longitude.is_some() {
            return Err(ConfigError::Message(
                "Capture latitude and longitude must be set together".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl AnalysisConfig {
    pub fn process_interval(&self) -> Duration {
        Duration::from_millis(self.process_interval_ms)
    }
}

impl WebhookConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn mock_latency(&self) -> Duration {
        Duration::from_millis(self.mock_latency_ms)
    }
}

impl CaptureConfig {
    pub fn capture_dir(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }

    pub fn cache_dir(&self) -> PathBuf {
        PathBuf::from(&self.cache_dir)
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            dot_radius: default_dot_radius(),
            glow_radius: default_glow_radius(),
            base_stroke: default_base_stroke(),
            thickness_scale: default_thickness_scale(),
        }
    }
}

impl Default for PosecamConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig {
                resolution: default_camera_resolution(),
                fps: default_camera_fps(),
                facing: LensFacing::default(),
                rotation_degrees: 0,
                jpeg_quality: default_jpeg_quality(),
            },
            analysis: AnalysisConfig {
                process_interval_ms: default_process_interval_ms(),
                display_resolution: default_display_resolution(),
            },
            overlay: OverlayConfig::default(),
            webhook: WebhookConfig {
                endpoint: default_webhook_endpoint(),
                user_agent: default_user_agent(),
                source_tag: default_source_tag(),
                timeout_secs: default_webhook_timeout_secs(),
                mode: ApiMode::default(),
                mock_latency_ms: default_mock_latency_ms(),
            },
            voice: VoiceConfig {
                enabled: default_voice_enabled(),
                phrases: default_trigger_phrases(),
                restart_base_delay_ms: default_restart_base_delay_ms(),
                restart_max_delay_ms: default_restart_max_delay_ms(),
                max_restart_attempts: default_max_restart_attempts(),
            },
            capture: CaptureConfig {
                path: default_capture_path(),
                cache_dir: default_cache_dir(),
                latitude: None,
                longitude: None,
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
                keyboard_controls: false,
            },
        }
    }
}

// Default value functions
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    30
}
fn default_jpeg_quality() -> u8 {
    90
}

fn default_process_interval_ms() -> u64 {
    100
} // At most 10 frames per second reach the extractor
fn default_display_resolution() -> (u32, u32) {
    (720, 960)
}

fn default_dot_radius() -> f32 {
    10.0
}
fn default_glow_radius() -> f32 {
    15.0
}
fn default_base_stroke() -> f32 {
    6.0
}
fn default_thickness_scale() -> f32 {
    8.0
}

fn default_webhook_endpoint() -> String {
    "http://127.0.0.1:5678/webhook/aid".to_string()
}
fn default_user_agent() -> String {
    "Android-Injury-Detection-App".to_string()
}
fn default_source_tag() -> String {
    "android_injury_detection".to_string()
}
fn default_webhook_timeout_secs() -> u64 {
    30
}
fn default_mock_latency_ms() -> u64 {
    1500
}

fn default_voice_enabled() -> bool {
    true
}
pub(crate) fn default_trigger_phrases() -> Vec<String> {
    [
        "process img",
        "process image",
        "analyze",
        "detect injury",
        "check injury",
        "scan",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}
fn default_restart_base_delay_ms() -> u64 {
    1000
}
fn default_restart_max_delay_ms() -> u64 {
    30_000
}
fn default_max_restart_attempts() -> u32 {
    5
}

fn default_capture_path() -> String {
    "./captures".to_string()
}
fn default_cache_dir() -> String {
    std::env::temp_dir()
        .join("posecam")
        .to_string_lossy()
        .into_owned()
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = PosecamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis.process_interval(), Duration::from_millis(100));
        assert_eq!(config.webhook.mode, ApiMode::Real);
        assert_eq!(config.voice.phrases.len(), 6);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[webhook]
endpoint = "http://example.test/hook"
mode = "mock"

[camera]
facing = "front"
rotation_degrees = 90
"#
        )
        .unwrap();

        let config = PosecamConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.webhook.endpoint, "http://example.test/hook");
        assert_eq!(config.webhook.mode, ApiMode::Mock);
        assert_eq!(config.camera.facing, LensFacing::Front);
        assert_eq!(config.camera.rotation_degrees, 90);
        // Untouched sections keep their defaults
        assert_eq!(config.analysis.process_interval_ms, 100);
        assert_eq!(config.overlay.base_stroke, 6.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = PosecamConfig::default();
        config.camera.resolution = (0, 0);
        assert!(config.validate().is_err());

        config.camera.resolution = (640, 480);
        assert!(config.validate().is_ok());

        config.camera.rotation_degrees = 45;
        assert!(config.validate().is_err());
        config.camera.rotation_degrees = 270;

        config.webhook.endpoint = "  ".to_string();
        assert!(config.validate().is_err());
        config.webhook.endpoint = default_webhook_endpoint();

        config.voice.phrases.clear();
        assert!(config.validate().is_err());
        config.voice.enabled = false;
        assert!(config.validate().is_ok());

        config.capture.latitude = Some(52.5);
        assert!(config.validate().is_err());
        config.capture.longitude = Some(13.4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip_of_defaults() {
        let config = PosecamConfig::default();
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[webhook]"));
        let parsed: PosecamConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
