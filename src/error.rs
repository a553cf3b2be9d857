use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PosecamError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Pose error: {0}")]
    Pose(#[from] PoseError),

    #[error("Detection error: {0}")]
    Detection(#[from] DetectionError),

    #[error("Voice error: {0}")]
    Voice(#[from] VoiceError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

#[derive(Error, Debug, Clone)]
pub enum CameraError {
    #[error("Camera is not bound")]
    NotBound,

    #[error("Camera bind failed for {facing}: {details}")]
    Bind { facing: String, details: String },

    #[error("Still capture failed: {details}")]
    StillCapture { details: String },

    #[error("Frame encoding failed: {details}")]
    Encoding { details: String },

    #[error("Camera frame timeout after {timeout:?}")]
    FrameTimeout { timeout: Duration },
}

#[derive(Error, Debug, Clone)]
pub enum PoseError {
    #[error("Landmark extraction failed: {details}")]
    Extraction { details: String },

    #[error("Frame decode failed for frame {frame_id}: {details}")]
    Decode { frame_id: u64, details: String },

    #[error("Invalid image source size {width}x{height}")]
    InvalidSourceSize { width: u32, height: u32 },
}

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Webhook returned HTTP {status}")]
    Status { status: u16 },

    #[error("Webhook returned an empty body")]
    EmptyBody,

    #[error("Webhook response is not a valid result: {details}")]
    MalformedResponse { details: String },

    #[error("Temporary image file error: {0}")]
    TempFile(#[source] std::io::Error),

    #[error("Invalid webhook endpoint '{endpoint}': {details}")]
    Endpoint { endpoint: String, details: String },
}

#[derive(Error, Debug, Clone)]
pub enum VoiceError {
    #[error("Speech recognizer failed to start: {details}")]
    Start { details: String },

    #[error("Speech recognition error: {details}")]
    Recognition { details: String },

    #[error("Speech recognizer gave up after {attempts} attempts")]
    GaveUp { attempts: u32 },
}

#[derive(Error, Debug, Clone)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Receiver lagged behind by {skipped} events")]
    Lagged { skipped: u64 },

    #[error("Event channel closed")]
    ChannelClosed,
}

impl PosecamError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the failed operation can reasonably succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            PosecamError::Config(_) | PosecamError::Serialization(_) => false,
            PosecamError::Camera(CameraError::NotBound) => false,
            PosecamError::Camera(_) => true,
            PosecamError::Pose(_) => true,
            PosecamError::Detection(DetectionError::Endpoint { .. }) => false,
            PosecamError::Detection(_) => true,
            PosecamError::Voice(VoiceError::GaveUp { .. }) => false,
            PosecamError::Voice(_) => true,
            PosecamError::EventBus(EventBusError::ChannelClosed) => false,
            PosecamError::EventBus(_) => true,
            PosecamError::Io(_) | PosecamError::Json(_) => true,
            PosecamError::System { .. } | PosecamError::Component { .. } => false,
        }
    }

    /// Short message suitable for a transient on-screen notice
    pub fn user_message(&self) -> String {
        match self {
            PosecamError::Camera(CameraError::NotBound) => "Camera not ready for capture".to_string(),
            PosecamError::Camera(CameraError::StillCapture { details }) => {
                format!("Image capture failed: {}", details)
            }
            PosecamError::Camera(e) => format!("Camera problem: {}", e),
            PosecamError::Detection(_) => "Failed to analyze image".to_string(),
            PosecamError::Voice(VoiceError::GaveUp { .. }) => {
                "Voice commands unavailable".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PosecamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        assert!(PosecamError::Camera(CameraError::StillCapture {
            details: "busy".to_string()
        })
        .is_recoverable());
        assert!(!PosecamError::Camera(CameraError::NotBound).is_recoverable());
        assert!(!PosecamError::Voice(VoiceError::GaveUp { attempts: 5 }).is_recoverable());
        assert!(!PosecamError::system("boom").is_recoverable());
    }

    #[test]
    fn test_user_messages() {
        let err = PosecamError::Camera(CameraError::StillCapture {
            details: "device busy".to_string(),
        });
        assert_eq!(err.user_message(), "Image capture failed: device busy");

        let err = PosecamError::Detection(DetectionError::EmptyBody);
        assert_eq!(err.user_message(), "Failed to analyze image");
    }

    #[test]
    fn test_component_error_display() {
        let err = PosecamError::component("reporter", "state poisoned");
        assert_eq!(
            err.to_string(),
            "Component error in reporter: state poisoned"
        );
    }
}
