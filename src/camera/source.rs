use crate::error::CameraError;
use crate::frame::LensFacing;
use crate::frame::FrameData;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

/// A full-quality still image taken on request
#[derive(Debug, Clone)]
pub struct CapturedStill {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub rotation_degrees: u32,
    pub facing: LensFacing,
    pub taken_at: DateTime<Utc>,
}

/// Camera hardware boundary: a latest-frame stream plus still capture
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Open the camera on the given lens. Fails if already bound.
    async fn bind(&self, facing: LensFacing) -> Result<(), CameraError>;

    /// Release the camera. Unbinding an unbound source is a no-op.
    async fn unbind(&self) -> Result<(), CameraError>;

    /// Depth-one stream of the newest preview frame
    fn frames(&self) -> watch::Receiver<Option<FrameData>>;

    async fn capture_still(&self) -> Result<CapturedStill, CameraError>;

    /// Lens currently bound, if any
    fn facing(&self) -> Option<LensFacing>;

    fn is_bound(&self) -> bool {
        self.facing().is_some()
    }
}
