use super::source::{CapturedStill, FrameSource};
use crate::error::{CameraError, Result};
use crate::events::{EventBus, PosecamEvent};
use crate::frame::{FrameData, LensFacing, SourceInfoTracker};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::watch;
use tracing::{error, info};

/// Owns the frame source and serialises every bind/unbind on it
pub struct CameraController {
    source: Arc<dyn FrameSource>,
    tracker: Arc<Mutex<SourceInfoTracker>>,
    rebind_lock: tokio::sync::Mutex<()>,
    event_bus: EventBus,
}

impl CameraController {
    pub fn new(source: Arc<dyn FrameSource>, event_bus: EventBus) -> Self {
        Self {
            source,
            tracker: Arc::new(Mutex::new(SourceInfoTracker::new())),
            rebind_lock: tokio::sync::Mutex::new(()),
            event_bus,
        }
    }

    /// Bind the initial lens
    pub async fn start(&self, facing: LensFacing) -> Result<()> {
        let _guard = self.rebind_lock.lock().await;
        self.rebind(facing).await
    }

    /// Switch lenses: unbind everything, then bind the requested lens
    pub async fn switch_facing(&self, facing: LensFacing) -> Result<()> {
        let _guard = self.rebind_lock.lock().await;
        if self.source.facing() == Some(facing) {
            return Ok(());
        }
        self.rebind(facing).await
    }

    /// Flip to the other lens and return the new facing
    pub async fn toggle_facing(&self) -> Result<LensFacing> {
        let _guard = self.rebind_lock.lock().await;
        let next = self.source.facing().unwrap_or_default().toggled();
        self.rebind(next).await?;
        Ok(next)
    }

    async fn rebind(&self, facing: LensFacing) -> Result<()> {
        info!("Binding camera to {} lens", facing);

        self.source.unbind().await?;
        self.tracker.lock().invalidate();

        if let Err(e) = self.source.bind(facing).await {
            error!("Camera bind failed: {}", e);
            return Err(e.into());
        }

        if let Err(e) = self.event_bus.publish(PosecamEvent::CameraRebound {
            facing,
            timestamp: SystemTime::now(),
        }) {
            error!("Failed to publish camera rebound event: {}", e);
        }
        Ok(())
    }

    pub async fn stop(&self) -> Result<()> {
        let _guard = self.rebind_lock.lock().await;
        self.source.unbind().await?;
        info!("Camera released");
        Ok(())
    }

    pub async fn capture_still(&self) -> std::result::Result<CapturedStill, CameraError> {
        self.source.capture_still().await
    }

    pub fn frames(&self) -> watch::Receiver<Option<FrameData>> {
        self.source.frames()
    }

    pub fn facing(&self) -> Option<LensFacing> {
        self.source.facing()
    }

    /// Source geometry tracker shared with the pose pipeline
    pub fn tracker(&self) -> Arc<Mutex<SourceInfoTracker>> {
        Arc::clone(&self.tracker)
    }

    pub fn source(&self) -> Arc<dyn FrameSource> {
        Arc::clone(&self.source)
    }
}
