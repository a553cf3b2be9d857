use super::pipeline::{FrameOutcome, PoseAnalyzer, PoseStats};
use crate::error::{PosecamError, Result};
use crate::events::{EventBus, PosecamEvent};
use crate::frame::FrameData;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Feeds the live frame stream through a [`PoseAnalyzer`] and announces overlays
pub struct PoseIntegration {
    analyzer: Arc<Mutex<PoseAnalyzer>>,
    event_bus: EventBus,
    task: Option<JoinHandle<()>>,
    cancel: CancellationToken,
}

impl PoseIntegration {
    pub fn new(analyzer: PoseAnalyzer, event_bus: EventBus) -> Self {
        Self {
            analyzer: Arc::new(Mutex::new(analyzer)),
            event_bus,
            task: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Start consuming `frames` until stopped or the sender goes away
    pub fn start(&mut self, mut frames: watch::Receiver<Option<FrameData>>) -> Result<()> {
        if self.task.is_some() {
            warn!("Pose integration is already running");
            return Ok(());
        }

        info!("Starting pose integration");
        let analyzer = Arc::clone(&self.analyzer);
        let event_bus = self.event_bus.clone();
        let cancel = self.cancel.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Pose integration cancelled");
                        break;
                    }
                    changed = frames.changed() => {
                        if changed.is_err() {
                            info!("Frame stream closed, pose integration stopping");
                            break;
                        }
                    }
                }

                let frame = match frames.borrow_and_update().clone() {
                    Some(frame) => frame,
                    None => continue,
                };

                let outcome = analyzer.lock().offer(&frame, Instant::now());
                if let FrameOutcome::Rendered { commands } = outcome {
                    let landmark_count = analyzer
                        .lock()
                        .slot()
                        .latest()
                        .map(|s| s.landmarks.len())
                        .unwrap_or(0);

                    if let Err(e) = event_bus.publish(PosecamEvent::OverlayReady {
                        frame_id: frame.id,
                        landmark_count,
                        command_count: commands.len(),
                        timestamp: SystemTime::now(),
                    }) {
                        error!("Failed to publish overlay event: {}", e);
                    }
                }
            }

            info!("Pose integration task ended");
        });

        self.task = Some(task);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.await
                .map_err(|e| PosecamError::component("pose_integration", e.to_string()))?;
        }
        info!("Pose integration stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    pub fn stats(&self) -> PoseStats {
        self.analyzer.lock().stats()
    }

    pub fn analyzer(&self) -> Arc<Mutex<PoseAnalyzer>> {
        Arc::clone(&self.analyzer)
    }
}
