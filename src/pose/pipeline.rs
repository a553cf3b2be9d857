use super::extractor::LandmarkExtractor;
use super::slot::{LatestPoseSlot, PoseSnapshot};
use crate::frame::{FrameData, Size, SourceInfoTracker};
use crate::overlay::{DrawCommand, PoseRenderer};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Lets at most one frame through per interval
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    interval: Duration,
    last_accepted: Option<Instant>,
    dropped: u64,
}

impl FrameThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: None,
            dropped: 0,
        }
    }

    /// Returns true if a frame arriving at `now` should be processed
    pub fn admit(&mut self, now: Instant) -> bool {
        match self.last_accepted {
            Some(last) if now.saturating_duration_since(last) < self.interval => {
                self.dropped += 1;
                false
            }
            _ => {
                self.last_accepted = Some(now);
                true
            }
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn reset(&mut self) {
        self.last_accepted = None;
    }
}

/// What happened to a frame offered to the analyzer
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Arrived inside the cooldown and was dropped
    Throttled,
    /// Processed but no person was found
    NoPose,
    Rendered { commands: Vec<DrawCommand> },
    /// The extractor or geometry failed; the frame was skipped
    ExtractorFailed,
}

/// Pose pipeline counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoseStats {
    pub accepted: u64,
    pub throttled: u64,
    pub rendered: u64,
    pub no_pose: u64,
    pub failed: u64,
}

impl PoseStats {
    fn record(&mut self, outcome: &FrameOutcome) {
        match outcome {
            FrameOutcome::Throttled => self.throttled += 1,
            FrameOutcome::NoPose => {
                self.accepted += 1;
                self.no_pose += 1;
            }
            FrameOutcome::Rendered { .. } => {
                self.accepted += 1;
                self.rendered += 1;
            }
            FrameOutcome::ExtractorFailed => {
                self.accepted += 1;
                self.failed += 1;
            }
        }
    }
}

/// Throttle, extract, render and remember one frame at a time
pub struct PoseAnalyzer {
    extractor: Arc<dyn LandmarkExtractor>,
    renderer: PoseRenderer,
    tracker: Arc<Mutex<SourceInfoTracker>>,
    slot: Arc<LatestPoseSlot>,
    throttle: FrameThrottle,
    display: Size,
    stats: PoseStats,
}

impl PoseAnalyzer {
    pub fn new(
        extractor: Arc<dyn LandmarkExtractor>,
        renderer: PoseRenderer,
        tracker: Arc<Mutex<SourceInfoTracker>>,
        slot: Arc<LatestPoseSlot>,
        interval: Duration,
        display: Size,
    ) -> Self {
        Self {
            extractor,
            renderer,
            tracker,
            slot,
            throttle: FrameThrottle::new(interval),
            display,
            stats: PoseStats::default(),
        }
    }

    /// Offer a frame that arrived at `now`
    pub fn offer(&mut self, frame: &FrameData, now: Instant) -> FrameOutcome {
        let outcome = self.process(frame, now);
        self.stats.record(&outcome);
        outcome
    }

    fn process(&mut self, frame: &FrameData, now: Instant) -> FrameOutcome {
        if !self.throttle.admit(now) {
            return FrameOutcome::Throttled;
        }

        // Geometry must be known before any landmark is translated
        let source = match self.tracker.lock().resolve(frame) {
            Ok(source) => source,
            Err(e) => {
                warn!("Skipping frame {}: {}", frame.id, e);
                return FrameOutcome::ExtractorFailed;
            }
        };

        let landmarks = match self.extractor.extract(frame) {
            Ok(Some(landmarks)) if !landmarks.is_empty() => landmarks,
            Ok(_) => {
                debug!("No pose in frame {}", frame.id);
                return FrameOutcome::NoPose;
            }
            Err(e) => {
                warn!(
                    "Landmark extractor '{}' failed on frame {}: {}",
                    self.extractor.name(),
                    frame.id,
                    e
                );
                return FrameOutcome::ExtractorFailed;
            }
        };

        let commands = self.renderer.render(&landmarks, source, self.display);
        debug!(
            "Frame {}: {} landmarks, {} draw commands",
            frame.id,
            landmarks.len(),
            commands.len()
        );

        self.slot.store(PoseSnapshot {
            frame: frame.clone(),
            landmarks,
            source,
        });

        FrameOutcome::Rendered { commands }
    }

    pub fn stats(&self) -> PoseStats {
        self.stats.clone()
    }

    pub fn slot(&self) -> Arc<LatestPoseSlot> {
        Arc::clone(&self.slot)
    }

    pub fn renderer(&self) -> &PoseRenderer {
        &self.renderer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PoseError;
    use crate::frame::{FrameFormat, LensFacing};
    use crate::pose::{DemoExtractor, LandmarkSet};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::SystemTime;

    struct CountingExtractor {
        calls: AtomicU64,
        result: fn() -> Result<Option<LandmarkSet>, PoseError>,
    }

    impl LandmarkExtractor for CountingExtractor {
        fn extract(&self, _frame: &FrameData) -> Result<Option<LandmarkSet>, PoseError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.result)()
        }
    }

    fn frame(id: u64) -> FrameData {
        FrameData::new(id, SystemTime::now(), vec![], 640, 480, FrameFormat::Jpeg)
            .with_orientation(0, LensFacing::Back)
    }

    fn analyzer(extractor: Arc<dyn LandmarkExtractor>) -> PoseAnalyzer {
        PoseAnalyzer::new(
            extractor,
            PoseRenderer::default(),
            Arc::new(Mutex::new(SourceInfoTracker::new())),
            Arc::new(LatestPoseSlot::new()),
            Duration::from_millis(100),
            Size::new(720.0, 960.0),
        )
    }

    #[test]
    fn test_throttle_admits_one_frame_per_interval() {
        let mut throttle = FrameThrottle::new(Duration::from_millis(100));
        let start = Instant::now();

        assert!(throttle.admit(start));
        assert!(!throttle.admit(start + Duration::from_millis(10)));
        assert!(!throttle.admit(start + Duration::from_millis(99)));
        assert!(throttle.admit(start + Duration::from_millis(100)));
        assert_eq!(throttle.dropped(), 2);
    }

    #[test]
    fn test_rapid_frames_reach_extractor_once_per_interval() {
        let extractor = Arc::new(CountingExtractor {
            calls: AtomicU64::new(0),
            result: || Ok(None),
        });
        let mut analyzer = analyzer(extractor.clone());
        let start = Instant::now();

        // 25 frames, 10ms apart: accepted at 0, 100 and 200ms
        for i in 0..25u64 {
            analyzer.offer(&frame(i), start + Duration::from_millis(i * 10));
        }

        assert_eq!(extractor.calls.load(Ordering::SeqCst), 3);
        let stats = analyzer.stats();
        assert_eq!(stats.accepted, 3);
        assert_eq!(stats.throttled, 22);
        assert_eq!(stats.no_pose, 3);
    }

    #[test]
    fn test_extractor_failure_skips_frame() {
        let extractor = Arc::new(CountingExtractor {
            calls: AtomicU64::new(0),
            result: || {
                Err(PoseError::Extraction {
                    details: "model not loaded".to_string(),
                })
            },
        });
        let mut analyzer = analyzer(extractor);

        assert_eq!(
            analyzer.offer(&frame(1), Instant::now()),
            FrameOutcome::ExtractorFailed
        );
        assert_eq!(analyzer.stats().failed, 1);
        assert!(analyzer.slot().is_empty());
    }

    #[test]
    fn test_rendered_frame_is_stored_in_slot() {
        let mut analyzer = analyzer(Arc::new(DemoExtractor::new()));

        match analyzer.offer(&frame(42), Instant::now()) {
            FrameOutcome::Rendered { commands } => assert_eq!(commands.len(), 4 + 11 + 66),
            other => panic!("unexpected outcome {:?}", other),
        }

        let snapshot = analyzer.slot().latest().unwrap();
        assert_eq!(snapshot.frame.id, 42);
        assert_eq!(snapshot.source.width, 640);
    }

    #[test]
    fn test_zero_sized_frame_is_skipped() {
        let mut analyzer = analyzer(Arc::new(DemoExtractor::new()));
        let bad = FrameData::new(1, SystemTime::now(), vec![], 0, 0, FrameFormat::Jpeg);
        assert_eq!(
            analyzer.offer(&bad, Instant::now()),
            FrameOutcome::ExtractorFailed
        );
    }
}
