use super::landmark::{Landmark, LandmarkKind, LandmarkSet};
use crate::error::PoseError;
use crate::frame::{FrameData, ImageSourceInfo};
use std::sync::atomic::{AtomicU64, Ordering};

/// Pose detector boundary: frame in, optional landmark set out
pub trait LandmarkExtractor: Send + Sync {
    /// Detect body landmarks. `Ok(None)` means no person was found.
    fn extract(&self, frame: &FrameData) -> Result<Option<LandmarkSet>, PoseError>;

    fn name(&self) -> &str {
        "landmark_extractor"
    }
}

/// Reference skeleton in a 100x100 upright unit box
const STANDING_POSE: [(LandmarkKind, f32, f32); LandmarkKind::COUNT] = [
    (LandmarkKind::Nose, 50.0, 10.0),
    (LandmarkKind::LeftEyeInner, 52.0, 8.0),
    (LandmarkKind::LeftEye, 54.0, 8.0),
    (LandmarkKind::LeftEyeOuter, 56.0, 8.0),
    (LandmarkKind::RightEyeInner, 48.0, 8.0),
    (LandmarkKind::RightEye, 46.0, 8.0),
    (LandmarkKind::RightEyeOuter, 44.0, 8.0),
    (LandmarkKind::LeftEar, 58.0, 10.0),
    (LandmarkKind::RightEar, 42.0, 10.0),
    (LandmarkKind::LeftMouth, 53.0, 14.0),
    (LandmarkKind::RightMouth, 47.0, 14.0),
    (LandmarkKind::LeftShoulder, 62.0, 24.0),
    (LandmarkKind::RightShoulder, 38.0, 24.0),
    (LandmarkKind::LeftElbow, 68.0, 38.0),
    (LandmarkKind::RightElbow, 32.0, 38.0),
    (LandmarkKind::LeftWrist, 70.0, 52.0),
    (LandmarkKind::RightWrist, 30.0, 52.0),
    (LandmarkKind::LeftPinky, 71.0, 55.0),
    (LandmarkKind::RightPinky, 29.0, 55.0),
    (LandmarkKind::LeftIndex, 70.0, 56.0),
    (LandmarkKind::RightIndex, 30.0, 56.0),
    (LandmarkKind::LeftThumb, 69.0, 54.0),
    (LandmarkKind::RightThumb, 31.0, 54.0),
    (LandmarkKind::LeftHip, 57.0, 55.0),
    (LandmarkKind::RightHip, 43.0, 55.0),
    (LandmarkKind::LeftKnee, 58.0, 74.0),
    (LandmarkKind::RightKnee, 42.0, 74.0),
    (LandmarkKind::LeftAnkle, 58.0, 92.0),
    (LandmarkKind::RightAnkle, 42.0, 92.0),
    (LandmarkKind::LeftHeel, 57.0, 95.0),
    (LandmarkKind::RightHeel, 43.0, 95.0),
    (LandmarkKind::LeftFootIndex, 61.0, 97.0),
    (LandmarkKind::RightFootIndex, 39.0, 97.0),
];

/// Stand-in detector that reports a gently swaying standing figure
pub struct DemoExtractor {
    calls: AtomicU64,
    confidence: f32,
}

impl DemoExtractor {
    pub fn new() -> Self {
        Self::with_confidence(0.9)
    }

    pub fn with_confidence(confidence: f32) -> Self {
        Self {
            calls: AtomicU64::new(0),
            confidence,
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Default for DemoExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl LandmarkExtractor for DemoExtractor {
    fn extract(&self, frame: &FrameData) -> Result<Option<LandmarkSet>, PoseError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let source = ImageSourceInfo::for_frame(frame)?;
        let sx = source.width as f32 / 100.0;
        let sy = source.height as f32 / 100.0;
        // Arms swing a little from frame to frame
        let sway = ((frame.id % 20) as f32 - 10.0) * 0.3;

        let set = STANDING_POSE
            .iter()
            .map(|(kind, x, y)| {
                let dx = match kind {
                    LandmarkKind::LeftWrist | LandmarkKind::LeftElbow => sway,
                    LandmarkKind::RightWrist | LandmarkKind::RightElbow => -sway,
                    _ => 0.0,
                };
                Landmark::new(*kind, (x + dx) * sx, y * sy, self.confidence)
            })
            .collect();

        Ok(Some(set))
    }

    fn name(&self) -> &str {
        "demo_extractor"
    }
}
