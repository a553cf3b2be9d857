use super::landmark::LandmarkSet;
use crate::error::PoseError;
use crate::frame::{FrameData, ImageSourceInfo};
use image::imageops;
use image::RgbaImage;
use parking_lot::Mutex;

/// The most recent frame that produced landmarks, with the geometry used to draw them
#[derive(Debug, Clone)]
pub struct PoseSnapshot {
    pub frame: FrameData,
    pub landmarks: LandmarkSet,
    pub source: ImageSourceInfo,
}

impl PoseSnapshot {
    /// Decode the frame and turn it upright, flipped the way the preview shows it
    pub fn upright_image(&self) -> Result<RgbaImage, PoseError> {
        let decoded = self.frame.to_rgba()?;
        let mut upright = match self.frame.rotation_degrees {
            90 => imageops::rotate90(&decoded),
            180 => imageops::rotate180(&decoded),
            270 => imageops::rotate270(&decoded),
            _ => decoded,
        };
        if self.source.mirrored {
            imageops::flip_horizontal_in_place(&mut upright);
        }
        Ok(upright)
    }
}

/// Single-slot cell holding the latest [`PoseSnapshot`]
#[derive(Debug, Default)]
pub struct LatestPoseSlot {
    inner: Mutex<Option<PoseSnapshot>>,
}

impl LatestPoseSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, snapshot: PoseSnapshot) {
        *self.inner.lock() = Some(snapshot);
    }

    pub fn latest(&self) -> Option<PoseSnapshot> {
        self.inner.lock().clone()
    }

    pub fn clear(&self) {
        self.inner.lock().take();
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_none()
    }
}
