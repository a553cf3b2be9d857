pub mod extractor;
pub mod integration;
pub mod landmark;
pub mod pipeline;
pub mod slot;

pub use extractor::{DemoExtractor, LandmarkExtractor};
pub use integration::PoseIntegration;
pub use landmark::{Landmark, LandmarkKind, LandmarkSet, Point};
pub use pipeline::{FrameOutcome, FrameThrottle, PoseAnalyzer, PoseStats};
pub use slot::{LatestPoseSlot, PoseSnapshot};
