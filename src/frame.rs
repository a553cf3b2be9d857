use crate::error::{CameraError, PoseError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Frame format enumeration for frames travelling through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameFormat {
    /// Compressed JPEG frame
    Jpeg,
    /// Uncompressed packed RGB data
    Rgb24,
}

impl FrameFormat {
    /// Get bytes per pixel for the format
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            FrameFormat::Jpeg => 0, // Variable size, compressed
            FrameFormat::Rgb24 => 3,
        }
    }

    /// Check if format is compressed
    pub fn is_compressed(&self) -> bool {
        matches!(self, FrameFormat::Jpeg)
    }
}

/// Which physical camera produced a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LensFacing {
    Front,
    #[default]
    Back,
}

impl LensFacing {
    pub fn toggled(self) -> Self {
        match self {
            LensFacing::Front => LensFacing::Back,
            LensFacing::Back => LensFacing::Front,
        }
    }
}

impl fmt::Display for LensFacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LensFacing::Front => write!(f, "front"),
            LensFacing::Back => write!(f, "back"),
        }
    }
}

/// Frame data structure containing raw frame data and metadata
#[derive(Debug, Clone)]
pub struct FrameData {
    /// Unique frame identifier
    pub id: u64,
    /// Timestamp when frame was captured
    pub timestamp: SystemTime,
    /// Raw frame data (shared ownership for efficiency)
    pub data: Arc<Vec<u8>>,
    /// Frame width in pixels, as delivered by the sensor
    pub width: u32,
    /// Frame height in pixels, as delivered by the sensor
    pub height: u32,
    /// Frame format
    pub format: FrameFormat,
    /// Clockwise rotation needed to display the frame upright
    pub rotation_degrees: u32,
    /// Lens that produced the frame
    pub facing: LensFacing,
}

impl FrameData {
    /// Create a new frame data instance
    pub fn new(
        id: u64,
        timestamp: SystemTime,
        data: Vec<u8>,
        width: u32,
        height: u32,
        format: FrameFormat,
    ) -> Self {
        Self {
            id,
            timestamp,
            data: Arc::new(data),
            width,
            height,
            format,
            rotation_degrees: 0,
            facing: LensFacing::Back,
        }
    }

    pub fn with_orientation(mut self, rotation_degrees: u32, facing: LensFacing) -> Self {
        self.rotation_degrees = rotation_degrees % 360;
        self.facing = facing;
        self
    }

    /// Get the expected frame size for uncompressed formats
    pub fn expected_size(&self) -> Option<usize> {
        if self.format.is_compressed() {
            None
        } else {
            Some(self.width as usize * self.height as usize * self.format.bytes_per_pixel())
        }
    }

    /// Validate frame data size against expected size
    pub fn validate_size(&self) -> bool {
        match self.expected_size() {
            Some(expected) => self.data.len() == expected,
            None => true, // Compressed formats have variable size
        }
    }

    /// Get frame age in milliseconds
    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
            .as_millis() as u64
    }

    /// Decode the frame into an RGBA image
    pub fn to_rgba(&self) -> Result<image::RgbaImage, PoseError> {
        match self.format {
            FrameFormat::Jpeg => image::load_from_memory_with_format(
                &self.data,
                image::ImageFormat::Jpeg,
            )
            .map(|img| img.to_rgba8())
            .map_err(|e| PoseError::Decode {
                frame_id: self.id,
                details: e.to_string(),
            }),
            FrameFormat::Rgb24 => {
                let rgb = image::RgbImage::from_raw(self.width, self.height, self.data.to_vec())
                    .ok_or_else(|| PoseError::Decode {
                        frame_id: self.id,
                        details: format!(
                            "expected {} bytes, got {}",
                            self.width as usize * self.height as usize * 3,
                            self.data.len()
                        ),
                    })?;
                Ok(image::DynamicImage::ImageRgb8(rgb).to_rgba8())
            }
        }
    }

    /// Get JPEG bytes for this frame, encoding if necessary
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>, CameraError> {
        if self.format == FrameFormat::Jpeg {
            return Ok(self.data.as_ref().clone());
        }

        let rgb = image::RgbImage::from_raw(self.width, self.height, self.data.to_vec())
            .ok_or_else(|| CameraError::Encoding {
                details: format!("frame {} has an invalid buffer size", self.id),
            })?;
        encode_jpeg(&rgb, quality)
    }
}

/// Encode an RGB image to JPEG bytes
pub fn encode_jpeg(image: &image::RgbImage, quality: u8) -> Result<Vec<u8>, CameraError> {
    use image::codecs::jpeg::JpegEncoder;

    let mut output = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut output, quality);
    encoder
        .encode(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ColorType::Rgb8,
        )
        .map_err(|e| CameraError::Encoding {
            details: e.to_string(),
        })?;
    Ok(output)
}

/// Width and height of a drawing surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width as f32, height as f32)
    }
}

/// How source-image pixel coordinates relate to the display surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSourceInfo {
    /// Upright source width
    pub width: u32,
    /// Upright source height
    pub height: u32,
    /// Horizontal flip (front camera)
    pub mirrored: bool,
}

impl ImageSourceInfo {
    pub fn new(width: u32, height: u32, mirrored: bool) -> Result<Self, PoseError> {
        if width == 0 || height == 0 {
            return Err(PoseError::InvalidSourceSize { width, height });
        }
        Ok(Self {
            width,
            height,
            mirrored,
        })
    }

    /// Derive the upright source geometry from a sensor frame
    pub fn for_frame(frame: &FrameData) -> Result<Self, PoseError> {
        let (width, height) = match frame.rotation_degrees {
            90 | 270 => (frame.height, frame.width),
            _ => (frame.width, frame.height),
        };
        Self::new(width, height, frame.facing == LensFacing::Front)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width as f32, self.height as f32)
    }
}

/// Caches the current [`ImageSourceInfo`] and recomputes it only when invalidated
#[derive(Debug, Default)]
pub struct SourceInfoTracker {
    cached: Option<(ImageSourceInfo, u32, LensFacing)>,
    dirty: bool,
    recomputations: u64,
}

impl SourceInfoTracker {
    pub fn new() -> Self {
        Self {
            cached: None,
            dirty: true,
            recomputations: 0,
        }
    }

    /// Force recomputation on the next frame (camera rebind)
    pub fn invalidate(&mut self) {
        debug!("Image source info invalidated");
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty || self.cached.is_none()
    }

    /// Resolve the source info for a frame, recomputing only when needed
    pub fn resolve(&mut self, frame: &FrameData) -> Result<ImageSourceInfo, PoseError> {
        if let Some((info, rotation, facing)) = self.cached {
            if !self.dirty && rotation == frame.rotation_degrees && facing == frame.facing {
                return Ok(info);
            }
        }

        let info = ImageSourceInfo::for_frame(frame)?;
        debug!(
            "Image source info updated: {}x{} mirrored={} (rotation {})",
            info.width, info.height, info.mirrored, frame.rotation_degrees
        );
        self.cached = Some((info, frame.rotation_degrees, frame.facing));
        self.dirty = false;
        self.recomputations += 1;
        Ok(info)
    }

    pub fn current(&self) -> Option<ImageSourceInfo> {
        self.cached.map(|(info, _, _)| info)
    }

    pub fn recomputations(&self) -> u64 {
        self.recomputations
    }
}
