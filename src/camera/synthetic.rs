use super::source::{CapturedStill, FrameSource};
use crate::config::CameraConfig;
use crate::error::CameraError;
use crate::frame::{encode_jpeg, FrameData, FrameFormat, LensFacing};
use async_trait::async_trait;
use chrono::Utc;
use image::{Rgb, RgbImage};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

struct Binding {
    facing: LensFacing,
    task: JoinHandle<()>,
}

/// Frame source that paints gradient frames instead of talking to hardware
pub struct SyntheticCamera {
    config: CameraConfig,
    sender: watch::Sender<Option<FrameData>>,
    binding: Mutex<Option<Binding>>,
    frame_counter: Arc<AtomicU64>,
    bind_count: AtomicU64,
    fail_stills: AtomicBool,
}

impl SyntheticCamera {
    pub fn new(config: CameraConfig) -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            config,
            sender,
            binding: Mutex::new(None),
            frame_counter: Arc::new(AtomicU64::new(0)),
            bind_count: AtomicU64::new(0),
            fail_stills: AtomicBool::new(false),
        }
    }

    /// Make every following still capture fail
    pub fn set_fail_stills(&self, fail: bool) {
        self.fail_stills.store(fail, Ordering::Relaxed);
    }

    /// Total successful binds since creation
    pub fn bind_count(&self) -> u64 {
        self.bind_count.load(Ordering::Relaxed)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_counter.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }
}

/// Diagonal gradient whose blue channel drifts with the frame id
fn paint_frame(width: u32, height: u32, frame_id: u64, facing: LensFacing) -> RgbImage {
    let tint = (frame_id % 256) as u8;
    let green_bias = if facing == LensFacing::Front { 64 } else { 0 };
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            ((y * 255 / height.max(1)) as u8).saturating_add(green_bias),
            tint,
        ])
    })
}

#[async_trait]
impl FrameSource for SyntheticCamera {
    async fn bind(&self, facing: LensFacing) -> Result<(), CameraError> {
        let mut binding = self.binding.lock();
        if let Some(current) = binding.as_ref() {
            return Err(CameraError::Bind {
                facing: facing.to_string(),
                details: format!("camera already bound to the {} lens", current.facing),
            });
        }

        let config = self.config.clone();
        let sender = self.sender.clone();
        let frame_counter = Arc::clone(&self.frame_counter);

        let task = tokio::spawn(async move {
            let frame_interval = Duration::from_millis(1000 / config.fps.max(1) as u64);
            let mut interval_timer = tokio::time::interval(frame_interval);
            let (width, height) = config.resolution;

            info!("Synthetic capture loop started on {} lens", facing);

            loop {
                interval_timer.tick().await;

                let frame_id = frame_counter.fetch_add(1, Ordering::Relaxed);
                let image = paint_frame(width, height, frame_id, facing);
                let data = match encode_jpeg(&image, config.jpeg_quality) {
                    Ok(data) => data,
                    Err(e) => {
                        warn!("Synthetic frame {} dropped: {}", frame_id, e);
                        continue;
                    }
                };

                trace!(
                    "Generated synthetic frame {} ({}x{}, {} bytes)",
                    frame_id,
                    width,
                    height,
                    data.len()
                );

                let frame = FrameData::new(
                    frame_id,
                    SystemTime::now(),
                    data,
                    width,
                    height,
                    FrameFormat::Jpeg,
                )
                .with_orientation(config.rotation_degrees, facing);

                // Keeps going with no receivers; the latest frame is still readable
                sender.send_replace(Some(frame));
            }
        });

        *binding = Some(Binding { facing, task });
        self.bind_count.fetch_add(1, Ordering::Relaxed);
        debug!("Synthetic camera bound to {} lens", facing);
        Ok(())
    }

    async fn unbind(&self) -> Result<(), CameraError> {
        let previous = self.binding.lock().take();
        if let Some(binding) = previous {
            binding.task.abort();
            let _ = binding.task.await;
            debug!("Synthetic camera unbound from {} lens", binding.facing);
        }
        Ok(())
    }

    fn frames(&self) -> watch::Receiver<Option<FrameData>> {
        self.sender.subscribe()
    }

    async fn capture_still(&self) -> Result<CapturedStill, CameraError> {
        let facing = self.facing().ok_or(CameraError::NotBound)?;

        if self.fail_stills.load(Ordering::Relaxed) {
            return Err(CameraError::StillCapture {
                details: "synthetic camera configured to fail stills".to_string(),
            });
        }

        let (width, height) = self.config.resolution;
        let frame_id = self.frame_counter.load(Ordering::Relaxed);
        let quality = self.config.jpeg_quality;

        let jpeg = tokio::task::spawn_blocking(move || {
            encode_jpeg(&paint_frame(width, height, frame_id, facing), quality)
        })
        .await
        .map_err(|e| CameraError::StillCapture {
            details: e.to_string(),
        })??;

        Ok(CapturedStill {
            jpeg,
            width,
            height,
            rotation_degrees: self.config.rotation_degrees,
            facing,
            taken_at: Utc::now(),
        })
    }

    fn facing(&self) -> Option<LensFacing> {
        self.binding.lock().as_ref().map(|b| b.facing)
    }
}

impl Drop for SyntheticCamera {
    fn drop(&mut self) {
        if let Some(binding) = self.binding.get_mut().take() {
            binding.task.abort();
        }
    }
}
