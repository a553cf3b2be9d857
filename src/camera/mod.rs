mod controller;
mod source;
mod synthetic;
#[cfg(test)]
mod tests;

pub use controller::CameraController;
pub use source::{CapturedStill, FrameSource};
pub use synthetic::SyntheticCamera;
