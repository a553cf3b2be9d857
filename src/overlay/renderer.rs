use super::primitives::{Brush, Color, DrawCommand};
use super::transform::CoordinateTransform;
use crate::config::OverlayConfig;
use crate::frame::{ImageSourceInfo, Size};
use crate::pose::{Landmark, LandmarkKind, LandmarkSet};
use tracing::trace;

use LandmarkKind::*;

/// Which side of the body a limb belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Arms and legs drawn as curves through their middle joint
pub const LIMBS: [(LandmarkKind, LandmarkKind, LandmarkKind, Side); 4] = [
    (LeftShoulder, LeftElbow, LeftWrist, Side::Left),
    (RightShoulder, RightElbow, RightWrist, Side::Right),
    (LeftHip, LeftKnee, LeftAnkle, Side::Left),
    (RightHip, RightKnee, RightAnkle, Side::Right),
];

pub const TORSO_EDGES: [(LandmarkKind, LandmarkKind); 2] =
    [(LeftShoulder, RightShoulder), (LeftHip, RightHip)];

pub const FACE_EDGES: [(LandmarkKind, LandmarkKind); 9] = [
    (Nose, LeftEyeInner),
    (LeftEyeInner, LeftEye),
    (LeftEye, LeftEyeOuter),
    (LeftEyeOuter, LeftEar),
    (Nose, RightEyeInner),
    (RightEyeInner, RightEye),
    (RightEye, RightEyeOuter),
    (RightEyeOuter, RightEar),
    (LeftMouth, RightMouth),
];

/// Fraction of a landmark's confidence used for its glow
pub const GLOW_ALPHA_FACTOR: f32 = 0.2;

/// Turns a landmark set into skeleton draw commands
#[derive(Debug, Clone)]
pub struct PoseRenderer {
    style: OverlayConfig,
    left_brush: Brush,
    right_brush: Brush,
    connector_brush: Brush,
}

impl PoseRenderer {
    pub fn new(style: OverlayConfig) -> Self {
        Self {
            style,
            left_brush: Brush::LinearGradient {
                from: Color::from_hex(0x4CAF50),
                to: Color::from_hex(0x81C784),
            },
            right_brush: Brush::LinearGradient {
                from: Color::from_hex(0xFFC107),
                to: Color::from_hex(0xFFD54F),
            },
            connector_brush: Brush::Solid(Color::WHITE),
        }
    }

    pub fn style(&self) -> &OverlayConfig {
        &self.style
    }

    pub fn brush_for(&self, side: Side) -> Brush {
        match side {
            Side::Left => self.left_brush,
            Side::Right => self.right_brush,
        }
    }

    /// Stroke width of a limb given the confidence of its two ends
    pub fn limb_width(&self, start_confidence: f32, end_confidence: f32) -> f32 {
        self.style
            .base_stroke
            .max((start_confidence + end_confidence) * self.style.thickness_scale)
    }

    /// Render one frame's landmarks. The caller clears the surface beforehand.
    pub fn render(
        &self,
        landmarks: &LandmarkSet,
        source: ImageSourceInfo,
        display: Size,
    ) -> Vec<DrawCommand> {
        let mut commands = Vec::new();
        if landmarks.is_empty() {
            return commands;
        }

        let transform = CoordinateTransform::new(source, display);

        for (start, mid, end, side) in LIMBS {
            if let Some(cmd) = self.limb_curve(landmarks, &transform, start, mid, end, side) {
                commands.push(cmd);
            }
        }

        for (a, b) in TORSO_EDGES.iter().chain(FACE_EDGES.iter()) {
            if let (Some(a), Some(b)) = (landmarks.get(*a), landmarks.get(*b)) {
                commands.push(DrawCommand::Line {
                    start: transform.map(a.position),
                    end: transform.map(b.position),
                    width: self.style.base_stroke,
                    brush: self.connector_brush,
                });
            }
        }

        for landmark in landmarks.iter() {
            self.push_marker(&mut commands, &transform, landmark);
        }

        trace!(
            "Rendered {} landmarks into {} draw commands",
            landmarks.len(),
            commands.len()
        );
        commands
    }

    fn limb_curve(
        &self,
        landmarks: &LandmarkSet,
        transform: &CoordinateTransform,
        start: LandmarkKind,
        mid: LandmarkKind,
        end: LandmarkKind,
        side: Side,
    ) -> Option<DrawCommand> {
        let start = landmarks.get(start)?;
        let mid = landmarks.get(mid)?;
        let end = landmarks.get(end)?;

        Some(DrawCommand::QuadCurve {
            start: transform.map(start.position),
            control: transform.map(mid.position),
            end: transform.map(end.position),
            width: self.limb_width(start.confidence, end.confidence),
            brush: self.brush_for(side),
        })
    }

    fn push_marker(
        &self,
        commands: &mut Vec<DrawCommand>,
        transform: &CoordinateTransform,
        landmark: &Landmark,
    ) {
        let center = transform.map(landmark.position);
        commands.push(DrawCommand::Circle {
            center,
            radius: self.style.glow_radius,
            color: Color::WHITE.with_alpha(GLOW_ALPHA_FACTOR * landmark.confidence),
        });
        commands.push(DrawCommand::Circle {
            center,
            radius: self.style.dot_radius,
            color: Color::WHITE.with_alpha(landmark.confidence),
        });
    }
}

impl Default for PoseRenderer {
    fn default() -> Self {
        Self::new(OverlayConfig::default())
    }
}
