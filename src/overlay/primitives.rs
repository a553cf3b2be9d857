use crate::pose::Point;
use serde::{Deserialize, Serialize};

/// RGBA colour with a floating point alpha channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub alpha: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(0xFF, 0xFF, 0xFF);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, alpha: 1.0 }
    }

    /// Build an opaque colour from a 0xRRGGBB value
    pub const fn from_hex(hex: u32) -> Self {
        Self::rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
    }

    pub fn with_alpha(self, alpha: f32) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            ..self
        }
    }

    /// Linear interpolation between two colours, `t` in [0, 1]
    pub fn lerp(self, other: Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Color {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            alpha: self.alpha + (other.alpha - self.alpha) * t,
        }
    }
}

/// Paint used for a stroke
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Brush {
    Solid(Color),
    /// Gradient running from the start to the end of the stroke
    LinearGradient { from: Color, to: Color },
}

impl Brush {
    /// Colour at parameter `t` along the stroke
    pub fn color_at(&self, t: f32) -> Color {
        match self {
            Brush::Solid(color) => *color,
            Brush::LinearGradient { from, to } => from.lerp(*to, t),
        }
    }
}

/// One drawing call in display-surface coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DrawCommand {
    /// Quadratic Bézier stroke from `start` to `end` bent towards `control`
    QuadCurve {
        start: Point,
        control: Point,
        end: Point,
        width: f32,
        brush: Brush,
    },
    Line {
        start: Point,
        end: Point,
        width: f32,
        brush: Brush,
    },
    /// Filled disc
    Circle {
        center: Point,
        radius: f32,
        color: Color,
    },
}

impl DrawCommand {
    pub fn kind(&self) -> &'static str {
        match self {
            DrawCommand::QuadCurve { .. } => "quad_curve",
            DrawCommand::Line { .. } => "line",
            DrawCommand::Circle { .. } => "circle",
        }
    }
}

/// Evaluate a quadratic Bézier curve at `t`
pub fn quad_point(start: Point, control: Point, end: Point, t: f32) -> Point {
    let u = 1.0 - t;
    Point::new(
        u * u * start.x + 2.0 * u * t * control.x + t * t * end.x,
        u * u * start.y + 2.0 * u * t * control.y + t * t * end.y,
    )
}
