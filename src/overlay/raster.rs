//! Paints overlay draw commands onto an RGBA image.

use super::primitives::{quad_point, Brush, Color, DrawCommand};
use crate::pose::Point;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_circle_mut, Blend};
use tracing::debug;

/// Distance in pixels between stamped discs along a stroke
const STAMP_SPACING: f32 = 1.5;

/// Rasterise `commands` onto `image` in order, alpha blending every primitive
pub fn rasterize(commands: &[DrawCommand], image: RgbaImage) -> RgbaImage {
    let mut canvas = Blend(image);

    for command in commands {
        match command {
            DrawCommand::QuadCurve {
                start,
                control,
                end,
                width,
                brush,
            } => {
                let length = polyline_length(*start, *control, *end);
                stroke(&mut canvas, length, *width, brush, |t| {
                    quad_point(*start, *control, *end, t)
                });
            }
            DrawCommand::Line {
                start,
                end,
                width,
                brush,
            } => {
                let length = distance(*start, *end);
                stroke(&mut canvas, length, *width, brush, |t| {
                    Point::new(
                        start.x + (end.x - start.x) * t,
                        start.y + (end.y - start.y) * t,
                    )
                });
            }
            DrawCommand::Circle {
                center,
                radius,
                color,
            } => {
                if color.alpha > 0.0 {
                    draw_filled_circle_mut(
                        &mut canvas,
                        (center.x.round() as i32, center.y.round() as i32),
                        radius.round().max(1.0) as i32,
                        to_rgba(*color),
                    );
                }
            }
        }
    }

    debug!("Rasterised {} overlay commands", commands.len());
    canvas.0
}

fn stroke<F>(canvas: &mut Blend<RgbaImage>, length: f32, width: f32, brush: &Brush, at: F)
where
    F: Fn(f32) -> Point,
{
    let steps = (length / STAMP_SPACING).ceil().max(1.0) as u32;
    let radius = (width / 2.0).round().max(1.0) as i32;

    for step in 0..=steps {
        let t = step as f32 / steps as f32;
        let p = at(t);
        draw_filled_circle_mut(
            canvas,
            (p.x.round() as i32, p.y.round() as i32),
            radius,
            to_rgba(brush.color_at(t)),
        );
    }
}

fn distance(a: Point, b: Point) -> f32 {
    ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt()
}

/// Length of the control polygon, an upper bound of the curve length
fn polyline_length(start: Point, control: Point, end: Point) -> f32 {
    distance(start, control) + distance(control, end)
}

fn to_rgba(color: Color) -> Rgba<u8> {
    Rgba([
        color.r,
        color.g,
        color.b,
        (color.alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]))
    }

    #[test]
    fn test_opaque_circle_is_painted() {
        let commands = vec![DrawCommand::Circle {
            center: Point::new(20.0, 20.0),
            radius: 5.0,
            color: Color::WHITE,
        }];
        let image = rasterize(&commands, blank(40, 40));
        assert_eq!(image.get_pixel(20, 20), &Rgba([255, 255, 255, 255]));
        assert_eq!(image.get_pixel(2, 2), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_transparent_circle_leaves_image_untouched() {
        let commands = vec![DrawCommand::Circle {
            center: Point::new(20.0, 20.0),
            radius: 5.0,
            color: Color::WHITE.with_alpha(0.0),
        }];
        let image = rasterize(&commands, blank(40, 40));
        assert_eq!(image.get_pixel(20, 20), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_line_covers_its_midpoint() {
        let commands = vec![DrawCommand::Line {
            start: Point::new(5.0, 30.0),
            end: Point::new(55.0, 30.0),
            width: 6.0,
            brush: Brush::Solid(Color::rgb(255, 0, 0)),
        }];
        let image = rasterize(&commands, blank(60, 60));
        assert_eq!(image.get_pixel(30, 30), &Rgba([255, 0, 0, 255]));
        assert_eq!(image.get_pixel(30, 10), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_curve_passes_near_its_control_side() {
        let commands = vec![DrawCommand::QuadCurve {
            start: Point::new(10.0, 50.0),
            control: Point::new(50.0, 10.0),
            end: Point::new(90.0, 50.0),
            width: 4.0,
            brush: Brush::Solid(Color::rgb(0, 255, 0)),
        }];
        let image = rasterize(&commands, blank(100, 60));
        // t = 0.5 lands on (50, 30)
        assert_eq!(image.get_pixel(50, 30), &Rgba([0, 255, 0, 255]));
        assert_eq!(image.get_pixel(50, 55), &Rgba([0, 0, 0, 255]));
    }
}
