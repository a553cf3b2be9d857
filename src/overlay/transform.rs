use crate::frame::{ImageSourceInfo, Size};
use crate::pose::Point;

/// Maps source-image pixels onto the overlay surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransform {
    scale_x: f32,
    scale_y: f32,
    display_width: f32,
    mirrored: bool,
}

impl CoordinateTransform {
    pub fn new(source: ImageSourceInfo, display: Size) -> Self {
        Self {
            scale_x: display.width / source.width as f32,
            scale_y: display.height / source.height as f32,
            display_width: display.width,
            mirrored: source.mirrored,
        }
    }

    pub fn translate_x(&self, x: f32) -> f32 {
        let scaled = x * self.scale_x;
        if self.mirrored {
            self.display_width - scaled
        } else {
            scaled
        }
    }

    pub fn translate_y(&self, y: f32) -> f32 {
        y * self.scale_y
    }

    pub fn map(&self, point: Point) -> Point {
        Point::new(self.translate_x(point.x), self.translate_y(point.y))
    }

    pub fn is_mirrored(&self) -> bool {
        self.mirrored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(width: u32, height: u32, mirrored: bool) -> ImageSourceInfo {
        ImageSourceInfo::new(width, height, mirrored).unwrap()
    }

    #[test]
    fn test_identity_transform() {
        let transform = CoordinateTransform::new(source(640, 480, false), Size::new(640.0, 480.0));
        for point in [Point::new(0.0, 0.0), Point::new(123.5, 77.25), Point::new(640.0, 480.0)] {
            assert_eq!(transform.map(point), point);
        }
    }

    #[test]
    fn test_scaling_per_axis() {
        let transform = CoordinateTransform::new(source(320, 240, false), Size::new(640.0, 960.0));
        assert_eq!(transform.map(Point::new(10.0, 10.0)), Point::new(20.0, 40.0));
    }

    #[test]
    fn test_mirror_flips_only_x() {
        let display = Size::new(720.0, 960.0);
        let plain = CoordinateTransform::new(source(480, 640, false), display);
        let mirrored = CoordinateTransform::new(source(480, 640, true), display);

        for point in [Point::new(0.0, 0.0), Point::new(100.0, 200.0), Point::new(480.0, 640.0)] {
            let a = plain.map(point);
            let b = mirrored.map(point);
            assert_eq!(a.y, b.y);
            assert!((b.x - (display.width - a.x)).abs() < 1e-3);
        }
    }
}
