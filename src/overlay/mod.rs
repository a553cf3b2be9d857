mod primitives;
#[cfg(feature = "raster")]
mod raster;
mod renderer;
mod transform;

pub use primitives::{quad_point, Brush, Color, DrawCommand};
#[cfg(feature = "raster")]
pub use raster::rasterize;
pub use renderer::{PoseRenderer, Side, FACE_EDGES, GLOW_ALPHA_FACTOR, LIMBS, TORSO_EDGES};
pub use transform::CoordinateTransform;
