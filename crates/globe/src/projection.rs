//! Capabilities the engine consumes from the projection library.

use foundation::math::{Rotation, Vec2};

use crate::style::ProjectionStyle;

/// A geographic-to-screen mapping. The math lives outside this crate.
pub trait Projection {
    /// Screen position of `(longitude, latitude)` in degrees.
    fn project(&self, longitude: f64, latitude: f64) -> Vec2;

    /// Geographic position under a screen point, if the point is on the map.
    fn invert(&self, point: Vec2) -> Option<[f64; 2]>;

    fn rotate(&mut self, rotation: Rotation);

    fn scale(&mut self, value: f64);

    fn translate(&mut self, point: Vec2);

    /// Only conic projections have standard parallels.
    fn parallels(&mut self, _parallels: [f64; 2]) {}
}

/// Creates projections for styles. `None` means the style cannot be drawn
/// by this host, which the engine treats like an unknown style.
pub trait ProjectionSource {
    fn create(&self, style: &ProjectionStyle) -> Option<Box<dyn Projection>>;
}

/// Pixel size of the map surface.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }

    /// Square viewport, the shape a globe map is laid out in.
    pub fn square(width: f64) -> Self {
        Self::new(width, width)
    }

    /// Centre in whole pixels.
    pub fn center(&self) -> Vec2 {
        Vec2::new((self.width / 2.0).floor(), (self.height / 2.0).floor())
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::square(960.0)
    }
}

/// Applies the scale, centring and parallels a style asks for at this
/// viewport size.
pub fn prepare(projection: &mut dyn Projection, style: &ProjectionStyle, viewport: Viewport) {
    projection.scale(style.default_scale(viewport.width));
    projection.translate(viewport.center());
    if let Some(parallels) = style.parallels {
        projection.parallels(parallels);
    }
}
