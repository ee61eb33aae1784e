use crate::graph::{Bounds, Vec2};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomConfig {
    pub min_scale: f32,
    pub max_scale: f32,
    pub zoom_factor: f32,
    /// Minimum scale used when focusing a single node.
    pub focus_scale: f32,
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.1,
            max_scale: 8.0,
            zoom_factor: 1.5,
            focus_scale: 1.5,
        }
    }
}

/// Pan and zoom: `screen = world * k + (x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub k: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            k: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Viewport {
    width: f32,
    height: f32,
    transform: Transform,
    zoom: ZoomConfig,
}

impl Viewport {
    pub fn new(width: f32, height: f32, zoom: ZoomConfig) -> Self {
        Self {
            width,
            height,
            transform: Transform::default(),
            zoom,
        }
    }

    /// Centre of the viewport in world coordinates at the identity transform.
    /// This is where new nodes spawn and what the centering force pulls toward.
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }

    pub fn zoom_percent(&self) -> u32 {
        (self.transform.k * 100.0).round() as u32
    }

    pub fn to_screen(&self, world: Vec2) -> Vec2 {
        Vec2::new(
            world.x * self.transform.k + self.transform.x,
            world.y * self.transform.k + self.transform.y,
        )
    }

    pub fn to_world(&self, screen: Vec2) -> Vec2 {
        Vec2::new(
            (screen.x - self.transform.x) / self.transform.k,
            (screen.y - self.transform.y) / self.transform.k,
        )
    }

    fn clamp_scale(&self, k: f32) -> f32 {
        k.clamp(self.zoom.min_scale, self.zoom.max_scale)
    }

    /// Scale by `factor` keeping the world point under the viewport centre fixed.
    pub fn zoom_by(&mut self, factor: f32) {
        let anchor = self.center();
        let world = self.to_world(anchor);
        let k = self.clamp_scale(self.transform.k * factor);
        self.transform = Transform {
            x: anchor.x - world.x * k,
            y: anchor.y - world.y * k,
            k,
        };
    }

    pub fn zoom_in(&mut self) {
        self.zoom_by(self.zoom.zoom_factor);
    }

    pub fn zoom_out(&mut self) {
        self.zoom_by(1.0 / self.zoom.zoom_factor);
    }

    pub fn reset(&mut self) {
        self.transform = Transform::default();
    }

    /// Scale 1, bounding-box centre moved to the viewport centre.
    pub fn center_on(&mut self, bounds: Bounds) {
        let mid = bounds.center();
        self.transform = Transform {
            x: self.width / 2.0 - mid.x,
            y: self.height / 2.0 - mid.y,
            k: 1.0,
        };
    }

    /// Centre a single point, zooming in to at least the focus scale.
    pub fn focus(&mut self, point: Vec2) {
        let k = self.clamp_scale(self.zoom.focus_scale.max(self.transform.k));
        self.transform = Transform {
            x: self.width / 2.0 - point.x * k,
            y: self.height / 2.0 - point.y * k,
            k,
        };
    }
}
