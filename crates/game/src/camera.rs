use crate::geom::{clamp_span, Size, Vec2};

/// Top-left corner of the viewport in map pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Camera {
    pub x: f32,
    pub y: f32,
}

impl Camera {
    /// Centres on `target`, then keeps the viewport inside the map. On an axis
    /// where the map is smaller than the viewport the offset is 0.
    pub fn follow(target: Vec2, viewport: Size, map: Size) -> Self {
        Self {
            x: clamp_span(target.x - viewport.width / 2.0, map.width - viewport.width),
            y: clamp_span(target.y - viewport.height / 2.0, map.height - viewport.height),
        }
    }

    pub fn to_screen(&self, p: Vec2) -> Vec2 {
        Vec2::new(p.x - self.x, p.y - self.y)
    }
}
