use crate::geom::Size;

/// Tracks the images the frame loop cannot run without: the map (whose
/// natural size becomes the world size) and every sprite frame. The mask is
/// not gated here; see [`crate::mask::MaskSlot`].
#[derive(Debug, Clone, PartialEq)]
pub struct AssetGate {
    map: Option<Size>,
    sprites: Vec<bool>,
}

impl AssetGate {
    pub fn new(sprite_frames: usize) -> Self {
        Self {
            map: None,
            sprites: vec![false; sprite_frames],
        }
    }

    pub fn map_loaded(&mut self, size: Size) {
        self.map = Some(size);
        self.log_if_ready();
    }

    pub fn sprite_loaded(&mut self, frame: usize) {
        match self.sprites.get_mut(frame) {
            Some(slot) => *slot = true,
            None => tracing::warn!(frame, frames = self.sprites.len(), "unknown sprite frame"),
        }
        self.log_if_ready();
    }

    pub fn map_size(&self) -> Option<Size> {
        self.map
    }

    pub fn is_ready(&self) -> bool {
        self.map.is_some() && self.sprites.iter().all(|&loaded| loaded)
    }

    fn log_if_ready(&self) {
        if self.is_ready() {
            tracing::debug!(map = ?self.map, "assets ready");
        }
    }
}
