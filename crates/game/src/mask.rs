//! Walkability lookups.
//!
//! The stock implementation samples a mask image: dark pixels are ground the
//! player may stand on, everything else is blocked. Anything that answers
//! [`Walkability::is_walkable`] can replace it (a tile grid, polygons) without
//! touching motion code.

/// Answers whether the player anchor may stand on a map point.
pub trait Walkability {
    fn is_walkable(&self, x: f32, y: f32) -> bool;
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MaskError {
    #[error("mask has no pixels ({width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("mask buffer is {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("mask dimensions {width}x{height} overflow")]
    TooLarge { width: u32, height: u32 },
}

/// Decoded RGBA8 walkability mask.
#[derive(Debug, Clone)]
pub struct MaskIndex {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    threshold: u8,
}

impl MaskIndex {
    pub fn from_rgba(
        width: u32,
        height: u32,
        rgba: Vec<u8>,
        threshold: u8,
    ) -> Result<Self, MaskError> {
        if width == 0 || height == 0 {
            return Err(MaskError::Empty { width, height });
        }
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or(MaskError::TooLarge { width, height })?;
        if rgba.len() != expected {
            return Err(MaskError::BufferSize {
                width,
                height,
                expected,
                actual: rgba.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba,
            threshold,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl Walkability for MaskIndex {
    fn is_walkable(&self, x: f32, y: f32) -> bool {
        // Written so NaN lands in the rejecting branch.
        if !(x >= 0.0 && y >= 0.0 && x < self.width as f32 && y < self.height as f32) {
            return false;
        }
        // Truncate to the containing pixel; no filtering.
        let (px, py) = (x as usize, y as usize);
        let i = (py * self.width as usize + px) * 4;
        let Some(rgb) = self.rgba.get(i..i + 3) else {
            return false;
        };
        rgb.iter().all(|&c| c < self.threshold)
    }
}

/// Mask that may still be loading. Nothing is walkable until one is
/// installed, so the first frames after startup hold the player in place.
#[derive(Debug, Clone, Default)]
pub struct MaskSlot {
    mask: Option<MaskIndex>,
}

impl MaskSlot {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn install(&mut self, mask: MaskIndex) {
        tracing::debug!(width = mask.width(), height = mask.height(), "mask installed");
        self.mask = Some(mask);
    }

    pub fn is_loaded(&self) -> bool {
        self.mask.is_some()
    }

    pub fn get(&self) -> Option<&MaskIndex> {
        self.mask.as_ref()
    }
}

impl Walkability for MaskSlot {
    fn is_walkable(&self, x: f32, y: f32) -> bool {
        self.mask.as_ref().is_some_and(|m| m.is_walkable(x, y))
    }
}
