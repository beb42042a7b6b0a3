use crate::geom::Vec2;
use crate::proximity::SelectionPolicy;
use serde::{Deserialize, Serialize};

/// Tunables for one game session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Player anchor at startup, in map pixels. Must sit on walkable ground.
    pub spawn: Vec2,
    /// Pixels moved per held direction per tick.
    pub player_speed: f32,
    /// Side of the square the sprite is drawn into.
    pub sprite_size: f32,
    /// Number of frames in the walk/idle cycle.
    pub sprite_frames: usize,
    /// The frame advances once the tick counter exceeds this value.
    pub animation_threshold: u32,
    /// Mask pixels with R, G and B all below this are walkable.
    pub walkable_threshold: u8,
    /// Tasks strictly closer than this (map pixels) can be interacted with.
    pub interaction_radius: f32,
    pub selection: SelectionPolicy,
    /// Markers are drawn while their screen position is within this many
    /// pixels of the viewport.
    pub marker_margin: f32,
    pub prompt: PromptStyle,
}

impl GameConfig {
    pub const DEFAULT_SPAWN: Vec2 = Vec2::new(820.0, 810.0);
    pub const DEFAULT_SPEED: f32 = 4.0;
    pub const DEFAULT_SPRITE_SIZE: f32 = 80.0;
    pub const DEFAULT_SPRITE_FRAMES: usize = 4;
    pub const DEFAULT_ANIMATION_THRESHOLD: u32 = 6;
    pub const DEFAULT_WALKABLE_THRESHOLD: u8 = 30;
    pub const DEFAULT_INTERACTION_RADIUS: f32 = 100.0;
    pub const DEFAULT_MARKER_MARGIN: f32 = 50.0;

    pub fn new() -> Self {
        Self {
            spawn: Self::DEFAULT_SPAWN,
            player_speed: Self::DEFAULT_SPEED,
            sprite_size: Self::DEFAULT_SPRITE_SIZE,
            sprite_frames: Self::DEFAULT_SPRITE_FRAMES,
            animation_threshold: Self::DEFAULT_ANIMATION_THRESHOLD,
            walkable_threshold: Self::DEFAULT_WALKABLE_THRESHOLD,
            interaction_radius: Self::DEFAULT_INTERACTION_RADIUS,
            selection: SelectionPolicy::default(),
            marker_margin: Self::DEFAULT_MARKER_MARGIN,
            prompt: PromptStyle::default(),
        }
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Geometry of the "interact" prompt box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptStyle {
    pub padding: f32,
    pub height: f32,
    /// Space between the sprite and the box.
    pub gap: f32,
}

impl Default for PromptStyle {
    fn default() -> Self {
        Self {
            padding: 10.0,
            height: 32.0,
            gap: 8.0,
        }
    }
}
