//! Client core of the DeepSK map game.
//!
//! Everything the browser loop does per frame lives here as plain data and
//! functions: the walkability mask, player motion, the sprite animation
//! cycle, the camera, task proximity and the draw pass. The host (a canvas
//! page, a native window, a test) owns decoding images and presenting pixels;
//! it feeds decoded buffers and key state in and receives draw calls through
//! [`render::Canvas`].

pub mod animation;
pub mod assets;
pub mod camera;
pub mod client;
pub mod completion;
pub mod config;
pub mod geom;
pub mod mask;
pub mod motion;
pub mod proximity;
pub mod render;
pub mod state;

pub use animation::Animator;
pub use assets::AssetGate;
pub use camera::Camera;
pub use client::{ApiError, HttpRewardClient, RewardApi};
pub use completion::CompletionGuard;
pub use config::GameConfig;
pub use geom::{Rect, Size, Vec2};
pub use mask::{MaskError, MaskIndex, MaskSlot, Walkability};
pub use motion::{Direction, HeldKeys};
pub use proximity::{ProximityTracker, SelectionPolicy};
pub use render::{render_frame, Canvas, DrawCommand, FrameOutcome, RecordingCanvas};
pub use state::{GameState, Player};
