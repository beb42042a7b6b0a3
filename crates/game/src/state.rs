use crate::animation::Animator;
use crate::assets::AssetGate;
use crate::camera::Camera;
use crate::config::GameConfig;
use crate::geom::{Size, Vec2};
use crate::mask::{MaskError, MaskIndex, MaskSlot, Walkability};
use crate::motion::{self, HeldKeys};
use crate::proximity::ProximityTracker;
use deepsk_protocol::{Task, TaskId};

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub pos: Vec2,
    pub speed: f32,
    pub size: f32,
    pub anim: Animator,
    /// Task in interaction range as of the last update.
    pub near_task: Option<TaskId>,
}

impl Player {
    pub fn spawn(config: &GameConfig) -> Self {
        Self {
            pos: config.spawn,
            speed: config.player_speed,
            size: config.sprite_size,
            anim: Animator::new(config.sprite_frames, config.animation_threshold),
            near_task: None,
        }
    }
}

/// Everything one frame reads and writes. Owned by the host and handed to
/// [`crate::render::render_frame`] once per display refresh.
#[derive(Debug, Clone)]
pub struct GameState<W = MaskSlot> {
    pub config: GameConfig,
    pub player: Player,
    pub camera: Camera,
    pub assets: AssetGate,
    pub walkability: W,
    tasks: Vec<Task>,
    proximity: ProximityTracker,
}

impl GameState<MaskSlot> {
    /// New session whose walkability comes from a mask that is still loading.
    pub fn new(config: GameConfig) -> Self {
        Self::with_walkability(config, MaskSlot::pending())
    }

    /// Installs the decoded mask image using the configured darkness
    /// threshold.
    pub fn load_mask(&mut self, width: u32, height: u32, rgba: Vec<u8>) -> Result<(), MaskError> {
        let mask = MaskIndex::from_rgba(width, height, rgba, self.config.walkable_threshold)?;
        self.walkability.install(mask);
        Ok(())
    }
}

impl<W: Walkability> GameState<W> {
    pub fn with_walkability(config: GameConfig, walkability: W) -> Self {
        Self {
            player: Player::spawn(&config),
            camera: Camera::default(),
            assets: AssetGate::new(config.sprite_frames),
            proximity: ProximityTracker::new(config.interaction_radius, config.selection),
            walkability,
            tasks: Vec::new(),
            config,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Replaces the task list. Proximity is recomputed on the next update.
    pub fn set_tasks(&mut self, tasks: Vec<Task>) {
        tracing::debug!(count = tasks.len(), "tasks loaded");
        self.tasks = tasks;
        self.player.near_task = None;
    }

    pub fn near_task(&self) -> Option<&Task> {
        let id = self.player.near_task?;
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Manual "interact" trigger: the task the player may act on right now.
    pub fn interact(&self) -> Option<&Task> {
        let task = self.near_task();
        match task {
            Some(t) => tracing::info!(task_id = t.id, name = %t.name, "interact"),
            None => tracing::debug!("interact with nothing in range"),
        }
        task
    }

    pub fn is_ready(&self) -> bool {
        self.assets.is_ready()
    }

    /// One simulation tick: motion, proximity, animation, camera.
    ///
    /// Does nothing and returns false until the assets are ready.
    pub fn update(&mut self, keys: HeldKeys, viewport: Size) -> bool {
        let map = match self.assets.map_size() {
            Some(map) if self.assets.is_ready() => map,
            _ => return false,
        };

        motion::apply_input(
            &mut self.player.pos,
            self.player.speed,
            &self.walkability,
            keys,
        );
        self.player.near_task = self
            .proximity
            .nearest_task(self.player.pos, &self.tasks, map)
            .map(|t| t.id);
        self.player.anim.tick();
        self.camera = Camera::follow(self.player.pos, viewport, map);
        true
    }
}
