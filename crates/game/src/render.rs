//! Frame loop and draw pass.

use crate::config::PromptStyle;
use crate::geom::{clamp_span, Rect, Size, Vec2};
use crate::mask::Walkability;
use crate::motion::HeldKeys;
use crate::proximity::task_pixel;
use crate::state::GameState;
use deepsk_protocol::{Task, TaskId};

/// Drawing surface, in screen pixels with the origin at the viewport's top
/// left.
pub trait Canvas {
    fn viewport(&self) -> Size;
    /// Width of `text` in the prompt font.
    fn measure_text(&self, text: &str) -> f32;
    fn clear(&mut self);
    /// Draws the map image with its top-left corner at `origin`.
    fn draw_map(&mut self, origin: Vec2);
    fn draw_marker(&mut self, at: Vec2, task: &Task);
    fn draw_prompt(&mut self, rect: Rect, text: &str);
    fn draw_sprite(&mut self, frame: usize, rect: Rect);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Assets still loading; nothing was updated or drawn.
    Waiting,
    Drawn,
}

/// Runs one frame: update the simulation from `keys`, then draw map,
/// markers, the interaction prompt and the player sprite.
pub fn render_frame<W, C>(state: &mut GameState<W>, keys: HeldKeys, canvas: &mut C) -> FrameOutcome
where
    W: Walkability,
    C: Canvas + ?Sized,
{
    if !state.update(keys, canvas.viewport()) {
        return FrameOutcome::Waiting;
    }
    draw_scene(state, canvas);
    FrameOutcome::Drawn
}

pub fn draw_scene<W, C>(state: &GameState<W>, canvas: &mut C)
where
    W: Walkability,
    C: Canvas + ?Sized,
{
    let Some(map) = state.assets.map_size() else {
        return;
    };
    let viewport = canvas.viewport();
    let cam = state.camera;

    canvas.clear();
    canvas.draw_map(Vec2::new(-cam.x, -cam.y));

    for task in state.tasks() {
        let at = cam.to_screen(task_pixel(task, map));
        if marker_visible(at, viewport, state.config.marker_margin) {
            canvas.draw_marker(at, task);
        }
    }

    let player = cam.to_screen(state.player.pos);
    if let Some(task) = state.near_task() {
        let text = prompt_text(task);
        let rect = layout_prompt(
            player,
            state.player.size,
            canvas.measure_text(&text),
            viewport,
            &state.config.prompt,
        );
        canvas.draw_prompt(rect, &text);
    }

    canvas.draw_sprite(
        state.player.anim.frame(),
        Rect::centered(player, state.player.size),
    );
}

pub fn marker_visible(at: Vec2, viewport: Size, margin: f32) -> bool {
    at.x >= -margin
        && at.y >= -margin
        && at.x <= viewport.width + margin
        && at.y <= viewport.height + margin
}

pub fn prompt_text(task: &Task) -> String {
    match &task.title {
        Some(title) => format!("[E] {} · {}", task.name, title),
        None => format!("[E] {}", task.name),
    }
}

/// Places the prompt box centred above the sprite, below it when there is
/// no room at the top, and always inside the viewport.
pub fn layout_prompt(
    player: Vec2,
    sprite_size: f32,
    text_width: f32,
    viewport: Size,
    style: &PromptStyle,
) -> Rect {
    let w = text_width + style.padding * 2.0;
    let h = style.height;
    let half = sprite_size / 2.0;

    let x = player.x - w / 2.0;
    let mut y = player.y - half - style.gap - h;
    if y < 0.0 {
        y = player.y + half + style.gap;
    }

    Rect::new(
        clamp_span(x, viewport.width - w),
        clamp_span(y, viewport.height - h),
        w,
        h,
    )
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear,
    Map { origin: Vec2 },
    Marker { task: TaskId, at: Vec2 },
    Prompt { rect: Rect, text: String },
    Sprite { frame: usize, rect: Rect },
}

/// Canvas that records draw calls instead of rasterising them. Text is
/// measured as a fixed width per character.
#[derive(Debug, Clone)]
pub struct RecordingCanvas {
    viewport: Size,
    char_width: f32,
    commands: Vec<DrawCommand>,
}

impl RecordingCanvas {
    pub fn new(viewport: Size) -> Self {
        Self {
            viewport,
            char_width: 8.0,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }
}

impl Canvas for RecordingCanvas {
    fn viewport(&self) -> Size {
        self.viewport
    }

    fn measure_text(&self, text: &str) -> f32 {
        text.chars().count() as f32 * self.char_width
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.commands.push(DrawCommand::Clear);
    }

    fn draw_map(&mut self, origin: Vec2) {
        self.commands.push(DrawCommand::Map { origin });
    }

    fn draw_marker(&mut self, at: Vec2, task: &Task) {
        self.commands.push(DrawCommand::Marker { task: task.id, at });
    }

    fn draw_prompt(&mut self, rect: Rect, text: &str) {
        self.commands.push(DrawCommand::Prompt {
            rect,
            text: text.to_string(),
        });
    }

    fn draw_sprite(&mut self, frame: usize, rect: Rect) {
        self.commands.push(DrawCommand::Sprite { frame, rect });
    }
}
