use crate::geom::Vec2;
use crate::mask::Walkability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Order in which held directions are applied each tick.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub fn delta(self, speed: f32) -> (f32, f32) {
        match self {
            Direction::Up => (0.0, -speed),
            Direction::Down => (0.0, speed),
            Direction::Left => (-speed, 0.0),
            Direction::Right => (speed, 0.0),
        }
    }

    /// Maps DOM `KeyboardEvent.key` names.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowUp" => Some(Direction::Up),
            "ArrowDown" => Some(Direction::Down),
            "ArrowLeft" => Some(Direction::Left),
            "ArrowRight" => Some(Direction::Right),
            _ => None,
        }
    }

    fn bit(self) -> u8 {
        match self {
            Direction::Up => 1,
            Direction::Down => 2,
            Direction::Left => 4,
            Direction::Right => 8,
        }
    }
}

/// Directions currently held down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeldKeys {
    bits: u8,
}

impl HeldKeys {
    pub fn press(&mut self, dir: Direction) {
        self.bits |= dir.bit();
    }

    pub fn release(&mut self, dir: Direction) {
        self.bits &= !dir.bit();
    }

    pub fn is_held(&self, dir: Direction) -> bool {
        self.bits & dir.bit() != 0
    }

    /// Feeds a DOM key event; unknown keys are ignored.
    pub fn key_event(&mut self, key: &str, down: bool) {
        if let Some(dir) = Direction::from_key(key) {
            if down {
                self.press(dir);
            } else {
                self.release(dir);
            }
        }
    }

    pub fn held(&self) -> impl Iterator<Item = Direction> + '_ {
        Direction::ALL.into_iter().filter(|d| self.is_held(*d))
    }
}

impl FromIterator<Direction> for HeldKeys {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        let mut keys = HeldKeys::default();
        for d in iter {
            keys.press(d);
        }
        keys
    }
}

/// Moves `pos` by `(dx, dy)` iff the destination point is walkable.
///
/// Only the anchor point is tested: no sweep and no hitbox, so a large step
/// can cross a wall thinner than the step.
pub fn try_move<W: Walkability + ?Sized>(pos: &mut Vec2, walk: &W, dx: f32, dy: f32) -> bool {
    let nx = pos.x + dx;
    let ny = pos.y + dy;
    if !walk.is_walkable(nx, ny) {
        tracing::trace!(x = nx, y = ny, "move blocked");
        return false;
    }
    pos.x = nx;
    pos.y = ny;
    true
}

/// Applies each held direction as its own single-axis attempt, in
/// [`Direction::ALL`] order. Returns how many of them were committed.
pub fn apply_input<W: Walkability + ?Sized>(
    pos: &mut Vec2,
    speed: f32,
    walk: &W,
    keys: HeldKeys,
) -> usize {
    keys.held()
        .filter(|dir| {
            let (dx, dy) = dir.delta(speed);
            try_move(pos, walk, dx, dy)
        })
        .count()
}
