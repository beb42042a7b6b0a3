/// Sprite frame cycle.
///
/// The canonical cycle is ping-pong: with four frames the sequence is
/// `0 1 2 3 2 1 0 1 ...`, one step each time the tick counter passes the
/// threshold. It keeps running while the player stands still.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Animator {
    frame: usize,
    forward: bool,
    timer: u32,
    frame_count: usize,
    threshold: u32,
}

impl Animator {
    pub fn new(frame_count: usize, threshold: u32) -> Self {
        Self {
            frame: 0,
            forward: true,
            timer: 0,
            frame_count: frame_count.max(1),
            threshold,
        }
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// +1 while climbing towards the last frame, -1 on the way back.
    pub fn direction(&self) -> i8 {
        if self.forward {
            1
        } else {
            -1
        }
    }

    /// Advances one tick. Returns true when the frame changed.
    pub fn tick(&mut self) -> bool {
        self.timer += 1;
        if self.timer <= self.threshold {
            return false;
        }
        self.timer = 0;

        let last = self.frame_count - 1;
        if last == 0 {
            return false;
        }
        if self.forward {
            self.frame += 1;
            if self.frame == last {
                self.forward = false;
            }
        } else {
            self.frame -= 1;
            if self.frame == 0 {
                self.forward = true;
            }
        }
        true
    }
}
