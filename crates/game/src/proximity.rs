use crate::geom::{Size, Vec2};
use deepsk_protocol::Task;
use serde::{Deserialize, Serialize};

/// Which in-range task wins when several qualify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// First in-range task in list order, even if another is closer. This is
    /// the shipped behaviour; it may not be what product intended.
    #[default]
    FirstInList,
    /// Closest in-range task; ties go to the earlier one.
    Nearest,
}

/// Task position in map pixels.
pub fn task_pixel(task: &Task, map: Size) -> Vec2 {
    Vec2::new(
        (task.x / 100.0 * map.width as f64) as f32,
        (task.y / 100.0 * map.height as f64) as f32,
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProximityTracker {
    radius: f32,
    policy: SelectionPolicy,
}

impl ProximityTracker {
    pub fn new(radius: f32, policy: SelectionPolicy) -> Self {
        Self { radius, policy }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    /// The task the player can interact with, if any is strictly within the
    /// radius.
    pub fn nearest_task<'a>(&self, player: Vec2, tasks: &'a [Task], map: Size) -> Option<&'a Task> {
        let mut in_range = tasks.iter().filter_map(|t| {
            let d = player.distance(task_pixel(t, map));
            (d < self.radius).then_some((t, d))
        });
        match self.policy {
            SelectionPolicy::FirstInList => in_range.next().map(|(t, _)| t),
            SelectionPolicy::Nearest => in_range
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(t, _)| t),
        }
    }
}
