use serde::{Deserialize, Serialize};

pub type TaskId = i64;
pub type UserId = i64;

/// A location-bound task. `x`/`y` are percentages of the map image size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reward: Option<String>,
    pub x: f64,
    pub y: f64,
}

impl Task {
    /// Reward text written onto the coupon issued for this task.
    pub fn reward_text(&self) -> String {
        match &self.reward {
            Some(r) if !r.trim().is_empty() => r.clone(),
            _ => format!("{} exclusive coupon", self.name),
        }
    }
}

/// Task as found in import files. Older task lists place markers with
/// `lat`/`lng` on the overlay map, newer ones with `x`/`y` percentages.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskSource {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub reward: Option<String>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

impl TaskSource {
    /// Resolves to a percentage-placed [`Task`]. Percentages win when both
    /// coordinate pairs are present.
    pub fn resolve(self, bounds: &GeoBounds) -> Result<Task, TaskSchemaError> {
        let (x, y) = match (self.x, self.y, self.lat, self.lng) {
            (Some(x), Some(y), _, _) => (x, y),
            (_, _, Some(lat), Some(lng)) => bounds.to_percent(lat, lng),
            _ => return Err(TaskSchemaError::MissingCoordinates { id: self.id }),
        };
        // NaN fails the range check too.
        let on_map = |v: f64| (0.0..=100.0).contains(&v);
        if !on_map(x) || !on_map(y) {
            return Err(TaskSchemaError::OutOfRange { id: self.id, x, y });
        }
        Ok(Task {
            id: self.id,
            name: self.name,
            title: self.title,
            reward: self.reward,
            x,
            y,
        })
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TaskSchemaError {
    #[error("task {id}: needs either x/y or lat/lng")]
    MissingCoordinates { id: TaskId },
    #[error("task {id}: position ({x:.2}%, {y:.2}%) is outside the map")]
    OutOfRange { id: TaskId, x: f64, y: f64 },
}

/// Geographic rectangle covered by the map image (north-up).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    /// Area covered by the Shenkeng map.
    pub const SHENKENG: GeoBounds = GeoBounds {
        south: 24.995,
        west: 121.600,
        north: 25.010,
        east: 121.630,
    };

    pub fn to_percent(&self, lat: f64, lng: f64) -> (f64, f64) {
        let x = (lng - self.west) / (self.east - self.west) * 100.0;
        let y = (self.north - lat) / (self.north - self.south) * 100.0;
        (x, y)
    }
}

impl Default for GeoBounds {
    fn default() -> Self {
        Self::SHENKENG
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: i64,
    pub task_id: TaskId,
    pub task_name: String,
    pub reward: String,
    /// Issuance time, ms since the Unix epoch.
    pub time: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginOutput {
    pub user: User,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteInput {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteOutput {
    pub success: bool,
    pub coupon: Coupon,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CouponsQuery {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

pub mod routes {
    pub const HEALTH: &str = "/health";
    pub const LOGIN: &str = "/api/login";
    pub const TASKS: &str = "/api/tasks";
    pub const TASK_COMPLETE: &str = "/api/tasks/{id}/complete";
    pub const COUPONS: &str = "/api/coupons";

    pub fn task_complete(id: super::TaskId) -> String {
        format!("/api/tasks/{id}/complete")
    }
}

pub mod messages {
    pub const MISSING_USERNAME: &str = "Missing username";
    pub const TASK_NOT_FOUND: &str = "Task not found";
    pub const ALREADY_COMPLETED: &str = "Task already completed";
}
