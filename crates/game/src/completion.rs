use crate::client::{ApiError, RewardApi};
use deepsk_protocol::{Coupon, TaskId};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Refuses a second completion request for a task while the first is still
/// pending. Clones share the same in-flight set.
#[derive(Debug, Clone, Default)]
pub struct CompletionGuard {
    in_flight: Arc<Mutex<HashSet<TaskId>>>,
}

/// Marks a task in flight; the mark goes away when this is dropped, including
/// when the request future is cancelled.
struct Claim {
    set: Arc<Mutex<HashSet<TaskId>>>,
    task_id: TaskId,
}

impl Drop for Claim {
    fn drop(&mut self) {
        lock(&self.set).remove(&self.task_id);
    }
}

fn lock(set: &Mutex<HashSet<TaskId>>) -> MutexGuard<'_, HashSet<TaskId>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl CompletionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self, task_id: TaskId) -> bool {
        lock(&self.in_flight).contains(&task_id)
    }

    fn claim(&self, task_id: TaskId) -> Option<Claim> {
        lock(&self.in_flight).insert(task_id).then(|| Claim {
            set: Arc::clone(&self.in_flight),
            task_id,
        })
    }

    /// Submits the completion unless one for the same task is pending.
    pub async fn complete<A>(
        &self,
        api: &A,
        task_id: TaskId,
        username: &str,
    ) -> Result<Coupon, ApiError>
    where
        A: RewardApi + ?Sized,
    {
        let Some(_claim) = self.claim(task_id) else {
            tracing::debug!(task_id, "completion already in flight");
            return Err(ApiError::InFlight(task_id));
        };
        match api.complete_task(task_id, username).await {
            Ok(coupon) => {
                tracing::info!(task_id, coupon_id = coupon.id, "task completed");
                Ok(coupon)
            }
            Err(e) => {
                tracing::warn!(task_id, error = %e, "task completion failed");
                Err(e)
            }
        }
    }
}
