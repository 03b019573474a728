//! Activity store: ID allocation and the activity map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::activity::{Activity, ActivityMessage};
use crate::error::{ActivityError, Result};
use crate::timestamp::{Clock, Timestamp};

/// Mapping from activity ID to its record.
///
/// IDs start at 1 and are never recycled. The counter is a `u64`; once it
/// reaches `u64::MAX` allocation fails with [`ActivityError::IdsExhausted`]
/// instead of wrapping around.
pub(crate) struct ActivityStore {
    next_id: AtomicU64,
    activities: Mutex<HashMap<u64, Activity>>,
    clock: Arc<dyn Clock>,
}

impl ActivityStore {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            activities: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn next_id(&self) -> Result<u64> {
        self.next_id
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |id| id.checked_add(1))
            .map_err(|_| ActivityError::IdsExhausted)
    }

    fn activities(&self) -> MutexGuard<'_, HashMap<u64, Activity>> {
        self.activities
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn create(&self, message: ActivityMessage) -> Result<u64> {
        let id = self.next_id()?;
        self.activities().insert(id, Activity::new(id, message));
        trace!(activity_id = id, "activity created");
        Ok(id)
    }

    pub(crate) fn get(&self, id: u64) -> Result<Activity> {
        self.activities()
            .get(&id)
            .cloned()
            .ok_or(ActivityError::NotFound(id))
    }

    pub(crate) fn mark(&self, id: u64) -> Result<Timestamp> {
        self.mark_with(id, |_, timestamp| timestamp)
    }

    /// Mark and return a copy of the record, under a single lock.
    pub(crate) fn mark_snapshot(&self, id: u64) -> Result<Activity> {
        self.mark_with(id, |activity, _| activity.clone())
    }

    fn mark_with<R>(&self, id: u64, f: impl FnOnce(&Activity, Timestamp) -> R) -> Result<R> {
        let mut activities = self.activities();
        let activity = activities.get_mut(&id).ok_or(ActivityError::NotFound(id))?;
        let timestamp = self.clock.now();
        activity.push(timestamp);
        trace!(activity_id = id, timestamp = timestamp.as_millis(), "activity marked");
        Ok(f(activity, timestamp))
    }

    pub(crate) fn destroy(&self, id: u64) -> Result<Activity> {
        let activity = self
            .activities()
            .remove(&id)
            .ok_or(ActivityError::NotFound(id))?;
        trace!(activity_id = id, "activity destroyed");
        Ok(activity)
    }

    pub(crate) fn len(&self) -> usize {
        self.activities().len()
    }

    pub(crate) fn active_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.activities().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    #[cfg(test)]
    pub(crate) fn set_next_id(&self, id: u64) {
        self.next_id.store(id, Ordering::Relaxed);
    }
}
