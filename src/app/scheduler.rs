use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Hands out one lock per transport id so command chains aimed at the same
/// device never interleave, even across concurrently running stages.
/// Fan-out across different devices is not limited.
pub struct TaskScheduler {
    device_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self {
            device_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn device_lock(&self, transport_id: &str) -> Arc<Mutex<()>> {
        let mut guard = match self.device_locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard
            .entry(transport_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops locks for devices no longer connected. Locks still held by a
    /// running chain are kept.
    pub fn retain_devices<'a>(&self, transport_ids: impl IntoIterator<Item = &'a str>) {
        let keep: HashSet<&str> = transport_ids.into_iter().collect();
        let mut guard = match self.device_locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.retain(|id, lock| keep.contains(id.as_str()) || Arc::strong_count(lock) > 1);
    }

    pub fn tracked_devices(&self) -> usize {
        match self.device_locks.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new()
    }
}
