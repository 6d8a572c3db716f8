use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::clock::Clock;
use super::identity::MethodKey;
use super::timer::{DecayingTimer, TimerSnapshot};

/// Process-wide map of method key → timer.
///
/// Entries are created on first use and live as long as the registry. The
/// key space is the set of instrumented methods and route templates, which
/// is fixed at build time, so nothing is ever evicted.
pub struct TimerRegistry {
    clock: Arc<dyn Clock>,
    timers: RwLock<HashMap<MethodKey, Arc<DecayingTimer>>>,
}

impl TimerRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            timers: RwLock::new(HashMap::new()),
        }
    }

    /// Timer for `key`, created if this is the first observation.
    ///
    /// Concurrent first use is settled under the write lock, so every
    /// caller ends up holding the same instance.
    pub fn get_or_create(&self, key: &MethodKey) -> Arc<DecayingTimer> {
        if let Some(timer) = self.timers.read().get(key) {
            return timer.clone();
        }

        self.timers
            .write()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(DecayingTimer::new(self.clock.clone())))
            .clone()
    }

    pub fn get(&self, key: &MethodKey) -> Option<Arc<DecayingTimer>> {
        self.timers.read().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.timers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Every timer's snapshot, ordered by key.
    pub fn snapshot(&self) -> Vec<(MethodKey, TimerSnapshot)> {
        // Clone the handles first so the map lock is not held while each
        // timer takes its own lock.
        let timers: Vec<_> = self
            .timers
            .read()
            .iter()
            .map(|(key, timer)| (key.clone(), timer.clone()))
            .collect();

        let mut out: Vec<_> = timers
            .into_iter()
            .map(|(key, timer)| (key, timer.snapshot()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

impl std::fmt::Debug for TimerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerRegistry")
            .field("timers", &self.len())
            .finish()
    }
}
