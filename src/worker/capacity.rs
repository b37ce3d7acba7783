//! Concurrency admission control.
//!
//! Tracks the ids of tasks this process is executing and caps how many may
//! run at once. The poll loop admits, executors release; both may race, so
//! check-and-insert happens under one lock.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Bounded set of active task ids.
#[derive(Debug)]
pub struct CapacityGate {
    limit: usize,
    active: Mutex<HashSet<String>>,
}

impl CapacityGate {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            active: Mutex::new(HashSet::new()),
        }
    }

    fn active(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set stays consistent even if a holder panicked; every critical
        // section is a single insert/remove/len.
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Admit `task_id` if there is room and it is not already running.
    ///
    /// Returns `false` without mutating anything otherwise.
    pub fn try_admit(&self, task_id: &str) -> bool {
        let mut active = self.active();
        if active.len() >= self.limit || active.contains(task_id) {
            return false;
        }
        active.insert(task_id.to_string())
    }

    /// Admit `task_id` and return a permit that releases it on drop.
    pub fn admit(self: &Arc<Self>, task_id: &str) -> Option<CapacityPermit> {
        self.try_admit(task_id).then(|| CapacityPermit {
            gate: Arc::clone(self),
            task_id: task_id.to_string(),
        })
    }

    /// Remove `task_id`. Releasing an absent id is a no-op.
    ///
    /// Returns whether the id was present.
    pub fn release(&self, task_id: &str) -> bool {
        self.active().remove(task_id)
    }

    /// Number of tasks currently executing.
    pub fn size(&self) -> usize {
        self.active().len()
    }

    /// How many more tasks may be admitted right now.
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.size())
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.active().contains(task_id)
    }

    /// Snapshot of the active ids.
    pub fn active_ids(&self) -> Vec<String> {
        self.active().iter().cloned().collect()
    }
}

/// Holds one slot in a [`CapacityGate`] for the lifetime of a task execution.
///
/// Dropping the permit releases the slot, including during unwinding.
#[derive(Debug)]
pub struct CapacityPermit {
    gate: Arc<CapacityGate>,
    task_id: String,
}

impl CapacityPermit {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }
}

impl Drop for CapacityPermit {
    fn drop(&mut self) {
        self.gate.release(&self.task_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_limit() {
        let gate = CapacityGate::new(2);
        assert!(gate.try_admit("a"));
        assert!(gate.try_admit("b"));
        assert!(!gate.try_admit("c"));
        assert_eq!(gate.size(), 2);
        assert_eq!(gate.remaining(), 0);
        assert!(!gate.contains("c"));
    }

    #[test]
    fn duplicate_id_not_admitted_twice() {
        let gate = CapacityGate::new(3);
        assert!(gate.try_admit("a"));
        assert!(!gate.try_admit("a"));
        assert_eq!(gate.size(), 1);
    }

    #[test]
    fn release_is_idempotent() {
        let gate = CapacityGate::new(1);
        assert!(!gate.release("missing"));
        assert!(gate.try_admit("a"));
        assert!(gate.release("a"));
        assert!(!gate.release("a"));
        assert_eq!(gate.size(), 0);
        assert!(gate.try_admit("b"));
    }

    #[test]
    fn permit_releases_on_drop() {
        let gate = Arc::new(CapacityGate::new(1));
        let permit = gate.admit("a").unwrap();
        assert_eq!(permit.task_id(), "a");
        assert!(gate.admit("b").is_none());

        drop(permit);
        assert_eq!(gate.size(), 0);
        assert!(gate.admit("b").is_some());
    }

    #[test]
    fn permit_releases_when_holder_panics() {
        let gate = Arc::new(CapacityGate::new(1));
        let permit = gate.admit("a").unwrap();

        let result = std::thread::spawn(move || {
            let _permit = permit;
            panic!("handler blew up");
        })
        .join();

        assert!(result.is_err());
        assert_eq!(gate.size(), 0);
    }

    #[test]
    fn concurrent_admits_never_exceed_limit() {
        let gate = Arc::new(CapacityGate::new(4));
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let gate = Arc::clone(&gate);
                std::thread::spawn(move || {
                    let id = format!("task-{i}");
                    let admitted = gate.try_admit(&id);
                    assert!(gate.size() <= gate.limit());
                    if admitted {
                        gate.release(&id);
                    }
                    admitted
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(gate.size(), 0);
    }
}
