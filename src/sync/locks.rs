//! Advisory per-project serialization of remote-tree mutation.
//!
//! The storage provider happily creates two same-named siblings, so every
//! code path that can mutate a project's remote tree must hold that
//! project's lock. Read-only traversal does not lock. Guards are owned and
//! release on drop, covering every exit path including errors.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Clone, Default)]
pub struct ProjectLocks {
    inner: Arc<StdMutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one project, waiting behind any in-flight
    /// synchronization or mutating path resolution for it.
    pub async fn acquire(&self, project_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().expect("project lock registry poisoned");
            // An entry nobody holds or waits on has one strong reference,
            // the map's own. Dropping those keeps the registry bounded by
            // the number of in-flight projects.
            map.retain(|_, lock| Arc::strong_count(lock) > 1);
            map.entry(project_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::ProjectLocks;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn same_project_is_mutually_exclusive() {
        let locks = ProjectLocks::new();
        let running = Arc::new(AtomicUsize::new(0));
        let mut tasks = Vec::new();
        for _ in 0..8 {
            let locks = locks.clone();
            let running = running.clone();
            tasks.push(tokio::spawn(async move {
                let _guard = locks.acquire("prj-1").await;
                assert_eq!(running.fetch_add(1, Ordering::SeqCst), 0);
                tokio::task::yield_now().await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
    }

    #[tokio::test]
    async fn released_locks_are_evicted_from_the_registry() {
        let locks = ProjectLocks::new();
        drop(locks.acquire("prj-1").await);

        let _held = locks.acquire("prj-2").await;
        let map = locks.inner.lock().unwrap();
        assert!(!map.contains_key("prj-1"));
        assert!(map.contains_key("prj-2"));
    }

    #[tokio::test]
    async fn distinct_projects_do_not_contend() {
        let locks = ProjectLocks::new();
        let _a = locks.acquire("prj-1").await;
        // Completes immediately even though prj-1 is held.
        let _b = locks.acquire("prj-2").await;
    }
}
