use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-lead mutual exclusion. Concurrent webhook deliveries for the same
/// lead (duplicates included) serialize around read-history → classify →
/// write-turn; different leads proceed in parallel.
#[derive(Default)]
pub struct LeadLocks {
    inner: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LeadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            Arc::clone(map.entry(key.to_owned()).or_insert_with(|| Arc::new(Mutex::new(()))))
        };
        lock.lock_owned().await
    }
}
