use std::collections::HashMap;
use std::future::Future;

use tokio::sync::Mutex;

use crate::types::Result;

/// Memoized zone lookup owned by one provider instance
///
/// The lock is held across the lookup so concurrent `present`/`clean_up`
/// calls resolve each key once. Failed lookups are not cached.
#[derive(Debug)]
pub struct ZoneCache<V> {
    entries: Mutex<HashMap<String, V>>,
}

impl<V> Default for ZoneCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V: Clone + Send> ZoneCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_try_insert_with<F, Fut>(&self, key: &str, lookup: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        let mut entries = self.entries.lock().await;
        if let Some(value) = entries.get(key) {
            return Ok(value.clone());
        }

        let value = lookup().await?;
        entries.insert(key.to_string(), value.clone());
        Ok(value)
    }

    pub async fn invalidate(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
