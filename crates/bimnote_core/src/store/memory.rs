//! Process-local key-value backend.
//!
//! Used for ephemeral sessions and tests. Counts successful writes so callers
//! can observe whether a persist happened.

use super::{check_quota, KvStore, StoreError, StoreResult};
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
pub struct MemoryKvStore {
    items: BTreeMap<String, String>,
    max_value_bytes: Option<usize>,
    write_count: u64,
    unavailable: bool,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects values longer than `limit` bytes with `QuotaExceeded`.
    pub fn with_quota(mut self, limit: usize) -> Self {
        self.max_value_bytes = Some(limit);
        self
    }

    /// Toggles a simulated outage; every call fails with `Unavailable`.
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Number of successful `set_item` calls.
    pub fn write_count(&self) -> u64 {
        self.write_count
    }

    fn ensure_available(&self) -> StoreResult<()> {
        if self.unavailable {
            return Err(StoreError::Unavailable(
                "memory backend disabled".to_string(),
            ));
        }
        Ok(())
    }
}

impl KvStore for MemoryKvStore {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        self.ensure_available()?;
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> StoreResult<()> {
        self.ensure_available()?;
        check_quota(self.max_value_bytes, key, value)?;
        self.items.insert(key.to_string(), value.to_string());
        self.write_count += 1;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        self.ensure_available()?;
        Ok(self
            .items
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}
