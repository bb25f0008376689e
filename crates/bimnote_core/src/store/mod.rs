//! Durable key-value backends and the per-project annotation store.
//!
//! # Responsibility
//! - Define the local-storage-class contract (`KvStore`) the store writes to.
//! - Keep backend details (SQLite, memory) out of the service layer.
//!
//! # Invariants
//! - `set_item` replaces the whole value for a key in one atomic write.
//! - Backends never interpret values; blobs are opaque strings here.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod annotation_store;
pub mod blob;
pub mod memory;
pub mod sqlite;

pub type StoreResult<T> = Result<T, StoreError>;

/// Backend failure while reading or writing a blob.
#[derive(Debug)]
pub enum StoreError {
    /// Backend cannot serve requests (closed, disabled, I/O failure).
    Unavailable(String),
    /// Value exceeds the configured per-key quota.
    QuotaExceeded {
        key: String,
        bytes: usize,
        limit: usize,
    },
    Db(DbError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "storage unavailable: {reason}"),
            Self::QuotaExceeded { key, bytes, limit } => write!(
                f,
                "storage quota exceeded for `{key}`: {bytes} bytes > {limit} bytes"
            ),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Unavailable(_) | Self::QuotaExceeded { .. } => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Synchronous string key-value storage.
pub trait KvStore {
    fn get_item(&self, key: &str) -> StoreResult<Option<String>>;
    fn set_item(&mut self, key: &str, value: &str) -> StoreResult<()>;
    /// Returns stored keys starting with `prefix`, sorted ascending.
    fn keys_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

fn check_quota(limit: Option<usize>, key: &str, value: &str) -> StoreResult<()> {
    match limit {
        Some(limit) if value.len() > limit => Err(StoreError::QuotaExceeded {
            key: key.to_string(),
            bytes: value.len(),
            limit,
        }),
        _ => Ok(()),
    }
}
