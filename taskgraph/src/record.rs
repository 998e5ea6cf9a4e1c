//! The `Record` trait every stored type must implement.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::filter::IndexValue;

/// Current time in milliseconds since the Unix epoch.
///
/// Centralised so that every domain type timestamps consistently and so
/// tests can reason about ordering without depending on wall-clock jitter.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A type that can be stored in a [`crate::Store`].
///
/// Implementors supply their own unique id and a small set of indexed
/// fields (`index_fields`) the SQLite secondary index uses for filtered
/// queries (`Store::list` with a `Filter`). Everything else about the
/// record is opaque to the store - it round-trips through `serde_json`.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Name of the collection this record type lives in, e.g. "tasks".
    fn collection() -> &'static str;

    /// Unique identifier within the collection.
    fn id(&self) -> &str;

    /// Named, indexed fields for filtered queries.
    ///
    /// Returning an empty vec is valid; such records can only be fetched by
    /// id or listed in full.
    fn index_fields(&self) -> Vec<(&'static str, IndexValue)> {
        Vec::new()
    }
}
