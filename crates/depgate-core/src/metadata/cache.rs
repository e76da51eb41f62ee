//! Cache scope shared by every lookup of one resolve call.

use std::collections::HashMap;
use std::sync::Mutex;

use uuid::Uuid;

use super::PackageMetadata;

/// Per-call cache context.
///
/// Sources memoize their answers here so the same package is fetched at
/// most once per source within one resolve call, unless the context was
/// built with [`SourceCacheContext::without_cache`].
#[derive(Debug)]
pub struct SourceCacheContext {
    session_id: Uuid,
    no_cache: bool,
    entries: Mutex<HashMap<String, Option<PackageMetadata>>>,
}

impl SourceCacheContext {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            no_cache: false,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Context that bypasses the memo entirely.
    pub fn without_cache() -> Self {
        Self {
            no_cache: true,
            ..Self::new()
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn no_cache(&self) -> bool {
        self.no_cache
    }

    /// Memoized answer for `key`, if any. The inner `None` is a cached miss.
    pub fn get(&self, key: &str) -> Option<Option<PackageMetadata>> {
        if self.no_cache {
            return None;
        }
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    pub fn insert(&self, key: String, value: Option<PackageMetadata>) {
        if self.no_cache {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, value);
    }

    /// Memo key for a lookup of `identity` against the source named `source`.
    /// The name is used verbatim.
    pub fn key(source: &str, identity: &crate::types::PackageIdentity) -> String {
        format!(
            "{}|{}|{}",
            source,
            identity.id_key(),
            identity.normalized_version().unwrap_or_default()
        )
    }
}

impl Default for SourceCacheContext {
    fn default() -> Self {
        Self::new()
    }
}
