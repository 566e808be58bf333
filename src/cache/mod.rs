//! In-process lookup cache for resolved entities.
//!
//! Keys are normalized search strings; values are catalog row ids. Every
//! cached key is registered under an owner region ("artist:42") so that a
//! merge can invalidate exactly the keys belonging to an absorbed entity.

use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    Artist,
    Release,
    Label,
}

impl CacheKind {
    fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Artist => "artist",
            CacheKind::Release => "release",
            CacheKind::Label => "label",
        }
    }
}

/// Owner region for a set of cached keys, e.g. `artist:42`.
pub fn region(kind: CacheKind, id: i64) -> String {
    format!("{}:{}", kind.as_str(), id)
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<(CacheKind, String), i64>,
    regions: HashMap<String, Vec<(CacheKind, String)>>,
}

/// Thread-safe entity lookup cache.
#[derive(Default)]
pub struct MetaCache {
    state: Mutex<CacheState>,
}

impl MetaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, kind: CacheKind, key: &str) -> Option<i64> {
        let state = self.state.lock().unwrap();
        state.entries.get(&(kind, key.to_string())).copied()
    }

    /// Cache a key under an owner region. Re-inserting the same key under a
    /// new owner replaces the old mapping.
    pub fn put(&self, kind: CacheKind, key: &str, id: i64, owner: &str) {
        let mut state = self.state.lock().unwrap();
        let entry_key = (kind, key.to_string());
        state.entries.insert(entry_key.clone(), id);
        state
            .regions
            .entry(owner.to_string())
            .or_default()
            .push(entry_key);
    }

    /// Drop every key registered under the given owner region.
    pub fn clear_region(&self, owner: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(keys) = state.regions.remove(owner) {
            debug!("Clearing cache region {} ({} keys)", owner, keys.len());
            for key in keys {
                state.entries.remove(&key);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
