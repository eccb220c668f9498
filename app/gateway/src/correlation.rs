//! Task correlation map: which client is waiting for which task.

use crate::rooms::ClientId;
use compact_str::CompactString;
use lru::LruCache;
use std::{collections::HashMap, num::NonZeroUsize};

/// Why a task id left the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retired {
    /// Its result was delivered.
    Delivered,
    /// Its client disconnected first.
    Abandoned,
}

/// Outcome of claiming a result's task id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claim {
    /// The client waiting for this task.
    Owner(ClientId),
    /// The task was already answered.
    Duplicate,
    /// The task's client disconnected.
    Stale,
    /// Never seen, or retired too long ago to tell.
    Unknown,
}

/// Live `task_id → client_id` entries plus a bounded memory of retired ids.
pub struct CorrelationMap {
    live: HashMap<CompactString, ClientId>,
    retired: LruCache<CompactString, Retired>,
}

impl CorrelationMap {
    /// Create an empty map remembering up to `retired_window` retired ids.
    pub fn new(retired_window: usize) -> Self {
        let window = NonZeroUsize::new(retired_window).unwrap_or(NonZeroUsize::MIN);
        Self {
            live: HashMap::new(),
            retired: LruCache::new(window),
        }
    }

    /// Track `task_id` for `client_id`. Returns `false` and leaves the map
    /// unchanged if the id is already live.
    pub fn insert(&mut self, task_id: CompactString, client_id: ClientId) -> bool {
        if self.live.contains_key(&task_id) {
            return false;
        }
        self.live.insert(task_id, client_id);
        true
    }

    /// Forget a live entry without retiring it, e.g. when enqueueing failed.
    pub fn remove(&mut self, task_id: &str) -> Option<ClientId> {
        self.live.remove(task_id)
    }

    /// Pop the entry for an arriving result.
    pub fn claim(&mut self, task_id: &str) -> Claim {
        if let Some((task_id, client)) = self.live.remove_entry(task_id) {
            self.retired.put(task_id, Retired::Delivered);
            return Claim::Owner(client);
        }
        match self.retired.get(task_id) {
            Some(Retired::Delivered) => Claim::Duplicate,
            Some(Retired::Abandoned) => Claim::Stale,
            None => Claim::Unknown,
        }
    }

    /// Drop every entry owned by `client_id`. Returns how many were dropped.
    pub fn purge_client(&mut self, client_id: &str) -> usize {
        let abandoned: Vec<_> = self
            .live
            .iter()
            .filter(|(_, owner)| owner.as_str() == client_id)
            .map(|(task_id, _)| task_id.clone())
            .collect();
        for task_id in &abandoned {
            self.live.remove(task_id);
            self.retired.put(task_id.clone(), Retired::Abandoned);
        }
        abandoned.len()
    }

    /// Whether `task_id` is awaiting a result.
    pub fn contains(&self, task_id: &str) -> bool {
        self.live.contains_key(task_id)
    }

    /// Number of tasks awaiting a result.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
