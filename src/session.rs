use crate::models::TeamStub;
use crate::urls;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Stubs captured from rankings pages, keyed by normalized team URL.
///
/// Cloning shares the same underlying map. Lives for one run.
#[derive(Debug, Clone, Default)]
pub struct StubStore {
    inner: Arc<RwLock<HashMap<String, TeamStub>>>,
}

impl StubStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a stub; an existing stub for the same URL is kept.
    /// Returns whether the stub was added.
    pub fn insert(&self, stub: TeamStub) -> bool {
        let key = urls::normalize(&stub.team_url);
        let mut map = self.inner.write().unwrap_or_else(|e| e.into_inner());

        if map.contains_key(&key) {
            return false;
        }
        map.insert(key, stub);
        true
    }

    pub fn get(&self, team_url: &str) -> Option<TeamStub> {
        let map = self.inner.read().unwrap_or_else(|e| e.into_inner());
        map.get(&urls::normalize(team_url)).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
