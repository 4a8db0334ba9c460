use alloy::primitives::B256;
use lru::LruCache;
use std::num::NonZeroUsize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    Seen,
    Simulating,
    Submitting,
    Done,
    Dropped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropKind {
    /// May be re-attacked if the feed delivers the hash again.
    Transient,
    /// Never touched again for the lifetime of the entry.
    Terminal,
}

#[derive(Debug, Clone)]
pub struct TargetLifecycle {
    pub state: TargetState,
    pub first_seen_ms: u64,
    pub last_update_ms: u64,
    pub drop_reason: Option<String>,
    pub drop_kind: Option<DropKind>,
    pub bundle_id: Option<String>,
}

impl TargetLifecycle {
    fn new(now_ms: u64) -> Self {
        Self {
            state: TargetState::Seen,
            first_seen_ms: now_ms,
            last_update_ms: now_ms,
            drop_reason: None,
            drop_kind: None,
            bundle_id: None,
        }
    }
}

/// Lifecycle ledger for attack targets, keyed by the target tx hash.
/// Keeps the engine from re-attacking a hash the feed re-delivers and
/// remembers why a target was abandoned.
pub struct TargetStore {
    entries: LruCache<B256, TargetLifecycle>,
    ttl_ms: u64,
}

impl TargetStore {
    pub fn new(capacity: usize, ttl_ms: u64) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            entries: LruCache::new(capacity),
            ttl_ms,
        }
    }

    /// Registers a sighting. Returns false when the target must not be
    /// processed (terminal drop, done, or already in flight).
    pub fn track_seen(&mut self, hash: B256, now_ms: u64) -> bool {
        if let Some(entry) = self.entries.get_mut(&hash) {
            match entry.state {
                TargetState::Done => return false,
                TargetState::Simulating | TargetState::Submitting => return false,
                TargetState::Dropped => {
                    if entry.drop_kind == Some(DropKind::Terminal) {
                        return false;
                    }
                    *entry = TargetLifecycle::new(now_ms);
                    return true;
                }
                TargetState::Seen => {
                    entry.last_update_ms = now_ms;
                    return true;
                }
            }
        }
        self.entries.put(hash, TargetLifecycle::new(now_ms));
        true
    }

    pub fn set_state(&mut self, hash: B256, state: TargetState, now_ms: u64) {
        if let Some(entry) = self.entries.get_mut(&hash) {
            if entry.state == TargetState::Dropped {
                return;
            }
            entry.state = state;
            entry.last_update_ms = now_ms;
        }
    }

    pub fn drop_transient(&mut self, hash: B256, reason: impl Into<String>, now_ms: u64) {
        self.drop_with_kind(hash, reason, DropKind::Transient, now_ms);
    }

    pub fn drop_terminal(&mut self, hash: B256, reason: impl Into<String>, now_ms: u64) {
        self.drop_with_kind(hash, reason, DropKind::Terminal, now_ms);
    }

    pub fn mark_done(&mut self, hash: B256, bundle_id: Option<String>, now_ms: u64) {
        if let Some(entry) = self.entries.get_mut(&hash) {
            entry.state = TargetState::Done;
            entry.bundle_id = bundle_id;
            entry.last_update_ms = now_ms;
        }
    }

    pub fn is_terminal(&mut self, hash: B256) -> bool {
        self.entries
            .get(&hash)
            .map(|entry| {
                entry.state == TargetState::Done
                    || (entry.state == TargetState::Dropped
                        && entry.drop_kind == Some(DropKind::Terminal))
            })
            .unwrap_or(false)
    }

    pub fn prune(&mut self, now_ms: u64) {
        if self.ttl_ms == 0 {
            return;
        }
        let mut expired = Vec::new();
        for (hash, entry) in self.entries.iter() {
            if now_ms.saturating_sub(entry.last_update_ms) > self.ttl_ms {
                expired.push(*hash);
            }
        }
        for hash in expired {
            self.entries.pop(&hash);
        }
    }

    fn drop_with_kind(
        &mut self,
        hash: B256,
        reason: impl Into<String>,
        kind: DropKind,
        now_ms: u64,
    ) {
        if let Some(entry) = self.entries.get_mut(&hash) {
            entry.state = TargetState::Dropped;
            entry.drop_reason = Some(reason.into());
            entry.drop_kind = Some(kind);
            entry.last_update_ms = now_ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::b256;

    fn hash() -> B256 {
        b256!("0x0101010101010101010101010101010101010101010101010101010101010101")
    }

    #[test]
    fn target_walks_the_lifecycle() {
        let mut store = TargetStore::new(4, 10_000);
        assert!(store.track_seen(hash(), 1_000));
        store.set_state(hash(), TargetState::Simulating, 1_100);
        // in-flight targets are not re-processed on re-delivery
        assert!(!store.track_seen(hash(), 1_150));
        store.set_state(hash(), TargetState::Submitting, 1_200);
        store.mark_done(hash(), Some("0xbeef".to_string()), 1_300);
        assert!(store.is_terminal(hash()));
        assert!(!store.track_seen(hash(), 1_400));
    }

    #[test]
    fn transient_drop_allows_reentry() {
        let mut store = TargetStore::new(4, 10_000);
        assert!(store.track_seen(hash(), 1_000));
        store.drop_transient(hash(), "pool unavailable", 1_050);
        assert!(!store.is_terminal(hash()));
        assert!(store.track_seen(hash(), 1_100));
    }

    #[test]
    fn terminal_drop_blocks_reentry_and_keeps_reason() {
        let mut store = TargetStore::new(4, 10_000);
        assert!(store.track_seen(hash(), 1_000));
        store.drop_terminal(hash(), "unprofitable", 1_050);
        assert!(store.is_terminal(hash()));
        assert!(!store.track_seen(hash(), 1_100));
        let entry = store.entries.get(&hash()).unwrap();
        assert_eq!(entry.drop_reason.as_deref(), Some("unprofitable"));
    }

    #[test]
    fn dropped_entries_ignore_state_updates() {
        let mut store = TargetStore::new(4, 10_000);
        store.track_seen(hash(), 1_000);
        store.drop_terminal(hash(), "unprofitable", 1_050);
        store.set_state(hash(), TargetState::Submitting, 1_100);
        let entry = store.entries.get(&hash()).unwrap();
        assert_eq!(entry.state, TargetState::Dropped);
    }

    #[test]
    fn prune_expires_stale_entries() {
        let mut store = TargetStore::new(4, 100);
        store.track_seen(hash(), 1_000);
        store.prune(1_101);
        assert!(store.entries.get(&hash()).is_none());
    }
}
