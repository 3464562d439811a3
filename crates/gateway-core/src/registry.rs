use sensor_wire::SensorId;
use sm_iface::SmHandle;
use std::collections::HashMap;

/// The command an entry is waiting to have executed against SM, matching
/// the registry's `{none, ask, unask, setValue(v)}` states. `Idle` is the
/// `none` state — renamed to avoid colliding with `Option::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingCommand {
    Idle,
    Ask,
    Unask,
    SetValue(i64),
}

#[derive(Debug, Clone)]
pub struct SubscriptionEntry {
    pub id: SensorId,
    pub pending: PendingCommand,
    pub last_value: i64,
    pub last_error: String,
    pub pack_position: Option<usize>,
}

impl SubscriptionEntry {
    fn new(id: SensorId) -> Self {
        Self {
            id,
            pending: PendingCommand::Idle,
            last_value: 0,
            last_error: String::new(),
            pack_position: None,
        }
    }
}

/// A failed reconcile call, surfaced to the caller so it can be turned
/// into a synthetic undefined-value notification on the egress side.
#[derive(Debug, Clone)]
pub struct ReconcileFailure {
    pub id: SensorId,
    pub message: String,
}

/// Authoritative live state of which sensor ids one subscriber wants
/// notifications for. One `SubscriptionRegistry` instance is shared by
/// all subscribers; entries are keyed by `(subscriber, id)`.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: HashMap<(SensorId, SensorId), SubscriptionEntry>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry with `pending = Ask` if absent; if present, only
    /// re-queues `Ask` when the previous command was `Unask` — otherwise
    /// this is a no-op (idempotent `add`).
    pub fn add(&mut self, subscriber: SensorId, id: SensorId) {
        match self.entries.get_mut(&(subscriber, id)) {
            None => {
                let mut entry = SubscriptionEntry::new(id);
                entry.pending = PendingCommand::Ask;
                self.entries.insert((subscriber, id), entry);
            }
            Some(entry) if entry.pending == PendingCommand::Unask => {
                entry.pending = PendingCommand::Ask;
            }
            Some(_) => {}
        }
    }

    /// The entry survives until SM has acknowledged the unask (or failed
    /// it) — removal happens in `reconcile`, not here.
    pub fn del(&mut self, subscriber: SensorId, id: SensorId) {
        if let Some(entry) = self.entries.get_mut(&(subscriber, id)) {
            entry.pending = PendingCommand::Unask;
        }
    }

    /// Stashes `v` into `last_value` immediately so local reads observe
    /// the intended value before SM round-trips.
    pub fn set(&mut self, subscriber: SensorId, id: SensorId, value: i64) {
        if let Some(entry) = self.entries.get_mut(&(subscriber, id)) {
            entry.pending = PendingCommand::SetValue(value);
            entry.last_value = value;
        }
    }

    pub fn get(&self, subscriber: SensorId, id: SensorId) -> Option<&SubscriptionEntry> {
        self.entries.get(&(subscriber, id))
    }

    pub fn entries_for(&self, subscriber: SensorId) -> impl Iterator<Item = &SubscriptionEntry> {
        self.entries
            .iter()
            .filter(move |((s, _), _)| *s == subscriber)
            .map(|(_, e)| e)
    }

    /// Executes every pending command for `subscriber` against SM exactly
    /// once, then clears it. Entries whose pending command was `Unask`
    /// are removed from the registry on success — this is the only place
    /// entries disappear. Idempotent when replayed with all pending
    /// commands already cleared (a no-op pass).
    pub async fn reconcile<SM: SmHandle>(
        &mut self,
        subscriber: SensorId,
        sm: &SM,
    ) -> Vec<ReconcileFailure> {
        self.reconcile_matching(sm, move |s, _| s == subscriber).await
    }

    /// Same contract as `reconcile`, but across every subscriber's
    /// entries at once — the registry-wide counterpart used by
    /// `ask_all`/`unask_all` (spec §4.4's `StartUp` and `WatchDog` in
    /// remote mode, and `FoldUp`/`Finish`).
    pub async fn reconcile_all<SM: SmHandle>(&mut self, sm: &SM) -> Vec<ReconcileFailure> {
        self.reconcile_matching(sm, |_, _| true).await
    }

    async fn reconcile_matching<SM: SmHandle>(
        &mut self,
        sm: &SM,
        matches: impl Fn(SensorId, SensorId) -> bool,
    ) -> Vec<ReconcileFailure> {
        let mut failures = Vec::new();
        let mut to_remove = Vec::new();

        for ((s, id), entry) in self.entries.iter_mut() {
            if !matches(*s, *id) || entry.pending == PendingCommand::Idle {
                continue;
            }
            let result = match entry.pending {
                PendingCommand::Ask => sm.ask(*s, *id).await,
                PendingCommand::Unask => sm.unask(*s, *id).await,
                PendingCommand::SetValue(v) => sm.set_value(*id, v).await,
                PendingCommand::Idle => unreachable!(),
            };
            match result {
                Ok(()) => {
                    entry.last_error.clear();
                    if entry.pending == PendingCommand::Unask {
                        to_remove.push((*s, *id));
                    }
                }
                Err(err) => {
                    entry.last_error = err.to_string();
                    failures.push(ReconcileFailure {
                        id: *id,
                        message: entry.last_error.clone(),
                    });
                }
            }
            entry.pending = PendingCommand::Idle;
        }

        for key in to_remove {
            self.entries.remove(&key);
        }
        failures
    }

    /// Re-queues `Ask` for every currently tracked entry, regardless of
    /// its prior pending state. Used on `StartUp` (ask everything once
    /// activation completes) and on a remote-mode `WatchDog` (SM
    /// restarted and lost its subscription state).
    pub fn mark_all_ask(&mut self) {
        for entry in self.entries.values_mut() {
            entry.pending = PendingCommand::Ask;
        }
    }

    /// Re-queues `Unask` for every currently tracked entry. Used on
    /// `FoldUp`/`Finish`.
    pub fn mark_all_unask(&mut self) {
        for entry in self.entries.values_mut() {
            entry.pending = PendingCommand::Unask;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sm_iface::MockSm;

    #[test]
    fn add_is_idempotent_when_already_pending() {
        let mut r = SubscriptionRegistry::new();
        let s = SensorId(1);
        let id = SensorId(42);
        r.add(s, id);
        r.add(s, id);
        assert_eq!(r.get(s, id).unwrap().pending, PendingCommand::Ask);
    }

    #[test]
    fn add_requeues_ask_after_prior_unask() {
        let mut r = SubscriptionRegistry::new();
        let s = SensorId(1);
        let id = SensorId(42);
        r.add(s, id);
        r.del(s, id);
        r.add(s, id);
        assert_eq!(r.get(s, id).unwrap().pending, PendingCommand::Ask);
    }

    #[tokio::test]
    async fn reconcile_clears_pending_and_issues_single_ask() {
        let mut r = SubscriptionRegistry::new();
        let sm = MockSm::new();
        let s = SensorId(1);
        let id = SensorId(50);
        r.add(s, id);
        let failures = r.reconcile(s, &sm).await;
        assert!(failures.is_empty());
        assert_eq!(r.get(s, id).unwrap().pending, PendingCommand::Idle);
        assert!(sm.is_subscribed(s, id));
    }

    #[tokio::test]
    async fn add_then_del_then_reconcile_leaves_no_entry() {
        let mut r = SubscriptionRegistry::new();
        let sm = MockSm::new();
        let s = SensorId(1);
        let id = SensorId(50);
        r.add(s, id);
        r.del(s, id);
        r.reconcile(s, &sm).await;
        assert!(r.get(s, id).is_none());
        assert!(!sm.is_subscribed(s, id));
    }

    #[tokio::test]
    async fn set_stashes_value_before_reconcile_runs() {
        let mut r = SubscriptionRegistry::new();
        let sm = MockSm::new();
        let s = SensorId(1);
        let id = SensorId(50);
        r.add(s, id);
        r.reconcile(s, &sm).await;
        r.set(s, id, 77);
        assert_eq!(r.get(s, id).unwrap().last_value, 77);
        r.reconcile(s, &sm).await;
        assert_eq!(sm.value_of(id), Some(77));
    }

    #[tokio::test]
    async fn mark_all_ask_reissues_ask_for_every_subscriber_after_reconcile() {
        let mut r = SubscriptionRegistry::new();
        let sm = MockSm::new();
        let (s1, s2) = (SensorId(1), SensorId(2));
        let id = SensorId(50);
        r.add(s1, id);
        r.add(s2, id);
        r.reconcile_all(&sm).await;
        assert!(sm.is_subscribed(s1, id));
        assert!(sm.is_subscribed(s2, id));

        // Simulate SM restart: it forgets every subscription.
        sm.clear_subscriptions();
        assert!(!sm.is_subscribed(s1, id));

        r.mark_all_ask();
        let failures = r.reconcile_all(&sm).await;
        assert!(failures.is_empty());
        assert!(sm.is_subscribed(s1, id));
        assert!(sm.is_subscribed(s2, id));
    }

    #[tokio::test]
    async fn mark_all_unask_clears_every_entry_on_successful_reconcile() {
        let mut r = SubscriptionRegistry::new();
        let sm = MockSm::new();
        let (s1, s2) = (SensorId(1), SensorId(2));
        r.add(s1, SensorId(10));
        r.add(s2, SensorId(20));
        r.reconcile_all(&sm).await;

        r.mark_all_unask();
        let failures = r.reconcile_all(&sm).await;
        assert!(failures.is_empty());
        assert!(r.get(s1, SensorId(10)).is_none());
        assert!(r.get(s2, SensorId(20)).is_none());
    }

    #[tokio::test]
    async fn reconcile_is_idempotent_when_replayed() {
        let mut r = SubscriptionRegistry::new();
        let sm = MockSm::new();
        let s = SensorId(1);
        let id = SensorId(50);
        r.add(s, id);
        r.reconcile(s, &sm).await;
        let failures = r.reconcile(s, &sm).await;
        assert!(failures.is_empty());
    }
}
