use crate::cache::ValueCache;
use sensor_wire::{SensorId, SensorSnapshot};
use sm_iface::{SmMessage, SystemCommand};

/// What the caller (the event loop) must do in response to one dispatched
/// message. `IngressDispatcher` classifies and applies the cache update;
/// the fan-out to attached sessions and the R reconciliation calls are
/// the event loop's job, since those depend on which `Session` variant
/// is running (stream fans out per-sensor to many sessions; datagram
/// reads the cache on its own ticker and never fans out here).
#[derive(Debug, Clone)]
pub enum DispatchAction {
    /// A sensor notification for an id nobody asked for — ignored by V,
    /// nothing further to do.
    Ignored,
    /// V was updated (or the update was stale and discarded — see
    /// `ValueCache::update`'s return). Either way, attached sessions
    /// should be notified so they can re-check the cache.
    Notified(SensorSnapshot),
    /// Wait up to `activate_timeout` for activation, then issue
    /// `R.ask-all` and start the egress timer.
    StartUp,
    /// Issue `R.unask-all` and transition sessions to draining.
    FoldUpOrFinish,
    /// SM restarted while not co-hosted: reissue `R.ask-all`.
    WatchDogRemote,
    /// Co-hosted with SM: a watchdog tick means nothing happened.
    WatchDogLocal,
    /// Forwarded to the logging collaborator; no core state change.
    LogRotate,
    /// A free-text log line, forwarded as-is to the logging collaborator.
    LogEvent(String),
    /// An unrecognized message kind; counted and dropped per spec.
    Unknown,
}

/// Consumes messages from SM's port and classifies them. Tracks a
/// running count of unrecognized messages (§4.4's "Unknown: counted and
/// dropped") — the fan-out to attached sessions and the R reconciliation
/// calls remain the event loop's job, since those depend on which
/// `Session` variant is running.
#[derive(Default)]
pub struct IngressDispatcher {
    unknown_count: std::sync::atomic::AtomicU64,
}

impl IngressDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of `Unknown` messages dropped since construction.
    pub fn unknown_count(&self) -> u64 {
        self.unknown_count.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// `is_known` answers whether some subscriber in R currently
    /// references the notification's sensor id — only then does the
    /// notification reach V and get reported for fan-out.
    pub fn dispatch(
        &self,
        msg: SmMessage,
        cache: &ValueCache,
        is_known: impl Fn(SensorId) -> bool,
        localwork: bool,
    ) -> DispatchAction {
        match msg {
            SmMessage::SensorInfo(snapshot) => {
                if !is_known(snapshot.id) {
                    return DispatchAction::Ignored;
                }
                cache.update(snapshot.clone());
                DispatchAction::Notified(snapshot)
            }
            SmMessage::System(SystemCommand::StartUp) => DispatchAction::StartUp,
            SmMessage::System(SystemCommand::FoldUp) | SmMessage::System(SystemCommand::Finish) => {
                DispatchAction::FoldUpOrFinish
            }
            SmMessage::System(SystemCommand::WatchDog) => {
                if localwork {
                    DispatchAction::WatchDogLocal
                } else {
                    DispatchAction::WatchDogRemote
                }
            }
            SmMessage::System(SystemCommand::LogRotate) => DispatchAction::LogRotate,
            SmMessage::LogEvent(line) => DispatchAction::LogEvent(line),
            SmMessage::Unknown(tag) => {
                self.unknown_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                tracing::debug!(tag = %tag, "ingress: dropping unknown message kind");
                DispatchAction::Unknown
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensor_wire::{SensorKind, Timestamp};

    fn snapshot(id: i64) -> SensorSnapshot {
        SensorSnapshot {
            id: SensorId(id),
            value: 7,
            undefined: false,
            supplier: SensorId::NONE,
            node: 1,
            sm_time: Timestamp::new(1000, 0),
            tm_time: Timestamp::new(1000, 0),
            kind: SensorKind::AnalogInput,
            calibration: None,
        }
    }

    #[test]
    fn known_sensor_info_updates_cache_and_notifies() {
        let dispatcher = IngressDispatcher::new();
        let cache = ValueCache::new();
        let action = dispatcher.dispatch(SmMessage::SensorInfo(snapshot(42)), &cache, |_| true, true);
        assert!(matches!(action, DispatchAction::Notified(s) if s.id == SensorId(42)));
        assert_eq!(cache.get(SensorId(42)).unwrap().value, 7);
    }

    #[test]
    fn unknown_sensor_info_is_ignored_and_cache_untouched() {
        let dispatcher = IngressDispatcher::new();
        let cache = ValueCache::new();
        let action = dispatcher.dispatch(SmMessage::SensorInfo(snapshot(42)), &cache, |_| false, true);
        assert!(matches!(action, DispatchAction::Ignored));
        assert!(!cache.contains(SensorId(42)));
    }

    #[test]
    fn watchdog_distinguishes_localwork_from_remote() {
        let dispatcher = IngressDispatcher::new();
        let cache = ValueCache::new();
        let local = dispatcher.dispatch(SmMessage::System(SystemCommand::WatchDog), &cache, |_| true, true);
        assert!(matches!(local, DispatchAction::WatchDogLocal));
        let remote = dispatcher.dispatch(SmMessage::System(SystemCommand::WatchDog), &cache, |_| true, false);
        assert!(matches!(remote, DispatchAction::WatchDogRemote));
    }

    #[test]
    fn unknown_message_is_counted_and_dropped() {
        let dispatcher = IngressDispatcher::new();
        let cache = ValueCache::new();
        assert_eq!(dispatcher.unknown_count(), 0);
        let action = dispatcher.dispatch(SmMessage::Unknown("frobnicate".into()), &cache, |_| true, true);
        assert!(matches!(action, DispatchAction::Unknown));
        assert_eq!(dispatcher.unknown_count(), 1);
        dispatcher.dispatch(SmMessage::Unknown("bogus".into()), &cache, |_| true, true);
        assert_eq!(dispatcher.unknown_count(), 2);
    }

    #[test]
    fn fold_up_and_finish_both_map_to_the_same_action() {
        let dispatcher = IngressDispatcher::new();
        let cache = ValueCache::new();
        assert!(matches!(
            dispatcher.dispatch(SmMessage::System(SystemCommand::FoldUp), &cache, |_| true, true),
            DispatchAction::FoldUpOrFinish
        ));
        assert!(matches!(
            dispatcher.dispatch(SmMessage::System(SystemCommand::Finish), &cache, |_| true, true),
            DispatchAction::FoldUpOrFinish
        ));
    }
}
