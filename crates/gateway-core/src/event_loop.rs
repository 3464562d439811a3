use crate::cache::ValueCache;
use crate::ingress::{DispatchAction, IngressDispatcher};
use crate::registry::SubscriptionRegistry;
use crate::shutdown::ShutdownSignal;
use sensor_wire::{SensorId, SensorSnapshot};
use sm_iface::SmHandle;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Something a stream/datagram/log session registers so it is woken up
/// when V changes for a sensor it cares about. Implementations
/// serialize the snapshot into their own `RespondFormat` and enqueue it
/// on their own `EgressQueue` — the event loop only decides *who* to
/// notify, never *how*.
pub trait NotificationSink: Send + Sync {
    /// `error` is `Some` only for the synthetic notification raised when
    /// an SM call fails during reconcile — the snapshot's `undefined`
    /// flag is set in that case and `error` carries `last_error`'s text,
    /// matching the JSON wire format's `error` field.
    fn notify(&self, snapshot: &SensorSnapshot, error: Option<&str>);
}

/// A mutation that must be applied on the loop, requested from off-loop
/// code (the HTTP accept path, a session's command parser). Mutating R
/// directly from another thread is forbidden; everything funnels
/// through this channel and a wakeup.
pub enum LoopCommand {
    Add(SensorId, SensorId),
    Del(SensorId, SensorId),
    Set(SensorId, SensorId, i64),
    RegisterSink(SensorId, SensorId, Arc<dyn NotificationSink>),
    /// A session closed: drop its registry entries and its sink
    /// registrations in one step.
    DropSubscriber(SensorId),
}

/// The system-level actions a caller must react to; each reaction is
/// variant-specific (the datagram session re-asks its whole directory
/// on `StartUp`, the stream gateway begins draining open sessions on
/// `FoldUpOrFinish`), so `EventLoop` only classifies and hands them back
/// rather than acting on them itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemAction {
    StartUp,
    FoldUpOrFinish,
    WatchDogRemote,
    WatchDogLocal,
    LogRotate,
}

/// Single-threaded cooperative loop (modeled as one async task) binding
/// SM's message port, the inter-thread wakeup channel, and the
/// heartbeat timer. Per-session socket readiness and send/ping timers
/// live in each session's own task, driven by its `EgressQueue` and
/// `CancelFlag` — this loop owns only the state that must never be
/// touched from more than one place at once: R, V, and the sensor →
/// sink fan-out index.
pub struct EventLoop<SM: SmHandle> {
    sm: Arc<SM>,
    cache: Arc<ValueCache>,
    registry: SubscriptionRegistry,
    ingress: IngressDispatcher,
    shutdown: ShutdownSignal,
    commands: mpsc::UnboundedReceiver<LoopCommand>,
    sinks: HashMap<SensorId, Vec<(SensorId, Arc<dyn NotificationSink>)>>,
    poll_timeout: Duration,
}

impl<SM: SmHandle> EventLoop<SM> {
    pub fn new(
        sm: Arc<SM>,
        cache: Arc<ValueCache>,
        shutdown: ShutdownSignal,
        poll_timeout: Duration,
    ) -> (Self, mpsc::UnboundedSender<LoopCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let this = Self {
            sm,
            cache,
            registry: SubscriptionRegistry::new(),
            ingress: IngressDispatcher::new(),
            shutdown,
            commands: rx,
            sinks: HashMap::new(),
            poll_timeout,
        };
        (this, tx)
    }

    fn is_known(&self, id: SensorId) -> bool {
        self.sinks.get(&id).is_some_and(|v| !v.is_empty())
    }

    fn fan_out(&self, snapshot: &SensorSnapshot, error: Option<&str>) {
        if let Some(subscribers) = self.sinks.get(&snapshot.id) {
            for (_, sink) in subscribers {
                sink.notify(snapshot, error);
            }
        }
    }

    /// Executes `registry.reconcile` and turns any failures into the
    /// synthetic undefined-value notifications the spec calls for,
    /// fanning them out to that sensor's attached sinks.
    async fn reconcile_and_surface_failures(&mut self, subscriber: SensorId) {
        let failures = self.registry.reconcile(subscriber, self.sm.as_ref()).await;
        for failure in failures {
            tracing::warn!(id = failure.id.0, error = %failure.message, "SM call failed, surfacing synthetic notification");
            let snapshot = SensorSnapshot::undefined_for(failure.id, 0);
            self.fan_out(&snapshot, Some(&failure.message));
        }
    }

    async fn apply_command(&mut self, cmd: LoopCommand) {
        match cmd {
            LoopCommand::Add(subscriber, id) => {
                self.registry.add(subscriber, id);
                self.reconcile_and_surface_failures(subscriber).await;
            }
            LoopCommand::Del(subscriber, id) => {
                self.registry.del(subscriber, id);
                self.reconcile_and_surface_failures(subscriber).await;
                if let Some(list) = self.sinks.get_mut(&id) {
                    list.retain(|(s, _)| *s != subscriber);
                }
            }
            LoopCommand::Set(subscriber, id, value) => {
                self.registry.set(subscriber, id, value);
                self.reconcile_and_surface_failures(subscriber).await;
            }
            LoopCommand::RegisterSink(subscriber, id, sink) => {
                self.sinks.entry(id).or_default().push((subscriber, sink));
            }
            LoopCommand::DropSubscriber(subscriber) => {
                for (_, list) in self.sinks.iter_mut() {
                    list.retain(|(s, _)| *s != subscriber);
                }
            }
        }
    }

    /// Runs until the shutdown signal fires. `on_system_action` reacts
    /// to lifecycle/liveness commands from SM; `on_log_event` receives
    /// free-text lines classified as `LogEvent` by `IngressDispatcher` —
    /// the log-session binary is the only caller that does anything with
    /// these, the sensor gateways pass a no-op. Both run inline on the
    /// loop, so neither must block.
    pub async fn run(&mut self, mut on_system_action: impl FnMut(SystemAction), mut on_log_event: impl FnMut(&str)) {
        loop {
            tokio::select! {
                biased;
                () = self.shutdown.wait() => {
                    tracing::info!("event loop: shutdown requested");
                    return;
                }
                Some(cmd) = self.commands.recv() => {
                    self.apply_command(cmd).await;
                }
                poll = self.sm.poll_message(self.poll_timeout) => {
                    match poll {
                        Ok(Some(msg)) => self.handle_message(msg, &mut on_system_action, &mut on_log_event).await,
                        Ok(None) => {}
                        Err(err) => tracing::warn!(error = %err, "event loop: SM poll failed, retrying next tick"),
                    }
                }
            }
        }
    }

    async fn handle_message(
        &mut self,
        msg: sm_iface::SmMessage,
        on_system_action: &mut impl FnMut(SystemAction),
        on_log_event: &mut impl FnMut(&str),
    ) {
        let localwork = self.sm.is_localwork();
        let action = self.ingress.dispatch(msg, &self.cache, |id| self.is_known(id), localwork);
        match action {
            DispatchAction::Notified(snapshot) => self.fan_out(&snapshot, None),
            DispatchAction::Ignored => {}
            DispatchAction::StartUp => {
                self.registry.mark_all_ask();
                self.reconcile_all_and_surface_failures().await;
                on_system_action(SystemAction::StartUp);
            }
            DispatchAction::FoldUpOrFinish => {
                self.registry.mark_all_unask();
                self.reconcile_all_and_surface_failures().await;
                on_system_action(SystemAction::FoldUpOrFinish);
            }
            DispatchAction::WatchDogRemote => {
                self.registry.mark_all_ask();
                self.reconcile_all_and_surface_failures().await;
                on_system_action(SystemAction::WatchDogRemote);
            }
            DispatchAction::WatchDogLocal => on_system_action(SystemAction::WatchDogLocal),
            DispatchAction::LogRotate => on_system_action(SystemAction::LogRotate),
            DispatchAction::LogEvent(line) => on_log_event(&line),
            DispatchAction::Unknown => {}
        }
    }

    /// The registry-wide counterpart of `reconcile_and_surface_failures`,
    /// used by `ask-all`/`unask-all` (`StartUp`, remote `WatchDog`,
    /// `FoldUp`/`Finish`) which act across every subscriber at once.
    async fn reconcile_all_and_surface_failures(&mut self) {
        let failures = self.registry.reconcile_all(self.sm.as_ref()).await;
        for failure in failures {
            tracing::warn!(id = failure.id.0, error = %failure.message, "SM call failed during ask-all/unask-all, surfacing synthetic notification");
            let snapshot = SensorSnapshot::undefined_for(failure.id, 0);
            self.fan_out(&snapshot, Some(&failure.message));
        }
    }
}
