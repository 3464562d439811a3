use sensor_wire::SensorSnapshot;

/// A message arriving on SM's port, as classified by `IngressDispatcher`.
#[derive(Debug, Clone)]
pub enum SmMessage {
    /// A sensor value changed; carries the full snapshot.
    SensorInfo(SensorSnapshot),
    /// A lifecycle or liveness signal from SM itself.
    System(SystemCommand),
    /// A free-text line destined for the log session subsystem, not a
    /// sensor update.
    LogEvent(String),
    /// A message kind SM's port produced that this handle's decoder did
    /// not recognize. Carries a short tag for the dropped-message log
    /// line; the dispatcher counts and drops these.
    Unknown(String),
}

/// Lifecycle and liveness commands SM can send on its message port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemCommand {
    StartUp,
    FoldUp,
    Finish,
    /// SM's own liveness heartbeat; in remote mode this means SM
    /// restarted and every registry entry must be re-asked.
    WatchDog,
    /// Forwarded to the logging collaborator; no core state change.
    LogRotate,
}
