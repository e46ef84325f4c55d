use crate::scheduler::SchedulerReport;

/// What asked for a restart cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartTrigger {
    DeviceChange,
    ConfigWrite,
}

/// Why the orchestrator stopped running
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(String),
    Error(String),
}

/// Outcome of one stop-drain-reload-relaunch cycle
#[derive(Debug, Clone)]
pub struct RestartReport {
    pub trigger: RestartTrigger,
    /// Scheduler instances that acknowledged the stop
    pub stopped: usize,
    /// Measurements relayed while the old generation wound down
    pub relayed: usize,
    /// Scheduler instances launched for the new generation
    pub started: usize,
    pub reports: Vec<SchedulerReport>,
}
