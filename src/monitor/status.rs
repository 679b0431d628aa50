use core::fmt;

/// How a status line should be presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    Info,
    Success,
    Idle,
}

/// A collaborator-facing notification emitted by a monitoring session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusEvent {
    Started {
        process: String,
        pattern: String,
    },

    /// Emitted at most once per tracked process instance.
    HandleClosed {
        process: String,
        instance: u32,
        pid: u32,
    },

    Stopped,
}

impl StatusEvent {
    pub fn category(&self) -> StatusCategory {
        match self {
            StatusEvent::Started { .. } => StatusCategory::Info,
            StatusEvent::HandleClosed { .. } => StatusCategory::Success,
            StatusEvent::Stopped => StatusCategory::Idle,
        }
    }
}

impl fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusEvent::Started { process, pattern } => {
                write!(f, "Monitoring {process} - Closing handle: {pattern}")
            }
            StatusEvent::HandleClosed {
                process,
                instance,
                pid,
            } => write!(f, "Handle closed for {process} Instance {instance} (PID: {pid})"),
            StatusEvent::Stopped => f.write_str("Monitoring stopped"),
        }
    }
}
