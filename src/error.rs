use crate::kernel::NtStatus;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("NTSTATUS(0x{0:08X})")]
    NtStatus(NtStatus),

    // snapshots
    #[error("handle information unavailable: NTSTATUS(0x{0:08X})")]
    InfoUnavailable(NtStatus),
    #[error("failed to allocate {size:#x} bytes: NTSTATUS(0x{status:08X})")]
    AllocationFailed { size: usize, status: NtStatus },

    // processes
    #[error("process not found: {0}")]
    ProcessNotFound(String),

    // sessions
    #[error("invalid target: {0} must not be empty")]
    InvalidTarget(&'static str),
    #[error("failed to spawn monitor worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    #[error("system call stubs could not be resolved from ntdll")]
    SyscallsUnavailable,
}

impl Error {
    /// The raw status code behind the error, if the kernel produced one.
    pub fn status(&self) -> Option<NtStatus> {
        match self {
            Error::NtStatus(status)
            | Error::InfoUnavailable(status)
            | Error::AllocationFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;
    use crate::kernel::constants::STATUS_INFO_LENGTH_MISMATCH;
    use pretty_assertions::assert_eq;

    #[test]
    fn status_codes_render_as_hex() {
        let err = Error::InfoUnavailable(STATUS_INFO_LENGTH_MISMATCH);
        assert_eq!(
            err.to_string(),
            "handle information unavailable: NTSTATUS(0xC0000004)"
        );
        assert_eq!(err.status(), Some(STATUS_INFO_LENGTH_MISMATCH));
        assert_eq!(Error::InvalidTarget("process name").status(), None);
    }
}
