use crate::{Result, kernel::Kernel};

/// Represents information regarding a system process
/// that has not been opened to a handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessView {
    /// The process's unique identifier.
    pub pid: u32,

    /// The file name of the executable image.
    pub name: String,
}

impl ProcessView {
    pub fn new(pid: u32, name: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
        }
    }

    /// Whether this process runs the executable `name`, ignoring case and an
    /// `.exe` suffix on either side.
    pub fn is_named(&self, name: &str) -> bool {
        let ours = image_stem(&self.name);
        let theirs = image_stem(name.trim());
        !ours.is_empty() && ours.to_lowercase() == theirs.to_lowercase()
    }
}

impl core::fmt::Display for ProcessView {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} (PID: {})", image_stem(&self.name), self.pid)
    }
}

fn image_stem(name: &str) -> &str {
    let split = name.len().checked_sub(4).filter(|&at| name.is_char_boundary(at));
    match split {
        Some(at) if name[at..].eq_ignore_ascii_case(".exe") => &name[..at],
        _ => name,
    }
}

/// Lists the ids of running processes whose executable is `name`, in the
/// order the system reports them.
pub fn find_pids_by_name<K: Kernel + ?Sized>(kernel: &K, name: &str) -> Result<Vec<u32>> {
    let mut pids = Vec::new();
    for process in kernel.processes()? {
        if process.is_named(name) && !pids.contains(&process.pid) {
            pids.push(process.pid);
        }
    }
    Ok(pids)
}

/// Lists every running process, sorted by how it is displayed.
pub fn list_processes<K: Kernel + ?Sized>(kernel: &K) -> Result<Vec<ProcessView>> {
    let mut processes = kernel.processes()?;
    processes.sort_by_cached_key(|process| process.to_string());
    Ok(processes)
}
