//! Finds the kernel handles a process holds, resolves their object names,
//! and closes the one matching a pattern from outside the process.
//!
//! The engine only talks to the system through [`kernel::Kernel`];
//! `NtKernel` implements it on 64-bit Windows.

#[cfg(all(windows, target_arch = "x86_64"))]
mod windows;

pub mod error;
pub mod iter;
pub mod kernel;
pub mod monitor;
pub mod object;
pub mod target;
pub mod utils;

/* EXPORTS */
pub use error::{Error, Result};
pub use iter::{
    HandleEntry, HandleSnapshot, HandleTable, ProcessView, RecordSchema, SnapshotConfig,
    find_pids_by_name, list_processes,
};
pub use kernel::{Handle, Kernel, NtStatus};
pub use monitor::{Monitor, MonitorConfig, MonitorState, StatusCategory, StatusEvent};
pub use object::{AliasRule, NameMatcher, collect_handle_names, try_close_matching_handle};
pub use target::TargetSpec;
pub use utils::{SafeHandle, enable_debug_privilege};
#[cfg(all(windows, target_arch = "x86_64"))]
pub use windows::NtKernel;
