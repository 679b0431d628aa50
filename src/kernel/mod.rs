//! The privileged surface the engine is built on.
//!
//! Everything that touches another process, the handle table or the current
//! token goes through [`Kernel`]. The production implementation lives in
//! [`crate::windows::NtKernel`]; tests run against an in-memory fake.

pub mod constants;
pub mod flags;

#[cfg(test)]
pub(crate) mod fake;

use core::ptr::NonNull;

use crate::{Result, iter::ProcessView};
pub use flags::{DuplicateOptions, ProcessAccess, TokenAccess};

pub type Handle = usize;
pub type NtStatus = i32;

/// Locally unique identifier of a privilege.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Luid {
    pub low_part: u32,
    pub high_part: i32,
}

/// The operations needed to enumerate, resolve, match and close handles.
///
/// Methods mirror the underlying system calls closely: status-returning
/// queries hand back the raw [`NtStatus`] so callers can react to
/// `STATUS_INFO_LENGTH_MISMATCH`, while calls producing a handle return it
/// through [`Result`].
///
/// Every handle produced by [`Kernel::open_process`],
/// [`Kernel::duplicate_object`] or [`Kernel::open_process_token`] is owned by
/// the caller and must be passed to [`Kernel::close`] exactly once.
pub trait Kernel: Send + Sync {
    /// Commits `size` bytes of zeroed, read/write memory in the current process.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::AllocationFailed`] when the memory cannot be committed.
    fn allocate(&self, size: usize) -> Result<NonNull<u8>>;

    /// Releases memory obtained from [`Kernel::allocate`].
    ///
    /// # Safety
    ///
    /// `base` must have been returned by `allocate` on this kernel with the
    /// same `size`, and must not have been freed already.
    unsafe fn free(&self, base: NonNull<u8>, size: usize);

    /// NtQuerySystemInformation
    fn query_system_information(
        &self,
        class: u32,
        buffer: &mut [u8],
        return_length: &mut u32,
    ) -> NtStatus;

    /// Opens a process by id.
    fn open_process(&self, pid: u32, access: ProcessAccess) -> Result<Handle>;

    /// Duplicates `source_handle`, owned by `source_process`, into the
    /// current process.
    ///
    /// With [`DuplicateOptions::CLOSE_SOURCE`] the handle is closed in the
    /// source process, which is how a foreign handle gets severed.
    fn duplicate_object(
        &self,
        source_process: Handle,
        source_handle: Handle,
        desired_access: u32,
        options: DuplicateOptions,
    ) -> Result<Handle>;

    /// NtQueryObject
    fn query_object(
        &self,
        handle: Handle,
        class: u32,
        buffer: &mut [u8],
        return_length: &mut u32,
    ) -> NtStatus;

    /// NtClose
    fn close(&self, handle: Handle) -> NtStatus;

    /// Opens the current process's primary token.
    fn open_process_token(&self, access: TokenAccess) -> Result<Handle>;

    /// Resolves a privilege name such as `SeDebugPrivilege` to its [`Luid`].
    fn lookup_privilege_value(&self, name: &str) -> Option<Luid>;

    /// Enables or disables a single privilege on `token`.
    fn adjust_token_privileges(&self, token: Handle, luid: Luid, enable: bool) -> NtStatus;

    /// Lists the processes currently running on the system.
    fn processes(&self) -> Result<Vec<ProcessView>>;
}
