use core::{fmt::Debug, ops::Deref};

use crate::{
    Result,
    kernel::{DuplicateOptions, Handle, Kernel, ProcessAccess, TokenAccess},
};

/// A wrapper around a `Handle` which closes the handle through its
/// kernel once it is dropped.
pub struct SafeHandle<'k, K: Kernel + ?Sized> {
    kernel: &'k K,
    raw: Handle,
}

impl<'k, K: Kernel + ?Sized> SafeHandle<'k, K> {
    /// Opens the process `pid` with `access`.
    pub fn open_process(kernel: &'k K, pid: u32, access: ProcessAccess) -> Result<Self> {
        let raw = kernel.open_process(pid, access)?;
        Ok(Self { kernel, raw })
    }

    /// Duplicates `source_handle` out of `source_process` with zero desired access.
    ///
    /// # Access Rights
    ///
    /// `source_process` must have been opened with [`ProcessAccess::DUP_HANDLE`].
    pub fn duplicate(
        kernel: &'k K,
        source_process: Handle,
        source_handle: Handle,
        options: DuplicateOptions,
    ) -> Result<Self> {
        let raw = kernel.duplicate_object(source_process, source_handle, 0, options)?;
        Ok(Self { kernel, raw })
    }

    /// Opens the current process's token.
    pub fn open_process_token(kernel: &'k K, access: TokenAccess) -> Result<Self> {
        let raw = kernel.open_process_token(access)?;
        Ok(Self { kernel, raw })
    }
}

impl<K: Kernel + ?Sized> Debug for SafeHandle<'_, K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "SafeHandle({:#X})", self.raw)
    }
}

impl<K: Kernel + ?Sized> Deref for SafeHandle<'_, K> {
    type Target = Handle;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

impl<K: Kernel + ?Sized> Drop for SafeHandle<'_, K> {
    fn drop(&mut self) {
        self.kernel.close(self.raw);
    }
}
