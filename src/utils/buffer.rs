use core::ptr::NonNull;

use crate::{
    Error, Result,
    kernel::{
        Kernel, NtStatus,
        constants::{STATUS_INFO_LENGTH_MISMATCH, STATUS_SUCCESS},
    },
};

/// Memory committed through a [`Kernel`], released back to it on drop.
pub struct KernelBuffer<'k, K: Kernel + ?Sized> {
    kernel: &'k K,
    base: NonNull<u8>,
    size: usize,
}

impl<'k, K: Kernel + ?Sized> KernelBuffer<'k, K> {
    pub fn allocate(kernel: &'k K, size: usize) -> Result<Self> {
        let base = kernel.allocate(size)?;
        Ok(Self { kernel, base, size })
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn as_slice(&self) -> &[u8] {
        // Safety:
        // base points to `size` committed bytes owned by this buffer
        // until drop
        unsafe { core::slice::from_raw_parts(self.base.as_ptr(), self.size) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // Safety:
        // see `as_slice`; &mut self guarantees exclusive access
        unsafe { core::slice::from_raw_parts_mut(self.base.as_ptr(), self.size) }
    }
}

impl<K: Kernel + ?Sized> Drop for KernelBuffer<'_, K> {
    fn drop(&mut self) {
        // Safety:
        // base and size come from the allocation made in `allocate`,
        // and drop runs exactly once
        unsafe { self.kernel.free(self.base, self.size) };
    }
}

/// Runs a variable-length query into a `u64`-aligned buffer.
///
/// `query` receives the buffer and writes the size it needs. Each length
/// mismatch regrows the buffer to that size plus `headroom` bytes, at most
/// `max_retries` times.
pub fn query_aligned(
    max_retries: u32,
    headroom: usize,
    mut query: impl FnMut(&mut [u64], &mut u32) -> NtStatus,
) -> Result<Vec<u64>> {
    let mut data: Vec<u64> = Vec::new();
    let mut needed = 0u32;

    for attempt in 0..=max_retries {
        match query(&mut data, &mut needed) {
            STATUS_SUCCESS => return Ok(data),
            STATUS_INFO_LENGTH_MISMATCH if attempt < max_retries => {
                let bytes = needed as usize + headroom;
                data = vec![0u64; bytes.div_ceil(size_of::<u64>())];
            }
            status => return Err(Error::NtStatus(status)),
        }
    }

    Err(Error::NtStatus(STATUS_INFO_LENGTH_MISMATCH))
}
