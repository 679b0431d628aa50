//! The production [`Kernel`], issuing system calls directly.

mod structs;
mod syscalls;
mod utils;
mod wrappers;

use core::{ffi::c_void, ptr::NonNull};

use crate::{
    error::{Error, Result},
    iter::ProcessView,
    kernel::{
        DuplicateOptions, Handle, Kernel, Luid, NtStatus, ProcessAccess, TokenAccess,
        constants::{
            CURRENT_PROCESS_HANDLE, STATUS_NO_MEMORY, STATUS_SUCCESS, SYSTEM_PROCESS_INFORMATION,
        },
    },
    utils::query_aligned,
};
use structs::{
    ClientId, LuidAndAttributes, ObjectAttributes, SystemProcessInformation, TokenPrivileges,
};
use syscalls::{Syscalls, syscalls};
use utils::unicode_to_string;

const MEM_COMMIT: u32 = 0x1000;
const MEM_RESERVE: u32 = 0x2000;
const MEM_RELEASE: u32 = 0x8000;
const PAGE_READWRITE: u32 = 0x04;

const SE_PRIVILEGE_ENABLED: u32 = 0x2;

/// Well-known privilege LUIDs; these are fixed across Windows versions.
const PRIVILEGES: [(&str, u32); 5] = [
    ("SeIncreaseQuotaPrivilege", 5),
    ("SeTcbPrivilege", 7),
    ("SeShutdownPrivilege", 19),
    ("SeDebugPrivilege", 20),
    ("SeImpersonatePrivilege", 29),
];

/// Extra room when the process list is re-queried.
const PROCESS_LIST_SLACK: usize = 0x10000;
const PROCESS_LIST_RETRIES: u32 = 5;

pub struct NtKernel {
    syscalls: &'static Syscalls,
}

impl NtKernel {
    /// # Errors
    ///
    /// Returns [`Error::SyscallsUnavailable`] if ntdll's syscall stubs cannot
    /// be read, e.g. because they are hooked.
    pub fn new() -> Result<Self> {
        syscalls()
            .map(|syscalls| Self { syscalls })
            .ok_or(Error::SyscallsUnavailable)
    }

    fn query_processes(&self) -> Result<Vec<u64>> {
        // u64 words keep every record naturally aligned
        query_aligned(PROCESS_LIST_RETRIES, PROCESS_LIST_SLACK, |data, needed| unsafe {
            self.syscalls.query_system_information(
                SYSTEM_PROCESS_INFORMATION,
                data.as_mut_ptr().cast(),
                (data.len() * size_of::<u64>()) as u32,
                needed,
            )
        })
    }
}

impl Kernel for NtKernel {
    fn allocate(&self, size: usize) -> Result<NonNull<u8>> {
        let mut base = 0usize;
        let mut region = size;

        let status = unsafe {
            self.syscalls.allocate_virtual_memory(
                CURRENT_PROCESS_HANDLE,
                &mut base,
                0,
                &mut region,
                MEM_COMMIT | MEM_RESERVE,
                PAGE_READWRITE,
            )
        };

        if status != STATUS_SUCCESS {
            return Err(Error::AllocationFailed { size, status });
        }
        NonNull::new(base as *mut u8).ok_or(Error::AllocationFailed {
            size,
            status: STATUS_NO_MEMORY,
        })
    }

    unsafe fn free(&self, base: NonNull<u8>, _size: usize) {
        let mut address = base.as_ptr().cast::<c_void>();
        // MEM_RELEASE takes the whole reservation and requires a zero size
        let mut region = 0usize;

        let status = unsafe {
            self.syscalls.free_virtual_memory(
                CURRENT_PROCESS_HANDLE,
                &mut address,
                &mut region,
                MEM_RELEASE,
            )
        };
        if status != STATUS_SUCCESS {
            tracing::debug!(status = format_args!("{status:#010X}"), "NtFreeVirtualMemory failed");
        }
    }

    fn query_system_information(
        &self,
        class: u32,
        buffer: &mut [u8],
        return_length: &mut u32,
    ) -> NtStatus {
        let length = u32::try_from(buffer.len()).unwrap_or(u32::MAX);
        unsafe {
            self.syscalls
                .query_system_information(class, buffer.as_mut_ptr(), length, return_length)
        }
    }

    fn open_process(&self, pid: u32, access: ProcessAccess) -> Result<Handle> {
        let mut handle: Handle = 0;
        let mut attributes = ObjectAttributes::empty();
        let mut client_id = ClientId {
            unique_process: pid as usize,
            unique_thread: 0,
        };

        let status = unsafe {
            self.syscalls
                .open_process(&mut handle, access.bits(), &mut attributes, &mut client_id)
        };

        match status {
            STATUS_SUCCESS => Ok(handle),
            _ => Err(Error::NtStatus(status)),
        }
    }

    fn duplicate_object(
        &self,
        source_process: Handle,
        source_handle: Handle,
        desired_access: u32,
        options: DuplicateOptions,
    ) -> Result<Handle> {
        let mut handle: Handle = 0;

        let status = unsafe {
            self.syscalls.duplicate_object(
                source_process,
                source_handle,
                CURRENT_PROCESS_HANDLE,
                &mut handle,
                desired_access,
                0,
                options.bits(),
            )
        };

        match status {
            STATUS_SUCCESS => Ok(handle),
            _ => Err(Error::NtStatus(status)),
        }
    }

    fn query_object(
        &self,
        handle: Handle,
        class: u32,
        buffer: &mut [u8],
        return_length: &mut u32,
    ) -> NtStatus {
        let length = u32::try_from(buffer.len()).unwrap_or(u32::MAX);
        unsafe {
            self.syscalls.query_object(
                handle,
                class,
                buffer.as_mut_ptr().cast(),
                length,
                return_length,
            )
        }
    }

    fn close(&self, handle: Handle) -> NtStatus {
        self.syscalls.close(handle)
    }

    fn open_process_token(&self, access: TokenAccess) -> Result<Handle> {
        let mut token: Handle = 0;

        let status = unsafe {
            self.syscalls
                .open_process_token(CURRENT_PROCESS_HANDLE, access.bits(), &mut token)
        };

        match status {
            STATUS_SUCCESS => Ok(token),
            _ => Err(Error::NtStatus(status)),
        }
    }

    fn lookup_privilege_value(&self, name: &str) -> Option<Luid> {
        PRIVILEGES
            .iter()
            .find(|(privilege, _)| privilege.eq_ignore_ascii_case(name))
            .map(|&(_, low_part)| Luid {
                low_part,
                high_part: 0,
            })
    }

    fn adjust_token_privileges(&self, token: Handle, luid: Luid, enable: bool) -> NtStatus {
        let mut privileges = TokenPrivileges {
            privilege_count: 1,
            privileges: [LuidAndAttributes {
                luid,
                attributes: if enable { SE_PRIVILEGE_ENABLED } else { 0 },
            }],
        };

        unsafe {
            self.syscalls.adjust_privileges_token(
                token,
                0,
                &mut privileges,
                size_of::<TokenPrivileges>() as u32,
                core::ptr::null_mut(),
                core::ptr::null_mut(),
            )
        }
    }

    fn processes(&self) -> Result<Vec<ProcessView>> {
        let data = self.query_processes()?;
        let len = data.len() * size_of::<u64>();
        let base = data.as_ptr().cast::<u8>();

        let mut processes = Vec::new();
        let mut offset = 0usize;

        while offset + size_of::<SystemProcessInformation>() <= len {
            // Safety:
            // the record lies inside `data`, which outlives this loop, and the
            // kernel aligns every record; image names point into `data` too
            let info = unsafe { &*base.add(offset).cast::<SystemProcessInformation>() };

            processes.push(ProcessView::new(
                info.unique_process_id as u32,
                unicode_to_string(&info.image_name),
            ));

            if info.next_entry_offset == 0 {
                break;
            }
            offset += info.next_entry_offset as usize;
        }

        Ok(processes)
    }
}
