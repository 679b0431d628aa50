//! Direct system call stubs.
//!
//! Each wrapper loads the call number resolved from ntdll and issues the
//! `syscall` itself, bypassing any user-mode hooks on the ntdll exports.
//! Arguments past the fourth are spilled above the 0x20 byte home area.
//!
//! # Safety
//!
//! All wrappers take raw pointers straight through to the kernel; the
//! caller guarantees each one is either null where the call allows it or
//! valid for the access the call performs.

use core::{arch::asm, ffi::c_void};

use super::{
    structs::{ClientId, ObjectAttributes, TokenPrivileges},
    syscalls::Syscalls,
};
use crate::kernel::{Handle, NtStatus};

impl Syscalls {
    /// NtOpenProcess
    #[inline(always)]
    pub unsafe fn open_process(
        &self,
        process_handle: *mut Handle,
        desired_access: u32,
        object_attributes: *mut ObjectAttributes,
        client_id: *mut ClientId,
    ) -> NtStatus {
        let status: NtStatus;

        unsafe {
            asm!(
                "mov r10, rcx",
                "syscall",

                in("rcx") process_handle,
                in("rdx") desired_access,
                in("r8")  object_attributes,
                in("r9")  client_id,

                in("rax") self.nt_open_process,
                lateout("rax") status,

                clobber_abi("system"),
            );
        }

        status
    }

    /// NtOpenProcessToken
    #[inline(always)]
    pub unsafe fn open_process_token(
        &self,
        process_handle: Handle,
        desired_access: u32,
        token_handle: *mut Handle,
    ) -> NtStatus {
        let status: NtStatus;

        unsafe {
            asm!(
                "mov r10, rcx",
                "syscall",

                in("rcx") process_handle,
                in("rdx") desired_access,
                in("r8") token_handle,

                in("rax") self.nt_open_process_token,
                lateout("rax") status,

                clobber_abi("system"),
            );
        }

        status
    }

    /// NtAdjustPrivilegesToken
    #[inline(always)]
    pub unsafe fn adjust_privileges_token(
        &self,
        token_handle: Handle,
        disable_all_privileges: u32,
        new_state: *mut TokenPrivileges,
        buffer_length: u32,
        previous_state: *mut TokenPrivileges,
        return_length: *mut u32,
    ) -> NtStatus {
        let status: NtStatus;

        unsafe {
            asm!(
                "sub rsp, 0x38",
                "mov [rsp + 0x28], {previous_state}",
                "mov [rsp + 0x30], {return_length}",
                "mov r10, rcx",
                "syscall",
                "add rsp, 0x38",

                in("rcx") token_handle,
                in("rdx") disable_all_privileges,
                in("r8") new_state,
                in("r9") buffer_length,
                previous_state = in(reg) previous_state,
                return_length = in(reg) return_length,

                in("rax") self.nt_adjust_privileges_token,
                lateout("rax") status,

                clobber_abi("system"),
            );
        }

        status
    }

    /// NtAllocateVirtualMemory
    #[inline(always)]
    pub unsafe fn allocate_virtual_memory(
        &self,
        process_handle: Handle,
        base_address: *mut usize,
        zero_bits: usize,
        region_size: *mut usize,
        allocation_type: u32,
        protection: u32,
    ) -> NtStatus {
        let status: NtStatus;

        unsafe {
            asm!(
                "sub rsp, 0x38",
                "mov [rsp + 0x28], {allocation_type:e}",
                "mov [rsp + 0x30], {protection:e}",

                "mov r10, rcx",
                "syscall",

                "add rsp, 0x38",

                in("rcx") process_handle,
                in("rdx") base_address,
                in("r8") zero_bits,
                in("r9") region_size,
                allocation_type = in(reg) allocation_type,
                protection = in(reg) protection,

                in("rax") self.nt_allocate_virtual_memory,
                lateout("rax") status,

                clobber_abi("system"),
            );
        }

        status
    }

    /// NtFreeVirtualMemory
    #[inline(always)]
    pub unsafe fn free_virtual_memory(
        &self,
        process_handle: Handle,
        base_address: *mut *mut c_void,
        region_size: *mut usize,
        free_type: u32,
    ) -> NtStatus {
        let status: NtStatus;

        unsafe {
            asm!(
                "mov r10, rcx",
                "syscall",

                in("rcx") process_handle,
                in("rdx") base_address,
                in("r8") region_size,
                in("r9") free_type,

                in("rax") self.nt_free_virtual_memory,
                lateout("rax") status,

                clobber_abi("system"),
            );
        }

        status
    }

    /// NtQuerySystemInformation
    #[inline(always)]
    pub unsafe fn query_system_information(
        &self,
        class: u32,
        buffer: *mut u8,
        length: u32,
        return_length: *mut u32,
    ) -> NtStatus {
        let status: NtStatus;

        unsafe {
            asm!(
                "mov r10, rcx",
                "syscall",

                in("rcx") class,
                in("rdx") buffer,
                in("r8")  length,
                in("r9")  return_length,

                in("rax") self.nt_query_system_information,
                lateout("rax") status,

                clobber_abi("system"),
            );
        }

        status
    }

    /// NtDuplicateObject
    #[inline(always)]
    #[allow(clippy::too_many_arguments)]
    pub unsafe fn duplicate_object(
        &self,
        source_process_handle: Handle,
        source_handle: Handle,
        target_process_handle: Handle,
        target_handle: *mut Handle,
        desired_access: u32,
        handle_attributes: u32,
        options: u32,
    ) -> NtStatus {
        let status: NtStatus;

        unsafe {
            asm!(
                "sub rsp, 0x40",
                "mov [rsp + 0x28], {desired_access:e}",
                "mov [rsp + 0x30], {handle_attributes:e}",
                "mov [rsp + 0x38], {options:e}",

                "mov r10, rcx",
                "syscall",

                "add rsp, 0x40",

                in("rcx") source_process_handle,
                in("rdx") source_handle,
                in("r8") target_process_handle,
                in("r9") target_handle,
                desired_access = in(reg) desired_access,
                handle_attributes = in(reg) handle_attributes,
                options = in(reg) options,

                in("rax") self.nt_duplicate_object,
                lateout("rax") status,

                clobber_abi("system"),
            );
        }

        status
    }

    /// NtQueryObject
    #[inline(always)]
    pub unsafe fn query_object(
        &self,
        handle: Handle,
        object_info_class: u32,
        object_info: *mut c_void,
        info_len: u32,
        return_len: *mut u32,
    ) -> NtStatus {
        let status: NtStatus;

        unsafe {
            asm!(
                "sub rsp, 0x30",
                "mov [rsp + 0x28], {return_len}",

                "mov r10, rcx",
                "syscall",

                "add rsp, 0x30",

                in("rcx") handle,
                in("rdx") object_info_class,
                in("r8") object_info,
                in("r9") info_len,
                return_len = in(reg) return_len,

                in("rax") self.nt_query_object,
                lateout("rax") status,

                clobber_abi("system"),
            );
        }

        status
    }

    /// NtClose
    #[inline(always)]
    pub fn close(&self, handle: Handle) -> NtStatus {
        let status: NtStatus;

        // Safety:
        // closing an invalid handle only returns an error status
        unsafe {
            asm!(
                "mov r10, rcx",
                "syscall",

                in("rcx") handle,

                in("rax") self.nt_close,
                lateout("rax") status,

                clobber_abi("system"),
            );
        }

        status
    }
}
