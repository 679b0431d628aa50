//! An in-memory [`Kernel`] for tests.
//!
//! Processes and their handles are plain data; every handle the fake hands
//! out is tracked so tests can check that each one is closed exactly once,
//! and every allocation is paired with its free.

use std::{
    collections::{HashMap, HashSet},
    ptr::NonNull,
    sync::{Mutex, MutexGuard},
};

use super::{
    DuplicateOptions, Handle, Kernel, Luid, NtStatus, ProcessAccess, TokenAccess,
    constants::{
        OBJECT_NAME_INFORMATION, SE_DEBUG_NAME, STATUS_ACCESS_DENIED, STATUS_INFO_LENGTH_MISMATCH,
        STATUS_INVALID_CID, STATUS_INVALID_HANDLE, STATUS_INVALID_PARAMETER, STATUS_NO_MEMORY,
        STATUS_NOT_SUPPORTED, STATUS_SUCCESS, SYSTEM_EXTENDED_HANDLE_INFORMATION,
        SYSTEM_HANDLE_INFORMATION,
    },
};
use crate::{
    Error, Result,
    iter::{HandleEntry, ProcessView, RecordSchema},
};

const FIRST_LOCAL_HANDLE: Handle = 0x1000;

#[derive(Clone, Debug, PartialEq, Eq)]
enum LocalObject {
    Process(u32),
    Duplicate { name: Option<String> },
    Token,
}

struct RemoteHandle {
    pid: u32,
    handle: Handle,
    name: Option<String>,
}

#[derive(Default)]
struct State {
    processes: Vec<ProcessView>,
    remote: Vec<RemoteHandle>,
    local: HashMap<Handle, LocalObject>,
    next_local: Handle,
    closed_remote: Vec<(u32, Handle)>,

    denied: HashSet<u32>,
    refuse_duplicate: HashSet<(u32, Handle)>,
    refuse_close_source: HashSet<(u32, Handle)>,
    mismatches_left: u32,
    system_information_status: Option<NtStatus>,
    allocation_limit: Option<usize>,
    privilege_status: NtStatus,
    debug_privilege: bool,
    fail_process_listing: bool,

    allocations: usize,
    frees: usize,
    open_calls: usize,
    duplicate_calls: usize,
    query_calls: usize,
    close_calls: usize,
    invalid_closes: usize,
}

impl State {
    fn issue(&mut self, object: LocalObject) -> Handle {
        if self.next_local == 0 {
            self.next_local = FIRST_LOCAL_HANDLE;
        }
        let handle = self.next_local;
        self.next_local += 4;
        self.local.insert(handle, object);
        handle
    }

    fn remote_index(&self, pid: u32, handle: Handle) -> Option<usize> {
        self.remote
            .iter()
            .position(|remote| remote.pid == pid && remote.handle == handle)
    }
}

#[derive(Default)]
pub(crate) struct FakeKernel {
    state: Mutex<State>,
}

impl FakeKernel {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("fake kernel state poisoned")
    }

    /* SETUP */

    pub fn add_process(&self, pid: u32, name: &str) {
        self.state().processes.push(ProcessView::new(pid, name));
    }

    /// Removes the process and every handle it owned, as if it exited.
    pub fn remove_process(&self, pid: u32) {
        let mut state = self.state();
        state.processes.retain(|process| process.pid != pid);
        state.remote.retain(|remote| remote.pid != pid);
    }

    pub fn add_handle(&self, pid: u32, handle: Handle, name: Option<&str>) {
        self.state().remote.push(RemoteHandle {
            pid,
            handle,
            name: name.map(str::to_owned),
        });
    }

    pub fn deny_access(&self, pid: u32) {
        self.state().denied.insert(pid);
    }

    pub fn refuse_duplication(&self, pid: u32, handle: Handle) {
        self.state().refuse_duplicate.insert((pid, handle));
    }

    pub fn refuse_close_source(&self, pid: u32, handle: Handle) {
        self.state().refuse_close_source.insert((pid, handle));
    }

    /// Reports a length mismatch for the next `times` handle table queries.
    pub fn force_length_mismatch(&self, times: u32) {
        self.state().mismatches_left = times;
    }

    pub fn set_system_information_status(&self, status: NtStatus) {
        self.state().system_information_status = Some(status);
    }

    pub fn fail_allocations_over(&self, size: usize) {
        self.state().allocation_limit = Some(size);
    }

    pub fn set_privilege_status(&self, status: NtStatus) {
        self.state().privilege_status = status;
    }

    pub fn fail_process_listing(&self, fail: bool) {
        self.state().fail_process_listing = fail;
    }

    /* OBSERVATIONS */

    pub fn allocations(&self) -> usize {
        self.state().allocations
    }

    pub fn frees(&self) -> usize {
        self.state().frees
    }

    pub fn duplicate_calls(&self) -> usize {
        self.state().duplicate_calls
    }

    pub fn close_calls(&self) -> usize {
        self.state().close_calls
    }

    /// Closes of handles that were never issued or already closed.
    pub fn invalid_closes(&self) -> usize {
        self.state().invalid_closes
    }

    /// Handles issued to the caller and not yet closed.
    pub fn open_local_handles(&self) -> usize {
        self.state().local.len()
    }

    /// Calls that open, duplicate or query anything.
    pub fn privileged_calls(&self) -> usize {
        let state = self.state();
        state.open_calls + state.duplicate_calls + state.query_calls
    }

    /// `(pid, handle)` pairs closed inside their owning process, in order.
    pub fn closed_remote_handles(&self) -> Vec<(u32, Handle)> {
        self.state().closed_remote.clone()
    }

    pub fn remote_handle_open(&self, pid: u32, handle: Handle) -> bool {
        self.state().remote_index(pid, handle).is_some()
    }

    pub fn debug_privilege_enabled(&self) -> bool {
        self.state().debug_privilege
    }
}

impl Kernel for FakeKernel {
    fn allocate(&self, size: usize) -> Result<NonNull<u8>> {
        let mut state = self.state();
        if state.allocation_limit.is_some_and(|limit| size > limit) {
            return Err(Error::AllocationFailed {
                size,
                status: STATUS_NO_MEMORY,
            });
        }

        let memory = Box::into_raw(vec![0u8; size].into_boxed_slice());
        state.allocations += 1;
        NonNull::new(memory.cast::<u8>()).ok_or(Error::AllocationFailed {
            size,
            status: STATUS_NO_MEMORY,
        })
    }

    unsafe fn free(&self, base: NonNull<u8>, size: usize) {
        // Safety:
        // the caller guarantees base/size came from `allocate`, which
        // leaked a boxed slice of exactly that length
        drop(unsafe { Box::from_raw(core::ptr::slice_from_raw_parts_mut(base.as_ptr(), size)) });
        self.state().frees += 1;
    }

    fn query_system_information(
        &self,
        class: u32,
        buffer: &mut [u8],
        return_length: &mut u32,
    ) -> NtStatus {
        let mut state = self.state();
        state.query_calls += 1;

        if let Some(status) = state.system_information_status {
            return status;
        }

        let schema = match class {
            SYSTEM_HANDLE_INFORMATION => RecordSchema::LEGACY,
            SYSTEM_EXTENDED_HANDLE_INFORMATION => RecordSchema::EXTENDED,
            _ => return STATUS_INVALID_PARAMETER,
        };

        let entries: Vec<HandleEntry> = state
            .remote
            .iter()
            .map(|remote| HandleEntry {
                pid: remote.pid,
                handle: remote.handle,
                object_type: 0x11,
                granted_access: 0x001F_0001,
            })
            .collect();

        let needed = schema.encode(&entries, buffer);
        *return_length = needed as u32;

        if state.mismatches_left > 0 {
            state.mismatches_left -= 1;
            return STATUS_INFO_LENGTH_MISMATCH;
        }
        if buffer.len() < needed {
            return STATUS_INFO_LENGTH_MISMATCH;
        }
        STATUS_SUCCESS
    }

    fn open_process(&self, pid: u32, _access: ProcessAccess) -> Result<Handle> {
        let mut state = self.state();
        state.open_calls += 1;

        if !state.processes.iter().any(|process| process.pid == pid) {
            return Err(Error::NtStatus(STATUS_INVALID_CID));
        }
        if state.denied.contains(&pid) {
            return Err(Error::NtStatus(STATUS_ACCESS_DENIED));
        }
        Ok(state.issue(LocalObject::Process(pid)))
    }

    fn duplicate_object(
        &self,
        source_process: Handle,
        source_handle: Handle,
        _desired_access: u32,
        options: DuplicateOptions,
    ) -> Result<Handle> {
        let mut state = self.state();
        state.duplicate_calls += 1;

        let Some(LocalObject::Process(pid)) = state.local.get(&source_process).cloned() else {
            return Err(Error::NtStatus(STATUS_INVALID_HANDLE));
        };
        let Some(index) = state.remote_index(pid, source_handle) else {
            return Err(Error::NtStatus(STATUS_INVALID_HANDLE));
        };

        let name = if options.contains(DuplicateOptions::CLOSE_SOURCE) {
            if state.refuse_close_source.contains(&(pid, source_handle)) {
                return Err(Error::NtStatus(STATUS_ACCESS_DENIED));
            }
            state.closed_remote.push((pid, source_handle));
            state.remote.remove(index).name
        } else {
            if state.refuse_duplicate.contains(&(pid, source_handle)) {
                return Err(Error::NtStatus(STATUS_NOT_SUPPORTED));
            }
            state.remote[index].name.clone()
        };

        Ok(state.issue(LocalObject::Duplicate { name }))
    }

    fn query_object(
        &self,
        handle: Handle,
        class: u32,
        buffer: &mut [u8],
        return_length: &mut u32,
    ) -> NtStatus {
        let mut state = self.state();
        state.query_calls += 1;

        if class != OBJECT_NAME_INFORMATION {
            return STATUS_INVALID_PARAMETER;
        }
        let Some(LocalObject::Duplicate { name }) = state.local.get(&handle) else {
            return STATUS_INVALID_HANDLE;
        };

        // UNICODE_STRING header, with the characters right behind it
        let chars: Vec<u8> = name
            .as_deref()
            .unwrap_or_default()
            .encode_utf16()
            .flat_map(u16::to_le_bytes)
            .collect();
        let needed = 16 + chars.len() + 2;
        *return_length = needed as u32;
        if buffer.len() < needed {
            return STATUS_INFO_LENGTH_MISMATCH;
        }

        buffer[..needed].fill(0);
        if !chars.is_empty() {
            let address = buffer.as_ptr() as usize + 16;
            buffer[0..2].copy_from_slice(&(chars.len() as u16).to_le_bytes());
            buffer[2..4].copy_from_slice(&(chars.len() as u16 + 2).to_le_bytes());
            buffer[8..16].copy_from_slice(&(address as u64).to_le_bytes());
            buffer[16..16 + chars.len()].copy_from_slice(&chars);
        }
        STATUS_SUCCESS
    }

    fn close(&self, handle: Handle) -> NtStatus {
        let mut state = self.state();
        state.close_calls += 1;

        if state.local.remove(&handle).is_none() {
            state.invalid_closes += 1;
            return STATUS_INVALID_HANDLE;
        }
        STATUS_SUCCESS
    }

    fn open_process_token(&self, _access: TokenAccess) -> Result<Handle> {
        let mut state = self.state();
        state.open_calls += 1;
        Ok(state.issue(LocalObject::Token))
    }

    fn lookup_privilege_value(&self, name: &str) -> Option<Luid> {
        (name == SE_DEBUG_NAME).then_some(Luid {
            low_part: 20,
            high_part: 0,
        })
    }

    fn adjust_token_privileges(&self, token: Handle, _luid: Luid, enable: bool) -> NtStatus {
        let mut state = self.state();
        if state.local.get(&token) != Some(&LocalObject::Token) {
            return STATUS_INVALID_HANDLE;
        }
        if state.privilege_status != STATUS_SUCCESS {
            return state.privilege_status;
        }
        state.debug_privilege = enable;
        STATUS_SUCCESS
    }

    fn processes(&self) -> Result<Vec<ProcessView>> {
        let state = self.state();
        if state.fail_process_listing {
            return Err(Error::NtStatus(STATUS_ACCESS_DENIED));
        }
        Ok(state.processes.clone())
    }
}
