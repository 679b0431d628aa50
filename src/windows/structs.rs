use core::ffi::c_void;

use crate::kernel::{Handle, Luid};

#[repr(C)]
#[derive(Clone, Copy)]
pub struct ListEntry {
    pub next: *const ListEntry,
    pub prev: *const ListEntry,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct UnicodeString {
    pub length: u16,
    pub max_length: u16,
    pub buffer: *const u16,
}

/// Leading part of `LDR_DATA_TABLE_ENTRY`.
#[repr(C)]
pub struct LdrModule {
    pub in_load_order_module_list: ListEntry,
    pub in_memory_order_module_list: ListEntry,
    pub in_initialization_order_module_list: ListEntry,
    pub base_address: *const u8,
    pub entry_point: *const c_void,
    pub size_of_image: u32,
    pub full_dll_name: UnicodeString,
    pub base_dll_name: UnicodeString,
}

#[repr(C)]
pub struct PebLoaderData {
    length: u32,
    initialized: u8,
    ss_handle: *mut c_void,
    pub in_load_order_module_list: ListEntry,
    pub in_memory_order_module_list: ListEntry,
    pub in_initialization_order_module_list: ListEntry,
}

#[repr(C)]
pub struct ProcessEnvBlock {
    reserved1: [u8; 2],
    pub being_debugged: u8,
    reserved2: [u8; 1],
    reserved3: [*const c_void; 2],
    pub ldr: *const PebLoaderData, // +0x18
}

#[repr(C)]
pub struct ImageDosHeader {
    pub e_magic: u16,
    reserved: [u16; 29],
    pub e_lfanew: u32, // +0x3C
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct ImageDataDirectory {
    pub virtual_address: u32,
    pub size: u32,
}

/// `IMAGE_NT_HEADERS64` up to the data directories.
#[repr(C)]
pub struct ImageNtHeaders64 {
    pub signature: u32,
    file_header: [u8; 20],
    optional_header: [u8; 112],
    pub data_directory: [ImageDataDirectory; 16],
}

#[repr(C)]
pub struct ImageExportDirectory {
    pub characteristics: u32,
    pub time_date_stamp: u32,
    pub major_version: u16,
    pub minor_version: u16,
    pub name: u32,
    pub base: u32,
    pub number_of_functions: u32,
    pub number_of_names: u32,
    pub address_of_functions: u32,
    pub address_of_names: u32,
    pub address_of_name_ordinals: u32,
}

/// Leading part of `SYSTEM_PROCESS_INFORMATION`; thread records and
/// counters past the process id are never read.
#[repr(C)]
pub struct SystemProcessInformation {
    pub next_entry_offset: u32,
    pub number_of_threads: u32,
    pub working_set_private_size: u64,
    pub hard_fault_count: u32,
    pub number_of_threads_high_watermark: u32,
    pub cycle_time: u64,
    pub create_time: i64,
    pub user_time: i64,
    pub kernel_time: i64,
    pub image_name: UnicodeString,
    pub base_priority: i32,
    pub unique_process_id: Handle,
}

#[repr(C)]
pub struct ClientId {
    pub unique_process: usize,
    pub unique_thread: usize,
}

#[repr(C)]
pub struct ObjectAttributes {
    pub length: u32,
    pub root_directory: Handle,
    pub object_name: *mut UnicodeString,
    pub attributes: u32,
    pub security_descriptor: *mut c_void,
    pub security_quality_of_service: *mut c_void,
}

impl ObjectAttributes {
    /// Attributes naming nothing, as required when opening by client id.
    pub fn empty() -> Self {
        Self {
            length: size_of::<Self>() as u32,
            root_directory: 0,
            object_name: core::ptr::null_mut(),
            attributes: 0,
            security_descriptor: core::ptr::null_mut(),
            security_quality_of_service: core::ptr::null_mut(),
        }
    }
}

#[repr(C)]
pub struct TokenPrivileges {
    pub privilege_count: u32,
    pub privileges: [LuidAndAttributes; 1],
}

#[repr(C)]
pub struct LuidAndAttributes {
    pub luid: Luid,
    pub attributes: u32,
}
