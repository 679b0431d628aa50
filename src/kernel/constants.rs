use super::{Handle, NtStatus};

pub const STATUS_SUCCESS: NtStatus = 0x0;
pub const STATUS_NOT_ALL_ASSIGNED: NtStatus = 0x0000_0106;
pub const STATUS_INFO_LENGTH_MISMATCH: NtStatus = 0xC0000004u32 as NtStatus;
pub const STATUS_INVALID_HANDLE: NtStatus = 0xC0000008u32 as NtStatus;
pub const STATUS_INVALID_PARAMETER: NtStatus = 0xC000000Du32 as NtStatus;
pub const STATUS_NO_MEMORY: NtStatus = 0xC0000017u32 as NtStatus;
pub const STATUS_ACCESS_DENIED: NtStatus = 0xC0000022u32 as NtStatus;
pub const STATUS_NOT_SUPPORTED: NtStatus = 0xC00000BBu32 as NtStatus;
pub const STATUS_INVALID_CID: NtStatus = 0xC000000Bu32 as NtStatus;
pub const STATUS_NO_SUCH_PRIVILEGE: NtStatus = 0xC0000060u32 as NtStatus;

pub const CURRENT_PROCESS_HANDLE: Handle = -1isize as Handle; // pseudo handle

// SYSTEM_INFORMATION_CLASS
pub const SYSTEM_PROCESS_INFORMATION: u32 = 0x05;
pub const SYSTEM_HANDLE_INFORMATION: u32 = 0x10;
pub const SYSTEM_EXTENDED_HANDLE_INFORMATION: u32 = 0x40;

// OBJECT_INFORMATION_CLASS
pub const OBJECT_NAME_INFORMATION: u32 = 0x1;

pub const SE_DEBUG_NAME: &str = "SeDebugPrivilege";
