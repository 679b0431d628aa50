use std::sync::OnceLock;

use super::utils::{get_export, get_module_base};

static SYSCALLS: OnceLock<Option<Syscalls>> = OnceLock::new();

/// The system call numbers of the running ntdll, resolved once.
///
/// Returns `None` if ntdll is not loaded or any stub looks hooked.
pub fn syscalls() -> Option<&'static Syscalls> {
    SYSCALLS.get_or_init(Syscalls::resolve).as_ref()
}

macro_rules! syscalls {
    ($($field:ident => $name:literal),* $(,)?) => {
        pub struct Syscalls {
            $(pub $field: u32,)*
        }

        impl Syscalls {
            fn resolve() -> Option<Self> {
                let ntdll = get_module_base("ntdll.dll")?;
                Some(Self {
                    $($field: get_syscall_id(ntdll, $name)?,)*
                })
            }
        }
    };
}

syscalls! {
    nt_open_process => "NtOpenProcess",
    nt_open_process_token => "NtOpenProcessToken",
    nt_adjust_privileges_token => "NtAdjustPrivilegesToken",

    nt_allocate_virtual_memory => "NtAllocateVirtualMemory",
    nt_free_virtual_memory => "NtFreeVirtualMemory",

    nt_query_system_information => "NtQuerySystemInformation",
    nt_duplicate_object => "NtDuplicateObject",
    nt_query_object => "NtQueryObject",

    nt_close => "NtClose",
}

fn get_syscall_id(ntdll: *const u8, name: &str) -> Option<u32> {
    let id = get_export(ntdll, name).and_then(extract_syscall_id);
    if id.is_none() {
        tracing::debug!(name, "no syscall stub");
    }
    id
}

fn extract_syscall_id(func: *const u8) -> Option<u32> {
    // mov r10, rcx; mov eax, imm32
    const STUB: [u8; 4] = [0x4C, 0x8B, 0xD1, 0xB8];

    // Safety:
    // `func` is an export of the mapped ntdll image; every syscall stub is
    // longer than the eight bytes read here
    unsafe {
        let prologue = func.cast::<[u8; 4]>().read_unaligned();
        (prologue == STUB).then(|| func.add(4).cast::<u32>().read_unaligned())
    }
}
