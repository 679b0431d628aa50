use core::{arch::asm, ffi::CStr, mem::offset_of};

use super::structs::{
    ImageDosHeader, ImageExportDirectory, ImageNtHeaders64, LdrModule, ProcessEnvBlock,
    UnicodeString,
};

#[inline(always)]
pub fn get_peb() -> *const ProcessEnvBlock {
    let peb: *const ProcessEnvBlock;
    unsafe {
        asm!(
            "mov {}, gs:[0x60]",
            out(reg) peb,
            options(nostack, preserves_flags, readonly),
        );
    }
    peb
}

/// Copies a `UNICODE_STRING` whose buffer lives in the current process.
pub fn unicode_to_string(u: &UnicodeString) -> String {
    if u.buffer.is_null() || u.length == 0 {
        return String::new();
    }

    let len = (u.length / 2) as usize;
    let slice = unsafe { core::slice::from_raw_parts(u.buffer, len) };
    String::from_utf16_lossy(slice)
}

/// Finds a module loaded in the current process by its file name.
pub fn get_module_base(name: &str) -> Option<*const u8> {
    unsafe {
        let peb = get_peb();
        if peb.is_null() || (*peb).ldr.is_null() {
            return None;
        }

        let head = &(*(*peb).ldr).in_memory_order_module_list as *const _;
        let mut current = (*head).next;

        while !current.is_null() && current != head {
            let entry = current
                .byte_sub(offset_of!(LdrModule, in_memory_order_module_list))
                .cast::<LdrModule>();

            if unicode_to_string(&(*entry).base_dll_name).eq_ignore_ascii_case(name) {
                return Some((*entry).base_address);
            }
            current = (*current).next;
        }

        None
    }
}

/// Looks up an exported function by name in a mapped PE image.
pub fn get_export(base: *const u8, name: &str) -> Option<*const u8> {
    if base.is_null() {
        return None;
    }

    unsafe {
        let dos_header = base.cast::<ImageDosHeader>();
        let nt_headers = base
            .add((*dos_header).e_lfanew as usize)
            .cast::<ImageNtHeaders64>();

        let export_dir_rva = (*nt_headers).data_directory[0].virtual_address;
        if export_dir_rva == 0 {
            return None;
        }

        let export_dir = base
            .add(export_dir_rva as usize)
            .cast::<ImageExportDirectory>();
        let names = base.add((*export_dir).address_of_names as usize).cast::<u32>();
        let ordinals = base
            .add((*export_dir).address_of_name_ordinals as usize)
            .cast::<u16>();
        let functions = base
            .add((*export_dir).address_of_functions as usize)
            .cast::<u32>();

        (0..(*export_dir).number_of_names as usize).find_map(|idx| {
            let export_name = CStr::from_ptr(base.add(*names.add(idx) as usize).cast());
            if export_name.to_bytes() != name.as_bytes() {
                return None;
            }

            let ordinal = *ordinals.add(idx) as usize;
            if ordinal >= (*export_dir).number_of_functions as usize {
                return None;
            }
            Some(base.add(*functions.add(ordinal) as usize))
        })
    }
}
