use crate::{
    kernel::{
        DuplicateOptions, Handle, Kernel,
        constants::{OBJECT_NAME_INFORMATION, STATUS_SUCCESS},
    },
    utils::SafeHandle,
};

/// Size of the scratch buffer `ObjectNameInformation` is queried into.
pub const NAME_BUFFER_SIZE: usize = 0x1000;

/// Names this long (in UTF-16 units) are treated as corrupt.
const MAX_NAME_CHARS: usize = 2048;

const POINTER_SIZE: usize = size_of::<usize>();

/// Where the characters of an `OBJECT_NAME_INFORMATION` may start.
///
/// The structure is a `UNICODE_STRING` whose buffer normally points just
/// past itself, but the pointer slot moves with packing and some builds
/// leave it null, so the candidates are tried in order.
#[derive(Clone, Copy, Debug)]
enum NameLocation {
    /// A pointer stored at this offset, valid only if it points into the buffer.
    Pointer(usize),
    /// The characters follow the header directly at this offset.
    Inline(usize),
}

// On x64 the Buffer field sits at 8 and bytes 4..8 are padding, so slot 4
// overlaps the padding and half the real pointer. It only holds a pointer in
// packed layouts and is tried after the aligned slot.
const NAME_LOCATIONS: [NameLocation; 4] = [
    NameLocation::Pointer(POINTER_SIZE),
    NameLocation::Pointer(4),
    NameLocation::Inline(12),
    NameLocation::Inline(16),
];

impl NameLocation {
    /// Returns the offset of a `length`-byte span fully inside `buffer`.
    fn locate(self, buffer: &[u8], length: usize) -> Option<usize> {
        let start = match self {
            NameLocation::Pointer(at) => {
                let raw = buffer.get(at..at + POINTER_SIZE)?;
                let address = usize::from_le_bytes(raw.try_into().ok()?);
                address.checked_sub(buffer.as_ptr() as usize)?
            }
            NameLocation::Inline(at) => at,
        };

        (start.checked_add(length)? <= buffer.len()).then_some(start)
    }
}

/// Extracts the name from a filled `ObjectNameInformation` buffer.
pub(crate) fn decode_name(buffer: &[u8]) -> Option<String> {
    let length = u16::from_le_bytes([*buffer.first()?, *buffer.get(1)?]) as usize;
    if length == 0 || length % 2 != 0 || length >= buffer.len() {
        return None;
    }

    let start = NAME_LOCATIONS
        .iter()
        .find_map(|location| location.locate(buffer, length))?;

    let chars = length / 2;
    if chars == 0 || chars >= MAX_NAME_CHARS {
        return None;
    }

    let units: Vec<u16> = buffer[start..start + length]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    Some(String::from_utf16_lossy(&units))
}

/// Retrieves the name of the object behind `handle`, owned by `process`.
///
/// The handle is duplicated into the current process with no access, queried
/// and closed again; the remote handle is left untouched. Any failure along
/// the way, including objects that refuse duplication or have no name,
/// yields `None`.
///
/// # Access Rights
///
/// `process` must have been opened with
/// [`crate::kernel::ProcessAccess::DUP_HANDLE`].
pub fn resolve_name<K: Kernel + ?Sized>(
    kernel: &K,
    process: Handle,
    handle: Handle,
) -> Option<String> {
    let local = SafeHandle::duplicate(kernel, process, handle, DuplicateOptions::NONE).ok()?;

    let mut buffer = [0u8; NAME_BUFFER_SIZE];
    let mut returned = 0u32;
    let status = kernel.query_object(*local, OBJECT_NAME_INFORMATION, &mut buffer, &mut returned);

    if status != STATUS_SUCCESS {
        return None;
    }
    decode_name(&buffer)
}
