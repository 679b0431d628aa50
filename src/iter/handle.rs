use crate::{
    error::{Error, Result},
    kernel::{
        Handle, Kernel,
        constants::{
            STATUS_INFO_LENGTH_MISMATCH, STATUS_SUCCESS, SYSTEM_EXTENDED_HANDLE_INFORMATION,
            SYSTEM_HANDLE_INFORMATION,
        },
    },
    utils::KernelBuffer,
};

const MIB: usize = 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Width {
    U8,
    U16,
    U32,
    U64,
}

impl Width {
    const fn len(self) -> usize {
        match self {
            Width::U8 => 1,
            Width::U16 => 2,
            Width::U32 => 4,
            Width::U64 => 8,
        }
    }
}

/// A little-endian integer at a fixed offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Field {
    offset: usize,
    width: Width,
}

impl Field {
    const fn new(offset: usize, width: Width) -> Self {
        Self { offset, width }
    }

    fn read(self, bytes: &[u8]) -> Option<u64> {
        let end = self.offset.checked_add(self.width.len())?;
        let raw = bytes.get(self.offset..end)?;

        Some(match self.width {
            Width::U8 => raw[0] as u64,
            Width::U16 => u16::from_le_bytes([raw[0], raw[1]]) as u64,
            Width::U32 => u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as u64,
            Width::U64 => u64::from_le_bytes(raw.try_into().ok()?),
        })
    }

    #[cfg(test)]
    fn write(self, bytes: &mut [u8], value: u64) {
        let len = self.width.len();
        bytes[self.offset..self.offset + len].copy_from_slice(&value.to_le_bytes()[..len]);
    }
}

/// Binary layout of a whole-system handle dump.
///
/// Both layouts are the x64 ones. A dump is a header holding the entry count
/// followed by `count` records of `stride` bytes each, starting at
/// `header_len`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordSchema {
    /// The `SYSTEM_INFORMATION_CLASS` producing this layout.
    pub information_class: u32,
    pub header_len: usize,
    pub stride: usize,
    count: Field,
    owner: Field,
    object_type: Field,
    handle: Field,
    granted_access: Field,
}

impl RecordSchema {
    /// `SYSTEM_HANDLE_INFORMATION`: a 32-bit count, entries from offset 8.
    ///
    /// | offset | size | field                   |
    /// |--------|------|-------------------------|
    /// | 0      | 2    | `UniqueProcessId`       |
    /// | 2      | 2    | `CreatorBackTraceIndex` |
    /// | 4      | 1    | `ObjectTypeIndex`       |
    /// | 5      | 1    | `HandleAttributes`      |
    /// | 6      | 2    | `HandleValue`           |
    /// | 8      | 8    | `Object`                |
    /// | 16     | 4    | `GrantedAccess`         |
    ///
    /// The kernel truncates process ids and handle values to 16 bits here.
    pub const LEGACY: Self = Self {
        information_class: SYSTEM_HANDLE_INFORMATION,
        header_len: 8,
        stride: 24,
        count: Field::new(0, Width::U32),
        owner: Field::new(0, Width::U16),
        object_type: Field::new(4, Width::U8),
        handle: Field::new(6, Width::U16),
        granted_access: Field::new(16, Width::U32),
    };

    /// `SYSTEM_HANDLE_INFORMATION_EX`: a pointer-sized count and a reserved
    /// word, entries from offset 16.
    ///
    /// | offset | size | field                   |
    /// |--------|------|-------------------------|
    /// | 0      | 8    | `Object`                |
    /// | 8      | 8    | `UniqueProcessId`       |
    /// | 16     | 8    | `HandleValue`           |
    /// | 24     | 4    | `GrantedAccess`         |
    /// | 28     | 2    | `CreatorBackTraceIndex` |
    /// | 30     | 2    | `ObjectTypeIndex`       |
    /// | 32     | 4    | `HandleAttributes`      |
    /// | 36     | 4    | `Reserved`              |
    pub const EXTENDED: Self = Self {
        information_class: SYSTEM_EXTENDED_HANDLE_INFORMATION,
        header_len: 16,
        stride: 40,
        count: Field::new(0, Width::U64),
        owner: Field::new(8, Width::U64),
        object_type: Field::new(30, Width::U16),
        handle: Field::new(16, Width::U64),
        granted_access: Field::new(24, Width::U32),
    };

    #[inline(always)]
    fn owner_of(&self, record: &[u8]) -> u64 {
        self.owner.read(record).unwrap_or_default()
    }

    fn decode(&self, record: &[u8]) -> HandleEntry {
        HandleEntry {
            pid: self.owner_of(record) as u32,
            handle: self.handle.read(record).unwrap_or_default() as Handle,
            object_type: self.object_type.read(record).unwrap_or_default() as u16,
            granted_access: self.granted_access.read(record).unwrap_or_default() as u32,
        }
    }

    /// Serializes `entries` the way the kernel would, returning the number of
    /// bytes required. Nothing is written when `out` is too small.
    #[cfg(test)]
    pub(crate) fn encode(&self, entries: &[HandleEntry], out: &mut [u8]) -> usize {
        let needed = self.header_len + entries.len() * self.stride;
        if out.len() < needed {
            return needed;
        }

        self.count.write(out, entries.len() as u64);
        for (idx, entry) in entries.iter().enumerate() {
            let start = self.header_len + idx * self.stride;
            let record = &mut out[start..start + self.stride];
            self.owner.write(record, entry.pid as u64);
            self.handle.write(record, entry.handle as u64);
            self.object_type.write(record, entry.object_type as u64);
            self.granted_access.write(record, entry.granted_access as u64);
        }

        needed
    }
}

/// A single open handle, as reported by the system handle table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HandleEntry {
    /// Process ID that owns this handle.
    pub pid: u32,

    /// The handle value as seen in the owning process.
    pub handle: Handle,

    /// The type identifier of the object.
    pub object_type: u16,

    /// The raw access mask of the object handle.
    pub granted_access: u32,
}

/// A parsed view over a handle dump.
///
/// The declared entry count is clamped to what the buffer can actually hold,
/// so every record handed out lies inside `data`.
#[derive(Clone, Copy)]
pub struct HandleTable<'a> {
    data: &'a [u8],
    schema: RecordSchema,
    len: usize,
}

impl<'a> HandleTable<'a> {
    pub fn parse(data: &'a [u8], schema: RecordSchema) -> Self {
        let declared = schema.count.read(data).unwrap_or_default();
        let capacity = data.len().saturating_sub(schema.header_len) / schema.stride;
        let len = usize::try_from(declared).unwrap_or(usize::MAX).min(capacity);

        Self { data, schema, len }
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    fn record(&self, idx: usize) -> &'a [u8] {
        let start = self.schema.header_len + idx * self.schema.stride;
        &self.data[start..start + self.schema.stride]
    }

    pub fn entries(&self) -> HandleIterator<'a> {
        HandleIterator {
            table: *self,
            idx: 0,
        }
    }

    /// Iterates the entries owned by `pid`.
    pub fn owned_by(&self, pid: u32) -> impl Iterator<Item = HandleEntry> + 'a {
        let table = *self;
        (0..table.len)
            .map(move |idx| table.record(idx))
            .filter(move |record| table.schema.owner_of(record) == pid as u64)
            .map(move |record| table.schema.decode(record))
    }

    /// Calls `visit` for every entry owned by `owner`, in table order.
    pub fn for_each_entry(&self, owner: u32, mut visit: impl FnMut(HandleEntry)) {
        for idx in 0..self.len {
            let record = self.record(idx);
            if self.schema.owner_of(record) == owner as u64 {
                visit(self.schema.decode(record));
            }
        }
    }
}

/// Iterates all entries of a [`HandleTable`].
pub struct HandleIterator<'a> {
    table: HandleTable<'a>,
    idx: usize,
}

impl Iterator for HandleIterator<'_> {
    type Item = HandleEntry;

    fn next(&mut self) -> Option<Self::Item> {
        if self.idx >= self.table.len {
            return None;
        }

        let record = self.table.record(self.idx);
        self.idx += 1;

        Some(self.table.schema.decode(record))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.table.len - self.idx;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for HandleIterator<'_> {}

/// How a [`HandleSnapshot`] sizes its buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SnapshotConfig {
    /// Size of the first buffer handed to the kernel.
    pub initial_size: usize,

    /// Added on top of the size the kernel reports, since the table keeps
    /// growing between calls.
    pub headroom: usize,

    /// How many times a too-small buffer is regrown before giving up.
    pub max_retries: u32,

    pub schema: RecordSchema,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            initial_size: 128 * MIB,
            headroom: 4 * MIB,
            max_retries: 5,
            schema: RecordSchema::LEGACY,
        }
    }
}

/// A dump of every open handle on the system.
///
/// The buffer belongs to the snapshot and is released when it is dropped.
pub struct HandleSnapshot<'k, K: Kernel + ?Sized> {
    buffer: KernelBuffer<'k, K>,
    schema: RecordSchema,
}

impl<'k, K: Kernel + ?Sized> HandleSnapshot<'k, K> {
    /// Queries the system handle table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InfoUnavailable`] if the query fails, or still reports
    /// a length mismatch after `max_retries` regrowths, and
    /// [`Error::AllocationFailed`] if a buffer cannot be committed.
    pub fn capture(kernel: &'k K, config: &SnapshotConfig) -> Result<Self> {
        let mut size = config.initial_size;
        let mut retries = 0;

        loop {
            let mut buffer = KernelBuffer::allocate(kernel, size)?;
            let mut needed = 0u32;
            let status = kernel.query_system_information(
                config.schema.information_class,
                buffer.as_mut_slice(),
                &mut needed,
            );

            match status {
                STATUS_SUCCESS => {
                    return Ok(Self {
                        buffer,
                        schema: config.schema,
                    });
                }
                STATUS_INFO_LENGTH_MISMATCH if retries < config.max_retries => {
                    // the old buffer is released before the next allocation
                    retries += 1;
                    size = (needed as usize).saturating_add(config.headroom);
                    tracing::debug!(size, retries, "handle table outgrew buffer");
                }
                _ => return Err(Error::InfoUnavailable(status)),
            }
        }
    }

    pub fn table(&self) -> HandleTable<'_> {
        HandleTable::parse(self.buffer.as_slice(), self.schema)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.table().len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
