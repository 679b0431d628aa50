pub mod handle;
pub mod process;

pub use handle::{
    HandleEntry, HandleIterator, HandleSnapshot, HandleTable, RecordSchema, SnapshotConfig,
};
pub use process::{ProcessView, find_pids_by_name, list_processes};
