pub mod buffer;
pub mod debug_privilege;
pub mod handle;

pub use buffer::{KernelBuffer, query_aligned};
pub use debug_privilege::enable_debug_privilege;
pub use handle::SafeHandle;
