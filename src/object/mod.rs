pub mod close;
pub mod matcher;
pub mod name;

pub use close::{collect_handle_names, try_close_matching_handle};
pub use matcher::{AliasRule, NameMatcher};
pub use name::resolve_name;
