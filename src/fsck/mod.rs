pub mod fsck;
pub mod fsck_backend;
pub mod fsck_types;
pub mod mock;

mod file;
mod freelist;
mod tree;

pub use freelist::FreeTable;
pub use tree::TraversalContext;
