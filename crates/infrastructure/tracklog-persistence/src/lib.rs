mod api;
mod codec;
mod error;
mod maintenance;
mod memory;
mod redb_store;

pub use api::*;
pub use error::*;
pub use memory::MemoryStore;
pub use redb_store::RedbLocalStore;
