//! Memory records and the store collaborator the engine works against.

pub mod inmemory;
pub mod record;
pub mod store;

pub use inmemory::InMemoryStore;
pub use record::{MemoryKind, MemoryRecord};
pub use store::MemoryStore;
