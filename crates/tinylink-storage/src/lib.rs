pub mod memory;
pub mod mysql;

pub use memory::InMemoryStore;
pub use mysql::MySqlStore;
pub use tinylink_core::store::{MappingStore, ReadMappingStore, Result};
pub use tinylink_core::StorageError;
