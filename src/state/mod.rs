pub mod store;
pub mod cache;
pub mod sled_store;
pub mod sqlite_store;
pub mod factory;

pub use store::{InMemoryStore, StatusStore};
pub use cache::{AppCache, StatusCache};
pub use sled_store::SledStore;
pub use sqlite_store::SqliteStore;
pub use factory::{create_store, create_in_memory_store};
