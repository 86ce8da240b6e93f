pub mod repository;
pub mod sqlite;

pub use repository::{
    CacheEntry, CacheScope, InMemoryRepository, LocalCacheRepository, Storage, StorageError,
};
pub use sqlite::{SqliteInitError, SqliteRepository};
