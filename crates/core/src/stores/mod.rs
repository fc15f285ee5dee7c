pub mod sqlite;

pub use sqlite::SqliteChunkStore;
