pub mod adapter;
pub mod index;
pub mod memory_store;
pub mod model;
pub mod redis_store;

pub use adapter::{AdapterError, StoreAdapter};
pub use index::{IndexError, SimilarityIndex};
pub use memory_store::InMemoryStore;
pub use model::{ArticleRecord, DuplicatePair, JaccardRecord};
pub use redis_store::RedisStore;
