//! Redis-backed [`StoreAdapter`] implementation.
//!
//! Holds an `r2d2::Pool<redis::Client>` rather than a single connection
//! behind a lock, following the same "hold a pool, not a connection" shape
//! as the teacher's `QueueStore` (`queue/store.rs`), which keeps a `PgPool`
//! and checks a connection out per query rather than per worker lifetime.
//! Each call to [`RedisStore::with_conn`] checks a connection out of the
//! pool fresh on every retry attempt and drops it before the next backoff
//! sleep, so nothing is held across I/O or across a sleep: spec.md §5's
//! "no component holds a lock across I/O" invariant, and §9's "acquire a
//! handle at partition start with scoped release on partition exit"
//! guidance, both apply per call rather than per process.

use redis::Commands;
use tracing::{error, warn};

use crate::util::error::{is_fatal, is_retryable};
use crate::util::retry::{RetryConfig, with_retry};

use super::adapter::{AdapterError, StoreAdapter};

pub struct RedisStore {
    pool: r2d2::Pool<redis::Client>,
    retry: RetryConfig,
}

impl RedisStore {
    /// Build a connection pool against `server` (a `redis://` URL).
    ///
    /// # Errors
    /// Returns `AdapterError::Unavailable` if the client cannot be
    /// constructed or the pool cannot establish its first connection.
    pub fn connect(server: &str) -> Result<Self, AdapterError> {
        let client = redis::Client::open(server)
            .map_err(|error| AdapterError::Unavailable(anyhow::Error::new(error)))?;
        let pool = r2d2::Pool::builder()
            .max_size(num_cpus::get() as u32)
            .build(client)
            .map_err(|error| AdapterError::Unavailable(anyhow::Error::new(error)))?;
        Ok(Self {
            pool,
            retry: RetryConfig::new(3, 250, 10_000),
        })
    }

    fn with_conn<T>(
        &self,
        mut op: impl FnMut(&mut redis::Connection) -> Result<T, redis::RedisError>,
    ) -> Result<T, AdapterError> {
        with_retry(self.retry, || {
            let mut conn = self.pool.get().map_err(anyhow::Error::new)?;
            op(&mut conn).map_err(anyhow::Error::new)
        })
        .map_err(|error| {
            if is_fatal(&error) {
                error!(error = %error, "adapter call failed with a non-retryable, fatal error");
            } else if is_retryable(&error) {
                warn!(error = %error, "adapter call failed after exhausting retries");
            }
            AdapterError::Unavailable(error)
        })
    }
}

impl StoreAdapter for RedisStore {
    fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), AdapterError> {
        self.with_conn(|conn| conn.hset(key, field, value))
    }

    fn hash_set_multiple(&self, key: &str, fields: &[(&str, &str)]) -> Result<(), AdapterError> {
        self.with_conn(|conn| conn.hset_multiple(key, fields))
    }

    fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, AdapterError> {
        self.with_conn(|conn| conn.hget(key, field))
    }

    fn hash_get_all(&self, key: &str) -> Result<Vec<(String, String)>, AdapterError> {
        self.with_conn(|conn| {
            let map: std::collections::HashMap<String, String> = conn.hgetall(key)?;
            Ok(map.into_iter().collect())
        })
    }

    fn hash_contains(&self, key: &str, field: &str) -> Result<bool, AdapterError> {
        self.with_conn(|conn| conn.hexists(key, field))
    }

    fn set_add(&self, key: &str, member: &str) -> Result<(), AdapterError> {
        self.with_conn(|conn| conn.sadd(key, member))
    }

    fn set_members(&self, key: &str) -> Result<Vec<String>, AdapterError> {
        self.with_conn(|conn| conn.smembers(key))
    }

    fn set_size(&self, key: &str) -> Result<usize, AdapterError> {
        self.with_conn(|conn| conn.scard(key))
    }
}
