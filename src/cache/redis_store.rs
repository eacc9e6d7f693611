use super::ResultCache;
use super::types::QueryFingerprint;
use crate::error::CacheError;
use crate::models::Track;
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, warn};

const KEY_PREFIX: &str = "soundmap:";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);
const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Result cache kept in Redis. Entries are written with `SET .. EX ttl`, so
/// Redis expires them itself and `sweep` has nothing to do.
///
/// The connection is opened lazily and dropped after any failure, so a Redis
/// outage surfaces as [`CacheError::Unavailable`] per call and recovers once
/// the server is back.
pub struct RedisCache {
    client: redis::Client,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisCache {
    pub fn open(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(unavailable)?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
        })
    }

    /// Opens the connection now instead of on first use.
    pub async fn ping(&self) -> Result<(), CacheError> {
        let _pong: String = self
            .run(|mut conn| async move { redis::cmd("PING").query_async(&mut conn).await })
            .await?;
        Ok(())
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = timeout(CONNECT_TIMEOUT, self.client.get_multiplexed_async_connection())
            .await
            .map_err(|_| CacheError::Unavailable("redis connect timed out".to_string()))?
            .map_err(unavailable)?;
        debug!("Connected to redis");
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn run<T, F, Fut>(&self, command: F) -> Result<T, CacheError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut + Send,
        Fut: Future<Output = redis::RedisResult<T>> + Send,
        T: Send,
    {
        let conn = self.connection().await?;
        let result = match timeout(COMMAND_TIMEOUT, command(conn)).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => unavailable(e),
            Err(_) => CacheError::Unavailable("redis command timed out".to_string()),
        };
        *self.connection.lock().await = None;
        Err(result)
    }
}

fn unavailable(err: redis::RedisError) -> CacheError {
    CacheError::Unavailable(err.to_string())
}

fn redis_key(key: &QueryFingerprint) -> String {
    format!("{}{}", KEY_PREFIX, key)
}

/// Redis rejects `EX 0`; sub-second TTLs round up to one second.
fn ttl_seconds(ttl: Duration) -> u64 {
    (ttl.as_millis().div_ceil(1000) as u64).max(1)
}

#[async_trait]
impl ResultCache for RedisCache {
    async fn get(&self, key: &QueryFingerprint) -> Result<Option<Vec<Track>>, CacheError> {
        let redis_key = redis_key(key);
        let payload: Option<Vec<u8>> = self
            .run(|mut conn| async move { conn.get(redis_key).await })
            .await?;

        match payload {
            None => Ok(None),
            Some(bytes) => match serde_json::from_slice(&bytes) {
                Ok(tracks) => Ok(Some(tracks)),
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                    Ok(None)
                }
            },
        }
    }

    async fn put(
        &self,
        key: &QueryFingerprint,
        tracks: Vec<Track>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let payload = serde_json::to_vec(&tracks)
            .map_err(|e| CacheError::Unavailable(format!("encoding entry: {}", e)))?;
        let redis_key = redis_key(key);
        let seconds = ttl_seconds(ttl);
        self.run(|mut conn| async move { conn.set_ex::<_, _, ()>(redis_key, payload, seconds).await })
            .await
    }

    async fn expire(&self, key: &QueryFingerprint) -> Result<(), CacheError> {
        let redis_key = redis_key(key);
        self.run(|mut conn| async move { conn.del::<_, ()>(redis_key).await })
            .await
    }

    async fn sweep(&self) -> Result<usize, CacheError> {
        Ok(0)
    }
}
