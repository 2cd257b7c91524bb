/// Namespaced Redis cache with graceful degradation.
///
/// Every key passed to this wrapper is stored under the namespace given at
/// construction (`"cppref:v1:"` + key). All operations return `Option<T>` or
/// `bool`: on any Redis error the operation logs a warning and reports a miss,
/// so callers fall through to compute from source. The system is fully
/// functional without Redis.
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::CommonError;

const SCAN_BATCH: usize = 100;

pub struct RedisCache {
    client: Option<redis::Client>,
    namespace: String,
}

impl RedisCache {
    /// Create a cache for `url` under `namespace`. If the URL is `None` or invalid,
    /// returns a `RedisCache` whose operations are all no-ops.
    pub fn new(url: Option<&str>, namespace: &str) -> Self {
        let client = url.and_then(|u| {
            redis::Client::open(u)
                .inspect_err(|e| warn!(error = %e, url = u, "failed to create redis client, cache disabled"))
                .ok()
        });
        Self {
            client,
            namespace: namespace.to_string(),
        }
    }

    /// Whether a client was configured at all (says nothing about reachability).
    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// Send a PING. Returns `true` if Redis is reachable.
    pub async fn is_available(&self) -> bool {
        let Ok(mut conn) = self.connection().await else {
            return false;
        };
        let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        result.is_ok()
    }

    /// Full key for `key` within this cache's namespace.
    pub fn key(&self, key: &str) -> String {
        format!("{}{key}", self.namespace)
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CommonError> {
        let client = self.client.as_ref().ok_or(CommonError::RedisUnavailable)?;
        Ok(client.get_multiplexed_async_connection().await?)
    }

    /// Connection for a single operation, or `None` (with a warning when Redis is
    /// configured but unreachable).
    async fn try_connection(&self) -> Option<MultiplexedConnection> {
        match self.connection().await {
            Ok(conn) => Some(conn),
            Err(CommonError::RedisUnavailable) => None,
            Err(e) => {
                warn!(error = %e, "redis connection failed");
                None
            }
        }
    }

    /// Get a raw string value. `None` if Redis is unavailable or the key doesn't exist.
    pub async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.try_connection().await?;
        let key = self.key(key);
        conn.get::<_, Option<String>>(&key)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis GET failed"))
            .ok()
            .flatten()
    }

    /// Set a raw string value, with an expiry when `ttl_secs` is given.
    pub async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> bool {
        let Some(mut conn) = self.try_connection().await else {
            return false;
        };
        let key = self.key(key);
        let result = match ttl_secs {
            Some(ttl) => conn.set_ex::<_, _, ()>(&key, value, ttl).await,
            None => conn.set::<_, _, ()>(&key, value).await,
        };
        result
            .inspect_err(|e| warn!(error = %e, key, "redis SET failed"))
            .is_ok()
    }

    /// Get and deserialize a JSON value. Undecodable values count as a miss.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let json = self.get(key).await?;
        serde_json::from_str(&json)
            .inspect_err(|e| warn!(error = %e, key, "cache deserialization failed"))
            .ok()
    }

    /// Serialize and store a JSON value.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: Option<u64>) -> bool {
        match serde_json::to_string(value) {
            Ok(json) => self.set(key, &json, ttl_secs).await,
            Err(e) => {
                warn!(error = %e, key, "cache serialization failed");
                false
            }
        }
    }

    /// Delete every key in this cache's namespace using SCAN (not KEYS, which blocks).
    pub async fn clear_namespace(&self) -> bool {
        let Some(mut conn) = self.try_connection().await else {
            return false;
        };

        let pattern = format!("{}*", self.namespace);
        let mut cursor: u64 = 0;
        loop {
            let scanned: Result<(u64, Vec<String>), _> = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await;
            let (next_cursor, keys) = match scanned {
                Ok(result) => result,
                Err(e) => {
                    warn!(error = %e, pattern, "redis SCAN failed");
                    return false;
                }
            };

            if !keys.is_empty() {
                if let Err(e) = conn.del::<_, ()>(&keys).await {
                    warn!(error = %e, "redis batch DEL failed during namespace clear");
                    return false;
                }
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::RedisCache;

    #[test]
    fn keys_are_namespaced() {
        let cache = RedisCache::new(None, "cppref:v1:");
        assert_eq!(cache.key("search:abc"), "cppref:v1:search:abc");
    }

    #[test]
    fn invalid_url_disables_cache() {
        let cache = RedisCache::new(Some("not a url"), "ns:");
        assert!(!cache.is_configured());
    }

    #[tokio::test]
    async fn unconfigured_cache_is_a_no_op() {
        let cache = RedisCache::new(None, "ns:");
        assert!(!cache.is_available().await);
        assert!(cache.get("k").await.is_none());
        assert!(!cache.set("k", "v", Some(10)).await);
        assert!(!cache.set_json("k", &vec![1, 2, 3], None).await);
        assert!(cache.get_json::<Vec<u32>>("k").await.is_none());
        assert!(!cache.clear_namespace().await);
    }
}
