/// Redis caching layer for the cppref-search server.
///
/// All operations degrade gracefully: if Redis is unavailable, reads miss and
/// writes are dropped, and callers compute from the in-memory index.
///
/// Key schema (namespaced under `cppref:v1:`):
/// - `search:{sha256(fingerprint|request)}` — JSON-serialized SearchSymbolsResponse (TTL: 3600s)
use sha2::{Digest, Sha256};

use mcp_common::mcp_api::SearchSymbolsResponse;
use mcp_common::redis::RedisCache;

use crate::search::SearchRequest;

pub const KEY_NAMESPACE: &str = "cppref:v1:";
const SEARCH_TTL_SECS: u64 = 3600;

pub struct SymbolCache {
    redis: RedisCache,
}

impl SymbolCache {
    pub fn new(redis: RedisCache) -> Self {
        Self { redis }
    }

    /// A cache that never stores anything.
    pub fn disabled() -> Self {
        Self::new(RedisCache::new(None, KEY_NAMESPACE))
    }

    pub async fn is_available(&self) -> bool {
        self.redis.is_available().await
    }

    pub async fn get_search_results(
        &self,
        fingerprint: &str,
        request: &SearchRequest,
    ) -> Option<SearchSymbolsResponse> {
        self.redis.get_json(&search_key(fingerprint, request)).await
    }

    pub async fn set_search_results(
        &self,
        fingerprint: &str,
        request: &SearchRequest,
        response: &SearchSymbolsResponse,
    ) {
        self.redis
            .set_json(&search_key(fingerprint, request), response, Some(SEARCH_TTL_SECS))
            .await;
    }

    /// Delete all cached data. Used after the search data is reloaded.
    pub async fn invalidate_all(&self) {
        self.redis.clear_namespace().await;
    }
}

/// Deterministic cache key for a search request against one version of the data.
pub fn search_key(fingerprint: &str, request: &SearchRequest) -> String {
    let mut hasher = Sha256::new();
    for part in [
        fingerprint,
        request.query.as_str(),
        if request.case_sensitive { "cs" } else { "ci" },
        if request.prefix { "prefix" } else { "substring" },
        request.section.as_deref().unwrap_or(""),
        request.limit.to_string().as_str(),
    ] {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    format!("search:{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(query: &str) -> SearchRequest {
        SearchRequest {
            query: query.to_string(),
            case_sensitive: false,
            prefix: false,
            section: None,
            limit: 50,
        }
    }

    #[test]
    fn search_key_is_deterministic() {
        assert_eq!(search_key("fp", &request("vec")), search_key("fp", &request("vec")));
        assert!(search_key("fp", &request("vec")).starts_with("search:"));
    }

    #[test]
    fn search_key_depends_on_every_field() {
        let base = search_key("fp", &request("vec"));
        assert_ne!(base, search_key("other", &request("vec")));
        assert_ne!(base, search_key("fp", &request("vect")));

        let mut r = request("vec");
        r.case_sensitive = true;
        assert_ne!(base, search_key("fp", &r));

        let mut r = request("vec");
        r.prefix = true;
        assert_ne!(base, search_key("fp", &r));

        let mut r = request("vec");
        r.section = Some("classes".to_string());
        assert_ne!(base, search_key("fp", &r));

        let mut r = request("vec");
        r.limit = 10;
        assert_ne!(base, search_key("fp", &r));
    }

    #[tokio::test]
    async fn disabled_cache_misses() {
        let cache = SymbolCache::disabled();
        assert!(!cache.is_available().await);
        assert!(cache.get_search_results("fp", &request("vec")).await.is_none());
        cache.invalidate_all().await;
    }
}
