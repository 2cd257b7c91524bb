/// Search engine for the cppref-search server.
///
/// Runs substring/prefix queries against the in-memory `SymbolIndex`, applies
/// the result limit, resolves relative URLs, and caches responses in Redis
/// when available. Cache keys include the data fingerprint, so a reload never
/// serves results from older data.
use std::sync::Arc;

use tracing::debug;
use url::Url;

use mcp_common::mcp_api::{SearchSymbolsParams, SearchSymbolsResponse, SymbolResult, SymbolTarget};

use crate::cache::SymbolCache;
use crate::error::AppError;
use crate::index::{MatchMode, QueryOptions, SymbolIndex};
use crate::model::IndexEntry;

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 500;

/// A validated search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub case_sensitive: bool,
    pub prefix: bool,
    pub section: Option<String>,
    pub limit: usize,
}

impl SearchRequest {
    pub fn from_params(params: SearchSymbolsParams) -> Result<Self, AppError> {
        Ok(Self {
            query: params.query,
            case_sensitive: params.case_sensitive.unwrap_or(false),
            prefix: params.prefix.unwrap_or(false),
            section: params
                .section
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            limit: resolve_limit(params.limit)?,
        })
    }
}

/// Resolve a tool's `limit` argument: default when absent, error when 0 or too large.
pub fn resolve_limit(limit: Option<u32>) -> Result<usize, AppError> {
    match limit {
        None => Ok(DEFAULT_LIMIT),
        Some(0) => Err(AppError::InvalidRequest("limit must be at least 1".to_string())),
        Some(n) if n as usize > MAX_LIMIT => Err(AppError::InvalidRequest(format!(
            "limit must be at most {MAX_LIMIT}"
        ))),
        Some(n) => Ok(n as usize),
    }
}

pub struct SearchEngine {
    cache: Arc<SymbolCache>,
    base_url: Option<Url>,
}

impl SearchEngine {
    pub fn new(cache: Arc<SymbolCache>, base_url: Option<Url>) -> Self {
        Self { cache, base_url }
    }

    /// Search the index. Results keep load order; the limit only truncates.
    pub async fn search(
        &self,
        index: &SymbolIndex,
        fingerprint: &str,
        request: &SearchRequest,
    ) -> Result<SearchSymbolsResponse, AppError> {
        if let Some(section) = &request.section {
            if !index.has_section(section) {
                return Err(unknown_section(index, section));
            }
        }

        if let Some(cached) = self.cache.get_search_results(fingerprint, request).await {
            debug!(query = %request.query, "search cache hit");
            return Ok(cached);
        }

        let response = self.run_query(index, request);
        self.cache
            .set_search_results(fingerprint, request, &response)
            .await;
        Ok(response)
    }

    fn run_query(&self, index: &SymbolIndex, request: &SearchRequest) -> SearchSymbolsResponse {
        let options = QueryOptions {
            case_sensitive: request.case_sensitive,
            mode: if request.prefix {
                MatchMode::Prefix
            } else {
                MatchMode::Substring
            },
            section: request.section.as_deref(),
        };
        let matches = index.query_with(&request.query, &options);
        let total = matches.len();
        let results = matches
            .into_iter()
            .take(request.limit)
            .map(|m| self.to_result(m.entry))
            .collect();

        SearchSymbolsResponse {
            results,
            total,
            truncated: total > request.limit,
        }
    }

    /// API form of an entry, with target URLs resolved against the base URL.
    pub fn to_result(&self, entry: &IndexEntry) -> SymbolResult {
        SymbolResult {
            name: entry.display_name.clone(),
            sort_key: entry.sort_key.clone(),
            section: entry.section.clone(),
            targets: entry
                .targets
                .iter()
                .map(|t| SymbolTarget {
                    url: t.resolved_url(self.base_url.as_ref()),
                    scope: t.scope.clone(),
                    link_target: t.link_target.as_str().to_string(),
                })
                .collect(),
        }
    }
}

/// `UnknownSection` error listing what the index does contain.
pub fn unknown_section(index: &SymbolIndex, section: &str) -> AppError {
    let available: Vec<String> = index.sections().into_iter().map(|s| s.name).collect();
    AppError::UnknownSection(format!(
        "'{section}'. Available sections: {}",
        available.join(", ")
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LinkTarget, Target};

    fn entry(section: &str, key: &str, url: &str) -> IndexEntry {
        IndexEntry {
            slug: format!("{key}_1"),
            sort_key: key.to_string(),
            ordinal: Some(1),
            display_name: key.to_string(),
            section: section.to_string(),
            targets: vec![Target {
                url: url.to_string(),
                scope: "std".to_string(),
                link_target: LinkTarget::Parent,
            }],
        }
    }

    fn index() -> SymbolIndex {
        SymbolIndex::new(vec![
            entry("classes", "vector", "https://en.cppreference.com/w/cpp/container/vector.html"),
            entry("classes", "variant", "https://en.cppreference.com/w/cpp/utility/variant.html"),
            entry("functions", "visit", "visit.html"),
        ])
    }

    fn request(query: &str) -> SearchRequest {
        SearchRequest::from_params(SearchSymbolsParams {
            query: query.to_string(),
            case_sensitive: None,
            prefix: None,
            section: None,
            limit: None,
        })
        .unwrap()
    }

    fn engine(base_url: Option<&str>) -> SearchEngine {
        SearchEngine::new(
            Arc::new(SymbolCache::disabled()),
            base_url.map(|b| Url::parse(b).unwrap()),
        )
    }

    fn names(response: &SearchSymbolsResponse) -> Vec<&str> {
        response.results.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_resolve_limit() {
        assert_eq!(resolve_limit(None).unwrap(), DEFAULT_LIMIT);
        assert_eq!(resolve_limit(Some(7)).unwrap(), 7);
        assert_eq!(resolve_limit(Some(MAX_LIMIT as u32)).unwrap(), MAX_LIMIT);
        assert!(matches!(resolve_limit(Some(0)), Err(AppError::InvalidRequest(_))));
        assert!(matches!(
            resolve_limit(Some(MAX_LIMIT as u32 + 1)),
            Err(AppError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_request_defaults() {
        let r = request("vec");
        assert!(!r.case_sensitive);
        assert!(!r.prefix);
        assert_eq!(r.section, None);
        assert_eq!(r.limit, DEFAULT_LIMIT);

        let r = SearchRequest::from_params(SearchSymbolsParams {
            query: "v".to_string(),
            case_sensitive: Some(true),
            prefix: Some(true),
            section: Some("  ".to_string()),
            limit: Some(3),
        })
        .unwrap();
        assert!(r.case_sensitive && r.prefix);
        assert_eq!(r.section, None);
        assert_eq!(r.limit, 3);
    }

    #[tokio::test]
    async fn test_search_keeps_order_and_truncates() {
        let engine = engine(None);
        let index = index();

        let response = engine.search(&index, "fp", &request("v")).await.unwrap();
        assert_eq!(names(&response), ["vector", "variant", "visit"]);
        assert_eq!(response.total, 3);
        assert!(!response.truncated);

        let mut limited = request("v");
        limited.limit = 2;
        let response = engine.search(&index, "fp", &limited).await.unwrap();
        assert_eq!(names(&response), ["vector", "variant"]);
        assert_eq!(response.total, 3);
        assert!(response.truncated);
    }

    #[tokio::test]
    async fn test_empty_query_matches_all() {
        let response = engine(None).search(&index(), "fp", &request("")).await.unwrap();
        assert_eq!(response.total, 3);
    }

    #[tokio::test]
    async fn test_section_filter_and_unknown_section() {
        let engine = engine(None);
        let index = index();

        let mut r = request("v");
        r.section = Some("functions".to_string());
        let response = engine.search(&index, "fp", &r).await.unwrap();
        assert_eq!(names(&response), ["visit"]);

        r.section = Some("enums".to_string());
        let err = engine.search(&index, "fp", &r).await.unwrap_err();
        match err {
            AppError::UnknownSection(message) => {
                assert!(message.contains("classes, functions"), "message: {message}")
            }
            other => panic!("expected UnknownSection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_relative_urls_resolved() {
        let engine = engine(Some("https://docs.example.org/api/"));
        let response = engine.search(&index(), "fp", &request("visit")).await.unwrap();
        assert_eq!(
            response.results[0].targets[0].url,
            "https://docs.example.org/api/visit.html"
        );
        assert_eq!(response.results[0].targets[0].link_target, "parent");

        let response = engine.search(&index(), "fp", &request("vector")).await.unwrap();
        assert_eq!(
            response.results[0].targets[0].url,
            "https://en.cppreference.com/w/cpp/container/vector.html"
        );
    }
}
