/// MCP server exposing the C++ reference symbol index.
///
/// Exposes five tools:
/// - `search_symbols`: Substring/prefix search over symbol names
/// - `get_symbol`: Look up a symbol by exact name
/// - `list_sections`: List the index sections and their sizes
/// - `list_section`: List the symbols of one section
/// - `update_index`: Reload the search data if it changed on disk
use std::sync::Arc;

use rmcp::{
    Json, ServerHandler,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router,
};
use tokio::sync::RwLock;
use tracing::info;

use crate::cache::SymbolCache;
use crate::config::Config;
use crate::error::AppError;
use crate::index::SymbolIndex;
use crate::model::SectionSummary;
use crate::search::{self, SearchEngine, SearchRequest};
use crate::update::UpdateService;
use mcp_common::mcp_api::{
    GetSymbolParams, GetSymbolResponse, ListSectionParams, ListSectionResponse,
    ListSectionsResponse, SearchSymbolsParams, SearchSymbolsResponse, SectionInfo,
    UpdateIndexResponse,
};

/// Shared application state. The index itself is immutable; the lock only
/// guards swapping in a reloaded one.
pub struct AppState {
    pub index: Arc<SymbolIndex>,
    pub fingerprint: String,
}

#[derive(Clone)]
pub struct CppRefSearchServer {
    state: Arc<RwLock<AppState>>,
    search_engine: Arc<SearchEngine>,
    update_service: Arc<UpdateService>,
    tool_router: ToolRouter<CppRefSearchServer>,
}

impl CppRefSearchServer {
    pub fn new(
        index: SymbolIndex,
        fingerprint: String,
        cache: Arc<SymbolCache>,
        config: Config,
    ) -> Self {
        let search_engine = Arc::new(SearchEngine::new(
            Arc::clone(&cache),
            config.base_url.clone(),
        ));
        let update_service = Arc::new(UpdateService::new(config, cache));

        let state = Arc::new(RwLock::new(AppState {
            index: Arc::new(index),
            fingerprint,
        }));

        Self {
            state,
            search_engine,
            update_service,
            tool_router: Self::tool_router(),
        }
    }

    /// Current index and fingerprint; the lock is released before returning.
    async fn snapshot(&self) -> (Arc<SymbolIndex>, String) {
        let state = self.state.read().await;
        (Arc::clone(&state.index), state.fingerprint.clone())
    }

    /// Swap in an index reloaded from the data identified by `based_on`.
    ///
    /// A concurrent reload may have finished first; its index is newer than
    /// ours, so it is kept. Returns the fingerprint and size now being served.
    async fn install(
        &self,
        based_on: &str,
        index: SymbolIndex,
        fingerprint: String,
    ) -> (String, usize) {
        let mut state = self.state.write().await;
        if state.fingerprint != based_on {
            info!(
                served = %state.fingerprint,
                discarded = %fingerprint,
                "index already replaced by a concurrent reload"
            );
            return (state.fingerprint.clone(), state.index.len());
        }
        let count = index.len();
        state.index = Arc::new(index);
        state.fingerprint = fingerprint.clone();
        info!(symbol_count = count, "in-memory index replaced");
        (fingerprint, count)
    }
}

#[tool_router]
impl CppRefSearchServer {
    #[tool(description = "Search C++ standard library reference symbols (e.g. 'vector', 'lock_guard') by name fragment. Matches anywhere in the name (or only at the start with prefix=true), case-insensitive by default, in index order. An empty query lists everything.")]
    async fn search_symbols(
        &self,
        Parameters(params): Parameters<SearchSymbolsParams>,
    ) -> Result<Json<SearchSymbolsResponse>, String> {
        let request = SearchRequest::from_params(params).map_err(|e| e.to_string())?;
        let (index, fingerprint) = self.snapshot().await;

        let response = self
            .search_engine
            .search(&index, &fingerprint, &request)
            .await
            .map_err(|e| format!("search failed: {e}"))?;

        Ok(Json(response))
    }

    #[tool(description = "Get the documentation links for a C++ symbol by exact name (e.g. 'variant'). Each link carries its scope, such as 'std::pmr::vector'.")]
    async fn get_symbol(
        &self,
        Parameters(params): Parameters<GetSymbolParams>,
    ) -> Result<Json<GetSymbolResponse>, String> {
        let name = params.name.trim().to_string();
        if name.is_empty() {
            return Err("name must not be empty".to_string());
        }

        let (index, _) = self.snapshot().await;
        let matches: Vec<_> = index
            .find_by_name(&name)
            .into_iter()
            .map(|entry| self.search_engine.to_result(entry))
            .collect();
        if matches.is_empty() {
            return Err(AppError::NotFound(name).to_string());
        }

        Ok(Json(GetSymbolResponse { matches }))
    }

    #[tool(description = "List the sections of the symbol index (e.g. 'classes', 'functions') with their symbol counts.")]
    async fn list_sections(&self) -> Result<Json<ListSectionsResponse>, String> {
        let (index, _) = self.snapshot().await;
        let sections = index.sections().into_iter().map(to_section_info).collect();
        Ok(Json(ListSectionsResponse { sections }))
    }

    #[tool(description = "List the symbols of one index section in index order. Use list_sections to see available section names.")]
    async fn list_section(
        &self,
        Parameters(params): Parameters<ListSectionParams>,
    ) -> Result<Json<ListSectionResponse>, String> {
        let section_name = params.section.trim().to_string();
        if section_name.is_empty() {
            return Err("section must not be empty".to_string());
        }
        let limit = search::resolve_limit(params.limit).map_err(|e| e.to_string())?;

        let (index, _) = self.snapshot().await;
        let section = index
            .sections()
            .into_iter()
            .find(|s| s.name.eq_ignore_ascii_case(&section_name))
            .ok_or_else(|| search::unknown_section(&index, &section_name).to_string())?;

        let symbols = index
            .section_entries(&section.name)
            .take(limit)
            .map(|entry| self.search_engine.to_result(entry))
            .collect();

        Ok(Json(ListSectionResponse {
            truncated: section.entry_count > limit,
            section: to_section_info(section),
            symbols,
        }))
    }

    #[tool(description = "Reload the Doxygen search data from disk if it changed since it was last loaded.")]
    async fn update_index(&self) -> Result<Json<UpdateIndexResponse>, String> {
        info!("update_index tool invoked");

        let (_, current) = self.snapshot().await;
        let (result, new_index) = self
            .update_service
            .update(&current)
            .await
            .map_err(|e| format!("update failed: {e}"))?;

        let (fingerprint, symbol_count) = match new_index {
            Some(index) => self.install(&current, index, result.fingerprint).await,
            None => (result.fingerprint, self.snapshot().await.0.len()),
        };

        Ok(Json(UpdateIndexResponse {
            updated: result.updated,
            fingerprint,
            symbol_count,
        }))
    }
}

fn to_section_info(summary: SectionSummary) -> SectionInfo {
    SectionInfo {
        name: summary.name,
        label: summary.label,
        symbol_count: summary.entry_count,
    }
}

#[tool_handler]
impl ServerHandler for CppRefSearchServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_06_18,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: "cppref-search".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "C++ reference symbol search MCP server. Looks up documentation links \
                 for C++ standard library names from a Doxygen search index. Use \
                 search_symbols for name fragments, get_symbol for an exact name, \
                 list_sections/list_section to browse, and update_index to reload \
                 the index after the documentation is regenerated."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rmcp::handler::server::wrapper::Parameters;

    use super::CppRefSearchServer;
    use crate::cache::SymbolCache;
    use crate::config::Config;
    use crate::update::UpdateService;
    use mcp_common::mcp_api::{GetSymbolParams, ListSectionParams, SearchSymbolsParams};

    const CLASSES: &str = "var searchData=\n[\n  ['variant_2892',['variant',['https://en.cppreference.com/w/cpp/utility/variant.html',1,'std']]],\n  ['vector_2896',['vector',['https://en.cppreference.com/w/cpp/container/vector.html',1,'std::vector&lt; T &gt;'],['https://en.cppreference.com/w/cpp/container/vector.html',1,'std::pmr::vector']]]\n];\n";
    const FUNCTIONS: &str = "var searchData=\n[\n  ['visit_1',['visit',['https://en.cppreference.com/w/cpp/utility/variant/visit.html',1,'std']]]\n];\n";

    async fn server(dir: &tempfile::TempDir) -> CppRefSearchServer {
        std::fs::write(dir.path().join("classes_0.js"), CLASSES).unwrap();
        std::fs::write(dir.path().join("functions_0.js"), FUNCTIONS).unwrap();
        let config = Config {
            redis_url: None,
            data_path: dir.path().to_path_buf(),
            sections: None,
            base_url: None,
            tcp_listen_addr: None,
        };
        let cache = Arc::new(SymbolCache::disabled());
        let (index, fingerprint) = UpdateService::new(config.clone(), Arc::clone(&cache))
            .load()
            .await
            .unwrap();
        CppRefSearchServer::new(index, fingerprint, cache, config)
    }

    #[test]
    fn tools_publish_output_schemas() {
        let tools = CppRefSearchServer::tool_router().list_all();
        for name in [
            "search_symbols",
            "get_symbol",
            "list_sections",
            "list_section",
            "update_index",
        ] {
            let tool = tools
                .iter()
                .find(|t| t.name == name)
                .unwrap_or_else(|| panic!("missing tool: {name}"));
            assert!(
                tool.output_schema.is_some(),
                "tool {name} should publish output_schema"
            );
        }
    }

    #[tokio::test]
    async fn search_symbols_tool() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(&dir).await;

        let response = server
            .search_symbols(Parameters(SearchSymbolsParams {
                query: "V".to_string(),
                case_sensitive: None,
                prefix: Some(true),
                section: None,
                limit: None,
            }))
            .await
            .unwrap()
            .0;
        let names: Vec<&str> = response.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["variant", "vector", "visit"]);

        let err = server
            .search_symbols(Parameters(SearchSymbolsParams {
                query: "v".to_string(),
                case_sensitive: None,
                prefix: None,
                section: None,
                limit: Some(0),
            }))
            .await
            .err()
            .expect("tool should fail");
        assert!(err.contains("limit"), "got {err}");
    }

    #[tokio::test]
    async fn get_symbol_tool() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(&dir).await;

        let response = server
            .get_symbol(Parameters(GetSymbolParams {
                name: " Vector ".to_string(),
            }))
            .await
            .unwrap()
            .0;
        assert_eq!(response.matches.len(), 1);
        let scopes: Vec<&str> = response.matches[0]
            .targets
            .iter()
            .map(|t| t.scope.as_str())
            .collect();
        assert_eq!(scopes, ["std::vector< T >", "std::pmr::vector"]);

        let err = server
            .get_symbol(Parameters(GetSymbolParams {
                name: "vec".to_string(),
            }))
            .await
            .err()
            .expect("tool should fail");
        assert!(err.contains("not found"), "got {err}");
    }

    #[tokio::test]
    async fn section_tools() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(&dir).await;

        let sections = server.list_sections().await.unwrap().0.sections;
        let names: Vec<&str> = sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["classes", "functions"]);
        assert_eq!(sections[0].symbol_count, 2);

        let listed = server
            .list_section(Parameters(ListSectionParams {
                section: "CLASSES".to_string(),
                limit: Some(1),
            }))
            .await
            .unwrap()
            .0;
        assert_eq!(listed.section.name, "classes");
        assert_eq!(listed.symbols.len(), 1);
        assert!(listed.truncated);

        let err = server
            .list_section(Parameters(ListSectionParams {
                section: "enums".to_string(),
                limit: None,
            }))
            .await
            .err()
            .expect("tool should fail");
        assert!(err.contains("classes, functions"), "got {err}");
    }

    #[tokio::test]
    async fn update_index_tool_swaps_index() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(&dir).await;

        let response = server.update_index().await.unwrap().0;
        assert!(!response.updated);
        assert_eq!(response.symbol_count, 3);

        std::fs::write(dir.path().join("functions_1.js"), FUNCTIONS.replace("visit", "vprintf"))
            .unwrap();
        let response = server.update_index().await.unwrap().0;
        assert!(response.updated);
        assert_eq!(response.symbol_count, 4);

        let found = server
            .get_symbol(Parameters(GetSymbolParams {
                name: "vprintf".to_string(),
            }))
            .await;
        assert!(found.is_ok());
    }

    #[tokio::test]
    async fn stale_reload_does_not_replace_newer_index() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(&dir).await;
        let (original, served) = server.snapshot().await;

        // Built against a fingerprint that is no longer served: discarded.
        let (fingerprint, count) = server
            .install("older", crate::index::SymbolIndex::default(), "stale".to_string())
            .await;
        assert_eq!(fingerprint, served);
        assert_eq!(count, original.len());
        assert_eq!(server.snapshot().await.1, served);

        let (fingerprint, count) = server
            .install(&served, crate::index::SymbolIndex::default(), "fresh".to_string())
            .await;
        assert_eq!(fingerprint, "fresh");
        assert_eq!(count, 0);
        assert!(server.snapshot().await.0.is_empty());
    }
}
