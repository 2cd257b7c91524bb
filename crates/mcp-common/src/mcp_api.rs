use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchSymbolsParams {
    /// Text fragment to look for inside symbol names. Empty matches every symbol.
    pub query: String,
    /// Match case exactly (default: false).
    pub case_sensitive: Option<bool>,
    /// Only match at the start of the symbol name (default: false, match anywhere).
    pub prefix: Option<bool>,
    /// Restrict results to one index section such as "classes" or "functions".
    pub section: Option<String>,
    /// Maximum number of results to return (default: 50, max: 500).
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GetSymbolParams {
    /// Exact symbol name such as "vector" or "lock_guard".
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListSectionParams {
    /// Section name such as "classes" (see list_sections).
    pub section: String,
    /// Maximum number of symbols to return (default: 50, max: 500).
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SymbolTarget {
    /// Documentation page URL.
    pub url: String,
    /// Qualifier distinguishing overloads, e.g. "std::pmr::vector". May be empty.
    pub scope: String,
    /// "parent" to open in place, "blank" to open in a new window.
    pub link_target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SymbolResult {
    pub name: String,
    pub sort_key: String,
    pub section: String,
    pub targets: Vec<SymbolTarget>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchSymbolsResponse {
    pub results: Vec<SymbolResult>,
    /// Number of matches before the limit was applied.
    pub total: usize,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetSymbolResponse {
    /// Every entry with this name, one per index section it appears in.
    pub matches: Vec<SymbolResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SectionInfo {
    pub name: String,
    pub label: String,
    pub symbol_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListSectionsResponse {
    pub sections: Vec<SectionInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListSectionResponse {
    pub section: SectionInfo,
    pub symbols: Vec<SymbolResult>,
    pub truncated: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UpdateIndexResponse {
    pub updated: bool,
    /// SHA-256 of the loaded search-data files.
    pub fingerprint: String,
    pub symbol_count: usize,
}
