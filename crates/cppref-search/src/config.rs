use std::path::PathBuf;

use url::Url;

use crate::error::AppError;

/// Application configuration loaded explicitly from environment variables.
///
/// The data path has no default; the caller must provide it. Redis is
/// optional; without it the server runs uncached.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection URL (e.g. "redis://127.0.0.1:6379"). `None` disables caching.
    pub redis_url: Option<String>,
    /// Doxygen `search/` directory, or a single search-data `.js` file.
    pub data_path: PathBuf,
    /// Sections to load (e.g. ["classes", "functions"]). `None` loads all but `all`.
    pub sections: Option<Vec<String>>,
    /// Base that relative target URLs are joined onto. Always ends in `/`.
    pub base_url: Option<Url>,
    /// Serve MCP over TCP on this address instead of stdio.
    pub tcp_listen_addr: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `CPPREF_SEARCH_DATA_PATH`: Doxygen search directory or file
    ///
    /// Optional:
    /// - `CPPREF_SEARCH_SECTIONS`: comma-separated section names
    /// - `CPPREF_SEARCH_BASE_URL`: base for relative documentation URLs
    /// - `REDIS_URL`: Redis connection string (omit to disable caching)
    /// - `MCP_TCP_LISTEN_ADDR`: e.g. "127.0.0.1:7400"
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let data_path = lookup("CPPREF_SEARCH_DATA_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| {
                AppError::Config(
                    "CPPREF_SEARCH_DATA_PATH environment variable is required".to_string(),
                )
            })?;

        if !data_path.exists() {
            return Err(AppError::Config(format!(
                "search data path not found: {}",
                data_path.display()
            )));
        }

        let sections = lookup("CPPREF_SEARCH_SECTIONS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_ascii_lowercase())
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|sections| !sections.is_empty());

        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_url = non_empty("CPPREF_SEARCH_BASE_URL")
            .map(|raw| parse_base_url(raw.trim()))
            .transpose()?;

        Ok(Self {
            redis_url: non_empty("REDIS_URL"),
            data_path,
            sections,
            base_url,
            tcp_listen_addr: non_empty("MCP_TCP_LISTEN_ADDR"),
        })
    }
}

/// Parse the documentation base URL. The path gets a trailing `/` so that
/// joining `page.html` onto `https://host/api` stays under `/api/`.
fn parse_base_url(raw: &str) -> Result<Url, AppError> {
    let mut url = Url::parse(raw).map_err(|e| {
        AppError::Config(format!("CPPREF_SEARCH_BASE_URL is not a valid URL ({raw}): {e}"))
    })?;
    if url.cannot_be_a_base() {
        return Err(AppError::Config(format!(
            "CPPREF_SEARCH_BASE_URL cannot be used as a base URL: {raw}"
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
