/// Update service for the search data.
///
/// Fingerprints the search-data files and rebuilds the index when they change.
/// Runs at startup and on demand via the `update_index` MCP tool.
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::info;

use crate::cache::SymbolCache;
use crate::config::Config;
use crate::error::AppError;
use crate::index::SymbolIndex;
use crate::parser::{self, SearchDataFiles};

/// Result of an update operation.
pub struct UpdateResult {
    /// Whether a reload occurred (false if the data was unchanged).
    pub updated: bool,
    /// Fingerprint of the data now on disk.
    pub fingerprint: String,
}

pub struct UpdateService {
    config: Config,
    cache: Arc<SymbolCache>,
}

impl UpdateService {
    pub fn new(config: Config, cache: Arc<SymbolCache>) -> Self {
        Self { config, cache }
    }

    /// SHA-256 over the names and contents of the current search-data files.
    pub async fn fingerprint(&self) -> Result<String, AppError> {
        let config = self.config.clone();
        run_blocking(move || {
            let files = parser::discover(&config.data_path, config.sections.as_deref())?;
            fingerprint_files(&files)
        })
        .await
    }

    /// Load the index from disk along with its fingerprint.
    pub async fn load(&self) -> Result<(SymbolIndex, String), AppError> {
        let config = self.config.clone();
        run_blocking(move || {
            let files = parser::discover(&config.data_path, config.sections.as_deref())?;
            let fingerprint = fingerprint_files(&files)?;
            let data = parser::load_files(&files)?;
            Ok((SymbolIndex::from(data), fingerprint))
        })
        .await
    }

    /// Reload if the data changed since `current_fingerprint`.
    ///
    /// Returns the new index when a reload happened. The cache is cleared after
    /// a reload; stale entries could not be hit anyway, as keys carry the fingerprint.
    pub async fn update(
        &self,
        current_fingerprint: &str,
    ) -> Result<(UpdateResult, Option<SymbolIndex>), AppError> {
        let fingerprint = self.fingerprint().await?;
        if fingerprint == current_fingerprint {
            info!(fingerprint = %fingerprint, "search data unchanged, skipping reload");
            return Ok((
                UpdateResult {
                    updated: false,
                    fingerprint,
                },
                None,
            ));
        }

        info!(old = %current_fingerprint, new = %fingerprint, "search data changed, reloading");
        let (index, fingerprint) = self.load().await?;
        self.cache.invalidate_all().await;
        info!(entries = index.len(), fingerprint = %fingerprint, "reload complete");

        Ok((
            UpdateResult {
                updated: true,
                fingerprint,
            },
            Some(index),
        ))
    }
}

/// Hash every file that contributes to the index, in load order.
pub fn fingerprint_files(files: &SearchDataFiles) -> Result<String, AppError> {
    let mut hasher = Sha256::new();
    for path in files.all_paths() {
        let content = std::fs::read(path).map_err(|e| AppError::io(path, e))?;
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update((content.len() as u64).to_le_bytes());
        hasher.update(&content);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

async fn run_blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Config(format!("search data loader task failed: {e}")))?
}
