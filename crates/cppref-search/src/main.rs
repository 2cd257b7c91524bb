use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cppref_search::cache::{self, SymbolCache};
use cppref_search::config::Config;
use cppref_search::server::CppRefSearchServer;
use cppref_search::update::UpdateService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout is reserved for MCP JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting cppref-search MCP server");

    let config = Config::from_env()?;
    info!(
        data_path = %config.data_path.display(),
        sections = ?config.sections,
        base_url = config.base_url.as_ref().map(|u| u.as_str()).unwrap_or(""),
        "configuration loaded"
    );

    let redis_cache =
        mcp_common::redis::RedisCache::new(config.redis_url.as_deref(), cache::KEY_NAMESPACE);
    let redis_configured = redis_cache.is_configured();
    let cache = Arc::new(SymbolCache::new(redis_cache));
    if cache.is_available().await {
        info!("redis connected");
    } else if redis_configured {
        warn!("redis unreachable, running without cache");
    } else {
        info!("REDIS_URL not set, running without cache");
    }

    let update_service = UpdateService::new(config.clone(), Arc::clone(&cache));
    let (index, fingerprint) = update_service.load().await?;
    info!(
        entries = index.len(),
        sections = index.sections().len(),
        fingerprint = %fingerprint,
        "symbol index ready"
    );

    let tcp_listen_addr = config.tcp_listen_addr.clone();
    let server = CppRefSearchServer::new(index, fingerprint, cache, config);

    if let Some(addr) = tcp_listen_addr {
        let listener = TcpListener::bind(&addr).await?;
        info!(listen_addr = %addr, "MCP server ready, serving on TCP");
        loop {
            let (stream, peer) = listener.accept().await?;
            let server = server.clone();
            tokio::spawn(async move {
                info!(peer = %peer, "MCP client connected");
                let service = server.serve(stream).await.inspect_err(|e| {
                    tracing::error!(error = %e, "MCP server error");
                })?;
                service.waiting().await?;
                info!(peer = %peer, "MCP client disconnected");
                Ok::<(), anyhow::Error>(())
            });
        }
    } else {
        info!("MCP server ready, serving on stdio");
        let service = server.serve(stdio()).await.inspect_err(|e| {
            tracing::error!(error = %e, "MCP server error");
        })?;
        service.waiting().await?;
        info!("MCP server shut down");
    }
    Ok(())
}
