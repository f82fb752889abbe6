//! Service Entry Point

use anyhow::Context;
use chrono::DateTime;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use travels::cache::PointCaches;
use travels::pool::BufferPool;
use travels::{
    loader, DataOptions, EntityStore, QueryEngine, Server, ServiceConfig, ServiceState,
};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServiceConfig::from_env()?;

    let options = DataOptions::from_file(&config.options_path)
        .with_context(|| format!("options source {}", config.options_path.display()))?;
    let generated_at = DateTime::from_timestamp(options.generated_at, 0)
        .context("generation timestamp out of range")?;

    let started = Instant::now();
    let mut store = EntityStore::with_sizing(options.sizing());
    let summary = loader::load_directory(&mut store, &config.data_dir)
        .with_context(|| format!("data directory {}", config.data_dir.display()))?;
    store.finalize();

    info!(
        users = store.user_count(),
        locations = store.location_count(),
        visits = store.visit_count(),
        files = summary.files,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "store loaded and finalized"
    );

    let state = ServiceState {
        engine: QueryEngine::new(Arc::new(store), generated_at),
        buffers: BufferPool::default(),
        caches: config
            .point_cache
            .then(|| PointCaches::with_sizing(options.full_dataset)),
    };

    Server::new(state, config.workers, config.keepalive()).run(config.port)
}
