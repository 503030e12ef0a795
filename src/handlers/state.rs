//! Application state - shared stores, analyzer, and build coordination
//!
//! Wires the document store, graph store, analyzer, and fetcher into one
//! shared context, and holds the single-flight guard that keeps two
//! concurrent builds from racing the same job's sync stats.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use dashmap::DashMap;

use crate::analyzer::TextAnalyzer;
use crate::config::ServerConfig;
use crate::docstore::DocumentStore;
use crate::fetch::ContentFetcher;
use crate::graph::store::GraphStore;

/// Application state type alias
pub type AppState = Arc<AppContext>;

/// Shared server context.
pub struct AppContext {
    pub config: ServerConfig,
    pub docs: Arc<DocumentStore>,
    pub graph: Arc<GraphStore>,
    pub analyzer: Arc<TextAnalyzer>,
    pub fetcher: Arc<ContentFetcher>,

    /// Ingest job ids with a build currently running.
    builds_in_flight: Arc<DashMap<String, ()>>,
}

impl AppContext {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let data_dir = config.data_dir.clone();
        Self::with_data_dir(config, &data_dir)
    }

    pub fn with_data_dir(config: ServerConfig, data_dir: &Path) -> Result<Self> {
        let docs = Arc::new(
            DocumentStore::new(&data_dir.join("documents")).context("opening document store")?,
        );
        let graph =
            Arc::new(GraphStore::new(&data_dir.join("graph")).context("opening graph store")?);
        let fetcher =
            Arc::new(ContentFetcher::new(config.fetch_timeout_secs).context("building fetcher")?);

        Ok(Self {
            config,
            docs,
            graph,
            analyzer: Arc::new(TextAnalyzer::new()),
            fetcher,
            builds_in_flight: Arc::new(DashMap::new()),
        })
    }

    /// Claim the build slot for a job. Returns None when a build for the
    /// same job is already running; the returned guard releases the slot
    /// on drop.
    pub fn try_begin_build(&self, job_id: &str) -> Option<BuildGuard> {
        use dashmap::mapref::entry::Entry;

        match self.builds_in_flight.entry(job_id.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(BuildGuard {
                    builds: Arc::clone(&self.builds_in_flight),
                    job_id: job_id.to_string(),
                })
            }
        }
    }
}

/// Releases a job's build slot when the build finishes, however it
/// finishes.
pub struct BuildGuard {
    builds: Arc<DashMap<String, ()>>,
    job_id: String,
}

impl Drop for BuildGuard {
    fn drop(&mut self) {
        self.builds.remove(&self.job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_build_single_flight() {
        let temp = TempDir::new().unwrap();
        let ctx = AppContext::with_data_dir(ServerConfig::default(), temp.path()).unwrap();

        let guard = ctx.try_begin_build("job1");
        assert!(guard.is_some());
        // Second concurrent build for the same job is refused
        assert!(ctx.try_begin_build("job1").is_none());
        // A different job is unaffected
        assert!(ctx.try_begin_build("job2").is_some());

        drop(guard);
        assert!(ctx.try_begin_build("job1").is_some());
    }
}
