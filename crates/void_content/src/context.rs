//! Content Context - the services registries and blocks are built from

use std::sync::Arc;

use crate::block::ContentBlock;
use crate::config::{ContentConfig, ContentManifest};
use crate::enumerator::{DirectoryEnumerator, FsEnumerator};
use crate::error::Result;
use crate::fetcher::{AssetFetcher, DecoderTable};
use crate::hub::RegistryHub;
use crate::registry::AssetRegistry;
use crate::worker::WorkerPool;

/// Bundles the hub, storage collaborators, worker pool and configuration
pub struct ContentContext {
    config: ContentConfig,
    hub: Arc<RegistryHub>,
    fetcher: Arc<dyn AssetFetcher>,
    enumerator: Arc<dyn DirectoryEnumerator>,
    workers: Arc<WorkerPool>,
}

impl ContentContext {
    /// Context on the process-wide hub
    pub fn new(
        config: ContentConfig,
        fetcher: Arc<dyn AssetFetcher>,
        enumerator: Arc<dyn DirectoryEnumerator>,
    ) -> Result<Self> {
        Self::with_hub(config, RegistryHub::global(), fetcher, enumerator)
    }

    /// Context on an explicit hub
    pub fn with_hub(
        config: ContentConfig,
        hub: Arc<RegistryHub>,
        fetcher: Arc<dyn AssetFetcher>,
        enumerator: Arc<dyn DirectoryEnumerator>,
    ) -> Result<Self> {
        config.validate()?;
        let workers = Arc::new(WorkerPool::new(config.worker_threads)?);
        Ok(Self {
            config,
            hub,
            fetcher,
            enumerator,
            workers,
        })
    }

    /// Context reading files under `config.root_dir` through `decoders`
    pub fn from_disk(config: ContentConfig, decoders: DecoderTable) -> Result<Self> {
        let enumerator = Arc::new(FsEnumerator::new(config.root_dir.clone()));
        Self::new(config, Arc::new(decoders), enumerator)
    }

    pub fn config(&self) -> &ContentConfig {
        &self.config
    }

    pub fn hub(&self) -> &Arc<RegistryHub> {
        &self.hub
    }

    pub fn workers(&self) -> &Arc<WorkerPool> {
        &self.workers
    }

    /// New registry attached to this context's hub
    pub fn create_registry(&self) -> Arc<AssetRegistry> {
        AssetRegistry::new(
            &self.hub,
            &self.config,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.enumerator),
        )
    }

    pub fn create_block(&self, name: impl Into<String>) -> ContentBlock {
        ContentBlock::new(name, self)
    }

    /// One block per manifest entry, in manifest order
    pub fn create_blocks(&self, manifest: &ContentManifest) -> Result<Vec<ContentBlock>> {
        manifest
            .blocks
            .iter()
            .map(|entry| ContentBlock::from_spec(entry.name.clone(), entry.spec.clone(), self))
            .collect()
    }
}

impl std::fmt::Debug for ContentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentContext")
            .field("config", &self.config)
            .field("hub", &self.hub)
            .field("workers", &self.workers)
            .finish()
    }
}
