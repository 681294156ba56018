//! Content Block - a declared group of folders and assets
//!
//! A block owns a private [`AssetRegistry`]. "Allow loading" registers the
//! block's folders and assets without fetching anything; "load immediately"
//! fetches everything registered. Both have asynchronous forms that run on the
//! context's worker pool, with at most one in flight per block.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::context::ContentContext;
use crate::error::{ContentError, Result};
use crate::handle::Handle;
use crate::kind::AssetKind;
use crate::progress::{AsyncOperation, CompletionCallback, Correlation, ProgressMeter, ProgressSnapshot};
use crate::registry::AssetRegistry;
use crate::worker::WorkerPool;

/// A folder whose files should be registered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderSpec {
    /// Content-relative folder path, ending in a separator
    pub path: String,
    #[serde(default)]
    pub recursive: bool,
    pub kind: AssetKind,
}

/// A single asset that should be registered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSpec {
    pub name: String,
    pub kind: AssetKind,
}

/// Declarative contents of a block
///
/// Entries are not de-duplicated; registering a name twice is harmless.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlockSpec {
    #[serde(default)]
    pub folders: Vec<FolderSpec>,
    #[serde(default)]
    pub assets: Vec<AssetSpec>,
}

impl ContentBlockSpec {
    pub fn is_empty(&self) -> bool {
        self.folders.is_empty() && self.assets.is_empty()
    }

    /// Check every folder path ends with a separator
    pub fn validate(&self) -> Result<()> {
        for folder in &self.folders {
            check_folder_path(&folder.path)?;
        }
        Ok(())
    }

    fn register_into(&self, registry: &AssetRegistry, progress: &ProgressMeter) -> Result<()> {
        for folder in &self.folders {
            registry.register_folder(&folder.path, folder.kind, folder.recursive, progress)?;
        }
        for asset in &self.assets {
            registry.register(&asset.name, asset.kind);
            progress.record_object();
        }
        Ok(())
    }
}

fn check_folder_path(path: &str) -> Result<()> {
    if path.ends_with(['/', '\\']) {
        Ok(())
    } else {
        Err(ContentError::InvalidArgument(format!(
            "folder path '{}' must end with a path separator",
            path
        )))
    }
}

/// Fetch everything `registry` has registered, in registration order
fn load_registered(registry: &AssetRegistry, progress: &ProgressMeter) -> Result<()> {
    for name in registry.registered_names() {
        if let Some(handle) = registry.load_untyped(&name)? {
            if let Some(bytes) = handle.estimated_bytes() {
                progress.add_memory(bytes);
            }
        }
        progress.record_object();
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Lifecycle state of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Declared; nothing registered
    Configured,
    /// Registered; assets load on demand
    Registered,
    /// Registered and fetched
    Loaded,
    /// Released by `unload_immediately`
    Unloaded,
    Disposed,
}

#[derive(Debug, Clone, Copy)]
enum BlockOperation {
    AllowLoading,
    LoadImmediately,
}

impl BlockOperation {
    fn run(self, spec: &ContentBlockSpec, registry: &AssetRegistry, progress: &ProgressMeter) -> Result<()> {
        match self {
            BlockOperation::AllowLoading => spec.register_into(registry, progress),
            BlockOperation::LoadImmediately => load_registered(registry, progress),
        }
    }

    fn next_state(self, current: BlockState) -> BlockState {
        match (self, current) {
            (_, BlockState::Disposed) => BlockState::Disposed,
            (BlockOperation::AllowLoading, BlockState::Loaded) => BlockState::Loaded,
            (BlockOperation::AllowLoading, _) => BlockState::Registered,
            (BlockOperation::LoadImmediately, _) => BlockState::Loaded,
        }
    }
}

/// A named group of content with its own registry
pub struct ContentBlock {
    name: String,
    spec: ContentBlockSpec,
    registry: Arc<AssetRegistry>,
    workers: Arc<WorkerPool>,
    state: Arc<Mutex<BlockState>>,
    pending: Mutex<Option<Arc<AsyncOperation>>>,
    last_progress: Mutex<Arc<ProgressMeter>>,
}

impl ContentBlock {
    /// Create an empty block with a fresh registry from `context`
    pub fn new(name: impl Into<String>, context: &ContentContext) -> Self {
        Self {
            name: name.into(),
            spec: ContentBlockSpec::default(),
            registry: context.create_registry(),
            workers: Arc::clone(context.workers()),
            state: Arc::new(Mutex::new(BlockState::Configured)),
            pending: Mutex::new(None),
            last_progress: Mutex::new(Arc::new(ProgressMeter::new())),
        }
    }

    /// Create a block from a declared spec
    pub fn from_spec(
        name: impl Into<String>,
        spec: ContentBlockSpec,
        context: &ContentContext,
    ) -> Result<Self> {
        spec.validate()?;
        let mut block = Self::new(name, context);
        block.spec = spec;
        Ok(block)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &ContentBlockSpec {
        &self.spec
    }

    pub fn state(&self) -> BlockState {
        *self.state.lock()
    }

    pub fn registry(&self) -> &Arc<AssetRegistry> {
        &self.registry
    }

    /// Progress of the most recent operation, synchronous or not
    pub fn last_progress(&self) -> ProgressSnapshot {
        self.last_progress.lock().snapshot()
    }

    /// The most recent asynchronous operation, completed or not
    pub fn current_operation(&self) -> Option<Arc<AsyncOperation>> {
        self.pending.lock().clone()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.state() == BlockState::Disposed {
            Err(ContentError::Disposed(self.name.clone()))
        } else {
            Ok(())
        }
    }

    /// Declare a folder of `kind` assets; `path` must end with a separator
    pub fn add_folder(&mut self, path: &str, recursive: bool, kind: AssetKind) -> Result<()> {
        self.ensure_live()?;
        check_folder_path(path)?;
        self.spec.folders.push(FolderSpec {
            path: path.to_string(),
            recursive,
            kind,
        });
        Ok(())
    }

    /// Declare a single asset
    pub fn add_asset(&mut self, name: &str, kind: AssetKind) -> Result<()> {
        self.ensure_live()?;
        self.spec.assets.push(AssetSpec {
            name: name.to_string(),
            kind,
        });
        Ok(())
    }

    fn run_sync(&self, operation: BlockOperation) -> Result<ProgressSnapshot> {
        self.ensure_live()?;
        let progress = Arc::new(ProgressMeter::new());
        *self.last_progress.lock() = Arc::clone(&progress);

        operation.run(&self.spec, &self.registry, &progress)?;

        let mut state = self.state.lock();
        *state = operation.next_state(*state);
        Ok(progress.snapshot())
    }

    /// Register every declared folder and asset; fetches nothing
    pub fn allow_loading(&self) -> Result<ProgressSnapshot> {
        let progress = self.run_sync(BlockOperation::AllowLoading)?;
        log::info!(
            "Content block '{}' allowed loading of {} assets",
            self.name,
            self.registry.len()
        );
        Ok(progress)
    }

    /// Fetch every registered asset now
    ///
    /// Individual fetch failures are logged and skipped.
    pub fn load_immediately(&self) -> Result<ProgressSnapshot> {
        let progress = self.run_sync(BlockOperation::LoadImmediately)?;
        log::info!(
            "Content block '{}' loaded {} assets ({} bytes estimated)",
            self.name,
            progress.objects,
            progress.memory_bytes
        );
        Ok(progress)
    }

    /// Background [`allow_loading`](Self::allow_loading)
    pub fn async_allow_loading(
        &self,
        callback: Option<CompletionCallback>,
        correlation: Option<Correlation>,
    ) -> Result<Arc<AsyncOperation>> {
        self.start_async(BlockOperation::AllowLoading, callback, correlation)
    }

    /// Background [`load_immediately`](Self::load_immediately)
    pub fn async_load_immediately(
        &self,
        callback: Option<CompletionCallback>,
        correlation: Option<Correlation>,
    ) -> Result<Arc<AsyncOperation>> {
        self.start_async(BlockOperation::LoadImmediately, callback, correlation)
    }

    fn start_async(
        &self,
        operation: BlockOperation,
        callback: Option<CompletionCallback>,
        correlation: Option<Correlation>,
    ) -> Result<Arc<AsyncOperation>> {
        self.ensure_live()?;

        let mut pending = self.pending.lock();
        if let Some(current) = pending.as_ref() {
            if !current.is_completed() {
                return Err(ContentError::ConcurrentOperation(self.name.clone()));
            }
        }

        let handle = AsyncOperation::new(correlation);
        let job = {
            let handle = Arc::clone(&handle);
            let registry = Arc::clone(&self.registry);
            let spec = self.spec.clone();
            let state = Arc::clone(&self.state);
            let name = self.name.clone();
            move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    operation.run(&spec, &registry, handle.progress())
                }))
                .unwrap_or_else(|payload| {
                    Err(ContentError::WorkerPanic {
                        block: name.clone(),
                        message: panic_message(payload.as_ref()),
                    })
                });
                match outcome {
                    Ok(()) => {
                        let mut state = state.lock();
                        *state = operation.next_state(*state);
                        log::info!("Content block '{}' finished {:?}", name, operation);
                    }
                    Err(e) => {
                        log::error!("Content block '{}' {:?} failed: {}", name, operation, e);
                        handle.fail(e);
                    }
                }
                handle.complete();
                if let Some(callback) = callback {
                    callback(&handle);
                }
            }
        };

        self.workers.submit(job)?;
        *self.last_progress.lock() = Arc::clone(handle.progress());
        *pending = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Unregister everything; other registries holding the same names are unaffected
    pub fn disallow_loading(&self) -> Result<()> {
        self.ensure_live()?;
        self.registry.unregister_all();
        *self.state.lock() = BlockState::Configured;
        log::info!("Content block '{}' disallowed loading", self.name);
        Ok(())
    }

    /// Release everything this block loaded and registered
    pub fn unload_immediately(&self) -> Result<()> {
        self.ensure_live()?;
        let released = self.registry.estimated_memory();
        self.registry.unregister_all();
        self.last_progress.lock().clear_memory();
        *self.state.lock() = BlockState::Unloaded;
        log::info!(
            "Content block '{}' unloaded ({} bytes estimated)",
            self.name,
            released
        );
        Ok(())
    }

    /// Load one asset registered with this block
    pub fn load_asset<T: Send + Sync + 'static>(&self, name: &str) -> Result<Option<Handle<T>>> {
        self.ensure_live()?;
        if !self.registry.is_registered(name) {
            return Err(ContentError::InvalidArgument(format!(
                "'{}' is not registered with content block '{}'",
                name, self.name
            )));
        }
        self.registry.load::<T>(name)
    }

    /// Dispose the registry and drop the declared contents; idempotent
    pub fn dispose(&mut self) {
        {
            let mut state = self.state.lock();
            if *state == BlockState::Disposed {
                return;
            }
            *state = BlockState::Disposed;
        }
        self.registry.dispose();
        self.spec = ContentBlockSpec::default();
        log::info!("Content block '{}' disposed", self.name);
    }
}

impl Drop for ContentBlock {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ContentBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentBlock")
            .field("name", &self.name)
            .field("state", &self.state())
            .field("folders", &self.spec.folders.len())
            .field("assets", &self.spec.assets.len())
            .field("registry", &self.registry.id())
            .finish()
    }
}
