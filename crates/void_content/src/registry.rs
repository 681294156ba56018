//! Asset Registry - per-owner table of registered assets
//!
//! A registry records which names it is *allowed* to load (its private
//! table). Registering is cheap and never touches storage. Loading goes
//! through the [`RegistryHub`], which picks one registry as the owner of each
//! name; only the owner fetches, so a name registered by several registries is
//! fetched once.
//!
//! A name nobody registered loads as absent rather than failing. That is how
//! eager load attempts for content no block opted into are suppressed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Condvar, Mutex, RwLock};

use crate::config::ContentConfig;
use crate::enumerator::DirectoryEnumerator;
use crate::error::{ContentError, Result};
use crate::fetcher::AssetFetcher;
use crate::handle::{AssetHandle, Handle};
use crate::hub::{RegistryHub, RegistryId};
use crate::kind::AssetKind;
use crate::progress::ProgressMeter;

/// One entry in a registry's private table
#[derive(Debug, Clone)]
pub struct AssetRecord {
    pub name: String,
    pub kind: AssetKind,
    /// Loaded payload; absent until the first successful load by this registry
    pub reference: Option<AssetHandle>,
    /// Memory estimate, only for image-like assets
    pub memory_estimate: Option<u64>,
}

impl AssetRecord {
    fn new(name: &str, kind: AssetKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            reference: None,
            memory_estimate: None,
        }
    }
}

/// Private table, iterated in registration order
#[derive(Default)]
struct RecordTable {
    order: Vec<String>,
    entries: HashMap<String, AssetRecord>,
}

impl RecordTable {
    fn remove(&mut self, name: &str) -> Option<AssetRecord> {
        let record = self.entries.remove(name)?;
        self.order.retain(|n| n != name);
        Some(record)
    }

    fn drain(&mut self) -> Vec<AssetRecord> {
        self.order.clear();
        self.entries.drain().map(|(_, record)| record).collect()
    }
}

/// Names currently being fetched, with the thread fetching each
#[derive(Default)]
struct InFlight {
    names: Mutex<HashMap<String, ThreadId>>,
    done: Condvar,
}

/// Clears an in-flight entry once its fetch returns or unwinds
struct FetchGuard<'a> {
    in_flight: &'a InFlight,
    name: &'a str,
}

impl Drop for FetchGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.names.lock().remove(self.name);
        self.in_flight.done.notify_all();
    }
}

/// Per-owner asset table attached to a [`RegistryHub`]
pub struct AssetRegistry {
    id: RegistryId,
    hub: Arc<RegistryHub>,
    root_dir: PathBuf,
    file_extension: String,
    fetcher: Arc<dyn AssetFetcher>,
    enumerator: Arc<dyn DirectoryEnumerator>,
    records: RwLock<RecordTable>,
    /// Single-flight fetches per name; different names fetch independently
    in_flight: InFlight,
    disposed: AtomicBool,
}

impl AssetRegistry {
    /// Create a registry and attach it to `hub`
    pub fn new(
        hub: &Arc<RegistryHub>,
        config: &ContentConfig,
        fetcher: Arc<dyn AssetFetcher>,
        enumerator: Arc<dyn DirectoryEnumerator>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| {
            let id = hub.attach(weak.clone());
            Self {
                id,
                hub: Arc::clone(hub),
                root_dir: config.root_dir.clone(),
                file_extension: config.file_extension.clone(),
                fetcher,
                enumerator,
                records: RwLock::new(RecordTable::default()),
                in_flight: InFlight::default(),
                disposed: AtomicBool::new(false),
            }
        })
    }

    pub fn id(&self) -> RegistryId {
        self.id
    }

    pub fn hub(&self) -> &Arc<RegistryHub> {
        &self.hub
    }

    /// Root directory this registry was created for
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Allow `name` to be loaded as `kind`
    ///
    /// Idempotent: returns `false` and changes nothing if `name` is already
    /// registered.
    pub fn register(&self, name: &str, kind: AssetKind) -> bool {
        if self.is_disposed() {
            log::warn!("Ignoring registration of '{}' on disposed {}", name, self.id);
            return false;
        }

        let mut records = self.records.write();
        if records.entries.contains_key(name) {
            return false;
        }
        records.order.push(name.to_string());
        records.entries.insert(name.to_string(), AssetRecord::new(name, kind));
        log::debug!("{} registered '{}' ({:?})", self.id, name, kind);
        true
    }

    /// Register every asset file in `folder`, named `<folder><file stem>`
    ///
    /// Each file seen counts as one object on `progress`. Enumeration failures
    /// abort the walk; entries registered before the failure stay registered.
    pub fn register_folder(
        &self,
        folder: &str,
        kind: AssetKind,
        recursive: bool,
        progress: &ProgressMeter,
    ) -> Result<()> {
        let folder = if folder.ends_with(['/', '\\']) {
            folder.to_string()
        } else {
            format!("{}/", folder)
        };

        let files = self
            .enumerator
            .list_files(&folder, &self.file_extension)
            .map_err(|e| ContentError::io(&folder, e))?;

        for file in files {
            let stem = Path::new(&file)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(&file);
            self.register(&format!("{}{}", folder, stem), kind);
            progress.record_object();
        }

        if recursive {
            let subfolders = self
                .enumerator
                .list_subfolders(&folder)
                .map_err(|e| ContentError::io(&folder, e))?;
            for sub in subfolders {
                self.register_folder(&format!("{}{}/", folder, sub), kind, true, progress)?;
            }
        }

        Ok(())
    }

    /// Load `name` as a `T`, through whichever registry owns it
    pub fn load<T: Send + Sync + 'static>(&self, name: &str) -> Result<Option<Handle<T>>> {
        self.hub.load::<T>(name)
    }

    /// Load `name` without a type check, through whichever registry owns it
    pub fn load_untyped(&self, name: &str) -> Result<Option<AssetHandle>> {
        self.hub.load_untyped(name)
    }

    /// Fetch a name this registry owns
    ///
    /// Returns the cached reference if one exists. Concurrent loads of the same
    /// name wait for the first fetch; the fetcher itself runs with no registry
    /// lock held, so it may load other names. Fetch failures and cyclic loads
    /// are logged and yield `None`; the record stays unloaded.
    pub(crate) fn fetch_owned(&self, name: &str) -> Option<AssetHandle> {
        if self.is_disposed() {
            log::warn!("Load of '{}' through disposed {}", name, self.id);
            return None;
        }

        let current = thread::current().id();
        let kind = {
            let mut fetching = self.in_flight.names.lock();
            loop {
                {
                    let records = self.records.read();
                    let record = records.entries.get(name)?;
                    if let Some(reference) = &record.reference {
                        return Some(reference.clone());
                    }
                    match fetching.get(name).copied() {
                        None => {
                            fetching.insert(name.to_string(), current);
                            break record.kind;
                        }
                        Some(owner) if owner == current => {
                            log::error!("Cyclic load of '{}' through {}", name, self.id);
                            return None;
                        }
                        Some(_) => {}
                    }
                }
                self.in_flight.done.wait(&mut fetching);
            }
        };
        let _guard = FetchGuard {
            in_flight: &self.in_flight,
            name,
        };

        let handle = match self.fetcher.fetch(name, kind) {
            Ok(handle) => handle,
            Err(e) => {
                log::error!("Failed to load '{}' ({:?}): {}", name, kind, e);
                return None;
            }
        };

        let estimate = handle.estimated_bytes();
        let mut records = self.records.write();
        match records.entries.get_mut(name) {
            Some(record) => {
                record.reference = Some(handle.clone());
                if let Some(bytes) = estimate {
                    record.memory_estimate = Some(bytes);
                    self.hub.add_texture_memory(bytes);
                }
            }
            None => log::debug!("'{}' was unregistered from {} while loading", name, self.id),
        }

        Some(handle)
    }

    /// Release every registration, giving up ownership of names this registry owns
    ///
    /// Names owned by other registries are left alone.
    pub fn unregister_all(&self) {
        let released = {
            let mut state = self.hub.lock();
            let mut records = self.records.write();
            let released = records.drain();
            for record in &released {
                state.release_if_owned(&record.name, self.id);
            }
            released
        };
        self.release_memory(&released);
        if !released.is_empty() {
            log::debug!("{} unregistered {} assets", self.id, released.len());
        }
    }

    /// Release a single registration; returns whether `name` was registered
    pub fn unregister_one(&self, name: &str) -> bool {
        let released = {
            let mut state = self.hub.lock();
            let released = self.records.write().remove(name);
            if released.is_some() {
                state.release_if_owned(name, self.id);
            }
            released
        };
        match released {
            Some(record) => {
                self.release_memory(std::slice::from_ref(&record));
                true
            }
            None => false,
        }
    }

    fn release_memory(&self, records: &[AssetRecord]) {
        let bytes: u64 = records.iter().filter_map(|r| r.memory_estimate).sum();
        self.hub.release_texture_memory(bytes);
    }

    /// Unregister everything and detach from the hub; safe to call repeatedly
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }

        let released = {
            let mut state = self.hub.lock();
            state.live.retain(|(id, _)| *id != self.id);
            let mut records = self.records.write();
            let released = records.drain();
            for record in &released {
                state.release_if_owned(&record.name, self.id);
            }
            released
        };
        self.release_memory(&released);
        log::debug!("Disposed {} ({} assets released)", self.id, released.len());
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.records.read().entries.contains_key(name)
    }

    /// Whether this registry holds a loaded reference for `name`
    pub fn is_loaded(&self, name: &str) -> bool {
        self.records
            .read()
            .entries
            .get(name)
            .map(|r| r.reference.is_some())
            .unwrap_or(false)
    }

    /// Whether this registry is the shared owner of `name`
    pub fn owns(&self, name: &str) -> bool {
        self.hub.owner_of(name) == Some(self.id)
    }

    pub fn kind_of(&self, name: &str) -> Option<AssetKind> {
        self.records.read().entries.get(name).map(|r| r.kind)
    }

    /// Snapshot of one private table entry
    pub fn record(&self, name: &str) -> Option<AssetRecord> {
        self.records.read().entries.get(name).cloned()
    }

    /// Registered names in registration order
    pub fn registered_names(&self) -> Vec<String> {
        self.records.read().order.clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().entries.is_empty()
    }

    /// Memory estimate of everything this registry has loaded
    pub fn estimated_memory(&self) -> u64 {
        self.records
            .read()
            .entries
            .values()
            .filter_map(|r| r.memory_estimate)
            .sum()
    }
}

impl Drop for AssetRegistry {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for AssetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetRegistry")
            .field("id", &self.id)
            .field("root_dir", &self.root_dir)
            .field("registered", &self.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
