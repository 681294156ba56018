//! Registry Hub - shared ownership of asset names
//!
//! Every live [`AssetRegistry`] is attached to a hub. The hub records which
//! registry is the loader-of-record for each asset name that has been loaded
//! at least once, and resolves unclaimed names by scanning live registries in
//! creation order. First load wins; ownership is only ever released by the
//! owner itself.
//!
//! One mutex guards both the ownership table and the live-registry list. It is
//! always taken before any registry's private table, never after.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, MutexGuard};

use crate::error::{ContentError, LoadError, Result};
use crate::handle::{AssetHandle, Handle};
use crate::registry::AssetRegistry;

/// Identifier of a registry within its hub
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegistryId(u64);

impl RegistryId {
    pub const fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "registry#{}", self.0)
    }
}

/// State behind the hub mutex
pub(crate) struct HubState {
    /// Asset name -> owning registry
    pub(crate) owners: HashMap<String, RegistryId>,
    /// Live registries in creation order
    pub(crate) live: Vec<(RegistryId, Weak<AssetRegistry>)>,
}

impl HubState {
    fn registry(&self, id: RegistryId) -> Option<Arc<AssetRegistry>> {
        self.live
            .iter()
            .find(|(live_id, _)| *live_id == id)
            .and_then(|(_, weak)| weak.upgrade())
    }

    fn claim(&mut self, name: &str, id: RegistryId) -> Result<()> {
        if self.owners.contains_key(name) {
            return Err(ContentError::DuplicateOwnership(name.to_string()));
        }
        self.owners.insert(name.to_string(), id);
        Ok(())
    }

    /// Drop `name` from the ownership table if `id` owns it
    pub(crate) fn release_if_owned(&mut self, name: &str, id: RegistryId) -> bool {
        if self.owners.get(name) == Some(&id) {
            self.owners.remove(name);
            true
        } else {
            false
        }
    }
}

static GLOBAL_HUB: OnceCell<Arc<RegistryHub>> = OnceCell::new();

/// Shared ownership table plus the list of live registries
pub struct RegistryHub {
    state: Mutex<HubState>,
    next_id: AtomicU64,
    texture_memory: AtomicU64,
}

impl RegistryHub {
    /// Create an independent hub
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(HubState {
                owners: HashMap::new(),
                live: Vec::new(),
            }),
            next_id: AtomicU64::new(1),
            texture_memory: AtomicU64::new(0),
        })
    }

    /// The process-wide hub
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL_HUB.get_or_init(RegistryHub::new))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock()
    }

    /// Add a registry to the live list
    pub(crate) fn attach(&self, registry: Weak<AssetRegistry>) -> RegistryId {
        let id = RegistryId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.state.lock().live.push((id, registry));
        log::debug!("Attached {}", id);
        id
    }

    /// Load `name` as a `T` through whichever registry owns it
    ///
    /// Returns `Ok(None)` if no live registry has registered the name, if the
    /// fetch failed, or if the payload is not a `T`.
    pub fn load<T: Send + Sync + 'static>(&self, name: &str) -> Result<Option<Handle<T>>> {
        let Some(handle) = self.load_untyped(name)? else {
            return Ok(None);
        };
        let typed = handle.typed::<T>();
        if typed.is_none() {
            log::warn!("{}", LoadError::type_mismatch::<T>(name));
        }
        Ok(typed)
    }

    /// Load `name` without a type check
    pub fn load_untyped(&self, name: &str) -> Result<Option<AssetHandle>> {
        match self.resolve_owner(name)? {
            Some(owner) => Ok(owner.fetch_owned(name)),
            None => Ok(None),
        }
    }

    /// Find the owner of `name`, claiming it for the first registrant if unowned
    pub(crate) fn resolve_owner(&self, name: &str) -> Result<Option<Arc<AssetRegistry>>> {
        // Upgraded registries must outlive the guard: dropping the last strong
        // reference runs the registry's dispose, which takes this lock.
        let mut upgraded: Vec<(RegistryId, Arc<AssetRegistry>)> = Vec::new();
        let mut state = self.state.lock();

        if let Some(&owner_id) = state.owners.get(name) {
            if let Some(owner) = state.registry(owner_id) {
                drop(state);
                return Ok(Some(owner));
            }
            // Owner is mid-drop and has not detached yet
            state.owners.remove(name);
        }

        upgraded.extend(
            state
                .live
                .iter()
                .filter_map(|(id, weak)| weak.upgrade().map(|registry| (*id, registry))),
        );

        let Some((id, registry)) = upgraded
            .iter()
            .find(|(_, registry)| registry.is_registered(name))
            .map(|(id, registry)| (*id, Arc::clone(registry)))
        else {
            return Ok(None);
        };

        state.claim(name, id)?;
        log::debug!("{} now owns '{}'", id, name);
        drop(state);
        Ok(Some(registry))
    }

    /// Current owner of `name`, if it has been claimed
    pub fn owner_of(&self, name: &str) -> Option<RegistryId> {
        self.state.lock().owners.get(name).copied()
    }

    /// Number of names with a shared owner
    pub fn owned_count(&self) -> usize {
        self.state.lock().owners.len()
    }

    /// Number of registries attached and not yet disposed
    pub fn live_registry_count(&self) -> usize {
        self.state.lock().live.len()
    }

    /// Total estimated resident memory of loaded image-like assets
    pub fn estimated_texture_memory(&self) -> u64 {
        self.texture_memory.load(Ordering::Relaxed)
    }

    pub(crate) fn add_texture_memory(&self, bytes: u64) {
        self.texture_memory.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn release_texture_memory(&self, bytes: u64) {
        if bytes == 0 {
            return;
        }
        let _ = self
            .texture_memory
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                Some(current.saturating_sub(bytes))
            });
    }
}

impl fmt::Debug for RegistryHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("RegistryHub")
            .field("live", &state.live.len())
            .field("owned", &state.owners.len())
            .field("texture_memory", &self.estimated_texture_memory())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_is_shared() {
        let a = RegistryHub::global();
        let b = RegistryHub::global();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_texture_memory_saturates() {
        let hub = RegistryHub::new();
        hub.add_texture_memory(100);
        hub.release_texture_memory(40);
        assert_eq!(hub.estimated_texture_memory(), 60);
        hub.release_texture_memory(1000);
        assert_eq!(hub.estimated_texture_memory(), 0);
    }

    #[test]
    fn test_claim_twice_is_duplicate_ownership() {
        let hub = RegistryHub::new();
        let mut state = hub.lock();
        state.claim("n", RegistryId(1)).unwrap();
        let err = state.claim("n", RegistryId(2)).unwrap_err();
        assert!(matches!(err, ContentError::DuplicateOwnership(name) if name == "n"));

        assert!(!state.release_if_owned("n", RegistryId(2)));
        assert!(state.release_if_owned("n", RegistryId(1)));
        assert!(state.owners.is_empty());
    }

    #[test]
    fn test_unknown_name_is_absent() {
        let hub = RegistryHub::new();
        assert!(hub.load::<u32>("nothing").unwrap().is_none());
        assert!(hub.owner_of("nothing").is_none());
    }
}
