//! Asset Handle - Reference to loaded assets
//!
//! [`AssetHandle`] is what a fetcher produces and what a registry's private
//! table stores. [`Handle<T>`] is the typed view handed back to callers.

use core::any::Any;
use core::fmt;
use core::ops::Deref;
use std::sync::Arc;

use crate::kind::{AssetKind, ImageInfo};

/// Type-erased, reference-counted handle to a loaded asset payload
#[derive(Clone)]
pub struct AssetHandle {
    name: Arc<str>,
    kind: AssetKind,
    payload: Arc<dyn Any + Send + Sync>,
    image: Option<ImageInfo>,
}

impl AssetHandle {
    /// Wrap a freshly decoded asset
    pub fn new<T: Send + Sync + 'static>(name: &str, kind: AssetKind, asset: T) -> Self {
        Self::from_arc(name, kind, Arc::new(asset))
    }

    /// Wrap an already shared payload
    pub fn from_arc(name: &str, kind: AssetKind, payload: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            name: Arc::from(name),
            kind,
            payload,
            image: None,
        }
    }

    /// Attach image dimensions so the asset contributes to memory estimates
    pub fn with_image(mut self, image: ImageInfo) -> Self {
        self.image = Some(image);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn image(&self) -> Option<ImageInfo> {
        self.image
    }

    /// Memory estimate, present only for image-like kinds that reported dimensions
    pub fn estimated_bytes(&self) -> Option<u64> {
        if !self.kind.is_image_like() {
            return None;
        }
        self.image.map(|info| info.estimated_bytes())
    }

    /// Check whether the payload is a `T`
    pub fn is<T: Send + Sync + 'static>(&self) -> bool {
        self.payload.is::<T>()
    }

    /// Borrow the payload as a `T`
    pub fn downcast_ref<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// Get a typed handle sharing this payload
    pub fn typed<T: Send + Sync + 'static>(&self) -> Option<Handle<T>> {
        let asset = Arc::clone(&self.payload).downcast::<T>().ok()?;
        Some(Handle {
            name: Arc::clone(&self.name),
            asset,
        })
    }

    /// Whether two handles point at the same payload
    pub fn ptr_eq(&self, other: &AssetHandle) -> bool {
        Arc::ptr_eq(&self.payload, &other.payload)
    }

    /// Number of live references to the payload
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.payload)
    }
}

impl fmt::Debug for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetHandle")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("image", &self.image)
            .finish()
    }
}

/// Strong, typed handle to a loaded asset
pub struct Handle<T> {
    name: Arc<str>,
    asset: Arc<T>,
}

impl<T> Handle<T> {
    /// Name the asset was registered under
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared pointer to the asset
    pub fn arc(&self) -> &Arc<T> {
        &self.asset
    }

    pub fn ptr_eq(&self, other: &Handle<T>) -> bool {
        Arc::ptr_eq(&self.asset, &other.asset)
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            asset: Arc::clone(&self.asset),
        }
    }
}

impl<T> Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.asset
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("name", &self.name)
            .field("refs", &Arc::strong_count(&self.asset))
            .finish()
    }
}
