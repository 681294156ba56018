//! # void_content - Content Blocks and Shared Asset Registries
//!
//! Declarative content loading with:
//! - Content blocks grouping folders and individual assets
//! - Lazy registration ("allow loading") separate from fetching
//! - Shared ownership: a name registered by several blocks is fetched once
//! - Synchronous and worker-pool backed asynchronous loading with progress
//! - Pluggable fetchers and per-kind decoders
//!
//! ## Example
//!
//! ```ignore
//! use void_content::prelude::*;
//!
//! let mut decoders = DecoderTable::new("content", "xnb");
//! decoders.register(MyTextureDecoder);
//!
//! let context = ContentContext::from_disk(ContentConfig::default(), decoders)?;
//!
//! let mut menu = context.create_block("menu");
//! menu.add_folder("/ui/", true, AssetKind::Texture)?;
//! menu.add_asset("/fonts/title", AssetKind::Font)?;
//!
//! // Register everything in the background
//! let op = menu.async_allow_loading(None, None)?;
//! op.wait();
//!
//! // Fetched on first use, by whichever registry owns the name
//! let title: Option<Handle<Font>> = menu.load_asset("/fonts/title")?;
//! ```

pub mod block;
pub mod config;
pub mod context;
pub mod enumerator;
pub mod error;
pub mod fetcher;
pub mod handle;
pub mod hub;
pub mod kind;
pub mod progress;
pub mod registry;
pub mod worker;

pub use block::{AssetSpec, BlockState, ContentBlock, ContentBlockSpec, FolderSpec};
pub use config::{BlockManifest, ContentConfig, ContentManifest};
pub use context::ContentContext;
pub use enumerator::{DirectoryEnumerator, FsEnumerator, MemoryEnumerator};
pub use error::{ContentError, LoadError, LoadResult, Result};
pub use fetcher::{AssetDecoder, AssetFetcher, DecodeContext, DecoderTable, ErasedDecoder};
pub use handle::{AssetHandle, Handle};
pub use hub::{RegistryHub, RegistryId};
pub use kind::{AssetKind, ImageInfo, SurfaceFormat};
pub use progress::{AsyncOperation, CompletionCallback, Correlation, ProgressMeter, ProgressSnapshot};
pub use registry::{AssetRecord, AssetRegistry};
pub use worker::WorkerPool;

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::block::{BlockState, ContentBlock};
    pub use crate::config::ContentConfig;
    pub use crate::context::ContentContext;
    pub use crate::error::{ContentError, LoadError};
    pub use crate::fetcher::{AssetDecoder, AssetFetcher, DecodeContext, DecoderTable};
    pub use crate::handle::{AssetHandle, Handle};
    pub use crate::hub::RegistryHub;
    pub use crate::kind::{AssetKind, ImageInfo, SurfaceFormat};
    pub use crate::progress::AsyncOperation;
}

/// Total estimated resident memory of image-like assets on the process-wide hub
pub fn estimated_texture_memory() -> u64 {
    RegistryHub::global().estimated_texture_memory()
}
