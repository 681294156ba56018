//! Asset Fetcher - the seam between registries and storage
//!
//! Registries never touch bytes themselves. They ask an [`AssetFetcher`] for
//! a named asset of a given kind. [`DecoderTable`] is the stock fetcher: it
//! reads files under a root directory and dispatches on [`AssetKind`] to a
//! table of registered decoders, so new kinds plug in without touching the
//! dispatch code.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{LoadError, LoadResult};
use crate::handle::AssetHandle;
use crate::kind::{AssetKind, ImageInfo};

/// Loads an asset of a given kind by name from underlying storage
pub trait AssetFetcher: Send + Sync {
    fn fetch(&self, name: &str, kind: AssetKind) -> LoadResult<AssetHandle>;
}

impl<F> AssetFetcher for F
where
    F: Fn(&str, AssetKind) -> LoadResult<AssetHandle> + Send + Sync,
{
    fn fetch(&self, name: &str, kind: AssetKind) -> LoadResult<AssetHandle> {
        self(name, kind)
    }
}

/// Context provided to decoders
pub struct DecodeContext<'a> {
    /// Registered asset name
    pub name: &'a str,
    /// Kind requested by the registry
    pub kind: AssetKind,
    /// Raw file contents
    pub data: &'a [u8],
}

impl<'a> DecodeContext<'a> {
    pub fn new(name: &'a str, kind: AssetKind, data: &'a [u8]) -> Self {
        Self { name, kind, data }
    }

    /// Read data as string (UTF-8)
    pub fn read_string(&self) -> LoadResult<&str> {
        core::str::from_utf8(self.data)
            .map_err(|e| LoadError::Decode(format!("{}: invalid UTF-8: {}", self.name, e)))
    }
}

/// Trait for typed decoders
pub trait AssetDecoder: Send + Sync {
    /// Asset type this decoder produces
    type Asset: Send + Sync + 'static;

    /// Kind this decoder handles
    fn kind(&self) -> AssetKind;

    /// Turn raw bytes into an asset
    fn decode(&self, ctx: &DecodeContext) -> LoadResult<Self::Asset>;

    /// Image dimensions of a decoded asset, if it has any
    fn image_info(&self, _asset: &Self::Asset) -> Option<ImageInfo> {
        None
    }

    fn asset_type_name(&self) -> &'static str {
        core::any::type_name::<Self::Asset>()
    }
}

/// Type-erased decoder
pub trait ErasedDecoder: Send + Sync {
    fn kind(&self) -> AssetKind;

    fn decode_erased(&self, ctx: &DecodeContext) -> LoadResult<AssetHandle>;

    fn asset_type_name(&self) -> &'static str;
}

impl<D: AssetDecoder> ErasedDecoder for D {
    fn kind(&self) -> AssetKind {
        AssetDecoder::kind(self)
    }

    fn decode_erased(&self, ctx: &DecodeContext) -> LoadResult<AssetHandle> {
        let asset = self.decode(ctx)?;
        let image = self.image_info(&asset);
        let handle = AssetHandle::new(ctx.name, ctx.kind, asset);
        Ok(match image {
            Some(info) => handle.with_image(info),
            None => handle,
        })
    }

    fn asset_type_name(&self) -> &'static str {
        AssetDecoder::asset_type_name(self)
    }
}

/// File-backed fetcher dispatching on asset kind
pub struct DecoderTable {
    root: PathBuf,
    extension: String,
    decoders: HashMap<AssetKind, Box<dyn ErasedDecoder>>,
}

impl DecoderTable {
    /// Create an empty table reading `<root>/<name>.<extension>`
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
            decoders: HashMap::new(),
        }
    }

    /// Register a decoder, replacing any previous decoder for the same kind
    pub fn register<D: AssetDecoder + 'static>(&mut self, decoder: D) -> &mut Self {
        self.register_erased(Box::new(decoder))
    }

    pub fn register_erased(&mut self, decoder: Box<dyn ErasedDecoder>) -> &mut Self {
        let kind = decoder.kind();
        if let Some(old) = self.decoders.insert(kind, decoder) {
            log::debug!("Replaced {:?} decoder ({})", kind, old.asset_type_name());
        }
        self
    }

    /// Check if a kind has a decoder
    pub fn supports(&self, kind: AssetKind) -> bool {
        self.decoders.contains_key(&kind)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path an asset name resolves to
    pub fn path_for(&self, name: &str) -> PathBuf {
        let relative = name.trim_start_matches(['/', '\\']);
        let mut path = self.root.join(relative);
        if !self.extension.is_empty() {
            let file = match path.file_name() {
                Some(file) => format!("{}.{}", file.to_string_lossy(), self.extension),
                None => return path,
            };
            path.set_file_name(file);
        }
        path
    }
}

impl AssetFetcher for DecoderTable {
    fn fetch(&self, name: &str, kind: AssetKind) -> LoadResult<AssetHandle> {
        let decoder = self
            .decoders
            .get(&kind)
            .ok_or(LoadError::UnsupportedKind(kind))?;

        let path = self.path_for(name);
        let data = std::fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LoadError::NotFound(path.display().to_string()),
            _ => LoadError::Io(format!("{}: {}", path.display(), e)),
        })?;

        decoder.decode_erased(&DecodeContext::new(name, kind, &data))
    }
}

/// Built-in decoders
pub mod decoders {
    use super::*;

    /// Raw bytes asset
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Bytes(pub Vec<u8>);

    /// Text asset
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Text(pub String);

    /// Keeps file contents as-is
    pub struct BytesDecoder {
        pub kind: AssetKind,
    }

    impl BytesDecoder {
        pub fn new(kind: AssetKind) -> Self {
            Self { kind }
        }
    }

    impl AssetDecoder for BytesDecoder {
        type Asset = Bytes;

        fn kind(&self) -> AssetKind {
            self.kind
        }

        fn decode(&self, ctx: &DecodeContext) -> LoadResult<Self::Asset> {
            Ok(Bytes(ctx.data.to_vec()))
        }
    }

    /// Decodes file contents as UTF-8
    pub struct TextDecoder {
        pub kind: AssetKind,
    }

    impl TextDecoder {
        pub fn new(kind: AssetKind) -> Self {
            Self { kind }
        }
    }

    impl AssetDecoder for TextDecoder {
        type Asset = Text;

        fn kind(&self) -> AssetKind {
            self.kind
        }

        fn decode(&self, ctx: &DecodeContext) -> LoadResult<Self::Asset> {
            Ok(Text(ctx.read_string()?.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::decoders::{Bytes, BytesDecoder, Text, TextDecoder};
    use super::*;
    use crate::kind::SurfaceFormat;

    struct SquareTexture;

    struct Square(u32);

    impl AssetDecoder for SquareTexture {
        type Asset = Square;

        fn kind(&self) -> AssetKind {
            AssetKind::Texture
        }

        fn decode(&self, ctx: &DecodeContext) -> LoadResult<Square> {
            Ok(Square(ctx.data.len() as u32))
        }

        fn image_info(&self, asset: &Square) -> Option<ImageInfo> {
            Some(ImageInfo::new(asset.0, asset.0, SurfaceFormat::Dxt1))
        }
    }

    #[test]
    fn test_path_for_strips_leading_separator() {
        let table = DecoderTable::new("/content", "xnb");
        assert_eq!(table.path_for("/tex/a"), PathBuf::from("/content/tex/a.xnb"));
        assert_eq!(table.path_for("icon"), PathBuf::from("/content/icon.xnb"));

        let bare = DecoderTable::new("/content", "");
        assert_eq!(bare.path_for("/tex/a"), PathBuf::from("/content/tex/a"));
    }

    #[test]
    fn test_fetch_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("text")).unwrap();
        std::fs::write(dir.path().join("text/hello.xnb"), b"Hello, World!").unwrap();

        let mut table = DecoderTable::new(dir.path(), "xnb");
        table.register(TextDecoder::new(AssetKind::Data));

        let handle = table.fetch("/text/hello", AssetKind::Data).unwrap();
        assert_eq!(handle.downcast_ref::<Text>().unwrap().0, "Hello, World!");
    }

    #[test]
    fn test_fetch_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut table = DecoderTable::new(dir.path(), "xnb");
        table.register(BytesDecoder::new(AssetKind::Sound));

        let err = table.fetch("nope", AssetKind::Sound).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }

    #[test]
    fn test_fetch_unsupported_kind() {
        let table = DecoderTable::new(".", "xnb");
        let err = table.fetch("anything", AssetKind::Model).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedKind(AssetKind::Model)));
    }

    #[test]
    fn test_decoder_reports_image_info() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("icon.xnb"), [0u8; 8]).unwrap();

        let mut table = DecoderTable::new(dir.path(), "xnb");
        table.register(SquareTexture).register(BytesDecoder::new(AssetKind::Data));
        assert!(table.supports(AssetKind::Texture));
        assert!(table.supports(AssetKind::Data));

        let handle = table.fetch("icon", AssetKind::Texture).unwrap();
        // 8 * 8 * 4 / 8
        assert_eq!(handle.estimated_bytes(), Some(32));
        assert!(!handle.is::<Bytes>());
    }

    #[test]
    fn test_closure_fetcher() {
        let fetcher = |name: &str, kind: AssetKind| -> LoadResult<AssetHandle> {
            Ok(AssetHandle::new(name, kind, 7u32))
        };
        let handle = fetcher.fetch("n", AssetKind::Data).unwrap();
        assert_eq!(handle.downcast_ref::<u32>(), Some(&7));
    }
}
