//! Asset kinds and image memory estimates

use serde::{Deserialize, Serialize};

/// Asset kind/type
///
/// Determines which decoder a [`DecoderTable`](crate::fetcher::DecoderTable)
/// dispatches to and whether a memory estimate is computed on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Texture,
    Font,
    Effect,
    Model,
    Sound,
    Data,
}

impl AssetKind {
    /// All kinds, in declaration order
    pub const ALL: [AssetKind; 6] = [
        AssetKind::Texture,
        AssetKind::Font,
        AssetKind::Effect,
        AssetKind::Model,
        AssetKind::Sound,
        AssetKind::Data,
    ];

    /// Whether loads of this kind contribute to the texture memory estimate
    pub fn is_image_like(self) -> bool {
        matches!(self, AssetKind::Texture)
    }

    pub fn name(self) -> &'static str {
        match self {
            AssetKind::Texture => "texture",
            AssetKind::Font => "font",
            AssetKind::Effect => "effect",
            AssetKind::Model => "model",
            AssetKind::Sound => "sound",
            AssetKind::Data => "data",
        }
    }
}

/// Pixel storage format reported by an image-like asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurfaceFormat {
    /// Uncompressed 32-bit RGBA
    #[default]
    Color,
    /// Block compressed, 4 bits per pixel
    Dxt1,
    /// Block compressed, 8 bits per pixel
    Dxt3,
    /// Block compressed, 8 bits per pixel
    Dxt5,
    /// Anything else; estimated as uncompressed
    Other,
}

impl SurfaceFormat {
    /// Divisor applied to the raw RGBA32 footprint
    pub fn compression_divisor(self) -> u64 {
        match self {
            SurfaceFormat::Dxt1 => 8,
            SurfaceFormat::Dxt3 | SurfaceFormat::Dxt5 => 4,
            SurfaceFormat::Color | SurfaceFormat::Other => 1,
        }
    }
}

/// Dimensions and format of a loaded image, used only for memory diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: SurfaceFormat,
}

impl ImageInfo {
    pub fn new(width: u32, height: u32, format: SurfaceFormat) -> Self {
        Self {
            width,
            height,
            format,
        }
    }

    /// Estimated resident size: `width * height * 4` scaled down by the format's divisor
    pub fn estimated_bytes(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * 4 / self.format.compression_divisor()
    }
}
