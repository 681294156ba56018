//! Content configuration and block manifests

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::block::ContentBlockSpec;
use crate::error::{ContentError, Result};

/// Content system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Root directory content names are resolved against
    pub root_dir: PathBuf,
    /// Extension of content files, without the dot; empty matches any file
    pub file_extension: String,
    /// Worker threads servicing asynchronous block operations
    ///
    /// Operations from every block share these threads and queue behind one
    /// another when all are busy.
    pub worker_threads: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("content"),
            file_extension: "xnb".to_string(),
            worker_threads: 1,
        }
    }
}

impl ContentConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ContentError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(ContentError::Config(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        if self.file_extension.starts_with('.') {
            return Err(ContentError::Config(format!(
                "file_extension '{}' must not start with '.'",
                self.file_extension
            )));
        }
        Ok(())
    }
}

/// A named block declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockManifest {
    pub name: String,
    #[serde(flatten)]
    pub spec: ContentBlockSpec,
}

/// Declarative list of content blocks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentManifest {
    #[serde(default)]
    pub blocks: Vec<BlockManifest>,
}

impl ContentManifest {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ContentError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    pub fn block(&self, name: &str) -> Option<&BlockManifest> {
        self.blocks.iter().find(|b| b.name == name)
    }
}
