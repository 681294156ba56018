//! Folder enumeration for folder registration

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};

/// Lists the contents of content folders
///
/// Paths are content-relative (`"/tex/"`, `"tex/sub"`); implementations resolve
/// them against whatever root they were built with. Results are plain names,
/// not paths.
pub trait DirectoryEnumerator: Send + Sync {
    /// File names in `path` whose extension matches `extension` (any file when empty)
    fn list_files(&self, path: &str, extension: &str) -> io::Result<Vec<String>>;

    /// Names of the immediate sub-folders of `path`
    fn list_subfolders(&self, path: &str) -> io::Result<Vec<String>>;
}

fn trim_separators(path: &str) -> &str {
    path.trim_matches(['/', '\\'])
}

fn extension_matches(file: &str, extension: &str) -> bool {
    if extension.is_empty() {
        return true;
    }
    Path::new(file)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Enumerates a real directory tree
#[derive(Debug, Clone)]
pub struct FsEnumerator {
    root: PathBuf,
}

impl FsEnumerator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(trim_separators(path))
    }

    fn entries(&self, path: &str, want_dirs: bool) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.resolve(path))? {
            let entry = entry?;
            if entry.file_type()?.is_dir() != want_dirs {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

impl DirectoryEnumerator for FsEnumerator {
    fn list_files(&self, path: &str, extension: &str) -> io::Result<Vec<String>> {
        let mut files = self.entries(path, false)?;
        files.retain(|f| extension_matches(f, extension));
        Ok(files)
    }

    fn list_subfolders(&self, path: &str) -> io::Result<Vec<String>> {
        self.entries(path, true)
    }
}

/// In-memory folder tree
///
/// Useful for hosts that pack content into archives and for tests.
#[derive(Debug, Clone)]
pub struct MemoryEnumerator {
    folders: BTreeSet<String>,
    files: BTreeSet<String>,
}

impl MemoryEnumerator {
    pub fn new() -> Self {
        let mut folders = BTreeSet::new();
        folders.insert(String::new());
        Self {
            folders,
            files: BTreeSet::new(),
        }
    }

    /// Add a file, creating its parent folders
    pub fn add_file(&mut self, path: &str) -> &mut Self {
        let path = trim_separators(path).replace('\\', "/");
        if let Some((parent, _)) = path.rsplit_once('/') {
            self.add_folder(parent);
        }
        self.files.insert(path);
        self
    }

    /// Add a (possibly empty) folder and its ancestors
    pub fn add_folder(&mut self, path: &str) -> &mut Self {
        let path = trim_separators(path).replace('\\', "/");
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);
            self.folders.insert(current.clone());
        }
        self
    }

    fn folder_key(&self, path: &str) -> io::Result<String> {
        let key = trim_separators(path).replace('\\', "/");
        if self.folders.contains(&key) {
            Ok(key)
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such folder: {}", path),
            ))
        }
    }

    fn children<'a>(
        entries: &'a BTreeSet<String>,
        key: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        entries.iter().filter_map(move |entry| {
            let rest = if key.is_empty() {
                entry.as_str()
            } else {
                entry.strip_prefix(key)?.strip_prefix('/')?
            };
            (!rest.is_empty() && !rest.contains('/')).then_some(rest)
        })
    }
}

impl Default for MemoryEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryEnumerator for MemoryEnumerator {
    fn list_files(&self, path: &str, extension: &str) -> io::Result<Vec<String>> {
        let key = self.folder_key(path)?;
        Ok(Self::children(&self.files, &key)
            .filter(|f| extension_matches(f, extension))
            .map(str::to_string)
            .collect())
    }

    fn list_subfolders(&self, path: &str) -> io::Result<Vec<String>> {
        let key = self.folder_key(path)?;
        Ok(Self::children(&self.folders, &key)
            .map(str::to_string)
            .collect())
    }
}
