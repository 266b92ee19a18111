//! Filesystem access for the package loader.

use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::sync::RwLock;
use std::time::UNIX_EPOCH;

/// A single entry in a loaded directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub name: String,
    pub is_directory: bool,
}

/// Abstracts path access so the loader can run against the local filesystem
/// or an in-memory double.
pub trait PathLoader: Send + Sync {
    fn load_source_file(&self, path: &str) -> io::Result<String>;
    fn load_directory(&self, path: &str) -> io::Result<Vec<DirectoryEntry>>;
    fn is_source_file(&self, path: &str) -> bool;
    fn is_directory(&self, path: &str) -> bool;

    /// An opaque revision id for the file, changing whenever its contents
    /// change.
    fn revision_id(&self, path: &str) -> io::Result<String>;

    /// Whether the given directory is the root of a VCS checkout.
    fn is_vcs_root(&self, path: &str) -> bool;
}

/// Loads from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalPathLoader;

impl PathLoader for LocalPathLoader {
    fn load_source_file(&self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn load_directory(&self, path: &str) -> io::Result<Vec<DirectoryEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            entries.push(DirectoryEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_directory: entry.file_type()?.is_dir(),
            });
        }
        // Directory iteration order is platform-dependent; sort for the
        // loader's determinism guarantee.
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn is_source_file(&self, path: &str) -> bool {
        Path::new(path).is_file()
    }

    fn is_directory(&self, path: &str) -> bool {
        Path::new(path).is_dir()
    }

    fn revision_id(&self, path: &str) -> io::Result<String> {
        let metadata = std::fs::metadata(path)?;
        let modified = metadata.modified()?;
        let stamp = modified
            .duration_since(UNIX_EPOCH)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
        Ok(format!("{}:{}", stamp.as_nanos(), metadata.len()))
    }

    fn is_vcs_root(&self, path: &str) -> bool {
        Path::new(path).join(".git").exists()
    }
}

/// In-memory path loader for tests: a map of file path to contents, plus a
/// set of VCS-root markers.
#[derive(Debug, Default)]
pub struct MapPathLoader {
    files: RwLock<BTreeMap<String, String>>,
    vcs_roots: RwLock<Vec<String>>,
}

impl MapPathLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl Into<String>, contents: impl Into<String>) {
        self.files
            .write()
            .unwrap()
            .insert(path.into(), contents.into());
    }

    pub fn mark_vcs_root(&self, path: impl Into<String>) {
        self.vcs_roots.write().unwrap().push(path.into());
    }
}

impl PathLoader for MapPathLoader {
    fn load_source_file(&self, path: &str) -> io::Result<String> {
        self.files
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.to_owned()))
    }

    fn load_directory(&self, path: &str) -> io::Result<Vec<DirectoryEntry>> {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        let files = self.files.read().unwrap();

        let mut entries: Vec<DirectoryEntry> = Vec::new();
        for file_path in files.keys() {
            let Some(rest) = file_path.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((directory, _)) => {
                    let entry = DirectoryEntry {
                        name: directory.to_owned(),
                        is_directory: true,
                    };
                    if !entries.contains(&entry) {
                        entries.push(entry);
                    }
                }
                None => entries.push(DirectoryEntry {
                    name: rest.to_owned(),
                    is_directory: false,
                }),
            }
        }

        if entries.is_empty() && !self.is_directory(path) {
            return Err(io::Error::new(io::ErrorKind::NotFound, path.to_owned()));
        }
        Ok(entries)
    }

    fn is_source_file(&self, path: &str) -> bool {
        self.files.read().unwrap().contains_key(path)
    }

    fn is_directory(&self, path: &str) -> bool {
        let prefix = format!("{}/", path.trim_end_matches('/'));
        self.files
            .read()
            .unwrap()
            .keys()
            .any(|file_path| file_path.starts_with(&prefix))
    }

    fn revision_id(&self, path: &str) -> io::Result<String> {
        let contents = self.load_source_file(path)?;
        Ok(format!("len:{}", contents.len()))
    }

    fn is_vcs_root(&self, path: &str) -> bool {
        self.vcs_roots
            .read()
            .unwrap()
            .iter()
            .any(|root| root == path)
    }
}
