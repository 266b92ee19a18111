//! Entrypoint resolution.

use std::io;

use super::TEST_MODULE_SUFFIX;
use super::handler::SourceHandler;
use super::path_loader::PathLoader;

/// The entrypoint for a compilation: a single source file or a directory of
/// modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entrypoint(pub String);

impl Entrypoint {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }

    /// The directory containing the entrypoint, used as the root for the
    /// package cache.
    pub fn root_directory(&self, path_loader: &dyn PathLoader) -> String {
        if path_loader.is_directory(&self.0) {
            self.0.clone()
        } else {
            parent_directory(&self.0)
        }
    }

    /// Resolves the entrypoint to an ordered list of source paths. A file
    /// entrypoint yields itself; a directory yields every matching source
    /// file directly within it, skipping test modules.
    pub fn entrypoint_paths(
        &self,
        path_loader: &dyn PathLoader,
        handlers: &[std::sync::Arc<dyn SourceHandler>],
    ) -> io::Result<Vec<String>> {
        if path_loader.is_source_file(&self.0) {
            return Ok(vec![self.0.clone()]);
        }

        if !path_loader.is_directory(&self.0) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("entrypoint '{}' does not exist", self.0),
            ));
        }

        let mut paths = Vec::new();
        for entry in path_loader.load_directory(&self.0)? {
            if entry.is_directory || is_test_module(&entry.name) {
                continue;
            }
            if handlers
                .iter()
                .any(|handler| entry.name.ends_with(handler.package_file_extension()))
            {
                paths.push(join_paths(&self.0, &entry.name));
            }
        }
        Ok(paths)
    }
}

pub(super) fn is_test_module(name: &str) -> bool {
    name.contains(&format!("{TEST_MODULE_SUFFIX}."))
}

/// Joins two path segments with a `/`, trimming any duplicate separator.
pub(super) fn join_paths(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name)
}

/// The parent directory of a path, or `.` when it has none.
pub(super) fn parent_directory(path: &str) -> String {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => parent.to_owned(),
        _ => ".".to_owned(),
    }
}

/// Normalizes `.` and `..` segments out of a joined path.
pub(super) fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.last().is_some_and(|last| *last != "..") {
                    segments.pop();
                } else {
                    segments.push("..");
                }
            }
            other => segments.push(other),
        }
    }

    let mut normalized = segments.join("/");
    if path.starts_with('/') {
        normalized.insert(0, '/');
    }
    if normalized.is_empty() {
        normalized.push('.');
    }
    normalized
}
