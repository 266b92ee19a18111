//! The loaded package map.

use std::sync::Mutex;

use indexmap::IndexMap;

use crate::source::InputSource;

/// Information about a single loaded package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    kind: String,
    reference_id: String,
    module_paths: Vec<InputSource>,
}

impl PackageInfo {
    pub fn new(
        kind: impl Into<String>,
        reference_id: impl Into<String>,
        module_paths: Vec<InputSource>,
    ) -> Self {
        Self {
            kind: kind.into(),
            reference_id: reference_id.into(),
            module_paths,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn reference_id(&self) -> &str {
        &self.reference_id
    }

    pub fn module_paths(&self) -> &[InputSource] {
        &self.module_paths
    }
}

/// Read-only map of `(kind, reference id)` to package info, frozen once
/// loading completes.
#[derive(Debug, Clone, Default)]
pub struct PackageMap {
    packages: IndexMap<(String, String), PackageInfo>,
}

impl PackageMap {
    pub fn get(&self, kind: &str, reference_id: &str) -> Option<&PackageInfo> {
        self.packages
            .get(&(kind.to_owned(), reference_id.to_owned()))
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageInfo> {
        self.packages.values()
    }
}

impl PartialEq for PackageMap {
    fn eq(&self, other: &Self) -> bool {
        self.packages.iter().eq(other.packages.iter())
    }
}

/// Concurrent accumulation side of the package map, used during loading.
#[derive(Debug, Default)]
pub(crate) struct MutablePackageMap {
    packages: Mutex<Vec<((String, String), PackageInfo)>>,
}

impl MutablePackageMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, kind: &str, reference_id: &str, info: PackageInfo) {
        self.packages
            .lock()
            .unwrap()
            .push(((kind.to_owned(), reference_id.to_owned()), info));
    }

    /// Freezes into the read-only map, sorted by key so the result is
    /// identical across runs regardless of load interleaving.
    pub fn build(self) -> PackageMap {
        let mut entries = self.packages.into_inner().unwrap();
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut packages = IndexMap::new();
        for (key, info) in entries {
            packages.entry(key).or_insert(info);
        }
        PackageMap { packages }
    }
}
