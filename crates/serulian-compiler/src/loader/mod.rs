//! Package loading: resolves an entrypoint and its transitive imports into a
//! set of source modules.
//!
//! - `entrypoint` - entrypoint path resolution
//! - `path_loader` - filesystem access (production and test doubles)
//! - `package_map` - the loaded package map
//! - `source_tracker` - per-file contents, revisions, and position mapping
//! - `handler` - the source-handler plugin interface
//! - `vcs` - VCS path parsing, cache layout, and the checkout client boundary
//! - `loader` - the concurrent package loader itself

mod entrypoint;
mod handler;
mod loader;
mod package_map;
mod path_loader;
mod source_tracker;
pub mod vcs;


pub use entrypoint::Entrypoint;
pub use handler::{SourceHandler, SourceHandlerParser};
pub use loader::{Library, LoadResult, LoaderConfig, PackageLoader};
pub use package_map::{PackageInfo, PackageMap};
pub use path_loader::{DirectoryEntry, LocalPathLoader, MapPathLoader, PathLoader};
pub use source_tracker::SourceTracker;

/// Builds package maps directly in unit tests, without running a load.
#[cfg(test)]
pub(crate) fn package_map_for_tests() -> package_map::MutablePackageMap {
    package_map::MutablePackageMap::new()
}

/// The directory under the entrypoint root holding cached VCS packages.
pub const PACKAGE_CACHE_DIRECTORY: &str = ".pkg";

/// Suffix marking test modules, which are skipped when loading a package.
pub const TEST_MODULE_SUFFIX: &str = "_test";
