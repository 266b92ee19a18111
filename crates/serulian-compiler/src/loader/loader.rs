//! The concurrent package loader.
//!
//! Loading fans out on a rayon scope: every discovered path becomes a task,
//! imports reported by parsers enqueue further tasks, and the scope joins
//! when no work remains. Paths are deduplicated by `(path, kind)`; VCS
//! checkouts serialize per URL so only one checkout runs at a time.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use rayon::Scope;
use rustc_hash::FxHashMap;
use tracing::{debug, info_span, warn};

use crate::cancel::CancellationToken;
use crate::diagnostics::Diagnostics;
use crate::parser::{ImportKind, ImportRequest};
use crate::source::{InputSource, SourceRange};

use super::entrypoint::{Entrypoint, is_test_module, join_paths, normalize_path, parent_directory};
use super::handler::{SourceHandler, SourceHandlerParser};
use super::package_map::{MutablePackageMap, PackageInfo, PackageMap};
use super::path_loader::PathLoader;
use super::source_tracker::{MutableSourceTracker, SourceTracker};
use super::vcs::{VcsClient, VcsPath};
use super::PACKAGE_CACHE_DIRECTORY;

/// A reference to an external library to load alongside the entrypoint.
#[derive(Debug, Clone)]
pub struct Library {
    /// The import alias for this library.
    pub alias: String,
    /// The file location or SCM URL of the library's package.
    pub path_or_url: String,
    /// If true, `path_or_url` is treated as a remote SCM package.
    pub is_scm: bool,
    /// The kind of the library; empty for Serulian packages.
    pub kind: String,
}

/// Configuration for one load.
pub struct LoaderConfig {
    pub entrypoint: Entrypoint,
    pub path_loader: Arc<dyn PathLoader>,
    pub vcs_client: Arc<dyn VcsClient>,
    pub source_handlers: Vec<Arc<dyn SourceHandler>>,
    /// Directories checked for VCS packages before any remote checkout.
    pub vcs_development_directories: Vec<String>,
    pub cancellation: CancellationToken,
}

/// The result of attempting to load all packages and source files.
pub struct LoadResult {
    /// True on success, false otherwise.
    pub status: bool,
    pub diagnostics: Diagnostics,
    pub package_map: PackageMap,
    pub source_tracker: SourceTracker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PathKind {
    SourceFile,
    LocalPackage,
    VcsPackage,
}

#[derive(Clone)]
struct PathInformation {
    reference_id: String,
    kind: PathKind,
    path: String,
    source_kind: String,
    source_range: SourceRange,
}

/// Loads a Serulian package and its transitive dependencies from a directory
/// or set of directories.
pub struct PackageLoader {
    entrypoint: Entrypoint,
    path_loader: Arc<dyn PathLoader>,
    vcs_client: Arc<dyn VcsClient>,
    vcs_development_directories: Vec<String>,
    cancellation: CancellationToken,

    handlers: FxHashMap<String, Arc<dyn SourceHandler>>,
    parsers: FxHashMap<String, Box<dyn SourceHandlerParser>>,
    libraries: FxHashMap<String, Library>,

    encountered: DashMap<(String, String), ()>,
    vcs_loaded: DashMap<String, Option<String>>,
    vcs_locks: DashMap<String, Arc<Mutex<()>>>,

    package_map: MutablePackageMap,
    source_tracker: MutableSourceTracker,
    issues: Mutex<Diagnostics>,
}

impl PackageLoader {
    pub fn new(config: LoaderConfig) -> Self {
        let mut handlers = FxHashMap::default();
        let mut parsers = FxHashMap::default();
        for handler in config.source_handlers {
            parsers.insert(handler.kind().to_owned(), handler.new_parser());
            handlers.insert(handler.kind().to_owned(), handler);
        }

        Self {
            entrypoint: config.entrypoint,
            path_loader: config.path_loader,
            vcs_client: config.vcs_client,
            vcs_development_directories: config.vcs_development_directories,
            cancellation: config.cancellation,
            handlers,
            parsers,
            libraries: FxHashMap::default(),
            encountered: DashMap::new(),
            vcs_loaded: DashMap::new(),
            vcs_locks: DashMap::new(),
            package_map: MutablePackageMap::new(),
            source_tracker: MutableSourceTracker::new(),
            issues: Mutex::new(Diagnostics::new()),
        }
    }

    /// Performs the load of the entrypoint package plus any libraries.
    pub fn load(mut self, libraries: Vec<Library>) -> LoadResult {
        let _span = info_span!("load", entrypoint = %self.entrypoint.path()).entered();

        for library in &libraries {
            self.libraries.insert(library.alias.clone(), library.clone());
        }

        let handlers: Vec<Arc<dyn SourceHandler>> = self.handlers.values().cloned().collect();
        let entrypoint_paths =
            match self.entrypoint.entrypoint_paths(&*self.path_loader, &handlers) {
                Ok(paths) => paths,
                Err(err) => {
                    let mut diagnostics = Diagnostics::new();
                    diagnostics.error(
                        SourceRange::at(InputSource::from(self.entrypoint.path()), 0),
                        format!("could not resolve entrypoint path: {err}"),
                    );
                    return LoadResult {
                        status: false,
                        diagnostics,
                        package_map: PackageMap::default(),
                        source_tracker: SourceTracker::default(),
                    };
                }
            };

        let loader = &self;
        rayon::scope(|scope| {
            for path in entrypoint_paths {
                let range = SourceRange::at(InputSource::from(path.as_str()), 0);
                for handler in loader.handlers.values() {
                    if path.ends_with(handler.package_file_extension()) {
                        loader.push_path(
                            scope,
                            PathInformation {
                                reference_id: path.clone(),
                                kind: PathKind::SourceFile,
                                path: path.clone(),
                                source_kind: handler.kind().to_owned(),
                                source_range: range.clone(),
                            },
                        );
                        break;
                    }
                }
            }

            for library in &libraries {
                let range =
                    SourceRange::at(InputSource::from(library.path_or_url.as_str()), 0);
                loader.push_library(scope, library, range);
            }
        });

        // All work is joined; collect what the tasks produced.
        let mut diagnostics = std::mem::take(&mut *self.issues.lock().unwrap());

        if self.cancellation.was_cancelled() {
            for parser in self.parsers.values() {
                parser.cancel();
            }
            return LoadResult {
                status: false,
                diagnostics: Diagnostics::new(),
                package_map: PackageMap::default(),
                source_tracker: SourceTracker::default(),
            };
        }

        let package_map = self.package_map.build();
        let source_tracker = self.source_tracker.freeze();

        // Apply all parser changes, then verify.
        for parser in self.parsers.values() {
            parser.apply(&package_map, &source_tracker, &self.cancellation);
        }

        if !diagnostics.has_errors() {
            let errors = Mutex::new(Vec::new());
            let warnings = Mutex::new(Vec::new());
            for parser in self.parsers.values() {
                parser.verify(
                    &mut |err| errors.lock().unwrap().push(err),
                    &mut |warning| warnings.lock().unwrap().push(warning),
                    &self.cancellation,
                );
            }
            diagnostics.extend(errors.into_inner().unwrap());
            diagnostics.extend(warnings.into_inner().unwrap());
        }

        if self.cancellation.was_cancelled() {
            return LoadResult {
                status: false,
                diagnostics: Diagnostics::new(),
                package_map: PackageMap::default(),
                source_tracker: SourceTracker::default(),
            };
        }

        diagnostics.sort();
        let status = !diagnostics.has_errors();
        LoadResult {
            status,
            diagnostics,
            package_map,
            source_tracker,
        }
    }

    fn report_error(&self, range: SourceRange, message: String) {
        self.issues.lock().unwrap().error(range, message);
    }

    fn report_warning(&self, range: SourceRange, message: String) {
        self.issues.lock().unwrap().warning(range, message);
    }

    fn push_library<'s>(
        &'s self,
        scope: &Scope<'s>,
        library: &Library,
        source_range: SourceRange,
    ) -> String {
        let kind = if library.is_scm {
            PathKind::VcsPackage
        } else {
            PathKind::LocalPackage
        };
        self.push_path(
            scope,
            PathInformation {
                reference_id: library.path_or_url.clone(),
                kind,
                path: library.path_or_url.clone(),
                source_kind: library.kind.clone(),
                source_range,
            },
        )
    }

    fn push_path<'s>(&'s self, scope: &Scope<'s>, info: PathInformation) -> String {
        if self.cancellation.was_cancelled() {
            return info.reference_id;
        }

        let reference_id = info.reference_id.clone();
        scope.spawn(move |scope| self.load_and_parse_path(scope, info));
        reference_id
    }

    fn load_and_parse_path<'s>(&'s self, scope: &Scope<'s>, info: PathInformation) {
        if self.cancellation.was_cancelled() {
            return;
        }

        // Each (path, kind) is processed at most once.
        let key = (info.path.clone(), format!("{:?}:{}", info.kind, info.source_kind));
        if self.encountered.insert(key, ()).is_some() {
            return;
        }

        match info.kind {
            PathKind::SourceFile => self.conduct_parsing(scope, info),
            PathKind::LocalPackage => self.load_local_package(scope, info),
            PathKind::VcsPackage => self.load_vcs_package(scope, info),
        }
    }

    /// Parses a single source file.
    fn conduct_parsing<'s>(&'s self, scope: &Scope<'s>, info: PathInformation) {
        debug!(path = %info.path, "parsing source file");
        let input_source = InputSource::from(info.path.as_str());

        // The file itself is a package of one module.
        self.package_map.add(
            &info.source_kind,
            &info.reference_id,
            PackageInfo::new(
                &info.source_kind,
                &info.reference_id,
                vec![input_source.clone()],
            ),
        );

        let contents = match self.path_loader.load_source_file(&info.path) {
            Ok(contents) => contents,
            Err(err) => {
                self.report_error(
                    info.source_range.clone(),
                    format!("could not load source file '{}': {err}", info.path),
                );
                return;
            }
        };

        let revision_id = match self.path_loader.revision_id(&info.path) {
            Ok(revision_id) => revision_id,
            Err(err) => {
                self.report_error(
                    info.source_range.clone(),
                    format!("could not load source file '{}': {err}", info.path),
                );
                return;
            }
        };

        self.source_tracker.add_source_file(
            input_source.clone(),
            &info.source_kind,
            contents.clone(),
            revision_id,
        );

        let Some(parser) = self.parsers.get(&info.source_kind) else {
            self.report_error(
                info.source_range,
                format!("missing handler for source file of kind '{}'", info.source_kind),
            );
            return;
        };

        let reporter = |request: ImportRequest| self.handle_import(scope, request);
        parser.parse(input_source, &contents, &reporter);
    }

    /// Loads the package found at a local directory path.
    fn load_local_package<'s>(&'s self, scope: &Scope<'s>, info: PathInformation) {
        let package_info = match self.package_info_for_directory(&info.path, &info.source_kind) {
            Ok(package_info) => package_info,
            Err(message) => {
                self.report_error(
                    info.source_range,
                    format!("could not load directory '{}': {message}", info.path),
                );
                return;
            }
        };

        let mut module_found = false;
        for module_path in package_info.module_paths() {
            self.push_path(
                scope,
                PathInformation {
                    reference_id: module_path.as_str().to_owned(),
                    kind: PathKind::SourceFile,
                    path: module_path.as_str().to_owned(),
                    source_kind: info.source_kind.clone(),
                    source_range: info.source_range.clone(),
                },
            );
            module_found = true;
        }

        self.package_map
            .add(&info.source_kind, &info.reference_id, package_info);

        if !module_found {
            self.report_warning(
                info.source_range,
                format!("package '{}' has no source files", info.path),
            );
        }
    }

    fn package_info_for_directory(
        &self,
        package_path: &str,
        source_kind: &str,
    ) -> Result<PackageInfo, String> {
        let handler = self
            .handlers
            .get(source_kind)
            .ok_or_else(|| format!("unknown source kind '{source_kind}'"))?;

        let entries = self
            .path_loader
            .load_directory(package_path)
            .map_err(|err| err.to_string())?;

        let mut module_paths = Vec::new();
        for entry in entries {
            if entry.is_directory || is_test_module(&entry.name) {
                continue;
            }
            if entry.name.ends_with(handler.package_file_extension()) {
                module_paths.push(InputSource::new(join_paths(package_path, &entry.name)));
            }
        }

        Ok(PackageInfo::new(source_kind, package_path, module_paths))
    }

    /// Loads the package found at a VCS path, serializing checkouts per URL.
    fn load_vcs_package<'s>(&'s self, scope: &Scope<'s>, info: PathInformation) {
        if self.cancellation.was_cancelled() {
            return;
        }

        let lock = self
            .vcs_locks
            .entry(info.path.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().unwrap();

        if let Some(existing) = self.vcs_loaded.get(&info.path) {
            // An empty entry records a failed checkout.
            if let Some(directory) = existing.value().clone() {
                self.push_local_for_vcs(scope, &info, directory);
            }
            return;
        }

        let vcs_path = match VcsPath::parse(&info.path) {
            Ok(vcs_path) => vcs_path,
            Err(err) => {
                self.vcs_loaded.insert(info.path.clone(), None);
                self.report_error(
                    info.source_range,
                    format!("error loading VCS package '{}': {err}", info.path),
                );
                return;
            }
        };

        // Development directories short-circuit remote fetches.
        for dev_directory in &self.vcs_development_directories {
            let candidate = join_paths(dev_directory, vcs_path.url());
            if self.path_loader.is_directory(&candidate) {
                self.report_warning(
                    info.source_range.clone(),
                    format!(
                        "package '{}' is being loaded from development directory '{candidate}'",
                        info.path
                    ),
                );
                self.vcs_loaded
                    .insert(info.path.clone(), Some(candidate.clone()));
                self.push_local_for_vcs(scope, &info, candidate);
                return;
            }
        }

        if vcs_path.is_head() {
            self.report_warning(
                info.source_range.clone(),
                format!(
                    "package '{}' is not pinned to a tag or branch and will track HEAD",
                    info.path
                ),
            );
        }

        let cache_root = join_paths(
            &self.entrypoint.root_directory(&*self.path_loader),
            PACKAGE_CACHE_DIRECTORY,
        );
        let result = match self.vcs_client.checkout(&vcs_path, &cache_root) {
            Ok(result) => result,
            Err(message) => {
                self.vcs_loaded.insert(info.path.clone(), None);
                self.report_error(
                    info.source_range,
                    format!("error loading VCS package '{}': {message}", info.path),
                );
                return;
            }
        };

        if let Some(warning) = result.warning {
            self.report_warning(info.source_range.clone(), warning);
        }

        // Warn when a library pins the same URL at a different version.
        for library in self.libraries.values() {
            if !library.is_scm || library.kind != info.source_kind {
                continue;
            }
            let Ok(library_path) = VcsPath::parse(&library.path_or_url) else {
                continue;
            };
            if library_path.url() == vcs_path.url() {
                if library_path != vcs_path {
                    self.report_warning(
                        info.source_range.clone(),
                        format!(
                            "library specifies VCS package '{library_path}' but source file is \
                             loading '{vcs_path}', which could lead to incompatibilities",
                        ),
                    );
                }
                break;
            }
        }

        self.vcs_loaded
            .insert(info.path.clone(), Some(result.package_directory.clone()));
        self.push_local_for_vcs(scope, &info, result.package_directory);
    }

    fn push_local_for_vcs<'s>(&'s self, scope: &Scope<'s>, info: &PathInformation, directory: String) {
        self.push_path(
            scope,
            PathInformation {
                reference_id: info.reference_id.clone(),
                kind: PathKind::LocalPackage,
                path: directory,
                source_kind: info.source_kind.clone(),
                source_range: info.source_range.clone(),
            },
        );
    }

    /// Queues an import found in a source file. Returns the canonical
    /// reference id for the imported package.
    fn handle_import<'s>(&'s self, scope: &Scope<'s>, request: ImportRequest) -> String {
        let source_range = SourceRange::at(request.importing_source.clone(), request.rune_position);

        let Some(handler) = self.handlers.get(&request.source_kind) else {
            self.report_error(
                source_range,
                format!(
                    "unknown kind of import '{}'; did you forget to install a source plugin?",
                    request.source_kind
                ),
            );
            return String::new();
        };

        match request.kind {
            ImportKind::Alias => {
                let Some(library) = self.libraries.get(&request.path).cloned() else {
                    self.report_error(
                        source_range,
                        format!("import alias '{}' not found", request.path),
                    );
                    return String::new();
                };
                self.push_library(scope, &library, source_range)
            }

            ImportKind::Vcs => self.push_path(
                scope,
                PathInformation {
                    reference_id: request.path.clone(),
                    kind: PathKind::VcsPackage,
                    path: request.path,
                    source_kind: request.source_kind,
                    source_range,
                },
            ),

            ImportKind::Local => {
                let current_directory = parent_directory(request.importing_source.as_str());
                let directory_path =
                    normalize_path(&join_paths(&current_directory, &request.path));
                let file_path =
                    format!("{directory_path}{}", handler.package_file_extension());

                // A path naming a single source file imports the module; a
                // directory imports the package.
                let is_source_file = self.path_loader.is_source_file(&file_path);
                let (title, imported_directory) = if is_source_file {
                    ("module", parent_directory(&file_path))
                } else {
                    ("package", directory_path.clone())
                };

                // Imports may not cross a VCS package boundary in either
                // direction.
                if current_directory != imported_directory {
                    let (start, end) = if imported_directory.starts_with(&current_directory) {
                        (imported_directory.as_str(), current_directory.as_str())
                    } else {
                        (current_directory.as_str(), imported_directory.as_str())
                    };
                    if let Some(boundary) = self.find_vcs_boundary_cross(start, end) {
                        self.report_error(
                            source_range,
                            format!(
                                "import of {title} '{}' crosses VCS boundary at package '{boundary}'",
                                request.path
                            ),
                        );
                        return String::new();
                    }
                }

                if is_source_file {
                    self.push_path(
                        scope,
                        PathInformation {
                            reference_id: file_path.clone(),
                            kind: PathKind::SourceFile,
                            path: file_path,
                            source_kind: request.source_kind,
                            source_range,
                        },
                    )
                } else {
                    self.push_path(
                        scope,
                        PathInformation {
                            reference_id: directory_path.clone(),
                            kind: PathKind::LocalPackage,
                            path: directory_path,
                            source_kind: request.source_kind,
                            source_range,
                        },
                    )
                }
            }
        }
    }

    /// Walks upward from `start` until reaching `end` (or the filesystem
    /// root); returns the first VCS-root directory crossed, if any.
    fn find_vcs_boundary_cross(&self, start: &str, end: &str) -> Option<String> {
        let mut check = start.to_owned();
        loop {
            if check == end {
                return None;
            }
            if self.path_loader.is_vcs_root(&check) {
                warn!(path = %check, "import crosses VCS boundary");
                return Some(check);
            }
            let next = parent_directory(&check);
            if next == check {
                return None;
            }
            check = next;
        }
    }
}
