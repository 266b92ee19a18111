//! The staged compilation facade.
//!
//! Drives the full pipeline: load and parse, type graph construction,
//! scoping, and lowering into the emission tree. Each compilation owns its
//! graph store; diagnostics accumulate across stages and `status` is true
//! iff no stage produced an error.

use std::sync::Arc;

use serulian_graph::GraphStore;
use tracing::info_span;

use crate::cancel::CancellationToken;
use crate::codedom::DomBuilder;
use crate::diagnostics::Diagnostics;
use crate::emit::{EmissionKey, EmissionTree};
use crate::loader::vcs::{NoRemoteVcsClient, VcsClient};
use crate::loader::{
    Entrypoint, Library, LoaderConfig, LocalPathLoader, PackageLoader, PathLoader,
};
use crate::scopegraph::build_scope_graph;
use crate::srg::{SerulianSourceHandler, Srg};
use crate::statemachine::lower_implementation;
use crate::typegraph::{SrgTypeConstructor, build_type_graph};

/// Configuration for one compilation.
pub struct CompileConfig {
    pub entrypoint: Entrypoint,
    pub libraries: Vec<Library>,
    pub vcs_development_directories: Vec<String>,
    pub path_loader: Arc<dyn PathLoader>,
    pub vcs_client: Arc<dyn VcsClient>,
    pub cancellation: CancellationToken,
}

impl CompileConfig {
    pub fn for_entrypoint(entrypoint: impl Into<String>) -> Self {
        Self {
            entrypoint: Entrypoint::new(entrypoint),
            libraries: Vec::new(),
            vcs_development_directories: Vec::new(),
            path_loader: Arc::new(LocalPathLoader),
            vcs_client: Arc::new(NoRemoteVcsClient),
            cancellation: CancellationToken::new(),
        }
    }
}

/// The result of a compilation.
pub struct CompileResult {
    /// True iff the error list is empty; warnings never affect status.
    pub status: bool,
    pub diagnostics: Diagnostics,
    pub emission: EmissionTree,
}

/// Whole-program compiler for Serulian source.
pub struct Compiler {
    config: CompileConfig,
}

impl Compiler {
    pub fn new(config: CompileConfig) -> Self {
        Self { config }
    }

    /// Runs the full pipeline. On cancellation, returns `status == false`
    /// with no partial emission.
    pub fn compile(self) -> CompileResult {
        let _span = info_span!("compile").entered();
        let store = Arc::new(GraphStore::new());

        // Load and parse everything into the SRG.
        let loader = PackageLoader::new(LoaderConfig {
            entrypoint: self.config.entrypoint,
            path_loader: self.config.path_loader,
            vcs_client: self.config.vcs_client,
            source_handlers: vec![Arc::new(SerulianSourceHandler::new(store.clone()))],
            vcs_development_directories: self.config.vcs_development_directories,
            cancellation: self.config.cancellation.clone(),
        });
        let load_result = loader.load(self.config.libraries);

        let mut diagnostics = load_result.diagnostics;
        if !load_result.status || self.config.cancellation.was_cancelled() {
            diagnostics.sort();
            return CompileResult {
                status: false,
                diagnostics,
                emission: EmissionTree::new(),
            };
        }

        let srg = Srg::new(&store, &load_result.package_map, &load_result.source_tracker);

        // Type graph construction.
        let constructor = SrgTypeConstructor::new(&srg);
        let (tg, type_diagnostics) = build_type_graph(&store, &[&constructor]);
        diagnostics.extend(type_diagnostics);
        if diagnostics.has_errors() || self.config.cancellation.was_cancelled() {
            diagnostics.sort();
            return CompileResult {
                status: false,
                diagnostics,
                emission: EmissionTree::new(),
            };
        }

        // Scoping.
        let scope_graph = build_scope_graph(&srg, &tg);
        diagnostics.extend(scope_graph.collect_diagnostics(&srg));
        if !scope_graph.status || self.config.cancellation.was_cancelled() {
            diagnostics.sort();
            return CompileResult {
                status: false,
                diagnostics,
                emission: EmissionTree::new(),
            };
        }

        // Lowering: code DOM plus the state-machine transform, per member.
        let dom_builder = DomBuilder::new(&srg, &tg, &scope_graph);
        let mut emission = EmissionTree::new();
        for member in srg.all_members() {
            let Some(implementation) = dom_builder.build_member_implementation(member) else {
                continue;
            };
            let Some(tg_member) = tg.member_for_source(member) else {
                continue;
            };
            let Some(owner) = tg.member_parent(tg_member) else {
                continue;
            };
            emission.add_member(
                EmissionKey {
                    owner,
                    member: tg.member_name(tg_member),
                },
                lower_implementation(&implementation),
            );
        }

        diagnostics.sort();
        let status = !diagnostics.has_errors();
        CompileResult {
            status,
            diagnostics,
            emission,
        }
    }
}
