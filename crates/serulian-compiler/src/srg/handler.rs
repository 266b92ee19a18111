//! The Serulian source handler: wires the dual-version parser into the
//! package loader.

use std::sync::{Arc, Mutex};

use serulian_graph::GraphStore;
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::diagnostics::{DiagnosticMessage, Diagnostics};
use crate::loader::{PackageMap, SourceHandler, SourceHandlerParser, SourceTracker};
use crate::parser::{GraphNodeBuilder, ImportRequest, parse_with_compatibility};
use crate::source::InputSource;

/// The file extension for Serulian source modules.
pub const SERULIAN_FILE_EXTENSION: &str = ".seru";

/// Handler for `.seru` modules. Parsing writes each module's subgraph into
/// the shared graph store; the modifier applies per module so a module's
/// nodes become visible atomically.
pub struct SerulianSourceHandler {
    store: Arc<GraphStore>,
}

impl SerulianSourceHandler {
    pub fn new(store: Arc<GraphStore>) -> Self {
        Self { store }
    }
}

impl SourceHandler for SerulianSourceHandler {
    fn package_file_extension(&self) -> &'static str {
        SERULIAN_FILE_EXTENSION
    }

    fn kind(&self) -> &'static str {
        ""
    }

    fn new_parser(&self) -> Box<dyn SourceHandlerParser> {
        Box::new(SerulianParser {
            store: self.store.clone(),
            diagnostics: Mutex::new(Diagnostics::new()),
            cancelled: CancellationToken::new(),
        })
    }
}

struct SerulianParser {
    store: Arc<GraphStore>,
    diagnostics: Mutex<Diagnostics>,
    cancelled: CancellationToken,
}

impl SourceHandlerParser for SerulianParser {
    fn parse(
        &self,
        source: InputSource,
        input: &str,
        import_reporter: &dyn Fn(ImportRequest) -> String,
    ) {
        if self.cancelled.was_cancelled() {
            return;
        }

        debug!(source = %source, "parsing module");
        let mut builder = GraphNodeBuilder::new(&self.store);
        let result = parse_with_compatibility(&mut builder, import_reporter, source, input);
        builder.apply();

        self.diagnostics
            .lock()
            .unwrap()
            .extend(result.diagnostics);
    }

    fn apply(
        &self,
        _package_map: &PackageMap,
        _source_tracker: &SourceTracker,
        _cancel: &CancellationToken,
    ) {
        // All graph edits land at parse time; nothing is deferred.
    }

    fn verify(
        &self,
        errors: &mut dyn FnMut(DiagnosticMessage),
        warnings: &mut dyn FnMut(DiagnosticMessage),
        cancel: &CancellationToken,
    ) {
        if cancel.was_cancelled() || self.cancelled.was_cancelled() {
            return;
        }

        for diagnostic in self.diagnostics.lock().unwrap().iter() {
            if diagnostic.is_error() {
                errors(diagnostic.clone());
            } else {
                warnings(diagnostic.clone());
            }
        }
    }

    fn cancel(&self) {
        self.cancelled.cancel();
    }
}
