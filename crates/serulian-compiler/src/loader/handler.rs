//! The source-handler plugin interface.
//!
//! Each supported file extension is served by a handler; the loader
//! dispatches parsing to the handler's parser and, after loading completes,
//! gives every parser a chance to apply deferred graph edits and verify.

use crate::cancel::CancellationToken;
use crate::diagnostics::DiagnosticMessage;
use crate::parser::ImportRequest;
use crate::source::InputSource;

use super::package_map::PackageMap;
use super::source_tracker::SourceTracker;

/// A plugin serving one kind of source file.
pub trait SourceHandler: Send + Sync {
    /// The file extension handled, including the leading dot.
    fn package_file_extension(&self) -> &'static str;

    /// The handler's kind identifier; the empty string names the primary
    /// (Serulian) handler.
    fn kind(&self) -> &'static str;

    /// Starts a parsing session for one load.
    fn new_parser(&self) -> Box<dyn SourceHandlerParser>;
}

/// A parsing session created by a handler for the duration of one load.
pub trait SourceHandlerParser: Send + Sync {
    /// Parses the given module, reporting discovered imports through the
    /// callback; the callback returns the canonical package reference id.
    fn parse(
        &self,
        source: InputSource,
        input: &str,
        import_reporter: &dyn Fn(ImportRequest) -> String,
    );

    /// Applies deferred graph edits once the package map and source tracker
    /// are complete.
    fn apply(
        &self,
        package_map: &PackageMap,
        source_tracker: &SourceTracker,
        cancel: &CancellationToken,
    );

    /// Verifies all parsed modules, reporting diagnostics through the sinks.
    fn verify(
        &self,
        errors: &mut dyn FnMut(DiagnosticMessage),
        warnings: &mut dyn FnMut(DiagnosticMessage),
        cancel: &CancellationToken,
    );

    /// Tells the parser to stop all work.
    fn cancel(&self);
}
