//! Graph IR substrate for the Serulian compiler.
//!
//! Every compilation phase reads and writes one shared [`GraphStore`]: a
//! process-local store of directed, labeled edges partitioned into layers
//! (source representation, type definitions, scope results). This crate
//! provides:
//! - `store` - node/edge storage, layers, and the batching [`Modifier`]
//! - `query` - the path-expression query engine over the store
//! - `tagged` - serde-backed structured payloads on edges
//! - `position` - rune-offset to line/column mapping per source file

pub mod position;
pub mod query;
pub mod store;
pub mod tagged;

#[cfg(test)]
mod position_tests;
#[cfg(test)]
mod query_tests;
#[cfg(test)]
mod store_tests;

pub use position::{PositionError, SourcePositionMapper};
pub use query::{FoundNode, GraphQuery, NodeIterator};
pub use store::{GraphStore, KindToken, Layer, Modifier, NodeId, PredicateToken, Value};
pub use tagged::TaggedValue;
