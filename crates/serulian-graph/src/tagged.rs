//! Tagged payloads for graph edges.
//!
//! Structured data (type references, scope info, member signatures) is stored
//! on edges as a `(tag, json)` pair. The tag names the payload kind and drives
//! decoding; a tag mismatch at decode time is an internal invariant violation.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// A value that can be embedded on a graph edge as a tagged payload.
pub trait TaggedValue: Serialize + DeserializeOwned {
    /// Unique name for this kind of payload.
    const TAG: &'static str;

    fn encode(&self) -> String {
        serde_json::to_string(self).expect("tagged value serialization cannot fail")
    }

    fn decode(json: &str) -> Self {
        serde_json::from_str(json).expect("malformed tagged value payload")
    }
}
