//! Serialized member signatures.
//!
//! A signature is the pair `(member type, generic constraints)` serialized to
//! a canonical string, giving O(1) signature equality and dictionary use
//! during structural subtype checks. Member generics are localized before
//! serialization so `f<T>(T)` and `f<Q>(Q)` compare equal.

use serde::{Deserialize, Serialize};
use serulian_graph::TaggedValue;

use super::typeref::TypeReference;

/// The comparable signature of a type member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSignature {
    pub member_type: TypeReference,
    pub generic_constraints: Vec<TypeReference>,
}

impl TaggedValue for MemberSignature {
    const TAG: &'static str = "member-signature";
}

impl MemberSignature {
    pub fn new(member_type: TypeReference, generic_constraints: Vec<TypeReference>) -> Self {
        Self {
            member_type,
            generic_constraints,
        }
    }

    /// Serializes to the canonical comparison string.
    pub fn serialize_value(&self) -> String {
        serde_json::to_string(self).expect("signature serialization cannot fail")
    }

    /// Parses a signature previously produced by [`serialize_value`].
    ///
    /// [`serialize_value`]: MemberSignature::serialize_value
    pub fn parse(value: &str) -> Self {
        serde_json::from_str(value).expect("malformed member signature")
    }
}
