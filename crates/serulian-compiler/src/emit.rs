//! The emission contract between the compiler core and the out-of-scope ES5
//! emitter: an ordered map of member emission trees plus the bundle manifest
//! describing the files to write.

use indexmap::IndexMap;
use serulian_graph::store::NodeId;

use crate::statemachine::MemberEmission;

/// The kind of a file in the output bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleFileKind {
    Script,
    SourceMap,
    Other,
}

/// A file the emitter should write.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleFile {
    pub path: String,
    pub kind: BundleFileKind,
    pub bytes: Vec<u8>,
}

/// Identifies one emitted member: its owning type or module plus the member
/// name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmissionKey {
    /// The owning TG type or module node.
    pub owner: NodeId,
    /// The member name; empty for module-level initializers.
    pub member: String,
}

/// The ordered map of member emissions handed to the emitter.
#[derive(Debug, Default)]
pub struct EmissionTree {
    members: IndexMap<EmissionKey, MemberEmission>,
    manifest: Vec<BundleFile>,
}

impl EmissionTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&mut self, key: EmissionKey, emission: MemberEmission) {
        self.members.insert(key, emission);
    }

    pub fn add_file(&mut self, file: BundleFile) {
        self.manifest.push(file);
    }

    pub fn member(&self, owner: NodeId, member: &str) -> Option<&MemberEmission> {
        self.members.get(&EmissionKey {
            owner,
            member: member.to_owned(),
        })
    }

    pub fn members(&self) -> impl Iterator<Item = (&EmissionKey, &MemberEmission)> {
        self.members.iter()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn manifest(&self) -> &[BundleFile] {
        &self.manifest
    }
}
