//! VCS package paths and the checkout client boundary.
//!
//! A VCS path names a repository URL plus an optional pin: `url` (HEAD),
//! `url@tag`, or `url:branch`. Checkout itself is an external collaborator
//! behind [`VcsClient`]; this module owns path parsing, the cache directory
//! layout, and pin comparison for version-drift warnings.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VcsPathError {
    #[error("invalid VCS path '{0}': empty URL")]
    EmptyUrl(String),

    #[error("invalid VCS path '{0}': multiple pins")]
    MultiplePins(String),
}

/// The pin of a VCS path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VcsPin {
    Head,
    Tag(String),
    Branch(String),
}

/// A parsed VCS package path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VcsPath {
    url: String,
    pin: VcsPin,
}

impl VcsPath {
    /// Parses `url`, `url@tag`, or `url:branch`.
    pub fn parse(path: &str) -> Result<VcsPath, VcsPathError> {
        let tag_split = path.split_once('@');
        let branch_split = path.split_once(':');

        let (url, pin) = match (tag_split, branch_split) {
            (Some(_), Some(_)) => return Err(VcsPathError::MultiplePins(path.to_owned())),
            (Some((url, tag)), None) => (url, VcsPin::Tag(tag.to_owned())),
            (None, Some((url, branch))) => (url, VcsPin::Branch(branch.to_owned())),
            (None, None) => (path, VcsPin::Head),
        };

        if url.is_empty() {
            return Err(VcsPathError::EmptyUrl(path.to_owned()));
        }

        Ok(VcsPath {
            url: url.to_owned(),
            pin,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn pin(&self) -> &VcsPin {
        &self.pin
    }

    pub fn is_head(&self) -> bool {
        self.pin == VcsPin::Head
    }

    /// The checkout directory for this path under the given cache root:
    /// `<root>/<url>/HEAD`, `<root>/<url>/tag/<t>`, or
    /// `<root>/<url>/branch/<b>`.
    pub fn cache_directory(&self, cache_root: &str) -> String {
        let suffix = match &self.pin {
            VcsPin::Head => "HEAD".to_owned(),
            VcsPin::Tag(tag) => format!("tag/{tag}"),
            VcsPin::Branch(branch) => format!("branch/{branch}"),
        };
        format!("{}/{}/{}", cache_root.trim_end_matches('/'), self.url, suffix)
    }
}

impl std::fmt::Display for VcsPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.pin {
            VcsPin::Head => f.write_str(&self.url),
            VcsPin::Tag(tag) => write!(f, "{}@{}", self.url, tag),
            VcsPin::Branch(branch) => write!(f, "{}:{}", self.url, branch),
        }
    }
}

/// Result of a successful checkout.
#[derive(Debug, Clone)]
pub struct CheckoutResult {
    /// The local directory holding the package.
    pub package_directory: String,
    /// An optional non-fatal warning raised by the checkout.
    pub warning: Option<String>,
}

/// External checkout collaborator. Implementations are expected to be
/// idempotent for an unchanged pin.
pub trait VcsClient: Send + Sync {
    fn checkout(&self, path: &VcsPath, cache_root: &str) -> Result<CheckoutResult, String>;
}

/// A client for builds with remote loading disabled; every checkout fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRemoteVcsClient;

impl VcsClient for NoRemoteVcsClient {
    fn checkout(&self, path: &VcsPath, _cache_root: &str) -> Result<CheckoutResult, String> {
        Err(format!("remote package loading is disabled (for '{path}')"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_head() {
        let path = VcsPath::parse("github.com/some/repo").unwrap();
        assert_eq!(path.url(), "github.com/some/repo");
        assert!(path.is_head());
        assert_eq!(path.to_string(), "github.com/some/repo");
    }

    #[test]
    fn parse_tag_and_branch() {
        let tagged = VcsPath::parse("github.com/some/repo@v1.2").unwrap();
        assert_eq!(tagged.pin(), &VcsPin::Tag("v1.2".to_owned()));

        let branched = VcsPath::parse("github.com/some/repo:main").unwrap();
        assert_eq!(branched.pin(), &VcsPin::Branch("main".to_owned()));
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(VcsPath::parse("@v1").is_err());
        assert!(VcsPath::parse("github.com/a/b@v1:main").is_err());
    }

    #[test]
    fn cache_directory_layout() {
        let root = "/proj/.pkg";
        assert_eq!(
            VcsPath::parse("github.com/a/b").unwrap().cache_directory(root),
            "/proj/.pkg/github.com/a/b/HEAD"
        );
        assert_eq!(
            VcsPath::parse("github.com/a/b@v1").unwrap().cache_directory(root),
            "/proj/.pkg/github.com/a/b/tag/v1"
        );
        assert_eq!(
            VcsPath::parse("github.com/a/b:dev").unwrap().cache_directory(root),
            "/proj/.pkg/github.com/a/b/branch/dev"
        );
    }
}
