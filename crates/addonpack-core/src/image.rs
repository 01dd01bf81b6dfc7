//! Container image references
//!
//! An [`ImageReference`] is kept as the exact string the chart produced
//! (`repo`, `repo:tag` or `repo@digest`). It is never parsed into registry
//! components; the image tool interprets it.

use serde::Serialize;
use serde_yaml::{Mapping, Value};
use std::fmt;

/// Keys tried, in order, for the repository part of an `image:` mapping
const REPOSITORY_KEYS: [&str; 3] = ["repository", "repo", "name"];

/// A cleaned, non-empty container image reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ImageReference(String);

impl ImageReference {
    /// Clean a raw image string taken from a manifest.
    ///
    /// Surrounding whitespace and quote characters are removed. Returns
    /// `None` if nothing is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let cleaned = raw.trim_matches(|c: char| c.is_whitespace() || c == '"' || c == '\'');
        if cleaned.is_empty() {
            None
        } else {
            Some(Self(cleaned.to_string()))
        }
    }

    /// Build a reference from a values-style image mapping.
    ///
    /// ```yaml
    /// image:
    ///   repository: quay.io/cilium/cilium
    ///   tag: v1.14.2
    ///   digest: sha256:...
    /// ```
    ///
    /// The repository is the first non-empty of `repository`, `repo`, `name`.
    /// A digest wins over a tag; neither is appended when the repository
    /// already carries that separator.
    pub fn from_spec(spec: &Mapping) -> Option<Self> {
        let repository = REPOSITORY_KEYS
            .iter()
            .find_map(|key| spec.get(*key).and_then(scalar_text))?;

        let reference = if let Some(digest) = spec.get("digest").and_then(scalar_text) {
            if repository.contains('@') {
                repository
            } else {
                format!("{}@{}", repository, digest)
            }
        } else if let Some(tag) = spec.get("tag").and_then(scalar_text) {
            if repository.contains(':') {
                repository
            } else {
                format!("{}:{}", repository, tag)
            }
        } else {
            repository
        };

        Self::parse(&reference)
    }

    /// The reference as written
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the reference is pinned by digest
    #[must_use]
    pub fn is_digest(&self) -> bool {
        self.0.contains('@')
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ImageReference {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Render a YAML scalar as text. Tags are frequently unquoted numbers
/// (`tag: 1.25`), so numbers and booleans count as text too.
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Tagged(tagged) => return scalar_text(&tagged.value),
        Value::Null | Value::Sequence(_) | Value::Mapping(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}
