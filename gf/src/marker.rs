//! The `AIGenVersion(...)` version marker
//!
//! A marker records the version of a generated artifact together with the
//! versions of all inputs it was generated from, e.g.
//! `AIGenVersion(1a2b3c4d, prompt.txt-5e6f7a8b, data.json-0f1e2d3c)`.
//! The first entry is the artifact's own version; the remaining entries are
//! `label-version` pairs for the inputs. Regeneration is needed exactly when
//! the current set of input versions differs from the recorded one.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::fingerprint::fingerprint;

static MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"AIGenVersion\([^)]+\)").unwrap());

static LICENSE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A<!--(?s).*?Copyright.*?Licensed under.*?-->").unwrap()
});

/// A parsed version marker: the artifact's own version plus the recorded
/// versions of its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMarker {
    pub own_version: String,
    pub input_versions: Vec<String>,
}

impl VersionMarker {
    pub fn new(own_version: impl Into<String>, input_versions: Vec<String>) -> Self {
        VersionMarker {
            own_version: own_version.into(),
            input_versions,
        }
    }

    /// Finds and parses the first version marker in `content`, if any.
    pub fn find(content: &str) -> Option<VersionMarker> {
        let m = MARKER.find(content)?;
        let inner = &m.as_str()["AIGenVersion(".len()..m.as_str().len() - 1];
        let mut parts = inner.split(", ").map(str::to_owned);
        let own_version = parts.next()?;
        Some(VersionMarker {
            own_version,
            input_versions: parts.collect(),
        })
    }

    /// Renders the marker in its textual form.
    pub fn to_text(&self) -> String {
        let mut entries = Vec::with_capacity(1 + self.input_versions.len());
        entries.push(self.own_version.clone());
        entries.extend(self.input_versions.iter().cloned());
        format!("AIGenVersion({})", entries.join(", "))
    }

    /// True when `other` records the same set of input versions, in any
    /// order. The own version is not compared; it describes the output, not
    /// the inputs the decision depends on.
    pub fn same_inputs(&self, other: &VersionMarker) -> bool {
        let a: BTreeSet<&str> = self.input_versions.iter().map(String::as_str).collect();
        let b: BTreeSet<&str> = other.input_versions.iter().map(String::as_str).collect();
        a == b
    }
}

impl std::fmt::Display for VersionMarker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Replaces the first version marker in `content` with `replacement`.
/// Content without a marker is returned unchanged.
pub fn replace_marker_in(content: &str, replacement: &str) -> String {
    MARKER.replace(content, replacement).into_owned()
}

/// The version an input contributes to a marker: its own recorded version if
/// the input carries a marker itself, otherwise the fingerprint of its
/// content. Keeping the recorded version pins the input, so edits that do
/// not bump it stay invisible downstream.
pub fn input_version(content: &str) -> String {
    match VersionMarker::find(content) {
        Some(marker) => marker.own_version,
        None => fingerprint(content),
    }
}

/// Strips boilerplate that should not reach the AI or influence versioning:
/// a leading HTML license header and the first version marker.
pub fn unclutter(content: &str) -> String {
    let without_license = LICENSE_HEADER.replace(content, "");
    MARKER.replace(&without_license, "").into_owned()
}
