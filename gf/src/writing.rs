//! Strategies for writing an output and embedding the version marker
//!
//! The strategy decides where the version marker lives in the written
//! artifact and how to recover it later. [`WritingStrategy::WithVersion`]
//! picks a comment syntax from the file extension; [`WritingStrategy::NoVersion`]
//! writes the bare content and consequently cannot support version checks;
//! [`WritingStrategy::WritePart`] replaces the region between two occurrences
//! of a marker line inside an otherwise hand-maintained file.

use tracing::debug;

use crate::error::{GenError, Result};
use crate::inout::InOut;
use crate::marker::{VersionMarker, replace_marker_in};

/// How an output is written and where its version marker is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WritingStrategy {
    /// Write the bare content. No marker is recorded, so version checks on
    /// such an output always fail with [`GenError::MarkerUnsupported`].
    NoVersion,
    /// Embed the marker as a comment appropriate for the file extension.
    WithVersion,
    /// Replace the part of the file between the two lines containing
    /// `marker`, keeping the rest of the file untouched.
    WritePart { marker: String },
}

impl WritingStrategy {
    /// Writes `content` to `output`, embedding `version_comment` as the
    /// strategy prescribes.
    pub fn write(&self, output: &InOut, content: &str, version_comment: &str) -> Result<()> {
        debug!(output = %output, strategy = ?self, "writing output");
        match self {
            WritingStrategy::NoVersion => output.write(content),
            WritingStrategy::WithVersion => {
                output.write(&embed_comment(output, content, version_comment))
            }
            WritingStrategy::WritePart { marker } => {
                write_part(output, marker, content, version_comment)
            }
        }
    }

    /// Recovers the version marker recorded in the current output.
    ///
    /// `Ok(None)` means there is nothing recorded yet (missing or blank
    /// output); a present output without a marker is a fault, because the
    /// user asked for version checks on a file that cannot carry them.
    pub fn recorded_marker(&self, output: &InOut) -> Result<Option<VersionMarker>> {
        let path = || output.path().unwrap_or_else(|| "-".as_ref()).to_owned();
        match self {
            WritingStrategy::NoVersion => Err(GenError::MarkerUnsupported),
            WritingStrategy::WithVersion => {
                if !output.exists() {
                    return Ok(None);
                }
                let content = output.read()?;
                if content.trim().is_empty() {
                    return Ok(None);
                }
                match VersionMarker::find(&content) {
                    Some(marker) => Ok(Some(marker)),
                    None => Err(GenError::MarkerNotFound { path: path() }),
                }
            }
            // The marker lives on the first line containing the region
            // token; markers elsewhere in the file belong to other regions.
            WritingStrategy::WritePart { marker } => {
                if !output.exists() {
                    return Ok(None);
                }
                let content = output.read()?;
                let token_line = content.lines().find(|line| line.contains(marker.as_str()));
                match token_line {
                    Some(line) => match VersionMarker::find(line) {
                        Some(found) => Ok(Some(found)),
                        None => Err(GenError::MarkerNotFound { path: path() }),
                    },
                    None => Err(GenError::RegionMarkerCount {
                        marker: marker.clone(),
                        count: 0,
                        path: path(),
                    }),
                }
            }
        }
    }
}

/// Embeds `comment` into `content` using a comment syntax guessed from the
/// output's file extension. Unknown extensions get a C-style block comment.
fn embed_comment(output: &InOut, content: &str, comment: &str) -> String {
    let extension = output
        .path()
        .and_then(|p| p.extension())
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut result = match extension.as_str() {
        // txt has no comment syntax, but the marker is obvious to a reader
        "java" | "rs" | "txt" => format!("// {comment}\n\n{content}"),
        "html" | "htm" | "xml" | "jsp" => format!("{content}\n\n<!-- {comment} -->\n"),
        "css" | "js" | "json" => format!("/* {comment} */\n\n{content}"),
        "md" => {
            if let Some(rest) = content.strip_prefix("---\n") {
                format!("---\nversion: {comment}\n{rest}")
            } else {
                format!("---\nversion: {comment}\n---\n\n{content}")
            }
        }
        "sh" | "yaml" | "yml" => format!("# {comment}\n{content}"),
        _ => format!("/* {comment} */\n\n{content}"),
    };
    if !result.ends_with('\n') {
        result.push('\n');
    }
    result
}

/// Replaces the lines strictly between the two lines containing `marker`
/// with `content`, and updates the version marker on the first marker line.
fn write_part(output: &InOut, marker: &str, content: &str, version_comment: &str) -> Result<()> {
    let path = output.path().unwrap_or_else(|| "-".as_ref()).to_owned();
    if !output.exists() {
        return Err(GenError::MissingRegionFile { path });
    }
    if content.contains(marker) {
        return Err(GenError::ContentContainsMarker {
            marker: marker.to_owned(),
            path,
        });
    }
    let existing = output.read()?;
    let marker_lines: Vec<usize> = existing
        .lines()
        .enumerate()
        .filter(|(_, line)| line.contains(marker))
        .map(|(i, _)| i)
        .collect();
    if marker_lines.len() != 2 {
        return Err(GenError::RegionMarkerCount {
            marker: marker.to_owned(),
            count: marker_lines.len(),
            path,
        });
    }
    let (first, second) = (marker_lines[0], marker_lines[1]);
    let lines: Vec<&str> = existing.lines().collect();
    let mut result = String::new();
    for line in &lines[..first] {
        result.push_str(line);
        result.push('\n');
    }
    result.push_str(&replace_marker_in(lines[first], version_comment));
    result.push('\n');
    result.push_str(content);
    if !content.ends_with('\n') && !content.is_empty() {
        result.push('\n');
    }
    for line in &lines[second..] {
        result.push_str(line);
        result.push('\n');
    }
    if !existing.ends_with('\n') {
        result.pop();
    }
    output.write(&result)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn out(dir: &TempDir, name: &str) -> InOut {
        InOut::file(dir.path().join(name))
    }

    #[test]
    fn no_version_writes_bare_content() {
        let dir = TempDir::new().unwrap();
        let output = out(&dir, "f.txt");
        WritingStrategy::NoVersion
            .write(&output, "content\n", "AIGenVersion(x)")
            .unwrap();
        assert_eq!(output.read().unwrap(), "content\n");
        assert!(matches!(
            WritingStrategy::NoVersion.recorded_marker(&output),
            Err(GenError::MarkerUnsupported)
        ));
    }

    #[test]
    fn with_version_uses_line_comments_for_code() {
        let dir = TempDir::new().unwrap();
        let output = out(&dir, "f.java");
        WritingStrategy::WithVersion
            .write(&output, "class A {}\n", "AIGenVersion(aa, in-bb)")
            .unwrap();
        assert_eq!(
            output.read().unwrap(),
            "// AIGenVersion(aa, in-bb)\n\nclass A {}\n"
        );
        let marker = WritingStrategy::WithVersion
            .recorded_marker(&output)
            .unwrap()
            .unwrap();
        assert_eq!(marker.own_version, "aa");
        assert_eq!(marker.input_versions, vec!["in-bb"]);
    }

    #[test]
    fn with_version_appends_html_comment() {
        let dir = TempDir::new().unwrap();
        let output = out(&dir, "f.html");
        WritingStrategy::WithVersion
            .write(&output, "<p>hi</p>", "AIGenVersion(aa)")
            .unwrap();
        assert_eq!(
            output.read().unwrap(),
            "<p>hi</p>\n\n<!-- AIGenVersion(aa) -->\n"
        );
    }

    #[test]
    fn with_version_inserts_into_markdown_front_matter() {
        let dir = TempDir::new().unwrap();
        let output = out(&dir, "f.md");
        WritingStrategy::WithVersion
            .write(&output, "---\ntitle: x\n---\nbody\n", "AIGenVersion(aa)")
            .unwrap();
        assert_eq!(
            output.read().unwrap(),
            "---\nversion: AIGenVersion(aa)\ntitle: x\n---\nbody\n"
        );
    }

    #[test]
    fn with_version_creates_markdown_front_matter() {
        let dir = TempDir::new().unwrap();
        let output = out(&dir, "f.md");
        WritingStrategy::WithVersion
            .write(&output, "body\n", "AIGenVersion(aa)")
            .unwrap();
        assert_eq!(
            output.read().unwrap(),
            "---\nversion: AIGenVersion(aa)\n---\n\nbody\n"
        );
    }

    #[test]
    fn with_version_uses_hash_comments_for_shell() {
        let dir = TempDir::new().unwrap();
        let output = out(&dir, "f.sh");
        WritingStrategy::WithVersion
            .write(&output, "echo hi", "AIGenVersion(aa)")
            .unwrap();
        assert_eq!(output.read().unwrap(), "# AIGenVersion(aa)\necho hi\n");
    }

    #[test]
    fn recorded_marker_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let output = out(&dir, "absent.java");
        assert!(
            WritingStrategy::WithVersion
                .recorded_marker(&output)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn recorded_marker_blank_file_is_none() {
        let dir = TempDir::new().unwrap();
        let output = out(&dir, "blank.java");
        fs::write(dir.path().join("blank.java"), "  \n").unwrap();
        assert!(
            WritingStrategy::WithVersion
                .recorded_marker(&output)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn recorded_marker_present_file_without_marker_is_a_fault() {
        let dir = TempDir::new().unwrap();
        let output = out(&dir, "f.java");
        fs::write(dir.path().join("f.java"), "class A {}\n").unwrap();
        assert!(matches!(
            WritingStrategy::WithVersion.recorded_marker(&output),
            Err(GenError::MarkerNotFound { .. })
        ));
    }

    #[test]
    fn write_part_replaces_the_region_between_the_markers() {
        let dir = TempDir::new().unwrap();
        let output = out(&dir, "f.java");
        fs::write(
            dir.path().join("f.java"),
            "head\n// REGION AIGenVersion(old, in-x)\nold body\n// REGION\ntail\n",
        )
        .unwrap();
        let strategy = WritingStrategy::WritePart {
            marker: "REGION".into(),
        };
        strategy
            .write(&output, "new body\n", "AIGenVersion(new, in-y)")
            .unwrap();
        assert_eq!(
            output.read().unwrap(),
            "head\n// REGION AIGenVersion(new, in-y)\nnew body\n// REGION\ntail\n"
        );
        let marker = strategy.recorded_marker(&output).unwrap().unwrap();
        assert_eq!(marker.own_version, "new");
    }

    #[test]
    fn write_part_requires_the_file_to_exist() {
        let dir = TempDir::new().unwrap();
        let output = out(&dir, "absent.java");
        let strategy = WritingStrategy::WritePart {
            marker: "REGION".into(),
        };
        assert!(matches!(
            strategy.write(&output, "x\n", "AIGenVersion(a)"),
            Err(GenError::MissingRegionFile { .. })
        ));
    }

    #[test]
    fn write_part_requires_exactly_two_marker_lines() {
        let dir = TempDir::new().unwrap();
        let output = out(&dir, "f.java");
        fs::write(dir.path().join("f.java"), "head\n// REGION\ntail\n").unwrap();
        let strategy = WritingStrategy::WritePart {
            marker: "REGION".into(),
        };
        assert!(matches!(
            strategy.write(&output, "x\n", "AIGenVersion(a)"),
            Err(GenError::RegionMarkerCount { count: 1, .. })
        ));
    }

    #[test]
    fn write_part_rejects_content_containing_the_marker() {
        let dir = TempDir::new().unwrap();
        let output = out(&dir, "f.java");
        fs::write(dir.path().join("f.java"), "// REGION\n// REGION\n").unwrap();
        let strategy = WritingStrategy::WritePart {
            marker: "REGION".into(),
        };
        assert!(matches!(
            strategy.write(&output, "sneaky REGION\n", "AIGenVersion(a)"),
            Err(GenError::ContentContainsMarker { .. })
        ));
    }
}
