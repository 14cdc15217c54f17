//! Reading and writing individual segments of a file
//!
//! A file is split along a list of separator regexes into alternating
//! content and separator segments. This is what makes in-file prompting
//! work: a source file carries a prompt region and a generated region, and
//! only the generated region is rewritten while everything around it stays
//! untouched.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{GenError, Result};

/// Start pattern for [`infile_prompting`] regions; capture group `id` is the
/// region id.
pub static PROMPT_START_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"AIGenPromptStart\((?<id>[^)]+)\)").unwrap());

/// A file split into content and separator segments.
///
/// With n separators the file has 2n+1 raw segments: content, separator,
/// content, ..., separator, content. [`SegmentedFile::segment`] addresses
/// only the content segments; the separators are preserved verbatim so that
/// joining all raw segments reproduces the file exactly.
#[derive(Debug)]
pub struct SegmentedFile {
    path: PathBuf,
    separators: Vec<Regex>,
    segments: Vec<String>,
}

impl SegmentedFile {
    /// Reads the file and splits it along the given separator regexes.
    ///
    /// Fails when a separator is missing, when a separator also matches
    /// inside a content segment (a likely usage error), or when the split
    /// does not reproduce the original content.
    pub fn new(path: impl Into<PathBuf>, separator_regexes: &[&str]) -> Result<Self> {
        let path = path.into();
        let separators = separator_regexes
            .iter()
            .map(|pat| {
                Regex::new(pat).map_err(|source| GenError::Pattern {
                    pattern: (*pat).to_owned(),
                    source,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let content = fs::read_to_string(&path).map_err(|source| GenError::Read {
            path: path.clone(),
            source,
        })?;
        let segments = split(&content, &separators, &path)?;
        let file = SegmentedFile {
            path,
            separators,
            segments,
        };
        file.sanity_check(&content)?;
        debug!(path = %file.path.display(), segments = file.segments.len(), "parsed segmented file");
        Ok(file)
    }

    /// Wraps the file in the shared handle the rest of the framework uses.
    pub fn shared(self) -> Rc<RefCell<SegmentedFile>> {
        Rc::new(RefCell::new(self))
    }

    /// The content segment at `i`: 0 is before the first separator, 1
    /// between the first and second, and so on.
    pub fn segment(&self, i: usize) -> &str {
        &self.segments[2 * i]
    }

    /// The number of content segments.
    pub fn segment_count(&self) -> usize {
        self.separators.len() + 1
    }

    /// Replaces the content segment at `i` and rewrites the whole file.
    pub fn write_segment(&mut self, i: usize, new_segment: &str) -> Result<()> {
        self.segments[2 * i] = new_segment.to_owned();
        fs::write(&self.path, self.join()).map_err(|source| GenError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// The file the segments belong to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn join(&self) -> String {
        self.segments.concat()
    }

    fn sanity_check(&self, content: &str) -> Result<()> {
        debug_assert_eq!(self.segments.len(), 2 * self.separators.len() + 1);
        // A separator matching within a content segment means the split is
        // not the one the user intended.
        for (i, segment) in self.segments.iter().enumerate().step_by(2) {
            for separator in &self.separators {
                if let Some(m) = separator.find(segment) {
                    if m.start() + 1 < segment.len() {
                        return Err(GenError::AmbiguousSeparator {
                            pattern: separator.as_str().to_owned(),
                            segment: i,
                            path: self.path.clone(),
                        });
                    }
                }
            }
        }
        if content != self.join() {
            return Err(GenError::SegmentMismatch {
                path: self.path.clone(),
            });
        }
        Ok(())
    }
}

fn split(content: &str, separators: &[Regex], path: &Path) -> Result<Vec<String>> {
    let mut segments = Vec::with_capacity(2 * separators.len() + 1);
    let mut startpos = 0;
    for separator in separators {
        let m = separator
            .find_at(content, startpos)
            .ok_or_else(|| GenError::SeparatorNotFound {
                pattern: separator.as_str().to_owned(),
                path: path.to_owned(),
            })?;
        segments.push(content[startpos..m.start()].to_owned());
        segments.push(m.as_str().to_owned());
        startpos = m.end();
    }
    segments.push(content[startpos..].to_owned());
    Ok(segments)
}

/// A regex matching the whole line around `separator`, including the
/// trailing newline.
pub fn whole_line_regex(separator: &str) -> String {
    format!(".*{separator}.*\n")
}

/// The four separator regexes for a prompt region with the given id:
/// prompt start, command, prompt end, and generated-content end (or end of
/// file).
pub fn infile_prompting(id: &str) -> [String; 4] {
    let id = regex::escape(id);
    [
        whole_line_regex(&format!(r"AIGenPromptStart\({id}\)")),
        whole_line_regex(&format!(r"AIGenCommand\({id}\)")),
        whole_line_regex(&format!(r"AIGenPromptEnd\({id}\)")),
        format!("{}|\\z", whole_line_regex(&format!(r"AIGenEnd\({id}\)"))),
    ]
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn splits_into_content_and_separator_segments() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "f.txt", "before\n== SEP ==\nafter\n");
        let file = SegmentedFile::new(&path, &[r"== SEP ==\n"]).unwrap();
        assert_eq!(file.segment_count(), 2);
        assert_eq!(file.segment(0), "before\n");
        assert_eq!(file.segment(1), "after\n");
    }

    #[test]
    fn write_segment_rewrites_only_that_segment() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "f.txt", "before\n== SEP ==\nafter\n");
        let mut file = SegmentedFile::new(&path, &[r"== SEP ==\n"]).unwrap();
        file.write_segment(1, "changed\n").unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "before\n== SEP ==\nchanged\n"
        );
    }

    #[test]
    fn missing_separator_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "f.txt", "no separator here\n");
        let err = SegmentedFile::new(&path, &[r"== SEP ==\n"]).unwrap_err();
        assert!(matches!(err, GenError::SeparatorNotFound { .. }));
    }

    #[test]
    fn separator_matching_a_content_segment_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "f.txt", "a\nSEP\nb\nSEP\nc\n");
        let err = SegmentedFile::new(&path, &[r"SEP\n"]).unwrap_err();
        assert!(matches!(err, GenError::AmbiguousSeparator { .. }));
    }

    #[test]
    fn infile_prompting_splits_a_prompt_region() {
        let dir = TempDir::new().unwrap();
        let content = "\
header
// AIGenPromptStart(greeting)
Make a greeting.
// AIGenCommand(greeting)
-o thisfile
// AIGenPromptEnd(greeting)
old generated text
// AIGenEnd(greeting)
footer
";
        let path = write_file(&dir, "f.txt", content);
        let seps = infile_prompting("greeting");
        let seps: Vec<&str> = seps.iter().map(String::as_str).collect();
        let file = SegmentedFile::new(&path, &seps).unwrap();
        assert_eq!(file.segment_count(), 5);
        assert_eq!(file.segment(1), "Make a greeting.\n");
        assert_eq!(file.segment(2), "-o thisfile\n");
        assert_eq!(file.segment(3), "old generated text\n");
        assert_eq!(file.segment(4), "footer\n");
    }

    #[test]
    fn infile_prompting_region_may_end_at_eof() {
        let dir = TempDir::new().unwrap();
        let content = "\
// AIGenPromptStart(x)
prompt
// AIGenCommand(x)
// AIGenPromptEnd(x)
generated
";
        let path = write_file(&dir, "f.txt", content);
        let seps = infile_prompting("x");
        let seps: Vec<&str> = seps.iter().map(String::as_str).collect();
        let file = SegmentedFile::new(&path, &seps).unwrap();
        assert_eq!(file.segment(3), "generated\n");
    }

    #[test]
    fn prompt_start_pattern_captures_the_id() {
        let caps = PROMPT_START_PATTERN
            .captures("// AIGenPromptStart(my-region)")
            .unwrap();
        assert_eq!(&caps["id"], "my-region");
    }
}
