//! Addressing of task inputs and outputs
//!
//! An [`InOut`] names a place content can be read from and written to: a
//! whole file, one content segment of a [`SegmentedFile`], or stdin. Inputs
//! and outputs share the type because regeneration checks have to read the
//! output too.

use std::cell::RefCell;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crate::error::{GenError, Result};
use crate::segmented::SegmentedFile;

/// Canonicalizes a path, falling back to the absolute form when the file
/// does not exist yet.
pub fn canonical_or_absolute(path: &Path) -> PathBuf {
    fs::canonicalize(path)
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_owned())
}

/// An input or output of a generation task.
#[derive(Clone)]
pub enum InOut {
    /// A whole file.
    File { path: PathBuf, canonical: PathBuf },
    /// One content segment of a segmented file. Writing a segment rewrites
    /// the whole file with only that segment replaced.
    Segment {
        file: Rc<RefCell<SegmentedFile>>,
        index: usize,
        path: PathBuf,
        canonical: PathBuf,
    },
    /// Standard input. Cannot be written to and has no path.
    Stdin,
}

impl InOut {
    pub fn file(path: impl Into<PathBuf>) -> InOut {
        let path = path.into();
        let canonical = canonical_or_absolute(&path);
        InOut::File { path, canonical }
    }

    pub fn segment(file: Rc<RefCell<SegmentedFile>>, index: usize) -> InOut {
        let path = file.borrow().path().to_owned();
        let canonical = canonical_or_absolute(&path);
        InOut::Segment {
            file,
            index,
            path,
            canonical,
        }
    }

    pub fn stdin() -> InOut {
        InOut::Stdin
    }

    /// Reads the content. Missing files are an error here; callers that
    /// tolerate absence check [`InOut::exists`] first.
    pub fn read(&self) -> Result<String> {
        match self {
            InOut::File { path, .. } => fs::read_to_string(path).map_err(|source| GenError::Read {
                path: path.clone(),
                source,
            }),
            InOut::Segment { file, index, .. } => Ok(file.borrow().segment(*index).to_owned()),
            InOut::Stdin => {
                use std::io::Read;
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .map_err(|source| GenError::Read {
                        path: PathBuf::from("-"),
                        source,
                    })?;
                Ok(buf)
            }
        }
    }

    /// Writes the content. Whole files are replaced; segments rewrite the
    /// containing file.
    pub fn write(&self, content: &str) -> Result<()> {
        match self {
            InOut::File { path, .. } => fs::write(path, content).map_err(|source| GenError::Write {
                path: path.clone(),
                source,
            }),
            InOut::Segment { file, index, .. } => file.borrow_mut().write_segment(*index, content),
            InOut::Stdin => Err(GenError::UnsupportedWrite {
                target: "stdin".to_owned(),
            }),
        }
    }

    pub fn exists(&self) -> bool {
        match self {
            InOut::File { path, .. } => path.exists(),
            InOut::Segment { path, .. } => path.exists(),
            InOut::Stdin => false,
        }
    }

    /// The path as given on the command line, if there is one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            InOut::File { path, .. } | InOut::Segment { path, .. } => Some(path),
            InOut::Stdin => None,
        }
    }

    /// The canonical path used as identity in the dependency graph.
    pub fn canonical(&self) -> Option<&Path> {
        match self {
            InOut::File { canonical, .. } | InOut::Segment { canonical, .. } => Some(canonical),
            InOut::Stdin => None,
        }
    }

    /// The short label under which this input is recorded in version
    /// markers: the file name, or `-` for stdin.
    pub fn label(&self) -> String {
        match self.path().and_then(Path::file_name) {
            Some(name) => name.to_string_lossy().into_owned(),
            None => "-".to_owned(),
        }
    }

    /// True when both address the same underlying file. Two segments of one
    /// file are the same file even when the segments differ.
    pub fn same_file(&self, other: &InOut) -> bool {
        match (self.canonical(), other.canonical()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// True when both address the same readable unit: the same whole file,
    /// or the same segment of the same file. Used to keep an output's other
    /// segments counted as inputs while excluding the output itself.
    pub fn same_unit(&self, other: &InOut) -> bool {
        match (self, other) {
            (InOut::Segment { index: a, .. }, InOut::Segment { index: b, .. }) => {
                self.same_file(other) && a == b
            }
            (InOut::Segment { .. }, _) | (_, InOut::Segment { .. }) => false,
            _ => self.same_file(other),
        }
    }
}

impl fmt::Display for InOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InOut::File { path, .. } => write!(f, "{}", path.display()),
            InOut::Segment { path, index, .. } => {
                write!(f, "{} segment {}", path.display(), index)
            }
            InOut::Stdin => f.write_str("stdin"),
        }
    }
}

impl fmt::Debug for InOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
