//! Strategies deciding whether an output has to be regenerated
//!
//! The default is the version marker check: compare the input versions
//! recorded in the output against the freshly computed ones. The cheaper
//! strategies exist for pipelines where markers are unwanted or file
//! timestamps are good enough.

use std::collections::BTreeSet;
use std::fs;
use std::time::SystemTime;

use tracing::debug;

use crate::error::{GenError, Result};
use crate::inout::InOut;
use crate::writing::WritingStrategy;

/// When to regenerate an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegenerationCheckStrategy {
    /// Regenerate unconditionally.
    Always,
    /// Regenerate only when the output does not exist yet.
    IfNotExists,
    /// Regenerate when the output is missing or older than an input.
    IfOlder,
    /// Regenerate when the recorded input versions differ from the current
    /// ones.
    #[default]
    VersionMarker,
}

impl RegenerationCheckStrategy {
    /// Decides whether the task writing `output` from `inputs` has to run.
    ///
    /// `current_input_versions` are the `label-version` entries the task
    /// would record if it ran now; only the version marker strategy looks at
    /// them.
    pub fn needs_regeneration(
        &self,
        output: &InOut,
        inputs: &[InOut],
        writing: &WritingStrategy,
        current_input_versions: &[String],
    ) -> Result<bool> {
        let needed = match self {
            RegenerationCheckStrategy::Always => true,
            RegenerationCheckStrategy::IfNotExists => !output.exists(),
            RegenerationCheckStrategy::IfOlder => {
                !output.exists() || any_input_newer(output, inputs)
            }
            RegenerationCheckStrategy::VersionMarker => {
                if !output.exists() {
                    true
                } else {
                    match writing.recorded_marker(output) {
                        // An output written without a marker cannot be
                        // checked; treat it as stale rather than crashing.
                        Err(GenError::MarkerUnsupported) => true,
                        Err(other) => return Err(other),
                        Ok(None) => true,
                        Ok(Some(recorded)) => {
                            let recorded: BTreeSet<&str> =
                                recorded.input_versions.iter().map(String::as_str).collect();
                            let current: BTreeSet<&str> =
                                current_input_versions.iter().map(String::as_str).collect();
                            recorded != current
                        }
                    }
                }
            }
        };
        debug!(output = %output, strategy = ?self, needed, "regeneration check");
        Ok(needed)
    }
}

fn mtime(io: &InOut) -> Option<SystemTime> {
    let path = io.path()?;
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn any_input_newer(output: &InOut, inputs: &[InOut]) -> bool {
    let Some(output_time) = mtime(output) else {
        return true;
    };
    inputs
        .iter()
        .filter_map(mtime)
        .any(|input_time| input_time > output_time)
}
