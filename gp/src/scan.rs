//! Scanner for in-file prompt regions
//!
//! A file can carry its own generation instructions between
//! `AIGenPromptStart(id)` and `AIGenEnd(id)` lines: the prompt text, a
//! command line with options, and the generated region. The scanner finds
//! such regions in the given files, directories and glob patterns and turns
//! each into a generation task writing back into the same file.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use eyre::{Context, Result, eyre};
use genframe::segmented::PROMPT_START_PATTERN;
use genframe::{GenerationTask, InOut, SegmentedFile, segmented};
use tracing::debug;
use walkdir::WalkDir;

use crate::cli::Cli;
use crate::config;

/// A prompt region found while scanning: the file and the region id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedRegion {
    pub path: PathBuf,
    pub id: String,
}

/// Finds all prompt regions under the given paths. Each path may be a file,
/// a directory (walked recursively) or a glob pattern.
pub fn find_regions(paths: &[String]) -> Result<Vec<ScannedRegion>> {
    let mut files = Vec::new();
    for pattern in paths {
        let path = Path::new(pattern);
        if path.is_dir() {
            for entry in WalkDir::new(path).sort_by_file_name() {
                let entry = entry.wrap_err_with(|| format!("could not walk {pattern}"))?;
                if entry.file_type().is_file() {
                    files.push(entry.into_path());
                }
            }
        } else if path.is_file() {
            files.push(path.to_owned());
        } else {
            let matches =
                glob::glob(pattern).wrap_err_with(|| format!("invalid scan pattern {pattern}"))?;
            let mut any = false;
            for entry in matches {
                let entry = entry.wrap_err_with(|| format!("could not match {pattern}"))?;
                if entry.is_file() {
                    files.push(entry);
                    any = true;
                }
            }
            if !any {
                return Err(eyre!("scan path {pattern} matches no files"));
            }
        }
    }

    let mut regions = Vec::new();
    for file in files {
        // binary files are simply not candidates
        let Ok(content) = fs::read_to_string(&file) else {
            continue;
        };
        for caps in PROMPT_START_PATTERN.captures_iter(&content) {
            let region = ScannedRegion {
                path: file.clone(),
                id: caps["id"].to_owned(),
            };
            if !regions.contains(&region) {
                debug!(path = %region.path.display(), id = %region.id, "found prompt region");
                regions.push(region);
            }
        }
    }
    Ok(regions)
}

/// The argument tokens of a region's command segment. Tokens consisting only
/// of comment punctuation are dropped, so the command line may live inside
/// a line comment or block comment of the host language.
pub fn command_tokens(segment: &str) -> Vec<String> {
    segment
        .split_whitespace()
        .filter(|token| !token.chars().all(|c| "/#*<>!-;".contains(c)))
        .map(str::to_owned)
        .collect()
}

/// Builds the generation task for one region: the region prompt is the
/// prompt, the command segment supplies options (parsed on top of the
/// surrounding configuration), relative inputs resolve against the file's
/// directory, and the output defaults to the region's generated segment.
pub fn build_task(region: &ScannedRegion, base_args: &[String]) -> Result<(GenerationTask, Cli)> {
    let separators = segmented::infile_prompting(&region.id);
    let separators: Vec<&str> = separators.iter().map(String::as_str).collect();
    let file = SegmentedFile::new(&region.path, &separators)
        .wrap_err_with(|| {
            format!(
                "could not parse prompt region {} in {}",
                region.id,
                region.path.display()
            )
        })?
        .shared();
    let command = file.borrow().segment(2).to_owned();
    let tokens = command_tokens(&command);
    let mut argv: Vec<String> = base_args.to_vec();
    argv.extend(config::expand_tokens(&tokens)?);
    let cli = Cli::try_parse_from(&argv).wrap_err_with(|| {
        format!(
            "invalid arguments in prompt region {} of {}",
            region.id,
            region.path.display()
        )
    })?;

    let dir = region.path.parent().unwrap_or_else(|| Path::new("."));
    let mut task = GenerationTask::new();
    task.add_prompt(InOut::segment(file.clone(), 1), &cli.keys)?;
    for prompt in &cli.prompts {
        task.add_prompt(InOut::file(resolve(dir, prompt)), &cli.keys)?;
    }
    for input in &cli.inputs {
        task.add_input(InOut::file(resolve(dir, input)))?;
    }
    if let Some(sysmsg) = &cli.sysmsg {
        task.set_system_message(InOut::file(resolve(dir, sysmsg)))?;
    }
    let output = match &cli.output {
        Some(path) => InOut::file(resolve(dir, path)),
        None => InOut::segment(file, 3),
    };
    task.set_output(output);
    task.writing_strategy(cli.writing_strategy());
    task.regeneration_check(cli.regeneration_check());
    task.force(cli.force);
    if let Some(maxtokens) = cli.maxtokens {
        task.max_tokens(maxtokens);
    }
    Ok((task, cli))
}

fn resolve(dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_owned()
    } else {
        dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    const REGION: &str = "\
some code
// AIGenPromptStart(hello)
Uppercase the inputs.
// AIGenCommand(hello)
// in.txt
// AIGenPromptEnd(hello)
// AIGenEnd(hello)
more code
";

    #[test]
    fn find_regions_in_a_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.java"), REGION).unwrap();
        fs::write(dir.path().join("b.java"), "no region here\n").unwrap();
        let regions = find_regions(&[dir.path().display().to_string()]).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].id, "hello");
        assert!(regions[0].path.ends_with("a.java"));
    }

    #[test]
    fn missing_scan_path_is_an_error() {
        assert!(find_regions(&["/nonexistent/nowhere-*.txt".to_owned()]).is_err());
    }

    #[test]
    fn command_tokens_drop_comment_punctuation() {
        assert_eq!(
            command_tokens("// -o out.txt in.txt */\n"),
            vec!["-o".to_owned(), "out.txt".to_owned(), "in.txt".to_owned()]
        );
        assert_eq!(command_tokens("<!-- in.txt -->"), vec!["in.txt".to_owned()]);
        assert!(command_tokens("# // */").is_empty());
    }

    #[test]
    fn build_task_wires_region_prompt_inputs_and_output() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("in.txt"), "hello\n").unwrap();
        let path = dir.path().join("host.java");
        fs::write(&path, REGION).unwrap();
        let region = ScannedRegion {
            path,
            id: "hello".to_owned(),
        };
        let (task, cli) = build_task(&region, &["gp".to_owned()]).unwrap();
        assert!(cli.output.is_none());
        assert_eq!(task.inputs().len(), 1);
        assert!(task.inputs()[0].path().unwrap().ends_with("in.txt"));
        // output is the generated segment of the host file
        assert!(task.output().unwrap().path().unwrap().ends_with("host.java"));
        assert_eq!(task.prompt_inputs().len(), 1);
    }

    #[test]
    fn region_options_override_base_arguments() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("in.txt"), "hello\n").unwrap();
        let content = "\
// AIGenPromptStart(x)
Say it.
// AIGenCommand(x)
// -m region-model in.txt
// AIGenPromptEnd(x)
// AIGenEnd(x)
";
        let path = dir.path().join("host.java");
        fs::write(&path, content).unwrap();
        let region = ScannedRegion {
            path,
            id: "x".to_owned(),
        };
        let base = vec!["gp".to_owned(), "-m".to_owned(), "base-model".to_owned()];
        let (_, cli) = build_task(&region, &base).unwrap();
        assert_eq!(cli.model.as_deref(), Some("region-model"));
    }
}
