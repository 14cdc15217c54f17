//! Configuration cascade for genpipe
//!
//! Options can come from the `GENPIPE_CONFIG` environment variable, from
//! `.genpipe` files scanned upwards from the working directory, and from the
//! command line. The sets are concatenated in that order and parsed as one
//! argument sequence, so later (more specific) sets override earlier ones.
//! Every token undergoes `$VAR` / `${VAR}` environment substitution, and the
//! short option aliases of the original tool are normalized to their long
//! forms before parsing.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use eyre::{Context, Result, eyre};
use regex::Regex;
use tracing::debug;

/// Environment variable read as the outermost argument set.
pub const ENV_CONFIG: &str = "GENPIPE_CONFIG";

/// Name of the config files scanned upwards from the working directory.
pub const CONFIG_FILE: &str = ".genpipe";

static ENV_VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[A-Za-z_][A-Za-z0-9_]*|\$\{[A-Za-z_][A-Za-z0-9_]*\}").unwrap());

/// One argument set with its origin, for `--configprint`.
#[derive(Debug, Clone)]
pub struct ArgumentSet {
    pub source: String,
    pub args: Vec<String>,
}

/// Collects all argument sets in override order (earliest first) and returns
/// the merged argument list ready for parsing, plus the individual sets.
pub fn assemble(cli_args: &[String], start_dir: &Path) -> Result<(Vec<String>, Vec<ArgumentSet>)> {
    let cli_args: Vec<String> = cli_args.to_vec();
    let mut sets: Vec<ArgumentSet> = Vec::new();

    let mut scanned = Vec::new();
    if continues_scan(&cli_args) {
        // walk over absolute ancestors so relative start dirs like "."
        // do not revisit the same directory
        let start = fs::canonicalize(start_dir).unwrap_or_else(|_| start_dir.to_owned());
        let mut dir = Some(start);
        while let Some(current) = dir {
            let candidate = current.join(CONFIG_FILE);
            if candidate.exists() {
                let args = read_config_file(&candidate)?;
                let stop = !continues_scan(&args);
                scanned.push(ArgumentSet {
                    source: candidate.display().to_string(),
                    args,
                });
                if stop {
                    break;
                }
            }
            dir = current.parent().map(Path::to_owned);
        }
    }
    // top-most config file first, so closer ones override it
    scanned.reverse();

    let env_allowed = ignores_env_nowhere(&cli_args, &scanned);
    if env_allowed {
        if let Ok(value) = std::env::var(ENV_CONFIG) {
            let args: Vec<String> = value.split_whitespace().map(str::to_owned).collect();
            if !args.is_empty() {
                sets.push(ArgumentSet {
                    source: format!("environment variable {ENV_CONFIG}"),
                    args,
                });
            }
        }
    }
    sets.extend(scanned);
    sets.push(ArgumentSet {
        source: "command line".to_owned(),
        args: cli_args,
    });

    let mut merged = vec!["gp".to_owned()];
    for set in &sets {
        debug!(source = %set.source, args = ?set.args, "argument set");
        let expanded = expand_set(&set.args, 0)?;
        merged.extend(expanded);
    }
    Ok((merged, sets))
}

/// Expands one raw argument set the way [`assemble`] does, for arguments
/// embedded in scanned prompt regions.
pub fn expand_tokens(args: &[String]) -> Result<Vec<String>> {
    expand_set(args, 0)
}

/// Expands `--configfile` references, normalizes aliases and substitutes
/// environment variables within one argument set.
fn expand_set(args: &[String], depth: usize) -> Result<Vec<String>> {
    if depth > 10 {
        return Err(eyre!("config files nested too deeply"));
    }
    let mut result = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let arg = substitute_env(arg);
        match arg.as_str() {
            "-cf" | "--configfile" => {
                let file = iter
                    .next()
                    .ok_or_else(|| eyre!("--configfile needs a file argument"))?;
                let file = substitute_env(file);
                let nested = read_config_file(Path::new(&file))?;
                result.extend(expand_set(&nested, depth + 1)?);
            }
            _ => result.extend(normalize(&arg)),
        }
    }
    Ok(result)
}

/// Reads a config file into argument tokens: whitespace-separated, lines
/// starting with `#` are comments.
pub fn read_config_file(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .wrap_err_with(|| format!("could not read config file {}", path.display()))?;
    Ok(parse_config_tokens(&content))
}

fn parse_config_tokens(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .flat_map(str::split_whitespace)
        .map(str::to_owned)
        .collect()
}

/// Replaces `$VAR` and `${VAR}` with the environment value, or the empty
/// string when unset.
pub fn substitute_env(token: &str) -> String {
    if !token.contains('$') {
        return token.to_owned();
    }
    ENV_VARIABLE
        .replace_all(token, |caps: &regex::Captures<'_>| {
            let name = caps[0].trim_start_matches('$');
            let name = name.strip_prefix('{').and_then(|n| n.strip_suffix('}')).unwrap_or(name);
            std::env::var(name).unwrap_or_default()
        })
        .into_owned()
}

/// Maps the historical two-letter aliases to the long options the parser
/// knows.
fn normalize(token: &str) -> Vec<String> {
    let long: &[&str] = match token {
        "-ga" | "--gen-always" => &["--gen", "always"],
        "-gn" | "--gen-notexists" => &["--gen", "notexists"],
        "-go" | "--gen-older" => &["--gen", "older"],
        "-gv" | "--gen-versioncheck" => &["--gen", "versioncheck"],
        "-wv" | "--write-version" => &["--write", "version"],
        "-wo" | "--write-noversion" => &["--write", "noversion"],
        "-wp" => &["--write-part"],
        "-cn" => &["--confignoscan"],
        "-cne" => &["--configignoreenv"],
        "-cp" => &["--configprint"],
        _ => return vec![token.to_owned()],
    };
    long.iter().map(|s| (*s).to_owned()).collect()
}

fn continues_scan(args: &[String]) -> bool {
    !args
        .iter()
        .any(|a| a == "-cn" || a == "--confignoscan")
}

fn ignores_env_nowhere(cli_args: &[String], scanned: &[ArgumentSet]) -> bool {
    let ignores = |args: &[String]| {
        args.iter()
            .any(|a| a == "-cne" || a == "--configignoreenv")
    };
    !ignores(cli_args) && !scanned.iter().any(|set| ignores(&set.args))
}
