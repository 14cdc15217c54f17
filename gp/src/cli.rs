//! CLI argument parsing for genpipe
//!
//! The same parser handles the command line, config file contents and
//! arguments embedded in in-file prompt regions; `args_override_self` makes
//! later argument sets win over earlier ones when they are parsed as one
//! merged sequence.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use genframe::{RegenerationCheckStrategy, WritingStrategy};

#[derive(Parser, Debug, Clone)]
#[command(name = "gp", version, args_override_self = true)]
#[command(about = "Incremental generation of files with AI support")]
#[command(after_help = "\
Configuration files contain options like on the command line; lines starting \
with # are comments. The environment variable GENPIPE_CONFIG can contain \
options, and .genpipe files are scanned upwards from the working directory. \
Processing order is: environment variable, .genpipe files from top to \
bottom, command line; later options override earlier ones. $VAR and ${VAR} \
in any option are replaced from the environment.\n\n\
It's recommended to review generated files and keep them in version control.")]
pub struct Cli {
    /// Output file where the generated content is written
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Prompt file; can be repeated, prompts are concatenated
    #[arg(short, long = "prompt")]
    pub prompts: Vec<PathBuf>,

    /// Key-value pair replacing ${key} in prompt files
    #[arg(short = 'k', value_name = "KEY=VALUE", value_parser = parse_key_value)]
    pub keys: Vec<(String, String)>,

    /// File with a system message to use instead of the built-in one
    #[arg(short, long)]
    pub sysmsg: Option<PathBuf>,

    /// Only check whether the output needs regeneration; exit code 0 means
    /// up to date, 1 means it needs to be regenerated
    #[arg(short, long)]
    pub check: bool,

    /// Print what would be done without calling the AI or writing files
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Verbose output to stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Force regeneration, ignoring version checks
    #[arg(short, long)]
    pub force: bool,

    /// When to regenerate the output
    #[arg(long = "gen", value_enum)]
    pub gen_mode: Option<GenMode>,

    /// How to embed the version marker into the output
    #[arg(long, value_enum)]
    pub write: Option<WriteMode>,

    /// Replace only the lines between the two occurrences of the given
    /// marker in the output file
    #[arg(long, value_name = "MARKER")]
    pub write_part: Option<String>,

    /// Ask the AI a question about the generated result instead of
    /// regenerating it; needs the same options as the generating call
    #[arg(short, long, value_name = "QUESTION")]
    pub explain: Option<String>,

    /// URL of the chat completion endpoint
    #[arg(short, long)]
    pub url: Option<String>,

    /// API key; default comes from OPENAI_API_KEY or ANTHROPIC_API_KEY
    #[arg(short = 'a', long)]
    pub api_key: Option<String>,

    /// OpenAI organization id sent with each request
    #[arg(long, value_name = "ID")]
    pub organization: Option<String>,

    /// Model to use; the pseudo model "copy" concatenates the inputs
    /// without calling an AI
    #[arg(short, long)]
    pub model: Option<String>,

    /// Maximum number of tokens to generate
    #[arg(short = 't', long)]
    pub maxtokens: Option<u32>,

    /// Read additional options from the given file
    #[arg(long, value_name = "FILE")]
    pub configfile: Vec<PathBuf>,

    /// Do not scan for .genpipe config files
    #[arg(long)]
    pub confignoscan: bool,

    /// Ignore the GENPIPE_CONFIG environment variable
    #[arg(long)]
    pub configignoreenv: bool,

    /// Print the collected configuration sets and exit
    #[arg(long)]
    pub configprint: bool,

    /// Scan files or directories for AIGenPromptStart regions and process
    /// them as a batch
    #[arg(long, value_name = "PATH")]
    pub scan: Vec<String>,

    /// Print a Mermaid dependency diagram of the scanned tasks and exit
    #[arg(long)]
    pub print_dependency_diagram: bool,

    /// Input files processed into the output
    pub inputs: Vec<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenMode {
    /// Always regenerate
    Always,
    /// Only when the output does not exist
    Notexists,
    /// When the output is missing or older than an input
    Older,
    /// When the recorded input versions changed (default)
    Versioncheck,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Embed a version marker comment (default)
    Version,
    /// Write the bare content; not compatible with the version check
    Noversion,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .ok_or_else(|| format!("expected KEY=VALUE, got {s:?}"))
}

impl Cli {
    pub fn regeneration_check(&self) -> RegenerationCheckStrategy {
        if self.force {
            return RegenerationCheckStrategy::Always;
        }
        match self.gen_mode {
            Some(GenMode::Always) => RegenerationCheckStrategy::Always,
            Some(GenMode::Notexists) => RegenerationCheckStrategy::IfNotExists,
            Some(GenMode::Older) => RegenerationCheckStrategy::IfOlder,
            Some(GenMode::Versioncheck) | None => RegenerationCheckStrategy::VersionMarker,
        }
    }

    pub fn writing_strategy(&self) -> WritingStrategy {
        if let Some(marker) = &self.write_part {
            return WritingStrategy::WritePart {
                marker: marker.clone(),
            };
        }
        match self.write {
            Some(WriteMode::Noversion) => WritingStrategy::NoVersion,
            Some(WriteMode::Version) | None => WritingStrategy::WithVersion,
        }
    }
}
