//! gp - incremental AI file generation pipeline
//!
//! CLI entry point: assembles the configuration cascade, then either runs a
//! single generation task or scans for in-file prompt regions and executes
//! them as a dependency-ordered batch.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use eyre::{Context, Result, eyre};
use genframe::{
    ChatClient, CopyChat, GenerationTask, InOut, MODEL_COPY, OPENAI_URL, OpenAiChat,
};
use tracing::{debug, info};

use genpipe::cli::Cli;
use genpipe::{config, graph, scan};

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default)),
        )
        .init();
}

fn main() -> Result<ExitCode> {
    let raw: Vec<String> = std::env::args().skip(1).collect();
    let (merged, sets) = config::assemble(&raw, Path::new("."))?;
    // clap handles --help and --version itself, including their exit codes
    let cli = match Cli::try_parse_from(&merged) {
        Ok(cli) => cli,
        Err(e) => e.exit(),
    };
    setup_logging(cli.verbose);
    debug!(args = ?merged, "merged arguments");

    if cli.configprint {
        for set in &sets {
            println!("{}:\n  {}", set.source, set.args.join(" "));
        }
        return Ok(ExitCode::SUCCESS);
    }

    if cli.scan.is_empty() {
        run_single(&cli, &merged)
    } else {
        run_scan(&cli, &merged)
    }
}

fn make_chat(cli: &Cli) -> Box<dyn ChatClient> {
    let model = cli.model.as_deref().unwrap_or(genframe::chat::DEFAULT_MODEL);
    if model == MODEL_COPY {
        Box::new(CopyChat)
    } else {
        let url = cli.url.as_deref().unwrap_or(OPENAI_URL);
        Box::new(OpenAiChat::new(url, model, cli.api_key.clone()).organization(cli.organization.clone()))
    }
}

fn build_single_task(cli: &Cli) -> Result<GenerationTask> {
    let output = cli
        .output
        .as_ref()
        .ok_or_else(|| eyre!("no output file given, use -o"))?;
    let output = InOut::file(output);
    let mut task = GenerationTask::new();
    for input in &cli.inputs {
        let input = input_unit(input);
        // reading and rewriting the same file is legal, but then the input
        // may not exist yet
        if input.same_file(&output) {
            task.add_optional_input(input);
        } else {
            task.add_input(input)
                .wrap_err("could not add input file")?;
        }
    }
    for prompt in &cli.prompts {
        task.add_prompt(InOut::file(prompt), &cli.keys)
            .wrap_err_with(|| format!("could not read prompt file {}", prompt.display()))?;
    }
    if let Some(sysmsg) = &cli.sysmsg {
        task.set_system_message(InOut::file(sysmsg))
            .wrap_err_with(|| format!("could not read system message file {}", sysmsg.display()))?;
    }
    task.set_output(output);
    task.writing_strategy(cli.writing_strategy());
    task.regeneration_check(cli.regeneration_check());
    task.force(cli.force);
    if let Some(maxtokens) = cli.maxtokens {
        task.max_tokens(maxtokens);
    }
    Ok(task)
}

fn input_unit(path: &PathBuf) -> InOut {
    if path.as_os_str() == "-" {
        InOut::stdin()
    } else {
        InOut::file(path)
    }
}

fn run_single(cli: &Cli, _merged: &[String]) -> Result<ExitCode> {
    let task = build_single_task(cli)?;
    let chat = make_chat(cli);
    let root = Path::new(".");

    if cli.check {
        let needed = task.needs_regeneration()?;
        if cli.verbose {
            eprintln!("Needs regeneration: {needed}");
        }
        return Ok(if needed {
            ExitCode::from(1)
        } else {
            ExitCode::SUCCESS
        });
    }
    if cli.verbose || cli.dry_run {
        eprintln!("{}", task.serialize(chat.as_ref(), root)?);
    }
    if cli.dry_run {
        let needed = task.needs_regeneration()?;
        eprintln!("Dry run, nothing executed; needs regeneration: {needed}");
        return Ok(ExitCode::SUCCESS);
    }
    if let Some(question) = &cli.explain {
        let answer = task.explain(chat.as_ref(), root, question)?;
        println!("{answer}");
        return Ok(ExitCode::SUCCESS);
    }
    task.execute(chat.as_ref(), root)
        .wrap_err("generation failed")?;
    Ok(ExitCode::SUCCESS)
}

fn run_scan(cli: &Cli, merged: &[String]) -> Result<ExitCode> {
    let regions = scan::find_regions(&cli.scan)?;
    if regions.is_empty() {
        return Err(eyre!("no prompt regions found under the scan paths"));
    }
    let mut tasks = Vec::new();
    let mut clis = Vec::new();
    for region in &regions {
        let (task, region_cli) = scan::build_task(region, merged)?;
        tasks.push(task);
        clis.push(region_cli);
    }

    let root = Path::new(".");
    if cli.print_dependency_diagram {
        print!("{}", graph::dep_diagram(&tasks, root)?);
        return Ok(ExitCode::SUCCESS);
    }

    let order = graph::execution_order(&tasks)?;
    if cli.check {
        for index in &order {
            if tasks[*index].needs_regeneration()? {
                if cli.verbose {
                    eprintln!("Needs regeneration: {}", regions[*index].path.display());
                }
                return Ok(ExitCode::from(1));
            }
        }
        return Ok(ExitCode::SUCCESS);
    }
    for index in order {
        let task = &tasks[index];
        let region = &regions[index];
        let region_cli = &clis[index];
        let chat = make_chat(region_cli);
        if cli.dry_run {
            let needed = task.needs_regeneration()?;
            eprintln!(
                "Dry run: {} region {} needs regeneration: {needed}",
                region.path.display(),
                region.id
            );
            continue;
        }
        info!(path = %region.path.display(), id = %region.id, "processing region");
        task.execute(chat.as_ref(), root).wrap_err_with(|| {
            format!(
                "generation failed for region {} in {}",
                region.id,
                region.path.display()
            )
        })?;
    }
    Ok(ExitCode::SUCCESS)
}
