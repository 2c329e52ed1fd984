//! Batch command - run a rule set over many documents in parallel.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use hybrex_core::{Registry, RuleRunner, RuleSet};

use super::{load_config, load_document, load_engine, to_json_string};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern matching the input documents
    #[arg(required = true)]
    input: String,

    /// Rule file (YAML)
    #[arg(short, long)]
    rules: Option<PathBuf>,

    /// Output directory (default: next to each input as `<stem>.fields.json`;
    /// such files are never picked up as inputs)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short = 'j', long)]
    jobs: Option<usize>,

    /// Attach the per-rule trace under `__debug__`
    #[arg(long)]
    debug: bool,

    /// Continue on error instead of stopping at the first failed document
    #[arg(long)]
    continue_on_error: bool,
}

/// Settings shared by every worker.
struct Job {
    rules: RuleSet,
    registry: Registry,
    output_dir: Option<PathBuf>,
    debug: bool,
    confidence_keys: bool,
    pretty: bool,
}

/// Result of processing a single file.
struct ProcessResult {
    path: PathBuf,
    fields: Option<usize>,
    error: Option<String>,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;
    let (rules, registry) = load_engine(args.rules.as_deref(), &config)?;

    // Expand glob pattern, leaving out results of earlier runs
    let mut files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .filter(|p| {
            let output = is_batch_output(p);
            if output {
                debug!("Skipping batch output {}", p.display());
            }
            !output
        })
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    // Create output directory if specified
    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let jobs = args.jobs.unwrap_or(config.batch.jobs).max(1);
    let continue_on_error = args.continue_on_error || config.batch.continue_on_error;

    let job = Arc::new(Job {
        rules,
        registry,
        output_dir: args.output_dir.clone(),
        debug: args.debug || config.output.debug,
        confidence_keys: config.output.confidence_keys,
        pretty: config.output.pretty,
    });

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    // Evaluation is CPU-bound: run it on the blocking pool, at most `jobs` at a time
    let semaphore = Arc::new(Semaphore::new(jobs));
    let mut handles = Vec::with_capacity(files.len());

    for path in files {
        let job = Arc::clone(&job);
        let semaphore = Arc::clone(&semaphore);
        let progress = progress.clone();

        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await?;
            let result = tokio::task::spawn_blocking(move || {
                let outcome = process_single_file(&path, &job);
                ProcessResult {
                    fields: outcome.as_ref().ok().copied(),
                    error: outcome.err().map(|e| e.to_string()),
                    path,
                }
            })
            .await?;
            progress.inc(1);
            anyhow::Ok(result)
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    let mut pending = handles.into_iter();
    while let Some(handle) = pending.next() {
        let result = match handle.await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                cancel(pending, &progress);
                return Err(e);
            }
            Err(e) => {
                cancel(pending, &progress);
                return Err(e.into());
            }
        };

        if let Some(error_msg) = &result.error {
            if continue_on_error {
                warn!("Failed to process {}: {}", result.path.display(), error_msg);
            } else {
                error!("Failed to process {}: {}", result.path.display(), error_msg);
                cancel(pending, &progress);
                anyhow::bail!("Processing failed: {}", error_msg);
            }
        }
        results.push(result);
    }

    progress.finish_with_message("Complete");

    let successful = results.iter().filter(|r| r.fields.is_some()).count();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    // Print summary
    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(successful).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

/// Abort workers that have not finished. Documents already handed to the
/// blocking pool still complete.
fn cancel<I>(pending: I, progress: &ProgressBar)
where
    I: IntoIterator<Item = JoinHandle<anyhow::Result<ProcessResult>>>,
{
    let mut aborted = 0;
    for handle in pending {
        handle.abort();
        aborted += 1;
    }
    debug!("Cancelled {} pending files", aborted);
    progress.abandon();
}

/// Evaluate one document and write its output. Returns the field count.
fn process_single_file(path: &Path, job: &Job) -> anyhow::Result<usize> {
    let doc = load_document(path)?;
    let extraction = RuleRunner::new(&job.rules, &job.registry)
        .with_debug(job.debug)
        .run(&doc);

    let output_path = output_path_for(path, job.output_dir.as_deref());
    let content = to_json_string(&extraction.to_json(job.confidence_keys), job.pretty)?;
    fs::write(&output_path, content)?;
    debug!("Wrote output to {}", output_path.display());

    Ok(extraction.fields.len())
}

/// Files written next to their input by an earlier run.
fn is_batch_output(path: &Path) -> bool {
    path.file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|name| name.ends_with(".fields.json"))
}

fn output_path_for(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("document");

    match output_dir {
        Some(dir) => dir.join(format!("{}.json", stem)),
        None => input.with_file_name(format!("{}.fields.json", stem)),
    }
}
