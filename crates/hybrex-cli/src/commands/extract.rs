//! Extract command - run a rule set over a single document.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::info;

use hybrex_core::RuleRunner;

use super::{ensure_parent, load_config, load_document, load_engine, to_json_string};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input document: a JSON document (text and tokens) or a plain text file
    #[arg(required = true)]
    input: PathBuf,

    /// Rule file (YAML)
    #[arg(short, long)]
    rules: Option<PathBuf>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Attach the per-rule trace under `__debug__`
    #[arg(long)]
    debug: bool,

    /// Do not emit `<field>_confidence` keys
    #[arg(long)]
    no_confidence_keys: bool,
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;

    // Check input file exists
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let (rules, registry) = load_engine(args.rules.as_deref(), &config)?;
    let doc = load_document(&args.input)?;

    let extraction = RuleRunner::new(&rules, &registry)
        .with_debug(args.debug || config.output.debug)
        .run(&doc);

    let confidence_keys = config.output.confidence_keys && !args.no_confidence_keys;
    let content = to_json_string(&extraction.to_json(confidence_keys), config.output.pretty)?;

    info!(
        "Extracted {} fields from {} in {:?}",
        extraction.fields.len(),
        args.input.display(),
        start.elapsed()
    );

    match args.output {
        Some(path) => {
            ensure_parent(&path)?;
            fs::write(&path, content)?;
            println!(
                "{} Extracted {} fields to {}",
                style("✓").green(),
                extraction.fields.len(),
                path.display()
            );
        }
        None => println!("{}", content),
    }

    Ok(())
}
