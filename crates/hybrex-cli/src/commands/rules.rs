//! Rules command - lint and list rule files.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use console::style;

use hybrex_core::{Rule, RuleKind, RuleSet};

use super::load_config;

/// Arguments for the rules command.
#[derive(Args)]
pub struct RulesArgs {
    #[command(subcommand)]
    command: RulesCommand,
}

#[derive(Subcommand)]
enum RulesCommand {
    /// Load a rule file and report unknown plugins and validators
    Check {
        /// Rule file (YAML)
        rules: PathBuf,
    },

    /// List the rules of a rule file in evaluation order
    List {
        /// Rule file (YAML)
        rules: PathBuf,
    },
}

pub async fn run(args: RulesArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    match args.command {
        RulesCommand::Check { rules } => check_rules(&rules, config_path),
        RulesCommand::List { rules } => list_rules(&rules),
    }
}

fn check_rules(path: &Path, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let rules = RuleSet::from_file(path)?;
    let registry = config.registry()?;

    let issues = registry.check(&rules);
    if issues.is_empty() {
        println!(
            "{} {} rules OK in {}",
            style("✓").green(),
            rules.len(),
            path.display()
        );
        return Ok(());
    }

    for issue in &issues {
        println!(
            "{} rule #{} ({}): {}",
            style("✗").red(),
            issue.index,
            issue.rule,
            issue.error
        );
    }

    anyhow::bail!("{} of {} rules reference unknown names", issues.len(), rules.len())
}

fn list_rules(path: &Path) -> anyhow::Result<()> {
    let rules = RuleSet::from_file(path)?;

    println!(
        "{:<4} {:<24} {:<24} {:<10} {}",
        "#", "NAME", "FIELD", "KIND", "DETAILS"
    );
    for (index, rule) in rules.iter().enumerate() {
        let (kind, details) = describe(rule);
        println!(
            "{:<4} {:<24} {:<24} {:<10} {}",
            index,
            rule.name,
            rule.output_field(),
            kind,
            details
        );
    }

    Ok(())
}

fn describe(rule: &Rule) -> (&'static str, String) {
    let mut details = match &rule.kind {
        Some(RuleKind::Pattern(p)) => format!("/{}/ group {}", p.pattern, p.group),
        Some(RuleKind::Plugin(p)) => p.plugin.clone(),
        None => String::new(),
    };

    if let Some(confidence) = rule.confidence {
        details.push_str(&format!(" conf {}", confidence));
    }
    if !rule.validators.is_empty() {
        details.push_str(&format!(" [{}]", rule.validators.join(", ")));
    }

    let kind = match rule.kind {
        Some(RuleKind::Pattern(_)) => "pattern",
        Some(RuleKind::Plugin(_)) => "plugin",
        None => "inert",
    };
    (kind, details.trim().to_string())
}
