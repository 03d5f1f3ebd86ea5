use crate::cmd::load_config;
use crate::output::print_json;
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;
use taptik_core::config::{Config, WarnLevel};
use taptik_core::paths::config_path;

// ---------------------------------------------------------------------------
// Subcommand types
// ---------------------------------------------------------------------------

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Write a default .taptik/config.yaml if none exists
    Init,

    /// Show the effective configuration
    Show,

    /// Validate the config for common mistakes
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Init => init(root),
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

// ---------------------------------------------------------------------------
// init
// ---------------------------------------------------------------------------

fn init(root: &Path) -> anyhow::Result<()> {
    let path = config_path(root);
    if path.exists() {
        println!("{} already exists.", path.display());
        return Ok(());
    }
    Config::default().save(root).context("failed to save config")?;
    println!("Wrote {}.", path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    if json {
        return print_json(&config);
    }
    let conv = &config.conversion;
    println!("context_version:          {}", config.context_version);
    println!("merge_strategy:           {}", conv.merge_strategy);
    println!("validate_integrity:       {}", conv.validate_integrity);
    println!("compatibility_threshold:  {}", conv.compatibility_threshold);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
