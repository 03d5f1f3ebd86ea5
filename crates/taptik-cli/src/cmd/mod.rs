pub mod build;
pub mod compat;
pub mod config;
pub mod convert;
pub mod deploy;
pub mod detect;

use anyhow::Context;
use std::path::Path;
use taptik_core::builder::build_context;
use taptik_core::config::Config;
use taptik_core::context::TaptikContext;
use taptik_core::io::expand_tilde;
use taptik_core::types::Platform;

pub fn load_config(root: &Path) -> anyhow::Result<Config> {
    Config::load(root).context("failed to load .taptik/config.yaml")
}

/// Read a context file, or build a fresh context for `platform` from the project.
pub fn load_context(
    root: &Path,
    platform: Platform,
    input: Option<&Path>,
    config: &Config,
) -> anyhow::Result<TaptikContext> {
    match input {
        Some(path) => {
            let path = expand_tilde(path)?;
            let data = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&data).with_context(|| format!("{} is not a Taptik context", path.display()))
        }
        None => build_context(platform, root, &config.context_version)
            .with_context(|| format!("failed to build {platform} context from {}", root.display())),
    }
}
