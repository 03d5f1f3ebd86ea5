use crate::cmd::{load_config, load_context};
use crate::output::emit_json;
use std::path::Path;
use taptik_core::types::Platform;

pub fn run(root: &Path, platform: Platform, output: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let context = load_context(root, platform, None, &config)?;
    emit_json(&context, output)?;
    if let Some(path) = output {
        if !json {
            println!("Built {} context: {}", platform.display_name(), path.display());
        }
    }
    Ok(())
}
