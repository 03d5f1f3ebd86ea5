use crate::cmd::{load_config, load_context};
use crate::output::{print_json, print_notes};
use anyhow::Context;
use std::path::Path;
use taptik_core::converter::converter_for;
use taptik_core::io::expand_tilde;
use taptik_core::types::Platform;

pub fn run(
    root: &Path,
    from: Platform,
    to: Platform,
    input: Option<&Path>,
    target: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let converter = converter_for(from, to, &config.conversion)?;
    let context = load_context(root, from, input, &config)?;
    let target = match target {
        Some(p) => expand_tilde(p).context("failed to resolve --target")?,
        None => root.to_path_buf(),
    };

    let report = converter.validate_compatibility(&context);
    if !report.compatible {
        anyhow::bail!(
            "{} → {} compatibility score {} is below the threshold of {}",
            from.display_name(),
            to.display_name(),
            report.score,
            converter.compatibility_threshold()
        );
    }

    let result = converter.convert(&context);
    let Some(converted) = &result.data else {
        anyhow::bail!(
            "conversion failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    };
    let deployed = converter.deploy(converted, &target);

    if json {
        print_json(&serde_json::json!({
            "compatibility": &report,
            "warnings": &result.warnings,
            "deploy": &deployed,
        }))?;
    } else {
        print_notes(&result.warnings, &result.unsupported_features);
        for file in &deployed.deployed_files {
            println!("wrote {file}");
        }
    }

    if !deployed.success {
        anyhow::bail!("deploy to {} failed: {}", target.display(), deployed.errors.join("; "));
    }
    Ok(())
}
