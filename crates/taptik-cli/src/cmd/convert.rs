use crate::cmd::{load_config, load_context};
use crate::output::{emit_json, print_json, print_notes};
use std::path::Path;
use taptik_core::converter::converter_for;
use taptik_core::types::Platform;

pub fn run(
    root: &Path,
    from: Platform,
    to: Platform,
    input: Option<&Path>,
    output: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let converter = converter_for(from, to, &config.conversion)?;
    let context = load_context(root, from, input, &config)?;

    let result = converter.convert(&context);
    if json && output.is_none() {
        print_json(&result)?;
    }
    let Some(converted) = &result.data else {
        anyhow::bail!(
            "conversion failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        );
    };
    if !json {
        print_notes(&result.warnings, &result.unsupported_features);
        for a in &result.approximations {
            eprintln!("approximated {}: {}", a.feature, a.note);
        }
    }
    match output {
        Some(path) => {
            emit_json(converted, Some(path))?;
            if json {
                print_json(&serde_json::json!({
                    "output": path,
                    "warnings": &result.warnings,
                    "unsupported_features": &result.unsupported_features,
                    "approximations": &result.approximations,
                }))?;
            } else {
                println!(
                    "Converted {} → {}: {}",
                    from.display_name(),
                    to.display_name(),
                    path.display()
                );
            }
        }
        None if !json => emit_json(converted, None)?,
        None => {}
    }
    Ok(())
}
