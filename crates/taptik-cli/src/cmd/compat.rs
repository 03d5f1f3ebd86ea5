use crate::cmd::{load_config, load_context};
use crate::output::{print_json, print_table};
use std::path::Path;
use taptik_core::converter::converter_for;
use taptik_core::types::Platform;

pub fn run(root: &Path, from: Platform, to: Platform, input: Option<&Path>, json: bool) -> anyhow::Result<()> {
    let config = load_config(root)?;
    let converter = converter_for(from, to, &config.conversion)?;
    let context = load_context(root, from, input, &config)?;
    let report = converter.validate_compatibility(&context);

    if json {
        return print_json(&report);
    }

    let verdict = if report.compatible { "compatible" } else { "incompatible" };
    println!(
        "{} → {}: score {} ({verdict}, threshold {})",
        from.display_name(),
        to.display_name(),
        report.score,
        converter.compatibility_threshold()
    );

    let mut rows: Vec<Vec<String>> = report
        .supported_features
        .iter()
        .map(|f| vec![f.clone(), "100".into(), String::new()])
        .collect();
    rows.extend(
        report
            .partial_support
            .iter()
            .map(|p| vec![p.feature.clone(), p.support_level.to_string(), p.notes.clone()]),
    );
    rows.extend(
        report
            .unsupported_features
            .iter()
            .map(|f| vec![f.clone(), "0".into(), "not supported".into()]),
    );
    if !rows.is_empty() {
        println!();
        print_table(&["FEATURE", "SUPPORT", "NOTES"], rows);
    }
    Ok(())
}
