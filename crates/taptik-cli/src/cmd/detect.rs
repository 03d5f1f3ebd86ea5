use crate::output::{print_json, print_table};
use std::path::Path;
use taptik_core::builder::detect_platforms;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let platforms = detect_platforms(root);

    if json {
        return print_json(&platforms);
    }
    if platforms.is_empty() {
        println!("No IDE configuration found in {}.", root.display());
        return Ok(());
    }
    let rows = platforms
        .iter()
        .map(|p| vec![p.to_string(), p.display_name().to_string()])
        .collect();
    print_table(&["PLATFORM", "NAME"], rows);
    Ok(())
}
