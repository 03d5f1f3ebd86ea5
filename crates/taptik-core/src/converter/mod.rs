//! Converter strategies: move a context from one platform to another through
//! the reverse mapping service, then deploy the result as files.
//!
//! ```text
//! TaptikContext ──ide.data.<source>──▶ features ──reverse_map──▶ <Target>Config
//!                                                                   │
//!                      TaptikContext (ide.data.<target>) ◀──────────┤
//!                                                                   ▼
//!                                                          deploy ──▶ files
//! ```

pub mod to_claude_code;
pub mod to_kiro;

pub use to_claude_code::ClaudeCodeConverter;
pub use to_kiro::KiroConverter;

use crate::builder::{embed_config, platform_features, Approximation, ConversionResult, PlatformConfig};
use crate::config::{ConversionConfig, DEFAULT_COMPATIBILITY_THRESHOLD};
use crate::context::TaptikContext;
use crate::error::{Result, TaptikError};
use crate::io::FileSystem;
use crate::mapping::{MappingTable, ReverseMapOptions, ReverseMappingResult, ReverseMappingService};
use crate::types::Platform;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialSupport {
    pub feature: String,
    /// 0-100
    pub support_level: u32,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityReport {
    pub compatible: bool,
    pub score: u32,
    pub supported_features: Vec<String>,
    pub unsupported_features: Vec<String>,
    pub partial_support: Vec<PartialSupport>,
}

impl CompatibilityReport {
    pub fn new(
        supported_features: Vec<String>,
        unsupported_features: Vec<String>,
        partial_support: Vec<PartialSupport>,
        threshold: u32,
    ) -> Self {
        let score = compatibility_score(
            supported_features.len(),
            unsupported_features.len(),
            &partial_support,
        );
        Self {
            compatible: score >= threshold,
            score,
            supported_features,
            unsupported_features,
            partial_support,
        }
    }
}

/// Unweighted average: supported features count 100, partial ones their
/// support level, unsupported ones 0. No features at all scores 0.
pub fn compatibility_score(supported: usize, unsupported: usize, partial: &[PartialSupport]) -> u32 {
    let total = supported + unsupported + partial.len();
    if total == 0 {
        return 0;
    }
    let sum = supported as u64 * 100 + partial.iter().map(|p| u64::from(p.support_level)).sum::<u64>();
    (sum as f64 / total as f64).round() as u32
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeployResult {
    pub success: bool,
    /// Paths relative to the deploy root, in write order.
    pub deployed_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl DeployResult {
    pub fn from_outcome(outcome: Result<()>, deployed_files: Vec<String>) -> Self {
        match outcome {
            Ok(()) => Self {
                success: true,
                deployed_files,
                errors: Vec::new(),
            },
            Err(e) => {
                tracing::warn!(error = %e, written = deployed_files.len(), "deploy aborted");
                Self {
                    success: false,
                    deployed_files,
                    errors: vec![e.to_string()],
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Partial support table
// ---------------------------------------------------------------------------

const PARTIAL_SUPPORT: &[(Platform, Platform, &str, u32, &str)] = &[
    (
        Platform::ClaudeCode,
        Platform::Kiro,
        "instructions",
        80,
        "sections become specs split on ## headings; text outside a section is dropped",
    ),
    (
        Platform::ClaudeCode,
        Platform::Kiro,
        "commands",
        70,
        "commands become manual hooks and are always enabled",
    ),
    (
        Platform::ClaudeCode,
        Platform::Kiro,
        "settings",
        50,
        "copied verbatim into .kiro/settings/project.json",
    ),
    (
        Platform::Cursor,
        Platform::Kiro,
        "rules",
        80,
        "rules become steering documents split on ## headings",
    ),
    (
        Platform::Cursor,
        Platform::Kiro,
        "settings",
        50,
        "editor settings copied verbatim into .kiro/settings/project.json",
    ),
    (
        Platform::Kiro,
        Platform::ClaudeCode,
        "hooks",
        60,
        "hook events become command triggers; file patterns and disabled state are dropped",
    ),
    (
        Platform::Kiro,
        Platform::ClaudeCode,
        "project_settings",
        50,
        "copied verbatim into .claude/settings.json",
    ),
];

/// `(feature, support_level, notes)` for features that convert with loss.
pub fn partial_support(
    source: Platform,
    target: Platform,
) -> impl Iterator<Item = (&'static str, u32, &'static str)> {
    PARTIAL_SUPPORT
        .iter()
        .filter(move |(s, t, ..)| *s == source && *t == target)
        .map(|&(_, _, feature, level, notes)| (feature, level, notes))
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => true,
    }
}

/// Classify every feature of `context`'s `source` config against `target`.
pub fn assess_compatibility(
    context: &TaptikContext,
    source: Platform,
    target: Platform,
    threshold: u32,
) -> CompatibilityReport {
    let missing = |reason: String| CompatibilityReport::new(Vec::new(), vec![reason], Vec::new(), threshold);

    let Some(native) = context.ide_config(source) else {
        return missing(format!("ide.data.{source}"));
    };
    let features = match platform_features(source, native) {
        Ok(Value::Object(map)) => map,
        Ok(_) => Map::new(),
        Err(e) => return missing(format!("ide.data.{source}: {e}")),
    };

    let mappings = MappingTable::builtin().get_mappings(source, target);
    let mut supported = Vec::new();
    let mut unsupported = Vec::new();
    let mut partial = Vec::new();

    for (feature, value) in &features {
        if !is_present(value) {
            continue;
        }
        if let Some((_, level, notes)) = partial_support(source, target).find(|(f, ..)| f == feature) {
            partial.push(PartialSupport {
                feature: feature.clone(),
                support_level: level,
                notes: notes.to_string(),
            });
        } else if mappings.iter().any(|m| &m.source.feature == feature) {
            supported.push(feature.clone());
        } else {
            unsupported.push(feature.clone());
        }
    }

    CompatibilityReport::new(supported, unsupported, partial, threshold)
}

// ---------------------------------------------------------------------------
// ConverterStrategy
// ---------------------------------------------------------------------------

pub trait ConverterStrategy {
    fn source(&self) -> Platform;

    fn target(&self) -> Platform;

    fn compatibility_threshold(&self) -> u32 {
        DEFAULT_COMPATIBILITY_THRESHOLD
    }

    /// Static feasibility gate.
    fn can_convert(&self) -> bool {
        self.source() != self.target() && MappingTable::builtin().supports(self.source(), self.target())
    }

    /// Never fails: every problem is reported inside the result.
    fn convert(&self, context: &TaptikContext) -> ConversionResult<TaptikContext>;

    fn validate_compatibility(&self, context: &TaptikContext) -> CompatibilityReport {
        assess_compatibility(
            context,
            self.source(),
            self.target(),
            self.compatibility_threshold(),
        )
    }

    /// Write the target platform's files under `target_dir`. Writes are not
    /// transactional; `deployed_files` lists what made it to disk.
    fn deploy(&self, context: &TaptikContext, target_dir: &Path) -> DeployResult;
}

/// The converter for an ordered platform pair.
pub fn converter_for(
    source: Platform,
    target: Platform,
    config: &ConversionConfig,
) -> Result<Box<dyn ConverterStrategy>> {
    match (source, target) {
        (Platform::ClaudeCode | Platform::Cursor, Platform::Kiro) => Ok(Box::new(
            KiroConverter::new(source).with_config(config.clone()),
        )),
        (Platform::Kiro, Platform::ClaudeCode) => {
            Ok(Box::new(ClaudeCodeConverter::new().with_config(config.clone())))
        }
        _ => Err(TaptikError::UnsupportedConversion {
            from: source,
            to: target,
        }),
    }
}

// ---------------------------------------------------------------------------
// Shared conversion steps
// ---------------------------------------------------------------------------

/// Target config assembled from a reverse mapping pass.
pub(crate) struct Reversed<T> {
    pub config: T,
    pub result: ReverseMappingResult,
    /// Source features the pass started from.
    pub features: Map<String, Value>,
}

impl<T> Reversed<T> {
    /// Claim a source feature the mapping left unmapped.
    pub fn take_unmapped(&mut self, feature: &str) -> Option<Value> {
        let pos = self.result.unmapped_features.iter().position(|f| f == feature)?;
        self.result.unmapped_features.remove(pos);
        self.features.get(feature).cloned()
    }
}

pub(crate) fn reverse_into<T: PlatformConfig>(
    service: &ReverseMappingService<'_>,
    config: &ConversionConfig,
    context: &TaptikContext,
    source: Platform,
) -> Result<Reversed<T>> {
    let native = context
        .ide_config(source)
        .ok_or(TaptikError::MissingPlatformConfig(source))?;
    let features = match platform_features(source, native)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let existing = match context.ide_config(T::PLATFORM) {
        Some(v) => match platform_features(T::PLATFORM, v)? {
            Value::Object(map) => Some(map),
            _ => None,
        },
        None => None,
    };
    let options = ReverseMapOptions {
        merge_strategy: config.merge_strategy,
        validate_integrity: config.validate_integrity,
        existing,
        ..Default::default()
    };
    let result = service.reverse_map(&Value::Object(features.clone()), source, T::PLATFORM, &options);
    Ok(Reversed {
        config: T::from_features(&result.reversed_features),
        result,
        features,
    })
}

/// Embed the assembled config into a copy of `context` and collect the
/// result's warnings, unsupported features and approximations.
pub(crate) fn finish<T: PlatformConfig>(
    context: &TaptikContext,
    source: Platform,
    reversed: Reversed<T>,
) -> Result<ConversionResult<TaptikContext>> {
    let target = T::PLATFORM;
    let mut converted = context.clone();
    embed_config(&mut converted, &reversed.config)?;
    converted.stamp_conversion(source, target);

    let Reversed { result, features, .. } = reversed;
    let mut warnings = result.warnings;
    warnings.extend(result.conflicts.iter().map(|(f, msg)| format!("{f}: {msg}")));
    for key in context.unknown_platform_keys() {
        tracing::warn!(%key, "unknown platform key ignored");
        warnings.push(format!("unknown platform key '{key}' ignored"));
    }
    if !result.metadata.reversible {
        warnings.push(format!("converting back from {target} to {source} will not reproduce the original"));
    }

    let approximations = partial_support(source, target)
        .filter(|(feature, ..)| features.get(*feature).is_some_and(is_present))
        .map(|(feature, _, notes)| Approximation {
            feature: feature.to_string(),
            note: notes.to_string(),
        })
        .collect();

    tracing::debug!(%source, %target, warnings = warnings.len(), "conversion finished");
    let mut out = ConversionResult::ok(converted);
    out.warnings = warnings;
    out.unsupported_features = result.unmapped_features;
    out.approximations = approximations;
    Ok(out)
}

/// Write `content` to `root/rel` and record `rel`.
pub(crate) fn deploy_file<F: FileSystem>(
    fs: &F,
    root: &Path,
    rel: &str,
    content: &str,
    deployed: &mut Vec<String>,
) -> Result<()> {
    fs.write_file(&root.join(rel), content)?;
    tracing::debug!(file = rel, "deployed");
    deployed.push(rel.to_string());
    Ok(())
}

pub(crate) fn deploy_json<F: FileSystem, V: Serialize>(
    fs: &F,
    root: &Path,
    rel: &str,
    value: &V,
    deployed: &mut Vec<String>,
) -> Result<()> {
    fs.write_json(&root.join(rel), value)?;
    tracing::debug!(file = rel, "deployed");
    deployed.push(rel.to_string());
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CONTEXT_VERSION;
    use crate::types::Category;
    use serde_json::json;

    fn partial(level: u32) -> PartialSupport {
        PartialSupport {
            feature: "commands".into(),
            support_level: level,
            notes: String::new(),
        }
    }

    #[test]
    fn single_supported_feature_scores_100() {
        let report = CompatibilityReport::new(vec!["mcp_servers".into()], vec![], vec![], 60);
        assert_eq!(report.score, 100);
        assert!(report.compatible);
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let at = CompatibilityReport::new(vec!["a".into()], vec![], vec![partial(20)], 60);
        assert_eq!(at.score, 60);
        assert!(at.compatible);

        let below = CompatibilityReport::new(vec!["a".into()], vec![], vec![partial(18)], 60);
        assert_eq!(below.score, 59);
        assert!(!below.compatible);
    }

    #[test]
    fn nothing_to_convert_scores_zero() {
        assert_eq!(compatibility_score(0, 0, &[]), 0);
    }

    #[test]
    fn missing_source_config_is_incompatible() {
        let ctx = TaptikContext::new(CONTEXT_VERSION, Platform::ClaudeCode);
        let report = assess_compatibility(&ctx, Platform::ClaudeCode, Platform::Kiro, 60);
        assert_eq!(report.score, 0);
        assert!(!report.compatible);
        assert_eq!(report.unsupported_features, vec!["ide.data.claude_code"]);
    }

    #[test]
    fn claude_code_to_kiro_assessment() {
        let mut ctx = TaptikContext::new(CONTEXT_VERSION, Platform::ClaudeCode);
        ctx.set_platform_data(
            Category::Ide,
            Platform::ClaudeCode,
            json!({
                "instructions": "# P\n\n## Auth\n### Tasks\nLogin",
                "mcp_servers": [{"name": "fs", "command": "fs-mcp"}],
                "commands": [{"name": "lint", "command": "npm run lint"}]
            }),
        );
        let report = assess_compatibility(&ctx, Platform::ClaudeCode, Platform::Kiro, 60);
        assert_eq!(report.supported_features, vec!["mcp_servers"]);
        let partial: Vec<_> = report.partial_support.iter().map(|p| p.feature.as_str()).collect();
        assert_eq!(partial, vec!["commands", "instructions"]);
        // (100 + 70 + 80) / 3
        assert_eq!(report.score, 83);
        assert!(report.compatible);
    }

    #[test]
    fn cursor_settings_have_no_mapping_but_are_partial() {
        let mut ctx = TaptikContext::new(CONTEXT_VERSION, Platform::Cursor);
        ctx.set_platform_data(
            Category::Ide,
            Platform::Cursor,
            json!({"settings": {"editor.tabSize": 2}}),
        );
        let report = assess_compatibility(&ctx, Platform::Cursor, Platform::Kiro, 60);
        assert_eq!(report.partial_support[0].support_level, 50);
        assert_eq!(report.score, 50);
        assert!(!report.compatible);
    }

    #[test]
    fn converter_lookup() {
        let cfg = ConversionConfig::default();
        let c = converter_for(Platform::Cursor, Platform::Kiro, &cfg).unwrap();
        assert_eq!((c.source(), c.target()), (Platform::Cursor, Platform::Kiro));
        assert!(c.can_convert());
        assert!(converter_for(Platform::ClaudeCode, Platform::Kiro, &cfg).is_ok());
        assert!(converter_for(Platform::Kiro, Platform::ClaudeCode, &cfg).is_ok());

        let err = converter_for(Platform::Kiro, Platform::Cursor, &cfg).err().unwrap();
        assert_eq!(err.to_string(), "conversion from kiro to cursor is not supported");
    }
}
