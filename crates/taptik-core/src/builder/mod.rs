//! Builder strategies: read one IDE's on-disk configuration and wrap it into
//! the neutral [`TaptikContext`].
//!
//! ```text
//! project dir ──detect──▶ extract ──▶ validate ──▶ normalize ──▶ TaptikContext
//!                                                                   │
//!                          <Platform>Config ◀──────── convert ◀──────┘
//! ```
//!
//! Each platform has a native config type implementing [`PlatformConfig`]; it
//! travels under `ide.data.<platform>` and is flattened to feature-level data
//! (`specs`, `instructions`, `rules`, ...) for the mapping engine.

pub mod claude_code;
pub mod cursor;
pub mod kiro;

pub use claude_code::{ClaudeCodeBuilder, ClaudeCodeConfig};
pub use cursor::{CursorBuilder, CursorConfig};
pub use kiro::{KiroBuilder, KiroConfig};

use crate::context::{TaptikContext, CONTEXT_VERSION};
use crate::error::{Result, TaptikError};
use crate::io::FileSystem;
use crate::records::McpServer;
use crate::types::{Category, Platform};
use regex::{Captures, Regex};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// PlatformConfig
// ---------------------------------------------------------------------------

/// A platform-native configuration object.
pub trait PlatformConfig: Serialize + DeserializeOwned + Default {
    const PLATFORM: Platform;

    /// Flatten into the feature-level object the mapping table addresses.
    fn to_features(&self) -> Value;

    /// Assemble from feature-level data, tolerating partial or oddly shaped
    /// features. Anything unusable is dropped.
    fn from_features(features: &Map<String, Value>) -> Self;

    /// Cross-cutting subsets mirrored into the non-IDE categories.
    fn category_data(&self) -> Vec<(Category, Value)>;
}

/// Store `config` under `ide.data.<platform>` and its subsets under their categories.
pub fn embed_config<C: PlatformConfig>(ctx: &mut TaptikContext, config: &C) -> Result<()> {
    for (category, value) in config.category_data() {
        ctx.set_platform_data(category, C::PLATFORM, value);
    }
    ctx.set_platform_data(Category::Ide, C::PLATFORM, serde_json::to_value(config)?);
    Ok(())
}

/// Feature-level view of a native config stored in a context.
pub fn platform_features(platform: Platform, native: &Value) -> Result<Value> {
    fn features<C: PlatformConfig>(native: &Value) -> Result<Value> {
        let config: C = serde_json::from_value(native.clone())?;
        Ok(config.to_features())
    }
    match platform {
        Platform::Kiro => features::<KiroConfig>(native),
        Platform::ClaudeCode => features::<ClaudeCodeConfig>(native),
        Platform::Cursor => features::<CursorConfig>(native),
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn from_findings(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// A feature carried over with reduced fidelity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Approximation {
    pub feature: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unsupported_features: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub approximations: Vec<Approximation>,
}

impl<T> ConversionResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            warnings: Vec::new(),
            unsupported_features: Vec::new(),
            approximations: Vec::new(),
        }
    }

    pub fn failed(error: impl fmt::Display) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            warnings: Vec::new(),
            unsupported_features: Vec::new(),
            approximations: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// BuilderStrategy
// ---------------------------------------------------------------------------

pub trait BuilderStrategy {
    type Config: PlatformConfig;

    fn platform(&self) -> Platform {
        Self::Config::PLATFORM
    }

    /// Version stamped on contexts produced by [`normalize`](Self::normalize).
    fn context_version(&self) -> &str {
        CONTEXT_VERSION
    }

    /// Sniff the platform's structural markers under `root`.
    fn detect(&self, root: &Path) -> bool;

    /// Read every recognised file. Missing optional directories yield empty
    /// collections, not errors.
    fn extract(&self, root: &Path) -> Result<Self::Config>;

    fn validate(&self, config: &Self::Config) -> ValidationResult;

    fn normalize(&self, config: &Self::Config) -> Result<TaptikContext> {
        let mut ctx = TaptikContext::new(self.context_version(), self.platform());
        embed_config(&mut ctx, config)?;
        Ok(ctx)
    }

    /// detect, extract, validate (errors are fatal), normalize.
    fn build(&self, root: &Path) -> Result<TaptikContext> {
        let platform = self.platform();
        if !self.detect(root) {
            return Err(TaptikError::NotDetected {
                platform,
                path: root.display().to_string(),
            });
        }
        let config = self.extract(root)?;
        let report = self.validate(&config);
        for warning in &report.warnings {
            tracing::warn!(%platform, "{warning}");
        }
        if !report.valid {
            return Err(TaptikError::Validation(report.errors));
        }
        let mut ctx = self.normalize(&config)?;
        ctx.metadata.source_path = Some(root.display().to_string());
        tracing::debug!(%platform, root = %root.display(), "context built");
        Ok(ctx)
    }

    /// Recover the native config from `ide.data.<platform>`.
    fn convert(&self, context: &TaptikContext) -> ConversionResult<Self::Config> {
        let platform = self.platform();
        let Some(native) = context.ide_config(platform) else {
            return ConversionResult::failed(TaptikError::MissingPlatformConfig(platform));
        };
        match serde_json::from_value(native.clone()) {
            Ok(config) => ConversionResult::ok(config),
            Err(e) => ConversionResult::failed(e),
        }
    }
}

/// Platforms whose markers are present under `root`.
pub fn detect_platforms(root: &Path) -> Vec<Platform> {
    Platform::all()
        .iter()
        .copied()
        .filter(|p| match p {
            Platform::Kiro => KiroBuilder::new().detect(root),
            Platform::ClaudeCode => ClaudeCodeBuilder::new().detect(root),
            Platform::Cursor => CursorBuilder::new().detect(root),
        })
        .collect()
}

/// Build a context for `platform` from the project at `root`.
pub fn build_context(platform: Platform, root: &Path, version: &str) -> Result<TaptikContext> {
    match platform {
        Platform::Kiro => KiroBuilder::new().with_context_version(version).build(root),
        Platform::ClaudeCode => ClaudeCodeBuilder::new()
            .with_context_version(version)
            .build(root),
        Platform::Cursor => CursorBuilder::new().with_context_version(version).build(root),
    }
}

// ---------------------------------------------------------------------------
// Shared extraction helpers
// ---------------------------------------------------------------------------

pub(crate) fn read_optional_json<F: FileSystem>(fs: &F, path: &Path) -> Result<Option<Value>> {
    if !fs.exists(path) {
        return Ok(None);
    }
    fs.read_json(path).map(Some)
}

/// Read a text file, trim it and resolve its file references.
pub(crate) fn read_text<F: FileSystem>(fs: &F, root: &Path, path: &Path) -> Result<String> {
    let raw = fs.read_file(path)?;
    Ok(resolve_file_refs(fs, root, raw.trim()).trim().to_string())
}

/// Structural errors shared by every platform's MCP list.
pub(crate) fn mcp_errors(servers: &[McpServer]) -> Vec<String> {
    servers
        .iter()
        .filter(|s| s.command.is_none() && s.url.is_none())
        .map(|s| format!("MCP server '{}' has neither a command nor a url", s.name))
        .collect()
}

static FILE_REF_RE: OnceLock<Regex> = OnceLock::new();

/// Substitute `{{file:relative/path}}` references with the trimmed contents
/// of the file, resolved against `root`. Substituted text is resolved again.
///
/// A reference that is missing on disk, points outside `root`, or would
/// re-enter a file already being expanded is left literal and logged.
pub fn resolve_file_refs<F: FileSystem>(fs: &F, root: &Path, text: &str) -> String {
    let mut chain = Vec::new();
    expand_refs(fs, root, text, &mut chain)
}

/// `reference` as a path inside the project, or `None` if it is absolute or
/// climbs out with `..`.
fn project_relative(reference: &str) -> Option<&Path> {
    let path = Path::new(reference);
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        .then_some(path)
}

fn expand_refs<F: FileSystem>(fs: &F, root: &Path, text: &str, chain: &mut Vec<PathBuf>) -> String {
    let re = FILE_REF_RE.get_or_init(|| Regex::new(r"\{\{file:([^}]+)\}\}").unwrap());
    if !re.is_match(text) {
        return text.to_string();
    }
    re.replace_all(text, |caps: &Captures| {
        let literal = caps[0].to_string();
        let Some(rel) = project_relative(caps[1].trim()) else {
            tracing::warn!(reference = caps[1].trim(), "file reference outside the project left unresolved");
            return literal;
        };
        let path = root.join(rel);
        if chain.contains(&path) {
            tracing::warn!(path = %path.display(), "circular file reference left unresolved");
            return literal;
        }
        match fs.read_file(&path) {
            Ok(content) => {
                chain.push(path);
                let expanded = expand_refs(fs, root, content.trim(), chain);
                chain.pop();
                expanded
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "file reference not resolved");
                literal
            }
        }
    })
    .into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
