use crate::builder::{
    mcp_errors, read_optional_json, read_text, resolve_file_refs, BuilderStrategy, PlatformConfig,
    ValidationResult,
};
use crate::context::CONTEXT_VERSION;
use crate::error::Result;
use crate::io::{strip_frontmatter, FileSystem, LocalFs};
use crate::paths::{markdown_stem, CURSOR_DIR, CURSOR_MCP_FILE, CURSOR_RULES_DIR, CURSOR_RULES_FILE, VSCODE_SETTINGS_FILE};
use crate::records::{parse_mcp_document, McpServer};
use crate::types::{Category, Platform};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CursorConfig {
    /// `.cursorrules` followed by every `.cursor/rules` file as a `## <stem>` section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mcp_servers: Vec<McpServer>,
    /// `.vscode/settings.json`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
}

impl PlatformConfig for CursorConfig {
    const PLATFORM: Platform = Platform::Cursor;

    fn to_features(&self) -> Value {
        let mut f = Map::new();
        if let Some(rules) = &self.rules {
            f.insert("rules".into(), Value::String(rules.clone()));
        }
        if !self.mcp_servers.is_empty() {
            f.insert("mcp_servers".into(), json!(self.mcp_servers));
        }
        if let Some(settings) = &self.settings {
            f.insert("settings".into(), settings.clone());
        }
        Value::Object(f)
    }

    fn from_features(features: &Map<String, Value>) -> Self {
        Self {
            rules: features
                .get("rules")
                .and_then(Value::as_str)
                .map(str::to_string),
            mcp_servers: features
                .get("mcp_servers")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|v| serde_json::from_value(v.clone()).ok())
                        .collect()
                })
                .unwrap_or_default(),
            settings: features.get("settings").cloned(),
        }
    }

    fn category_data(&self) -> Vec<(Category, Value)> {
        let mut out = Vec::new();
        if let Some(rules) = &self.rules {
            out.push((Category::Project, json!({ "rules": rules })));
        }
        if !self.mcp_servers.is_empty() {
            out.push((Category::Tools, json!({ "mcp_servers": self.mcp_servers })));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// CursorBuilder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CursorBuilder<F = LocalFs> {
    fs: F,
    version: String,
}

impl CursorBuilder {
    pub fn new() -> Self {
        Self::with_fs(LocalFs)
    }
}

impl Default for CursorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FileSystem> CursorBuilder<F> {
    pub fn with_fs(fs: F) -> Self {
        Self {
            fs,
            version: CONTEXT_VERSION.to_string(),
        }
    }

    pub fn with_context_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    fn read_rules(&self, root: &Path) -> Result<Option<String>> {
        let mut parts = Vec::new();

        let legacy = root.join(CURSOR_RULES_FILE);
        if self.fs.exists(&legacy) {
            let text = read_text(&self.fs, root, &legacy)?;
            if !text.is_empty() {
                parts.push(text);
            }
        }

        let dir = root.join(CURSOR_RULES_DIR);
        if self.fs.is_directory(&dir) {
            for file in self.fs.read_directory(&dir)? {
                let Some(stem) = markdown_stem(&file) else {
                    continue;
                };
                let raw = self.fs.read_file(&dir.join(&file))?;
                // globs / alwaysApply have no counterpart elsewhere, and
                // unquoted globs are not valid YAML anyway
                let body = resolve_file_refs(&self.fs, root, strip_frontmatter(&raw).trim());
                if !body.trim().is_empty() {
                    parts.push(format!("## {stem}\n\n{}", body.trim()));
                }
            }
        }

        Ok(Some(parts.join("\n\n")).filter(|r| !r.is_empty()))
    }
}

impl<F: FileSystem> BuilderStrategy for CursorBuilder<F> {
    type Config = CursorConfig;

    fn context_version(&self) -> &str {
        &self.version
    }

    fn detect(&self, root: &Path) -> bool {
        self.fs.exists(&root.join(CURSOR_RULES_FILE)) || self.fs.is_directory(&root.join(CURSOR_DIR))
    }

    fn extract(&self, root: &Path) -> Result<CursorConfig> {
        let mcp_servers = read_optional_json(&self.fs, &root.join(CURSOR_MCP_FILE))?
            .map(|doc| parse_mcp_document(&doc))
            .unwrap_or_default();
        Ok(CursorConfig {
            rules: self.read_rules(root)?,
            mcp_servers,
            settings: read_optional_json(&self.fs, &root.join(VSCODE_SETTINGS_FILE))?,
        })
    }

    fn validate(&self, config: &CursorConfig) -> ValidationResult {
        let mut warnings = Vec::new();
        if config.rules.is_none() {
            warnings.push("no Cursor rules found".to_string());
        }
        ValidationResult::from_findings(mcp_errors(&config.mcp_servers), warnings)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
