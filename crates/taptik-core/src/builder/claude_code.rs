use crate::builder::{
    mcp_errors, read_optional_json, read_text, resolve_file_refs, BuilderStrategy, PlatformConfig,
    ValidationResult,
};
use crate::context::CONTEXT_VERSION;
use crate::error::Result;
use crate::io::{split_frontmatter, FileSystem, LocalFs};
use crate::paths::{
    CLAUDE_COMMANDS_DIR, CLAUDE_DIR, CLAUDE_LOCAL_MD, CLAUDE_MCP_FILE, CLAUDE_MD,
    CLAUDE_SETTINGS_FILE,
};
use crate::records::{parse_mcp_document, ClaudeCommand, McpServer};
use crate::types::{Category, Platform};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaudeCodeConfig {
    /// `CLAUDE.md`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// `CLAUDE.local.md`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
    #[serde(default)]
    pub commands: Vec<ClaudeCommand>,
    #[serde(default)]
    pub mcp_servers: Vec<McpServer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Value>,
}

/// Frontmatter of a `.claude/commands/*.md` file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CommandFrontmatter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

fn commands_from_feature(value: &Value) -> Vec<ClaudeCommand> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("commands") {
            Some(Value::Array(items)) => items,
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    items
        .iter()
        .filter_map(|v| serde_json::from_value(v.clone()).ok())
        .collect()
}

impl PlatformConfig for ClaudeCodeConfig {
    const PLATFORM: Platform = Platform::ClaudeCode;

    fn to_features(&self) -> Value {
        let mut f = Map::new();
        if let Some(text) = &self.instructions {
            f.insert("instructions".into(), Value::String(text.clone()));
        }
        if let Some(text) = &self.custom_instructions {
            f.insert("custom_instructions".into(), Value::String(text.clone()));
        }
        if !self.commands.is_empty() {
            f.insert("commands".into(), json!({ "commands": self.commands }));
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
        let text = |key: &str| features.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            instructions: text("instructions"),
            custom_instructions: text("custom_instructions"),
            commands: features
                .get("commands")
                .map(commands_from_feature)
                .unwrap_or_default(),
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
        if self.instructions.is_some() || self.custom_instructions.is_some() {
            out.push((
                Category::Project,
                json!({
                    "instructions": self.instructions,
                    "custom_instructions": self.custom_instructions,
                }),
            ));
        }
        if !self.commands.is_empty() {
            out.push((Category::Prompts, json!({ "commands": self.commands })));
        }
        if !self.mcp_servers.is_empty() {
            out.push((Category::Tools, json!({ "mcp_servers": self.mcp_servers })));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// ClaudeCodeBuilder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ClaudeCodeBuilder<F = LocalFs> {
    fs: F,
    version: String,
}

impl ClaudeCodeBuilder {
    pub fn new() -> Self {
        Self::with_fs(LocalFs)
    }
}

impl Default for ClaudeCodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: FileSystem> ClaudeCodeBuilder<F> {
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

    fn read_optional_text(&self, root: &Path, rel: &str) -> Result<Option<String>> {
        let path = root.join(rel);
        if !self.fs.exists(&path) {
            return Ok(None);
        }
        let text = read_text(&self.fs, root, &path)?;
        Ok(Some(text).filter(|t| !t.is_empty()))
    }

    fn read_commands(&self, root: &Path) -> Result<Vec<ClaudeCommand>> {
        let dir = root.join(CLAUDE_COMMANDS_DIR);
        if !self.fs.is_directory(&dir) {
            return Ok(Vec::new());
        }
        let mut commands = Vec::new();
        for file in self.fs.read_directory(&dir)? {
            let Some(name) = file.strip_suffix(".md") else {
                continue;
            };
            let raw = self.fs.read_file(&dir.join(&file))?;
            let (meta, body) = split_frontmatter::<CommandFrontmatter>(&raw);
            let meta = meta.unwrap_or_default();
            commands.push(ClaudeCommand {
                name: name.to_string(),
                command: resolve_file_refs(&self.fs, root, body.trim()),
                trigger: meta.trigger,
                description: meta.description,
            });
        }
        Ok(commands)
    }
}

impl<F: FileSystem> BuilderStrategy for ClaudeCodeBuilder<F> {
    type Config = ClaudeCodeConfig;

    fn context_version(&self) -> &str {
        &self.version
    }

    fn detect(&self, root: &Path) -> bool {
        self.fs.exists(&root.join(CLAUDE_MD)) || self.fs.is_directory(&root.join(CLAUDE_DIR))
    }

    fn extract(&self, root: &Path) -> Result<ClaudeCodeConfig> {
        let mcp_servers = read_optional_json(&self.fs, &root.join(CLAUDE_MCP_FILE))?
            .map(|doc| parse_mcp_document(&doc))
            .unwrap_or_default();
        Ok(ClaudeCodeConfig {
            instructions: self.read_optional_text(root, CLAUDE_MD)?,
            custom_instructions: self.read_optional_text(root, CLAUDE_LOCAL_MD)?,
            commands: self.read_commands(root)?,
            mcp_servers,
            settings: read_optional_json(&self.fs, &root.join(CLAUDE_SETTINGS_FILE))?,
        })
    }

    fn validate(&self, config: &ClaudeCodeConfig) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if config.instructions.is_none() {
            warnings.push(format!("no {CLAUDE_MD} found"));
        }
        for cmd in config.commands.iter().filter(|c| c.command.trim().is_empty()) {
            errors.push(format!("command '{}' has no content", cmd.name));
        }
        errors.extend(mcp_errors(&config.mcp_servers));

        ValidationResult::from_findings(errors, warnings)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaptikError;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "CLAUDE.md", "# Project\n\n## Auth\n### Tasks\nLogin\n");
        write(dir.path(), "CLAUDE.local.md", "Prefer small PRs.\n");
        write(
            dir.path(),
            ".claude/commands/review.md",
            "---\ndescription: Review the diff\ntrigger: pre-push\n---\nReview {{file:docs/checklist.md}}\n",
        );
        write(dir.path(), ".claude/commands/notes.txt", "ignored");
        write(dir.path(), "docs/checklist.md", "the checklist\n");
        write(
            dir.path(),
            ".mcp.json",
            r#"{"mcpServers": {"github": {"command": "gh-mcp", "env": {"TOKEN": "x"}}}}"#,
        );
        write(dir.path(), ".claude/settings.json", r#"{"model": "default"}"#);
        dir
    }

    #[test]
    fn detects_claude_md_or_dir() {
        let dir = TempDir::new().unwrap();
        let builder = ClaudeCodeBuilder::new();
        assert!(!builder.detect(dir.path()));
        std::fs::create_dir_all(dir.path().join(".claude")).unwrap();
        assert!(builder.detect(dir.path()));
    }

    #[test]
    fn extracts_full_layout() {
        let dir = fixture();
        let config = ClaudeCodeBuilder::new().extract(dir.path()).unwrap();
        assert!(config.instructions.as_deref().unwrap().starts_with("# Project"));
        assert_eq!(config.custom_instructions.as_deref(), Some("Prefer small PRs."));
        assert_eq!(config.commands.len(), 1);
        let review = &config.commands[0];
        assert_eq!(review.name, "review");
        assert_eq!(review.command, "Review the checklist");
        assert_eq!(review.trigger.as_deref(), Some("pre-push"));
        assert_eq!(review.description.as_deref(), Some("Review the diff"));
        assert_eq!(config.mcp_servers[0].config["env"]["TOKEN"], "x");
        assert_eq!(config.settings, Some(json!({"model": "default"})));
    }

    #[test]
    fn empty_command_fails_build() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), ".claude/commands/blank.md", "---\ndescription: x\n---\n\n");
        let err = ClaudeCodeBuilder::new().build(dir.path()).unwrap_err();
        assert!(matches!(err, TaptikError::Validation(ref e) if e == &vec!["command 'blank' has no content".to_string()]));
    }

    #[test]
    fn features_wrap_commands_in_listing() {
        let dir = fixture();
        let config = ClaudeCodeBuilder::new().extract(dir.path()).unwrap();
        let features = config.to_features();
        assert_eq!(features["commands"]["commands"][0]["name"], "review");
        assert_eq!(features["commands"]["commands"][0]["trigger"], "pre-push");

        let back = ClaudeCodeConfig::from_features(features.as_object().unwrap());
        assert_eq!(back, config);
    }

    #[test]
    fn normalize_spreads_categories() {
        let dir = fixture();
        let ctx = ClaudeCodeBuilder::new().build(dir.path()).unwrap();
        assert!(ctx.platform_data(Category::Project, Platform::ClaudeCode).is_some());
        assert_eq!(
            ctx.platform_data(Category::Prompts, Platform::ClaudeCode).unwrap()["commands"][0]["name"],
            "review"
        );
        assert!(ctx.ide_config(Platform::ClaudeCode).is_some());
    }
}
