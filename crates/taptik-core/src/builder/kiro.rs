use crate::builder::{
    mcp_errors, read_optional_json, read_text, resolve_file_refs, BuilderStrategy, PlatformConfig,
    ValidationResult,
};
use crate::context::CONTEXT_VERSION;
use crate::error::Result;
use crate::io::{split_frontmatter, FileSystem, LocalFs};
use crate::parser::{hooks_from_commands, named_sections, parse_steering};
use crate::paths::{
    markdown_stem, KIRO_DIR, KIRO_HOOKS_DIR, KIRO_MCP_FILE, KIRO_PROJECT_FILE, KIRO_SPECS_DIR,
    KIRO_STEERING_DIR, SPEC_DESIGN_MD, SPEC_REQUIREMENTS_MD, SPEC_TASKS_MD,
};
use crate::records::{parse_mcp_document, sort_enabled_first, Hook, McpServer, Spec, SteeringRule};
use crate::types::{Category, Platform};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::path::Path;

// ---------------------------------------------------------------------------
// KiroConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KiroConfig {
    #[serde(default)]
    pub specs: Vec<Spec>,
    #[serde(default)]
    pub steering: Vec<SteeringRule>,
    #[serde(default)]
    pub hooks: Vec<Hook>,
    #[serde(default)]
    pub mcp_servers: Vec<McpServer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_settings: Option<Value>,
}

/// Frontmatter of a `.kiro/steering/*.md` document.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SteeringFrontmatter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
}

/// Steering arrives as `{name, content}` records or as one markdown document.
fn steering_from_feature(value: &Value) -> Vec<SteeringRule> {
    let sections: Vec<(String, String)> = match value {
        Value::String(text) => parse_steering(text)
            .into_iter()
            .map(|s| (s.name, s.content))
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|v| {
                let name = v.get("name")?.as_str()?;
                let content = v.get("content")?.as_str()?;
                Some((name.to_string(), content.to_string()))
            })
            .collect(),
        _ => Vec::new(),
    };
    sections
        .into_iter()
        .enumerate()
        .map(|(i, (name, content))| SteeringRule::from_content(name, &content, i as u32))
        .collect()
}

impl PlatformConfig for KiroConfig {
    const PLATFORM: Platform = Platform::Kiro;

    fn to_features(&self) -> Value {
        let mut f = Map::new();
        if !self.specs.is_empty() {
            f.insert(
                "specs".into(),
                Value::Array(self.specs.iter().map(Spec::to_feature).collect()),
            );
        }
        if !self.steering.is_empty() {
            f.insert(
                "steering".into(),
                Value::Array(self.steering.iter().map(SteeringRule::to_feature).collect()),
            );
        }
        if !self.hooks.is_empty() {
            f.insert(
                "hooks".into(),
                Value::Array(self.hooks.iter().map(Hook::to_feature).collect()),
            );
        }
        if !self.mcp_servers.is_empty() {
            f.insert("mcp_servers".into(), json!(self.mcp_servers));
        }
        if let Some(settings) = &self.project_settings {
            f.insert("project_settings".into(), settings.clone());
        }
        Value::Object(f)
    }

    fn from_features(features: &Map<String, Value>) -> Self {
        let specs = features
            .get("specs")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Spec::from_feature).collect())
            .unwrap_or_default();
        let steering = features
            .get("steering")
            .map(steering_from_feature)
            .unwrap_or_default();
        let hooks = match features.get("hooks") {
            Some(Value::Array(items)) => items.iter().filter_map(Hook::from_feature).collect(),
            // A command listing that never went through a transform.
            Some(listing @ Value::Object(_)) => hooks_from_commands(listing)
                .iter()
                .filter_map(Hook::from_feature)
                .collect(),
            _ => Vec::new(),
        };
        let mcp_servers = features
            .get("mcp_servers")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Self {
            specs,
            steering,
            hooks,
            mcp_servers,
            project_settings: features.get("project_settings").cloned(),
        }
    }

    fn category_data(&self) -> Vec<(Category, Value)> {
        let mut out = Vec::new();
        if !self.specs.is_empty() || !self.steering.is_empty() {
            out.push((
                Category::Project,
                json!({ "specs": self.specs, "steering": self.steering }),
            ));
        }
        if !self.hooks.is_empty() || !self.mcp_servers.is_empty() {
            out.push((
                Category::Tools,
                json!({ "hooks": self.hooks, "mcp_servers": self.mcp_servers }),
            ));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// KiroBuilder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct KiroBuilder<F = LocalFs> {
    fs: F,
    version: String,
}

impl KiroBuilder {
    pub fn new() -> Self {
        Self::with_fs(LocalFs)
    }
}

impl Default for KiroBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn is_spec_file(name: &str) -> bool {
    matches!(name, SPEC_REQUIREMENTS_MD | SPEC_DESIGN_MD | SPEC_TASKS_MD)
}

fn spec_field<'s>(spec: &'s mut Spec, file: &str) -> Option<&'s mut Option<String>> {
    match file {
        SPEC_REQUIREMENTS_MD => Some(&mut spec.requirements),
        SPEC_DESIGN_MD => Some(&mut spec.design),
        SPEC_TASKS_MD => Some(&mut spec.tasks),
        _ => None,
    }
}

impl<F: FileSystem> KiroBuilder<F> {
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

    /// Specs come either as `specs/<name>/{requirements,design,tasks}.md`
    /// directories or as aggregated `specs/<kind>.md` files split on `## <name>`.
    fn read_specs(&self, root: &Path) -> Result<Vec<Spec>> {
        let dir = root.join(KIRO_SPECS_DIR);
        if !self.fs.is_directory(&dir) {
            return Ok(Vec::new());
        }
        let mut specs: Vec<Spec> = Vec::new();
        for entry in self.fs.read_directory(&dir)? {
            let path = dir.join(&entry);
            if self.fs.is_directory(&path) {
                let spec = self.read_spec_dir(root, &entry, &path)?;
                if spec.has_content() || !spec.resources.is_empty() {
                    specs.push(spec);
                }
                continue;
            }
            if !is_spec_file(&entry) {
                continue;
            }
            let text = read_text(&self.fs, root, &path)?;
            for (name, body) in named_sections(&text) {
                if body.is_empty() {
                    continue;
                }
                let idx = match specs.iter().position(|s| s.name == name) {
                    Some(i) => i,
                    None => {
                        specs.push(Spec::new(name));
                        specs.len() - 1
                    }
                };
                if let Some(slot) = spec_field(&mut specs[idx], &entry) {
                    *slot = Some(body);
                }
            }
        }
        Ok(specs)
    }

    fn read_spec_dir(&self, root: &Path, name: &str, dir: &Path) -> Result<Spec> {
        let mut spec = Spec::new(name);
        for file in self.fs.read_directory(dir)? {
            if !file.ends_with(".md") {
                continue;
            }
            let text = read_text(&self.fs, root, &dir.join(&file))?;
            if text.is_empty() {
                continue;
            }
            match spec_field(&mut spec, &file) {
                Some(slot) => *slot = Some(text),
                None => {
                    spec.resources.insert(file, text);
                }
            }
        }
        Ok(spec)
    }

    fn read_steering(&self, root: &Path) -> Result<Vec<SteeringRule>> {
        let dir = root.join(KIRO_STEERING_DIR);
        if !self.fs.is_directory(&dir) {
            return Ok(Vec::new());
        }
        let mut rules = Vec::new();
        let files = self.fs.read_directory(&dir)?;
        for (i, file) in files.iter().filter(|f| f.ends_with(".md")).enumerate() {
            let Some(stem) = markdown_stem(file) else {
                continue;
            };
            let raw = self.fs.read_file(&dir.join(file))?;
            let (meta, body) = split_frontmatter::<SteeringFrontmatter>(&raw);
            let meta = meta.unwrap_or_default();
            let body = resolve_file_refs(&self.fs, root, body.trim());
            let mut rule = SteeringRule::from_content(stem, &body, meta.priority.unwrap_or(i as u32));
            rule.description = meta.description;
            rules.push(rule);
        }
        rules.sort_by_key(|r| r.priority);
        Ok(rules)
    }

    /// Hook files hold one hook object or `{"hooks": [...]}`. Unparseable
    /// files are skipped with a warning.
    fn read_hooks(&self, root: &Path) -> Result<Vec<Hook>> {
        let dir = root.join(KIRO_HOOKS_DIR);
        if !self.fs.is_directory(&dir) {
            return Ok(Vec::new());
        }
        let mut hooks = Vec::new();
        for file in self.fs.read_directory(&dir)? {
            if !(file.ends_with(".json") || file.ends_with(".kiro.hook")) {
                continue;
            }
            let raw = self.fs.read_file(&dir.join(&file))?;
            let doc: Value = match serde_json::from_str(&raw) {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(%file, error = %e, "skipping unreadable hook file");
                    continue;
                }
            };
            let entries = match doc.get("hooks") {
                Some(Value::Array(items)) => items.clone(),
                _ => vec![doc],
            };
            for entry in entries {
                match serde_json::from_value::<Hook>(entry) {
                    Ok(mut hook) => {
                        hook.then.command =
                            resolve_file_refs(&self.fs, root, &hook.then.command);
                        hooks.push(hook);
                    }
                    Err(e) => tracing::warn!(%file, error = %e, "skipping malformed hook"),
                }
            }
        }
        sort_enabled_first(&mut hooks, |h| (h.enabled, h.name.as_str()));
        Ok(hooks)
    }
}

impl<F: FileSystem> BuilderStrategy for KiroBuilder<F> {
    type Config = KiroConfig;

    fn context_version(&self) -> &str {
        &self.version
    }

    fn detect(&self, root: &Path) -> bool {
        self.fs.is_directory(&root.join(KIRO_DIR))
            && (self.fs.is_directory(&root.join(KIRO_SPECS_DIR))
                || self.fs.is_directory(&root.join(KIRO_STEERING_DIR)))
    }

    fn extract(&self, root: &Path) -> Result<KiroConfig> {
        let mcp_servers = read_optional_json(&self.fs, &root.join(KIRO_MCP_FILE))?
            .map(|doc| parse_mcp_document(&doc))
            .unwrap_or_default();
        Ok(KiroConfig {
            specs: self.read_specs(root)?,
            steering: self.read_steering(root)?,
            hooks: self.read_hooks(root)?,
            mcp_servers,
            project_settings: read_optional_json(&self.fs, &root.join(KIRO_PROJECT_FILE))?,
        })
    }

    fn validate(&self, config: &KiroConfig) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if config.specs.is_empty() {
            warnings.push(format!("no specs found under {KIRO_SPECS_DIR}"));
        }
        if config.steering.is_empty() {
            warnings.push(format!("no steering documents found under {KIRO_STEERING_DIR}"));
        }
        for spec in config.specs.iter().filter(|s| !s.has_content()) {
            warnings.push(format!(
                "spec '{}' has no requirements, design or tasks",
                spec.name
            ));
        }
        for (i, hook) in config.hooks.iter().enumerate() {
            let label = if hook.name.trim().is_empty() {
                errors.push(format!("hook #{} is missing a name", i + 1));
                format!("#{}", i + 1)
            } else {
                format!("'{}'", hook.name)
            };
            if hook.version.trim().is_empty() {
                errors.push(format!("hook {label} is missing a version"));
            }
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
    use crate::records::MANUAL_TRIGGER;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn detect_needs_specs_or_steering() {
        let dir = TempDir::new().unwrap();
        let builder = KiroBuilder::new();
        std::fs::create_dir_all(dir.path().join(".kiro/settings")).unwrap();
        assert!(!builder.detect(dir.path()));
        std::fs::create_dir_all(dir.path().join(".kiro/steering")).unwrap();
        assert!(builder.detect(dir.path()));
    }

    #[test]
    fn extracts_spec_directories_with_resources_and_refs() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "docs/api.md", "GET /users\n");
        write(dir.path(), ".kiro/specs/auth/requirements.md", "Users log in.\n");
        write(dir.path(), ".kiro/specs/auth/design.md", "See {{file:docs/api.md}}");
        write(dir.path(), ".kiro/specs/auth/notes.md", "Rate limits TBD");
        write(dir.path(), ".kiro/specs/empty/readme.txt", "ignored");

        let config = KiroBuilder::new().extract(dir.path()).unwrap();
        assert_eq!(config.specs.len(), 1);
        let spec = &config.specs[0];
        assert_eq!(spec.name, "auth");
        assert_eq!(spec.requirements.as_deref(), Some("Users log in."));
        assert_eq!(spec.design.as_deref(), Some("See GET /users"));
        assert!(spec.tasks.is_none());
        assert_eq!(spec.resources["notes.md"], "Rate limits TBD");
    }

    #[test]
    fn extracts_aggregated_spec_files() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            ".kiro/specs/requirements.md",
            "# Requirements\n\n## Auth\n\nLogin\n\n## Search\n\nQuery\n",
        );
        write(dir.path(), ".kiro/specs/tasks.md", "# Tasks\n\n## Auth\n\n- build form\n");

        let config = KiroBuilder::new().extract(dir.path()).unwrap();
        let names: Vec<_> = config.specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Auth", "Search"]);
        assert_eq!(config.specs[0].requirements.as_deref(), Some("Login"));
        assert_eq!(config.specs[0].tasks.as_deref(), Some("- build form"));
        assert!(config.specs[1].tasks.is_none());
    }

    #[test]
    fn steering_reads_frontmatter_and_orders_by_priority() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            ".kiro/steering/a-style.md",
            "---\ndescription: House style\npriority: 5\n---\nUse rustfmt.\n\nNo unwrap.\n",
        );
        write(dir.path(), ".kiro/steering/b-tech.md", "Rust 2021\n");

        let config = KiroBuilder::new().extract(dir.path()).unwrap();
        let names: Vec<_> = config.steering.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["b-tech", "a-style"]);
        let style = &config.steering[1];
        assert_eq!(style.description.as_deref(), Some("House style"));
        assert_eq!(style.rules, vec!["Use rustfmt.", "No unwrap."]);
    }

    #[test]
    fn hooks_from_both_file_kinds_sorted_enabled_first() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "scripts/lint.sh", "cargo clippy");
        write(
            dir.path(),
            ".kiro/hooks/hooks.json",
            r#"{"hooks": [
                {"name": "zeta", "version": "1", "then": {"type": "command", "command": "z"}},
                {"name": "Alpha", "version": "1", "enabled": false, "then": {"command": "a"}}
            ]}"#,
        );
        write(
            dir.path(),
            ".kiro/hooks/lint.kiro.hook",
            r#"{"name": "lint", "version": "1",
                "when": {"type": "fileEdited", "patterns": ["src/**/*.rs"]},
                "then": {"type": "askAgent", "prompt": "{{file:scripts/lint.sh}}"}}"#,
        );
        write(dir.path(), ".kiro/hooks/broken.json", "{not json");
        std::fs::create_dir_all(dir.path().join(".kiro/steering")).unwrap();

        let config = KiroBuilder::new().extract(dir.path()).unwrap();
        let names: Vec<_> = config.hooks.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["lint", "zeta", "Alpha"]);
        assert_eq!(config.hooks[0].then.command, "cargo clippy");
        assert_eq!(config.hooks[0].when.kind, "fileEdited");
    }

    #[test]
    fn mcp_and_project_settings() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            ".kiro/settings/mcp.json",
            r#"{"mcpServers": {"fs": {"command": "fs-mcp", "args": ["."]}}}"#,
        );
        write(dir.path(), ".kiro/settings/project.json", r#"{"language": "rust"}"#);
        let config = KiroBuilder::new().extract(dir.path()).unwrap();
        assert_eq!(config.mcp_servers[0].name, "fs");
        assert_eq!(config.mcp_servers[0].args, vec!["."]);
        assert_eq!(config.project_settings, Some(json!({"language": "rust"})));
    }

    #[test]
    fn missing_directories_are_warnings() {
        let builder = KiroBuilder::new();
        let report = builder.validate(&KiroConfig::default());
        assert!(report.valid);
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn hook_without_version_fails_build() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), ".kiro/steering/style.md", "Use rustfmt.");
        write(
            dir.path(),
            ".kiro/hooks/bad.kiro.hook",
            r#"{"name": "bad", "then": {"command": "x"}}"#,
        );
        let err = KiroBuilder::new().build(dir.path()).unwrap_err();
        match err {
            TaptikError::Validation(errors) => {
                assert_eq!(errors, vec!["hook 'bad' is missing a version"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn build_without_markers_is_not_detected() {
        let dir = TempDir::new().unwrap();
        let err = KiroBuilder::new().build(dir.path()).unwrap_err();
        assert!(matches!(err, TaptikError::NotDetected { platform: Platform::Kiro, .. }));
    }

    #[test]
    fn normalize_places_sections() {
        let mut config = KiroConfig::default();
        config.specs.push(Spec::new("auth"));
        config.hooks.push(Hook::from_feature(&json!({"name": "lint", "command": "x"})).unwrap());
        let ctx = KiroBuilder::new()
            .with_context_version("2.0.0")
            .normalize(&config)
            .unwrap();

        assert_eq!(ctx.version, "2.0.0");
        assert_eq!(ctx.metadata.platforms, vec![Platform::Kiro]);
        assert_eq!(ctx.platform_data(Category::Project, Platform::Kiro).unwrap()["specs"][0]["name"], "auth");
        assert_eq!(ctx.platform_data(Category::Tools, Platform::Kiro).unwrap()["hooks"][0]["name"], "lint");

        let back = KiroBuilder::new().convert(&ctx);
        assert!(back.success);
        assert_eq!(back.data.unwrap(), config);
    }

    #[test]
    fn build_sets_source_path() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), ".kiro/specs/auth/tasks.md", "- login");
        let ctx = KiroBuilder::new().build(dir.path()).unwrap();
        assert_eq!(ctx.metadata.source_path.as_deref(), Some(dir.path().to_str().unwrap()));
        assert!(ctx.is_meaningful());
    }

    #[test]
    fn from_features_accepts_text_steering_and_command_listings() {
        let features = json!({
            "steering": "## Style\n\nUse tabs.\n\n## Tests\n\nTDD",
            "hooks": {"commands": [{"name": "deploy", "command": "make deploy"}]}
        });
        let config = KiroConfig::from_features(features.as_object().unwrap());
        assert_eq!(config.steering.len(), 2);
        assert_eq!(config.steering[1].name, "Tests");
        assert_eq!(config.steering[1].priority, 1);
        assert_eq!(config.hooks[0].when.kind, MANUAL_TRIGGER);
        assert_eq!(config.hooks[0].version, "1");
    }

    #[test]
    fn features_skip_empty_sections() {
        let mut config = KiroConfig::default();
        config.steering.push(SteeringRule::from_content("style", "Use tabs.", 0));
        assert_eq!(
            config.to_features(),
            json!({"steering": [{"name": "style", "content": "Use tabs."}]})
        );
    }
}
