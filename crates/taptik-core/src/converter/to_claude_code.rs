use crate::builder::claude_code::CommandFrontmatter;
use crate::builder::{ClaudeCodeConfig, ConversionResult};
use crate::config::ConversionConfig;
use crate::context::TaptikContext;
use crate::converter::{deploy_file, deploy_json, finish, reverse_into, ConverterStrategy, DeployResult};
use crate::error::{Result, TaptikError};
use crate::io::{render_frontmatter, FileSystem, LocalFs};
use crate::mapping::ReverseMappingService;
use crate::paths::{
    claude_command_file, CLAUDE_COMMANDS_DIR, CLAUDE_DIR, CLAUDE_LOCAL_MD, CLAUDE_MCP_FILE, CLAUDE_MD,
    CLAUDE_SETTINGS_FILE,
};
use crate::records::{mcp_document, ClaudeCommand};
use crate::types::Platform;
use std::collections::BTreeSet;
use std::path::Path;

/// Converts Kiro contexts into Claude Code and deploys `CLAUDE.md`, commands
/// and MCP definitions.
pub struct ClaudeCodeConverter<F = LocalFs> {
    fs: F,
    service: ReverseMappingService<'static>,
    config: ConversionConfig,
}

impl ClaudeCodeConverter {
    pub fn new() -> Self {
        Self::with_fs(LocalFs)
    }
}

impl Default for ClaudeCodeConverter {
    fn default() -> Self {
        Self::new()
    }
}

fn render_command(cmd: &ClaudeCommand) -> Result<String> {
    if cmd.description.is_none() && cmd.trigger.is_none() {
        return Ok(format!("{}\n", cmd.command.trim_end()));
    }
    let meta = CommandFrontmatter {
        description: cmd.description.clone(),
        trigger: cmd.trigger.clone(),
    };
    render_frontmatter(&meta, &cmd.command)
}

fn with_newline(text: &str) -> String {
    format!("{}\n", text.trim_end())
}

impl<F: FileSystem> ClaudeCodeConverter<F> {
    pub fn with_fs(fs: F) -> Self {
        Self {
            fs,
            service: ReverseMappingService::builtin(),
            config: ConversionConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ConversionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_service(mut self, service: ReverseMappingService<'static>) -> Self {
        self.service = service;
        self
    }

    fn try_convert(&self, context: &TaptikContext) -> Result<ConversionResult<TaptikContext>> {
        let mut reversed =
            reverse_into::<ClaudeCodeConfig>(&self.service, &self.config, context, Platform::Kiro)?;
        if let Some(settings) = reversed.take_unmapped("project_settings") {
            reversed.config.settings.get_or_insert(settings);
        }
        finish(context, Platform::Kiro, reversed)
    }

    fn write_all(&self, config: &ClaudeCodeConfig, root: &Path, deployed: &mut Vec<String>) -> Result<()> {
        self.fs.ensure_directory(root)?;

        if let Some(text) = &config.instructions {
            deploy_file(&self.fs, root, CLAUDE_MD, &with_newline(text), deployed)?;
        }
        if let Some(text) = &config.custom_instructions {
            deploy_file(&self.fs, root, CLAUDE_LOCAL_MD, &with_newline(text), deployed)?;
        }

        if !config.commands.is_empty() {
            self.fs.ensure_directory(&root.join(CLAUDE_COMMANDS_DIR))?;
        }
        let mut used = BTreeSet::new();
        for cmd in &config.commands {
            let mut rel = claude_command_file(&cmd.name);
            let mut n = 2;
            while !used.insert(rel.clone()) {
                rel = claude_command_file(&format!("{}-{n}", cmd.name));
                n += 1;
            }
            deploy_file(&self.fs, root, &rel, &render_command(cmd)?, deployed)?;
        }

        if !config.mcp_servers.is_empty() {
            deploy_json(&self.fs, root, CLAUDE_MCP_FILE, &mcp_document(&config.mcp_servers), deployed)?;
        }
        if let Some(settings) = &config.settings {
            self.fs.ensure_directory(&root.join(CLAUDE_DIR))?;
            deploy_json(&self.fs, root, CLAUDE_SETTINGS_FILE, settings, deployed)?;
        }
        Ok(())
    }
}

impl<F: FileSystem> ConverterStrategy for ClaudeCodeConverter<F> {
    fn source(&self) -> Platform {
        Platform::Kiro
    }

    fn target(&self) -> Platform {
        Platform::ClaudeCode
    }

    fn compatibility_threshold(&self) -> u32 {
        self.config.compatibility_threshold
    }

    fn convert(&self, context: &TaptikContext) -> ConversionResult<TaptikContext> {
        self.try_convert(context).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "conversion to claude_code failed");
            ConversionResult::failed(e)
        })
    }

    fn deploy(&self, context: &TaptikContext, target_dir: &Path) -> DeployResult {
        let mut deployed = Vec::new();
        let outcome = match context.ide_config(Platform::ClaudeCode) {
            None => Err(TaptikError::MissingPlatformConfig(Platform::ClaudeCode)),
            Some(native) => serde_json::from_value::<ClaudeCodeConfig>(native.clone())
                .map_err(TaptikError::from)
                .and_then(|config| self.write_all(&config, target_dir, &mut deployed)),
        };
        DeployResult::from_outcome(outcome, deployed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuilderStrategy, ClaudeCodeBuilder, KiroBuilder};
    use crate::context::CONTEXT_VERSION;
    use crate::mapping::StrictEquivalence;
    use crate::types::Category;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn kiro_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), ".kiro/specs/auth/requirements.md", "Users log in.\n");
        write(dir.path(), ".kiro/specs/auth/tasks.md", "- [ ] login form\n");
        write(dir.path(), ".kiro/steering/code-style.md", "---\npriority: 1\n---\nUse rustfmt.\n");
        write(
            dir.path(),
            ".kiro/hooks/lint.kiro.hook",
            r#"{"name": "lint", "version": "1", "description": "Lint on save",
                "when": {"type": "fileEdited", "patterns": ["src/**"]},
                "then": {"type": "command", "command": "npm run lint"}}"#,
        );
        write(dir.path(), ".kiro/settings/mcp.json", r#"{"mcpServers": {"fs": {"command": "fs-mcp"}}}"#);
        write(dir.path(), ".kiro/settings/project.json", r#"{"theme": "dark"}"#);
        dir
    }

    fn converted() -> ConversionResult<TaptikContext> {
        let project = kiro_project();
        let ctx = KiroBuilder::new().build(project.path()).unwrap();
        ClaudeCodeConverter::new().convert(&ctx)
    }

    #[test]
    fn kiro_context_converts_to_claude_code() {
        let result = converted();
        assert!(result.success, "{:?}", result.error);
        let ctx = result.data.unwrap();
        let cc: ClaudeCodeConfig =
            serde_json::from_value(ctx.ide_config(Platform::ClaudeCode).unwrap().clone()).unwrap();

        assert_eq!(
            cc.instructions.as_deref(),
            Some("# Project Instructions\n\n## auth\n\n### Requirements\nUsers log in.\n\n### Tasks\n- [ ] login form\n")
        );
        assert_eq!(
            cc.custom_instructions.as_deref(),
            Some("# Custom Instructions\n\n## code-style\n\nUse rustfmt.\n")
        );
        assert_eq!(cc.commands.len(), 1);
        assert_eq!(cc.commands[0].trigger.as_deref(), Some("fileEdited"));
        assert_eq!(cc.commands[0].description.as_deref(), Some("Lint on save"));
        assert_eq!(cc.mcp_servers[0].command.as_deref(), Some("fs-mcp"));
        assert_eq!(cc.settings, Some(json!({"theme": "dark"})));

        let approximated: Vec<_> = result.approximations.iter().map(|a| a.feature.as_str()).collect();
        assert_eq!(approximated, vec!["hooks", "project_settings"]);
        assert!(result.unsupported_features.is_empty());
    }

    #[test]
    fn missing_kiro_config_fails() {
        let ctx = TaptikContext::new(CONTEXT_VERSION, Platform::ClaudeCode);
        let result = ClaudeCodeConverter::new().convert(&ctx);
        assert!(!result.success);
        assert!(result.data.is_none());
        assert_eq!(result.error.as_deref(), Some("no kiro configuration found in context"));
    }

    #[test]
    fn compatibility_counts_partial_hooks() {
        let mut ctx = TaptikContext::new(CONTEXT_VERSION, Platform::Kiro);
        ctx.set_platform_data(
            Category::Ide,
            Platform::Kiro,
            json!({
                "specs": [{"name": "auth", "requirements": "Login"}],
                "hooks": [{"name": "lint", "version": "1", "then": {"command": "x"}}]
            }),
        );
        let report = ClaudeCodeConverter::new().validate_compatibility(&ctx);
        assert_eq!(report.supported_features, vec!["specs"]);
        assert_eq!(report.partial_support[0].feature, "hooks");
        assert_eq!(report.score, 80);
        assert!(report.compatible);
    }

    #[test]
    fn deploy_writes_claude_layout_and_reads_back() {
        let ctx = converted().data.unwrap();
        let out = TempDir::new().unwrap();
        let result = ClaudeCodeConverter::new().deploy(&ctx, out.path());
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(
            result.deployed_files,
            vec![
                "CLAUDE.md",
                "CLAUDE.local.md",
                ".claude/commands/lint.md",
                ".mcp.json",
                ".claude/settings.json",
            ]
        );

        let command = std::fs::read_to_string(out.path().join(".claude/commands/lint.md")).unwrap();
        assert!(command.starts_with("---\n"));
        assert!(command.ends_with("---\n\nnpm run lint\n"));

        let back = ClaudeCodeBuilder::new().extract(out.path()).unwrap();
        let original: ClaudeCodeConfig =
            serde_json::from_value(ctx.ide_config(Platform::ClaudeCode).unwrap().clone()).unwrap();
        assert_eq!(back.commands, original.commands);
        assert_eq!(back.mcp_servers, original.mcp_servers);
        assert_eq!(back.settings, original.settings);
        assert_eq!(
            back.instructions.as_deref(),
            original.instructions.as_deref().map(str::trim)
        );
    }

    #[test]
    fn trimmed_spec_text_is_flagged_as_lossy() {
        // Spec entries compare by exact JSON, so the trailing newline is lost
        // under either equivalence.
        let mut ctx = TaptikContext::new(CONTEXT_VERSION, Platform::Kiro);
        ctx.set_platform_data(
            Category::Ide,
            Platform::Kiro,
            json!({"specs": [{"name": "auth", "requirements": "Users log in.\n"}]}),
        );
        let lossy = "converting back from claude_code to kiro will not reproduce the original";

        let loose = ClaudeCodeConverter::new().convert(&ctx);
        assert!(loose.success);
        assert!(loose.warnings.iter().any(|w| w == lossy));

        let strict = ClaudeCodeConverter::new()
            .with_service(ReverseMappingService::builtin().with_equivalence(StrictEquivalence))
            .convert(&ctx);
        assert!(strict.success);
        assert!(strict.warnings.iter().any(|w| w == lossy));
    }

    #[test]
    fn plain_command_has_no_frontmatter() {
        let cmd = ClaudeCommand {
            name: "deploy".into(),
            command: "make deploy\n\n".into(),
            trigger: None,
            description: None,
        };
        assert_eq!(render_command(&cmd).unwrap(), "make deploy\n");
    }

    #[test]
    fn duplicate_command_names_get_distinct_files() {
        let mut ctx = TaptikContext::new(CONTEXT_VERSION, Platform::Kiro);
        ctx.set_platform_data(
            Category::Ide,
            Platform::ClaudeCode,
            json!({"commands": [
                {"name": "Run Tests", "command": "cargo nextest run"},
                {"name": "run tests", "command": "make test"}
            ]}),
        );
        let out = TempDir::new().unwrap();
        let result = ClaudeCodeConverter::new().deploy(&ctx, out.path());
        assert_eq!(
            result.deployed_files,
            vec![".claude/commands/run-tests.md", ".claude/commands/run-tests-2.md"]
        );
    }

    #[test]
    fn deploy_without_claude_config_fails() {
        let ctx = TaptikContext::new(CONTEXT_VERSION, Platform::Kiro);
        let out = TempDir::new().unwrap();
        let result = ClaudeCodeConverter::new().deploy(&ctx, out.path());
        assert!(!result.success);
        assert_eq!(result.errors, vec!["no claude_code configuration found in context"]);
    }
}
