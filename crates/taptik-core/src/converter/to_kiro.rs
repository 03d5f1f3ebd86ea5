use crate::builder::kiro::SteeringFrontmatter;
use crate::builder::{ConversionResult, KiroConfig};
use crate::config::ConversionConfig;
use crate::context::TaptikContext;
use crate::converter::{deploy_file, deploy_json, finish, reverse_into, ConverterStrategy, DeployResult};
use crate::error::{Result, TaptikError};
use crate::io::{render_frontmatter, FileSystem, LocalFs};
use crate::mapping::ReverseMappingService;
use crate::paths::{
    kiro_steering_file, KIRO_DIR, KIRO_HOOKS_DIR, KIRO_HOOKS_FILE, KIRO_MCP_FILE, KIRO_PROJECT_FILE,
    KIRO_SETTINGS_DIR, KIRO_SPECS_DIR, KIRO_STEERING_DIR, SPEC_DESIGN_MD, SPEC_REQUIREMENTS_MD,
    SPEC_TASKS_MD,
};
use crate::records::{mcp_document, Spec};
use crate::types::Platform;
use serde_json::json;
use std::collections::BTreeSet;
use std::path::Path;

/// Converts Claude Code or Cursor contexts into Kiro and deploys the `.kiro/` tree.
pub struct KiroConverter<F = LocalFs> {
    source: Platform,
    fs: F,
    service: ReverseMappingService<'static>,
    config: ConversionConfig,
}

impl KiroConverter {
    pub fn new(source: Platform) -> Self {
        Self::with_fs(source, LocalFs)
    }

    pub fn from_claude_code() -> Self {
        Self::new(Platform::ClaudeCode)
    }

    pub fn from_cursor() -> Self {
        Self::new(Platform::Cursor)
    }
}

fn spec_text<'s>(spec: &'s Spec, file: &str) -> Option<&'s str> {
    match file {
        SPEC_REQUIREMENTS_MD => spec.requirements.as_deref(),
        SPEC_DESIGN_MD => spec.design.as_deref(),
        SPEC_TASKS_MD => spec.tasks.as_deref(),
        _ => None,
    }
}

fn spec_title(file: &str) -> &'static str {
    match file {
        SPEC_REQUIREMENTS_MD => "Requirements",
        SPEC_DESIGN_MD => "Design",
        _ => "Tasks",
    }
}

/// `# <Kind>` followed by one `## <spec name>` section per spec carrying that kind.
fn aggregated_spec_doc(specs: &[Spec], file: &str) -> Option<String> {
    let mut out = format!("# {}\n\n", spec_title(file));
    let mut any = false;
    for spec in specs {
        if let Some(text) = spec_text(spec, file) {
            out.push_str(&format!("## {}\n\n{}\n\n", spec.name, text.trim()));
            any = true;
        }
    }
    any.then(|| format!("{}\n", out.trim_end()))
}

impl<F: FileSystem> KiroConverter<F> {
    pub fn with_fs(source: Platform, fs: F) -> Self {
        Self {
            source,
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
        if !self.can_convert() {
            return Err(TaptikError::UnsupportedConversion {
                from: self.source,
                to: Platform::Kiro,
            });
        }
        let mut reversed = reverse_into::<KiroConfig>(&self.service, &self.config, context, self.source)?;
        // No bidirectional mapping exists for settings; carry them as-is.
        if let Some(settings) = reversed.take_unmapped("settings") {
            reversed.config.project_settings.get_or_insert(settings);
        }
        finish(context, self.source, reversed)
    }

    fn write_all(&self, config: &KiroConfig, root: &Path, deployed: &mut Vec<String>) -> Result<()> {
        for dir in [KIRO_DIR, KIRO_SPECS_DIR, KIRO_STEERING_DIR, KIRO_HOOKS_DIR, KIRO_SETTINGS_DIR] {
            self.fs.ensure_directory(&root.join(dir))?;
        }

        for file in [SPEC_REQUIREMENTS_MD, SPEC_DESIGN_MD, SPEC_TASKS_MD] {
            if let Some(doc) = aggregated_spec_doc(&config.specs, file) {
                let rel = format!("{KIRO_SPECS_DIR}/{file}");
                deploy_file(&self.fs, root, &rel, &doc, deployed)?;
            }
        }

        let mut used = BTreeSet::new();
        for rule in &config.steering {
            let mut rel = kiro_steering_file(&rule.name);
            let mut n = 2;
            while !used.insert(rel.clone()) {
                rel = kiro_steering_file(&format!("{}-{n}", rule.name));
                n += 1;
            }
            let meta = SteeringFrontmatter {
                description: rule.description.clone(),
                priority: Some(rule.priority),
            };
            let doc = render_frontmatter(&meta, &rule.content())?;
            deploy_file(&self.fs, root, &rel, &doc, deployed)?;
        }

        if !config.hooks.is_empty() {
            deploy_json(&self.fs, root, KIRO_HOOKS_FILE, &json!({ "hooks": config.hooks }), deployed)?;
        }
        if !config.mcp_servers.is_empty() {
            deploy_json(&self.fs, root, KIRO_MCP_FILE, &mcp_document(&config.mcp_servers), deployed)?;
        }
        if let Some(settings) = &config.project_settings {
            deploy_json(&self.fs, root, KIRO_PROJECT_FILE, settings, deployed)?;
        }
        Ok(())
    }
}

impl<F: FileSystem> ConverterStrategy for KiroConverter<F> {
    fn source(&self) -> Platform {
        self.source
    }

    fn target(&self) -> Platform {
        Platform::Kiro
    }

    fn compatibility_threshold(&self) -> u32 {
        self.config.compatibility_threshold
    }

    fn convert(&self, context: &TaptikContext) -> ConversionResult<TaptikContext> {
        self.try_convert(context).unwrap_or_else(|e| {
            tracing::warn!(source = %self.source, error = %e, "conversion to kiro failed");
            ConversionResult::failed(e)
        })
    }

    fn deploy(&self, context: &TaptikContext, target_dir: &Path) -> DeployResult {
        let mut deployed = Vec::new();
        let outcome = match context.ide_config(Platform::Kiro) {
            None => Err(TaptikError::MissingPlatformConfig(Platform::Kiro)),
            Some(native) => serde_json::from_value::<KiroConfig>(native.clone())
                .map_err(TaptikError::from)
                .and_then(|config| self.write_all(&config, target_dir, &mut deployed)),
        };
        DeployResult::from_outcome(outcome, deployed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
