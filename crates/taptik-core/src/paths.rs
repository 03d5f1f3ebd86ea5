use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Kiro layout
// ---------------------------------------------------------------------------

pub const KIRO_DIR: &str = ".kiro";
pub const KIRO_SPECS_DIR: &str = ".kiro/specs";
pub const KIRO_STEERING_DIR: &str = ".kiro/steering";
pub const KIRO_HOOKS_DIR: &str = ".kiro/hooks";
pub const KIRO_SETTINGS_DIR: &str = ".kiro/settings";

pub const KIRO_HOOKS_FILE: &str = ".kiro/hooks/hooks.json";
pub const KIRO_MCP_FILE: &str = ".kiro/settings/mcp.json";
pub const KIRO_PROJECT_FILE: &str = ".kiro/settings/project.json";

pub const SPEC_REQUIREMENTS_MD: &str = "requirements.md";
pub const SPEC_DESIGN_MD: &str = "design.md";
pub const SPEC_TASKS_MD: &str = "tasks.md";

// ---------------------------------------------------------------------------
// Claude Code layout
// ---------------------------------------------------------------------------

pub const CLAUDE_MD: &str = "CLAUDE.md";
pub const CLAUDE_LOCAL_MD: &str = "CLAUDE.local.md";
pub const CLAUDE_DIR: &str = ".claude";
pub const CLAUDE_COMMANDS_DIR: &str = ".claude/commands";
pub const CLAUDE_SETTINGS_FILE: &str = ".claude/settings.json";
pub const CLAUDE_MCP_FILE: &str = ".mcp.json";

// ---------------------------------------------------------------------------
// Cursor layout
// ---------------------------------------------------------------------------

pub const CURSOR_RULES_FILE: &str = ".cursorrules";
pub const CURSOR_DIR: &str = ".cursor";
pub const CURSOR_RULES_DIR: &str = ".cursor/rules";
pub const CURSOR_MCP_FILE: &str = ".cursor/mcp.json";
pub const VSCODE_SETTINGS_FILE: &str = ".vscode/settings.json";

// ---------------------------------------------------------------------------
// Taptik
// ---------------------------------------------------------------------------

pub const TAPTIK_DIR: &str = ".taptik";
pub const CONFIG_FILE: &str = ".taptik/config.yaml";

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Relative path of the steering file written for a rule name.
pub fn kiro_steering_file(name: &str) -> String {
    format!("{KIRO_STEERING_DIR}/{}.md", file_slug(name))
}

/// Relative path of the command file written for a command name.
pub fn claude_command_file(name: &str) -> String {
    format!("{CLAUDE_COMMANDS_DIR}/{}.md", file_slug(name))
}

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

/// Reduce a free-form record name to a file-name-safe slug.
pub fn file_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut dash = false;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
            slug.push(c.to_ascii_lowercase());
            dash = false;
        } else if !dash && !slug.is_empty() {
            slug.push('-');
            dash = true;
        }
    }
    let slug = slug.trim_end_matches(['-', '.']).to_string();
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

/// Strip a known markdown extension (`.md`, `.mdc`) from a file name.
pub fn markdown_stem(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(".md")
        .or_else(|| file_name.strip_suffix(".mdc"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
