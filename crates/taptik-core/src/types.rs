use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Kiro,
    Cursor,
    ClaudeCode,
}

impl Platform {
    pub fn all() -> &'static [Platform] {
        &[Platform::Kiro, Platform::Cursor, Platform::ClaudeCode]
    }

    /// Key used for this platform inside a category `data` map.
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Kiro => "kiro",
            Platform::Cursor => "cursor",
            Platform::ClaudeCode => "claude_code",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Platform::Kiro => "Kiro",
            Platform::Cursor => "Cursor",
            Platform::ClaudeCode => "Claude Code",
        }
    }

    /// Features whose survival decides whether a round trip is reversible.
    pub fn critical_features(self) -> &'static [&'static str] {
        match self {
            Platform::Kiro => &["specs", "steering"],
            Platform::ClaudeCode => &["instructions"],
            Platform::Cursor => &["rules"],
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = crate::error::TaptikError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kiro" => Ok(Platform::Kiro),
            "cursor" => Ok(Platform::Cursor),
            "claude_code" | "claude-code" | "claudecode" | "claude" => Ok(Platform::ClaudeCode),
            _ => Err(crate::error::TaptikError::InvalidPlatform(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Personal,
    Project,
    Prompts,
    Tools,
    Ide,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Personal => "personal",
            Category::Project => "project",
            Category::Prompts => "prompts",
            Category::Tools => "tools",
            Category::Ide => "ide",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_parses_aliases() {
        for s in ["claude-code", "claude_code", "Claude", "CLAUDECODE"] {
            assert_eq!(s.parse::<Platform>().unwrap(), Platform::ClaudeCode);
        }
        assert_eq!("kiro".parse::<Platform>().unwrap(), Platform::Kiro);
        assert!("vim".parse::<Platform>().is_err());
    }

    #[test]
    fn platform_serializes_as_data_key() {
        let json = serde_json::to_string(&Platform::ClaudeCode).unwrap();
        assert_eq!(json, "\"claude_code\"");
        assert_eq!(Platform::ClaudeCode.to_string(), "claude_code");
    }
}
