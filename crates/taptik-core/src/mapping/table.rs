use crate::mapping::transform::Transform;
use crate::types::Platform;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// FeatureMapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRef {
    pub platform: Platform,
    pub feature: String,
    /// Dotted path into the feature-level data object.
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureTarget {
    pub platform: Platform,
    pub feature: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureMapping {
    pub source: FeatureRef,
    pub target: FeatureTarget,
    pub bidirectional: bool,
    /// Lower runs first.
    pub priority: u32,
    pub description: String,
}

impl FeatureMapping {
    /// Swap source and target, installing `transform` on the new target.
    pub fn reversed(&self, transform: Option<Transform>) -> FeatureMapping {
        FeatureMapping {
            source: FeatureRef {
                platform: self.target.platform,
                feature: self.target.feature.clone(),
                path: self.target.path.clone(),
            },
            target: FeatureTarget {
                platform: self.source.platform,
                feature: self.source.feature.clone(),
                path: self.source.path.clone(),
                transform,
            },
            bidirectional: self.bidirectional,
            priority: self.priority,
            description: format!("reverse of: {}", self.description),
        }
    }
}

// ---------------------------------------------------------------------------
// Helper macro for concise mapping definitions
// ---------------------------------------------------------------------------

macro_rules! mapping {
    (
        $src:expr => $tgt:expr,
        $sfeat:literal -> $tfeat:literal,
        priority: $prio:expr,
        bidirectional: $bi:expr,
        description: $desc:expr
        $(, transform: $t:expr)?
    ) => {
        FeatureMapping {
            source: FeatureRef {
                platform: $src,
                feature: $sfeat.to_string(),
                path: $sfeat.to_string(),
            },
            target: FeatureTarget {
                platform: $tgt,
                feature: $tfeat.to_string(),
                path: $tfeat.to_string(),
                transform: {
                    #[allow(unused_assignments, unused_mut)]
                    let mut t: Option<Transform> = None;
                    $(t = Some($t);)?
                    t
                },
            },
            bidirectional: $bi,
            priority: $prio,
            description: $desc.to_string(),
        }
    };
}

// ---------------------------------------------------------------------------
// Builtin mappings
// ---------------------------------------------------------------------------

fn builtin_mappings() -> Vec<FeatureMapping> {
    use Platform::{ClaudeCode, Cursor, Kiro};
    use Transform::*;

    vec![
        // Kiro → Claude Code
        mapping! {
            Kiro => ClaudeCode, "specs" -> "instructions",
            priority: 1, bidirectional: true,
            description: "Specs render as sections of the project instructions",
            transform: SpecsToMarkdown
        },
        mapping! {
            Kiro => ClaudeCode, "steering" -> "custom_instructions",
            priority: 2, bidirectional: true,
            description: "Steering documents render as custom instructions",
            transform: SteeringToMarkdown
        },
        mapping! {
            Kiro => ClaudeCode, "hooks" -> "commands",
            priority: 3, bidirectional: true,
            description: "Hooks become slash commands",
            transform: HooksToCommands
        },
        mapping! {
            Kiro => ClaudeCode, "mcp_servers" -> "mcp_servers",
            priority: 4, bidirectional: true,
            description: "MCP server definitions share one shape"
        },
        mapping! {
            Kiro => ClaudeCode, "project_settings" -> "settings",
            priority: 5, bidirectional: false,
            description: "Project settings are copied verbatim"
        },
        // Claude Code → Kiro
        mapping! {
            ClaudeCode => Kiro, "instructions" -> "specs",
            priority: 1, bidirectional: true,
            description: "Instruction sections become specs",
            transform: MarkdownToSpecs
        },
        mapping! {
            ClaudeCode => Kiro, "custom_instructions" -> "steering",
            priority: 2, bidirectional: true,
            description: "Custom instructions become steering documents",
            transform: MarkdownToSteering
        },
        mapping! {
            ClaudeCode => Kiro, "commands" -> "hooks",
            priority: 3, bidirectional: true,
            description: "Slash commands become manual hooks",
            transform: CommandsToHooks
        },
        mapping! {
            ClaudeCode => Kiro, "mcp_servers" -> "mcp_servers",
            priority: 4, bidirectional: true,
            description: "MCP server definitions share one shape"
        },
        mapping! {
            ClaudeCode => Kiro, "settings" -> "project_settings",
            priority: 5, bidirectional: false,
            description: "Settings are copied verbatim"
        },
        // Kiro → Cursor
        mapping! {
            Kiro => Cursor, "steering" -> "rules",
            priority: 1, bidirectional: true,
            description: "Steering documents render as Cursor rules",
            transform: SteeringToMarkdown
        },
        mapping! {
            Kiro => Cursor, "mcp_servers" -> "mcp_servers",
            priority: 2, bidirectional: true,
            description: "MCP server definitions share one shape"
        },
        // Cursor → Kiro
        mapping! {
            Cursor => Kiro, "rules" -> "steering",
            priority: 1, bidirectional: true,
            description: "Cursor rules become steering documents",
            transform: MarkdownToSteering
        },
        mapping! {
            Cursor => Kiro, "mcp_servers" -> "mcp_servers",
            priority: 2, bidirectional: true,
            description: "MCP server definitions share one shape"
        },
        // Claude Code → Cursor
        mapping! {
            ClaudeCode => Cursor, "instructions" -> "rules",
            priority: 1, bidirectional: true,
            description: "Project instructions become Cursor rules",
            transform: InstructionsToRules
        },
        mapping! {
            ClaudeCode => Cursor, "mcp_servers" -> "mcp_servers",
            priority: 2, bidirectional: true,
            description: "MCP server definitions share one shape"
        },
        // Cursor → Claude Code
        mapping! {
            Cursor => ClaudeCode, "rules" -> "instructions",
            priority: 1, bidirectional: true,
            description: "Cursor rules become project instructions",
            transform: RulesToInstructions
        },
        mapping! {
            Cursor => ClaudeCode, "mcp_servers" -> "mcp_servers",
            priority: 2, bidirectional: true,
            description: "MCP server definitions share one shape"
        },
        mapping! {
            Cursor => ClaudeCode, "settings" -> "settings",
            priority: 3, bidirectional: false,
            description: "Editor settings are copied verbatim"
        },
    ]
}

// ---------------------------------------------------------------------------
// MappingTable
// ---------------------------------------------------------------------------

/// Mappings keyed by ordered `(source, target)` platform pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappingTable {
    entries: BTreeMap<(Platform, Platform), Vec<FeatureMapping>>,
}

static BUILTIN: OnceLock<MappingTable> = OnceLock::new();

impl MappingTable {
    pub fn new(mappings: Vec<FeatureMapping>) -> Self {
        let mut entries: BTreeMap<(Platform, Platform), Vec<FeatureMapping>> = BTreeMap::new();
        for m in mappings {
            entries
                .entry((m.source.platform, m.target.platform))
                .or_default()
                .push(m);
        }
        for list in entries.values_mut() {
            list.sort_by_key(|m| m.priority);
        }
        Self { entries }
    }

    /// The mappings shipped with the crate.
    pub fn builtin() -> &'static MappingTable {
        BUILTIN.get_or_init(|| MappingTable::new(builtin_mappings()))
    }

    /// Mappings for one ordered pair, in priority order. Always a fresh copy.
    pub fn get_mappings(&self, source: Platform, target: Platform) -> Vec<FeatureMapping> {
        self.entries
            .get(&(source, target))
            .cloned()
            .unwrap_or_default()
    }

    pub fn supports(&self, source: Platform, target: Platform) -> bool {
        self.entries
            .get(&(source, target))
            .is_some_and(|l| !l.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_idempotent() {
        let table = MappingTable::builtin();
        let first = table.get_mappings(Platform::Kiro, Platform::ClaudeCode);
        let mut scratch = table.get_mappings(Platform::Kiro, Platform::ClaudeCode);
        scratch.clear();
        let second = table.get_mappings(Platform::Kiro, Platform::ClaudeCode);
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn mappings_are_priority_ordered() {
        let table = MappingTable::new(vec![
            mapping! {
                Platform::Kiro => Platform::Cursor, "b" -> "b",
                priority: 2, bidirectional: false, description: "b"
            },
            mapping! {
                Platform::Kiro => Platform::Cursor, "a" -> "a",
                priority: 1, bidirectional: false, description: "a"
            },
        ]);
        let features: Vec<_> = table
            .get_mappings(Platform::Kiro, Platform::Cursor)
            .into_iter()
            .map(|m| m.source.feature)
            .collect();
        assert_eq!(features, vec!["a", "b"]);
    }

    #[test]
    fn unknown_pair_is_empty() {
        let table = MappingTable::new(Vec::new());
        assert!(table.get_mappings(Platform::Kiro, Platform::Cursor).is_empty());
        assert!(!table.supports(Platform::Kiro, Platform::Cursor));
    }

    #[test]
    fn reversed_swaps_sides() {
        let m = &MappingTable::builtin().get_mappings(Platform::Kiro, Platform::ClaudeCode)[0];
        let r = m.reversed(Some(Transform::MarkdownToSpecs));
        assert_eq!(r.source.platform, Platform::ClaudeCode);
        assert_eq!(r.source.feature, "instructions");
        assert_eq!(r.target.feature, "specs");
        assert_eq!(r.target.transform, Some(Transform::MarkdownToSpecs));
    }

    #[test]
    fn table_is_serializable_data() {
        let mappings = MappingTable::builtin().get_mappings(Platform::ClaudeCode, Platform::Kiro);
        let json = serde_json::to_string(&mappings).unwrap();
        let back: Vec<FeatureMapping> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mappings);
    }
}
