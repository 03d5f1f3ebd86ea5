//! The neutral Taptik context: the interchange document produced by builders
//! and consumed by converters and deployers.

use crate::types::{Category, Platform};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub const CONTEXT_VERSION: &str = "1.0.0";
pub const SECTION_SPEC_VERSION: &str = "1.0.0";

// ---------------------------------------------------------------------------
// PlatformData
// ---------------------------------------------------------------------------

/// Platform-keyed payload of a category section.
///
/// Known platforms are closed fields; anything else lands in `other` and is
/// reported by [`TaptikContext::unknown_platform_keys`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kiro: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claude_code: Option<Value>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

impl PlatformData {
    pub fn get(&self, platform: Platform) -> Option<&Value> {
        match platform {
            Platform::Kiro => self.kiro.as_ref(),
            Platform::Cursor => self.cursor.as_ref(),
            Platform::ClaudeCode => self.claude_code.as_ref(),
        }
    }

    pub fn set(&mut self, platform: Platform, value: Value) {
        let slot = match platform {
            Platform::Kiro => &mut self.kiro,
            Platform::Cursor => &mut self.cursor,
            Platform::ClaudeCode => &mut self.claude_code,
        };
        *slot = Some(value);
    }

    pub fn is_empty(&self) -> bool {
        self.kiro.is_none()
            && self.cursor.is_none()
            && self.claude_code.is_none()
            && self.other.is_empty()
    }
}

// ---------------------------------------------------------------------------
// CategorySection
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySection {
    pub category: Category,
    pub spec_version: String,
    #[serde(default)]
    pub data: PlatformData,
}

impl CategorySection {
    pub fn new(category: Category) -> Self {
        Self {
            category,
            spec_version: SECTION_SPEC_VERSION.to_string(),
            data: PlatformData::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionStamp {
    pub source: Platform,
    pub target: Platform,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMetadata {
    pub platforms: Vec<Platform>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion: Option<ConversionStamp>,
}

// ---------------------------------------------------------------------------
// TaptikContext
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaptikContext {
    pub version: String,
    pub metadata: ContextMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal: Option<CategorySection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<CategorySection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<CategorySection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<CategorySection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ide: Option<CategorySection>,
}

impl TaptikContext {
    pub fn new(version: impl Into<String>, platform: Platform) -> Self {
        Self {
            version: version.into(),
            metadata: ContextMetadata {
                platforms: vec![platform],
                created_at: Utc::now(),
                updated_at: None,
                source_path: None,
                conversion: None,
            },
            personal: None,
            project: None,
            prompts: None,
            tools: None,
            ide: None,
        }
    }

    pub fn section(&self, category: Category) -> Option<&CategorySection> {
        match category {
            Category::Personal => self.personal.as_ref(),
            Category::Project => self.project.as_ref(),
            Category::Prompts => self.prompts.as_ref(),
            Category::Tools => self.tools.as_ref(),
            Category::Ide => self.ide.as_ref(),
        }
    }

    fn slot(&mut self, category: Category) -> &mut Option<CategorySection> {
        match category {
            Category::Personal => &mut self.personal,
            Category::Project => &mut self.project,
            Category::Prompts => &mut self.prompts,
            Category::Tools => &mut self.tools,
            Category::Ide => &mut self.ide,
        }
    }

    /// Store `value` under `<category>.data.<platform>`, creating the section if needed.
    pub fn set_platform_data(&mut self, category: Category, platform: Platform, value: Value) {
        self.slot(category)
            .get_or_insert_with(|| CategorySection::new(category))
            .data
            .set(platform, value);
    }

    pub fn platform_data(&self, category: Category, platform: Platform) -> Option<&Value> {
        self.section(category).and_then(|s| s.data.get(platform))
    }

    /// The platform-native configuration stored under `ide.data.<platform>`.
    pub fn ide_config(&self, platform: Platform) -> Option<&Value> {
        self.platform_data(Category::Ide, platform)
            .filter(|v| !v.is_null())
    }

    /// A context is meaningful only when at least one category holds data.
    pub fn is_meaningful(&self) -> bool {
        [
            Category::Personal,
            Category::Project,
            Category::Prompts,
            Category::Tools,
            Category::Ide,
        ]
        .iter()
        .filter_map(|c| self.section(*c))
        .any(|s| !s.data.is_empty())
    }

    /// `<category>.data.<key>` entries whose key is not a known platform.
    pub fn unknown_platform_keys(&self) -> Vec<String> {
        [
            Category::Personal,
            Category::Project,
            Category::Prompts,
            Category::Tools,
            Category::Ide,
        ]
        .iter()
        .filter_map(|c| self.section(*c).map(|s| (c, s)))
        .flat_map(|(c, s)| s.data.other.keys().map(move |k| format!("{c}.data.{k}")))
        .collect()
    }

    pub fn stamp_conversion(&mut self, source: Platform, target: Platform) {
        let now = Utc::now();
        self.metadata.conversion = Some(ConversionStamp {
            source,
            target,
            timestamp: now,
        });
        self.metadata.updated_at = Some(now);
        if !self.metadata.platforms.contains(&target) {
            self.metadata.platforms.push(target);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
