use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Spec
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub design: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<String>,
    /// Extra markdown files found next to the spec, keyed by file name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: BTreeMap<String, String>,
}

impl Spec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            design: None,
            requirements: None,
            tasks: None,
            resources: BTreeMap::new(),
        }
    }

    pub fn has_content(&self) -> bool {
        self.design.is_some() || self.requirements.is_some() || self.tasks.is_some()
    }

    /// Feature-level shape used by the mapping engine (resources are not mapped).
    pub fn to_feature(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("name".into(), Value::String(self.name.clone()));
        for (key, field) in [
            ("design", &self.design),
            ("requirements", &self.requirements),
            ("tasks", &self.tasks),
        ] {
            if let Some(text) = field {
                obj.insert(key.into(), Value::String(text.clone()));
            }
        }
        Value::Object(obj)
    }

    pub fn from_feature(value: &Value) -> Option<Self> {
        let name = value.get("name")?.as_str()?.trim();
        if name.is_empty() {
            return None;
        }
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        Some(Self {
            name: name.to_string(),
            design: text("design"),
            requirements: text("requirements"),
            tasks: text("tasks"),
            resources: BTreeMap::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// SteeringRule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteeringRule {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub priority: u32,
}

impl SteeringRule {
    /// Build a rule from free text: each non-blank line becomes one rule.
    pub fn from_content(name: impl Into<String>, content: &str, priority: u32) -> Self {
        Self {
            name: name.into(),
            description: None,
            rules: content
                .lines()
                .map(str::trim_end)
                .filter(|l| !l.trim().is_empty())
                .map(str::to_string)
                .collect(),
            priority,
        }
    }

    pub fn content(&self) -> String {
        self.rules.join("\n")
    }

    pub fn to_feature(&self) -> Value {
        json!({ "name": self.name, "content": self.content() })
    }
}

// ---------------------------------------------------------------------------
// Hook
// ---------------------------------------------------------------------------

pub const MANUAL_TRIGGER: &str = "manual";
pub const HOOK_VERSION: &str = "1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookTrigger {
    #[serde(rename = "type", default = "default_trigger")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns: Vec<String>,
}

fn default_trigger() -> String {
    MANUAL_TRIGGER.to_string()
}

impl Default for HookTrigger {
    fn default() -> Self {
        Self {
            kind: default_trigger(),
            patterns: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookAction {
    #[serde(rename = "type", default = "default_action")]
    pub kind: String,
    #[serde(default, alias = "prompt")]
    pub command: String,
}

fn default_action() -> String {
    "command".to_string()
}

impl Default for HookAction {
    fn default() -> Self {
        Self {
            kind: default_action(),
            command: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hook {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub when: HookTrigger,
    #[serde(default)]
    pub then: HookAction,
}

fn default_true() -> bool {
    true
}

impl Hook {
    pub fn to_feature(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("name".into(), Value::String(self.name.clone()));
        obj.insert("command".into(), Value::String(self.then.command.clone()));
        obj.insert("event".into(), Value::String(self.when.kind.clone()));
        if let Some(desc) = &self.description {
            obj.insert("description".into(), Value::String(desc.clone()));
        }
        obj.insert("enabled".into(), Value::Bool(self.enabled));
        Value::Object(obj)
    }

    /// Rebuild a hook from its feature-level shape, synthesising a manual trigger
    /// when no event is given.
    pub fn from_feature(value: &Value) -> Option<Self> {
        let name = value.get("name")?.as_str()?.to_string();
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        Some(Self {
            name,
            enabled: value.get("enabled").and_then(Value::as_bool).unwrap_or(true),
            description: text("description"),
            version: HOOK_VERSION.to_string(),
            when: HookTrigger {
                kind: text("event").unwrap_or_else(default_trigger),
                patterns: Vec::new(),
            },
            then: HookAction {
                kind: default_action(),
                command: text("command").unwrap_or_default(),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// ClaudeCommand
// ---------------------------------------------------------------------------

/// A Claude Code slash command (`.claude/commands/<name>.md`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaudeCommand {
    pub name: String,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// McpServer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpServer {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Keys of the server entry this model does not name (env, autoApprove, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
}

impl McpServer {
    /// Parse one `mcpServers.<name>` entry.
    pub fn from_entry(name: &str, entry: &Value) -> Self {
        let mut config = entry.as_object().cloned().unwrap_or_default();
        let mut take_str = |key: &str| match config.remove(key) {
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                config.insert(key.to_string(), other);
                None
            }
            None => None,
        };
        let command = take_str("command");
        let url = take_str("url").or_else(|| take_str("serverUrl"));
        let protocol = take_str("protocol").or_else(|| take_str("transport"));
        let version = take_str("version");
        let args = match config.remove("args") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(other) => {
                config.insert("args".into(), other);
                Vec::new()
            }
            None => Vec::new(),
        };
        let disabled = match config.remove("disabled") {
            Some(Value::Bool(b)) => b,
            _ => false,
        };
        Self {
            name: name.to_string(),
            version,
            command,
            args,
            url,
            protocol,
            enabled: !disabled,
            config,
        }
    }

    pub fn to_entry(&self) -> Value {
        let mut obj = self.config.clone();
        if let Some(cmd) = &self.command {
            obj.insert("command".into(), Value::String(cmd.clone()));
        }
        if !self.args.is_empty() {
            obj.insert("args".into(), json!(self.args));
        }
        if let Some(url) = &self.url {
            obj.insert("url".into(), Value::String(url.clone()));
        }
        if let Some(protocol) = &self.protocol {
            obj.insert("protocol".into(), Value::String(protocol.clone()));
        }
        if let Some(version) = &self.version {
            obj.insert("version".into(), Value::String(version.clone()));
        }
        if !self.enabled {
            obj.insert("disabled".into(), Value::Bool(true));
        }
        Value::Object(obj)
    }
}

/// Parse an `{"mcpServers": {...}}` document into a deterministically ordered list.
pub fn parse_mcp_document(doc: &Value) -> Vec<McpServer> {
    let mut servers: Vec<McpServer> = doc
        .get("mcpServers")
        .and_then(Value::as_object)
        .map(|entries| {
            entries
                .iter()
                .map(|(name, entry)| McpServer::from_entry(name, entry))
                .collect()
        })
        .unwrap_or_default();
    sort_enabled_first(&mut servers, |s| (s.enabled, s.name.as_str()));
    servers
}

pub fn mcp_document(servers: &[McpServer]) -> Value {
    let entries: Map<String, Value> = servers
        .iter()
        .map(|s| (s.name.clone(), s.to_entry()))
        .collect();
    json!({ "mcpServers": entries })
}

/// Order file-derived records: enabled before disabled, then by case-sensitive name.
pub fn sort_enabled_first<T>(items: &mut [T], key: impl Fn(&T) -> (bool, &str)) {
    items.sort_by(|a, b| {
        let (a_on, a_name) = key(a);
        let (b_on, b_name) = key(b);
        b_on.cmp(&a_on).then_with(|| a_name.cmp(b_name))
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
