//! Structural text parsing: recovers specs, steering sections and hooks from
//! heading-delimited markdown and command listings, and renders them back.
//!
//! Parsing is purely textual. Sections that only partially match degrade to
//! partial records instead of failing.

use crate::records::{Spec, MANUAL_TRIGGER};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::OnceLock;

/// Document title written above rendered specs; never a record itself.
pub const PROJECT_INSTRUCTIONS_TITLE: &str = "Project Instructions";
/// Document title written above rendered steering sections.
pub const CUSTOM_INSTRUCTIONS_TITLE: &str = "Custom Instructions";
/// Name given to headerless input wrapped as a single steering rule.
pub const IMPORTED_RULE_NAME: &str = "imported-rules";
/// Name given to body text found directly under a document title.
pub const GENERAL_RULE_NAME: &str = "general";
/// Name given to instructions without any `##` section when parsed as specs.
pub const IMPORTED_SPEC_NAME: &str = "imported-instructions";

// ---------------------------------------------------------------------------
// Section splitting
// ---------------------------------------------------------------------------

static SECTION_RE: OnceLock<Regex> = OnceLock::new();
static TITLE_RE: OnceLock<Regex> = OnceLock::new();

fn section_re() -> &'static Regex {
    SECTION_RE.get_or_init(|| Regex::new(r"(?m)^##[ \t]+(.*)$").unwrap())
}

fn title_re() -> &'static Regex {
    TITLE_RE.get_or_init(|| Regex::new(r"^\s*#[ \t]+([^\n]*)\n?").unwrap())
}

fn subsection_re(heading: &str) -> Regex {
    // `heading` is one of a fixed set of literal words.
    Regex::new(&format!(r"(?is)###[ \t]*{heading}[ \t]*(?:\r?\n|\z)(.*?)(?:\n###|\z)")).unwrap()
}

static DESIGN_RE: OnceLock<Regex> = OnceLock::new();
static REQUIREMENTS_RE: OnceLock<Regex> = OnceLock::new();
static TASKS_RE: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone, PartialEq)]
struct Section<'a> {
    name: String,
    body: &'a str,
}

/// Split `input` on `## ` headings. Returns the text before the first heading
/// and the sections in document order.
fn split_sections(input: &str) -> (&str, Vec<Section<'_>>) {
    let matches: Vec<_> = section_re().captures_iter(input).collect();
    let Some(first) = matches.first() else {
        return (input, Vec::new());
    };
    let preamble = &input[..first.get(0).map_or(0, |m| m.start())];

    let mut sections = Vec::with_capacity(matches.len());
    for (i, caps) in matches.iter().enumerate() {
        let whole = caps.get(0).map_or(0..0, |m| m.range());
        let body_end = matches
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(input.len(), |m| m.start());
        let mut body = &input[whole.end.min(body_end)..body_end];
        let mut name = caps.get(1).map_or("", |m| m.as_str()).trim().to_string();

        // An empty heading takes its name from the first non-empty body line.
        if name.is_empty() {
            let trimmed = body.trim_start();
            let (line, rest) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
            name = line.trim().to_string();
            body = rest;
        }
        sections.push(Section { name, body });
    }
    (preamble, sections)
}

/// Strip a leading `# Title` line. Returns the title (if any) and the remainder.
fn strip_title(text: &str) -> (Option<&str>, &str) {
    match title_re().captures(text) {
        Some(caps) => {
            let end = caps.get(0).map_or(0, |m| m.end());
            (caps.get(1).map(|m| m.as_str().trim()), &text[end..])
        }
        None => (None, text),
    }
}

fn is_document_title(name: &str) -> bool {
    name.eq_ignore_ascii_case(PROJECT_INSTRUCTIONS_TITLE)
        || name.eq_ignore_ascii_case(CUSTOM_INSTRUCTIONS_TITLE)
}

/// `(name, trimmed body)` for every named `## ` section, preamble dropped.
pub fn named_sections(input: &str) -> Vec<(String, String)> {
    let (_, sections) = split_sections(input);
    sections
        .into_iter()
        .filter(|s| !s.name.is_empty())
        .map(|s| (s.name, s.body.trim().to_string()))
        .collect()
}

fn extract_block(re: &Regex, body: &str) -> Option<String> {
    re.captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

// ---------------------------------------------------------------------------
// Specs
// ---------------------------------------------------------------------------

/// Parse `## Name` sections into specs, lifting `### Design`,
/// `### Requirements` and `### Tasks` blocks when present.
pub fn parse_specs(input: &str) -> Vec<Spec> {
    let design_re = DESIGN_RE.get_or_init(|| subsection_re("Design"));
    let requirements_re = REQUIREMENTS_RE.get_or_init(|| subsection_re("Requirements"));
    let tasks_re = TASKS_RE.get_or_init(|| subsection_re("Tasks"));

    let (preamble, sections) = split_sections(input);

    if sections.is_empty() {
        // No `##` structure: keep the text as a single spec rather than dropping it.
        let (title, rest) = strip_title(preamble);
        let rest = rest.trim();
        if rest.is_empty() {
            return Vec::new();
        }
        let name = title
            .filter(|t| !t.is_empty() && !is_document_title(t))
            .unwrap_or(IMPORTED_SPEC_NAME);
        let mut spec = Spec::new(name);
        spec.requirements = Some(rest.to_string());
        return vec![spec];
    }

    sections
        .into_iter()
        .filter(|s| !s.name.is_empty() && !is_document_title(&s.name))
        .map(|s| {
            let mut spec = Spec::new(s.name);
            spec.design = extract_block(design_re, s.body);
            spec.requirements = extract_block(requirements_re, s.body);
            spec.tasks = extract_block(tasks_re, s.body);
            spec
        })
        .collect()
}

/// Render specs as a Claude Code instructions document.
pub fn render_specs(specs: &[Spec]) -> String {
    let mut out = format!("# {PROJECT_INSTRUCTIONS_TITLE}\n\n");
    for spec in specs {
        out.push_str(&format!("## {}\n\n", spec.name));
        for (heading, field) in [
            ("Design", &spec.design),
            ("Requirements", &spec.requirements),
            ("Tasks", &spec.tasks),
        ] {
            if let Some(text) = field {
                out.push_str(&format!("### {heading}\n{}\n\n", text.trim()));
            }
        }
    }
    format!("{}\n", out.trim_end())
}

// ---------------------------------------------------------------------------
// Steering
// ---------------------------------------------------------------------------

/// Feature-level steering record: a named block of guidance text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SteeringSection {
    pub name: String,
    pub content: String,
}

impl SteeringSection {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Parse steering text into sections. Non-blank input never yields an empty list.
pub fn parse_steering(input: &str) -> Vec<SteeringSection> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let (preamble, sections) = split_sections(input);
    // Only the rendered document title is dropped; any other title is content.
    let (title, rest) = strip_title(preamble);
    let titled = title.is_some_and(is_document_title);

    if sections.is_empty() && !titled {
        return vec![SteeringSection::new(IMPORTED_RULE_NAME, trimmed)];
    }

    let mut out = Vec::new();
    let preamble_body = (if titled { rest } else { preamble }).trim();
    if !preamble_body.is_empty() {
        out.push(SteeringSection::new(GENERAL_RULE_NAME, preamble_body));
    }
    for s in sections {
        let name = if is_document_title(&s.name) {
            GENERAL_RULE_NAME.to_string()
        } else {
            s.name
        };
        out.push(SteeringSection::new(name, s.body.trim()));
    }

    if out.is_empty() {
        out.push(SteeringSection::new(IMPORTED_RULE_NAME, trimmed));
    }
    out
}

/// Render steering sections as a single markdown document under `title`.
pub fn render_steering(title: &str, sections: &[SteeringSection]) -> String {
    let mut out = format!("# {title}\n\n");
    for s in sections {
        out.push_str(&format!("## {}\n\n{}\n\n", s.name, s.content.trim()));
    }
    format!("{}\n", out.trim_end())
}

// ---------------------------------------------------------------------------
// Hooks ⇄ commands
// ---------------------------------------------------------------------------

fn command_entries(input: &Value) -> Vec<(Option<String>, &Value)> {
    match input {
        Value::Array(items) => items.iter().map(|v| (None, v)).collect(),
        Value::Object(obj) => match obj.get("commands") {
            Some(Value::Array(items)) => items.iter().map(|v| (None, v)).collect(),
            Some(Value::Object(records)) => records
                .iter()
                .map(|(k, v)| (Some(k.clone()), v))
                .collect(),
            _ => obj.iter().map(|(k, v)| (Some(k.clone()), v)).collect(),
        },
        _ => Vec::new(),
    }
}

/// Convert a command listing (`{commands: [...]}`, a bare array, or a
/// name-keyed record map) into feature-level hooks.
///
/// Commands have no enabled state, so every produced hook is enabled.
pub fn hooks_from_commands(input: &Value) -> Vec<Value> {
    command_entries(input)
        .into_iter()
        .enumerate()
        .filter_map(|(i, (key, entry))| {
            let text = |k: &str| entry.get(k).and_then(Value::as_str).map(str::to_string);
            let command = match entry {
                Value::String(s) => Some(s.clone()),
                _ => text("command").or_else(|| text("prompt")).or_else(|| text("content")),
            };
            let name = text("name")
                .or(key)
                .unwrap_or_else(|| format!("command-{}", i + 1));
            let event = text("trigger")
                .or_else(|| text("event"))
                .unwrap_or_else(|| MANUAL_TRIGGER.to_string());

            let mut hook = Map::new();
            hook.insert("name".into(), Value::String(name));
            hook.insert("command".into(), Value::String(command?));
            hook.insert("event".into(), Value::String(event));
            if let Some(desc) = text("description") {
                hook.insert("description".into(), Value::String(desc));
            }
            hook.insert("enabled".into(), Value::Bool(true));
            Some(Value::Object(hook))
        })
        .collect()
}

/// Convert feature-level hooks into a `{commands: [...]}` listing.
pub fn commands_from_hooks(hooks: &[Value]) -> Value {
    let commands: Vec<Value> = hooks
        .iter()
        .filter_map(|h| {
            let name = h.get("name")?.as_str()?;
            let mut cmd = Map::new();
            cmd.insert("name".into(), json!(name));
            cmd.insert(
                "command".into(),
                json!(h.get("command").and_then(Value::as_str).unwrap_or_default()),
            );
            if let Some(event) = h.get("event").and_then(Value::as_str) {
                cmd.insert("trigger".into(), json!(event));
            }
            if let Some(desc) = h.get("description").and_then(Value::as_str) {
                cmd.insert("description".into(), json!(desc));
            }
            Some(Value::Object(cmd))
        })
        .collect();
    json!({ "commands": commands })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
