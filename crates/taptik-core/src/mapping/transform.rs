use crate::error::{Result, TaptikError};
use crate::parser::{self, SteeringSection, CUSTOM_INSTRUCTIONS_TITLE, PROJECT_INSTRUCTIONS_TITLE};
use crate::records::Spec;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

/// Named value transform referenced by a mapping.
///
/// Mapping tables store these identifiers rather than closures so they stay
/// plain, serializable data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    Identity,
    SpecsToMarkdown,
    MarkdownToSpecs,
    SteeringToMarkdown,
    MarkdownToSteering,
    HooksToCommands,
    CommandsToHooks,
    RulesToInstructions,
    InstructionsToRules,
}

static HEADING_RE: OnceLock<Regex> = OnceLock::new();

/// True when `text` carries a top-level (`# `) markdown heading.
pub fn has_top_level_heading(text: &str) -> bool {
    HEADING_RE
        .get_or_init(|| Regex::new(r"(?m)^#[ \t]+\S").unwrap())
        .is_match(text)
}

impl Transform {
    pub fn as_str(self) -> &'static str {
        match self {
            Transform::Identity => "identity",
            Transform::SpecsToMarkdown => "specs_to_markdown",
            Transform::MarkdownToSpecs => "markdown_to_specs",
            Transform::SteeringToMarkdown => "steering_to_markdown",
            Transform::MarkdownToSteering => "markdown_to_steering",
            Transform::HooksToCommands => "hooks_to_commands",
            Transform::CommandsToHooks => "commands_to_hooks",
            Transform::RulesToInstructions => "rules_to_instructions",
            Transform::InstructionsToRules => "instructions_to_rules",
        }
    }

    pub fn inverse(self) -> Transform {
        match self {
            Transform::Identity => Transform::Identity,
            Transform::SpecsToMarkdown => Transform::MarkdownToSpecs,
            Transform::MarkdownToSpecs => Transform::SpecsToMarkdown,
            Transform::SteeringToMarkdown => Transform::MarkdownToSteering,
            Transform::MarkdownToSteering => Transform::SteeringToMarkdown,
            Transform::HooksToCommands => Transform::CommandsToHooks,
            Transform::CommandsToHooks => Transform::HooksToCommands,
            Transform::RulesToInstructions => Transform::InstructionsToRules,
            Transform::InstructionsToRules => Transform::RulesToInstructions,
        }
    }

    /// Apply the transform. `Value::Null` means "nothing to write".
    pub fn apply(self, value: &Value) -> Result<Value> {
        match self {
            Transform::Identity => Ok(value.clone()),
            Transform::SpecsToMarkdown => {
                let specs: Vec<Spec> = self
                    .expect_array(value)?
                    .iter()
                    .filter_map(Spec::from_feature)
                    .collect();
                if specs.is_empty() {
                    return Ok(Value::Null);
                }
                Ok(Value::String(parser::render_specs(&specs)))
            }
            Transform::MarkdownToSpecs => {
                let specs = parser::parse_specs(self.expect_str(value)?);
                if specs.is_empty() {
                    return Ok(Value::Null);
                }
                Ok(Value::Array(specs.iter().map(Spec::to_feature).collect()))
            }
            Transform::SteeringToMarkdown => {
                if let Value::String(s) = value {
                    return Ok(Value::String(s.clone()));
                }
                let sections: Vec<SteeringSection> = self
                    .expect_array(value)?
                    .iter()
                    .filter_map(|v| serde_json::from_value(v.clone()).ok())
                    .collect();
                if sections.is_empty() {
                    return Ok(Value::Null);
                }
                Ok(Value::String(parser::render_steering(
                    CUSTOM_INSTRUCTIONS_TITLE,
                    &sections,
                )))
            }
            Transform::MarkdownToSteering => {
                let sections = parser::parse_steering(self.expect_str(value)?);
                if sections.is_empty() {
                    return Ok(Value::Null);
                }
                Ok(serde_json::to_value(sections)?)
            }
            Transform::HooksToCommands => {
                let hooks = self.expect_array(value)?;
                if hooks.is_empty() {
                    return Ok(Value::Null);
                }
                Ok(parser::commands_from_hooks(hooks))
            }
            Transform::CommandsToHooks => {
                if !(value.is_array() || value.is_object()) {
                    return Err(self.error("expected a command list or record map"));
                }
                let hooks = parser::hooks_from_commands(value);
                if hooks.is_empty() {
                    return Ok(Value::Null);
                }
                Ok(Value::Array(hooks))
            }
            Transform::RulesToInstructions => {
                let rules = self.expect_str(value)?.trim();
                if rules.is_empty() {
                    return Ok(Value::Null);
                }
                if has_top_level_heading(rules) {
                    return Ok(Value::String(format!("{rules}\n")));
                }
                Ok(Value::String(format!(
                    "# {PROJECT_INSTRUCTIONS_TITLE}\n\n{rules}\n"
                )))
            }
            Transform::InstructionsToRules => {
                let text = self.expect_str(value)?.trim();
                let title = format!("# {PROJECT_INSTRUCTIONS_TITLE}");
                let rules = text.strip_prefix(title.as_str()).unwrap_or(text).trim();
                if rules.is_empty() {
                    return Ok(Value::Null);
                }
                Ok(Value::String(rules.to_string()))
            }
        }
    }

    fn error(self, message: &str) -> TaptikError {
        TaptikError::Transform {
            transform: self.as_str().to_string(),
            message: message.to_string(),
        }
    }

    fn expect_array(self, value: &Value) -> Result<&Vec<Value>> {
        value
            .as_array()
            .ok_or_else(|| self.error(&format!("expected an array, got {}", kind(value))))
    }

    fn expect_str(self, value: &Value) -> Result<&str> {
        value
            .as_str()
            .ok_or_else(|| self.error(&format!("expected a string, got {}", kind(value))))
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl fmt::Display for Transform {
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
    use serde_json::json;

    #[test]
    fn inverse_is_an_involution() {
        for t in [
            Transform::Identity,
            Transform::SpecsToMarkdown,
            Transform::SteeringToMarkdown,
            Transform::HooksToCommands,
            Transform::RulesToInstructions,
        ] {
            assert_eq!(t.inverse().inverse(), t);
        }
    }

    #[test]
    fn specs_to_markdown_rejects_non_arrays() {
        let err = Transform::SpecsToMarkdown.apply(&json!("nope")).unwrap_err();
        assert!(err.to_string().contains("specs_to_markdown"));
    }

    #[test]
    fn empty_inputs_produce_nothing() {
        assert!(Transform::SpecsToMarkdown.apply(&json!([])).unwrap().is_null());
        assert!(Transform::SteeringToMarkdown.apply(&json!([])).unwrap().is_null());
        assert!(Transform::MarkdownToSteering.apply(&json!("  ")).unwrap().is_null());
        assert!(Transform::RulesToInstructions.apply(&json!("")).unwrap().is_null());
    }

    #[test]
    fn rules_gain_a_heading_once() {
        let out = Transform::RulesToInstructions
            .apply(&json!("Use tabs."))
            .unwrap();
        assert_eq!(out, json!("# Project Instructions\n\nUse tabs.\n"));
        assert!(has_top_level_heading(out.as_str().unwrap()));

        let back = Transform::InstructionsToRules.apply(&out).unwrap();
        assert_eq!(back, json!("Use tabs."));

        let titled = Transform::RulesToInstructions
            .apply(&json!("# Style\nUse tabs."))
            .unwrap();
        assert_eq!(titled, json!("# Style\nUse tabs.\n"));
    }

    #[test]
    fn heading_detection_ignores_subheadings() {
        assert!(!has_top_level_heading("## Only a section\ntext"));
        assert!(has_top_level_heading("intro\n# Title"));
    }

    #[test]
    fn serialized_as_identifier() {
        let json = serde_json::to_string(&Transform::MarkdownToSpecs).unwrap();
        assert_eq!(json, "\"markdown_to_specs\"");
    }
}
