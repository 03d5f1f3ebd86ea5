use crate::error::TaptikError;
use crate::mapping::equivalence::{Equivalence, StructuralEquivalence};
use crate::mapping::mapper::{get_path, FeatureMapper};
use crate::mapping::table::{FeatureMapping, MappingTable};
use crate::mapping::transform::{has_top_level_heading, Transform};
use crate::types::Platform;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

// ---------------------------------------------------------------------------
// MergeStrategy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Last write wins.
    #[default]
    Replace,
    /// Shallow-merge objects, concatenate arrays.
    Merge,
    /// Concatenate arrays, join strings with a blank line, otherwise pair up.
    Append,
}

impl MergeStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            MergeStrategy::Replace => "replace",
            MergeStrategy::Merge => "merge",
            MergeStrategy::Append => "append",
        }
    }

    pub fn merge(self, existing: Value, incoming: Value) -> Value {
        match (self, existing, incoming) {
            (MergeStrategy::Replace, _, incoming) => incoming,
            (MergeStrategy::Merge, Value::Object(mut a), Value::Object(b)) => {
                a.extend(b);
                Value::Object(a)
            }
            (MergeStrategy::Merge | MergeStrategy::Append, Value::Array(mut a), Value::Array(b)) => {
                a.extend(b);
                Value::Array(a)
            }
            (MergeStrategy::Merge, _, incoming) => incoming,
            (MergeStrategy::Append, Value::String(a), Value::String(b)) => {
                Value::String(format!("{a}\n\n{b}"))
            }
            (MergeStrategy::Append, existing, incoming) => Value::Array(vec![existing, incoming]),
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MergeStrategy {
    type Err = TaptikError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(MergeStrategy::Replace),
            "merge" => Ok(MergeStrategy::Merge),
            "append" => Ok(MergeStrategy::Append),
            _ => Err(TaptikError::InvalidMergeStrategy(s.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Options / result
// ---------------------------------------------------------------------------

/// Caller-supplied per-feature transform, applied after the table transform.
pub type CustomTransform = Box<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

#[derive(Default)]
pub struct ReverseMapOptions {
    pub merge_strategy: MergeStrategy,
    /// Keyed by target feature name.
    pub custom_transforms: BTreeMap<String, CustomTransform>,
    pub validate_integrity: bool,
    /// Target features that already exist; merge policies apply against them.
    pub existing: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverseMetadata {
    pub original_platform: Platform,
    pub target_platform: Platform,
    pub timestamp: DateTime<Utc>,
    /// Advisory: the round trip preserved every critical feature.
    pub reversible: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReverseMappingResult {
    pub mapped_features: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmapped_features: Vec<String>,
    pub reversed_features: Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub conflicts: BTreeMap<String, String>,
    pub metadata: ReverseMetadata,
}

// ---------------------------------------------------------------------------
// Integrity
// ---------------------------------------------------------------------------

fn every_element(value: &Value, check: impl Fn(&Value) -> bool) -> bool {
    value.as_array().is_some_and(|items| items.iter().all(check))
}

fn has_str(value: &Value, key: &str) -> bool {
    value.get(key).is_some_and(Value::is_string)
}

fn has_name(value: &Value) -> bool {
    value
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|n| !n.trim().is_empty())
}

/// Structural check of one feature in `platform`'s model. Unknown
/// platform/feature combinations pass.
pub fn validate_feature_integrity(
    platform: Platform,
    feature: &str,
    value: &Value,
) -> Result<(), String> {
    let ok = match (platform, feature) {
        (Platform::Kiro, "specs") => every_element(value, |s| {
            has_name(s) && ["design", "requirements", "tasks"].iter().any(|k| has_str(s, k))
        }),
        (Platform::Kiro, "steering") => every_element(value, |s| has_name(s) && has_str(s, "content")),
        (Platform::Kiro, "hooks") => every_element(value, |h| has_name(h) && has_str(h, "command")),
        (Platform::ClaudeCode, "instructions") => {
            value.as_str().is_some_and(has_top_level_heading)
        }
        (Platform::ClaudeCode, "custom_instructions") => value.is_string(),
        (Platform::ClaudeCode, "commands") => value.get("commands").is_some_and(Value::is_array),
        (Platform::Cursor, "rules") => value.as_str().is_some_and(|s| !s.trim().is_empty()),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(format!(
            "{feature} does not match the {} structure",
            platform.display_name()
        ))
    }
}

fn is_present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| match v {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => true,
    })
}

// ---------------------------------------------------------------------------
// ReverseMappingService
// ---------------------------------------------------------------------------

pub struct ReverseMappingService<'t> {
    table: &'t MappingTable,
    cache: HashMap<String, Vec<FeatureMapping>>,
    equivalence: Box<dyn Equivalence + Send + Sync>,
}

impl ReverseMappingService<'static> {
    /// Initialized service over the builtin mapping table.
    pub fn builtin() -> Self {
        Self::initialized(MappingTable::builtin())
    }
}

impl<'t> ReverseMappingService<'t> {
    /// An empty service. Call [`initialize`](Self::initialize) before use;
    /// until then `reverse_map` falls back to forward mappings.
    pub fn new(table: &'t MappingTable) -> Self {
        Self {
            table,
            cache: HashMap::new(),
            equivalence: Box::new(StructuralEquivalence),
        }
    }

    pub fn initialized(table: &'t MappingTable) -> Self {
        let mut service = Self::new(table);
        service.initialize();
        service
    }

    /// Swap the comparison used by the reversibility check.
    pub fn with_equivalence(mut self, equivalence: impl Equivalence + Send + Sync + 'static) -> Self {
        self.equivalence = Box::new(equivalence);
        self
    }

    pub fn cache_key(source: Platform, target: Platform) -> String {
        format!("{source}-to-{target}")
    }

    /// Derive reverse mappings for every ordered platform pair from the
    /// bidirectional forward mappings.
    pub fn initialize(&mut self) {
        for &a in Platform::all() {
            for &b in Platform::all() {
                if a == b {
                    continue;
                }
                let reversed: Vec<FeatureMapping> = self
                    .table
                    .get_mappings(a, b)
                    .iter()
                    .filter(|m| m.bidirectional)
                    .map(|m| m.reversed(reverse_transform(m)))
                    .collect();
                if !reversed.is_empty() {
                    self.cache.insert(Self::cache_key(b, a), reversed);
                }
            }
        }
        tracing::debug!(pairs = self.cache.len(), "reverse mappings initialized");
    }

    /// Drop and rebuild the cache.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.initialize();
    }

    pub fn is_initialized(&self) -> bool {
        !self.cache.is_empty()
    }

    pub fn reverse_mappings(&self, source: Platform, target: Platform) -> Option<&[FeatureMapping]> {
        self.cache
            .get(&Self::cache_key(source, target))
            .map(Vec::as_slice)
    }

    pub fn reverse_map(
        &self,
        data: &Value,
        source: Platform,
        target: Platform,
        options: &ReverseMapOptions,
    ) -> ReverseMappingResult {
        let mappings = match self.reverse_mappings(source, target) {
            Some(m) => m.to_vec(),
            None => {
                tracing::debug!(%source, %target, "no reverse mappings cached; using forward mappings");
                self.table.get_mappings(source, target)
            }
        };
        let base = FeatureMapper::apply(data, &mappings);

        let mut reversed = options.existing.clone().unwrap_or_default();
        let mut conflicts = BTreeMap::new();

        for (feature, value) in &base.mapped_features {
            let value = match options.custom_transforms.get(feature) {
                Some(custom) => match custom(value) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(%feature, error = %e, "custom transform failed");
                        conflicts.insert(feature.clone(), e);
                        continue;
                    }
                },
                None => value.clone(),
            };
            let merged = match reversed.remove(feature) {
                Some(existing) => options.merge_strategy.merge(existing, value),
                None => value,
            };
            reversed.insert(feature.clone(), merged);
        }

        if options.validate_integrity {
            for (feature, value) in &reversed {
                if let Err(msg) = validate_feature_integrity(target, feature, value) {
                    tracing::warn!(%feature, %target, "integrity check failed");
                    conflicts.insert(feature.clone(), msg);
                }
            }
        }

        let reversible = self.check_reversibility(data, &reversed, source, target);

        ReverseMappingResult {
            mapped_features: base.mapped_features,
            warnings: base.warnings,
            unmapped_features: base.unmapped_features,
            reversed_features: reversed,
            conflicts,
            metadata: ReverseMetadata {
                original_platform: source,
                target_platform: target,
                timestamp: Utc::now(),
                reversible,
            },
        }
    }

    /// Map `reversed` back from `target` to `source` and compare the source
    /// platform's critical features with the original input. Advisory only.
    pub fn check_reversibility(
        &self,
        original: &Value,
        reversed: &Map<String, Value>,
        source: Platform,
        target: Platform,
    ) -> bool {
        let roundtrip = FeatureMapper::new(self.table).map_features(
            &Value::Object(reversed.clone()),
            target,
            source,
        );
        if !roundtrip.warnings.is_empty() {
            return false;
        }
        source.critical_features().iter().all(|feature| {
            let before = is_present(get_path(original, feature));
            let after = is_present(roundtrip.mapped_features.get(*feature));
            match (before, after) {
                (None, None) => true,
                (Some(a), Some(b)) => self.equivalence.equivalent(a, b),
                _ => false,
            }
        })
    }
}

/// Transform installed on a reversed mapping. Features with a dedicated
/// parser get it; shared shapes pass through; anything else inverts the
/// forward transform.
fn reverse_transform(forward: &FeatureMapping) -> Option<Transform> {
    match forward.source.feature.as_str() {
        "specs" => Some(Transform::MarkdownToSpecs),
        "steering" => Some(Transform::MarkdownToSteering),
        "hooks" => Some(Transform::CommandsToHooks),
        "mcp_servers" => None,
        _ => forward.target.transform.map(Transform::inverse),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::equivalence::StrictEquivalence;
    use serde_json::json;

    #[test]
    fn cache_holds_swapped_bidirectional_mappings() {
        let service = ReverseMappingService::builtin();
        let mappings = service
            .reverse_mappings(Platform::ClaudeCode, Platform::Kiro)
            .unwrap();
        let pairs: Vec<_> = mappings
            .iter()
            .map(|m| (m.source.feature.as_str(), m.target.feature.as_str(), m.target.transform))
            .collect();
        assert!(pairs.contains(&("instructions", "specs", Some(Transform::MarkdownToSpecs))));
        assert!(pairs.contains(&("commands", "hooks", Some(Transform::CommandsToHooks))));
        assert!(pairs.contains(&("mcp_servers", "mcp_servers", None)));
        // project_settings is one-way
        assert!(!pairs.iter().any(|(s, _, _)| *s == "settings"));
    }

    #[test]
    fn clear_cache_rebuilds() {
        let mut service = ReverseMappingService::new(MappingTable::builtin());
        assert!(!service.is_initialized());
        service.initialize();
        let before = service.reverse_mappings(Platform::Kiro, Platform::Cursor).unwrap().to_vec();
        service.clear_cache();
        assert_eq!(
            service.reverse_mappings(Platform::Kiro, Platform::Cursor).unwrap(),
            before.as_slice()
        );
    }

    #[test]
    fn uninitialized_service_uses_forward_mappings() {
        let service = ReverseMappingService::new(MappingTable::builtin());
        let result = service.reverse_map(
            &json!({"instructions": "## Auth\n### Tasks\nLogin"}),
            Platform::ClaudeCode,
            Platform::Kiro,
            &ReverseMapOptions::default(),
        );
        assert_eq!(result.reversed_features["specs"][0]["tasks"], "Login");
    }

    #[test]
    fn single_spec_roundtrip_is_reversible() {
        let service = ReverseMappingService::builtin();
        let data = json!({"specs": [{
            "name": "Checkout",
            "design": "Event sourced cart",
            "requirements": "Pay with card",
            "tasks": "Build cart service"
        }]});
        let result = service.reverse_map(
            &data,
            Platform::Kiro,
            Platform::ClaudeCode,
            &ReverseMapOptions {
                validate_integrity: true,
                ..Default::default()
            },
        );
        let instructions = result.reversed_features["instructions"].as_str().unwrap();
        assert!(instructions.contains("### Design\nEvent sourced cart"));
        assert!(result.conflicts.is_empty());
        assert!(result.metadata.reversible);
        assert_eq!(result.metadata.original_platform, Platform::Kiro);
    }

    #[test]
    fn lossy_roundtrip_is_not_reversible() {
        let service = ReverseMappingService::builtin();
        // Claude instructions with prose outside any section cannot survive Kiro specs.
        let data = json!({"instructions": "# Guide\n\nIntro prose.\n\n## Auth\n### Tasks\nLogin"});
        let result = service.reverse_map(
            &data,
            Platform::ClaudeCode,
            Platform::Kiro,
            &ReverseMapOptions::default(),
        );
        assert!(!result.metadata.reversible);
    }

    #[test]
    fn strict_equivalence_is_pluggable() {
        let service = ReverseMappingService::builtin().with_equivalence(StrictEquivalence);
        // Rendering trims the trailing newline.
        let data = json!({"rules": "Use tabs.\n"});
        let result = service.reverse_map(
            &data,
            Platform::Cursor,
            Platform::ClaudeCode,
            &ReverseMapOptions::default(),
        );
        assert!(!result.metadata.reversible);

        let loose = ReverseMappingService::builtin().reverse_map(
            &data,
            Platform::Cursor,
            Platform::ClaudeCode,
            &ReverseMapOptions::default(),
        );
        assert!(loose.metadata.reversible);
    }

    #[test]
    fn custom_transform_failure_becomes_conflict() {
        let service = ReverseMappingService::builtin();
        let mut options = ReverseMapOptions::default();
        options.custom_transforms.insert(
            "specs".into(),
            Box::new(|_| Err("refusing specs".to_string())),
        );
        options
            .custom_transforms
            .insert("mcp_servers".into(), Box::new(|v| Ok(json!({"wrapped": v}))));
        let result = service.reverse_map(
            &json!({"instructions": "## A\n### Design\nD", "mcp_servers": []}),
            Platform::ClaudeCode,
            Platform::Kiro,
            &options,
        );
        assert_eq!(result.conflicts["specs"], "refusing specs");
        assert!(!result.reversed_features.contains_key("specs"));
    }

    #[test]
    fn merge_strategies() {
        let r = MergeStrategy::Replace.merge(json!([1]), json!([2]));
        assert_eq!(r, json!([2]));

        let m = MergeStrategy::Merge.merge(json!({"a": 1, "b": 1}), json!({"b": 2}));
        assert_eq!(m, json!({"a": 1, "b": 2}));
        assert_eq!(MergeStrategy::Merge.merge(json!([1]), json!([2])), json!([1, 2]));

        assert_eq!(MergeStrategy::Append.merge(json!([1]), json!([2])), json!([1, 2]));
        assert_eq!(MergeStrategy::Append.merge(json!("a"), json!("b")), json!("a\n\nb"));
        assert_eq!(MergeStrategy::Append.merge(json!(1), json!("b")), json!([1, "b"]));
    }

    #[test]
    fn existing_features_are_merged() {
        let service = ReverseMappingService::builtin();
        let mut existing = Map::new();
        existing.insert(
            "steering".into(),
            json!([{"name": "old", "content": "Keep me."}]),
        );
        let result = service.reverse_map(
            &json!({"custom_instructions": "## new\n\nAdd me."}),
            Platform::ClaudeCode,
            Platform::Kiro,
            &ReverseMapOptions {
                merge_strategy: MergeStrategy::Append,
                existing: Some(existing),
                ..Default::default()
            },
        );
        let names: Vec<_> = result.reversed_features["steering"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["old", "new"]);
    }

    #[test]
    fn integrity_flags_but_keeps_feature() {
        let service = ReverseMappingService::builtin();
        let result = service.reverse_map(
            &json!({"instructions": "## Only a name"}),
            Platform::ClaudeCode,
            Platform::Kiro,
            &ReverseMapOptions {
                validate_integrity: true,
                ..Default::default()
            },
        );
        assert!(result.conflicts.contains_key("specs"));
        assert_eq!(result.reversed_features["specs"][0]["name"], "Only a name");
    }

    #[test]
    fn integrity_rules() {
        use Platform::*;
        assert!(validate_feature_integrity(Kiro, "hooks", &json!([{"name": "a", "command": "b"}])).is_ok());
        assert!(validate_feature_integrity(Kiro, "hooks", &json!([{"name": "a"}])).is_err());
        assert!(validate_feature_integrity(Kiro, "steering", &json!("text")).is_err());
        assert!(validate_feature_integrity(ClaudeCode, "instructions", &json!("no heading")).is_err());
        assert!(validate_feature_integrity(ClaudeCode, "commands", &json!({"commands": []})).is_ok());
        assert!(validate_feature_integrity(ClaudeCode, "custom_instructions", &json!(3)).is_err());
        assert!(validate_feature_integrity(Cursor, "rules", &json!("  ")).is_err());
        assert!(validate_feature_integrity(Cursor, "anything", &json!(null)).is_ok());
    }
}
