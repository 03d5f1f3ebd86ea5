use crate::mapping::table::{FeatureMapping, MappingTable};
use crate::types::Platform;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// MappingResult
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingResult {
    pub mapped_features: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unmapped_features: Vec<String>,
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// Resolve a dotted path inside `value`.
pub fn get_path<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.')
        .filter(|seg| !seg.is_empty())
        .try_fold(value, |v, seg| v.get(seg))
}

/// Write `value` at a dotted path, creating intermediate objects.
pub fn set_path(map: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    let Some(last) = segments.pop() else {
        return;
    };
    let mut cursor = map;
    for seg in segments {
        let slot = cursor
            .entry(seg.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(next) = slot else {
            return;
        };
        cursor = next;
    }
    cursor.insert(last.to_string(), value);
}

// ---------------------------------------------------------------------------
// FeatureMapper
// ---------------------------------------------------------------------------

/// Applies mapping tables to feature-level data.
#[derive(Debug, Clone, Copy)]
pub struct FeatureMapper<'t> {
    table: &'t MappingTable,
}

impl FeatureMapper<'static> {
    pub fn builtin() -> Self {
        Self::new(MappingTable::builtin())
    }
}

impl<'t> FeatureMapper<'t> {
    pub fn new(table: &'t MappingTable) -> Self {
        Self { table }
    }

    pub fn map_features(&self, data: &Value, source: Platform, target: Platform) -> MappingResult {
        let mappings = self.table.get_mappings(source, target);
        tracing::debug!(%source, %target, mappings = mappings.len(), "mapping features");
        Self::apply(data, &mappings)
    }

    /// Run `mappings` over `data`. A failing transform only costs its own
    /// feature: it is reported in `warnings` and the pass continues.
    pub fn apply(data: &Value, mappings: &[FeatureMapping]) -> MappingResult {
        let mut result = MappingResult::default();

        for m in mappings {
            let Some(value) = get_path(data, &m.source.path).filter(|v| !v.is_null()) else {
                continue;
            };
            let mapped = match m.target.transform {
                None => value.clone(),
                Some(t) => match t.apply(value) {
                    Ok(v) => v,
                    Err(e) => {
                        tracing::warn!(feature = %m.source.feature, error = %e, "transform failed");
                        result
                            .warnings
                            .push(format!("{}: {e}", m.source.feature));
                        continue;
                    }
                },
            };
            if mapped.is_null() {
                continue;
            }
            set_path(&mut result.mapped_features, &m.target.path, mapped);
        }

        let consumed: BTreeSet<&str> = mappings
            .iter()
            .filter_map(|m| m.source.path.split('.').next())
            .collect();
        if let Value::Object(obj) = data {
            result.unmapped_features = obj
                .iter()
                .filter(|(k, v)| !v.is_null() && !consumed.contains(k.as_str()))
                .map(|(k, _)| k.clone())
                .collect();
        }

        result
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
