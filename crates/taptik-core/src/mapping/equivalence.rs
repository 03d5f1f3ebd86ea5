use serde_json::Value;

/// Comparison used when deciding whether a round trip preserved a feature.
pub trait Equivalence {
    fn equivalent(&self, a: &Value, b: &Value) -> bool;
}

/// Loose structural equality.
///
/// Arrays compare as unordered multisets of their JSON-encoded elements,
/// objects compare key by key, strings compare with whitespace collapsed.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralEquivalence;

/// Exact JSON equality.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictEquivalence;

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Equivalence for StructuralEquivalence {
    fn equivalent(&self, a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Array(x), Value::Array(y)) => {
                if x.len() != y.len() {
                    return false;
                }
                let mut xs: Vec<String> = x.iter().map(Value::to_string).collect();
                let mut ys: Vec<String> = y.iter().map(Value::to_string).collect();
                xs.sort();
                ys.sort();
                xs == ys
            }
            (Value::Object(x), Value::Object(y)) => {
                let mut xk: Vec<&String> = x.keys().collect();
                let mut yk: Vec<&String> = y.keys().collect();
                xk.sort();
                yk.sort();
                xk == yk && xk.iter().all(|k| self.equivalent(&x[k.as_str()], &y[k.as_str()]))
            }
            (Value::String(x), Value::String(y)) => collapse_whitespace(x) == collapse_whitespace(y),
            _ => a == b,
        }
    }
}

impl Equivalence for StrictEquivalence {
    fn equivalent(&self, a: &Value, b: &Value) -> bool {
        a == b
    }
}
