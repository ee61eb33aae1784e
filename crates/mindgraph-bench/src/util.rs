use serde_json::{Map, Value, json};

/// Object document with `breadth` fields per level, `depth` levels deep. Leaves mix
/// strings, numbers and booleans.
pub fn synthetic_document(breadth: usize, depth: usize) -> Value {
    fn level(breadth: usize, remaining: usize, prefix: &str) -> Value {
        if remaining == 0 {
            return json!(format!("{prefix}_leaf"));
        }
        let mut fields = Map::new();
        for i in 0..breadth {
            let key = format!("{prefix}_{i}");
            let value = match i % 4 {
                0 => json!(i),
                1 => json!(i % 2 == 0),
                2 => Value::Array(
                    (0..breadth)
                        .map(|j| level(breadth, remaining - 1, &format!("{key}_{j}")))
                        .collect(),
                ),
                _ => level(breadth, remaining - 1, &key),
            };
            fields.insert(key, value);
        }
        Value::Object(fields)
    }
    level(breadth, depth, "n")
}

/// The synthetic document as input text.
pub fn synthetic_input(breadth: usize, depth: usize) -> String {
    serde_json::to_string(&synthetic_document(breadth, depth)).unwrap_or_default()
}
