use serde_json::Value;

/// Largest accepted serialized size, in bytes.
pub const MAX_SERIALIZED_BYTES: usize = 1024 * 1024;

/// Deepest accepted container nesting.
pub const MAX_DEPTH: usize = 10;

/// Accept `value` only if it serializes to at most 1 MiB and nests no more
/// than [`MAX_DEPTH`] containers deep.
pub fn validate_structured_size(value: &Value) -> bool {
    if capped_depth(value, 0) > MAX_DEPTH {
        return false;
    }
    match serde_json::to_vec(value) {
        Ok(bytes) => bytes.len() <= MAX_SERIALIZED_BYTES,
        Err(_) => false,
    }
}

/// Parse JSON text and run it through [`validate_structured_size`].
///
/// `None` covers both malformed input and oversized values.
pub fn safe_parse(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(validate_structured_size)
}

/// Number of nested containers, stopping as soon as the walk passes
/// [`MAX_DEPTH`]. Scalars count 0, `[]` counts 1.
fn capped_depth(value: &Value, depth: usize) -> usize {
    if depth > MAX_DEPTH {
        return depth;
    }
    let deepest = match value {
        Value::Array(items) => items.iter().map(|c| capped_depth(c, depth + 1)).max(),
        Value::Object(map) => map.values().map(|c| capped_depth(c, depth + 1)).max(),
        _ => return depth,
    };
    deepest.unwrap_or(depth + 1).max(depth + 1)
}
