//! Helpers for path strings and node naming.
//!
//! Node paths are plain `/`-joined data names (`$people/42/name`); these
//! helpers build and take them apart without going through the compiler.

use serde_json::Value;

/// Append `name` to `parent`.
///
/// # Example
///
/// ```
/// use datastore_path::child_path;
///
/// assert_eq!(child_path("$people", "42"), "$people/42");
/// assert_eq!(child_path("", "albums"), "albums");
/// ```
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        return name.to_string();
    }
    let mut out = String::with_capacity(parent.len() + name.len() + 1);
    out.push_str(parent);
    out.push('/');
    out.push_str(name);
    out
}

/// Path of the parent node, or `None` for a single-segment path.
///
/// # Example
///
/// ```
/// use datastore_path::parent_path;
///
/// assert_eq!(parent_path("$people/42/name"), Some("$people/42"));
/// assert_eq!(parent_path("$people"), None);
/// ```
pub fn parent_path(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

/// Split a node path into its segments, skipping empty pieces.
pub fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// The path itself followed by each ancestor, nearest first.
///
/// # Example
///
/// ```
/// use datastore_path::ancestors;
///
/// assert_eq!(ancestors("a/b/c"), vec!["a/b/c", "a/b", "a"]);
/// ```
pub fn ancestors(path: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut current = Some(path).filter(|p| !p.is_empty());
    while let Some(p) = current {
        out.push(p);
        current = parent_path(p);
    }
    out
}

/// Whether the path starts at a registered source.
pub fn is_absolute(path: &str) -> bool {
    path.starts_with('$')
}

/// Data name of the element at `index` in a list without ids: `[index]`.
pub fn position_name(index: usize) -> String {
    format!("[{}]", index)
}

/// Parse a positional name (`[3]`) back into its index.
pub fn parse_position(name: &str) -> Option<usize> {
    let digits = name.strip_prefix('[')?.strip_suffix(']')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Parse a bare non-negative integer (`3`), no leading zeros.
pub fn parse_index(name: &str) -> Option<usize> {
    let bytes = name.as_bytes();
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    if bytes.len() > 1 && bytes[0] == b'0' {
        return None;
    }
    name.parse().ok()
}

/// Key addressed by an attribute name (`@width` → `width`).
pub fn attribute_key(name: &str) -> Option<&str> {
    name.strip_prefix('@').filter(|key| !key.is_empty() && *key != "*")
}

/// The `id` of a list element, for elements that carry one.
pub fn element_id(value: &Value) -> Option<String> {
    value.get("id").and_then(id_string)
}

/// Interpret a value as an element id.
///
/// Strings are used as-is and integers are formatted; anything else has no
/// id.
pub fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(n.to_string()),
        _ => None,
    }
}

/// Data name of a list element: its id, or its position.
pub fn element_name(value: &Value, index: usize) -> String {
    element_id(value).unwrap_or_else(|| position_name(index))
}

/// Whether a JSON value becomes a container node (map or list).
pub fn is_composite(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}
