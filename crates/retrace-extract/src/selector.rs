//! Selector synthesis
//!
//! Produces a single selector for a registered node using a fixed priority
//! ladder: accessibility attributes, form attributes, stable data attributes,
//! non-generated ids, non-generated classes, and finally a structural
//! `nth-child` path. Generated-looking identifiers (mixed letters and digits,
//! CSS-in-JS hashes, utility classes) are rejected along the way.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::registry::DomRegistry;

const MAX_DATA_ATTR_VALUE_LEN: usize = 50;

static HASH_CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]+-[a-f0-9]{6,}$").expect("hash class regex"));
static CSS_IN_JS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^css-[a-z0-9]+$").expect("css-in-js regex"));
static MINIFIED_CLASS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^_[a-zA-Z0-9]+$").expect("minified class regex"));
static MANY_DIGITS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[0-9]{3,}").expect("digit run regex"));

const UTILITY_PREFIXES: &[&str] = &[
    "m-", "p-", "text-", "bg-", "flex", "grid", "w-", "h-", "d-", "col-",
];

/// Dynamic-identifier heuristic: a token containing both letters and digits
/// is treated as generated.
pub fn is_dynamic_token(token: &str) -> bool {
    let has_letter = token.chars().any(|c| c.is_alphabetic());
    let has_digit = token.chars().any(|c| c.is_numeric());
    has_letter && has_digit
}

/// Escape a value for use inside a single-quoted CSS attribute selector.
pub fn escape_attr_value(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

fn attr_str<'a>(attrs: &'a serde_json::Map<String, Value>, key: &str) -> Option<&'a str> {
    attrs.get(key).and_then(Value::as_str).filter(|v| !v.is_empty())
}

/// Run the attribute portion of the ladder (priorities 1-5). Returns `None`
/// if no attribute yields a usable selector.
pub fn attribute_selector(
    tag: &str,
    attrs: &serde_json::Map<String, Value>,
) -> Option<String> {
    let tag = tag.to_lowercase();

    // Priority 1: accessibility attributes.
    for key in ["aria-label", "aria-placeholder", "role"] {
        if let Some(value) = attr_str(attrs, key) {
            return Some(format!("{}[{}='{}']", tag, key, escape_attr_value(value)));
        }
    }

    // Priority 2: form attributes.
    for key in ["name", "placeholder", "title"] {
        if let Some(value) = attr_str(attrs, key) {
            return Some(format!("{}[{}='{}']", tag, key, escape_attr_value(value)));
        }
    }

    // Priority 3: stable data attributes.
    for (key, value) in attrs {
        if !key.starts_with("data-") || is_dynamic_token(key) {
            continue;
        }
        if let Some(value) = value.as_str() {
            if !value.is_empty() && value.len() <= MAX_DATA_ATTR_VALUE_LEN {
                return Some(format!("{}[{}='{}']", tag, key, escape_attr_value(value)));
            }
        }
    }

    // Priority 4: id, unless it looks generated.
    if let Some(id) = attr_str(attrs, "id") {
        if !is_dynamic_token(id) {
            return Some(format!("#{}", id));
        }
    }

    // Priority 5: first class that survives the dynamic-class filters.
    if let Some(class) = attr_str(attrs, "class") {
        if let Some(stable) = pick_static_class(class) {
            return Some(format!(".{}", stable));
        }
    }

    None
}

/// Find a non-generated class in a whitespace-separated class string.
fn pick_static_class(class_attr: &str) -> Option<String> {
    for class in class_attr.split_whitespace() {
        if class.is_empty() {
            continue;
        }
        let dynamic = HASH_CLASS_RE.is_match(class)
            || CSS_IN_JS_RE.is_match(class)
            || MINIFIED_CLASS_RE.is_match(class)
            || MANY_DIGITS_RE.is_match(class)
            || UTILITY_PREFIXES
                .iter()
                .any(|prefix| class.starts_with(prefix));
        if !dynamic && class.len() > 2 && class.len() < 30 {
            return Some(class.to_string());
        }
    }
    None
}

/// Synthesize a selector for a registered node: attribute ladder first, then
/// the structural `nth-child` path.
pub fn synthesize(registry: &DomRegistry, node_id: i64) -> Option<String> {
    let node = registry.get(node_id)?;
    if let Some(selector) = attribute_selector(&node.tag, &node.attributes) {
        return Some(selector);
    }
    Some(structural_path(registry, node_id))
}

/// Build `<ancestor> > <tag>:nth-child(<index>)` recursively, terminating at
/// `html` or `body`. The index is the 1-based position among all siblings in
/// the parent's ordered child list.
fn structural_path(registry: &DomRegistry, node_id: i64) -> String {
    let tag = registry
        .get(node_id)
        .map(|node| node.tag.to_lowercase())
        .filter(|tag| !tag.is_empty())
        .unwrap_or_else(|| "*".to_string());

    if tag == "html" || tag == "body" {
        return tag;
    }

    let Some(parent_id) = registry.parent_of(node_id) else {
        return tag;
    };

    let index = registry
        .children_of(parent_id)
        .iter()
        .position(|id| *id == node_id)
        .map(|position| position + 1)
        .unwrap_or(1);

    format!(
        "{} > {}:nth-child({})",
        structural_path(registry, parent_id),
        tag,
        index
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use retrace_core::SerializedNode;
    use serde_json::json;

    fn attrs(pairs: &[(&str, &str)]) -> serde_json::Map<String, Value> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), json!(value)))
            .collect()
    }

    #[test]
    fn dynamic_token_needs_letters_and_digits() {
        assert!(is_dynamic_token("btn-a7f3d2"));
        assert!(is_dynamic_token("x1"));
        assert!(!is_dynamic_token("submit"));
        assert!(!is_dynamic_token("12345"));
        assert!(!is_dynamic_token(""));
    }

    #[test]
    fn accessibility_attributes_win() {
        let selector = attribute_selector(
            "INPUT",
            &attrs(&[("aria-label", "Search"), ("name", "q"), ("id", "search")]),
        );
        assert_eq!(selector.as_deref(), Some("input[aria-label='Search']"));
    }

    #[test]
    fn form_attributes_beat_id() {
        let selector = attribute_selector("input", &attrs(&[("name", "q"), ("id", "search")]));
        assert_eq!(selector.as_deref(), Some("input[name='q']"));
    }

    #[test]
    fn data_attribute_requires_stable_key_and_short_value() {
        let selector = attribute_selector("button", &attrs(&[("data-testid", "submit-btn")]));
        assert_eq!(selector.as_deref(), Some("button[data-testid='submit-btn']"));

        // Mixed-alphanumeric data key is treated as generated.
        let selector = attribute_selector("button", &attrs(&[("data-v2x", "ok")]));
        assert!(selector.is_none());

        let long_value = "x".repeat(60);
        let selector =
            attribute_selector("button", &attrs(&[("data-state", long_value.as_str())]));
        assert!(selector.is_none());
    }

    #[test]
    fn stable_id_is_used_dynamic_id_is_rejected() {
        assert_eq!(
            attribute_selector("button", &attrs(&[("id", "submit")])).as_deref(),
            Some("#submit")
        );
        assert!(attribute_selector("button", &attrs(&[("id", "btn-a7f3d2")])).is_none());
    }

    #[test]
    fn class_filters_reject_generated_names() {
        assert_eq!(pick_static_class("search-box"), Some("search-box".into()));
        assert_eq!(pick_static_class("css-1n5ry8e search-box"), Some("search-box".into()));
        assert_eq!(pick_static_class("btn-a7f3d2e"), None);
        assert_eq!(pick_static_class("_abc123x"), None);
        assert_eq!(pick_static_class("item12345"), None);
        assert_eq!(pick_static_class("text-sm bg-white flex"), None);
        // Too short and too long both fail.
        assert_eq!(pick_static_class("ab"), None);
        let long = "a".repeat(30);
        assert_eq!(pick_static_class(&long), None);
    }

    #[test]
    fn attr_values_are_escaped() {
        let selector = attribute_selector("a", &attrs(&[("aria-label", "it's \\here")]));
        assert_eq!(selector.as_deref(), Some("a[aria-label='it\\'s \\\\here']"));
    }

    #[test]
    fn structural_fallback_builds_nth_child_path() {
        let mut registry = DomRegistry::new();
        let tree = SerializedNode {
            id: 1,
            tag_name: "body".to_string(),
            child_nodes: vec![
                SerializedNode {
                    id: 2,
                    tag_name: "div".to_string(),
                    ..Default::default()
                },
                SerializedNode {
                    id: 3,
                    tag_name: "div".to_string(),
                    child_nodes: vec![SerializedNode {
                        id: 4,
                        tag_name: "button".to_string(),
                        attributes: attrs(&[("id", "btn-a7f3d2"), ("class", "css-x1y2z3")]),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        registry.register(&tree, 0);

        // Generated id and class both rejected, so the ladder bottoms out in
        // the structural path.
        let selector = synthesize(&registry, 4).unwrap();
        assert_eq!(selector, "body > div:nth-child(2) > button:nth-child(1)");
    }

    #[test]
    fn synthesize_prefers_attributes_over_structure() {
        let mut registry = DomRegistry::new();
        let tree = SerializedNode {
            id: 1,
            tag_name: "body".to_string(),
            child_nodes: vec![SerializedNode {
                id: 2,
                tag_name: "button".to_string(),
                attributes: attrs(&[("id", "submit")]),
                ..Default::default()
            }],
            ..Default::default()
        };
        registry.register(&tree, 0);
        assert_eq!(synthesize(&registry, 2).as_deref(), Some("#submit"));
    }
}
