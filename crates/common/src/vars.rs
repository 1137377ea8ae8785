//! Placeholder substitution for mocked JSON payloads
//!
//! Fixture bodies may contain `${name}` tokens which are filled in from
//! per-test bindings before the body is handed to the browser. A string that
//! consists of a single token is replaced by the bound value itself, so a
//! fixture can receive typed fields (numbers, booleans, nested objects).
//! Tokens embedded in longer strings are replaced by the bound value's text
//! form.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

/// Bindings from placeholder name to replacement value
pub type Variables = serde_json::Map<String, Value>;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").expect("placeholder pattern is valid"));

/// Return a copy of `value` with every `${name}` token substituted from `vars`.
///
/// Unbound names are reported with a warning and left verbatim in the output.
pub fn replace_variables(value: &Value, vars: &Variables) -> Value {
    match value {
        Value::String(text) => replace_in_text(text, vars),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| replace_variables(item, vars))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), replace_variables(item, vars)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn replace_in_text(text: &str, vars: &Variables) -> Value {
    let mut seen: Vec<&str> = Vec::new();
    let mut result: Option<String> = None;

    for caps in PLACEHOLDER.captures_iter(text) {
        let token = caps.get(0).map_or("", |m| m.as_str());
        let name = caps.get(1).map_or("", |m| m.as_str());
        if seen.contains(&name) {
            continue;
        }
        seen.push(name);

        match vars.get(name) {
            Some(bound) if token.len() == text.len() => return bound.clone(),
            Some(bound) => {
                let current = result.get_or_insert_with(|| text.to_string());
                *current = current.replace(token, &text_form(bound));
            }
            None => {
                warn!(variable = name, "Variable '{}' not found in variables object", name);
            }
        }
    }

    Value::String(result.unwrap_or_else(|| text.to_string()))
}

/// Text inserted for a bound value embedded in a longer string.
///
/// Arrays are joined with `,` (a `null` element contributes nothing) and
/// whole-number floats drop their fractional part. Objects are written as
/// compact JSON.
fn text_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => number_text(n),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => text_form(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

fn number_text(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e21 => {
            if f == 0.0 {
                "0".to_string()
            } else {
                format!("{:.0}", f)
            }
        }
        _ => n.to_string(),
    }
}

/// Names of all placeholders still present anywhere in `value`, sorted
pub fn unresolved_placeholders(value: &Value) -> Vec<String> {
    let mut names = BTreeSet::new();
    collect_placeholders(value, &mut names);
    names.into_iter().collect()
}

fn collect_placeholders(value: &Value, names: &mut BTreeSet<String>) {
    match value {
        Value::String(text) => {
            for caps in PLACEHOLDER.captures_iter(text) {
                if let Some(name) = caps.get(1) {
                    names.insert(name.as_str().to_string());
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_placeholders(item, names)),
        Value::Object(map) => map.values().for_each(|item| collect_placeholders(item, names)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(value: Value) -> Variables {
        match value {
            Value::Object(map) => map,
            _ => panic!("bindings must be an object"),
        }
    }

    #[test]
    fn test_plain_tree_is_unchanged() {
        let tree = json!({
            "id": 7,
            "name": "report",
            "flags": [true, false, null],
            "cost": "$5 or {braces}",
            "nested": { "list": ["a", "b"] }
        });
        assert_eq!(replace_variables(&tree, &vars(json!({"x": 1}))), tree);
        assert_eq!(replace_variables(&tree, &Variables::new()), tree);
    }

    #[test]
    fn test_exact_match_keeps_type() {
        let bindings = vars(json!({"x": 42, "flag": true, "obj": {"a": [1]}}));
        assert_eq!(replace_variables(&json!("${x}"), &bindings), json!(42));
        assert_eq!(replace_variables(&json!("${flag}"), &bindings), json!(true));
        assert_eq!(replace_variables(&json!("${obj}"), &bindings), json!({"a": [1]}));
    }

    #[test]
    fn test_embedded_placeholder_becomes_text() {
        let bindings = vars(json!({"x": "mid"}));
        assert_eq!(
            replace_variables(&json!("prefix-${x}-suffix"), &bindings),
            json!("prefix-mid-suffix")
        );
    }

    #[test]
    fn test_multiple_identifiers_are_coerced() {
        let bindings = vars(json!({"x": 1, "y": 2}));
        assert_eq!(replace_variables(&json!("${x}-${y}"), &bindings), json!("1-2"));
    }

    #[test]
    fn test_repeated_identifier_replaced_everywhere() {
        let bindings = vars(json!({"id": 3}));
        assert_eq!(
            replace_variables(&json!("/items/${id}/copy/${id}"), &bindings),
            json!("/items/3/copy/3")
        );
    }

    #[test]
    fn test_missing_identifier_left_verbatim() {
        let out = replace_variables(&json!("${missing}"), &Variables::new());
        assert_eq!(out, json!("${missing}"));
        assert_eq!(unresolved_placeholders(&out), vec!["missing".to_string()]);
    }

    #[test]
    fn test_missing_does_not_block_other_identifiers() {
        let bindings = vars(json!({"b": "B"}));
        assert_eq!(
            replace_variables(&json!("${a}/${b}"), &bindings),
            json!("${a}/B")
        );
    }

    #[test]
    fn test_malformed_placeholders_pass_through() {
        let bindings = vars(json!({"x": 1}));
        for text in ["$x", "${}", "${a-b}", "$ {x}", "{x}"] {
            assert_eq!(replace_variables(&json!(text), &bindings), json!(text));
        }
    }

    #[test]
    fn test_recursive_walk() {
        let bindings = vars(json!({"x": "Z"}));
        let input = json!({"a": "${x}", "b": [1, "${x}"]});
        assert_eq!(
            replace_variables(&input, &bindings),
            json!({"a": "Z", "b": [1, "Z"]})
        );
    }

    #[test]
    fn test_non_string_embedded_values() {
        let bindings = vars(json!({"n": null, "list": [1, 2], "ok": false, "obj": {"a": 1}}));
        assert_eq!(
            replace_variables(&json!("${n}|${list}|${ok}|${obj}"), &bindings),
            json!("null|1,2|false|{\"a\":1}")
        );
    }

    #[test]
    fn test_nested_arrays_flatten_in_text() {
        let bindings = vars(json!({"list": [[1, 2], null, "x"]}));
        assert_eq!(replace_variables(&json!("L=${list}"), &bindings), json!("L=1,2,,x"));
    }

    #[test]
    fn test_whole_floats_drop_fraction() {
        let bindings = vars(json!({"f": 1.0, "g": 2.5, "z": -0.0, "big": 1e20}));
        assert_eq!(
            replace_variables(&json!("${f} ${g} ${z} ${big}"), &bindings),
            json!("1 2.5 0 100000000000000000000")
        );
    }

    #[test]
    fn test_input_not_mutated() {
        let input = json!(["${x}"]);
        let snapshot = input.clone();
        let _ = replace_variables(&input, &vars(json!({"x": 1})));
        assert_eq!(input, snapshot);
    }

    #[test]
    fn test_unresolved_placeholders_deduplicated() {
        let tree = json!({"a": "${b} ${a}", "c": ["${a}"], "d": 1});
        assert_eq!(
            unresolved_placeholders(&tree),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
