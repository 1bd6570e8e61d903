//! `${step_N.path}` parameter substitution against prior step results.
//!
//! Only string values are scanned; everything else passes through
//! untouched. A token that resolves to nothing becomes the empty string and
//! is logged at warning level.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

lazy_static! {
    static ref TOKEN: Regex = Regex::new(r"\$\{step_(\d+)\.([^}]+)\}").unwrap();
}

/// Replace every `${step_N.path}` token in the map's string values with the
/// value navigated out of `results[N]`. A map with no tokens comes back
/// unchanged.
pub fn substitute(
    parameters: &Map<String, Value>,
    results: &HashMap<u32, Value>,
) -> Map<String, Value> {
    parameters
        .iter()
        .map(|(key, value)| (key.clone(), substitute_value(value, results)))
        .collect()
}

/// Step numbers referenced by tokens anywhere in the map. Used to infer
/// dependencies the plan did not declare.
pub fn referenced_steps(parameters: &Map<String, Value>) -> BTreeSet<u32> {
    let mut steps = BTreeSet::new();
    for value in parameters.values() {
        collect_refs(value, &mut steps);
    }
    steps
}

fn collect_refs(value: &Value, steps: &mut BTreeSet<u32>) {
    match value {
        Value::String(s) => {
            for capture in TOKEN.captures_iter(s) {
                if let Ok(step) = capture[1].parse() {
                    steps.insert(step);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_refs(item, steps)),
        Value::Object(map) => map.values().for_each(|item| collect_refs(item, steps)),
        _ => {}
    }
}

fn substitute_value(value: &Value, results: &HashMap<u32, Value>) -> Value {
    match value {
        Value::String(s) => Value::String(substitute_string(s, results)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| substitute_value(item, results))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), substitute_value(item, results)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn substitute_string(input: &str, results: &HashMap<u32, Value>) -> String {
    TOKEN
        .replace_all(input, |captures: &regex::Captures<'_>| {
            let step: u32 = match captures[1].parse() {
                Ok(step) => step,
                Err(_) => {
                    warn!(token = &captures[0], "unparseable step reference");
                    return String::new();
                }
            };
            let path = &captures[2];
            match results.get(&step).and_then(|root| navigate(root, path)) {
                Some(Value::String(s)) => s.clone(),
                Some(value) => value.to_string(),
                None => {
                    warn!(step, path, "substitution token resolved to nothing");
                    String::new()
                }
            }
        })
        .into_owned()
}

/// Navigate a dot-separated path with optional `[idx]` suffixes, e.g.
/// `databases[0].name`.
pub fn navigate<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        let (field, indexes) = parse_segment(segment)?;
        if !field.is_empty() {
            current = current.get(field)?;
        }
        for index in indexes {
            current = current.get(index)?;
        }
    }
    Some(current)
}

/// Split `name[0][1]` into the field name and its index chain.
fn parse_segment(segment: &str) -> Option<(&str, Vec<usize>)> {
    match segment.find('[') {
        None => Some((segment, Vec::new())),
        Some(start) => {
            let field = &segment[..start];
            let mut indexes = Vec::new();
            let mut rest = &segment[start..];
            while let Some(stripped) = rest.strip_prefix('[') {
                let end = stripped.find(']')?;
                indexes.push(stripped[..end].parse().ok()?);
                rest = &stripped[end + 1..];
            }
            if rest.is_empty() {
                Some((field, indexes))
            } else {
                None
            }
        }
    }
}
