//! Config template placeholder substitution
//!
//! Runs locally, before anything is encoded or sent. Substitution is a single
//! left-to-right pass over the template: at each position the earliest
//! matching key wins (ties go to the key listed first) and the scan resumes
//! after the replaced key, so replacement values are never expanded again.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::Substitutions;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{[^{}]*\}\}").expect("placeholder pattern"));

/// Template after substitution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedConfig {
    /// Processed body
    pub body: String,
    /// Placeholder tokens still present in the body, in order of first
    /// appearance
    pub unreplaced: Vec<String>,
}

/// Apply `substitutions` to `template` and scan for leftover placeholders
#[must_use]
pub fn render(template: &str, substitutions: &Substitutions) -> RenderedConfig {
    let body = substitute(template, substitutions);
    let unreplaced = unreplaced(&body);
    RenderedConfig { body, unreplaced }
}

/// Replace every literal occurrence of each key in one pass
#[must_use]
pub fn substitute(template: &str, substitutions: &Substitutions) -> String {
    let keys: Vec<(&str, &str)> = substitutions.iter().filter(|(k, _)| !k.is_empty()).collect();

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    loop {
        // min_by_key keeps the first of equal positions, i.e. mapping order
        let next = keys
            .iter()
            .filter_map(|(key, value)| rest.find(key).map(|pos| (pos, *key, *value)))
            .min_by_key(|(pos, _, _)| *pos);

        match next {
            Some((pos, key, value)) => {
                out.push_str(&rest[..pos]);
                out.push_str(value);
                rest = &rest[pos + key.len()..];
            }
            None => {
                out.push_str(rest);
                break;
            }
        }
    }

    out
}

/// Distinct `{{...}}` tokens in `body`, in order of first appearance
#[must_use]
pub fn unreplaced(body: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for m in PLACEHOLDER.find_iter(body) {
        if !found.iter().any(|t| t == m.as_str()) {
            found.push(m.as_str().to_string());
        }
    }
    found
}
