//! Human-readable change summaries between two content objects.

use super::PromptContent;

const MAX_QUOTE_CHARS: usize = 60;

/// Describe what changed from `previous` to `next`.
///
/// Returns one line per change, or a single `"No changes"` line when the
/// two are equivalent once blank fields are treated as absent.
pub fn diff(previous: &PromptContent, next: &PromptContent) -> Vec<String> {
    let mut changes = Vec::new();

    changes.extend(text_change("role", previous.role(), next.role()));
    changes.extend(framework_change(previous.framework(), next.framework()));
    changes.extend(text_change("directive", previous.directive(), next.directive()));
    changes.extend(text_change("context", previous.context(), next.context()));

    let before: Vec<&str> = previous.guardrail_items().collect();
    let after: Vec<&str> = next.guardrail_items().collect();
    for added in after.iter().filter(|g| !before.contains(g)) {
        changes.push(format!("Added guardrail: \"{}\"", quote(added)));
    }
    for removed in before.iter().filter(|g| !after.contains(g)) {
        changes.push(format!("Removed guardrail: \"{}\"", quote(removed)));
    }

    for (key, value) in &next.metadata {
        match previous.metadata.get(key) {
            None => changes.push(format!("Added metadata '{}'", key)),
            Some(old) if old != value => changes.push(format!("Updated metadata '{}'", key)),
            _ => {}
        }
    }
    for key in previous.metadata.keys() {
        if !next.metadata.contains_key(key) {
            changes.push(format!("Removed metadata '{}'", key));
        }
    }

    if changes.is_empty() {
        changes.push("No changes".to_string());
    }
    changes
}

fn text_change(label: &str, before: Option<&str>, after: Option<&str>) -> Option<String> {
    match (before, after) {
        (None, Some(new)) => Some(format!("Added {} ({} chars)", label, char_len(new))),
        (Some(_), None) => Some(format!("Removed {}", label)),
        (Some(old), Some(new)) if old != new => Some(format!(
            "Rewrote {} ({} -> {} chars)",
            label,
            char_len(old),
            char_len(new)
        )),
        _ => None,
    }
}

fn framework_change(before: Option<&str>, after: Option<&str>) -> Option<String> {
    match (before, after) {
        (None, Some(new)) => Some(format!("Set framework to '{}'", new)),
        (Some(old), None) => Some(format!("Removed framework '{}'", old)),
        (Some(old), Some(new)) if old != new => {
            Some(format!("Changed framework from '{}' to '{}'", old, new))
        }
        _ => None,
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn quote(text: &str) -> String {
    if char_len(text) <= MAX_QUOTE_CHARS {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(MAX_QUOTE_CHARS).collect();
        format!("{}...", truncated)
    }
}
