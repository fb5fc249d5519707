//! Wildcard event keys.
//!
//! Event keys may be shell-style patterns (`*button* pressed`, `f? pressed`,
//! `[a-z] pressed`). An exact key always wins; otherwise patterns are tried in a
//! fixed priority order:
//!
//! 1. keys with a bracket class, in reverse lexicographic order
//! 2. keys with `*` or `?`, longest first (ties keep insertion order)
//!
//! The catch-all key [`ANY_EVENT`] is simply the shortest `*` pattern, so it acts
//! as the per-state default rule.

use crate::domain::Event;
use glob::Pattern;

/// Event key matching every event; registers a per-state default rule.
pub const ANY_EVENT: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatternKind {
    Literal,
    Bracket,
    Wildcard,
}

fn classify(key: &str) -> PatternKind {
    let has_class = key
        .find('[')
        .and_then(|open| key[open + 1..].find(']').map(|len| len > 0))
        .unwrap_or(false);

    if has_class {
        PatternKind::Bracket
    } else if key.contains(['*', '?']) {
        PatternKind::Wildcard
    } else {
        PatternKind::Literal
    }
}

/// Returns whether `key` would be treated as a pattern rather than a literal.
#[must_use]
pub fn is_pattern(key: &str) -> bool {
    classify(key) != PatternKind::Literal
}

/// Compiles `key`, folding runs of `*` into one so `**` behaves like `*`
/// instead of being rejected as a misplaced recursive wildcard.
fn compile(key: &str) -> Result<Pattern, glob::PatternError> {
    let mut folded = String::with_capacity(key.len());
    for c in key.chars() {
        if !(c == '*' && folded.ends_with('*')) {
            folded.push(c);
        }
    }
    Pattern::new(&folded)
}

/// Compiled wildcard keys of one state, in match priority order.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventPatterns {
    compiled: Vec<(Event, Pattern)>,
}

impl EventPatterns {
    pub(crate) fn build<'a>(keys: impl IntoIterator<Item = &'a Event>) -> Self {
        let mut brackets = Vec::new();
        let mut wildcards = Vec::new();

        for key in keys {
            match classify(key.as_str()) {
                PatternKind::Literal => {}
                PatternKind::Bracket => brackets.push(key),
                PatternKind::Wildcard => wildcards.push(key),
            }
        }

        brackets.sort_by(|a, b| b.cmp(a));
        wildcards.sort_by(|a, b| b.as_str().len().cmp(&a.as_str().len()));

        let compiled = brackets
            .into_iter()
            .chain(wildcards)
            .filter_map(|key| match compile(key.as_str()) {
                Ok(pattern) => Some((key.clone(), pattern)),
                Err(e) => {
                    tracing::warn!(event_key = %key, error = %e, "event key is not a valid pattern, matching literally");
                    None
                }
            })
            .collect();

        Self { compiled }
    }

    /// Returns the highest-priority key matching `event`.
    pub(crate) fn find(&self, event: &Event) -> Option<&Event> {
        self.compiled
            .iter()
            .find(|(_, pattern)| pattern.matches(event.as_str()))
            .map(|(key, _)| key)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.compiled.len()
    }
}
