//! Structural search over untyped document trees.
//!
//! Depth-first, source order, first match wins. The search is pure so it can
//! be exercised against literal JSON fixtures.

use crate::match_spec::MatchSpec;
use serde_json::Value;

/// Deepest node (root = 0) the matcher will examine.
pub const MAX_DEPTH: usize = 64;

/// Result of locating a spec inside a document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Located<'a> {
    /// A node with every required key whose identity predicate holds.
    Matched(&'a Value),
    /// No full match, but a node with the required keys failed the identity
    /// predicate. Carries the first such node.
    IdentityMismatch(&'a Value),
    /// Nothing with the required keys.
    Absent,
}

impl<'a> Located<'a> {
    pub fn matched(self) -> Option<&'a Value> {
        match self {
            Self::Matched(node) => Some(node),
            _ => None,
        }
    }
}

/// Find the first node matching `spec`, or `None`.
pub fn find<'a>(root: &'a Value, spec: &MatchSpec) -> Option<&'a Value> {
    locate(root, spec).matched()
}

/// Find the first node matching `spec`, remembering identity mismatches.
pub fn locate<'a>(root: &'a Value, spec: &MatchSpec) -> Located<'a> {
    let mut mismatch = None;
    match walk(root, spec, 0, &mut mismatch) {
        Some(node) => Located::Matched(node),
        None => match mismatch {
            Some(node) => Located::IdentityMismatch(node),
            None => Located::Absent,
        },
    }
}

fn walk<'a>(
    node: &'a Value,
    spec: &MatchSpec,
    depth: usize,
    mismatch: &mut Option<&'a Value>,
) -> Option<&'a Value> {
    if depth > MAX_DEPTH {
        return None;
    }
    match node {
        Value::Object(map) => {
            if spec.has_required_keys(map) {
                match &spec.predicate {
                    Some(p) if !p.holds(node) => {
                        mismatch.get_or_insert(node);
                    }
                    _ => return Some(node),
                }
            }
            map.values()
                .filter(|child| is_container(child))
                .find_map(|child| walk(child, spec, depth + 1, mismatch))
        }
        Value::Array(items) => items
            .iter()
            .filter(|child| is_container(child))
            .find_map(|child| walk(child, spec, depth + 1, mismatch)),
        _ => None,
    }
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}
