//! Description of the data shape that identifies a job's target content.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Keys every post object carries in embedded page data.
pub const POST_KEYS: [&str; 3] = ["pk", "user", "caption"];

/// Substring present in every embedded data block that holds a thread.
pub const THREAD_MARKER: &str = "thread_items";

/// Immutable match description, supplied once per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSpec {
    /// Keys a node must contain to be a candidate.
    pub required_keys: Vec<String>,
    /// Optional identity check applied to a candidate.
    pub predicate: Option<ValuePredicate>,
    /// Substrings a raw block must contain before it is worth parsing.
    pub required_substrings: Vec<String>,
}

/// Requires the value at `path` (object keys, outermost first) to equal `expected`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuePredicate {
    pub path: Vec<String>,
    pub expected: Value,
}

impl ValuePredicate {
    /// Build a predicate from a dotted path such as `user.username`.
    pub fn new(dotted_path: &str, expected: impl Into<Value>) -> Self {
        Self {
            path: dotted_path
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            expected: expected.into(),
        }
    }

    /// Resolve the predicate path inside `node`.
    pub fn resolve<'a>(&self, node: &'a Value) -> Option<&'a Value> {
        self.path
            .iter()
            .try_fold(node, |current, key| current.as_object()?.get(key))
    }

    /// Whether `node` satisfies the predicate.
    pub fn holds(&self, node: &Value) -> bool {
        self.resolve(node) == Some(&self.expected)
    }

    /// The expected value as searchable text.
    pub fn needle(&self) -> String {
        match &self.expected {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl MatchSpec {
    /// A spec that only requires `keys`.
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_keys: keys.into_iter().map(Into::into).collect(),
            predicate: None,
            required_substrings: Vec::new(),
        }
    }

    /// Add an identity predicate.
    pub fn requiring(mut self, predicate: ValuePredicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Add a pre-filter substring.
    pub fn containing(mut self, substring: impl Into<String>) -> Self {
        self.required_substrings.push(substring.into());
        self
    }

    /// Spec for a post authored by `username`.
    pub fn post_by(username: &str) -> Self {
        Self::with_keys(POST_KEYS)
            .requiring(ValuePredicate::new("user.username", username))
            .containing(THREAD_MARKER)
    }

    /// Whether an object node carries every required key.
    pub fn has_required_keys(&self, node: &serde_json::Map<String, Value>) -> bool {
        self.required_keys.iter().all(|k| node.contains_key(k))
    }

    /// Cheap textual check run before parsing a raw block.
    ///
    /// The block must contain every required substring and, when an identity
    /// predicate is set, the expected identity text.
    pub fn prefilter(&self, raw: &str) -> bool {
        if !self.required_substrings.iter().all(|s| raw.contains(s.as_str())) {
            return false;
        }
        match &self.predicate {
            Some(p) => raw.contains(p.needle().as_str()),
            None => true,
        }
    }

    /// Identity text this spec looks for, if any.
    pub fn identity(&self) -> Option<String> {
        self.predicate.as_ref().map(ValuePredicate::needle)
    }
}
