use std::fmt;

use serde::{Deserialize, Serialize};

/// One operator's line in a rendered execution tree.
///
/// Operators fill in their name and their own items. The tree attaches the
/// node id and node-level items such as the limit and conjuncts afterwards,
/// so operator items always come first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplainEntry {
    pub name: String,
    /// Plan node id, set once the entry is attached to a node.
    pub node_id: Option<u32>,
    /// Items in insertion order.
    pub items: Vec<(String, ExplainValue)>,
}

impl ExplainEntry {
    pub fn new(name: impl Into<String>) -> Self {
        ExplainEntry {
            name: name.into(),
            node_id: None,
            items: Vec::new(),
        }
    }

    pub fn with_node_id(mut self, node_id: u32) -> Self {
        self.node_id = Some(node_id);
        self
    }

    pub fn with_value(self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.with_item(key.into(), ExplainValue::Value(value.to_string()))
    }

    pub fn with_values<S: fmt::Display>(
        self,
        key: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        let vals = values.into_iter().map(|s| s.to_string()).collect();
        self.with_item(key.into(), ExplainValue::Values(vals))
    }

    /// Get the value for a key.
    pub fn get(&self, key: &str) -> Option<&ExplainValue> {
        self.items.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Replaces an existing item in place, keeping its position.
    fn with_item(mut self, key: String, value: ExplainValue) -> Self {
        match self.items.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.items.push((key, value)),
        }
        self
    }
}

impl fmt::Display for ExplainEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(node_id) = self.node_id {
            write!(f, "[{node_id}]")?;
        }
        if !self.items.is_empty() {
            write!(f, " (")?;
            for (idx, (k, v)) in self.items.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{k} = {v}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExplainValue {
    Value(String),
    Values(Vec<String>),
}

impl fmt::Display for ExplainValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{v}"),
            Self::Values(v) => write!(f, "[{}]", v.join(", ")),
        }
    }
}

/// Configuration for producing an ExplainEntry for a node in a tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExplainConfig {
    pub verbose: bool,
}

impl ExplainConfig {
    pub const VERBOSE: Self = Self { verbose: true };
}

/// Trait for explaining a single operator in the tree.
pub trait Explainable {
    /// Create an ExplainEntry for this operator.
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry;
}
