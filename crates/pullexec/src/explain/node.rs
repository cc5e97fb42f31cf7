use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::explainable::{ExplainConfig, ExplainEntry, Explainable};
use crate::execution::node::NodeHandle;
use crate::execution::tree::ExecTree;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExplainNode {
    pub entry: ExplainEntry,
    pub children: Vec<ExplainNode>,
}

impl ExplainNode {
    pub fn from_tree(tree: &ExecTree, config: ExplainConfig) -> Self {
        Self::walk(tree, config, tree.root())
    }

    fn walk(tree: &ExecTree, config: ExplainConfig, handle: NodeHandle) -> Self {
        let node = match tree.node(handle) {
            Some(node) => node,
            None => {
                return ExplainNode {
                    entry: ExplainEntry::new("INVALID"),
                    children: Vec::new(),
                };
            }
        };

        let base = node.base();
        let mut entry = node
            .operator()
            .explain_entry(config)
            .with_node_id(base.id());
        if let Some(limit) = base.limit() {
            entry = entry.with_value("limit", limit);
        }
        if !base.conjuncts().is_empty() {
            entry = entry.with_values("conjuncts", base.conjuncts());
        }
        if config.verbose {
            entry = entry
                .with_value("row", base.row_desc())
                .with_value("lifecycle", node.lifecycle());
            if !base.conjuncts().is_empty() {
                entry = entry.with_value("compiled", base.evaluator().is_compiled());
            }
        }

        let children = base
            .children()
            .iter()
            .map(|&child| Self::walk(tree, config, child))
            .collect();

        ExplainNode { entry, children }
    }

    /// Render as text, one line per node in depth-first pre-order with two
    /// spaces of indentation per level.
    pub fn render(&self) -> String {
        let mut buf = String::new();
        self.render_inner(&mut buf, 0);
        buf
    }

    fn render_inner(&self, buf: &mut String, depth: usize) {
        // Writing to a string can't fail.
        let _ = writeln!(buf, "{:indent$}{}", "", self.entry, indent = depth * 2);
        for child in &self.children {
            child.render_inner(buf, depth + 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explain::explainable::ExplainValue;
    use crate::testutil::{
        EventLog,
        build_test_tree,
        col_gt,
        memory_scan_desc,
        select_desc,
        test_rows,
        test_state,
    };

    #[test]
    fn verbose_adds_node_state() {
        let log = EventLog::default();
        let mut tree = build_test_tree(
            &[
                select_desc(0, [col_gt(1)]),
                memory_scan_desc(1, test_rows(3)),
            ],
            &log,
        )
        .unwrap();
        tree.prepare(&test_state()).unwrap();

        let plain = ExplainNode::from_tree(&tree, ExplainConfig::default());
        assert_eq!(Some(0), plain.entry.node_id);
        assert_eq!(None, plain.entry.get("lifecycle"));

        let verbose = ExplainNode::from_tree(&tree, ExplainConfig::VERBOSE);
        assert_eq!(
            Some(&ExplainValue::Value("true".to_string())),
            verbose.entry.get("compiled")
        );
        assert!(verbose.entry.get("lifecycle").is_some());
        assert_eq!(Some(1), verbose.children[0].entry.node_id);
        assert_eq!(None, verbose.children[0].entry.get("compiled"));
    }
}
