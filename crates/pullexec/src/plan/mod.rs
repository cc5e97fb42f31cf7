//! Serialized plan description consumed by the tree builder.
//!
//! A plan is a flat list of node descriptors in depth-first pre-order. Each
//! descriptor declares how many immediate children it has; no parent/child
//! pointers are encoded.

pub mod descriptors;

use descriptors::{DescriptorTable, TupleId};
use pullexec_error::{DbError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::expr::PhysicalScalarExpression;

/// Serialized limit value meaning "no limit".
pub const NO_LIMIT: i64 = -1;

fn default_limit() -> i64 {
    NO_LIMIT
}

/// Serialized representation of a single operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNodeDescriptor {
    /// Identifier unique within the plan.
    pub node_id: u32,
    /// Tag selecting the operator implementation.
    pub node_type: String,
    /// Number of immediate children following this node in the serialized
    /// list.
    pub num_children: usize,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub conjuncts: Vec<PhysicalScalarExpression>,
    /// Tuples making up the output row of this node.
    #[serde(default)]
    pub row_tuples: Vec<TupleId>,
    /// Operator-specific parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl PlanNodeDescriptor {
    pub fn new(node_id: u32, node_type: impl Into<String>, num_children: usize) -> Self {
        PlanNodeDescriptor {
            node_id,
            node_type: node_type.into(),
            num_children,
            limit: NO_LIMIT,
            conjuncts: Vec::new(),
            row_tuples: Vec::new(),
            params: serde_json::Value::Null,
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_conjuncts(
        mut self,
        conjuncts: impl IntoIterator<Item = PhysicalScalarExpression>,
    ) -> Self {
        self.conjuncts = conjuncts.into_iter().collect();
        self
    }

    pub fn with_row_tuples(mut self, tuples: impl IntoIterator<Item = TupleId>) -> Self {
        self.row_tuples = tuples.into_iter().collect();
        self
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    /// Decode the serialized limit.
    pub fn decoded_limit(&self) -> Result<Option<u64>> {
        match self.limit {
            NO_LIMIT => Ok(None),
            limit if limit < 0 => Err(DbError::corrupt_plan("Invalid limit")
                .with_field("node_id", self.node_id)
                .with_field("limit", limit)),
            limit => Ok(Some(limit as u64)),
        }
    }

    /// Decode operator parameters into a concrete type.
    pub fn decode_params<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.params.clone()).map_err(|e| {
            DbError::with_source("Failed to decode operator parameters", Box::new(e))
                .into_kind(pullexec_error::ErrorKind::CorruptPlan)
                .with_field("node_id", self.node_id)
                .with_field("node_type", &self.node_type)
        })
    }
}

/// A complete serialized plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    #[serde(default)]
    pub desc_tbl: DescriptorTable,
    /// Nodes in depth-first pre-order.
    pub nodes: Vec<PlanNodeDescriptor>,
}

impl QueryPlan {
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use pullexec_error::ErrorKind;
    use serde_json::json;

    use super::*;

    #[test]
    fn limit_sentinel() {
        let desc = PlanNodeDescriptor::new(0, "empty", 0);
        assert_eq!(None, desc.decoded_limit().unwrap());

        let desc = desc.with_limit(0);
        assert_eq!(Some(0), desc.decoded_limit().unwrap());

        let err = desc.with_limit(-4).decoded_limit().unwrap_err();
        assert_eq!(ErrorKind::CorruptPlan, err.kind());
    }

    #[test]
    fn plan_from_json_defaults() {
        let plan = QueryPlan::from_json(
            r#"{
                "desc_tbl": {"tuples": [{"id": 0, "slot_types": ["int64"]}]},
                "nodes": [
                    {"node_id": 1, "node_type": "select", "num_children": 1, "row_tuples": [0]},
                    {"node_id": 2, "node_type": "empty", "num_children": 0, "limit": 3, "row_tuples": [0]}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(2, plan.nodes.len());
        assert_eq!(NO_LIMIT, plan.nodes[0].limit);
        assert_eq!(Some(3), plan.nodes[1].decoded_limit().unwrap());
        assert!(plan.nodes[0].conjuncts.is_empty());
    }

    #[test]
    fn malformed_json_is_corrupt_plan() {
        let err = QueryPlan::from_json("{\"nodes\": 4}").unwrap_err();
        assert_eq!(ErrorKind::CorruptPlan, err.kind());
    }

    #[test]
    fn decode_params_error_kind() {
        #[derive(Debug, Deserialize)]
        struct Params {
            _rows: Vec<u32>,
        }

        let desc = PlanNodeDescriptor::new(4, "x", 0).with_params(json!({"other": 1}));
        let err = desc.decode_params::<Params>().unwrap_err();
        assert_eq!(ErrorKind::CorruptPlan, err.kind());
        assert_eq!(Some("4"), err.get_field("node_id"));
    }
}
