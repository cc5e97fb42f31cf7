use pullexec::arrays::row_batch::RowBatch;
use pullexec::arrays::scalar::{Row, ScalarValue};
use pullexec::config::execution::ExecutionConfig;
use pullexec::execution::builder::{DefaultNodeFactory, build_tree};
use pullexec::execution::sink::CollectingSink;
use pullexec::execution::executor::QueryExecutor;
use pullexec::execution::tree::ExecTree;
use pullexec::plan::QueryPlan;
use pullexec::runtime::state::RuntimeState;
use pullexec_error::ErrorKind;
use serde_json::json;

fn int_rows(n: i64) -> Vec<Row> {
    (0..n).map(|i| vec![ScalarValue::Int64(i)]).collect()
}

fn plan_json(nodes: serde_json::Value) -> QueryPlan {
    let plan = json!({
        "desc_tbl": {
            "tuples": [{"id": 0, "slot_types": ["int64"]}]
        },
        "nodes": nodes,
    });
    QueryPlan::from_json(&plan.to_string()).unwrap()
}

fn state(batch_size: usize) -> RuntimeState {
    RuntimeState::new(ExecutionConfig {
        batch_size,
        ..Default::default()
    })
    .unwrap()
}

/// Pull from the root until end of stream, returning (rows, eos) per call.
fn pull(tree: &mut ExecTree, state: &RuntimeState) -> Vec<(Vec<Row>, bool)> {
    tree.prepare(state).unwrap();
    tree.open(state).unwrap();

    let mut calls = Vec::new();
    loop {
        let mut batch = RowBatch::new(state.batch_size());
        let eos = tree.get_next(state, &mut batch).unwrap();
        calls.push((batch.take_rows(), eos));
        if eos {
            return calls;
        }
    }
}

#[test]
fn single_scan_returns_all_rows() {
    for batch_size in [1, 3, 7, 64] {
        let plan = plan_json(json!([
            {"node_id": 0, "node_type": "memory_scan", "num_children": 0,
             "row_tuples": [0], "params": {"rows": int_rows(20)}}
        ]));
        let mut tree = build_tree(&plan, &DefaultNodeFactory).unwrap();
        let state = state(batch_size);

        let calls = pull(&mut tree, &state);
        let rows: Vec<Row> = calls.into_iter().flat_map(|(rows, _)| rows).collect();
        assert_eq!(int_rows(20), rows, "batch_size: {batch_size}");

        tree.close(&state).unwrap();
    }
}

#[test]
fn filter_with_limit_stops_at_limit() {
    let plan = plan_json(json!([
        {"node_id": 0, "node_type": "select", "num_children": 1, "limit": 3,
         "row_tuples": [0],
         "conjuncts": [{
             "type": "comparison",
             "op": "gt",
             "left": {"type": "column", "idx": 0},
             "right": {"type": "literal", "value": {"int64": 5}}
         }]},
        {"node_id": 1, "node_type": "memory_scan", "num_children": 0,
         "row_tuples": [0], "params": {"rows": int_rows(100)}}
    ]));

    for batch_size in [1, 2, 3, 1024] {
        let mut tree = build_tree(&plan, &DefaultNodeFactory).unwrap();
        let state = state(batch_size);

        let calls = pull(&mut tree, &state);
        let rows: Vec<Row> = calls.iter().flat_map(|(rows, _)| rows.clone()).collect();
        assert_eq!(
            vec![
                vec![ScalarValue::Int64(6)],
                vec![ScalarValue::Int64(7)],
                vec![ScalarValue::Int64(8)],
            ],
            rows
        );

        // End of stream is set on the call producing the third row.
        let (last_rows, last_eos) = calls.last().unwrap();
        assert!(last_eos);
        assert!(!last_rows.is_empty());

        tree.close(&state).unwrap();
        tree.close(&state).unwrap();
    }
}

#[test]
fn render_matches_plan_order() {
    let plan = plan_json(json!([
        {"node_id": 4, "node_type": "union", "num_children": 3, "row_tuples": [0]},
        {"node_id": 2, "node_type": "select", "num_children": 1, "row_tuples": [0]},
        {"node_id": 9, "node_type": "memory_scan", "num_children": 0, "row_tuples": [0],
         "params": {"rows": []}},
        {"node_id": 1, "node_type": "empty", "num_children": 0, "row_tuples": [0]},
        {"node_id": 7, "node_type": "union", "num_children": 1, "row_tuples": [0]},
        {"node_id": 3, "node_type": "empty", "num_children": 0, "row_tuples": [0]}
    ]));
    let tree = build_tree(&plan, &DefaultNodeFactory).unwrap();

    let rendered = tree.debug_string();
    let ids: Vec<u32> = rendered
        .lines()
        .map(|line| {
            let start = line.find('[').unwrap() + 1;
            let end = line.find(']').unwrap();
            line[start..end].parse().unwrap()
        })
        .collect();
    let expected: Vec<u32> = plan.nodes.iter().map(|n| n.node_id).collect();
    assert_eq!(expected, ids);

    let depths: Vec<usize> = rendered
        .lines()
        .map(|line| (line.len() - line.trim_start().len()) / 2)
        .collect();
    assert_eq!(vec![0, 1, 2, 1, 1, 2], depths);
}

#[test]
fn malformed_plans_are_corrupt() {
    let cases = [
        json!([]),
        json!([{"node_id": 0, "node_type": "select", "num_children": 1, "row_tuples": [0]}]),
        json!([
            {"node_id": 0, "node_type": "union", "num_children": 2, "row_tuples": [0]},
            {"node_id": 1, "node_type": "empty", "num_children": 0, "row_tuples": [0]}
        ]),
        json!([{"node_id": 0, "node_type": "sort", "num_children": 0, "row_tuples": [0]}]),
        json!([{"node_id": 0, "node_type": "empty", "num_children": 0, "limit": -5}]),
    ];

    for nodes in cases {
        let plan = plan_json(nodes.clone());
        let err = build_tree(&plan, &DefaultNodeFactory).unwrap_err();
        assert_eq!(ErrorKind::CorruptPlan, err.kind(), "nodes: {nodes}");
    }

    let err = QueryPlan::from_json("{\"nodes\": [").unwrap_err();
    assert_eq!(ErrorKind::CorruptPlan, err.kind());
}

#[test]
fn executor_runs_plan() {
    let plan = plan_json(json!([
        {"node_id": 0, "node_type": "union", "num_children": 2, "row_tuples": [0], "limit": 15},
        {"node_id": 1, "node_type": "memory_scan", "num_children": 0, "row_tuples": [0],
         "params": {"rows": int_rows(10)}},
        {"node_id": 2, "node_type": "memory_scan", "num_children": 0, "row_tuples": [0],
         "params": {"rows": int_rows(10)}}
    ]));
    let config = ExecutionConfig {
        batch_size: 4,
        ..Default::default()
    };
    let mut executor = QueryExecutor::try_new(&plan, &DefaultNodeFactory, config).unwrap();
    assert_eq!(2, executor.scan_sources().len());

    let mut sink = CollectingSink::new();
    executor.execute(&mut sink).unwrap();
    assert_eq!(15, sink.rows().len());
    assert!(sink.is_finalized());

    let profile = executor.profile_snapshot();
    assert_eq!(Some(15), profile.children[0].counter_value("RowsReturned"));
}
