use pullexec_error::{DbError, Result};
use serde::{Deserialize, Serialize};

use super::{ExecOperator, ScanRange, ScanSource};
use crate::arrays::row_batch::RowBatch;
use crate::arrays::scalar::Row;
use crate::execution::context::ExecContext;
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryScanParams {
    pub rows: Vec<Row>,
}

/// Scan over rows held in memory.
///
/// Rows are loaded on open and retained by the operator until close. Output
/// batches receive copies, so nothing is attached to their pools.
#[derive(Debug)]
pub struct PhysicalMemoryScan {
    rows: Vec<Row>,
    /// Ranges assigned by the scheduler. Empty means scan everything.
    ranges: Vec<ScanRange>,
    state: Option<ScanState>,
}

#[derive(Debug)]
struct ScanState {
    loaded: Vec<Row>,
    loaded_bytes: usize,
    ranges: Vec<ScanRange>,
    range_idx: usize,
    /// Position within the current range.
    pos: usize,
}

impl ScanState {
    fn next_row_idx(&mut self) -> Option<usize> {
        loop {
            let range = self.ranges.get(self.range_idx)?;
            if self.pos < range.len {
                let idx = range.offset + self.pos;
                self.pos += 1;
                return Some(idx);
            }
            self.range_idx += 1;
            self.pos = 0;
        }
    }

    fn exhausted(&self) -> bool {
        self.ranges
            .iter()
            .skip(self.range_idx)
            .enumerate()
            .all(|(i, range)| if i == 0 { self.pos >= range.len } else { range.len == 0 })
    }
}

impl PhysicalMemoryScan {
    pub fn new(rows: Vec<Row>) -> Self {
        PhysicalMemoryScan {
            rows,
            ranges: Vec::new(),
            state: None,
        }
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }
}

impl ExecOperator for PhysicalMemoryScan {
    fn operator_name(&self) -> &'static str {
        "MemoryScan"
    }

    fn prepare(&mut self, cx: &mut ExecContext) -> Result<()> {
        if cx.num_children() != 0 {
            return Err(DbError::initialization("Memory scan cannot have children"));
        }
        for row in &self.rows {
            cx.row_desc().check_row(row).map_err(|e| {
                DbError::initialization("Memory scan row does not match row descriptor")
                    .with_field("error", e)
            })?;
        }
        Ok(())
    }

    fn open(&mut self, cx: &mut ExecContext) -> Result<()> {
        let loaded = self.rows.clone();
        let loaded_bytes: usize = loaded
            .iter()
            .flat_map(|row| row.iter())
            .map(|v| v.size_bytes())
            .sum();
        cx.mem_tracker()?.consume(loaded_bytes);

        let ranges = if self.ranges.is_empty() {
            vec![ScanRange {
                offset: 0,
                len: loaded.len(),
            }]
        } else {
            self.ranges.clone()
        };

        self.state = Some(ScanState {
            loaded,
            loaded_bytes,
            ranges,
            range_idx: 0,
            pos: 0,
        });

        Ok(())
    }

    fn get_next(&mut self, cx: &mut ExecContext, batch: &mut RowBatch) -> Result<bool> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| DbError::new("Memory scan not opened"))?;

        cx.check_cancelled()?;

        while !batch.at_capacity() {
            let idx = match state.next_row_idx() {
                Some(idx) => idx,
                None => return Ok(true),
            };
            let row = &state.loaded[idx];
            if cx.eval_conjuncts(row)? {
                batch.push_row(row.clone())?;
            }
        }

        Ok(state.exhausted())
    }

    fn close(&mut self, cx: &mut ExecContext) -> Result<()> {
        if let Some(state) = self.state.take() {
            cx.mem_tracker()?.release(state.loaded_bytes);
        }
        Ok(())
    }

    fn is_scan_source(&self) -> bool {
        true
    }

    fn as_scan_source_mut(&mut self) -> Option<&mut dyn ScanSource> {
        Some(self)
    }
}

impl ScanSource for PhysicalMemoryScan {
    fn input_len(&self) -> usize {
        self.rows.len()
    }

    fn set_scan_ranges(&mut self, ranges: Vec<ScanRange>) -> Result<()> {
        if self.state.is_some() {
            return Err(DbError::new("Cannot assign scan ranges to an open scan"));
        }
        for range in &ranges {
            if range.end() > self.rows.len() {
                return Err(DbError::new("Scan range out of bounds")
                    .with_field("offset", range.offset)
                    .with_field("len", range.len)
                    .with_field("num_rows", self.rows.len()));
            }
        }
        self.ranges = ranges;
        Ok(())
    }

    fn scan_ranges(&self) -> &[ScanRange] {
        &self.ranges
    }
}

impl Explainable for PhysicalMemoryScan {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let ent = ExplainEntry::new("MemoryScan").with_value("num_rows", self.rows.len());
        if conf.verbose && !self.ranges.is_empty() {
            return ent.with_values(
                "ranges",
                self.ranges
                    .iter()
                    .map(|r| format!("{}..{}", r.offset, r.end())),
            );
        }
        ent
    }
}

#[cfg(test)]
mod tests {
    use pullexec_error::ErrorKind;

    use super::*;
    use crate::arrays::scalar::ScalarValue;
    use crate::testutil::{
        EventLog,
        build_test_tree,
        col_gt,
        drain,
        memory_scan_desc,
        test_rows,
        test_state,
        test_state_with_batch_size,
    };

    #[test]
    fn scans_all_rows_across_batches() {
        let log = EventLog::default();
        let mut tree = build_test_tree(&[memory_scan_desc(0, test_rows(5))], &log).unwrap();
        let state = test_state_with_batch_size(2);

        let out = drain(&mut tree, &state).unwrap();
        assert_eq!(test_rows(5), out.rows);
        assert_eq!(vec![(2, false), (2, false), (1, true)], out.calls);
    }

    #[test]
    fn exact_multiple_of_batch_size() {
        let log = EventLog::default();
        let mut tree = build_test_tree(&[memory_scan_desc(0, test_rows(4))], &log).unwrap();
        let state = test_state_with_batch_size(2);

        let out = drain(&mut tree, &state).unwrap();
        assert_eq!(vec![(2, false), (2, true)], out.calls);
    }

    #[test]
    fn applies_conjuncts() {
        let log = EventLog::default();
        let desc = memory_scan_desc(0, test_rows(10)).with_conjuncts([col_gt(6)]);
        let mut tree = build_test_tree(&[desc], &log).unwrap();
        let state = test_state();

        let out = drain(&mut tree, &state).unwrap();
        let vals: Vec<_> = out.rows.iter().map(|r| r[0].clone()).collect();
        assert_eq!(
            vec![
                ScalarValue::Int64(7),
                ScalarValue::Int64(8),
                ScalarValue::Int64(9)
            ],
            vals
        );
    }

    #[test]
    fn scan_ranges() {
        let log = EventLog::default();
        let mut tree = build_test_tree(&[memory_scan_desc(0, test_rows(10))], &log).unwrap();
        let root = tree.root();
        let source = tree.scan_source_mut(root).unwrap();
        assert_eq!(10, source.input_len());
        source
            .set_scan_ranges(vec![
                ScanRange { offset: 8, len: 2 },
                ScanRange { offset: 1, len: 0 },
                ScanRange { offset: 2, len: 1 },
            ])
            .unwrap();

        let state = test_state_with_batch_size(3);
        let out = drain(&mut tree, &state).unwrap();
        let vals: Vec<_> = out.rows.iter().map(|r| r[0].clone()).collect();
        assert_eq!(
            vec![
                ScalarValue::Int64(8),
                ScalarValue::Int64(9),
                ScalarValue::Int64(2)
            ],
            vals
        );
        assert_eq!(vec![(3, true)], out.calls);

        let source = tree.scan_source_mut(root).unwrap();
        source.set_scan_ranges(vec![]).unwrap_err();
    }

    #[test]
    fn scan_range_out_of_bounds() {
        let mut scan = PhysicalMemoryScan::new(test_rows(3));
        scan.set_scan_ranges(vec![ScanRange { offset: 2, len: 2 }])
            .unwrap_err();
        assert!(scan.scan_ranges().is_empty());
    }

    #[test]
    fn row_type_mismatch_fails_prepare() {
        let log = EventLog::default();
        let rows = vec![vec![ScalarValue::Utf8("a".to_string()), ScalarValue::Null]];
        let mut tree = build_test_tree(&[memory_scan_desc(0, rows)], &log).unwrap();
        let state = test_state();

        let err = tree.prepare(&state).unwrap_err();
        assert_eq!(ErrorKind::Initialization, err.kind());
    }
}
