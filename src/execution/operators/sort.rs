// ORDER BY sorting with bounded memory

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::path::PathBuf;

use crate::error::{QueryError, Result};
use crate::execution::operators::{BoxedOperator, Operator};
use crate::planner::logical_plan::OrderByExpr;
use crate::storage::run_file::{self, RunReader};
use crate::types::{Row, SchemaRef, Value};

/// Counters describing what an external sort did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortStats {
    pub runs_created: usize,
    pub rows_spilled: u64,
    /// Most rows held in memory at once, across both phases
    pub peak_buffered_rows: usize,
}

/// Row waiting in the merge heap, tagged with the run it came from
#[derive(Debug)]
struct HeapEntry {
    row: Row,
    run: usize,
    column: usize,
    descending: bool,
}

impl HeapEntry {
    fn key(&self) -> &Value {
        self.row.value(self.column).unwrap_or(&Value::Null)
    }
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for HeapEntry {}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for HeapEntry {
    /// Output order: sort key in the requested direction, then lower run first
    fn cmp(&self, other: &Self) -> Ordering {
        let by_key = self.key().sort_compare(other.key());
        let by_key = if self.descending { by_key.reverse() } else { by_key };
        by_key.then_with(|| self.run.cmp(&other.run))
    }
}

enum SortState {
    /// Upstream not consumed yet
    Pending,
    Merging,
    Done,
    /// An earlier pull failed; the output would be truncated
    Failed,
}

/// Upper bound on rows reserved up front for a chunk; larger chunks grow on demand
const MAX_CHUNK_RESERVATION: usize = 4096;

/// External merge sort on a single column.
///
/// The first `next()` drains upstream in chunks of at most `chunk_size` rows;
/// each chunk is sorted in memory and written to a run file under the spill
/// directory. Runs are then merged through a heap holding at most one row per
/// run, so memory stays bounded by `chunk_size` plus the number of runs no
/// matter how large the input is. Equal keys keep their input order.
///
/// Run files are deleted on `close()`, or on drop if `close()` never ran.
pub struct ExternalSortOperator {
    input: BoxedOperator,
    column: usize,
    descending: bool,
    chunk_size: usize,
    spill_dir: PathBuf,
    schema: SchemaRef,
    state: SortState,
    runs: Vec<PathBuf>,
    readers: Vec<Option<RunReader>>,
    heap: BinaryHeap<Reverse<HeapEntry>>,
    stats: SortStats,
}

impl ExternalSortOperator {
    /// Create a new external Sort operator
    ///
    /// # Arguments
    /// * `input` - Upstream operator
    /// * `column` - Index of the sort column in the input schema
    /// * `descending` - Sort direction
    /// * `chunk_size` - Maximum rows sorted in memory per run
    /// * `spill_dir` - Directory for temporary run files
    pub fn new(
        input: BoxedOperator,
        column: usize,
        descending: bool,
        chunk_size: usize,
        spill_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(QueryError::InvalidConfig(
                "sort chunk size must be at least 1".to_string(),
            ));
        }
        let schema = input.schema();
        if column >= schema.len() {
            return Err(QueryError::Schema(format!(
                "sort column index {} out of range for {} columns",
                column,
                schema.len()
            )));
        }

        Ok(Self {
            input,
            column,
            descending,
            chunk_size,
            spill_dir: spill_dir.into(),
            schema,
            state: SortState::Pending,
            runs: Vec::new(),
            readers: Vec::new(),
            heap: BinaryHeap::new(),
            stats: SortStats::default(),
        })
    }

    /// Resolve an ORDER BY expression by name, then build the operator
    pub fn with_order_by(
        input: BoxedOperator,
        order_by: &OrderByExpr,
        chunk_size: usize,
        spill_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let column = input.schema().index_of(&order_by.column).ok_or_else(|| {
            QueryError::Schema(format!("sort column '{}' not found", order_by.column))
        })?;
        Self::new(input, column, !order_by.ascending, chunk_size, spill_dir)
    }

    pub fn stats(&self) -> SortStats {
        self.stats
    }

    fn compare_rows(&self, a: &Row, b: &Row) -> Ordering {
        let null = Value::Null;
        let left = a.value(self.column).unwrap_or(&null);
        let right = b.value(self.column).unwrap_or(&null);
        let ordering = left.sort_compare(right);
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }

    /// Partition phase: sort upstream chunk by chunk into run files
    fn create_runs(&mut self) -> Result<()> {
        let mut chunk: Vec<Row> = Vec::with_capacity(self.chunk_size.min(MAX_CHUNK_RESERVATION));
        loop {
            let row = self.input.next()?;
            let exhausted = row.is_none();
            if let Some(row) = row {
                chunk.push(row);
                self.stats.peak_buffered_rows = self.stats.peak_buffered_rows.max(chunk.len());
            }
            if chunk.len() == self.chunk_size || (exhausted && !chunk.is_empty()) {
                self.spill(&mut chunk)?;
            }
            if exhausted {
                break;
            }
        }

        tracing::info!(
            runs = self.stats.runs_created,
            rows = self.stats.rows_spilled,
            chunk_size = self.chunk_size,
            "external sort partition complete"
        );
        Ok(())
    }

    fn spill(&mut self, chunk: &mut Vec<Row>) -> Result<()> {
        // stable, so equal keys keep input order within the run
        chunk.sort_by(|a, b| self.compare_rows(a, b));
        let path = run_file::write_run(&self.spill_dir, chunk)?;
        tracing::debug!(
            run = self.runs.len(),
            rows = chunk.len(),
            path = %path.display(),
            "sort run written"
        );
        self.runs.push(path);
        self.stats.runs_created += 1;
        self.stats.rows_spilled += chunk.len() as u64;
        chunk.clear();
        Ok(())
    }

    /// Merge phase setup: open every run and seed the heap with its first row
    fn start_merge(&mut self) -> Result<()> {
        self.readers = Vec::with_capacity(self.runs.len());
        for path in &self.runs {
            self.readers.push(Some(RunReader::open(path)?));
        }
        for run in 0..self.readers.len() {
            self.refill(run)?;
        }
        Ok(())
    }

    /// Push the next row of `run` into the heap, or retire the run
    fn refill(&mut self, run: usize) -> Result<()> {
        let Some(reader) = self.readers.get_mut(run).and_then(Option::as_mut) else {
            return Ok(());
        };
        match reader.next_row()? {
            Some(row) => {
                self.heap.push(Reverse(HeapEntry {
                    row,
                    run,
                    column: self.column,
                    descending: self.descending,
                }));
                self.stats.peak_buffered_rows = self.stats.peak_buffered_rows.max(self.heap.len());
            }
            None => self.readers[run] = None,
        }
        Ok(())
    }

    fn advance(&mut self) -> Result<Option<Row>> {
        if let SortState::Pending = self.state {
            self.create_runs()?;
            self.start_merge()?;
            self.state = SortState::Merging;
        }

        match self.heap.pop() {
            Some(Reverse(entry)) => {
                self.refill(entry.run)?;
                Ok(Some(entry.row))
            }
            None => {
                self.state = SortState::Done;
                self.cleanup_runs();
                Ok(None)
            }
        }
    }

    fn cleanup_runs(&mut self) {
        self.heap.clear();
        self.readers.clear();
        for path in self.runs.drain(..) {
            run_file::remove_run(&path);
        }
    }
}

impl Operator for ExternalSortOperator {
    fn next(&mut self) -> Result<Option<Row>> {
        match self.state {
            SortState::Done => return Ok(None),
            SortState::Failed => {
                return Err(QueryError::Execution(
                    "external sort cannot continue after an earlier error".to_string(),
                ))
            }
            SortState::Pending | SortState::Merging => {}
        }

        let pulled = self.advance();
        if pulled.is_err() {
            self.state = SortState::Failed;
            self.cleanup_runs();
        }
        pulled
    }

    fn close(&mut self) -> Result<()> {
        self.state = SortState::Done;
        self.cleanup_runs();
        self.input.close()
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}

impl Drop for ExternalSortOperator {
    fn drop(&mut self) {
        self.cleanup_runs();
    }
}
