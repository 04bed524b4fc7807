pub mod aggregate;
pub mod empty;
pub mod filter;
pub mod limit;
pub mod project;
pub mod scan;
pub mod sort;

// Export operators for use by executor
pub use aggregate::{AggregateExpr, HashAggregateOperator, ScalarAggregateOperator};
pub use empty::EmptyOperator;
pub use filter::{Comparison, FilterOperator, Predicate};
pub use limit::LimitOperator;
pub use project::ProjectOperator;
pub use scan::ScanOperator;
pub use sort::{ExternalSortOperator, SortStats};

use crate::error::Result;
use crate::types::{Row, SchemaRef};

/// Trait for all execution operators in the query engine.
///
/// Operators form a pull-based tree: each one owns exactly one upstream
/// operator (sources own none) and produces rows one at a time when its
/// consumer asks for them.
pub trait Operator: Send {
    /// Produce the next row
    ///
    /// # Returns
    /// `Ok(None)` once the stream is exhausted; every later call also
    /// returns `Ok(None)`
    fn next(&mut self) -> Result<Option<Row>>;

    /// Release every resource this operator holds, including its upstream's.
    ///
    /// Safe to call at any point, before the first `next()` and more than
    /// once.
    fn close(&mut self) -> Result<()>;

    /// Get the output schema of this operator
    fn schema(&self) -> SchemaRef;
}

pub type BoxedOperator = Box<dyn Operator>;

impl Operator for BoxedOperator {
    fn next(&mut self) -> Result<Option<Row>> {
        (**self).next()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }

    fn schema(&self) -> SchemaRef {
        (**self).schema()
    }
}

/// Pull every remaining row out of an operator and close it.
///
/// The operator is closed even when pulling fails; the pull error wins.
pub fn drain(op: &mut dyn Operator) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    let pulled = loop {
        match op.next() {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    let closed = op.close();
    pulled?;
    closed?;
    Ok(rows)
}
