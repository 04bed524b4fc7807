// DataFrame API implementation

use std::path::Path;

use crate::config::EngineConfig;
use crate::error::Result;
use crate::execution::batch::RecordBatch;
use crate::execution::operators::BoxedOperator;
use crate::execution::Executor;
use crate::planner::logical_plan::{
    AggregateFunction, Aggregation, Comparator, ComparisonExpr, LimitSpec, OrderByExpr,
    PlanRequest, Projection,
};
use crate::types::{Row, SchemaRef, Value};

/// DataFrame represents a lazy query over one delimited file.
/// Operations on DataFrame fill in a plan request; nothing runs until
/// `stream`, `collect` or `collect_rows`.
#[derive(Debug, Clone)]
pub struct DataFrame {
    plan: PlanRequest,
    config: EngineConfig,
}

/// Intermediate type for group_by + agg. Call .agg(aggregations) to complete.
#[derive(Debug, Clone)]
pub struct GroupedDataFrame {
    input: DataFrame,
    group_by: Vec<String>,
}

impl GroupedDataFrame {
    /// Apply aggregations and return a DataFrame
    pub fn agg(self, aggs: Vec<Aggregation>) -> DataFrame {
        let mut df = self.input;
        df.plan.group_by = self.group_by;
        df.plan.aggregates = aggs;
        df
    }
}

impl DataFrame {
    /// Create a DataFrame from a delimited file path
    ///
    /// # Arguments
    /// * `path` - Path to the file; its header row names the columns
    ///
    /// # Returns
    /// A new DataFrame that scans every row and column of the file
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Self {
        DataFrame {
            plan: PlanRequest::scan(path.as_ref()),
            config: EngineConfig::default(),
        }
    }

    /// Run with an explicit engine configuration
    pub fn with_config(&self, config: EngineConfig) -> Self {
        DataFrame {
            plan: self.plan.clone(),
            config,
        }
    }

    /// Select specific columns (projection)
    pub fn select(&self, columns: Vec<String>) -> Self {
        let mut df = self.clone();
        df.plan.projection = Projection::Columns(columns);
        df
    }

    /// Add a conjunct to the WHERE clause
    ///
    /// # Example
    /// ```ignore
    /// use flatquery::dataframe::col;
    /// df.filter(col("age").gt(18)).filter(col("city").eq("oslo"))
    /// ```
    pub fn filter(&self, predicate: ComparisonExpr) -> Self {
        let mut df = self.clone();
        df.plan.predicates.push(predicate);
        df
    }

    /// Group by the given columns. Returns a GroupedDataFrame; call .agg(aggregations) to complete.
    pub fn group_by(&self, columns: Vec<String>) -> GroupedDataFrame {
        GroupedDataFrame {
            input: self.clone(),
            group_by: columns,
        }
    }

    /// Aggregate the whole input into a single row
    pub fn aggregate(&self, aggs: Vec<Aggregation>) -> Self {
        let mut df = self.clone();
        df.plan.group_by.clear();
        df.plan.aggregates = aggs;
        df
    }

    /// Order by a single column. Use `asc("col")` and `desc("col")` to build OrderByExpr.
    pub fn order_by(&self, order_by: OrderByExpr) -> Self {
        let mut df = self.clone();
        df.plan.order_by = Some(order_by);
        df
    }

    /// Rows per in-memory sort chunk for this query
    pub fn with_chunk_size(&self, chunk_size: usize) -> Self {
        let mut df = self.clone();
        df.plan.sort_chunk_size = Some(chunk_size);
        df
    }

    pub fn limit(&self, limit: usize) -> Self {
        let mut df = self.clone();
        let offset = df.plan.limit.map_or(0, |l| l.offset);
        df.plan.limit = Some(LimitSpec { limit, offset });
        df
    }

    /// Skip leading rows; without a `limit` every remaining row is kept
    pub fn offset(&self, offset: usize) -> Self {
        let mut df = self.clone();
        let limit = df.plan.limit.map_or(usize::MAX, |l| l.limit);
        df.plan.limit = Some(LimitSpec { limit, offset });
        df
    }

    /// The plan request this DataFrame would execute
    pub fn plan(&self) -> &PlanRequest {
        &self.plan
    }

    /// Build the operator tree and hand it to the caller to pull rows from
    pub fn stream(&self) -> Result<BoxedOperator> {
        self.executor().build(&self.plan)
    }

    /// Execute the query and return the results as Arrow batches
    pub fn collect(&self) -> Result<Vec<RecordBatch>> {
        self.executor().execute(&self.plan)
    }

    /// Execute the query and return the output schema with every row
    pub fn collect_rows(&self) -> Result<(SchemaRef, Vec<Row>)> {
        self.executor().execute_rows(&self.plan)
    }

    fn executor(&self) -> Executor {
        Executor::with_config(self.config.clone())
    }
}

// Aggregation helper constructors for use with group_by().agg([...])

fn aggregation(function: AggregateFunction, column: Option<&str>, alias: &str) -> Aggregation {
    Aggregation {
        function,
        column: column.map(str::to_string),
        alias: alias.to_string(),
    }
}

/// COUNT(*) - count all rows in each group
pub fn count(alias: &str) -> Aggregation {
    aggregation(AggregateFunction::Count, None, alias)
}

/// COUNT(column) - count non-null values in the column
pub fn count_column(column: &str, alias: &str) -> Aggregation {
    aggregation(AggregateFunction::Count, Some(column), alias)
}

pub fn sum(column: &str, alias: &str) -> Aggregation {
    aggregation(AggregateFunction::Sum, Some(column), alias)
}

pub fn avg(column: &str, alias: &str) -> Aggregation {
    aggregation(AggregateFunction::Avg, Some(column), alias)
}

pub fn min(column: &str, alias: &str) -> Aggregation {
    aggregation(AggregateFunction::Min, Some(column), alias)
}

pub fn max(column: &str, alias: &str) -> Aggregation {
    aggregation(AggregateFunction::Max, Some(column), alias)
}

/// ORDER BY ascending
pub fn asc(column: &str) -> OrderByExpr {
    OrderByExpr {
        column: column.to_string(),
        ascending: true,
    }
}

/// ORDER BY descending
pub fn desc(column: &str) -> OrderByExpr {
    OrderByExpr {
        column: column.to_string(),
        ascending: false,
    }
}

/// Named column used to build filter comparisons
#[derive(Debug, Clone)]
pub struct ColumnRef {
    name: String,
}

/// Helper to create a column reference for `filter`
pub fn col(name: &str) -> ColumnRef {
    ColumnRef {
        name: name.to_string(),
    }
}

impl ColumnRef {
    fn compare(&self, comparator: Comparator, value: impl Into<Value>) -> ComparisonExpr {
        ComparisonExpr::new(self.name.clone(), comparator, value)
    }

    pub fn eq(&self, value: impl Into<Value>) -> ComparisonExpr {
        self.compare(Comparator::Eq, value)
    }

    pub fn neq(&self, value: impl Into<Value>) -> ComparisonExpr {
        self.compare(Comparator::Neq, value)
    }

    pub fn gt(&self, value: impl Into<Value>) -> ComparisonExpr {
        self.compare(Comparator::Gt, value)
    }

    pub fn ge(&self, value: impl Into<Value>) -> ComparisonExpr {
        self.compare(Comparator::Ge, value)
    }

    pub fn lt(&self, value: impl Into<Value>) -> ComparisonExpr {
        self.compare(Comparator::Lt, value)
    }

    pub fn le(&self, value: impl Into<Value>) -> ComparisonExpr {
        self.compare(Comparator::Le, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::operators::{drain, Operator};
    use std::path::PathBuf;

    fn orders(dir: &Path) -> PathBuf {
        let path = dir.join("orders.csv");
        std::fs::write(
            &path,
            "order_id,customer,amount,qty\n\
             1,acme,120.5,3\n\
             2,bolt,80.0,1\n\
             3,acme,42.25,7\n\
             4,core,300.0,2\n\
             5,bolt,15.75,4\n",
        )
        .unwrap();
        path
    }

    fn frame(dir: &Path) -> DataFrame {
        DataFrame::from_csv(orders(dir))
            .with_config(EngineConfig::default().with_spill_dir(dir))
    }

    #[test]
    fn test_builder_fills_plan() {
        let df = DataFrame::from_csv("orders.csv")
            .filter(col("qty").gt(2))
            .filter(col("customer").neq("core"))
            .order_by(desc("amount"))
            .offset(1)
            .limit(3)
            .with_chunk_size(16)
            .select(vec!["order_id".to_string()]);

        let plan = df.plan();
        assert_eq!(plan.source, PathBuf::from("orders.csv"));
        assert_eq!(plan.predicates.len(), 2);
        assert_eq!(plan.predicates[0].comparator, Comparator::Gt);
        assert_eq!(plan.predicates[1].value, Value::from("core"));
        assert_eq!(plan.order_by, Some(desc("amount")));
        assert_eq!(plan.limit, Some(LimitSpec { limit: 3, offset: 1 }));
        assert_eq!(plan.sort_chunk_size, Some(16));
        assert!(!plan.is_aggregate());
    }

    #[test]
    fn test_filter_order_collect_rows() {
        let dir = tempfile::tempdir().unwrap();
        let (schema, rows) = frame(dir.path())
            .filter(col("amount").ge(40))
            .order_by(asc("amount"))
            .with_chunk_size(2)
            .select(vec!["order_id".to_string(), "amount".to_string()])
            .collect_rows()
            .unwrap();

        assert_eq!(schema.column_names(), vec!["order_id", "amount"]);
        let ids: Vec<&Value> = rows.iter().filter_map(|r| r.value(0)).collect();
        assert_eq!(
            ids,
            vec![&Value::Integer(3), &Value::Integer(2), &Value::Integer(1), &Value::Integer(4)]
        );
    }

    #[test]
    fn test_group_by_agg() {
        let dir = tempfile::tempdir().unwrap();
        let (_, rows) = frame(dir.path())
            .group_by(vec!["customer".to_string()])
            .agg(vec![count("orders"), sum("qty", "units"), max("amount", "top")])
            .collect_rows()
            .unwrap();

        assert_eq!(
            rows[0].values(),
            &[
                Value::from("acme"),
                Value::Integer(2),
                Value::Float(10.0),
                Value::Float(120.5),
            ]
        );
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_scalar_aggregate_and_batches() {
        let dir = tempfile::tempdir().unwrap();
        let batches = frame(dir.path())
            .filter(col("customer").eq("nobody"))
            .aggregate(vec![count("n"), avg("amount", "mean"), min("qty", "lo")])
            .collect()
            .unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].num_rows(), 1);
        assert_eq!(batches[0].num_columns(), 3);
    }

    #[test]
    fn test_stream_pulls_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let mut stream = frame(dir.path()).limit(2).stream().unwrap();
        assert_eq!(stream.schema().len(), 4);
        let rows = drain(&mut stream).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_offset_without_limit_keeps_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let (_, rows) = frame(dir.path()).offset(3).collect_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].value(0), Some(&Value::Integer(4)));
    }
}
