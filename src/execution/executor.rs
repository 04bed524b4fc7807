// Execution engine coordinator

use crate::config::EngineConfig;
use crate::error::{QueryError, Result};
use crate::execution::batch::{collect_batches, RecordBatch};
use crate::execution::operators::{
    drain, AggregateExpr, BoxedOperator, EmptyOperator, ExternalSortOperator, FilterOperator,
    HashAggregateOperator, LimitOperator, Operator, Predicate, ProjectOperator,
    ScalarAggregateOperator, ScanOperator,
};
use crate::planner::logical_plan::{PlanRequest, Projection};
use crate::storage::zone_map::ZoneMap;
use crate::types::{Row, SchemaRef};

/// Executor that turns plan requests into operator trees and runs them.
///
/// Stages are wired Scan -> Filter -> Aggregate -> Sort -> Limit -> Project.
/// Every column name is resolved while the tree is built, so unknown columns
/// surface before a single row is read.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: EngineConfig,
}

impl Executor {
    /// Create an executor with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build the operator tree for a plan without pulling any rows
    ///
    /// # Arguments
    /// * `plan` - The plan request to wire
    ///
    /// # Returns
    /// The root operator; the caller owns it and must close it
    pub fn build(&self, plan: &PlanRequest) -> Result<BoxedOperator> {
        self.config.validate()?;
        let chunk_size = plan.sort_chunk_size.unwrap_or(self.config.sort_chunk_size);
        if chunk_size == 0 {
            return Err(QueryError::InvalidConfig(
                "sort chunk size must be at least 1".to_string(),
            ));
        }
        let delimiter = self.config.delimiter_byte()?;

        let mut op = self.source(plan, delimiter)?;

        if !plan.predicates.is_empty() {
            let predicate = Predicate::resolve(&plan.predicates, &op.schema())?;
            op = Box::new(FilterOperator::new(op, predicate));
        }

        if plan.is_aggregate() {
            let input_schema = op.schema();
            let exprs = plan
                .aggregates
                .iter()
                .enumerate()
                .map(|(i, agg)| AggregateExpr::resolve(agg, i, &input_schema))
                .collect::<Result<Vec<_>>>()?;
            op = if plan.group_by.is_empty() {
                Box::new(ScalarAggregateOperator::new(op, exprs)?)
            } else {
                Box::new(HashAggregateOperator::with_names(op, &plan.group_by, exprs)?)
            };
        }

        if let Some(order_by) = &plan.order_by {
            op = Box::new(ExternalSortOperator::with_order_by(
                op,
                order_by,
                chunk_size,
                self.config.spill_dir.clone(),
            )?);
        }

        if let Some(limit) = plan.limit {
            op = Box::new(LimitOperator::new(op, limit.limit, limit.offset));
        }

        if let Projection::Columns(columns) = &plan.projection {
            op = Box::new(ProjectOperator::with_names(op, columns)?);
        }

        Ok(op)
    }

    /// Scan the plan's source, or stand in an empty source when its zone map
    /// proves no row can match
    fn source(&self, plan: &PlanRequest, delimiter: Option<u8>) -> Result<BoxedOperator> {
        if self.config.use_zone_maps && !plan.predicates.is_empty() {
            if let Some(zone_map) = ZoneMap::load_for(&plan.source) {
                if let Some(conjunct) = zone_map.pruning_conjunct(&plan.predicates) {
                    tracing::info!(
                        source = %plan.source.display(),
                        column = %conjunct.column,
                        comparator = %conjunct.comparator,
                        literal = %conjunct.value,
                        "zone map pruned source"
                    );
                    // keep the inferred types; opening reads only the header and first row
                    let mut scan = ScanOperator::open(&plan.source, delimiter)?;
                    let schema = scan.schema();
                    scan.close()?;
                    return Ok(Box::new(EmptyOperator::new(schema)));
                }
            }
        }
        Ok(Box::new(ScanOperator::open(&plan.source, delimiter)?))
    }

    /// Execute a plan and return the results as Arrow batches
    ///
    /// # Returns
    /// Batches of at most `batch_size_rows` rows; empty when nothing matched
    pub fn execute(&self, plan: &PlanRequest) -> Result<Vec<RecordBatch>> {
        let mut root = self.build(plan)?;
        collect_batches(&mut root, self.config.batch_size_rows)
    }

    /// Execute a plan and return the output schema with every row
    pub fn execute_rows(&self, plan: &PlanRequest) -> Result<(SchemaRef, Vec<Row>)> {
        let mut root = self.build(plan)?;
        let schema = root.schema();
        let rows = drain(&mut root)?;
        Ok((schema, rows))
    }
}
