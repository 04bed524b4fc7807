// Scalar and GROUP BY aggregations

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{QueryError, Result};
use crate::execution::operators::{BoxedOperator, Operator};
use crate::planner::logical_plan::{AggregateFunction, Aggregation};
use crate::types::{DataType, Field, Row, Schema, SchemaRef, Value};

/// An aggregation resolved against the input schema
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateExpr {
    pub function: AggregateFunction,
    /// Input column index; `None` for Count(*)
    pub column: Option<usize>,
    pub alias: String,
}

impl AggregateExpr {
    pub fn new(function: AggregateFunction, column: Option<usize>, alias: impl Into<String>) -> Self {
        Self {
            function,
            column,
            alias: alias.into(),
        }
    }

    /// Resolve a named aggregation against a schema.
    ///
    /// `position` is the aggregation's index in its list; an empty alias is
    /// replaced by `<FUNCTION>_<position>`, e.g. `SUM_1`.
    ///
    /// # Errors
    /// Returns a schema error if the aggregated column does not exist
    pub fn resolve(agg: &Aggregation, position: usize, schema: &Schema) -> Result<Self> {
        let column = match &agg.column {
            Some(name) => Some(schema.index_of(name).ok_or_else(|| {
                QueryError::Schema(format!(
                    "{}({}) references unknown column '{}'",
                    agg.function, name, name
                ))
            })?),
            None => None,
        };
        let alias = if agg.alias.is_empty() {
            format!("{}_{}", agg.function, position)
        } else {
            agg.alias.clone()
        };
        Ok(Self::new(agg.function, column, alias))
    }

    /// Output type: Integer for Count, Float for everything else
    pub fn output_type(&self) -> DataType {
        match self.function {
            AggregateFunction::Count => DataType::Integer,
            AggregateFunction::Sum
            | AggregateFunction::Min
            | AggregateFunction::Max
            | AggregateFunction::Avg => DataType::Float,
        }
    }

    fn output_field(&self) -> Field {
        Field::new(self.alias.clone(), self.output_type())
    }
}

/// Running state for one aggregate expression
#[derive(Debug, Clone, Default)]
struct AggState {
    rows: u64,
    non_null: u64,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl AggState {
    fn update(&mut self, expr: &AggregateExpr, row: &Row) {
        self.rows += 1;
        // Count(*) never reads a column
        let Some(idx) = expr.column else {
            return;
        };
        let value = row.value(idx).unwrap_or(&Value::Null);
        if !value.is_null() {
            self.non_null += 1;
        }
        if let Some(v) = value.as_f64() {
            self.sum += v;
            self.min = Some(self.min.map_or(v, |m| m.min(v)));
            self.max = Some(self.max.map_or(v, |m| m.max(v)));
        }
    }

    fn finalize(&self, expr: &AggregateExpr) -> Value {
        match expr.function {
            AggregateFunction::Count => {
                let tally = if expr.column.is_some() {
                    self.non_null
                } else {
                    self.rows
                };
                Value::Integer(tally as i64)
            }
            AggregateFunction::Sum => Value::Float(self.sum),
            AggregateFunction::Min => self.min.map_or(Value::Null, Value::Float),
            AggregateFunction::Max => self.max.map_or(Value::Null, Value::Float),
            AggregateFunction::Avg => {
                if self.rows == 0 {
                    Value::Null
                } else {
                    Value::Float(self.sum / self.rows as f64)
                }
            }
        }
    }
}

/// One state per expression, updated and finalized together
#[derive(Debug, Clone)]
struct Accumulators {
    states: Vec<AggState>,
}

impl Accumulators {
    fn new(exprs: &[AggregateExpr]) -> Self {
        Self {
            states: vec![AggState::default(); exprs.len()],
        }
    }

    fn update(&mut self, exprs: &[AggregateExpr], row: &Row) {
        for (state, expr) in self.states.iter_mut().zip(exprs) {
            state.update(expr, row);
        }
    }

    fn finalize(&self, exprs: &[AggregateExpr]) -> Vec<Value> {
        self.states
            .iter()
            .zip(exprs)
            .map(|(state, expr)| state.finalize(expr))
            .collect()
    }
}

fn aborted() -> QueryError {
    QueryError::Execution("aggregate cannot continue after an earlier input error".to_string())
}

fn output_schema(group_fields: Vec<Field>, exprs: &[AggregateExpr]) -> Result<SchemaRef> {
    let mut fields = group_fields;
    fields.extend(exprs.iter().map(AggregateExpr::output_field));
    Ok(Arc::new(Schema::new(fields)?))
}

/// Aggregate operator without grouping.
///
/// Consumes its whole input on the first `next()` and emits exactly one row.
/// An upstream error is returned once; every later `next()` is an execution
/// error rather than a result built from a partial input.
pub struct ScalarAggregateOperator {
    input: BoxedOperator,
    exprs: Vec<AggregateExpr>,
    schema: SchemaRef,
    done: bool,
    failed: bool,
}

impl ScalarAggregateOperator {
    /// Create a new scalar Aggregate operator
    ///
    /// # Errors
    /// Returns a schema error if two aggregates share an alias
    pub fn new(input: BoxedOperator, exprs: Vec<AggregateExpr>) -> Result<Self> {
        let schema = output_schema(Vec::new(), &exprs)?;
        Ok(Self {
            input,
            exprs,
            schema,
            done: false,
            failed: false,
        })
    }
}

impl Operator for ScalarAggregateOperator {
    fn next(&mut self) -> Result<Option<Row>> {
        if self.failed {
            return Err(aborted());
        }
        if self.done {
            return Ok(None);
        }
        self.done = true;
        let mut acc = Accumulators::new(&self.exprs);
        loop {
            match self.input.next() {
                Ok(Some(row)) => acc.update(&self.exprs, &row),
                Ok(None) => break,
                Err(e) => {
                    self.failed = true;
                    return Err(e);
                }
            }
        }
        Ok(Some(Row::new(acc.finalize(&self.exprs))))
    }

    fn close(&mut self) -> Result<()> {
        self.done = true;
        self.failed = false;
        self.input.close()
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}

/// Hashable form of a group-key value. Floats hash by bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Integer(i64),
    Float(u64),
    Text(String),
    Null,
}

impl From<&Value> for KeyPart {
    fn from(value: &Value) -> Self {
        match value {
            Value::Integer(v) => KeyPart::Integer(*v),
            // -0.0 and 0.0 belong to the same group
            Value::Float(v) if *v == 0.0 => KeyPart::Float(0.0f64.to_bits()),
            Value::Float(v) => KeyPart::Float(v.to_bits()),
            Value::Text(v) => KeyPart::Text(v.clone()),
            Value::Null => KeyPart::Null,
        }
    }
}

type GroupKey = Vec<KeyPart>;

/// GROUP BY aggregate operator.
///
/// Builds every group in memory on the first `next()`, then emits one row per
/// group in the order each key first appeared in the input. Output rows are
/// the group-by values followed by the aggregate results.
pub struct HashAggregateOperator {
    input: BoxedOperator,
    group_by: Vec<usize>,
    exprs: Vec<AggregateExpr>,
    schema: SchemaRef,
    output: Option<std::vec::IntoIter<Row>>,
    closed: bool,
    failed: bool,
}

impl HashAggregateOperator {
    /// Create a new grouped Aggregate operator
    ///
    /// # Arguments
    /// * `input` - Upstream operator
    /// * `group_by` - Input column indices forming the group key
    /// * `exprs` - Aggregates computed per group
    ///
    /// # Errors
    /// Returns a schema error for an out-of-range group column or a duplicate output name
    pub fn new(input: BoxedOperator, group_by: Vec<usize>, exprs: Vec<AggregateExpr>) -> Result<Self> {
        let input_schema = input.schema();
        let group_fields = group_by
            .iter()
            .map(|&idx| {
                input_schema.field(idx).cloned().ok_or_else(|| {
                    QueryError::Schema(format!("group column index {} out of range", idx))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let schema = output_schema(group_fields, &exprs)?;

        Ok(Self {
            input,
            group_by,
            exprs,
            schema,
            output: None,
            closed: false,
            failed: false,
        })
    }

    /// Resolve group-by column names, then build the operator
    pub fn with_names(
        input: BoxedOperator,
        group_by: &[String],
        exprs: Vec<AggregateExpr>,
    ) -> Result<Self> {
        let input_schema = input.schema();
        let indices = group_by
            .iter()
            .map(|name| {
                input_schema.index_of(name).ok_or_else(|| {
                    QueryError::Schema(format!("group column '{}' not found", name))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(input, indices, exprs)
    }

    fn build_groups(&mut self) -> Result<Vec<Row>> {
        let mut index: HashMap<GroupKey, usize> = HashMap::new();
        // (group values, states) in first-occurrence order
        let mut groups: Vec<(Vec<Value>, Accumulators)> = Vec::new();

        while let Some(row) = self.input.next()? {
            let values: Vec<Value> = self
                .group_by
                .iter()
                .map(|&idx| row.value(idx).cloned().unwrap_or(Value::Null))
                .collect();
            let key: GroupKey = values.iter().map(KeyPart::from).collect();

            let slot = match index.get(&key) {
                Some(&slot) => slot,
                None => {
                    groups.push((values, Accumulators::new(&self.exprs)));
                    index.insert(key, groups.len() - 1);
                    groups.len() - 1
                }
            };
            groups[slot].1.update(&self.exprs, &row);
        }

        tracing::debug!(groups = groups.len(), "hash aggregate built");

        Ok(groups
            .into_iter()
            .map(|(mut values, acc)| {
                values.extend(acc.finalize(&self.exprs));
                Row::new(values)
            })
            .collect())
    }
}

impl Operator for HashAggregateOperator {
    fn next(&mut self) -> Result<Option<Row>> {
        if self.failed {
            return Err(aborted());
        }
        if self.closed {
            return Ok(None);
        }
        if self.output.is_none() {
            match self.build_groups() {
                Ok(rows) => self.output = Some(rows.into_iter()),
                Err(e) => {
                    self.failed = true;
                    return Err(e);
                }
            }
        }
        Ok(self.output.as_mut().and_then(|rows| rows.next()))
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.failed = false;
        self.output = None;
        self.input.close()
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}
