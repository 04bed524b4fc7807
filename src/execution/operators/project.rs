// Column selection/projection

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{QueryError, Result};
use crate::execution::operators::{BoxedOperator, Operator};
use crate::types::{DataType, Field, Row, Schema, SchemaRef, Value};

/// Project operator that selects and reorders columns.
///
/// Without a column list it is a passthrough (SELECT *). With one, each row
/// is rebuilt from the requested indices; an index outside the input schema
/// yields a null value. A column selected more than once keeps its name the
/// first time and is suffixed `_1`, `_2`, ... after that.
pub struct ProjectOperator {
    input: BoxedOperator,
    column_indices: Option<Vec<usize>>,
    schema: SchemaRef,
}

impl ProjectOperator {
    /// Create a new Project operator
    ///
    /// # Arguments
    /// * `input` - Upstream operator
    /// * `column_indices` - Input positions to keep, in output order; `None` keeps every column
    pub fn new(input: BoxedOperator, column_indices: Option<Vec<usize>>) -> Result<Self> {
        let input_schema = input.schema();
        let schema = match &column_indices {
            None => input_schema,
            Some(indices) => {
                let fields = indices
                    .iter()
                    .map(|&idx| match input_schema.field(idx) {
                        Some(field) => field.clone(),
                        None => Field::new(format!("column_{}", idx), DataType::Text),
                    })
                    .collect();
                Arc::new(Schema::new(distinct_names(fields))?)
            }
        };

        Ok(Self {
            input,
            column_indices,
            schema,
        })
    }

    /// Create a Project operator from column names
    ///
    /// # Errors
    /// Returns a schema error for a name the input does not have
    pub fn with_names(input: BoxedOperator, column_names: &[String]) -> Result<Self> {
        let input_schema = input.schema();
        let indices = column_names
            .iter()
            .map(|name| {
                input_schema.index_of(name).ok_or_else(|| {
                    QueryError::Schema(format!("column '{}' not found in schema", name))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(input, Some(indices))
    }

    pub fn is_passthrough(&self) -> bool {
        self.column_indices.is_none()
    }
}

fn distinct_names(fields: Vec<Field>) -> Vec<Field> {
    let mut taken: HashSet<String> = fields.iter().map(|f| f.name().to_string()).collect();
    let mut seen: HashSet<String> = HashSet::new();
    fields
        .into_iter()
        .map(|field| {
            if seen.insert(field.name().to_string()) {
                return field;
            }
            let mut n = 1;
            let name = loop {
                let candidate = format!("{}_{}", field.name(), n);
                if !taken.contains(&candidate) {
                    break candidate;
                }
                n += 1;
            };
            taken.insert(name.clone());
            Field::new(name, field.data_type())
        })
        .collect()
}

impl Operator for ProjectOperator {
    fn next(&mut self) -> Result<Option<Row>> {
        let Some(row) = self.input.next()? else {
            return Ok(None);
        };
        let Some(indices) = &self.column_indices else {
            return Ok(Some(row));
        };

        let values = indices
            .iter()
            .map(|&idx| row.value(idx).cloned().unwrap_or(Value::Null))
            .collect();
        Ok(Some(Row::new(values)))
    }

    fn close(&mut self) -> Result<()> {
        self.input.close()
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}
