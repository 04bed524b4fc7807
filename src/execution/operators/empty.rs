// Source that produces no rows

use crate::error::Result;
use crate::execution::operators::Operator;
use crate::types::{Row, SchemaRef};

/// Stand-in for a source that was ruled out before scanning
pub struct EmptyOperator {
    schema: SchemaRef,
}

impl EmptyOperator {
    pub fn new(schema: SchemaRef) -> Self {
        Self { schema }
    }
}

impl Operator for EmptyOperator {
    fn next(&mut self) -> Result<Option<Row>> {
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}
