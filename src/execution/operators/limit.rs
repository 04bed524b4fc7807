// LIMIT n [OFFSET m]

use crate::error::Result;
use crate::execution::operators::{BoxedOperator, Operator};
use crate::types::{Row, SchemaRef};

/// Limit operator: skips `offset` rows, then emits at most `limit` rows.
///
/// Once the limit is reached upstream is never pulled again.
pub struct LimitOperator {
    input: BoxedOperator,
    limit: usize,
    offset: usize,
    skipped: usize,
    emitted: usize,
    schema: SchemaRef,
}

impl LimitOperator {
    pub fn new(input: BoxedOperator, limit: usize, offset: usize) -> Self {
        let schema = input.schema();
        Self {
            input,
            limit,
            offset,
            skipped: 0,
            emitted: 0,
            schema,
        }
    }
}

impl Operator for LimitOperator {
    fn next(&mut self) -> Result<Option<Row>> {
        if self.emitted >= self.limit {
            return Ok(None);
        }
        while self.skipped < self.offset {
            if self.input.next()?.is_none() {
                // upstream ran out while skipping
                self.emitted = self.limit;
                return Ok(None);
            }
            self.skipped += 1;
        }
        match self.input.next()? {
            Some(row) => {
                self.emitted += 1;
                Ok(Some(row))
            }
            None => {
                self.emitted = self.limit;
                Ok(None)
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.emitted = self.limit;
        self.input.close()
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}
