// Row stream to Arrow RecordBatch conversion

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Builder, Int64Builder, StringBuilder};
use arrow::record_batch::RecordBatchOptions;
pub use arrow::record_batch::RecordBatch;

use crate::error::{QueryError, Result};
use crate::execution::operators::Operator;
use crate::types::{DataType, Row, Schema, Value};

/// Upper bound on rows reserved up front for a batch buffer
const MAX_BATCH_RESERVATION: usize = 4096;

/// Build one Arrow batch from rows that all follow `schema`.
///
/// Integer maps to Int64, Float to Float64 and Text to Utf8; every column is
/// nullable and `Value::Null` becomes an Arrow null.
///
/// # Errors
/// Returns an execution error if a value does not match its column type
pub fn rows_to_record_batch(schema: &Schema, rows: &[Row]) -> Result<RecordBatch> {
    let columns = schema
        .fields()
        .iter()
        .enumerate()
        .map(|(idx, field)| build_column(field.name(), field.data_type(), idx, rows))
        .collect::<Result<Vec<_>>>()?;

    let options = RecordBatchOptions::new().with_row_count(Some(rows.len()));
    RecordBatch::try_new_with_options(Arc::new(schema.to_arrow()), columns, &options)
        .map_err(|e| QueryError::Execution(format!("failed to build record batch: {}", e)))
}

fn build_column(name: &str, data_type: DataType, idx: usize, rows: &[Row]) -> Result<ArrayRef> {
    let mismatch = |value: &Value| {
        QueryError::Execution(format!(
            "column '{}' is {} but row holds {:?}",
            name, data_type, value
        ))
    };
    let values = rows.iter().map(|row| row.value(idx).unwrap_or(&Value::Null));

    let array: ArrayRef = match data_type {
        DataType::Integer => {
            let mut builder = Int64Builder::with_capacity(rows.len());
            for value in values {
                match value {
                    Value::Integer(v) => builder.append_value(*v),
                    Value::Null => builder.append_null(),
                    other => return Err(mismatch(other)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Float => {
            let mut builder = Float64Builder::with_capacity(rows.len());
            for value in values {
                match value {
                    Value::Float(v) => builder.append_value(*v),
                    Value::Null => builder.append_null(),
                    other => return Err(mismatch(other)),
                }
            }
            Arc::new(builder.finish())
        }
        DataType::Text => {
            let mut builder = StringBuilder::new();
            for value in values {
                match value {
                    Value::Text(v) => builder.append_value(v),
                    Value::Null => builder.append_null(),
                    other => return Err(mismatch(other)),
                }
            }
            Arc::new(builder.finish())
        }
    };
    Ok(array)
}

/// Drain an operator into Arrow batches of at most `batch_size` rows.
///
/// The operator is closed afterwards, also when pulling fails. An operator
/// that produces no rows yields no batches.
pub fn collect_batches(op: &mut dyn Operator, batch_size: usize) -> Result<Vec<RecordBatch>> {
    let batch_size = batch_size.max(1);
    let schema = op.schema();
    let mut batches = Vec::new();
    let mut buffer: Vec<Row> = Vec::with_capacity(batch_size.min(MAX_BATCH_RESERVATION));

    let pulled = loop {
        match op.next() {
            Ok(Some(row)) => {
                buffer.push(row);
                if buffer.len() == batch_size {
                    match rows_to_record_batch(&schema, &buffer) {
                        Ok(batch) => batches.push(batch),
                        Err(e) => break Err(e),
                    }
                    buffer.clear();
                }
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    let closed = op.close();
    pulled?;
    closed?;

    if !buffer.is_empty() {
        batches.push(rows_to_record_batch(&schema, &buffer)?);
    }
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::operators::test_util::VecSource;
    use crate::types::Field;
    use arrow::array::{Array, Float64Array, Int64Array, StringArray};
    use arrow::datatypes::DataType as ArrowDataType;

    fn schema() -> Schema {
        Schema::new(vec![
            Field::new("id", DataType::Integer),
            Field::new("score", DataType::Float),
            Field::new("name", DataType::Text),
        ])
        .unwrap()
    }

    #[test]
    fn test_rows_to_record_batch() {
        let rows = vec![
            Row::new(vec![Value::Integer(1), Value::Float(0.5), Value::from("a")]),
            Row::new(vec![Value::Null, Value::Null, Value::Null]),
        ];
        let batch = rows_to_record_batch(&schema(), &rows).unwrap();
        assert_eq!(batch.num_rows(), 2);
        assert_eq!(batch.schema().field(0).data_type(), &ArrowDataType::Int64);
        assert_eq!(batch.schema().field(1).data_type(), &ArrowDataType::Float64);
        assert_eq!(batch.schema().field(2).data_type(), &ArrowDataType::Utf8);

        let ids = batch.column(0).as_any().downcast_ref::<Int64Array>().unwrap();
        assert_eq!(ids.value(0), 1);
        assert!(ids.is_null(1));
        let scores = batch.column(1).as_any().downcast_ref::<Float64Array>().unwrap();
        assert_eq!(scores.value(0), 0.5);
        let names = batch.column(2).as_any().downcast_ref::<StringArray>().unwrap();
        assert_eq!(names.value(0), "a");
        assert!(names.is_null(1));
    }

    #[test]
    fn test_type_mismatch_is_execution_error() {
        let rows = vec![Row::new(vec![
            Value::from("oops"),
            Value::Float(1.0),
            Value::from("a"),
        ])];
        assert!(matches!(
            rows_to_record_batch(&schema(), &rows),
            Err(QueryError::Execution(_))
        ));
    }

    #[test]
    fn test_collect_batches_splits_and_closes() {
        let source = VecSource::new(
            vec![("n", DataType::Integer)],
            (0..5).map(|i| vec![Value::Integer(i)]).collect(),
        );
        let closes = source.closes.clone();
        let mut op = source;
        let batches = collect_batches(&mut op, 2).unwrap();
        let sizes: Vec<usize> = batches.iter().map(|b| b.num_rows()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(closes.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_collect_batches_huge_batch_size() {
        let mut op = VecSource::new(
            vec![("n", DataType::Integer)],
            (0..3).map(|i| vec![Value::Integer(i)]).collect(),
        );
        let batches = collect_batches(&mut op, usize::MAX).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].num_rows(), 3);
    }

    #[test]
    fn test_collect_batches_empty_input() {
        let mut op = VecSource::new(vec![("n", DataType::Integer)], vec![]);
        assert!(collect_batches(&mut op, 8).unwrap().is_empty());
    }
}
