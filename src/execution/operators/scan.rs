// Scan delimited flat files

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use crate::error::{QueryError, Result};
use crate::execution::operators::Operator;
use crate::storage::csv_reader::DelimitedReader;
use crate::types::{DataType, Field, Row, Schema, SchemaRef};

type SourceReader = DelimitedReader<Box<dyn BufRead + Send>>;

/// Scan operator that streams typed rows out of a delimited source.
///
/// Column names come from the header row. Column types are inferred from the
/// first data row alone and never revisited; later values that do not parse
/// as their column's numeric type become 0 / 0.0 rather than failing the row.
pub struct ScanOperator {
    name: String,
    reader: Option<SourceReader>,
    schema: SchemaRef,
    /// First data row, parsed during inference and handed out by the first `next()`
    pending: Option<Row>,
    rows_read: u64,
}

impl ScanOperator {
    /// Open a delimited file
    ///
    /// # Arguments
    /// * `path` - Path to the file to scan
    /// * `delimiter` - Field delimiter, or `None` to detect it from the header
    pub fn open<P: AsRef<Path>>(path: P, delimiter: Option<u8>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::from_reader(
            path.to_string_lossy(),
            Box::new(BufReader::new(file)),
            delimiter,
        )
    }

    /// Create a scan over any buffered byte source
    ///
    /// # Arguments
    /// * `name` - Identifier used in logs and error messages
    /// * `source` - The delimited bytes, header row first
    /// * `delimiter` - Field delimiter, or `None` to detect it from the header
    pub fn from_reader(
        name: impl Into<String>,
        source: Box<dyn BufRead + Send>,
        delimiter: Option<u8>,
    ) -> Result<Self> {
        let name = name.into();
        let mut reader = DelimitedReader::new(source, delimiter);

        let header = reader
            .read_record()?
            .ok_or_else(|| QueryError::Parse(format!("{}: missing header row", name)))?;

        let first = reader.read_record()?;
        let types: Vec<DataType> = match &first {
            Some(record) => {
                check_width(&name, header.len(), record, reader.record_line())?;
                record.iter().map(|raw| DataType::infer(raw)).collect()
            }
            // no data rows: nothing to infer from
            None => vec![DataType::Text; header.len()],
        };

        let fields = header
            .iter()
            .zip(&types)
            .map(|(column, dt)| Field::new(column.clone(), *dt))
            .collect();
        let schema = Schema::new(fields).map_err(|e| match e {
            QueryError::Schema(msg) => QueryError::Parse(format!("{}: bad header: {}", name, msg)),
            other => other,
        })?;

        let pending = first.map(|record| parse_record(&schema, &record));

        tracing::debug!(
            source = %name,
            columns = ?schema.column_names(),
            types = ?types,
            "opened scan"
        );

        Ok(Self {
            name,
            reader: Some(reader),
            schema: Arc::new(schema),
            pending,
            rows_read: 0,
        })
    }

    /// Number of rows handed out so far
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }
}

fn check_width(name: &str, expected: usize, record: &[String], line: u64) -> Result<()> {
    if record.len() != expected {
        return Err(QueryError::Parse(format!(
            "{}: line {} has {} fields, header has {}",
            name,
            line,
            record.len(),
            expected
        )));
    }
    Ok(())
}

fn parse_record(schema: &Schema, record: &[String]) -> Row {
    let values = schema
        .fields()
        .iter()
        .zip(record)
        .map(|(field, raw)| field.data_type().parse_value(raw))
        .collect();
    Row::new(values)
}

impl Operator for ScanOperator {
    fn next(&mut self) -> Result<Option<Row>> {
        if let Some(row) = self.pending.take() {
            self.rows_read += 1;
            return Ok(Some(row));
        }

        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };
        match reader.read_record()? {
            Some(record) => {
                check_width(&self.name, self.schema.len(), &record, reader.record_line())?;
                self.rows_read += 1;
                Ok(Some(parse_record(&self.schema, &record)))
            }
            None => {
                // release the file as soon as it is exhausted
                self.reader = None;
                Ok(None)
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.reader = None;
        self.pending = None;
        Ok(())
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use std::io::Cursor;

    fn scan_str(input: &str) -> Result<ScanOperator> {
        ScanOperator::from_reader("test", Box::new(Cursor::new(input.to_string())), None)
    }

    #[test]
    fn test_infers_types_from_first_row() {
        let scan = scan_str("id,price,name,note\n1,2.5,apple,\n2,3,pear,x\n").unwrap();
        let schema = scan.schema();
        let types: Vec<DataType> = schema.fields().iter().map(|f| f.data_type()).collect();
        assert_eq!(
            types,
            vec![DataType::Integer, DataType::Float, DataType::Text, DataType::Text]
        );
    }

    #[test]
    fn test_first_row_returned_first() {
        let mut scan = scan_str("id,name\n1,a\n2,b\n").unwrap();
        assert_eq!(
            scan.next().unwrap().unwrap().values(),
            &[Value::Integer(1), Value::from("a")]
        );
        assert_eq!(
            scan.next().unwrap().unwrap().values(),
            &[Value::Integer(2), Value::from("b")]
        );
        assert!(scan.next().unwrap().is_none());
        assert!(scan.next().unwrap().is_none());
        assert_eq!(scan.rows_read(), 2);
    }

    #[test]
    fn test_later_mismatch_zero_fills() {
        let mut scan = scan_str("qty,ratio\n5,0.5\nmany,unknown\n").unwrap();
        scan.next().unwrap();
        let row = scan.next().unwrap().unwrap();
        assert_eq!(row.values(), &[Value::Integer(0), Value::Float(0.0)]);
    }

    #[test]
    fn test_header_only_source() {
        let mut scan = scan_str("a,b\n").unwrap();
        assert!(scan
            .schema()
            .fields()
            .iter()
            .all(|f| f.data_type() == DataType::Text));
        assert!(scan.next().unwrap().is_none());
    }

    #[test]
    fn test_missing_header_is_parse_error() {
        assert!(matches!(scan_str(""), Err(QueryError::Parse(_))));
    }

    #[test]
    fn test_record_width_mismatch() {
        assert!(matches!(
            scan_str("a,b\n1\n"),
            Err(QueryError::Parse(_))
        ));

        let mut scan = scan_str("a,b\n1,2\n3,4,5\n").unwrap();
        scan.next().unwrap();
        let err = scan.next().unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut scan = scan_str("a\n1\n2\n").unwrap();
        scan.close().unwrap();
        scan.close().unwrap();
        assert!(scan.next().unwrap().is_none());
    }

    #[test]
    fn test_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.tsv");
        std::fs::write(&path, "id\tscore\n7\t1.5\n").unwrap();

        let mut scan = ScanOperator::open(&path, None).unwrap();
        assert_eq!(
            scan.next().unwrap().unwrap().values(),
            &[Value::Integer(7), Value::Float(1.5)]
        );


        assert!(matches!(
            ScanOperator::open(dir.path().join("missing.csv"), None),
            Err(QueryError::Io(_))
        ));
    }
}
