// Schema and row data model shared by every operator

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use arrow::datatypes::{DataType as ArrowDataType, Field as ArrowField, Schema as ArrowSchema};
use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};

/// Column type. Fixed per column for the lifetime of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Float,
    Text,
}

impl DataType {
    /// Infer a column type from a single raw value.
    /// Priority: Integer -> Float -> Text. An empty value is always Text.
    pub fn infer(raw: &str) -> Self {
        if raw.is_empty() {
            return DataType::Text;
        }
        if raw.parse::<i64>().is_ok() {
            DataType::Integer
        } else if raw.parse::<f64>().is_ok() {
            DataType::Float
        } else {
            DataType::Text
        }
    }

    /// Parse a raw value according to this type.
    ///
    /// A value that does not parse as the numeric type falls back to a typed
    /// zero instead of failing the row. Inference happens once per scan, so a
    /// column whose first row looked numeric silently zero-fills later text.
    pub fn parse_value(self, raw: &str) -> Value {
        match self {
            DataType::Integer => Value::Integer(raw.parse().unwrap_or(0)),
            DataType::Float => Value::Float(raw.parse().unwrap_or(0.0)),
            DataType::Text => Value::Text(raw.to_string()),
        }
    }

    pub fn to_arrow(self) -> ArrowDataType {
        match self {
            DataType::Integer => ArrowDataType::Int64,
            DataType::Float => ArrowDataType::Float64,
            DataType::Text => ArrowDataType::Utf8,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Integer => "Integer",
            DataType::Float => "Float",
            DataType::Text => "Text",
        };
        f.write_str(name)
    }
}

/// A named, typed column descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    name: String,
    data_type: DataType,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }
}

/// Ordered sequence of uniquely named columns
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

pub type SchemaRef = Arc<Schema>;

impl Schema {
    /// Create a schema from fields
    ///
    /// # Errors
    /// Returns a schema error if two fields share a name
    pub fn new(fields: Vec<Field>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(field.name()) {
                return Err(QueryError::Schema(format!(
                    "duplicate column name '{}'",
                    field.name()
                )));
            }
        }
        Ok(Self { fields })
    }

    pub fn empty() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of a column by name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }

    /// Like [`Schema::index_of`], but a missing column is a schema error.
    pub fn resolve(&self, name: &str) -> Result<usize> {
        self.index_of(name)
            .ok_or_else(|| QueryError::Schema(format!("column '{}' not found in schema", name)))
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name()).collect()
    }

    /// Arrow view of this schema. Every field is nullable because aggregates
    /// and projections may emit nulls for any column.
    pub fn to_arrow(&self) -> ArrowSchema {
        let fields: Vec<ArrowField> = self
            .fields
            .iter()
            .map(|f| ArrowField::new(f.name(), f.data_type().to_arrow(), true))
            .collect();
        ArrowSchema::new(fields)
    }
}

/// A single typed value. `Null` marks an absent value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Text(String),
    Null,
}

impl Value {
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Integer(_) => Some(DataType::Integer),
            Value::Float(_) => Some(DataType::Float),
            Value::Text(_) => Some(DataType::Text),
            Value::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view used by aggregation; integers promote to float.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Text(_) | Value::Null => None,
        }
    }

    /// Compare two values for predicate evaluation.
    ///
    /// Integers compare with integers, floats with floats, and an integer
    /// meeting a float is promoted. Text compares lexicographically. Any
    /// other pairing, a null, or a NaN is incomparable and yields `None`.
    pub fn partial_compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Ordering used by sorting and merging.
    ///
    /// Nulls sort before every other value and floats use total ordering, so
    /// the comparator is total over a column of one declared type. Mismatched
    /// non-null types compare equal rather than failing.
    pub fn sort_compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).total_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.total_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(v) => f.write_str(v),
            Value::Null => f.write_str("NULL"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// One tuple of values, positionally matching its operator's schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Self::new(values)
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str("\t")?;
            }
            write!(f, "{}", v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_type_priority() {
        assert_eq!(DataType::infer("42"), DataType::Integer);
        assert_eq!(DataType::infer("-7"), DataType::Integer);
        assert_eq!(DataType::infer("3.5"), DataType::Float);
        assert_eq!(DataType::infer("1e3"), DataType::Float);
        assert_eq!(DataType::infer("abc"), DataType::Text);
        assert_eq!(DataType::infer(""), DataType::Text);
    }

    #[test]
    fn test_parse_value_zero_fills() {
        assert_eq!(DataType::Integer.parse_value("12"), Value::Integer(12));
        assert_eq!(DataType::Integer.parse_value("oops"), Value::Integer(0));
        assert_eq!(DataType::Integer.parse_value("1.5"), Value::Integer(0));
        assert_eq!(DataType::Float.parse_value("n/a"), Value::Float(0.0));
        assert_eq!(DataType::Float.parse_value("2"), Value::Float(2.0));
        assert_eq!(
            DataType::Text.parse_value("12"),
            Value::Text("12".to_string())
        );
    }

    #[test]
    fn test_schema_rejects_duplicates() {
        let result = Schema::new(vec![
            Field::new("id", DataType::Integer),
            Field::new("id", DataType::Text),
        ]);
        assert!(matches!(result, Err(QueryError::Schema(_))));
    }

    #[test]
    fn test_schema_lookup() {
        let schema = Schema::new(vec![
            Field::new("id", DataType::Integer),
            Field::new("name", DataType::Text),
        ])
        .unwrap();
        assert_eq!(schema.index_of("name"), Some(1));
        assert_eq!(schema.index_of("missing"), None);
        assert!(schema.resolve("missing").is_err());
        assert_eq!(schema.column_names(), vec!["id", "name"]);

        let arrow = schema.to_arrow();
        assert_eq!(arrow.field(0).data_type(), &ArrowDataType::Int64);
        assert_eq!(arrow.field(1).data_type(), &ArrowDataType::Utf8);
    }

    #[test]
    fn test_partial_compare_promotion() {
        assert_eq!(
            Value::Integer(3).partial_compare(&Value::Float(3.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Float(2.0).partial_compare(&Value::Integer(2)),
            Some(Ordering::Equal)
        );
        assert_eq!(Value::Integer(3).partial_compare(&Value::from("3")), None);
        assert_eq!(Value::Null.partial_compare(&Value::Null), None);
        assert_eq!(
            Value::Float(f64::NAN).partial_compare(&Value::Float(1.0)),
            None
        );
    }

    #[test]
    fn test_sort_compare_mismatch_is_equal() {
        assert_eq!(
            Value::Integer(1).sort_compare(&Value::from("a")),
            Ordering::Equal
        );
        assert_eq!(Value::Null.sort_compare(&Value::Integer(-5)), Ordering::Less);
        assert_eq!(
            Value::from("b").sort_compare(&Value::from("a")),
            Ordering::Greater
        );
    }
}
