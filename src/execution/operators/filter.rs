// Row filtering on a conjunction of comparisons

use crate::error::{QueryError, Result};
use crate::execution::operators::{BoxedOperator, Operator};
use crate::planner::logical_plan::{Comparator, ComparisonExpr};
use crate::types::{Row, Schema, SchemaRef, Value};

/// A single `column comparator literal` test against a resolved column index
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub column: usize,
    pub comparator: Comparator,
    pub literal: Value,
}

impl Comparison {
    pub fn new(column: usize, comparator: Comparator, literal: impl Into<Value>) -> Self {
        Self {
            column,
            comparator,
            literal: literal.into(),
        }
    }

    /// Resolve a named comparison against a schema
    ///
    /// # Errors
    /// Returns a schema error if the column does not exist
    pub fn resolve(expr: &ComparisonExpr, schema: &Schema) -> Result<Self> {
        let column = schema.index_of(&expr.column).ok_or_else(|| {
            QueryError::Schema(format!("filter column '{}' not found", expr.column))
        })?;
        Ok(Self::new(column, expr.comparator, expr.value.clone()))
    }

    /// Evaluate against one row.
    ///
    /// Integer and float operands compare numerically (integers promote when
    /// they meet a float), text compares lexicographically. Any pairing that
    /// cannot be compared, including a null, makes the comparison false.
    pub fn evaluate(&self, row: &Row) -> bool {
        row.value(self.column)
            .and_then(|v| v.partial_compare(&self.literal))
            .map_or(false, |ordering| self.comparator.matches(ordering))
    }
}

/// Conjunction (AND) of comparisons. An empty predicate accepts every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    conjuncts: Vec<Comparison>,
}

impl Predicate {
    pub fn new(conjuncts: Vec<Comparison>) -> Self {
        Self { conjuncts }
    }

    /// Resolve every named conjunct against a schema
    pub fn resolve(exprs: &[ComparisonExpr], schema: &Schema) -> Result<Self> {
        let conjuncts = exprs
            .iter()
            .map(|e| Comparison::resolve(e, schema))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(conjuncts))
    }

    pub fn conjuncts(&self) -> &[Comparison] {
        &self.conjuncts
    }

    pub fn is_empty(&self) -> bool {
        self.conjuncts.is_empty()
    }

    pub fn evaluate(&self, row: &Row) -> bool {
        self.conjuncts.iter().all(|c| c.evaluate(row))
    }
}

/// Filter operator that passes through only rows satisfying its predicate
pub struct FilterOperator {
    input: BoxedOperator,
    predicate: Predicate,
    schema: SchemaRef,
}

impl FilterOperator {
    /// Create a new Filter operator
    ///
    /// # Arguments
    /// * `input` - Upstream operator
    /// * `predicate` - Conjunction of comparisons, already resolved against the input schema
    pub fn new(input: BoxedOperator, predicate: Predicate) -> Self {
        // Filter doesn't change the schema, so output schema is same as input
        let schema = input.schema();
        Self {
            input,
            predicate,
            schema,
        }
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

impl Operator for FilterOperator {
    fn next(&mut self) -> Result<Option<Row>> {
        while let Some(row) = self.input.next()? {
            if self.predicate.evaluate(&row) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        self.input.close()
    }

    fn schema(&self) -> SchemaRef {
        self.schema.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::operators::drain;
    use crate::execution::operators::test_util::VecSource;
    use crate::types::DataType;
    use std::sync::atomic::Ordering;

    fn people() -> VecSource {
        VecSource::new(
            vec![
                ("id", DataType::Integer),
                ("score", DataType::Float),
                ("name", DataType::Text),
            ],
            vec![
                vec![Value::Integer(1), Value::Float(9.5), Value::from("carol")],
                vec![Value::Integer(2), Value::Float(4.0), Value::from("alice")],
                vec![Value::Integer(3), Value::Float(7.25), Value::from("bob")],
                vec![Value::Integer(4), Value::Float(4.0), Value::from("dave")],
            ],
        )
    }

    fn ids(rows: &[Row]) -> Vec<i64> {
        rows.iter()
            .map(|r| match r.value(0) {
                Some(Value::Integer(v)) => *v,
                other => panic!("unexpected {:?}", other),
            })
            .collect()
    }

    fn run(conjuncts: Vec<Comparison>) -> Vec<i64> {
        let mut op = FilterOperator::new(Box::new(people()), Predicate::new(conjuncts));
        ids(&drain(&mut op).unwrap())
    }

    #[test]
    fn test_integer_comparisons() {
        assert_eq!(run(vec![Comparison::new(0, Comparator::Eq, 2)]), vec![2]);
        assert_eq!(run(vec![Comparison::new(0, Comparator::Lt, 3)]), vec![1, 2]);
        assert_eq!(run(vec![Comparison::new(0, Comparator::Le, 3)]), vec![1, 2, 3]);
        assert_eq!(run(vec![Comparison::new(0, Comparator::Gt, 3)]), vec![4]);
        assert_eq!(run(vec![Comparison::new(0, Comparator::Ge, 3)]), vec![3, 4]);
        assert_eq!(run(vec![Comparison::new(0, Comparator::Neq, 3)]), vec![1, 2, 4]);
    }

    #[test]
    fn test_numeric_promotion() {
        // integer column against a float literal
        assert_eq!(run(vec![Comparison::new(0, Comparator::Gt, 2.5)]), vec![3, 4]);
        // float column against an integer literal
        assert_eq!(run(vec![Comparison::new(1, Comparator::Eq, 4)]), vec![2, 4]);
    }

    #[test]
    fn test_text_comparison_is_lexicographic() {
        assert_eq!(run(vec![Comparison::new(2, Comparator::Lt, "c")]), vec![2, 3]);
        assert_eq!(run(vec![Comparison::new(2, Comparator::Eq, "dave")]), vec![4]);
    }

    #[test]
    fn test_type_mismatch_is_false() {
        assert!(run(vec![Comparison::new(2, Comparator::Neq, 5)]).is_empty());
        assert!(run(vec![Comparison::new(0, Comparator::Neq, "1")]).is_empty());
    }

    #[test]
    fn test_conjunction() {
        let conjuncts = vec![
            Comparison::new(1, Comparator::Ge, 4.0),
            Comparison::new(0, Comparator::Neq, 1),
            Comparison::new(2, Comparator::Gt, "b"),
        ];
        assert_eq!(run(conjuncts), vec![3, 4]);
    }

    #[test]
    fn test_null_never_matches() {
        let row = Row::new(vec![Value::Null]);
        assert!(!Comparison::new(0, Comparator::Eq, 1).evaluate(&row));
        assert!(!Comparison::new(0, Comparator::Neq, 1).evaluate(&row));
    }

    #[test]
    fn test_resolve_unknown_column() {
        let source = people();
        let schema = source.schema();
        let err = Predicate::resolve(
            &[ComparisonExpr::new("age", Comparator::Gt, 3)],
            &schema,
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::Schema(_)));
    }

    #[test]
    fn test_close_propagates() {
        let source = people();
        let closes = source.closes.clone();
        let mut op = FilterOperator::new(Box::new(source), Predicate::default());
        op.close().unwrap();
        op.close().unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }
}
