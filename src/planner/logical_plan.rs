// Resolved query plan handed to the executor

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::types::Value;

/// Comparison operators allowed in a predicate conjunct
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    Eq,  // =
    Lt,  // <
    Gt,  // >
    Le,  // <=
    Ge,  // >=
    Neq, // != or <>
}

impl Comparator {
    /// Whether an ordering between a row value and a literal satisfies this comparator
    pub fn matches(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Comparator::Eq => ordering == Equal,
            Comparator::Lt => ordering == Less,
            Comparator::Gt => ordering == Greater,
            Comparator::Le => ordering != Greater,
            Comparator::Ge => ordering != Less,
            Comparator::Neq => ordering != Equal,
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Comparator::Eq => "=",
            Comparator::Lt => "<",
            Comparator::Gt => ">",
            Comparator::Le => "<=",
            Comparator::Ge => ">=",
            Comparator::Neq => "!=",
        };
        f.write_str(symbol)
    }
}

/// One WHERE conjunct: `column comparator literal`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonExpr {
    pub column: String,
    pub comparator: Comparator,
    pub value: Value,
}

impl ComparisonExpr {
    pub fn new(column: impl Into<String>, comparator: Comparator, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            comparator,
            value: value.into(),
        }
    }
}

/// Aggregate function for scalar and GROUP BY aggregations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFunction {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
            AggregateFunction::Avg => "AVG",
        };
        f.write_str(name)
    }
}

/// An aggregation expression: function, optional column (None for Count(*)), and output alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub function: AggregateFunction,
    pub column: Option<String>,
    pub alias: String,
}

/// Expression for ORDER BY: column name and direction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderByExpr {
    pub column: String,
    pub ascending: bool,
}

/// LIMIT n [OFFSET m]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitSpec {
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
}

/// Output columns of a query
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Projection {
    /// SELECT *
    #[default]
    All,
    Columns(Vec<String>),
}

/// A fully resolved query over a single delimited source.
///
/// Produced by whatever front end parses query text. The executor wires it as
/// Scan -> Filter -> Aggregate -> Sort -> Limit -> Project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub source: PathBuf,
    #[serde(default)]
    pub projection: Projection,
    /// Conjuncts of the WHERE clause (AND only)
    #[serde(default)]
    pub predicates: Vec<ComparisonExpr>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub aggregates: Vec<Aggregation>,
    #[serde(default)]
    pub order_by: Option<OrderByExpr>,
    /// Overrides the engine's sort chunk size for this query
    #[serde(default)]
    pub sort_chunk_size: Option<usize>,
    #[serde(default)]
    pub limit: Option<LimitSpec>,
}

impl PlanRequest {
    /// A `SELECT * FROM source` plan
    pub fn scan(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            projection: Projection::All,
            predicates: Vec::new(),
            group_by: Vec::new(),
            aggregates: Vec::new(),
            order_by: None,
            sort_chunk_size: None,
            limit: None,
        }
    }

    /// Whether the plan needs an aggregate stage
    pub fn is_aggregate(&self) -> bool {
        !self.aggregates.is_empty() || !self.group_by.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_comparator_matches() {
        assert!(Comparator::Eq.matches(Ordering::Equal));
        assert!(!Comparator::Eq.matches(Ordering::Less));
        assert!(Comparator::Le.matches(Ordering::Less));
        assert!(Comparator::Le.matches(Ordering::Equal));
        assert!(!Comparator::Ge.matches(Ordering::Less));
        assert!(Comparator::Neq.matches(Ordering::Greater));
        assert!(!Comparator::Neq.matches(Ordering::Equal));
    }

    #[test]
    fn test_plan_request_from_json() {
        let json = r#"{
            "source": "sales.csv",
            "predicates": [{"column": "amount", "comparator": "Gt", "value": {"Integer": 100}}],
            "order_by": {"column": "amount", "ascending": false},
            "limit": {"limit": 5}
        }"#;
        let plan: PlanRequest = serde_json::from_str(json).unwrap();
        assert_eq!(plan.projection, Projection::All);
        assert_eq!(plan.predicates[0].value, Value::Integer(100));
        assert_eq!(plan.limit, Some(LimitSpec { limit: 5, offset: 0 }));
        assert!(!plan.is_aggregate());
    }
}
