pub mod logical_plan;

pub use logical_plan::{
    AggregateFunction, Aggregation, Comparator, ComparisonExpr, LimitSpec, OrderByExpr,
    PlanRequest, Projection,
};
