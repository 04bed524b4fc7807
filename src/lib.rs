// Public API for the query engine

pub mod config;
pub mod dataframe;
pub mod error;
pub mod execution;
pub mod planner;
pub mod storage;
pub mod types;

pub use config::EngineConfig;
pub use dataframe::DataFrame;
pub use error::{QueryError, Result};
pub use execution::Executor;
pub use planner::PlanRequest;
pub use types::{DataType, Field, Row, Schema, SchemaRef, Value};
