pub mod batch;
pub mod executor;
pub mod operators;

pub use batch::RecordBatch;
pub use executor::Executor;
