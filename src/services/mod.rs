pub mod builder;
pub mod job_logger;
pub mod queue;
pub mod storage;
pub mod store;
