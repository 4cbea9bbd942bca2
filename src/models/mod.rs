pub mod api;
pub mod job;
pub mod package;
pub mod progress;
