//! Domain types for the job pipeline.

pub mod config;
pub mod job;
pub mod report;
pub mod snapshot;
