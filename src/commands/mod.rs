// ABOUTME: Command implementations for the two migration pipelines
// ABOUTME: Exports the tables and bucket commands

pub mod bucket;
pub mod tables;

pub use bucket::bucket;
pub use tables::tables;
