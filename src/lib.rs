// ABOUTME: Library module for supabase-migrator
// ABOUTME: Exports the table and storage pipelines for use in the binary and tests

pub mod commands;
pub mod config;
pub mod error;
pub mod migration;
pub mod postgres;
pub mod storage;
pub mod utils;
