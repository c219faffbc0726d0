//! lsql - an interactive SQL shell over a key/value table store
//!
//! This crate provides:
//! - A table store over pluggable byte-level storage engines (memory, append-only log file)
//! - A read-only SQL engine (lexer, parser, planner, executors) over materialized table views
//! - The session controller: dot-command mutations, a view cache mirroring store tables
//!   into the engine, and drift-aware query retries
//! - A readline front end with completion and persistent history

pub mod config;
pub mod error;
pub mod import;
pub mod interrupt;
pub mod shell;
pub mod sql;
pub mod storage;
pub mod store;
