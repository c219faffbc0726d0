//! SQL processing module
//!
//! This module provides:
//! - `parser`: SQL lexer and parser
//! - `types`: scalar values and column types
//! - `schema`: Table and column schema definitions
//! - `eval`: expression evaluation, shared with store predicates
//! - `plan`: Execution plan generation
//! - `executor`: Query execution over catalog views
//! - `engine`: the view-based SQL engine

pub mod engine;
pub mod eval;
pub mod executor;
pub mod parser;
pub mod plan;
pub mod schema;
pub mod types;
