//! SQL Dumper Core Library
//!
//! Contains the value model, database adapters, and the engine that turns
//! the data of a SQL Server database into a replayable INSERT script.

pub mod adapter;
pub mod domain;
pub mod dumper;
pub mod error;
pub mod formatters;
pub mod schema;
pub mod script;
pub mod sql_gen;
pub mod value;

pub use domain::{DumpOptions, DumpProgress, DumpSummary, TableIdentity};
pub use dumper::{Dumper, ProgressCallback};
pub use error::{CoreError, Result};
pub use value::CellValue;
