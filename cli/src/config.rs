//! Dumper configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use sql_dumper_core::domain::{DEFAULT_ROWS_IN_STATEMENT, DEFAULT_STATEMENTS_IN_TRANSACTION};
use sql_dumper_core::DumpOptions;

/// Dumper configuration
#[derive(Debug, Clone)]
pub struct DumperConfig {
    /// ADO.NET style connection string of the source database
    pub connection_string: String,
    /// Script destination, stdout when absent
    pub output: Option<PathBuf>,
    pub use_go: bool,
    pub statements_in_transaction: usize,
    pub rows_in_statement: usize,
    pub ignored_tables: Vec<String>,
    /// Print table completion events as JSON lines on stderr
    pub progress_json: bool,
}

impl DumperConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            connection_string: lookup("SQLDUMP_CONNECTION_STRING")
                .context("SQLDUMP_CONNECTION_STRING is required")?,
            output: lookup("SQLDUMP_OUTPUT")
                .filter(|path| !path.is_empty() && path != "-")
                .map(PathBuf::from),
            use_go: parse_bool(lookup("SQLDUMP_USE_GO"), true).context("Invalid SQLDUMP_USE_GO")?,
            statements_in_transaction: lookup("SQLDUMP_STATEMENTS_IN_TRANSACTION")
                .unwrap_or_else(|| DEFAULT_STATEMENTS_IN_TRANSACTION.to_string())
                .parse()
                .context("Invalid SQLDUMP_STATEMENTS_IN_TRANSACTION")?,
            rows_in_statement: lookup("SQLDUMP_ROWS_IN_STATEMENT")
                .unwrap_or_else(|| DEFAULT_ROWS_IN_STATEMENT.to_string())
                .parse()
                .context("Invalid SQLDUMP_ROWS_IN_STATEMENT")?,
            ignored_tables: lookup("SQLDUMP_IGNORED_TABLES")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|name| !name.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            progress_json: parse_bool(lookup("SQLDUMP_PROGRESS_JSON"), false)
                .context("Invalid SQLDUMP_PROGRESS_JSON")?,
        })
    }

    pub fn dump_options(&self) -> DumpOptions {
        DumpOptions {
            use_separator_statements: self.use_go,
            statements_per_transaction: self.statements_in_transaction,
            rows_per_statement: self.rows_in_statement,
            ..Default::default()
        }
        .with_ignored_tables(self.ignored_tables.iter().cloned())
    }
}

fn parse_bool(value: Option<String>, default: bool) -> Result<bool> {
    match value {
        None => Ok(default),
        Some(v) => match v.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => anyhow::bail!("expected a boolean, got {:?}", other),
        },
    }
}
