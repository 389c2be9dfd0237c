//! Domain models for the SQL dumper

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{CoreError, Result};
use crate::formatters::Formatter;

/// Default number of rows combined into one INSERT statement
pub const DEFAULT_ROWS_IN_STATEMENT: usize = 100;

/// Default number of INSERT statements wrapped in one transaction
pub const DEFAULT_STATEMENTS_IN_TRANSACTION: usize = 1000;

/// A base table as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableIdentity {
    pub schema: String,
    pub name: String,
}

impl TableIdentity {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for TableIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Column information from the catalog.
///
/// Computed columns never make it into this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub native_type_name: String,
    /// Position in the primary key, absent for non-key columns
    pub ordinal_in_key: Option<i32>,
}

impl ColumnDescriptor {
    pub fn new(
        name: impl Into<String>,
        native_type_name: impl Into<String>,
        ordinal_in_key: Option<i32>,
    ) -> Self {
        Self {
            name: name.into(),
            native_type_name: native_type_name.into(),
            ordinal_in_key,
        }
    }
}

/// One entry of a SELECT list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectColumn {
    /// SQL expression as written into the query
    pub expression: String,
    /// Field name the expression produces in the result set
    pub output_name: String,
}

/// Everything needed to read one table in a deterministic order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Quoted `[schema].[name]`
    pub full_name: String,
    pub select_columns: Vec<SelectColumn>,
    /// Primary key columns by key ordinal; empty when the table has no key
    pub sort_columns: Vec<String>,
    pub all_column_names: Vec<String>,
}

impl TableDescriptor {
    pub fn is_empty(&self) -> bool {
        self.select_columns.is_empty()
    }
}

/// Query handed to a row source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    pub table: String,
    pub select_columns: Vec<SelectColumn>,
    pub order_by: Vec<String>,
}

impl From<&TableDescriptor> for SelectQuery {
    fn from(descriptor: &TableDescriptor) -> Self {
        Self {
            table: descriptor.full_name.clone(),
            select_columns: descriptor.select_columns.clone(),
            order_by: descriptor.sort_columns.clone(),
        }
    }
}

/// Formatter bound to one exported column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBinding {
    pub output_name: String,
    /// Position of the column in the row produced by the row source
    pub ordinal: usize,
    pub formatter: Formatter,
}

/// Options controlling how the script is split into statements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpOptions {
    /// Emit `GO` between script segments
    pub use_separator_statements: bool,
    /// Row batches per transaction; 0 disables transactions
    pub statements_per_transaction: usize,
    /// Rows per INSERT statement, at least 1
    pub rows_per_statement: usize,
    /// Table names (without schema) that are skipped entirely
    pub ignored_table_names: HashSet<String>,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            use_separator_statements: true,
            statements_per_transaction: DEFAULT_STATEMENTS_IN_TRANSACTION,
            rows_per_statement: DEFAULT_ROWS_IN_STATEMENT,
            ignored_table_names: HashSet::new(),
        }
    }
}

impl DumpOptions {
    pub fn validate(&self) -> Result<()> {
        if self.rows_per_statement == 0 {
            return Err(CoreError::Validation(
                "rows_per_statement must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_ignored_tables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignored_table_names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_ignored(&self, table_name: &str) -> bool {
        self.ignored_table_names.contains(table_name)
    }
}

/// Progress notification, emitted after every row and once per finished table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpProgress {
    pub schema: String,
    pub table: String,
    pub rows_dumped: u64,
    pub is_completed: bool,
}

/// Totals of a finished dump
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpSummary {
    pub tables_dumped: usize,
    pub rows_dumped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = DumpOptions::default();
        assert!(options.use_separator_statements);
        assert_eq!(options.statements_per_transaction, 1000);
        assert_eq!(options.rows_per_statement, 100);
        assert!(options.ignored_table_names.is_empty());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_zero_rows_per_statement_rejected() {
        let options = DumpOptions {
            rows_per_statement: 0,
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(CoreError::Validation(_))));
    }

    #[test]
    fn test_ignored_tables_are_case_sensitive() {
        let options = DumpOptions::default().with_ignored_tables(["AuditLog"]);
        assert!(options.is_ignored("AuditLog"));
        assert!(!options.is_ignored("auditlog"));
    }

    #[test]
    fn test_table_identity_display() {
        let table = TableIdentity::new("dbo", "Users");
        assert_eq!(table.to_string(), "dbo.Users");
    }

    #[test]
    fn test_progress_serialization() {
        let progress = DumpProgress {
            schema: "dbo".to_string(),
            table: "Users".to_string(),
            rows_dumped: 12,
            is_completed: true,
        };
        let json = serde_json::to_string(&progress).unwrap();
        assert!(json.contains("\"rows_dumped\":12"));
        assert!(json.contains("\"is_completed\":true"));
    }
}
