//! Database adapter abstraction consumed by the dump engine

use crate::domain::{ColumnDescriptor, SelectQuery, TableIdentity};
use crate::error::Result;
use crate::value::CellValue;
use async_trait::async_trait;

pub mod mssql;

pub use mssql::MssqlAdapter;

/// Catalog metadata of the source database
#[async_trait]
pub trait SchemaSource: Send {
    /// List every base table as (schema, name), in any order
    async fn list_base_tables(&mut self) -> Result<Vec<TableIdentity>>;

    /// List the non-computed columns of a table, ordered by primary key
    /// ordinal (non-key columns last) and then by column name
    async fn list_columns(&mut self, table: &TableIdentity) -> Result<Vec<ColumnDescriptor>>;
}

/// Forward-only cursor over the rows of one query
#[async_trait]
pub trait RowStream: Send {
    /// Next row with one cell per selected column, `None` once exhausted
    async fn next_row(&mut self) -> Result<Option<Vec<CellValue>>>;
}

/// Source of table rows.
///
/// The stream borrows the source, so it has to be dropped before the next
/// metadata query is issued on the same connection.
#[async_trait]
pub trait RowSource: Send {
    async fn open_rows<'a>(&'a mut self, query: &SelectQuery) -> Result<Box<dyn RowStream + 'a>>;
}

/// Complete adapter: metadata, rows and the connection lifetime around a dump
#[async_trait]
pub trait DbAdapter: SchemaSource + RowSource {
    /// Make sure the connection is usable
    async fn open(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release the connection if the adapter owns it
    async fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory adapter used by engine tests
#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use crate::error::CoreError;
    use std::collections::VecDeque;

    #[derive(Debug, Clone)]
    pub struct MemoryTable {
        pub identity: TableIdentity,
        pub columns: Vec<ColumnDescriptor>,
        pub rows: Vec<Vec<CellValue>>,
        /// Fail with a read error after yielding this many rows
        pub fail_after: Option<usize>,
    }

    impl MemoryTable {
        pub fn new(
            schema: &str,
            name: &str,
            columns: Vec<ColumnDescriptor>,
            rows: Vec<Vec<CellValue>>,
        ) -> Self {
            Self {
                identity: TableIdentity::new(schema, name),
                columns,
                rows,
                fail_after: None,
            }
        }
    }

    #[derive(Debug, Default)]
    pub struct MemoryAdapter {
        pub tables: Vec<MemoryTable>,
        pub queries: Vec<String>,
        pub opened: bool,
        pub released: bool,
    }

    impl MemoryAdapter {
        pub fn new(tables: Vec<MemoryTable>) -> Self {
            Self {
                tables,
                ..Default::default()
            }
        }

        fn find(&self, full_name: &str) -> Option<&MemoryTable> {
            self.tables.iter().find(|t| {
                crate::sql_gen::SqlGenerator::full_table_name(&t.identity.schema, &t.identity.name)
                    == full_name
            })
        }
    }

    struct MemoryRows {
        rows: VecDeque<Vec<CellValue>>,
        table: String,
        remaining_before_failure: Option<usize>,
    }

    #[async_trait]
    impl RowStream for MemoryRows {
        async fn next_row(&mut self) -> Result<Option<Vec<CellValue>>> {
            if let Some(remaining) = self.remaining_before_failure.as_mut() {
                if *remaining == 0 {
                    return Err(CoreError::row_read(&self.table, "connection reset"));
                }
                *remaining -= 1;
            }
            Ok(self.rows.pop_front())
        }
    }

    #[async_trait]
    impl SchemaSource for MemoryAdapter {
        async fn list_base_tables(&mut self) -> Result<Vec<TableIdentity>> {
            Ok(self.tables.iter().map(|t| t.identity.clone()).collect())
        }

        async fn list_columns(&mut self, table: &TableIdentity) -> Result<Vec<ColumnDescriptor>> {
            self.tables
                .iter()
                .find(|t| &t.identity == table)
                .map(|t| t.columns.clone())
                .ok_or_else(|| CoreError::metadata(format!("unknown table {}", table)))
        }
    }

    #[async_trait]
    impl RowSource for MemoryAdapter {
        async fn open_rows<'a>(
            &'a mut self,
            query: &SelectQuery,
        ) -> Result<Box<dyn RowStream + 'a>> {
            self.queries
                .push(crate::sql_gen::SqlGenerator::generate_select_query(query));
            let table = self
                .find(&query.table)
                .ok_or_else(|| CoreError::row_read(&query.table, "unknown table"))?;

            let mut rows: Vec<Vec<CellValue>> = table.rows.clone();
            // emulate ORDER BY on the key columns
            let key_positions: Vec<usize> = query
                .order_by
                .iter()
                .filter_map(|key| {
                    query
                        .select_columns
                        .iter()
                        .position(|c| &c.output_name == key)
                })
                .collect();
            if !key_positions.is_empty() {
                rows.sort_by(|a, b| {
                    key_positions
                        .iter()
                        .map(|&i| compare_cells(&a[i], &b[i]))
                        .find(|o| o.is_ne())
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
            }

            Ok(Box::new(MemoryRows {
                rows: rows.into(),
                table: query.table.clone(),
                remaining_before_failure: table.fail_after,
            }))
        }
    }

    #[async_trait]
    impl DbAdapter for MemoryAdapter {
        async fn open(&mut self) -> Result<()> {
            self.opened = true;
            Ok(())
        }

        async fn release(&mut self) -> Result<()> {
            self.released = true;
            Ok(())
        }
    }

    fn compare_cells(a: &CellValue, b: &CellValue) -> std::cmp::Ordering {
        match (a, b) {
            (CellValue::I32(x), CellValue::I32(y)) => x.cmp(y),
            (CellValue::I64(x), CellValue::I64(y)) => x.cmp(y),
            (CellValue::Text(x), CellValue::Text(y)) => x.cmp(y),
            _ => std::cmp::Ordering::Equal,
        }
    }
}
