//! Batched INSERT script emission for a single table

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::domain::{ColumnBinding, DumpOptions};
use crate::error::{CoreError, Result};
use crate::sql_gen::{SqlGenerator, SEPARATOR};
use crate::value::CellValue;

/// Emission state of one table.
///
/// Row batches hold `rows_per_statement` tuples each; every
/// `statements_per_transaction` batches are wrapped in a transaction.
/// The counters start at zero for every table.
pub struct TableScript<'a> {
    full_table_name: &'a str,
    bindings: &'a [ColumnBinding],
    options: &'a DumpOptions,
    column_list: String,
    rows_emitted: u64,
}

impl<'a> TableScript<'a> {
    /// Fails when the options do not validate
    pub fn new(
        full_table_name: &'a str,
        bindings: &'a [ColumnBinding],
        options: &'a DumpOptions,
    ) -> Result<Self> {
        options.validate()?;
        let column_list = SqlGenerator::column_list(bindings.iter().map(|b| b.output_name.as_str()));
        Ok(Self {
            full_table_name,
            bindings,
            options,
            column_list,
            rows_emitted: 0,
        })
    }

    pub fn rows_emitted(&self) -> u64 {
        self.rows_emitted
    }

    /// Blank line and `-- Table` comment
    pub async fn write_header<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let header = format!("\n{}\n", SqlGenerator::table_comment(self.full_table_name));
        writer.write_all(header.as_bytes()).await?;
        Ok(())
    }

    /// Append one row, opening statements and transactions as needed
    pub async fn write_row<W>(&mut self, writer: &mut W, row: &[CellValue]) -> Result<()>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut text = self.batch_prefix();

        let mut values = Vec::with_capacity(self.bindings.len());
        for binding in self.bindings {
            let cell = row.get(binding.ordinal).ok_or_else(|| {
                CoreError::row_read(
                    self.full_table_name,
                    format!("missing value for column {}", binding.output_name),
                )
            })?;
            values.push(binding.formatter.format(cell));
        }
        text.push_str("  (");
        text.push_str(&values.join(", "));
        text.push(')');

        writer.write_all(text.as_bytes()).await?;
        self.rows_emitted += 1;
        Ok(())
    }

    /// Close the open statement, transaction and identity-insert scope.
    ///
    /// Returns the number of rows written for the table.
    pub async fn finish<W>(self, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        if self.rows_emitted > 0 {
            let mut text = String::from(";\n");
            if self.options.statements_per_transaction > 0 {
                text.push_str("COMMIT;\n");
            }
            text.push_str(&SqlGenerator::identity_insert(self.full_table_name, false));
            text.push('\n');
            text.push_str(&self.separator());
            writer.write_all(text.as_bytes()).await?;
        }
        Ok(self.rows_emitted)
    }

    /// Text written before the tuple of the current row
    fn batch_prefix(&self) -> String {
        let rows_per_statement = self.options.rows_per_statement as u64;
        if self.rows_emitted % rows_per_statement != 0 {
            return ",\n".to_string();
        }

        let first = self.rows_emitted == 0;
        let mut text = String::new();
        if first {
            text.push_str(&SqlGenerator::identity_insert(self.full_table_name, true));
            text.push('\n');
        } else {
            text.push_str(";\n");
        }

        let statements_per_transaction = self.options.statements_per_transaction as u64;
        if statements_per_transaction == 0 {
            if !first {
                text.push_str(&self.separator());
            }
        } else if (self.rows_emitted / rows_per_statement) % statements_per_transaction == 0 {
            if !first {
                text.push_str("COMMIT;\n");
                text.push_str(&self.separator());
                text.push('\n');
            }
            text.push_str("BEGIN TRANSACTION;\n");
        }

        text.push_str(&SqlGenerator::insert_header(self.full_table_name, &self.column_list));
        text.push('\n');
        text
    }

    fn separator(&self) -> String {
        separator_line(self.options)
    }
}

/// `GO` line, or nothing when separators are disabled
pub(crate) fn separator_line(options: &DumpOptions) -> String {
    if options.use_separator_statements {
        format!("{}\n", SEPARATOR)
    } else {
        String::new()
    }
}
