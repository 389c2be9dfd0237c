//! Dump orchestration: walks the catalog and writes the whole script

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapter::DbAdapter;
use crate::domain::{DumpOptions, DumpProgress, DumpSummary, SelectQuery, TableIdentity};
use crate::error::{CoreError, Result};
use crate::formatters::bind_formatters;
use crate::schema::{build_table_descriptor, list_exportable_tables};
use crate::script::{separator_line, TableScript};
use crate::sql_gen::SqlGenerator;

/// Receives progress notifications while a dump runs
pub type ProgressCallback = Box<dyn FnMut(&DumpProgress) + Send>;

/// Writes an INSERT script recreating the data of every base table.
///
/// Tables are processed one after another in catalog order, and rows are
/// streamed from the adapter straight into the writer.
pub struct Dumper<A: DbAdapter> {
    adapter: A,
    options: DumpOptions,
    progress: Option<ProgressCallback>,
    cancellation: CancellationToken,
}

impl<A: DbAdapter> Dumper<A> {
    pub fn new(adapter: A, options: DumpOptions) -> Self {
        Self {
            adapter,
            options,
            progress: None,
            cancellation: CancellationToken::new(),
        }
    }

    /// Report progress after every row and once per finished table
    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&DumpProgress) + Send + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Stop the dump with `CoreError::Cancelled` once the token fires
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn options(&self) -> &DumpOptions {
        &self.options
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn into_adapter(self) -> A {
        self.adapter
    }

    /// Write the complete script.
    ///
    /// The adapter is released on every path once it was opened. Output that
    /// was already written stays in the writer when an error occurs.
    pub async fn dump<W>(&mut self, writer: &mut W) -> Result<DumpSummary>
    where
        W: AsyncWrite + Unpin + Send,
    {
        self.options.validate()?;
        self.adapter.open().await?;

        let result = self.write_script(writer).await;
        let released = self.adapter.release().await;

        let summary = result?;
        released?;

        info!(
            "Dump finished: {} tables, {} rows",
            summary.tables_dumped, summary.rows_dumped
        );
        Ok(summary)
    }

    async fn write_script<W>(&mut self, writer: &mut W) -> Result<DumpSummary>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let prologue = format!("{}\n", SqlGenerator::disable_constraints());
        writer.write_all(prologue.as_bytes()).await?;

        let tables = list_exportable_tables(&mut self.adapter, &self.options).await?;
        info!("Dumping {} tables", tables.len());

        let mut summary = DumpSummary::default();
        for table in &tables {
            self.check_cancelled()?;
            summary.rows_dumped += self.dump_table(table, writer).await?;
            summary.tables_dumped += 1;
        }

        let epilogue = format!(
            "\n{}\n{}",
            SqlGenerator::enable_constraints(),
            separator_line(&self.options)
        );
        writer.write_all(epilogue.as_bytes()).await?;
        writer.flush().await?;

        Ok(summary)
    }

    async fn dump_table<W>(&mut self, table: &TableIdentity, writer: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let Self {
            adapter,
            options,
            progress,
            cancellation,
        } = self;

        info!("Dumping table {}", table);

        let columns = adapter.list_columns(table).await?;
        let descriptor = build_table_descriptor(table, &columns);
        let bindings = bind_formatters(&columns);

        let mut script = TableScript::new(&descriptor.full_name, &bindings, options)?;
        script.write_header(writer).await?;

        if bindings.is_empty() {
            warn!("Table {} has no exportable columns, skipping rows", table);
        } else {
            let query = SelectQuery::from(&descriptor);
            let mut rows = adapter.open_rows(&query).await?;
            debug!("Opened row stream for {}", descriptor.full_name);

            loop {
                if cancellation.is_cancelled() {
                    return Err(CoreError::Cancelled);
                }
                let Some(row) = rows.next_row().await? else {
                    break;
                };
                script.write_row(writer, &row).await?;
                report(progress, table, script.rows_emitted(), false);
            }
        }

        let count = script.finish(writer).await?;
        report(progress, table, count, true);
        info!("Dumped {} rows from {}", count, table);

        Ok(count)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        Ok(())
    }
}

fn report(progress: &mut Option<ProgressCallback>, table: &TableIdentity, rows: u64, completed: bool) {
    if let Some(callback) = progress.as_mut() {
        callback(&DumpProgress {
            schema: table.schema.clone(),
            table: table.name.clone(),
            rows_dumped: rows,
            is_completed: completed,
        });
    }
}
