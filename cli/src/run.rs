//! Dump execution: output selection and progress reporting

use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::info;

use sql_dumper_core::adapter::{DbAdapter, MssqlAdapter};
use sql_dumper_core::{DumpProgress, DumpSummary, Dumper};

use crate::config::DumperConfig;

pub type Output = BufWriter<Box<dyn AsyncWrite + Unpin + Send>>;

/// Connect to the configured database and write the script
pub async fn run(config: &DumperConfig, cancellation: CancellationToken) -> Result<DumpSummary> {
    let adapter = MssqlAdapter::from_connection_string(&config.connection_string)
        .context("Invalid SQLDUMP_CONNECTION_STRING")?;
    let mut output = open_output(config.output.as_deref()).await?;

    let result = dump_to(adapter, config, cancellation, &mut output).await;
    // partial output is flushed on failure too
    output.flush().await.context("Failed to flush output")?;
    result
}

/// Open the script destination, stdout when no path is given
pub async fn open_output(path: Option<&Path>) -> Result<Output> {
    let sink: Box<dyn AsyncWrite + Unpin + Send> = match path {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("Failed to create {}", path.display()))?;
            info!("Writing script to {}", path.display());
            Box::new(file)
        }
        None => Box::new(tokio::io::stdout()),
    };
    Ok(BufWriter::new(sink))
}

pub async fn dump_to<A, W>(
    adapter: A,
    config: &DumperConfig,
    cancellation: CancellationToken,
    writer: &mut W,
) -> Result<DumpSummary>
where
    A: DbAdapter,
    W: AsyncWrite + Unpin + Send,
{
    let progress_json = config.progress_json;
    let mut dumper = Dumper::new(adapter, config.dump_options())
        .with_cancellation(cancellation)
        .with_progress(move |progress| report_progress(progress, progress_json));

    let summary = dumper.dump(writer).await.context("Dump failed")?;
    Ok(summary)
}

fn report_progress(progress: &DumpProgress, as_json: bool) {
    if !progress.is_completed {
        return;
    }
    if as_json {
        match serde_json::to_string(progress) {
            Ok(line) => eprintln!("{}", line),
            Err(e) => tracing::warn!("Failed to serialize progress: {}", e),
        }
    } else {
        info!(
            "Finished {}.{}: {} rows",
            progress.schema, progress.table, progress.rows_dumped
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use sql_dumper_core::adapter::{RowSource, RowStream, SchemaSource};
    use sql_dumper_core::domain::{ColumnDescriptor, SelectQuery};
    use sql_dumper_core::{CellValue, CoreError, TableIdentity};

    /// One table `[dbo].[Colors]` with two rows
    struct FixtureAdapter;

    struct FixtureRows(Vec<Vec<CellValue>>);

    #[async_trait]
    impl RowStream for FixtureRows {
        async fn next_row(&mut self) -> sql_dumper_core::Result<Option<Vec<CellValue>>> {
            if self.0.is_empty() {
                Ok(None)
            } else {
                Ok(Some(self.0.remove(0)))
            }
        }
    }

    #[async_trait]
    impl SchemaSource for FixtureAdapter {
        async fn list_base_tables(&mut self) -> sql_dumper_core::Result<Vec<TableIdentity>> {
            Ok(vec![TableIdentity::new("dbo", "Colors")])
        }

        async fn list_columns(
            &mut self,
            _table: &TableIdentity,
        ) -> sql_dumper_core::Result<Vec<ColumnDescriptor>> {
            Ok(vec![
                ColumnDescriptor::new("Id", "int", Some(1)),
                ColumnDescriptor::new("Name", "nvarchar", None),
            ])
        }
    }

    #[async_trait]
    impl RowSource for FixtureAdapter {
        async fn open_rows<'a>(
            &'a mut self,
            _query: &SelectQuery,
        ) -> sql_dumper_core::Result<Box<dyn RowStream + 'a>> {
            Ok(Box::new(FixtureRows(vec![
                vec![CellValue::I32(1), CellValue::from("Red")],
                vec![CellValue::I32(2), CellValue::from("Grün")],
            ])))
        }
    }

    impl DbAdapter for FixtureAdapter {}

    fn config(output: &Path) -> DumperConfig {
        DumperConfig {
            connection_string: "Server=unused".to_string(),
            output: Some(output.to_path_buf()),
            use_go: true,
            statements_in_transaction: 0,
            rows_in_statement: 1,
            ignored_tables: vec![],
            progress_json: true,
        }
    }

    #[tokio::test]
    async fn test_dump_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.sql");
        let config = config(&path);

        let mut output = open_output(config.output.as_deref()).await.unwrap();
        let summary = dump_to(FixtureAdapter, &config, CancellationToken::new(), &mut output)
            .await
            .unwrap();
        output.shutdown().await.unwrap();

        assert_eq!(summary.tables_dumped, 1);
        assert_eq!(summary.rows_dumped, 2);

        let script = std::fs::read_to_string(&path).unwrap();
        assert!(script.starts_with("EXEC sp_MSforeachtable 'ALTER TABLE ? NOCHECK CONSTRAINT ALL'\n"));
        assert!(script.contains("  (1, 'Red');\nGO\nINSERT INTO [dbo].[Colors] ([Id], [Name]) VALUES\n"));
        assert!(script.contains("  (2, N'Grün');\n"));
        assert!(script.ends_with("WITH CHECK CHECK CONSTRAINT ALL'\nGO\n"));
    }

    #[tokio::test]
    async fn test_cancelled_dump_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir.path().join("dump.sql"));
        let token = CancellationToken::new();
        token.cancel();

        let mut sink: Vec<u8> = Vec::new();
        let err = dump_to(FixtureAdapter, &config, token, &mut sink)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CoreError>(),
            Some(CoreError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_unwritable_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("dump.sql");

        let Err(err) = open_output(Some(&path)).await else {
            panic!("expected an error for {}", path.display());
        };
        assert!(err.to_string().contains("Failed to create"));
    }
}
