//! SQL Server adapter implementation on top of Tiberius

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures_util::stream::BoxStream;
use futures_util::TryStreamExt;
use tiberius::{Client, ColumnData, Config, FromSql, Query, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::adapter::{DbAdapter, RowSource, RowStream, SchemaSource};
use crate::domain::{ColumnDescriptor, SelectQuery, TableIdentity};
use crate::error::{CoreError, Result};
use crate::sql_gen::SqlGenerator;
use crate::value::CellValue;

/// Tiberius client over a tokio TCP stream
pub type MssqlClient = Client<Compat<TcpStream>>;

const TABLES_QUERY: &str = r#"
SELECT TABLE_SCHEMA, TABLE_NAME
FROM INFORMATION_SCHEMA.TABLES
WHERE TABLE_TYPE = 'BASE TABLE'
"#;

const COLUMNS_QUERY: &str = r#"
SELECT c.COLUMN_NAME, c.DATA_TYPE, k.ORDINAL_POSITION
FROM INFORMATION_SCHEMA.COLUMNS c
LEFT JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE k ON
    c.TABLE_SCHEMA = k.TABLE_SCHEMA AND
    c.TABLE_NAME = k.TABLE_NAME AND
    c.COLUMN_NAME = k.COLUMN_NAME AND
    OBJECTPROPERTY(OBJECT_ID(QUOTENAME(k.CONSTRAINT_SCHEMA) + '.' + QUOTENAME(k.CONSTRAINT_NAME)), 'IsPrimaryKey') = 1
WHERE c.TABLE_SCHEMA = @P1 AND c.TABLE_NAME = @P2
    AND COLUMNPROPERTY(OBJECT_ID(@P3), c.COLUMN_NAME, 'IsComputed') = 0
ORDER BY ISNULL(k.ORDINAL_POSITION, 30000), 1
"#;

/// SQL Server adapter
pub struct MssqlAdapter {
    /// Connection settings, present when the adapter may connect by itself
    config: Option<Config>,
    client: Option<MssqlClient>,
    /// Whether `release` closes the connection
    owns_connection: bool,
}

impl MssqlAdapter {
    /// Create an adapter owning its connection, opened lazily by `open`
    pub fn from_connection_string(connection_string: &str) -> Result<Self> {
        let config = Config::from_ado_string(connection_string)?;
        Ok(Self {
            config: Some(config),
            client: None,
            owns_connection: true,
        })
    }

    /// Create an adapter owning its connection and connect right away
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let mut adapter = Self::from_connection_string(connection_string)?;
        adapter.open().await?;
        Ok(adapter)
    }

    /// Wrap a caller-owned client; it is never closed by the adapter
    pub fn from_client(client: MssqlClient) -> Self {
        Self {
            config: None,
            client: Some(client),
            owns_connection: false,
        }
    }

    /// Hand the client back to the caller
    pub fn into_client(self) -> Option<MssqlClient> {
        self.client
    }

    pub fn owns_connection(&self) -> bool {
        self.owns_connection
    }

    fn client(&mut self) -> Result<&mut MssqlClient> {
        self.client
            .as_mut()
            .ok_or_else(|| CoreError::Internal("connection is not open".to_string()))
    }

    async fn establish(config: Config) -> Result<MssqlClient> {
        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;
        let client = Client::connect(config, tcp.compat_write()).await?;
        Ok(client)
    }
}

#[async_trait]
impl SchemaSource for MssqlAdapter {
    async fn list_base_tables(&mut self) -> Result<Vec<TableIdentity>> {
        let client = self.client()?;
        let rows = client
            .simple_query(TABLES_QUERY)
            .await
            .map_err(CoreError::metadata)?
            .into_first_result()
            .await
            .map_err(CoreError::metadata)?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            tables.push(TableIdentity {
                schema: get_string(&row, 0)?,
                name: get_string(&row, 1)?,
            });
        }

        debug!("Listed {} base tables", tables.len());
        Ok(tables)
    }

    async fn list_columns(&mut self, table: &TableIdentity) -> Result<Vec<ColumnDescriptor>> {
        let full_name = SqlGenerator::full_table_name(&table.schema, &table.name);
        let client = self.client()?;

        let mut query = Query::new(COLUMNS_QUERY);
        query.bind(table.schema.as_str());
        query.bind(table.name.as_str());
        query.bind(full_name.as_str());

        let rows = query
            .query(client)
            .await
            .map_err(CoreError::metadata)?
            .into_first_result()
            .await
            .map_err(CoreError::metadata)?;

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            columns.push(ColumnDescriptor {
                name: get_string(&row, 0)?,
                native_type_name: get_string(&row, 1)?,
                ordinal_in_key: row.try_get::<i32, _>(2).map_err(CoreError::metadata)?,
            });
        }

        debug!("Loaded {} columns for {}", columns.len(), full_name);
        Ok(columns)
    }
}

/// Streaming cursor over a Tiberius result set
struct MssqlRowStream<'a> {
    table: String,
    rows: BoxStream<'a, tiberius::Result<Row>>,
}

#[async_trait]
impl<'a> RowStream for MssqlRowStream<'a> {
    async fn next_row(&mut self) -> Result<Option<Vec<CellValue>>> {
        let row = match self.rows.try_next().await {
            Ok(Some(row)) => row,
            Ok(None) => return Ok(None),
            Err(e) => return Err(CoreError::row_read(&self.table, e)),
        };

        let mut cells = Vec::with_capacity(row.len());
        for (_, data) in row.cells() {
            cells.push(convert_cell(data).map_err(|e| CoreError::row_read(&self.table, e))?);
        }
        Ok(Some(cells))
    }
}

#[async_trait]
impl RowSource for MssqlAdapter {
    async fn open_rows<'a>(&'a mut self, query: &SelectQuery) -> Result<Box<dyn RowStream + 'a>> {
        let sql = SqlGenerator::generate_select_query(query);
        debug!("Executing: {}", sql);

        let table = query.table.clone();
        let client = self.client()?;
        let stream = client
            .simple_query(sql)
            .await
            .map_err(|e| CoreError::row_read(&table, e))?;

        Ok(Box::new(MssqlRowStream {
            table,
            rows: stream.into_row_stream(),
        }))
    }
}

#[async_trait]
impl DbAdapter for MssqlAdapter {
    async fn open(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Ok(());
        }
        let config = self
            .config
            .clone()
            .ok_or_else(|| CoreError::Internal("no connection settings".to_string()))?;

        let addr = config.get_addr();
        let client = Self::establish(config).await?;
        info!("Connected to SQL Server at {}", addr);

        self.client = Some(client);
        Ok(())
    }

    async fn release(&mut self) -> Result<()> {
        if !self.owns_connection {
            return Ok(());
        }
        if let Some(client) = self.client.take() {
            client.close().await?;
            debug!("Closed SQL Server connection");
        }
        Ok(())
    }
}

fn get_string(row: &Row, idx: usize) -> Result<String> {
    row.try_get::<&str, _>(idx)
        .map_err(CoreError::metadata)?
        .map(str::to_string)
        .ok_or_else(|| CoreError::metadata(format!("unexpected NULL in catalog column {}", idx)))
}

/// Convert a driver cell into the engine's value model
fn convert_cell(data: &ColumnData<'static>) -> tiberius::Result<CellValue> {
    let value: CellValue = match data {
        ColumnData::U8(v) => (*v).into(),
        ColumnData::I16(v) => (*v).into(),
        ColumnData::I32(v) => (*v).into(),
        ColumnData::I64(v) => (*v).into(),
        ColumnData::F32(v) => (*v).into(),
        ColumnData::F64(v) => (*v).into(),
        ColumnData::Bit(v) => (*v).into(),
        ColumnData::String(v) => v.as_deref().into(),
        ColumnData::Guid(v) => (*v).into(),
        ColumnData::Binary(v) => v.as_ref().map(|b| b.to_vec()).into(),
        ColumnData::Numeric(v) => v
            .as_ref()
            .map(|n| CellValue::Numeric {
                value: n.value(),
                scale: n.scale(),
            })
            .unwrap_or(CellValue::Null),
        ColumnData::Xml(v) => v
            .as_ref()
            .map(|xml| CellValue::Xml((**xml).clone().into_string()))
            .unwrap_or(CellValue::Null),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)?.into()
        }
        ColumnData::Date(_) => NaiveDate::from_sql(data)?.into(),
        ColumnData::Time(_) => NaiveTime::from_sql(data)?.into(),
        ColumnData::DateTimeOffset(_) => DateTime::<FixedOffset>::from_sql(data)?.into(),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use tiberius::numeric::Numeric;
    use uuid::Uuid;

    #[test]
    fn test_convert_scalars() {
        assert_eq!(convert_cell(&ColumnData::I32(Some(7))).unwrap(), CellValue::I32(7));
        assert_eq!(convert_cell(&ColumnData::Bit(Some(true))).unwrap(), CellValue::Bool(true));
        assert_eq!(convert_cell(&ColumnData::U8(Some(3))).unwrap(), CellValue::U8(3));
        assert_eq!(convert_cell(&ColumnData::I64(None)).unwrap(), CellValue::Null);
    }

    #[test]
    fn test_convert_text_and_binary() {
        let text = ColumnData::String(Some(Cow::Owned("abc".to_string())));
        assert_eq!(convert_cell(&text).unwrap(), CellValue::Text("abc".to_string()));

        let bytes = ColumnData::Binary(Some(Cow::Owned(vec![1, 2])));
        assert_eq!(convert_cell(&bytes).unwrap(), CellValue::Bytes(vec![1, 2]));

        assert_eq!(convert_cell(&ColumnData::String(None)).unwrap(), CellValue::Null);
    }

    #[test]
    fn test_convert_numeric_keeps_scale() {
        let numeric = ColumnData::Numeric(Some(Numeric::new_with_scale(12340, 2)));
        assert_eq!(
            convert_cell(&numeric).unwrap(),
            CellValue::Numeric {
                value: 12340,
                scale: 2
            }
        );
    }

    #[test]
    fn test_convert_guid() {
        let guid = Uuid::nil();
        assert_eq!(
            convert_cell(&ColumnData::Guid(Some(guid))).unwrap(),
            CellValue::Guid(guid)
        );
    }

    #[test]
    fn test_connection_string_adapter_owns_connection() {
        let adapter = MssqlAdapter::from_connection_string(
            "Server=tcp:localhost,1433;Database=Test;User Id=sa;Password=secret",
        )
        .unwrap();
        assert!(adapter.owns_connection());
        assert!(adapter.into_client().is_none());
    }
}
