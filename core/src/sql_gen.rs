//! T-SQL text generation for queries and structural script statements

use crate::domain::SelectQuery;
use crate::formatters::quote_string;

/// Batch separator understood by sqlcmd and SSMS
pub const SEPARATOR: &str = "GO";

/// SQL text generator
pub struct SqlGenerator;

impl SqlGenerator {
    /// Bracket-quote an identifier, doubling any closing bracket
    pub fn quote_name(name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }

    /// `[schema].[name]`
    pub fn full_table_name(schema: &str, table: &str) -> String {
        format!("{}.{}", Self::quote_name(schema), Self::quote_name(table))
    }

    /// Select expression reading a `sql_variant` column as text
    pub fn variant_conversion(column: &str) -> String {
        let quoted = Self::quote_name(column);
        format!("CONVERT(nvarchar(max), {}, 121) AS {}", quoted, quoted)
    }

    /// Select expression reading a CLR-typed column through its text form,
    /// aliased back to the plain column name
    pub fn text_conversion(column: &str) -> String {
        let quoted = Self::quote_name(column);
        format!("{}.ToString() AS {}", quoted, quoted)
    }

    /// Generate the SELECT used to stream a table's rows
    pub fn generate_select_query(query: &SelectQuery) -> String {
        let select_list = query
            .select_columns
            .iter()
            .map(|c| c.expression.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let mut sql = format!("SELECT {} FROM {}", select_list, query.table);
        if !query.order_by.is_empty() {
            let order_by = query
                .order_by
                .iter()
                .map(|c| Self::quote_name(c))
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_by);
        }
        sql
    }

    /// Disable every constraint before loading data
    pub fn disable_constraints() -> &'static str {
        "EXEC sp_MSforeachtable 'ALTER TABLE ? NOCHECK CONSTRAINT ALL'"
    }

    /// Re-enable and re-validate every constraint after loading data
    pub fn enable_constraints() -> &'static str {
        "EXEC sp_MSforeachtable 'ALTER TABLE ? WITH CHECK CHECK CONSTRAINT ALL'"
    }

    /// Toggle IDENTITY_INSERT, guarded so it is a no-op on tables without identity
    pub fn identity_insert(full_table_name: &str, enabled: bool) -> String {
        format!(
            "IF OBJECTPROPERTY(OBJECT_ID({}), 'TableHasIdentity') = 1 SET IDENTITY_INSERT {} {};",
            quote_string(full_table_name),
            full_table_name,
            if enabled { "ON" } else { "OFF" }
        )
    }

    /// `INSERT INTO <table> (<columns>) VALUES`
    pub fn insert_header(full_table_name: &str, column_list: &str) -> String {
        format!("INSERT INTO {} ({}) VALUES", full_table_name, column_list)
    }

    /// `-- Table <table>`
    pub fn table_comment(full_table_name: &str) -> String {
        format!("-- Table {}", full_table_name)
    }

    /// Comma separated quoted column list
    pub fn column_list<'a, I>(columns: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        columns
            .into_iter()
            .map(Self::quote_name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SelectColumn;

    fn plain(name: &str) -> SelectColumn {
        SelectColumn {
            expression: SqlGenerator::quote_name(name),
            output_name: name.to_string(),
        }
    }

    #[test]
    fn test_quote_name() {
        assert_eq!(SqlGenerator::quote_name("Users"), "[Users]");
        assert_eq!(SqlGenerator::quote_name("odd]name"), "[odd]]name]");
        assert_eq!(SqlGenerator::full_table_name("dbo", "Users"), "[dbo].[Users]");
    }

    #[test]
    fn test_text_conversion() {
        assert_eq!(
            SqlGenerator::text_conversion("Shape"),
            "[Shape].ToString() AS [Shape]"
        );
    }

    #[test]
    fn test_generate_select_query_with_order() {
        let query = SelectQuery {
            table: "[dbo].[Orders]".to_string(),
            select_columns: vec![plain("Id"), plain("Total")],
            order_by: vec!["Id".to_string()],
        };
        assert_eq!(
            SqlGenerator::generate_select_query(&query),
            "SELECT [Id], [Total] FROM [dbo].[Orders] ORDER BY [Id]"
        );
    }

    #[test]
    fn test_generate_select_query_without_key() {
        let query = SelectQuery {
            table: "[dbo].[Log]".to_string(),
            select_columns: vec![plain("Message")],
            order_by: vec![],
        };
        assert_eq!(
            SqlGenerator::generate_select_query(&query),
            "SELECT [Message] FROM [dbo].[Log]"
        );
    }

    #[test]
    fn test_identity_insert() {
        assert_eq!(
            SqlGenerator::identity_insert("[dbo].[Users]", true),
            "IF OBJECTPROPERTY(OBJECT_ID('[dbo].[Users]'), 'TableHasIdentity') = 1 SET IDENTITY_INSERT [dbo].[Users] ON;"
        );
        assert!(SqlGenerator::identity_insert("[dbo].[Users]", false).ends_with(" OFF;"));
    }

    #[test]
    fn test_identity_insert_escapes_quote_inside_literal() {
        let sql = SqlGenerator::identity_insert("[dbo].[O'Brien]", true);
        assert!(sql.contains("OBJECT_ID('[dbo].[O''Brien]')"));
        assert!(sql.contains("SET IDENTITY_INSERT [dbo].[O'Brien] ON;"));
    }

    #[test]
    fn test_identity_insert_non_ascii_name_is_unicode_literal() {
        let sql = SqlGenerator::identity_insert("[dbo].[Größe]", true);
        assert!(sql.starts_with("IF OBJECTPROPERTY(OBJECT_ID(N'[dbo].[Größe]'), "));
        assert!(sql.ends_with("SET IDENTITY_INSERT [dbo].[Größe] ON;"));
    }

    #[test]
    fn test_variant_conversion() {
        assert_eq!(
            SqlGenerator::variant_conversion("Setting"),
            "CONVERT(nvarchar(max), [Setting], 121) AS [Setting]"
        );
    }

    #[test]
    fn test_insert_header() {
        let columns = SqlGenerator::column_list(["Id", "Name"]);
        assert_eq!(
            SqlGenerator::insert_header("[dbo].[Users]", &columns),
            "INSERT INTO [dbo].[Users] ([Id], [Name]) VALUES"
        );
    }
}
