//! Table catalog enumeration and per-table descriptor building

use std::cmp::Ordering;

use tracing::debug;

use crate::adapter::SchemaSource;
use crate::domain::{ColumnDescriptor, DumpOptions, SelectColumn, TableDescriptor, TableIdentity};
use crate::error::Result;
use crate::formatters::{is_special_type, is_variant_type};
use crate::sql_gen::SqlGenerator;

/// Case-insensitive comparison used for catalog ordering.
///
/// Compares lowercased code points, so punctuation does not sort the way a
/// culture-aware comparison would: `T1` comes before `T_1` here.
pub fn compare_ignore_case(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Sort tables by schema, then name, ignoring case. Ties keep their input order.
pub fn sort_tables(tables: &mut [TableIdentity]) {
    tables.sort_by(|a, b| {
        compare_ignore_case(&a.schema, &b.schema).then_with(|| compare_ignore_case(&a.name, &b.name))
    });
}

/// List every base table to dump, in dump order, without ignored tables
pub async fn list_exportable_tables<S>(
    source: &mut S,
    options: &DumpOptions,
) -> Result<Vec<TableIdentity>>
where
    S: SchemaSource + ?Sized,
{
    let mut tables = source.list_base_tables().await?;
    sort_tables(&mut tables);

    let total = tables.len();
    tables.retain(|t| !options.is_ignored(&t.name));
    debug!(
        "Found {} base tables, {} ignored",
        total,
        total - tables.len()
    );

    Ok(tables)
}

/// Build the select list, sort order and column list of a table
pub fn build_table_descriptor(
    table: &TableIdentity,
    columns: &[ColumnDescriptor],
) -> TableDescriptor {
    let mut descriptor = TableDescriptor {
        full_name: SqlGenerator::full_table_name(&table.schema, &table.name),
        ..Default::default()
    };

    for column in columns {
        descriptor.all_column_names.push(column.name.clone());

        let expression = if is_special_type(&column.native_type_name) {
            SqlGenerator::text_conversion(&column.name)
        } else if is_variant_type(&column.native_type_name) {
            SqlGenerator::variant_conversion(&column.name)
        } else {
            SqlGenerator::quote_name(&column.name)
        };
        descriptor.select_columns.push(SelectColumn {
            expression,
            output_name: column.name.clone(),
        });
    }

    let mut key_columns: Vec<(i32, &str)> = columns
        .iter()
        .filter_map(|c| c.ordinal_in_key.map(|ordinal| (ordinal, c.name.as_str())))
        .collect();
    key_columns.sort();
    descriptor.sort_columns = key_columns
        .into_iter()
        .map(|(_, name)| name.to_string())
        .collect();

    debug!(
        "Descriptor for {}: {} columns, sorted by {:?}",
        descriptor.full_name,
        descriptor.all_column_names.len(),
        descriptor.sort_columns
    );

    descriptor
}
