//! Schema introspection. Renders the live database layout as prompt text.
//!
//! Each table becomes a `CREATE TABLE` block, optionally followed by a comment with
//! a few sample rows, which gives the model both column types and value shapes.

use sqlx::PgPool;

use crate::executor;
use crate::models::QueryResult;

const COLUMNS_QUERY: &str = r#"
    SELECT table_schema::text AS table_schema,
           table_name::text   AS table_name,
           column_name::text  AS column_name,
           data_type::text    AS data_type,
           is_nullable::text  AS is_nullable
    FROM information_schema.columns
    WHERE table_schema NOT IN ('pg_catalog', 'information_schema')
      AND table_schema NOT LIKE 'pg_toast%'
    ORDER BY table_schema, table_name, ordinal_position
"#;

#[derive(Debug, sqlx::FromRow)]
struct ColumnRow {
    table_schema: String,
    table_name: String,
    column_name: String,
    data_type: String,
    is_nullable: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

impl TableInfo {
    /// Name as the model should write it: bare for `public`, schema-qualified otherwise.
    pub fn display_name(&self) -> String {
        if self.schema == "public" {
            self.name.clone()
        } else {
            format!("{}.{}", self.schema, self.name)
        }
    }

    fn quoted_name(&self) -> String {
        format!("{}.{}", quote_ident(&self.schema), quote_ident(&self.name))
    }
}

/// List every user table with its columns, in schema/table/ordinal order.
pub async fn list_tables(pool: &PgPool) -> Result<Vec<TableInfo>, sqlx::Error> {
    let rows: Vec<ColumnRow> = sqlx::query_as(COLUMNS_QUERY).fetch_all(pool).await?;
    Ok(group_columns(rows))
}

/// Full schema description: table definitions plus up to `sample_rows` rows each.
pub async fn describe(pool: &PgPool, sample_rows: usize) -> Result<String, sqlx::Error> {
    let tables = list_tables(pool).await?;
    tracing::debug!(tables = tables.len(), "Introspected schema");

    let mut samples = Vec::with_capacity(tables.len());
    for table in &tables {
        samples.push(fetch_sample(pool, table, sample_rows).await?);
    }

    Ok(render_schema(&tables, &samples))
}

async fn fetch_sample(
    pool: &PgPool,
    table: &TableInfo,
    sample_rows: usize,
) -> Result<Option<String>, sqlx::Error> {
    if sample_rows == 0 {
        return Ok(None);
    }
    let sql = format!("SELECT * FROM {} LIMIT {}", table.quoted_name(), sample_rows);
    match executor::execute(pool, &sql, sample_rows).await? {
        QueryResult::Rows(set) => Ok(Some(set.render())),
        QueryResult::Error { message } => {
            tracing::warn!(table = %table.display_name(), error = %message, "Skipping sample rows");
            Ok(None)
        }
    }
}

fn group_columns(rows: Vec<ColumnRow>) -> Vec<TableInfo> {
    let mut tables: Vec<TableInfo> = Vec::new();
    for row in rows {
        let column = ColumnInfo {
            name: row.column_name,
            data_type: row.data_type,
            nullable: row.is_nullable.eq_ignore_ascii_case("YES"),
        };
        match tables.last_mut() {
            Some(t) if t.schema == row.table_schema && t.name == row.table_name => {
                t.columns.push(column)
            }
            _ => tables.push(TableInfo {
                schema: row.table_schema,
                name: row.table_name,
                columns: vec![column],
            }),
        }
    }
    tables
}

/// Render tables (and optional per-table sample text, index-aligned) for a prompt.
pub fn render_schema(tables: &[TableInfo], samples: &[Option<String>]) -> String {
    if tables.is_empty() {
        return "(no tables found)".to_string();
    }

    let blocks: Vec<String> = tables
        .iter()
        .enumerate()
        .map(|(i, table)| {
            let columns: Vec<String> = table
                .columns
                .iter()
                .map(|c| {
                    let null = if c.nullable { "" } else { " NOT NULL" };
                    format!("\t{} {}{}", c.name, c.data_type, null)
                })
                .collect();
            let mut block = format!(
                "CREATE TABLE {} (\n{}\n)",
                table.display_name(),
                columns.join(",\n")
            );
            if let Some(Some(sample)) = samples.get(i) {
                block.push_str(&format!(
                    "\n\n/*\nSample rows from {} table:\n{}\n*/",
                    table.display_name(),
                    sample
                ));
            }
            block
        })
        .collect();

    blocks.join("\n\n")
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
