use super::DatasetStore;
use crate::{
    error::{PipelineError, PipelineResult},
    record::{CustomerRecord, Value},
    schema::{quote_ident, ColumnKind, TableSchema},
};
use rusqlite::{params_from_iter, types::Value as SqlValue, Transaction};
use std::collections::HashSet;

impl DatasetStore {
    // ── Customer metrics ───────────────────────────────────────

    /// Replace the whole table with `rows` in one transaction.
    /// Readers see either the previous table or the new one; on failure
    /// nothing is committed. Returns the number of rows written.
    pub fn replace_table(
        &mut self,
        schema: &TableSchema,
        rows: &[CustomerRecord],
    ) -> PipelineResult<usize> {
        let mut seen = HashSet::with_capacity(rows.len());
        for row in rows {
            schema.check_record(row)?;
            if !seen.insert(row.customer_id.as_str()) {
                return Err(PipelineError::DataFormat(format!(
                    "duplicate {} '{}'",
                    schema.id_column().name,
                    row.customer_id
                )));
            }
        }

        let failed = |e: rusqlite::Error| {
            PipelineError::Persistence(format!("replace of table '{}' failed: {e}", schema.table))
        };
        let tx = self.conn.transaction()?;
        // Dropping an uncommitted transaction rolls it back.
        write_table(&tx, schema, rows).map_err(failed)?;
        tx.commit().map_err(failed)?;

        log::debug!("store: replaced '{}' with {} rows", schema.table, rows.len());
        Ok(rows.len())
    }

    /// Read every row back in insertion order, after checking the stored
    /// columns against `schema`.
    pub fn load_table(&self, schema: &TableSchema) -> PipelineResult<Vec<CustomerRecord>> {
        if !self.table_exists(&schema.table)? {
            return Err(PipelineError::MissingSource(format!(
                "table '{}' does not exist",
                schema.table
            )));
        }
        schema.validate_columns(&self.table_columns(&schema.table)?)?;

        let select = schema
            .columns()
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {select} FROM {} ORDER BY rowid ASC",
            quote_ident(&schema.table)
        ))?;
        let width = schema.columns().len();
        let raw_rows = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, SqlValue>(i))
                    .collect::<Result<Vec<_>, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw_rows
            .into_iter()
            .enumerate()
            .map(|(i, raw)| decode_row(schema, i, raw))
            .collect()
    }

    /// (name, declared type) of every column, in table order.
    pub fn table_columns(&self, table: &str) -> PipelineResult<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let cols = stmt
            .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cols)
    }

    pub fn row_count(&self, table: &str) -> PipelineResult<i64> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn write_table(
    tx: &Transaction<'_>,
    schema: &TableSchema,
    rows: &[CustomerRecord],
) -> rusqlite::Result<()> {
    let table = quote_ident(&schema.table);
    let defs = schema
        .columns()
        .iter()
        .map(|c| {
            let pk = if c.kind == ColumnKind::Identifier { " PRIMARY KEY" } else { "" };
            format!("{} {}{pk}", quote_ident(&c.name), c.kind.sql_type())
        })
        .collect::<Vec<_>>()
        .join(", ");
    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS {table}; CREATE TABLE {table} ({defs});"
    ))?;

    let names = schema
        .columns()
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");
    let slots = (1..=schema.columns().len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut stmt = tx.prepare(&format!("INSERT INTO {table} ({names}) VALUES ({slots})"))?;
    for row in rows {
        stmt.execute(params_from_iter(encode_row(schema, row)))?;
    }
    Ok(())
}

fn encode_row(schema: &TableSchema, row: &CustomerRecord) -> Vec<SqlValue> {
    let mut features = row.values.iter();
    schema
        .columns()
        .iter()
        .map(|c| match c.kind {
            ColumnKind::Identifier => SqlValue::Text(row.customer_id.clone()),
            ColumnKind::Label => row
                .churn
                .map(|l| SqlValue::Integer(i64::from(l)))
                .unwrap_or(SqlValue::Null),
            ColumnKind::Categorical | ColumnKind::Numeric { .. } => match features.next() {
                Some(Value::Text(s)) => SqlValue::Text(s.clone()),
                Some(Value::Number(n)) => SqlValue::Real(*n),
                None => SqlValue::Null,
            },
        })
        .collect()
}

fn decode_row(schema: &TableSchema, index: usize, raw: Vec<SqlValue>) -> PipelineResult<CustomerRecord> {
    let bad = |column: &str, value: &SqlValue| {
        PipelineError::DataFormat(format!(
            "table '{}' row {}: unexpected {value:?} in column '{column}'",
            schema.table,
            index + 1
        ))
    };

    let mut customer_id = String::new();
    let mut values = Vec::with_capacity(schema.feature_count());
    let mut churn = None;
    for (spec, cell) in schema.columns().iter().zip(raw) {
        match (spec.kind, cell) {
            (ColumnKind::Identifier, SqlValue::Text(s)) => customer_id = s,
            (ColumnKind::Identifier, SqlValue::Integer(i)) => customer_id = i.to_string(),
            (ColumnKind::Categorical, SqlValue::Text(s)) => values.push(Value::Text(s)),
            (ColumnKind::Numeric { .. }, SqlValue::Real(n)) if n >= 0.0 => {
                values.push(Value::Number(n))
            }
            (ColumnKind::Numeric { .. }, SqlValue::Integer(i)) if i >= 0 => {
                values.push(Value::Number(i as f64))
            }
            (ColumnKind::Label, SqlValue::Null) => churn = None,
            (ColumnKind::Label, SqlValue::Integer(l)) if l == 0 || l == 1 => churn = Some(l as u8),
            (_, other) => return Err(bad(&spec.name, &other)),
        }
    }
    Ok(CustomerRecord { customer_id, values, churn })
}
