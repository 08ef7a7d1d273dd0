use serde_json::{Map, Value as Json};

use crate::table::{ColumnType, Table, Value};

/// Output of a query: one row per group, key columns first, then one column
/// per requested metric.
#[derive(Debug, Clone)]
pub struct ResultTable {
    pub(crate) name: String,
    pub(crate) keys: Vec<String>,
    pub(crate) metrics: Vec<String>,
    pub(crate) table: Table,
}

impl ResultTable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_columns(&self) -> &[String] {
        &self.keys
    }

    pub fn metric_columns(&self) -> &[String] {
        &self.metrics
    }

    /// Key columns followed by metric columns.
    pub fn column_names(&self) -> Vec<String> {
        self.keys.iter().chain(&self.metrics).cloned().collect()
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.table.column_type(name)
    }

    pub fn num_rows(&self) -> usize {
        self.table.num_rows()
    }

    pub fn value(&self, column: &str, row: usize) -> Option<Value> {
        self.table.value(column, row)
    }

    /// Every cell of `column`, top to bottom.
    pub fn column_values(&self, column: &str) -> Option<Vec<Value>> {
        self.table.column(column)?;
        Some(
            (0..self.num_rows())
                .map(|r| self.table.value(column, r).unwrap_or(Value::Null))
                .collect(),
        )
    }

    /// Rows as cell vectors, in [`column_names`](Self::column_names) order.
    pub fn rows(&self) -> Vec<Vec<Value>> {
        let names = self.column_names();
        (0..self.num_rows())
            .map(|r| {
                names
                    .iter()
                    .map(|c| self.table.value(c, r).unwrap_or(Value::Null))
                    .collect()
            })
            .collect()
    }

    /// The underlying typed table.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Rows as JSON objects; nulls are JSON null, dates ISO strings.
    pub fn to_json(&self) -> Json {
        let names = self.column_names();
        let rows = self
            .rows()
            .into_iter()
            .map(|row| {
                let obj: Map<String, Json> = names
                    .iter()
                    .cloned()
                    .zip(row.iter().map(cell_json))
                    .collect();
                Json::Object(obj)
            })
            .collect();
        Json::Array(rows)
    }
}

fn cell_json(v: &Value) -> Json {
    match v {
        Value::Null => Json::Null,
        Value::Str(s) => Json::from(s.as_str()),
        Value::Int(i) => Json::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f).map_or(Json::Null, Json::Number),
        Value::Date(d) => Json::from(d.format("%Y-%m-%d").to_string()),
    }
}
