//! The typed in-memory table every pipeline step reads from.

mod infer;
mod load;
pub(crate) mod utils;

use std::{cmp::Ordering, fmt, sync::Arc};

use arrow::{
    array::{
        Array, ArrayRef, BooleanArray, Date32Array, Date32Builder, Float64Array, Float64Builder,
        Int64Array, Int64Builder, StringArray, StringBuilder,
    },
    compute::filter_record_batch,
    datatypes::{DataType, Field, Schema},
    error::ArrowError,
    record_batch::RecordBatch,
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};

pub use infer::infer_column_type;
pub use load::{load, load_from_reader};

/// Days between 0001-01-01 and 1970-01-01, the Date32 epoch.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// The value type carried by one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Utf8,
    Int64,
    Float64,
    Date,
}

impl ColumnType {
    pub fn to_arrow(self) -> DataType {
        match self {
            ColumnType::Utf8 => DataType::Utf8,
            ColumnType::Int64 => DataType::Int64,
            ColumnType::Float64 => DataType::Float64,
            ColumnType::Date => DataType::Date32,
        }
    }

    pub fn from_arrow(dt: &DataType) -> Option<Self> {
        match dt {
            DataType::Utf8 => Some(ColumnType::Utf8),
            DataType::Int64 => Some(ColumnType::Int64),
            DataType::Float64 => Some(ColumnType::Float64),
            DataType::Date32 => Some(ColumnType::Date),
            _ => None,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnType::Int64 | ColumnType::Float64)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnType::Utf8 => "string",
            ColumnType::Int64 => "integer",
            ColumnType::Float64 => "float",
            ColumnType::Date => "date",
        };
        f.write_str(s)
    }
}

/// A single cell. `Null` is the explicit missing marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    Null,
    Str(String),
    Int(i64),
    Float(f64),
    Date(NaiveDate),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The column type this value belongs to; `None` for `Null`.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Str(_) => Some(ColumnType::Utf8),
            Value::Int(_) => Some(ColumnType::Int64),
            Value::Float(_) => Some(ColumnType::Float64),
            Value::Date(_) => Some(ColumnType::Date),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Typed comparison. Int and Float compare numerically; any other mix of
    /// types, and anything involving `Null`, is incomparable.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Date(a), Value::Date(b)) => Some(a.cmp(b)),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y),
                _ => None,
            },
        }
    }

    /// Plain text of the value, used for substring and regex matching.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::Str(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Undefined"),
            Value::Str(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{:.2}", v),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

pub(crate) fn date_to_days(d: NaiveDate) -> i32 {
    d.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

pub(crate) fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(EPOCH_DAYS_FROM_CE)?)
}

/// Read one cell of a supported Arrow array as a [`Value`].
pub fn value_at(array: &dyn Array, row: usize) -> Value {
    if row >= array.len() || array.is_null(row) {
        return Value::Null;
    }
    let any = array.as_any();
    if let Some(a) = any.downcast_ref::<StringArray>() {
        Value::Str(a.value(row).to_string())
    } else if let Some(a) = any.downcast_ref::<Int64Array>() {
        Value::Int(a.value(row))
    } else if let Some(a) = any.downcast_ref::<Float64Array>() {
        Value::Float(a.value(row))
    } else if let Some(a) = any.downcast_ref::<Date32Array>() {
        days_to_date(a.value(row)).map_or(Value::Null, Value::Date)
    } else {
        Value::Null
    }
}

/// Build a column of type `ty` from values. Every non-null value must
/// already have that type, except Int which widens into a Float column.
pub fn build_array(ty: ColumnType, values: &[Value]) -> Result<ArrayRef> {
    let mismatch = |v: &Value| {
        ArrowError::InvalidArgumentError(format!("value {:?} does not fit a {} column", v, ty))
    };
    let array: ArrayRef = match ty {
        ColumnType::Utf8 => {
            let mut b = StringBuilder::with_capacity(values.len(), values.len() * 8);
            for v in values {
                match v {
                    Value::Null => b.append_null(),
                    Value::Str(s) => b.append_value(s),
                    other => return Err(mismatch(other).into()),
                }
            }
            Arc::new(b.finish())
        }
        ColumnType::Int64 => {
            let mut b = Int64Builder::with_capacity(values.len());
            for v in values {
                match v {
                    Value::Null => b.append_null(),
                    Value::Int(i) => b.append_value(*i),
                    other => return Err(mismatch(other).into()),
                }
            }
            Arc::new(b.finish())
        }
        ColumnType::Float64 => {
            let mut b = Float64Builder::with_capacity(values.len());
            for v in values {
                match v {
                    Value::Null => b.append_null(),
                    Value::Float(f) => b.append_value(*f),
                    Value::Int(i) => b.append_value(*i as f64),
                    other => return Err(mismatch(other).into()),
                }
            }
            Arc::new(b.finish())
        }
        ColumnType::Date => {
            let mut b = Date32Builder::with_capacity(values.len());
            for v in values {
                match v {
                    Value::Null => b.append_null(),
                    Value::Date(d) => b.append_value(date_to_days(*d)),
                    other => return Err(mismatch(other).into()),
                }
            }
            Arc::new(b.finish())
        }
    };
    Ok(array)
}

/// An ordered set of rows over a fixed set of typed, nullable columns.
///
/// Cloning is cheap: columns are reference counted and shared between
/// versions of a table.
#[derive(Debug, Clone)]
pub struct Table {
    batch: RecordBatch,
}

impl Table {
    /// Wrap a batch whose columns all have a supported type.
    pub fn new(batch: RecordBatch) -> Result<Self> {
        for field in batch.schema().fields() {
            if ColumnType::from_arrow(field.data_type()).is_none() {
                return Err(ArrowError::SchemaError(format!(
                    "column `{}` has unsupported type {}",
                    field.name(),
                    field.data_type()
                ))
                .into());
            }
        }
        Ok(Self { batch })
    }

    /// Build a table from named columns, in order.
    pub fn from_columns(columns: Vec<(String, ArrayRef)>) -> Result<Self> {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, arr)| Field::new(name, arr.data_type().clone(), true))
            .collect();
        let arrays = columns.into_iter().map(|(_, arr)| arr).collect();
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        Self::new(batch)
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.batch.schema().index_of(name).is_ok()
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    pub fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.column(name)
            .and_then(|a| ColumnType::from_arrow(a.data_type()))
    }

    /// Cell at (`name`, `row`); `None` if the column does not exist.
    pub fn value(&self, name: &str, row: usize) -> Option<Value> {
        self.column(name).map(|a| value_at(a.as_ref(), row))
    }

    /// Add `array` as column `name`, or replace the column of that name in
    /// place. Every other column is shared with `self`.
    pub fn with_column(&self, name: &str, array: ArrayRef) -> Result<Table> {
        let schema = self.batch.schema();
        let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
        let mut arrays: Vec<ArrayRef> = self.batch.columns().to_vec();
        let field = Field::new(name, array.data_type().clone(), true);
        match schema.index_of(name) {
            Ok(idx) => {
                fields[idx] = field;
                arrays[idx] = array;
            }
            Err(_) => {
                fields.push(field);
                arrays.push(array);
            }
        }
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        Table::new(batch)
    }

    /// Remove column `name`; a missing column is left alone.
    pub fn without_column(&self, name: &str) -> Result<Table> {
        let schema = self.batch.schema();
        let Ok(idx) = schema.index_of(name) else {
            return Ok(self.clone());
        };
        let mut batch = self.batch.clone();
        batch.remove_column(idx);
        Ok(Table { batch })
    }

    /// Keep the rows where `mask` is true.
    pub fn filter(&self, mask: &BooleanArray) -> Result<Table> {
        let batch = filter_record_batch(&self.batch, mask)?;
        Ok(Table { batch })
    }
}

/// Fail with [`AnalysisError::InvalidQuery`] unless `table` has `name`.
pub(crate) fn require_column<'a>(table: &'a Table, name: &str) -> Result<&'a ArrayRef> {
    table
        .column(name)
        .ok_or_else(|| AnalysisError::unknown_column(name))
}
