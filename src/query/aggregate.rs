use std::{cmp::Ordering, collections::HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::table::{ColumnType, Table, Value};

/// Aggregation over the rows of one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "fn", rename_all = "snake_case")]
pub enum Aggregate {
    /// Rows in the group.
    Count,
    /// Rows in the group as a share of all selected rows, in percent.
    Percentage,
    /// Mean of the non-null values.
    Mean { column: String },
    Sum { column: String },
    Max { column: String },
    Min { column: String },
    /// The `n` most frequent non-null values, as `"value (count)"`.
    TopN { column: String, n: usize },
}

impl Aggregate {
    pub fn mean(column: impl Into<String>) -> Self {
        Aggregate::Mean {
            column: column.into(),
        }
    }

    pub fn sum(column: impl Into<String>) -> Self {
        Aggregate::Sum {
            column: column.into(),
        }
    }

    pub fn max(column: impl Into<String>) -> Self {
        Aggregate::Max {
            column: column.into(),
        }
    }

    pub fn min(column: impl Into<String>) -> Self {
        Aggregate::Min {
            column: column.into(),
        }
    }

    pub fn top_n(column: impl Into<String>, n: usize) -> Self {
        Aggregate::TopN {
            column: column.into(),
            n,
        }
    }

    pub fn input_column(&self) -> Option<&str> {
        match self {
            Aggregate::Count | Aggregate::Percentage => None,
            Aggregate::Mean { column }
            | Aggregate::Sum { column }
            | Aggregate::Max { column }
            | Aggregate::Min { column }
            | Aggregate::TopN { column, .. } => Some(column),
        }
    }

    /// Result column name when no alias is given.
    pub fn default_name(&self) -> String {
        match self {
            Aggregate::Count => "count".into(),
            Aggregate::Percentage => "percentage".into(),
            Aggregate::Mean { column } => format!("mean_{}", column),
            Aggregate::Sum { column } => format!("sum_{}", column),
            Aggregate::Max { column } => format!("max_{}", column),
            Aggregate::Min { column } => format!("min_{}", column),
            Aggregate::TopN { column, n } => format!("top{}_{}", n, column),
        }
    }

    /// Check the aggregate against `table` and return its output type.
    pub(crate) fn output_type(&self, table: &Table) -> Result<ColumnType> {
        let input = match self.input_column() {
            None => {
                return Ok(match self {
                    Aggregate::Percentage => ColumnType::Float64,
                    _ => ColumnType::Int64,
                })
            }
            Some(c) => table
                .column_type(c)
                .ok_or_else(|| AnalysisError::unknown_column(c))?,
        };
        match self {
            Aggregate::Mean { column } | Aggregate::Sum { column } if !input.is_numeric() => {
                Err(AnalysisError::InvalidQuery(format!(
                    "{} needs a numeric column, `{}` is {}",
                    self.default_name(),
                    column,
                    input
                )))
            }
            Aggregate::TopN { n: 0, .. } => Err(AnalysisError::InvalidQuery(
                "top_n needs n > 0".into(),
            )),
            Aggregate::Mean { .. } => Ok(ColumnType::Float64),
            Aggregate::Sum { .. } | Aggregate::Max { .. } | Aggregate::Min { .. } => Ok(input),
            Aggregate::TopN { .. } => Ok(ColumnType::Utf8),
            Aggregate::Count | Aggregate::Percentage => Ok(input),
        }
    }

    /// Compute over one group. `values` holds the input column's cells for
    /// the group's rows (empty for count-like aggregates), `rows` the group
    /// size and `total` the number of selected rows across all groups.
    pub(crate) fn compute(&self, values: &[Value], rows: usize, total: usize) -> Value {
        match self {
            Aggregate::Count => Value::Int(rows as i64),
            Aggregate::Percentage => percentage(rows, total).map_or(Value::Null, Value::Float),
            Aggregate::Mean { .. } => {
                let nums: Vec<f64> = values.iter().filter_map(Value::as_f64).collect();
                if nums.is_empty() {
                    Value::Null
                } else {
                    Value::Float(nums.iter().sum::<f64>() / nums.len() as f64)
                }
            }
            Aggregate::Sum { .. } => sum(values),
            Aggregate::Max { .. } => extreme(values, Ordering::Greater),
            Aggregate::Min { .. } => extreme(values, Ordering::Less),
            Aggregate::TopN { n, .. } => top_n(values, *n),
        }
    }
}

/// `subset * 100 / total`, or `None` (Undefined) when `total` is zero.
pub fn percentage(subset: usize, total: usize) -> Option<f64> {
    if total == 0 {
        None
    } else {
        Some((subset as f64 * 100.0) / total as f64)
    }
}

fn sum(values: &[Value]) -> Value {
    let mut out = Value::Null;
    for v in values {
        out = match (out, v) {
            (acc, Value::Null) => acc,
            (Value::Null, Value::Int(i)) => Value::Int(*i),
            (Value::Null, Value::Float(f)) => Value::Float(*f),
            (Value::Int(a), Value::Int(b)) => Value::Int(a.saturating_add(*b)),
            (acc, other) => match (acc.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => Value::Float(a + b),
                _ => acc,
            },
        };
    }
    out
}

fn extreme(values: &[Value], want: Ordering) -> Value {
    let mut best: Option<&Value> = None;
    for v in values.iter().filter(|v| !v.is_null()) {
        best = match best {
            Some(b) if v.compare(b) != Some(want) => Some(b),
            _ => Some(v),
        };
    }
    best.cloned().unwrap_or(Value::Null)
}

fn top_n(values: &[Value], n: usize) -> Value {
    // (text, count, first index) so ties keep first-seen order
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for text in values.iter().filter_map(Value::to_text) {
        match index.get(&text) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(text.clone(), counts.len());
                counts.push((text, 1));
            }
        }
    }
    if counts.is_empty() {
        return Value::Null;
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    let parts: Vec<String> = counts
        .into_iter()
        .take(n)
        .map(|(v, c)| format!("{} ({})", v, c))
        .collect();
    Value::Str(parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentages_sum_to_one_hundred() {
        let movie = percentage(70, 100).unwrap();
        let show = percentage(30, 100).unwrap();
        assert!((movie - 70.0).abs() < 1e-9);
        assert!((show - 30.0).abs() < 1e-9);
        assert!((movie + show - 100.0).abs() < 1e-9);
        assert_eq!(percentage(0, 0), None);
    }

    #[test]
    fn mean_ignores_nulls_and_is_undefined_when_empty() {
        let mean = Aggregate::mean("score");
        let vals = [Value::Int(2), Value::Null, Value::Float(4.0)];
        assert_eq!(mean.compute(&vals, 3, 3), Value::Float(3.0));
        assert_eq!(mean.compute(&[Value::Null, Value::Null], 2, 2), Value::Null);
        assert_eq!(mean.compute(&[], 0, 0), Value::Null);
    }

    #[test]
    fn sum_keeps_integers_and_min_max_keep_type() {
        let vals = [Value::Int(2), Value::Null, Value::Int(5)];
        assert_eq!(Aggregate::sum("x").compute(&vals, 3, 3), Value::Int(7));
        assert_eq!(Aggregate::max("x").compute(&vals, 3, 3), Value::Int(5));
        assert_eq!(Aggregate::min("x").compute(&vals, 3, 3), Value::Int(2));
        assert_eq!(Aggregate::sum("x").compute(&[Value::Null], 1, 1), Value::Null);
        let names = [Value::from("b"), Value::from("a")];
        assert_eq!(Aggregate::min("x").compute(&names, 2, 2), Value::from("a"));
    }

    #[test]
    fn top_n_orders_by_frequency_then_first_seen() {
        let vals: Vec<Value> = ["Raúl Campos", "Jan Suter", "Jan Suter", "Marcus Raboy"]
            .into_iter()
            .map(Value::from)
            .chain([Value::Null])
            .collect();
        assert_eq!(
            Aggregate::top_n("director", 2).compute(&vals, 5, 5),
            Value::from("Jan Suter (2), Raúl Campos (1)")
        );
    }
}
