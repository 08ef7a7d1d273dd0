//! Render a [`ResultTable`] for a human: a boxed text table or a text chart.
//!
//! Rendering only reads the result; the one side effect lives in
//! [`present`], which writes the rendered text to a sink.

mod chart;
mod text;

use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::query::ResultTable;
use crate::table::{ColumnType, Value};

/// Longest bar any chart draws.
pub const BAR_WIDTH: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RenderMode {
    /// One row per group, key columns then metric columns.
    Text,
    /// Key values vs. the numeric column `value`.
    Bar { value: String },
    /// Equal-width bins over numeric `column`, each row counted `weight` times.
    Histogram {
        column: String,
        bins: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        weight: Option<String>,
    },
    /// First two key columns as axes, numeric `value` as the cell.
    Heatmap { value: String },
}

impl RenderMode {
    pub fn bar(value: impl Into<String>) -> Self {
        RenderMode::Bar {
            value: value.into(),
        }
    }

    pub fn histogram(column: impl Into<String>, bins: usize) -> Self {
        RenderMode::Histogram {
            column: column.into(),
            bins,
            weight: None,
        }
    }

    pub fn weighted_histogram(
        column: impl Into<String>,
        bins: usize,
        weight: impl Into<String>,
    ) -> Self {
        RenderMode::Histogram {
            column: column.into(),
            bins,
            weight: Some(weight.into()),
        }
    }

    pub fn heatmap(value: impl Into<String>) -> Self {
        RenderMode::Heatmap {
            value: value.into(),
        }
    }
}

/// Render `result` as a string. Deterministic for a given result and mode.
pub fn render(result: &ResultTable, mode: &RenderMode) -> Result<String> {
    match mode {
        RenderMode::Text => Ok(text::render_table(result)),
        RenderMode::Bar { value } => {
            let values = numeric_column(result, value)?;
            Ok(chart::bar_chart(&labels(result), &values))
        }
        RenderMode::Histogram {
            column,
            bins,
            weight,
        } => {
            if *bins == 0 {
                return Err(AnalysisError::InvalidQuery("histogram needs at least one bin".into()));
            }
            let values = numeric_column(result, column)?;
            let weights = match weight {
                Some(w) => numeric_column(result, w)?,
                None => vec![Some(1.0); values.len()],
            };
            Ok(chart::histogram(&values, &weights, *bins))
        }
        RenderMode::Heatmap { value } => {
            let keys = result.key_columns();
            if keys.len() < 2 {
                return Err(AnalysisError::InvalidQuery(format!(
                    "heatmap needs two group keys, `{}` has {}",
                    result.name(),
                    keys.len()
                )));
            }
            let rows = string_column(result, &keys[0])?;
            let cols = string_column(result, &keys[1])?;
            let values = numeric_column(result, value)?;
            Ok(chart::heatmap(&rows, &cols, &values))
        }
    }
}

/// Render and write to `out`.
pub fn present<W: Write>(result: &ResultTable, mode: &RenderMode, out: &mut W) -> Result<()> {
    let rendered = render(result, mode)?;
    out.write_all(rendered.as_bytes())?;
    out.flush()?;
    Ok(())
}

fn labels(result: &ResultTable) -> Vec<String> {
    let keys = result.key_columns();
    (0..result.num_rows())
        .map(|r| {
            let parts: Vec<String> = keys
                .iter()
                .map(|k| result.value(k, r).unwrap_or(Value::Null).to_string())
                .collect();
            if parts.is_empty() {
                "all".to_string()
            } else {
                parts.join(" / ")
            }
        })
        .collect()
}

fn numeric_column(result: &ResultTable, name: &str) -> Result<Vec<Option<f64>>> {
    match result.column_type(name) {
        Some(t) if t.is_numeric() => Ok(result
            .column_values(name)
            .unwrap_or_default()
            .iter()
            .map(Value::as_f64)
            .collect()),
        Some(t) => Err(AnalysisError::InvalidQuery(format!(
            "cannot chart {} column `{}`",
            t, name
        ))),
        None => Err(AnalysisError::unknown_column(name)),
    }
}

/// Axis labels at full precision; they double as the heatmap's cell keys.
fn string_column(result: &ResultTable, name: &str) -> Result<Vec<String>> {
    result
        .column_values(name)
        .map(|vals| {
            vals.iter()
                .map(|v| v.to_text().unwrap_or_else(|| v.to_string()))
                .collect()
        })
        .ok_or_else(|| AnalysisError::unknown_column(name))
}

pub(crate) fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{:.2}", v)
    }
}

pub(crate) fn is_right_aligned(ty: Option<ColumnType>) -> bool {
    ty.is_some_and(|t| t.is_numeric())
}
