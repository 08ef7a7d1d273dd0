use tracing::debug;

use super::ColumnType;

/// Pick a column type from every non-missing cell:
///  - all cells parse as integers ⇒ Int64
///  - all cells parse as numbers (some fractional) ⇒ Float64
///  - anything else, or no cells at all ⇒ Utf8
pub fn infer_column_type(column: &str, cells: &[Option<String>]) -> ColumnType {
    let mut seen: Option<ColumnType> = None;

    for cell in cells.iter().flatten() {
        let inferred = infer_cell_type(cell);
        seen = match (seen, inferred) {
            (_, ColumnType::Utf8) => {
                debug!(column, sample = %cell, "non-numeric sample, column stays utf8");
                return ColumnType::Utf8;
            }
            (None, t) => Some(t),
            (Some(prev), t) if prev == t => Some(prev),
            // mixed integers and fractions widen to float
            (Some(_), _) => Some(ColumnType::Float64),
        };
    }

    seen.unwrap_or_else(|| {
        debug!(column, "no non-empty samples, defaulting to utf8");
        ColumnType::Utf8
    })
}

fn infer_cell_type(v: &str) -> ColumnType {
    if v.parse::<i64>().is_ok() {
        return ColumnType::Int64;
    }
    // `f64::from_str` also accepts "inf" and "NaN"; those are text here.
    match v.parse::<f64>() {
        Ok(f) if f.is_finite() && v.bytes().any(|b| b.is_ascii_digit()) => ColumnType::Float64,
        _ => ColumnType::Utf8,
    }
}
