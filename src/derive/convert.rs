use crate::table::{utils::clean_str, ColumnType, Value};

/// Convert one cell to `to`. Anything that does not convert cleanly is null.
pub fn cast_value(v: &Value, to: ColumnType) -> Value {
    match to {
        ColumnType::Int64 => to_int(v).map_or(Value::Null, Value::Int),
        ColumnType::Float64 => to_float(v).map_or(Value::Null, Value::Float),
        ColumnType::Utf8 => v.to_text().map_or(Value::Null, Value::Str),
        ColumnType::Date => Value::Null,
    }
}

fn to_int(v: &Value) -> Option<i64> {
    match v {
        Value::Int(i) => Some(*i),
        Value::Float(f) => integral(*f),
        Value::Str(s) => {
            let s = clean_str(s);
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        Value::Null | Value::Date(_) => None,
    }
}

fn to_float(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Str(s) => clean_str(s).parse::<f64>().ok().filter(|f| f.is_finite()),
        Value::Null | Value::Date(_) => None,
    }
}

fn integral(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casts_text_to_numbers() {
        assert_eq!(cast_value(&Value::from("90"), ColumnType::Int64), Value::Int(90));
        assert_eq!(cast_value(&Value::from(" 2.0 "), ColumnType::Int64), Value::Int(2));
        assert_eq!(cast_value(&Value::from("4.5"), ColumnType::Float64), Value::Float(4.5));
    }

    #[test]
    fn unconvertible_values_become_null() {
        assert_eq!(cast_value(&Value::from("90 min"), ColumnType::Int64), Value::Null);
        assert_eq!(cast_value(&Value::Float(2.5), ColumnType::Int64), Value::Null);
        assert_eq!(cast_value(&Value::from("NaN"), ColumnType::Float64), Value::Null);
        assert_eq!(cast_value(&Value::Null, ColumnType::Float64), Value::Null);
    }

    #[test]
    fn casts_numbers_to_text() {
        assert_eq!(cast_value(&Value::Int(7), ColumnType::Utf8), Value::from("7"));
    }
}
