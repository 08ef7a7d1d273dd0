use std::{
    collections::HashSet,
    fs::File,
    io::{self, BufReader, Read},
    path::Path,
};

use csv::ReaderBuilder;
use tracing::{debug, info};

use super::{build_array, infer_column_type, utils::clean_cell, ColumnType, Table, Value};
use crate::error::{AnalysisError, Result};

/// Load a delimited file with a header row into a [`Table`].
///
/// Fails with `NotFound` if `path` does not exist and `Parse` if the file is
/// not a well-formed CSV (ragged rows, bad headers, unterminated quotes,
/// invalid UTF-8).
#[tracing::instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn load<P: AsRef<Path>>(path: P) -> Result<Table> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => AnalysisError::NotFound {
            path: path.to_path_buf(),
        },
        _ => AnalysisError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    load_from_reader(BufReader::new(file), path)
}

/// Same as [`load`], reading from any byte source. `source` names the input
/// in errors and logs.
pub fn load_from_reader<R: Read, P: AsRef<Path>>(mut reader: R, source: P) -> Result<Table> {
    let source = source.as_ref();
    let parse_err = |message: String| AnalysisError::Parse {
        path: source.to_path_buf(),
        message,
    };

    // 0) buffer the whole input; the csv reader accepts a quote left open
    //    until EOF, so that is checked up front
    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .map_err(|e| AnalysisError::Io {
            path: source.to_path_buf(),
            source: e,
        })?;
    if let Some(line) = unterminated_quote(&data) {
        return Err(parse_err(format!(
            "quoted field opened on line {} is never closed",
            line
        )));
    }

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(data.as_slice());

    // 1) headers: trimmed, non-empty, unique
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| parse_err(e.to_string()))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.is_empty() {
        return Err(parse_err("missing header row".into()));
    }
    let mut unique = HashSet::with_capacity(headers.len());
    for (idx, h) in headers.iter().enumerate() {
        if h.is_empty() {
            return Err(parse_err(format!("header at index {} is empty", idx)));
        }
        if !unique.insert(h.as_str()) {
            return Err(parse_err(format!("duplicate header `{}`", h)));
        }
    }

    // 2) buffer every record column-wise
    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
    for (idx, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| parse_err(format!("record {}: {}", idx + 1, e)))?;
        for (col, cell) in columns.iter_mut().zip(record.iter()) {
            col.push(clean_cell(cell));
        }
    }

    // 3) infer a type per column and build typed arrays
    let mut out = Vec::with_capacity(headers.len());
    for (name, cells) in headers.into_iter().zip(columns) {
        let ty = infer_column_type(&name, &cells);
        debug!(column = %name, ty = %ty, "inferred column type");
        let values: Vec<Value> = cells.into_iter().map(|c| typed_cell(ty, c)).collect();
        out.push((name, build_array(ty, &values)?));
    }

    let table = Table::from_columns(out)?;
    info!(
        rows = table.num_rows(),
        columns = table.num_columns(),
        "loaded table"
    );
    Ok(table)
}

/// Line on which a quoted field opens without a closing quote, if any.
///
/// Follows the csv reader's rules: a quote only opens a field when it is the
/// field's first byte, and `""` inside a quoted field is an escaped quote.
fn unterminated_quote(data: &[u8]) -> Option<usize> {
    let mut line = 1usize;
    let mut field_start = true;
    let mut open_at: Option<usize> = None;
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        match open_at {
            Some(_) if b == b'"' => {
                if data.get(i + 1) == Some(&b'"') {
                    i += 1;
                } else {
                    open_at = None;
                }
                field_start = false;
            }
            Some(_) => {}
            None => match b {
                b'"' if field_start => {
                    open_at = Some(line);
                    field_start = false;
                }
                b',' | b'\n' | b'\r' => field_start = true,
                _ => field_start = false,
            },
        }
        if b == b'\n' {
            line += 1;
        }
        i += 1;
    }
    open_at
}

fn typed_cell(ty: ColumnType, cell: Option<String>) -> Value {
    let Some(s) = cell else {
        return Value::Null;
    };
    match ty {
        ColumnType::Utf8 => Value::Str(s),
        ColumnType::Int64 => s.parse().map_or(Value::Null, Value::Int),
        ColumnType::Float64 => s.parse().map_or(Value::Null, Value::Float),
        // never inferred at load time
        ColumnType::Date => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,tablequery=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    const CWUR: &str = "world_rank,institution,country,score,year
1,Harvard University,USA,100,2012
2,Massachusetts Institute of Technology,USA,91.67,2012
3,University of Cambridge,United Kingdom,,2015
";

    #[test]
    fn test_load_infers_types_from_file() -> Result<()> {
        init_test_logging();
        let mut tmp = NamedTempFile::new()?;
        tmp.write_all(CWUR.as_bytes())?;

        let table = load(tmp.path())?;
        assert_eq!(table.num_rows(), 3);
        assert_eq!(
            table.column_names(),
            vec!["world_rank", "institution", "country", "score", "year"]
        );
        assert_eq!(table.column_type("world_rank"), Some(ColumnType::Int64));
        assert_eq!(table.column_type("institution"), Some(ColumnType::Utf8));
        assert_eq!(table.column_type("score"), Some(ColumnType::Float64));
        assert_eq!(table.value("score", 2), Some(Value::Null));
        assert_eq!(table.value("score", 0), Some(Value::Float(100.0)));
        Ok(())
    }

    #[test]
    fn test_quoted_fields_keep_embedded_commas() -> Result<()> {
        let data = "show_id,country\ns1,\"United States, India\"\n";
        let table = load_from_reader(data.as_bytes(), "inline")?;
        assert_eq!(
            table.value("country", 0),
            Some(Value::Str("United States, India".into()))
        );
        Ok(())
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let err = load("/definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, AnalysisError::NotFound { .. }));
    }

    #[test]
    fn test_ragged_rows_are_parse_errors() {
        let data = "a,b\n1,2\n3\n";
        let err = load_from_reader(data.as_bytes(), "inline").unwrap_err();
        assert!(matches!(err, AnalysisError::Parse { .. }), "{err}");
    }

    #[test]
    fn test_unterminated_quote_is_a_parse_error() {
        let data = "a,b\n1,\"oops\n3,4\n";
        let err = load_from_reader(data.as_bytes(), "inline").unwrap_err();
        match err {
            AnalysisError::Parse { message, .. } => assert!(message.contains("line 2"), "{message}"),
            other => panic!("expected a parse error, got {other}"),
        }
    }

    #[test]
    fn test_escaped_and_mid_field_quotes_still_load() -> Result<()> {
        let data = "title,size\n\"The \"\"Best\"\" Show\",5\"\nplain,\"multi\nline\"\n";
        let table = load_from_reader(data.as_bytes(), "inline")?;
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.value("title", 0), Some(Value::from("The \"Best\" Show")));
        assert_eq!(table.value("size", 0), Some(Value::from("5\"")));
        assert_eq!(table.value("size", 1), Some(Value::from("multi\nline")));
        Ok(())
    }

    #[test]
    fn test_duplicate_and_empty_headers_are_parse_errors() {
        let err = load_from_reader("a,a\n1,2\n".as_bytes(), "inline").unwrap_err();
        assert!(matches!(err, AnalysisError::Parse { .. }));
        let err = load_from_reader("a, \n1,2\n".as_bytes(), "inline").unwrap_err();
        assert!(matches!(err, AnalysisError::Parse { .. }));
    }
}
