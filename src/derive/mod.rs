//! Declarative column derivations.
//!
//! A [`ColumnSpec`] names an output column, the [`Rule`] that computes it from
//! existing columns, and a [`MissingPolicy`] for rows where the rule yields no
//! value. Per-row failures (unparseable dates, non-numeric text) are nulls;
//! only a misconfigured spec is an error.

pub mod convert;
pub mod date_parser;

use arrow::array::BooleanArray;
use chrono::Datelike;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AnalysisError, Result};
use crate::table::{build_array, value_at, ColumnType, Table, Value};

use self::{convert::cast_value, date_parser::parse_date};

/// How a derived column is computed from its source column(s).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Rule {
    /// Copy of `source` under a new name.
    Identity { source: String },
    /// Text → date. `formats` empty means the tolerant built-in list.
    DateParse {
        source: String,
        #[serde(default)]
        formats: Vec<String>,
    },
    /// Capture `group` of `pattern`'s first match; no match is missing.
    RegexExtract {
        source: String,
        pattern: String,
        #[serde(default = "first_group")]
        group: usize,
    },
    /// Convert to integer, float or string.
    Cast { source: String, to: ColumnType },
    /// `year(end_date) - start_year`, as an integer.
    YearsBetween { start_year: String, end_date: String },
}

fn first_group() -> usize {
    1
}

impl Rule {
    pub fn sources(&self) -> Vec<&str> {
        match self {
            Rule::Identity { source }
            | Rule::DateParse { source, .. }
            | Rule::RegexExtract { source, .. }
            | Rule::Cast { source, .. } => vec![source.as_str()],
            Rule::YearsBetween {
                start_year,
                end_date,
            } => vec![start_year.as_str(), end_date.as_str()],
        }
    }
}

/// What to do with rows the rule produced no value for.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Leave the cell null.
    #[default]
    Propagate,
    /// Fill with this value; it must have the derived column's type.
    Default(Value),
    /// Remove the row from the derived table.
    DropRow,
}

/// One derived column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(flatten)]
    pub rule: Rule,
    #[serde(default)]
    pub missing: MissingPolicy,
    /// Remove the source column once the new one exists.
    #[serde(default)]
    pub drop_source: bool,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, rule: Rule) -> Self {
        Self {
            name: name.into(),
            rule,
            missing: MissingPolicy::Propagate,
            drop_source: false,
        }
    }

    pub fn identity(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(
            name,
            Rule::Identity {
                source: source.into(),
            },
        )
    }

    pub fn date_parse(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(
            name,
            Rule::DateParse {
                source: source.into(),
                formats: Vec::new(),
            },
        )
    }

    pub fn date_parse_with(
        name: impl Into<String>,
        source: impl Into<String>,
        formats: &[&str],
    ) -> Self {
        Self::new(
            name,
            Rule::DateParse {
                source: source.into(),
                formats: formats.iter().map(|f| f.to_string()).collect(),
            },
        )
    }

    pub fn regex_extract(
        name: impl Into<String>,
        source: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            Rule::RegexExtract {
                source: source.into(),
                pattern: pattern.into(),
                group: 1,
            },
        )
    }

    pub fn cast(name: impl Into<String>, source: impl Into<String>, to: ColumnType) -> Self {
        Self::new(
            name,
            Rule::Cast {
                source: source.into(),
                to,
            },
        )
    }

    pub fn years_between(
        name: impl Into<String>,
        start_year: impl Into<String>,
        end_date: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            Rule::YearsBetween {
                start_year: start_year.into(),
                end_date: end_date.into(),
            },
        )
    }

    /// Use capture group `group` instead of the first one.
    pub fn group(mut self, group: usize) -> Self {
        if let Rule::RegexExtract { group: g, .. } = &mut self.rule {
            *g = group;
        }
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.missing = MissingPolicy::Default(value.into());
        self
    }

    pub fn drop_missing_rows(mut self) -> Self {
        self.missing = MissingPolicy::DropRow;
        self
    }

    pub fn drop_source(mut self) -> Self {
        self.drop_source = true;
        self
    }
}

/// A spec checked against a table, ready to evaluate row by row.
enum Compiled<'a> {
    Identity,
    Date(&'a [String]),
    Extract(Regex, usize),
    Cast(ColumnType),
    YearsBetween,
}

fn compile<'a>(table: &Table, spec: &'a ColumnSpec) -> Result<(Compiled<'a>, ColumnType)> {
    let err = |msg: String| AnalysisError::derivation(&spec.name, msg);

    for src in spec.rule.sources() {
        if !table.has_column(src) {
            return Err(err(format!("unknown source column `{}`", src)));
        }
    }

    let compiled = match &spec.rule {
        Rule::Identity { source } => {
            let ty = table
                .column_type(source)
                .ok_or_else(|| err(format!("unknown source column `{}`", source)))?;
            (Compiled::Identity, ty)
        }
        Rule::DateParse { formats, .. } => {
            if formats.iter().any(|f| f.trim().is_empty()) {
                return Err(err("empty date format".into()));
            }
            (Compiled::Date(formats), ColumnType::Date)
        }
        Rule::RegexExtract { pattern, group, .. } => {
            let re = Regex::new(pattern).map_err(|e| err(format!("invalid regex: {}", e)))?;
            // captures_len counts the implicit whole-match group 0
            if *group >= re.captures_len() {
                return Err(err(format!(
                    "pattern `{}` has no capture group {}",
                    pattern, group
                )));
            }
            (Compiled::Extract(re, *group), ColumnType::Utf8)
        }
        Rule::Cast { to, .. } => {
            if *to == ColumnType::Date {
                return Err(err("cast to date is not supported; use date_parse".into()));
            }
            (Compiled::Cast(*to), *to)
        }
        Rule::YearsBetween { .. } => (Compiled::YearsBetween, ColumnType::Int64),
    };

    if let MissingPolicy::Default(v) = &spec.missing {
        let fits = match v.column_type() {
            Some(t) => t == compiled.1 || (t == ColumnType::Int64 && compiled.1 == ColumnType::Float64),
            None => false,
        };
        if !fits {
            return Err(err(format!(
                "default {:?} does not match derived type {}",
                v, compiled.1
            )));
        }
    }

    Ok(compiled)
}

fn eval_row(rule: &Compiled<'_>, inputs: &[Value]) -> Value {
    match rule {
        Compiled::Identity => inputs[0].clone(),
        Compiled::Date(formats) => match &inputs[0] {
            Value::Date(d) => Value::Date(*d),
            other => other
                .to_text()
                .and_then(|s| parse_date(&s, formats))
                .map_or(Value::Null, Value::Date),
        },
        Compiled::Extract(re, group) => inputs[0]
            .to_text()
            .and_then(|s| {
                re.captures(&s)
                    .and_then(|c| c.get(*group))
                    .map(|m| m.as_str().to_string())
            })
            .map_or(Value::Null, Value::Str),
        Compiled::Cast(to) => cast_value(&inputs[0], *to),
        Compiled::YearsBetween => {
            let start = match cast_value(&inputs[0], ColumnType::Int64) {
                Value::Int(y) => y,
                _ => return Value::Null,
            };
            let end = match &inputs[1] {
                Value::Date(d) => Some(*d),
                other => other.to_text().and_then(|s| parse_date(&s, &[])),
            };
            end.and_then(|d| i64::from(d.year()).checked_sub(start))
                .map_or(Value::Null, Value::Int)
        }
    }
}

/// Apply `spec` to every row of `table`, returning a new table with the
/// derived column added (or replaced, if the name already exists).
#[tracing::instrument(level = "debug", skip_all, fields(column = %spec.name))]
pub fn derive(table: &Table, spec: &ColumnSpec) -> Result<Table> {
    let (rule, ty) = compile(table, spec)?;

    let sources: Vec<_> = spec
        .rule
        .sources()
        .into_iter()
        .map(|s| {
            table
                .column(s)
                .cloned()
                .ok_or_else(|| AnalysisError::derivation(&spec.name, format!("unknown source column `{}`", s)))
        })
        .collect::<Result<_>>()?;

    let mut values = Vec::with_capacity(table.num_rows());
    let mut missing = 0usize;
    let mut inputs = Vec::with_capacity(sources.len());
    for row in 0..table.num_rows() {
        inputs.clear();
        inputs.extend(sources.iter().map(|a| value_at(a.as_ref(), row)));
        let v = eval_row(&rule, &inputs);
        if v.is_null() {
            missing += 1;
        }
        values.push(v);
    }
    debug!(rows = values.len(), missing, "derived column");

    let keep: Option<BooleanArray> = match &spec.missing {
        MissingPolicy::Propagate => None,
        MissingPolicy::Default(d) => {
            for v in values.iter_mut().filter(|v| v.is_null()) {
                *v = d.clone();
            }
            None
        }
        MissingPolicy::DropRow => {
            Some(values.iter().map(|v| Some(!v.is_null())).collect())
        }
    };

    let array = build_array(ty, &values)?;
    let mut out = table.with_column(&spec.name, array)?;
    if spec.drop_source {
        for src in spec.rule.sources() {
            if src != spec.name {
                out = out.without_column(src)?;
            }
        }
    }
    if let Some(mask) = keep {
        out = out.filter(&mask)?;
    }
    Ok(out)
}

/// Apply specs in order; later specs may read columns earlier ones made.
pub fn derive_all(table: &Table, specs: &[ColumnSpec]) -> Result<Table> {
    specs.iter().try_fold(table.clone(), |t, spec| derive(&t, spec))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::load_from_reader;
    use chrono::NaiveDate;

    const NETFLIX: &str = "show_id,type,title,date_added,release_year,duration
s1,Movie,Dick Johnson Is Dead,\"September 25, 2021\",2020,90 min
s2,TV Show,Blood & Water,\"September 24, 2021\",2021,2 Seasons
s3,TV Show,Ganglands,someday,2021,1 Season
s4,Movie,Sankofa,,1993,
";

    fn netflix() -> Table {
        load_from_reader(NETFLIX.as_bytes(), "netflix").unwrap()
    }

    fn strings(t: &Table, col: &str) -> Vec<Value> {
        (0..t.num_rows()).map(|r| t.value(col, r).unwrap()).collect()
    }

    #[test]
    fn identity_adds_a_copy_and_keeps_everything_else() {
        let t = netflix();
        let out = derive(&t, &ColumnSpec::identity("kind", "type")).unwrap();
        assert_eq!(out.num_rows(), t.num_rows());
        assert_eq!(out.num_columns(), t.num_columns() + 1);
        for name in t.column_names() {
            assert_eq!(strings(&out, &name), strings(&t, &name));
        }
        assert_eq!(strings(&out, "kind"), strings(&t, "type"));
    }

    #[test]
    fn regex_extracts_duration_number_and_unit() {
        let t = netflix();
        let t = derive(&t, &ColumnSpec::regex_extract("amount", "duration", r"^(\d+)")).unwrap();
        let t = derive(
            &t,
            &ColumnSpec::regex_extract("unit", "duration", r"(min|Seasons?)$"),
        )
        .unwrap();
        assert_eq!(t.value("amount", 0), Some(Value::from("90")));
        assert_eq!(t.value("unit", 0), Some(Value::from("min")));
        assert_eq!(t.value("amount", 1), Some(Value::from("2")));
        assert_eq!(t.value("unit", 1), Some(Value::from("Seasons")));
        assert_eq!(t.value("unit", 2), Some(Value::from("Season")));
        assert_eq!(t.value("amount", 3), Some(Value::Null));
    }

    #[test]
    fn regex_default_fills_non_matches() {
        let t = netflix();
        let spec = ColumnSpec::regex_extract("amount", "duration", r"^(\d+)").with_default("0");
        let t = derive(&t, &spec).unwrap();
        assert_eq!(t.value("amount", 3), Some(Value::from("0")));
    }

    #[test]
    fn malformed_dates_become_null_not_errors() {
        let t = derive(&netflix(), &ColumnSpec::date_parse("added", "date_added")).unwrap();
        assert_eq!(t.column_type("added"), Some(ColumnType::Date));
        assert_eq!(
            t.value("added", 0),
            Some(Value::Date(NaiveDate::from_ymd_opt(2021, 9, 25).unwrap()))
        );
        assert_eq!(t.value("added", 2), Some(Value::Null));
        assert_eq!(t.value("added", 3), Some(Value::Null));
        assert_eq!(t.num_rows(), 4);
    }

    #[test]
    fn drop_row_policy_removes_only_missing_rows() {
        let spec = ColumnSpec::date_parse("added", "date_added").drop_missing_rows();
        let t = derive(&netflix(), &spec).unwrap();
        assert_eq!(t.num_rows(), 2);
        assert_eq!(t.value("show_id", 1), Some(Value::from("s2")));
    }

    #[test]
    fn cast_and_years_between() {
        let t = netflix();
        let t = derive(&t, &ColumnSpec::regex_extract("amount", "duration", r"^(\d+)")).unwrap();
        let t = derive(&t, &ColumnSpec::cast("minutes", "amount", ColumnType::Int64).drop_source())
            .unwrap();
        assert!(!t.has_column("amount"));
        assert_eq!(t.value("minutes", 0), Some(Value::Int(90)));
        assert_eq!(t.value("minutes", 3), Some(Value::Null));

        let t = derive(&t, &ColumnSpec::date_parse("added", "date_added")).unwrap();
        let t = derive(&t, &ColumnSpec::years_between("delay", "release_year", "added")).unwrap();
        assert_eq!(t.value("delay", 0), Some(Value::Int(1)));
        assert_eq!(t.value("delay", 1), Some(Value::Int(0)));
        assert_eq!(t.value("delay", 2), Some(Value::Null));
    }

    #[test]
    fn years_between_out_of_range_is_null() {
        let data = "release_year,added\n-9223372036854775808,\"May 1, 2020\"\n2019,\"May 1, 2020\"\n";
        let t = load_from_reader(data.as_bytes(), "years").unwrap();
        assert_eq!(t.column_type("release_year"), Some(ColumnType::Int64));
        let t = derive(&t, &ColumnSpec::years_between("delay", "release_year", "added")).unwrap();
        assert_eq!(t.value("delay", 0), Some(Value::Null));
        assert_eq!(t.value("delay", 1), Some(Value::Int(1)));
    }

    #[test]
    fn replacing_a_column_keeps_its_position() {
        let t = netflix();
        let out = derive(&t, &ColumnSpec::date_parse("date_added", "date_added")).unwrap();
        assert_eq!(out.column_names(), t.column_names());
        assert_eq!(out.column_type("date_added"), Some(ColumnType::Date));
    }

    #[test]
    fn configuration_errors_are_derivation_errors() {
        let t = netflix();
        let bad = [
            ColumnSpec::regex_extract("x", "duration", r"(unclosed"),
            ColumnSpec::regex_extract("x", "duration", r"\d+"),
            ColumnSpec::regex_extract("x", "duration", r"(\d+)").group(2),
            ColumnSpec::identity("x", "nope"),
            ColumnSpec::cast("x", "duration", ColumnType::Date),
            ColumnSpec::cast("x", "duration", ColumnType::Int64).with_default("zero"),
        ];
        for spec in &bad {
            let err = derive(&t, spec).unwrap_err();
            assert!(matches!(err, AnalysisError::Derivation { .. }), "{spec:?}: {err}");
        }
    }

    #[test]
    fn specs_serialize_with_a_rule_tag() {
        let spec = ColumnSpec::regex_extract("amount", "duration", r"^(\d+)");
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["rule"], "regex_extract");
        assert_eq!(json["group"], 1);
        let back: ColumnSpec = serde_json::from_value(json).unwrap();
        assert_eq!(back, spec);
    }
}
