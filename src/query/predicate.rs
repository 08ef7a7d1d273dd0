use std::cmp::Ordering;

use arrow::array::{Array, BooleanArray};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Result};
use crate::table::{require_column, value_at, Table, Value};

/// Comparison operators for [`Predicate::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn holds(self, ord: Ordering) -> bool {
        match self {
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Le => ord != Ordering::Greater,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Ge => ord != Ordering::Less,
        }
    }
}

/// A boolean test over one row. Null cells never satisfy a predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Predicate {
    Equals {
        column: String,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
    },
    Contains {
        column: String,
        needle: String,
        #[serde(default)]
        case_insensitive: bool,
    },
    Compare {
        column: String,
        cmp: CompareOp,
        value: Value,
    },
    /// Inclusive on both ends.
    Between {
        column: String,
        low: Value,
        high: Value,
    },
    NotNull {
        column: String,
    },
    /// Regex search over the cell's text.
    Matches {
        column: String,
        pattern: String,
    },
}

impl Predicate {
    pub fn equals(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::Equals {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn is_in<V: Into<Value>>(column: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Predicate::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(column: impl Into<String>, needle: impl Into<String>) -> Self {
        Predicate::Contains {
            column: column.into(),
            needle: needle.into(),
            case_insensitive: false,
        }
    }

    pub fn contains_ignore_case(column: impl Into<String>, needle: impl Into<String>) -> Self {
        Predicate::Contains {
            column: column.into(),
            needle: needle.into(),
            case_insensitive: true,
        }
    }

    pub fn compare(column: impl Into<String>, cmp: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            column: column.into(),
            cmp,
            value: value.into(),
        }
    }

    pub fn between(
        column: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Predicate::Between {
            column: column.into(),
            low: low.into(),
            high: high.into(),
        }
    }

    pub fn not_null(column: impl Into<String>) -> Self {
        Predicate::NotNull {
            column: column.into(),
        }
    }

    pub fn matches(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Predicate::Matches {
            column: column.into(),
            pattern: pattern.into(),
        }
    }

    pub fn column(&self) -> &str {
        match self {
            Predicate::Equals { column, .. }
            | Predicate::In { column, .. }
            | Predicate::Contains { column, .. }
            | Predicate::Compare { column, .. }
            | Predicate::Between { column, .. }
            | Predicate::NotNull { column }
            | Predicate::Matches { column, .. } => column,
        }
    }

    /// Evaluate against every row of `table`.
    pub fn evaluate(&self, table: &Table) -> Result<BooleanArray> {
        let array = require_column(table, self.column())?;
        let test = self.compile()?;
        Ok((0..array.len())
            .map(|row| Some(test.eval(&value_at(array.as_ref(), row))))
            .collect())
    }

    fn compile(&self) -> Result<Compiled<'_>> {
        Ok(match self {
            Predicate::Matches { pattern, .. } => Compiled::Regex(
                Regex::new(pattern)
                    .map_err(|e| AnalysisError::InvalidQuery(format!("invalid regex: {}", e)))?,
            ),
            Predicate::Contains {
                needle,
                case_insensitive: true,
                ..
            } => Compiled::ContainsFolded(needle.to_lowercase()),
            other => Compiled::Plain(other),
        })
    }
}

enum Compiled<'a> {
    Plain(&'a Predicate),
    ContainsFolded(String),
    Regex(Regex),
}

impl Compiled<'_> {
    fn eval(&self, v: &Value) -> bool {
        if v.is_null() {
            return false;
        }
        match self {
            Compiled::Regex(re) => v.to_text().is_some_and(|s| re.is_match(&s)),
            Compiled::ContainsFolded(needle) => v
                .to_text()
                .is_some_and(|s| s.to_lowercase().contains(needle.as_str())),
            Compiled::Plain(p) => match p {
                Predicate::Equals { value, .. } => v.compare(value) == Some(Ordering::Equal),
                Predicate::In { values, .. } => values
                    .iter()
                    .any(|x| v.compare(x) == Some(Ordering::Equal)),
                Predicate::Contains { needle, .. } => {
                    v.to_text().is_some_and(|s| s.contains(needle.as_str()))
                }
                Predicate::Compare { cmp, value, .. } => {
                    v.compare(value).is_some_and(|o| cmp.holds(o))
                }
                Predicate::Between { low, high, .. } => {
                    v.compare(low).is_some_and(|o| o != Ordering::Less)
                        && v.compare(high).is_some_and(|o| o != Ordering::Greater)
                }
                Predicate::NotNull { .. } => true,
                // compiled above
                Predicate::Matches { .. } => false,
            },
        }
    }
}

/// Rows satisfying every predicate. An empty set keeps every row.
pub fn select(table: &Table, predicates: &[Predicate]) -> Result<Table> {
    if predicates.is_empty() {
        return Ok(table.clone());
    }
    let mut keep = vec![true; table.num_rows()];
    for p in predicates {
        let mask = p.evaluate(table)?;
        for (k, m) in keep.iter_mut().zip(mask.iter()) {
            *k &= m.unwrap_or(false);
        }
    }
    table.filter(&BooleanArray::from(keep))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::load_from_reader;

    const TITLES: &str = "type,title,rating,release_year,description
Movie,Kill Bill,R,2003,A bride seeks revenge and sets out to kill.
TV Show,Skill Games,TV-PG,2019,Contestants show their skills.
Movie,Peaceful,PG,2015,
TV Show,Violence Inc,TV-MA,2020,Corporate VIOLENCE everywhere.
";

    fn titles() -> Table {
        load_from_reader(TITLES.as_bytes(), "titles").unwrap()
    }

    fn count(preds: &[Predicate]) -> usize {
        select(&titles(), preds).unwrap().num_rows()
    }

    #[test]
    fn equality_membership_and_comparisons() {
        assert_eq!(count(&[Predicate::equals("type", "Movie")]), 2);
        assert_eq!(count(&[Predicate::is_in("rating", ["PG", "R"])]), 2);
        assert_eq!(
            count(&[Predicate::compare("release_year", CompareOp::Ge, 2015_i64)]),
            3
        );
        assert_eq!(count(&[Predicate::between("release_year", 2015_i64, 2019_i64)]), 2);
        // integer column against a float constant compares numerically
        assert_eq!(count(&[Predicate::equals("release_year", 2003.0)]), 1);
    }

    #[test]
    fn predicates_combine_with_and() {
        assert_eq!(
            count(&[
                Predicate::equals("type", "TV Show"),
                Predicate::compare("release_year", CompareOp::Gt, 2019_i64),
            ]),
            1
        );
    }

    #[test]
    fn substring_contains_with_and_without_case() {
        assert_eq!(count(&[Predicate::contains("description", "violence")]), 0);
        assert_eq!(count(&[Predicate::contains_ignore_case("description", "violence")]), 1);
    }

    #[test]
    fn keyword_match_uses_word_boundaries() {
        let p = Predicate::matches("description", r"(?i)\b(kill|violence)\b");
        // "skills" must not match "kill"
        let rows = select(&titles(), &[p]).unwrap();
        assert_eq!(rows.num_rows(), 2);
        assert_eq!(rows.value("title", 0), Some(Value::from("Kill Bill")));
        assert_eq!(rows.value("title", 1), Some(Value::from("Violence Inc")));
    }

    #[test]
    fn nulls_never_match() {
        assert_eq!(count(&[Predicate::not_null("description")]), 3);
        assert_eq!(count(&[Predicate::contains("description", "")]), 3);
    }

    #[test]
    fn unknown_column_and_bad_regex_are_invalid_queries() {
        let err = select(&titles(), &[Predicate::equals("nope", "x")]).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidQuery(_)));
        let err = select(&titles(), &[Predicate::matches("title", "(")]).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidQuery(_)));
    }
}
