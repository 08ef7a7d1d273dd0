//! Filter, group and aggregate a [`Table`] into a [`ResultTable`].

mod aggregate;
mod predicate;
mod result;

use std::{cmp::Ordering, collections::HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AnalysisError, Result};
use crate::table::{build_array, require_column, value_at, Table, Value};

pub use aggregate::{percentage, Aggregate};
pub use predicate::{select, CompareOp, Predicate};
pub use result::ResultTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Sort result rows by one result column. Nulls always sort last; ties keep
/// group order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub column: String,
    pub order: SortOrder,
}

/// An aggregate plus the result column it lands in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(flatten)]
    pub aggregate: Aggregate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Metric {
    pub fn output_name(&self) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| self.aggregate.default_name())
    }
}

/// A named filter → group → aggregate → sort query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub name: String,
    #[serde(default)]
    pub predicates: Vec<Predicate>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<Metric>,
    #[serde(default)]
    pub sort: Option<Sort>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            predicates: Vec::new(),
            group_by: Vec::new(),
            metrics: Vec::new(),
            sort: None,
            limit: None,
        }
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn group_by<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.metrics.push(Metric {
            aggregate,
            alias: None,
        });
        self
    }

    pub fn aggregate_as(mut self, aggregate: Aggregate, alias: impl Into<String>) -> Self {
        self.metrics.push(Metric {
            aggregate,
            alias: Some(alias.into()),
        });
        self
    }

    pub fn sort_by(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(Sort {
            column: column.into(),
            order,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

/// Hashable image of a group key cell. Null keys never reach here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyAtom {
    Str(String),
    Int(i64),
    Float(u64),
    Date(chrono::NaiveDate),
}

impl KeyAtom {
    fn of(v: &Value) -> Option<Self> {
        match v {
            Value::Null => None,
            Value::Str(s) => Some(KeyAtom::Str(s.clone())),
            Value::Int(i) => Some(KeyAtom::Int(*i)),
            Value::Float(f) => Some(KeyAtom::Float(f.to_bits())),
            Value::Date(d) => Some(KeyAtom::Date(*d)),
        }
    }
}

struct Group {
    key: Vec<Value>,
    rows: Vec<usize>,
}

/// Run `query` over `table`.
///
/// 1. keep rows matching every predicate
/// 2. partition by the `group_by` tuple in first-seen order, skipping rows
///    with a null key (no keys = one global group)
/// 3. compute each metric per group
/// 4. optionally stable-sort by one result column and truncate to `limit`
#[tracing::instrument(level = "info", skip_all, fields(query = %query.name))]
pub fn run(table: &Table, query: &Query) -> Result<ResultTable> {
    // validate everything up front so misconfiguration fails before any work
    let key_types = query
        .group_by
        .iter()
        .map(|k| {
            table
                .column_type(k)
                .ok_or_else(|| AnalysisError::unknown_column(k))
        })
        .collect::<Result<Vec<_>>>()?;
    let metric_types = query
        .metrics
        .iter()
        .map(|m| m.aggregate.output_type(table))
        .collect::<Result<Vec<_>>>()?;
    let metric_names: Vec<String> = query.metrics.iter().map(Metric::output_name).collect();
    if query.group_by.is_empty() && query.metrics.is_empty() {
        return Err(AnalysisError::InvalidQuery(format!(
            "query `{}` has neither group keys nor metrics",
            query.name
        )));
    }
    let mut seen = std::collections::HashSet::new();
    for name in query.group_by.iter().chain(&metric_names) {
        if !seen.insert(name.as_str()) {
            return Err(AnalysisError::InvalidQuery(format!(
                "duplicate result column `{}`",
                name
            )));
        }
    }
    if let Some(sort) = &query.sort {
        if !seen.contains(sort.column.as_str()) {
            return Err(AnalysisError::InvalidQuery(format!(
                "sort column `{}` is not a result column",
                sort.column
            )));
        }
    }

    // 1) filter
    let selected = select(table, &query.predicates)?;
    let total = selected.num_rows();

    // 2) group
    let groups = partition(&selected, &query.group_by)?;
    debug!(selected = total, groups = groups.len(), "grouped rows");

    // 3) aggregate
    let mut columns: Vec<Vec<Value>> = vec![Vec::with_capacity(groups.len()); metric_names.len()];
    for group in &groups {
        for (metric, out) in query.metrics.iter().zip(columns.iter_mut()) {
            let values: Vec<Value> = match metric.aggregate.input_column() {
                Some(c) => {
                    let arr = require_column(&selected, c)?;
                    group
                        .rows
                        .iter()
                        .map(|&r| value_at(arr.as_ref(), r))
                        .collect()
                }
                None => Vec::new(),
            };
            out.push(metric.aggregate.compute(&values, group.rows.len(), total));
        }
    }

    // 4) sort + limit, as a permutation over group indices
    let mut order: Vec<usize> = (0..groups.len()).collect();
    if let Some(sort) = &query.sort {
        let sort_values: Vec<&Value> = match query.group_by.iter().position(|k| *k == sort.column) {
            Some(ki) => groups.iter().map(|g| &g.key[ki]).collect(),
            None => {
                let mi = metric_names
                    .iter()
                    .position(|m| *m == sort.column)
                    .ok_or_else(|| AnalysisError::unknown_column(&sort.column))?;
                columns[mi].iter().collect()
            }
        };
        order.sort_by(|&a, &b| compare_for_sort(sort_values[a], sort_values[b], sort.order));
    }
    if let Some(n) = query.limit {
        order.truncate(n);
    }

    // 5) materialize
    let mut out = Vec::with_capacity(key_types.len() + metric_types.len());
    for (ki, (name, ty)) in query.group_by.iter().zip(&key_types).enumerate() {
        let vals: Vec<Value> = order.iter().map(|&g| groups[g].key[ki].clone()).collect();
        out.push((name.clone(), build_array(*ty, &vals)?));
    }
    for ((name, ty), col) in metric_names.iter().zip(&metric_types).zip(&columns) {
        let vals: Vec<Value> = order.iter().map(|&g| col[g].clone()).collect();
        out.push((name.clone(), build_array(*ty, &vals)?));
    }
    let result = Table::from_columns(out)?;
    info!(rows = result.num_rows(), "query finished");

    Ok(ResultTable {
        name: query.name.clone(),
        keys: query.group_by.clone(),
        metrics: metric_names,
        table: result,
    })
}

fn partition(table: &Table, keys: &[String]) -> Result<Vec<Group>> {
    if keys.is_empty() {
        return Ok(vec![Group {
            key: Vec::new(),
            rows: (0..table.num_rows()).collect(),
        }]);
    }
    let arrays = keys
        .iter()
        .map(|k| require_column(table, k))
        .collect::<Result<Vec<_>>>()?;

    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<Vec<KeyAtom>, usize> = HashMap::new();
    'rows: for row in 0..table.num_rows() {
        let mut key = Vec::with_capacity(arrays.len());
        let mut atoms = Vec::with_capacity(arrays.len());
        for arr in &arrays {
            let v = value_at(arr.as_ref(), row);
            let Some(atom) = KeyAtom::of(&v) else {
                continue 'rows;
            };
            atoms.push(atom);
            key.push(v);
        }
        match index.get(&atoms) {
            Some(&g) => groups[g].rows.push(row),
            None => {
                index.insert(atoms, groups.len());
                groups.push(Group {
                    key,
                    rows: vec![row],
                });
            }
        }
    }
    Ok(groups)
}

fn compare_for_sort(a: &Value, b: &Value, order: SortOrder) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let o = a.compare(b).unwrap_or(Ordering::Equal);
            match order {
                SortOrder::Asc => o,
                SortOrder::Desc => o.reverse(),
            }
        }
    }
}
