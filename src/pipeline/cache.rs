use std::{collections::HashMap, sync::Mutex};

use tracing::debug;

use crate::derive::{derive, ColumnSpec};
use crate::error::{AnalysisError, Result};
use crate::table::Table;

/// Derived tables keyed by the serialized derivation prefix that produced
/// them. Valid for a single base table only.
#[derive(Debug, Default)]
pub struct DerivationCache {
    tables: Mutex<HashMap<String, Table>>,
}

impl DerivationCache {
    /// Apply `specs` to `base`, reusing the longest prefix already derived.
    pub fn derived(&self, base: &Table, specs: &[ColumnSpec]) -> Result<Table> {
        let keys = specs
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                serde_json::to_string(&specs[..=i])
                    .map_err(|e| AnalysisError::derivation(&spec.name, e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let (mut table, done) = {
            let cached = self.tables.lock().unwrap_or_else(|e| e.into_inner());
            keys.iter()
                .enumerate()
                .rev()
                .find_map(|(i, k)| cached.get(k).map(|t| (t.clone(), i + 1)))
                .unwrap_or_else(|| (base.clone(), 0))
        };
        if done > 0 {
            debug!(reused = done, total = specs.len(), "derivation cache hit");
        }

        for (spec, key) in specs.iter().zip(&keys).skip(done) {
            table = derive(&table, spec)?;
            self.tables
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(key.clone(), table.clone());
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.tables.lock().map_or(0, |t| t.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
