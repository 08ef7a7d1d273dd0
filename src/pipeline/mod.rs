//! Named pipelines: derive → query → render over one loaded table.

mod cache;

use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::derive::ColumnSpec;
use crate::error::{AnalysisError, Result};
use crate::present::{render, RenderMode};
use crate::query::{self, Query};
use crate::table::Table;

pub use cache::DerivationCache;

/// One analysis: derivations applied in order, then one query and one render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    #[serde(default)]
    pub derive: Vec<ColumnSpec>,
    pub query: Query,
    pub render: RenderMode,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, query: Query, render: RenderMode) -> Self {
        Self {
            name: name.into(),
            derive: Vec::new(),
            query,
            render,
        }
    }

    pub fn derive(mut self, spec: ColumnSpec) -> Self {
        self.derive.push(spec);
        self
    }

    /// Run against `base` on its own, without sharing derivations.
    pub fn run(&self, base: &Table) -> Result<String> {
        self.run_with(base, &DerivationCache::default())
    }

    fn run_with(&self, base: &Table, cache: &DerivationCache) -> Result<String> {
        let derived = cache.derived(base, &self.derive)?;
        let result = query::run(&derived, &self.query)?;
        render(&result, &self.render)
    }
}

/// The outcome of one pipeline inside [`Runner::run_all`].
#[derive(Debug)]
pub struct PipelineOutcome {
    pub name: String,
    pub output: Result<String>,
}

/// Registry of pipelines that all run over the same base table.
#[derive(Debug, Default)]
pub struct Runner {
    pipelines: Vec<Pipeline>,
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pipeline. Names are unique; a clash is reported as
    /// [`AnalysisError::InvalidQuery`], which also covers runner misconfiguration.
    pub fn register(&mut self, pipeline: Pipeline) -> Result<()> {
        if self.pipelines.iter().any(|p| p.name == pipeline.name) {
            return Err(AnalysisError::InvalidQuery(format!(
                "cannot register pipeline `{}`: a pipeline with that name is already registered",
                pipeline.name
            )));
        }
        if let Ok(json) = serde_json::to_string(&pipeline) {
            debug!(pipeline = %pipeline.name, definition = %json, "registered pipeline");
        }
        self.pipelines.push(pipeline);
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.pipelines.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    /// Run one registered pipeline by name.
    pub fn run(&self, name: &str, base: &Table) -> Result<String> {
        self.pipelines
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| AnalysisError::InvalidQuery(format!("no pipeline named `{}`", name)))?
            .run(base)
    }

    /// Run every pipeline in registration order. A failing pipeline is
    /// reported in its outcome and does not stop the others.
    pub fn run_all(&self, base: &Table) -> Vec<PipelineOutcome> {
        let cache = DerivationCache::default();
        self.pipelines
            .iter()
            .map(|p| execute(p, base, &cache))
            .collect()
    }

    /// Like [`run_all`](Self::run_all) but spread over the rayon pool.
    /// Outcomes keep registration order.
    pub fn run_all_parallel(&self, base: &Table) -> Vec<PipelineOutcome> {
        let cache = DerivationCache::default();
        self.pipelines
            .par_iter()
            .map(|p| execute(p, base, &cache))
            .collect()
    }
}

fn execute(pipeline: &Pipeline, base: &Table, cache: &DerivationCache) -> PipelineOutcome {
    let start = Instant::now();
    let output = pipeline.run_with(base, cache);
    match &output {
        Ok(_) => info!(pipeline = %pipeline.name, elapsed = ?start.elapsed(), "pipeline finished"),
        Err(e) => error!(pipeline = %pipeline.name, "pipeline failed: {}", e),
    }
    PipelineOutcome {
        name: pipeline.name.clone(),
        output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Aggregate, Predicate, SortOrder};
    use crate::table::{load_from_reader, ColumnType};

    const NETFLIX: &str = "show_id,type,title,rating,duration
s1,Movie,Dick Johnson Is Dead,PG-13,90 min
s2,TV Show,Blood & Water,TV-MA,2 Seasons
s3,TV Show,Ganglands,TV-MA,1 Season
s4,Movie,Sankofa,TV-MA,125 min
s5,Movie,The Starling,PG-13,104 min
";

    fn base() -> Table {
        load_from_reader(NETFLIX.as_bytes(), "netflix").unwrap()
    }

    fn minutes() -> Pipeline {
        Pipeline::new(
            "movie minutes",
            Query::new("movie minutes")
                .filter(Predicate::equals("unit", "min"))
                .aggregate(Aggregate::mean("minutes")),
            RenderMode::Text,
        )
        .derive(ColumnSpec::regex_extract("amount", "duration", r"^(\d+)"))
        .derive(ColumnSpec::regex_extract("unit", "duration", r"(min|Seasons?)$"))
        .derive(ColumnSpec::cast("minutes", "amount", ColumnType::Int64))
    }

    fn ratings() -> Pipeline {
        Pipeline::new(
            "ratings",
            Query::new("ratings")
                .group_by(["rating"])
                .aggregate(Aggregate::Count)
                .sort_by("count", SortOrder::Desc),
            RenderMode::bar("count"),
        )
    }

    fn broken() -> Pipeline {
        Pipeline::new(
            "broken",
            Query::new("broken").group_by(["director"]).aggregate(Aggregate::Count),
            RenderMode::Text,
        )
    }

    #[test]
    fn run_all_isolates_failures() {
        let mut runner = Runner::new();
        runner.register(minutes()).unwrap();
        runner.register(broken()).unwrap();
        runner.register(ratings()).unwrap();

        let outcomes = runner.run_all(&base());
        assert_eq!(
            outcomes.iter().map(|o| o.name.as_str()).collect::<Vec<_>>(),
            vec!["movie minutes", "broken", "ratings"]
        );
        assert!(outcomes[0].output.as_ref().unwrap().contains("106.33"));
        assert!(matches!(
            outcomes[1].output,
            Err(AnalysisError::InvalidQuery(_))
        ));
        assert!(outcomes[2].output.as_ref().unwrap().starts_with("TV-MA"));
    }

    #[test]
    fn running_twice_is_byte_identical() {
        let mut runner = Runner::new();
        runner.register(minutes()).unwrap();
        runner.register(ratings()).unwrap();
        let t = base();
        let first: Vec<String> = runner
            .run_all(&t)
            .into_iter()
            .map(|o| o.output.unwrap())
            .collect();
        let second: Vec<String> = runner
            .run_all(&t)
            .into_iter()
            .map(|o| o.output.unwrap())
            .collect();
        assert_eq!(first, second);
        assert_eq!(runner.run("ratings", &t).unwrap(), first[1]);
    }

    #[test]
    fn parallel_run_matches_sequential() {
        let mut runner = Runner::new();
        runner.register(minutes()).unwrap();
        runner.register(ratings()).unwrap();
        runner.register(broken()).unwrap();
        let t = base();
        let seq: Vec<Option<String>> = runner.run_all(&t).into_iter().map(|o| o.output.ok()).collect();
        let par: Vec<Option<String>> = runner
            .run_all_parallel(&t)
            .into_iter()
            .map(|o| o.output.ok())
            .collect();
        assert_eq!(seq, par);
    }

    #[test]
    fn base_table_is_never_modified() {
        let t = base();
        let before = t.column_names();
        minutes().run(&t).unwrap();
        assert_eq!(t.column_names(), before);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut runner = Runner::new();
        runner.register(ratings()).unwrap();
        match runner.register(ratings()) {
            Err(AnalysisError::InvalidQuery(msg)) => assert!(msg.contains("cannot register")),
            other => panic!("expected a registration error, got {:?}", other),
        }
        assert_eq!(runner.len(), 1);
        assert!(runner.run("nope", &base()).is_err());
    }
}
