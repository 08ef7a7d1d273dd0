//! University rankings (`cwurData.csv`).
//!
//! Columns used: `world_rank`, `institution`, `country`, `score`, `year`.

use crate::pipeline::Pipeline;
use crate::present::RenderMode;
use crate::query::{Aggregate, CompareOp, Predicate, Query, SortOrder};

/// Countries compared in the per-year heatmap.
pub const HEATMAP_COUNTRIES: &[&str] = &["USA", "United Kingdom", "Japan", "Germany", "France"];

pub fn pipelines(year: i64, top_rank: i64) -> Vec<Pipeline> {
    vec![
        Pipeline::new(
            "top countries",
            Query::new("top countries")
                .filter(Predicate::equals("year", year))
                .filter(Predicate::compare("world_rank", CompareOp::Le, top_rank))
                .group_by(["country"])
                .aggregate(Aggregate::Count)
                .sort_by("count", SortOrder::Desc),
            RenderMode::Text,
        ),
        Pipeline::new(
            "mean score by country",
            Query::new("mean score by country")
                .filter(Predicate::equals("year", year))
                .group_by(["country"])
                .aggregate(Aggregate::Count)
                .aggregate(Aggregate::mean("score"))
                .aggregate(Aggregate::top_n("institution", 1))
                .sort_by("mean_score", SortOrder::Desc)
                .limit(15),
            RenderMode::Text,
        ),
        Pipeline::new(
            "score distribution",
            Query::new("score distribution")
                .filter(Predicate::equals("year", year))
                .group_by(["score"])
                .aggregate(Aggregate::Count),
            RenderMode::weighted_histogram("score", 10, "count"),
        ),
        Pipeline::new(
            "top ranked per year",
            Query::new("top ranked per year")
                .filter(Predicate::compare("world_rank", CompareOp::Le, top_rank))
                .filter(Predicate::is_in("country", HEATMAP_COUNTRIES.iter().copied()))
                .group_by(["country", "year"])
                .aggregate(Aggregate::Count),
            RenderMode::heatmap("count"),
        ),
    ]
}
