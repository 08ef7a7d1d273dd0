//! Netflix catalogue (`netflix_titles.csv`).
//!
//! Columns used: `type`, `director`, `country`, `date_added`,
//! `release_year`, `rating`, `duration`, `description`.

use crate::derive::ColumnSpec;
use crate::pipeline::Pipeline;
use crate::present::RenderMode;
use crate::query::{Aggregate, Predicate, Query, SortOrder};
use crate::table::ColumnType;

/// Content ratings; anything else in the rating column is a data-entry slip.
pub const VALID_RATINGS: &[&str] = &[
    "TV-MA", "TV-14", "TV-PG", "R", "PG-13", "TV-Y7", "TV-Y", "PG", "TV-G", "NR", "G",
    "TV-Y7-FV", "NC-17", "UR",
];

/// Whole-word, case-insensitive.
pub const VIOLENCE_PATTERN: &str = r"(?i)\b(kill|violence)\b";

fn duration_amount() -> ColumnSpec {
    ColumnSpec::regex_extract("duration_amount", "duration", r"^(\d+)")
}

fn duration_unit() -> ColumnSpec {
    ColumnSpec::regex_extract("duration_unit", "duration", r"(min|Seasons?)$")
}

fn first_country() -> ColumnSpec {
    ColumnSpec::regex_extract("first_country", "country", r"^\s*([^,]*[^,\s])")
}

pub fn pipelines(top_n: usize) -> Vec<Pipeline> {
    vec![
        Pipeline::new(
            "type share",
            Query::new("type share")
                .group_by(["type"])
                .aggregate(Aggregate::Count)
                .aggregate(Aggregate::Percentage)
                .sort_by("count", SortOrder::Desc),
            RenderMode::Text,
        ),
        Pipeline::new(
            "most common rating",
            Query::new("most common rating")
                .filter(Predicate::is_in("rating", VALID_RATINGS.iter().copied()))
                .group_by(["rating"])
                .aggregate(Aggregate::Count)
                .sort_by("count", SortOrder::Desc),
            RenderMode::bar("count"),
        ),
        Pipeline::new(
            "top movie countries",
            Query::new("top movie countries")
                .filter(Predicate::equals("type", "Movie"))
                .group_by(["first_country"])
                .aggregate(Aggregate::Count)
                .sort_by("count", SortOrder::Desc)
                .limit(top_n),
            RenderMode::bar("count"),
        )
        .derive(first_country()),
        Pipeline::new(
            "movie durations",
            Query::new("movie durations")
                .filter(Predicate::equals("type", "Movie"))
                .filter(Predicate::equals("duration_unit", "min"))
                .group_by(["minutes"])
                .aggregate(Aggregate::Count),
            RenderMode::weighted_histogram("minutes", 10, "count"),
        )
        .derive(duration_amount())
        .derive(duration_unit())
        .derive(ColumnSpec::cast("minutes", "duration_amount", ColumnType::Int64)),
        Pipeline::new(
            "seasons per show",
            Query::new("seasons per show")
                .filter(Predicate::equals("type", "TV Show"))
                .filter(Predicate::matches("duration_unit", "^Seasons?$"))
                .group_by(["seasons"])
                .aggregate(Aggregate::Count)
                .sort_by("seasons", SortOrder::Asc),
            RenderMode::bar("count"),
        )
        .derive(duration_amount())
        .derive(duration_unit())
        .derive(ColumnSpec::cast("seasons", "duration_amount", ColumnType::Int64)),
        Pipeline::new(
            "top directors",
            Query::new("top directors")
                .filter(Predicate::not_null("director"))
                .group_by(["director"])
                .aggregate(Aggregate::Count)
                .sort_by("count", SortOrder::Desc)
                .limit(top_n),
            RenderMode::Text,
        ),
        Pipeline::new(
            "release to catalogue delay",
            Query::new("release to catalogue delay")
                .group_by(["type"])
                .aggregate(Aggregate::mean("delay_years"))
                .aggregate(Aggregate::max("delay_years"))
                .sort_by("mean_delay_years", SortOrder::Desc),
            RenderMode::Text,
        )
        .derive(ColumnSpec::date_parse("added", "date_added"))
        .derive(ColumnSpec::years_between("delay_years", "release_year", "added")),
        Pipeline::new(
            "violent titles",
            Query::new("violent titles")
                .filter(Predicate::matches("description", VIOLENCE_PATTERN))
                .group_by(["type"])
                .aggregate(Aggregate::Count)
                .sort_by("count", SortOrder::Desc),
            RenderMode::Text,
        ),
        Pipeline::new(
            "ratings by type",
            Query::new("ratings by type")
                .filter(Predicate::is_in("rating", VALID_RATINGS.iter().copied()))
                .group_by(["type", "rating"])
                .aggregate(Aggregate::Count),
            RenderMode::heatmap("count"),
        ),
    ]
}
