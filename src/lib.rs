//! Typed, in-memory analysis pipelines over delimited files.
//!
//! A [`Table`] is loaded once from a CSV file, extended with derived columns
//! ([`derive`]), queried into a [`ResultTable`] ([`query`]) and rendered as
//! text or a text chart ([`present`]). [`Runner`] ties these steps together
//! into named pipelines.

pub mod analyses;
pub mod derive;
pub mod error;
pub mod pipeline;
pub mod present;
pub mod query;
pub mod table;

pub use derive::{derive, ColumnSpec, MissingPolicy, Rule};
pub use error::{AnalysisError, Result};
pub use pipeline::{Pipeline, PipelineOutcome, Runner};
pub use present::{present, render, RenderMode};
pub use query::{percentage, run, Aggregate, Predicate, Query, ResultTable, SortOrder};
pub use table::{load, ColumnType, Table, Value};
