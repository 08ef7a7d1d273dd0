//! Ready-made pipelines for the two bundled datasets.

pub mod cwur;
pub mod netflix;

use crate::error::Result;
use crate::pipeline::{Pipeline, Runner};

/// A runner holding every pipeline in `pipelines`.
pub fn runner_for(pipelines: Vec<Pipeline>) -> Result<Runner> {
    let mut runner = Runner::new();
    for p in pipelines {
        runner.register(p)?;
    }
    Ok(runner)
}
