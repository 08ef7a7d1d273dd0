use anyhow::Result;
use std::{
    env,
    io::{self, Write},
    path::PathBuf,
};
use tablequery::{
    analyses::{self, cwur, netflix},
    load,
    pipeline::Pipeline,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Year and rank cut-off for the rankings analyses.
const CWUR_YEAR: i64 = 2015;
const CWUR_TOP_RANK: i64 = 100;
/// How many countries / directors the catalogue analyses list.
const NETFLIX_TOP_N: usize = 10;

fn dataset_path(var: &str, default: &str) -> PathBuf {
    env::var_os(var)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn main() -> Result<()> {
    // ─── 1) init logging (stderr; stdout carries the reports) ────────
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tablequery=info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(io::stderr)
        .init();
    info!("startup");

    // ─── 2) configure datasets ───────────────────────────────────────
    let datasets: Vec<(&str, PathBuf, Vec<Pipeline>)> = vec![
        (
            "university rankings",
            dataset_path("CWUR_CSV", "datasets/cwurData.csv"),
            cwur::pipelines(CWUR_YEAR, CWUR_TOP_RANK),
        ),
        (
            "netflix titles",
            dataset_path("NETFLIX_CSV", "datasets/netflix_titles.csv"),
            netflix::pipelines(NETFLIX_TOP_N),
        ),
    ];

    // ─── 3) load each dataset once, run its pipelines ────────────────
    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut failed = 0usize;
    for (label, path, pipelines) in datasets {
        let table = match load(&path) {
            Ok(t) => t,
            Err(e) => {
                error!(dataset = label, "skipping: {}", e);
                failed += pipelines.len();
                continue;
            }
        };
        let runner = analyses::runner_for(pipelines)?;
        info!(dataset = label, pipelines = runner.len(), "running analyses");

        for outcome in runner.run_all(&table) {
            match outcome.output {
                Ok(text) => {
                    writeln!(out, "== {} ==", outcome.name)?;
                    writeln!(out, "{}", text)?;
                }
                Err(e) => {
                    warn!(pipeline = %outcome.name, "no output: {}", e);
                    failed += 1;
                }
            }
        }
    }
    out.flush()?;

    if failed > 0 {
        warn!(failed, "some analyses did not produce output");
    }
    info!("all done");
    Ok(())
}
