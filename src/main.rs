// Runs every `[[sheet]]` of a job file through the `sprite_forge` library.
//
// Usage: sprite_forge <job.toml>
//
// Paths inside the job file resolve relative to the job file's directory.
// The first failing sheet stops the run with a non-zero exit.

use anyhow::{Context, bail};
use sprite_forge::job::{load_job_file, run_job};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let Some(job_path) = std::env::args_os().nth(1).map(PathBuf::from) else {
        bail!("usage: sprite_forge <job.toml>");
    };
    let base_dir = job_path.parent().map(PathBuf::from).unwrap_or_default();

    let jobs = load_job_file(&job_path).with_context(|| format!("loading {}", job_path.display()))?;
    tracing::info!(path = %job_path.display(), sheets = jobs.sheets.len(), "job file loaded");

    for sheet in &jobs.sheets {
        let summary = run_job(sheet, &base_dir)
            .await
            .with_context(|| format!("sheet job '{}' failed", sheet.name))?;
        for output in &summary.outputs {
            println!("{}: wrote {}", summary.name, output.display());
        }
    }

    tracing::info!("all sheet jobs complete");
    Ok(())
}
