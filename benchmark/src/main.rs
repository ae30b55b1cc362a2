use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use dfs_client::local::LocalFileSystem;
use itertools::Itertools;
use tracing::{error, info};
use vecsum::RunReport;

/// Sums a file of native-endian doubles, pass after pass, and reports the read throughput.
///
/// The run is configured through the environment: VECSUM_PATH, VECSUM_PASSES,
/// VECSUM_TYPE (standard, zerocopy, local) and VECSUM_RPC_ADDRESS.
#[derive(serde::Serialize, clap::Parser, Clone)]
struct Args {
    /// Also write the run report as JSON to this path.
    #[clap(long)]
    json_output: Option<PathBuf>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let stdout = std::io::stdout();
    let report = match vecsum::driver::execute::<LocalFileSystem, _>(
        vecsum::config::env_lookup,
        &mut stdout.lock(),
    ) {
        Ok(report) => report,
        // the driver already logged the cause
        Err(_) => return ExitCode::from(1),
    };

    summarize(&report);

    if let Some(outpath) = &args.json_output {
        if let Err(e) = write_json(&args, outpath, &report) {
            error!(path = %outpath.display(), "failed to write json output: {e}");
            return ExitCode::from(1);
        }
        info!(path = %outpath.display(), "wrote json output");
    }
    ExitCode::SUCCESS
}

fn summarize(report: &RunReport) {
    let elapsed = report
        .measurement
        .as_ref()
        .map(|m| humantime::format_duration(m.elapsed).to_string())
        .unwrap_or_else(|| "unknown".to_owned());
    info!(
        backend = %report.config.backend,
        passes = report.pass_sums.len(),
        elapsed = %elapsed,
        "run complete; pass sums: {}",
        report.pass_sums.iter().map(|s| format!("{s:e}")).join(" "),
    );
}

fn write_json(args: &Args, outpath: &Path, report: &RunReport) -> std::io::Result<()> {
    let output = serde_json::json!({
        "args": args,
        "report": report,
    });
    std::fs::write(outpath, serde_json::to_string(&output)?)
}
