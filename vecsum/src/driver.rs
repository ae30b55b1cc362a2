//! One benchmark run, from configuration to report.
//!
//! The order of events is fixed:
//!
//! 1. The built-in chunk sizes are validated, before anything else happens.
//! 2. The configuration is resolved.
//! 3. Remote backends connect and open the file ([`crate::session::Session`]).
//! 4. The stopwatch starts. The local backend maps its file only now, so mapping is timed.
//! 5. Every pass drains the backend through the reducer and prints its sum.
//! 6. Only if all passes succeeded, the stopwatch is stopped and the summary printed.
//!
//! Whatever happens, the backend (and with it session, file, buffers, mapping) is dropped
//! exactly once on the way out.

use std::io::Write;

use dfs_client::{FileSystem, ReadStatistics};
use tracing::{error, info};

use crate::{
    backend::{sum_pass, Backend, LocalMap, StandardRead, ZeroCopy},
    chunk,
    config::{BackendKind, Config},
    stopwatch::{self, Clock, Measurement, Stopwatch},
    Error,
};

/// What a successful run produced.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunReport {
    pub config: Config,
    pub file_len: u64,
    pub pass_sums: Vec<f64>,
    pub total_bytes: u64,
    /// `None` if the clock failed when stopping; the run still counts as a success.
    pub measurement: Option<Measurement>,
    pub read_statistics: ReadStatistics,
}

/// Validate, configure from `lookup` and run, writing one line per pass and the summary to `out`.
pub fn execute<F, L>(lookup: L, out: &mut dyn Write) -> Result<RunReport, Error>
where
    F: FileSystem,
    L: Fn(&str) -> Option<String>,
{
    chunk::validate_chunk_sizes()?;
    let config = Config::from_lookup(lookup)?;
    run::<F>(&config, out)
}

/// Run the benchmark described by `config`, reading remote backends through `F`.
pub fn run<F: FileSystem>(config: &Config, out: &mut dyn Write) -> Result<RunReport, Error> {
    run_with_clock::<F>(config, out, stopwatch::monotonic)
}

pub(crate) fn run_with_clock<F: FileSystem>(
    config: &Config,
    out: &mut dyn Write,
    clock: Clock,
) -> Result<RunReport, Error> {
    info!(
        path = %config.path,
        passes = config.passes.get(),
        backend = %config.backend,
        "starting"
    );
    let res = match config.backend {
        BackendKind::StandardRead => StandardRead::<F>::open(config).and_then(|backend| {
            let watch = Stopwatch::start_with(clock)?;
            run_passes(config, backend, watch, out)
        }),
        BackendKind::ZeroCopy => ZeroCopy::<F>::open(config).and_then(|backend| {
            let watch = Stopwatch::start_with(clock)?;
            run_passes(config, backend, watch, out)
        }),
        BackendKind::LocalMap => Stopwatch::start_with(clock).and_then(|watch| {
            let backend = LocalMap::open(&config.path)?;
            run_passes(config, backend, watch, out)
        }),
    };
    if let Err(e) = &res {
        error!("vecsum failed: {e}");
    }
    res
}

fn run_passes<B: Backend>(
    config: &Config,
    mut backend: B,
    watch: Stopwatch,
    out: &mut dyn Write,
) -> Result<RunReport, Error> {
    let kind = backend.kind();
    let passes = config.passes.get();
    let file_len = backend.file_len();
    let total_bytes = file_len.checked_mul(u64::from(passes)).ok_or_else(|| {
        Error::Config(format!(
            "{passes} passes over {file_len} bytes overflow the total byte count"
        ))
    })?;
    let mut pass_sums = Vec::new();
    for pass in 0..passes {
        let sum = sum_pass(&mut backend).map_err(|e| {
            error!(pass, "pass failed");
            e
        })?;
        writeln!(out, "finished {kind} pass {pass}.  sum = {sum:e}")
            .map_err(|e| Error::io("write", "output", e))?;
        info!(pass, sum, "finished pass");
        pass_sums.push(sum);
        backend.reset_to_start()?;
    }

    let measurement = watch.stop(total_bytes);
    if let Some(m) = &measurement {
        writeln!(out, "stopwatch: {m}").map_err(|e| Error::io("write", "output", e))?;
    }
    let read_statistics = backend.read_statistics();
    info!(
        total_bytes_read = read_statistics.total_bytes_read,
        local_bytes_read = read_statistics.total_local_bytes_read,
        short_circuit_bytes_read = read_statistics.total_short_circuit_bytes_read,
        zero_copy_bytes_read = read_statistics.total_zero_copy_bytes_read,
        "read statistics"
    );
    Ok(RunReport {
        config: config.clone(),
        file_len,
        pass_sums,
        total_bytes,
        measurement,
        read_statistics,
    })
}
