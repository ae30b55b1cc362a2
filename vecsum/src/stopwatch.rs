//! Wall-clock and CPU-time bracketing of a whole run.
//!
//! The stopwatch is read exactly twice, so it adds nothing to the per-chunk path.

use std::{fmt, time::Duration};

use nix::{
    sys::{
        resource::{getrusage, Usage, UsageWho},
        time::{TimeSpec, TimeVal},
    },
    time::{clock_gettime, ClockId},
};
use serde_with::serde_as;
use tracing::warn;

use crate::Error;

const GIB: f64 = (1u64 << 30) as f64;

/// Source of timestamps for a [`Stopwatch`].
pub type Clock = fn() -> nix::Result<TimeSpec>;

pub fn monotonic() -> nix::Result<TimeSpec> {
    clock_gettime(ClockId::CLOCK_MONOTONIC)
}

pub struct Stopwatch {
    clock: Clock,
    start: TimeSpec,
    rusage: Option<Usage>,
}

impl Stopwatch {
    /// Fails if the monotonic clock cannot be read.
    pub fn start() -> Result<Self, Error> {
        Self::start_with(monotonic)
    }

    pub fn start_with(clock: Clock) -> Result<Self, Error> {
        let start = clock()
            .map_err(|errno| Error::resource("clock_gettime(CLOCK_MONOTONIC)", errno.into()))?;
        let rusage = match getrusage(UsageWho::RUSAGE_THREAD) {
            Ok(usage) => Some(usage),
            Err(errno) => {
                warn!("getrusage failed, not reporting cpu time: {errno}");
                None
            }
        };
        Ok(Self {
            clock,
            start,
            rusage,
        })
    }

    /// `None` if the clock could not be read. The run itself is not affected by that.
    pub fn stop(self, total_bytes: u64) -> Option<Measurement> {
        let stop = match (self.clock)() {
            Ok(ts) => ts,
            Err(errno) => {
                warn!("clock_gettime(CLOCK_MONOTONIC) failed, not reporting throughput: {errno}");
                return None;
            }
        };
        let mut m = Measurement::new(timespec_to_duration(stop - self.start), total_bytes);
        if let (Some(pre), Ok(post)) = (self.rusage, getrusage(UsageWho::RUSAGE_THREAD)) {
            m.user_cpu = Some(
                timeval_to_duration(post.user_time())
                    .saturating_sub(timeval_to_duration(pre.user_time())),
            );
            m.system_cpu = Some(
                timeval_to_duration(post.system_time())
                    .saturating_sub(timeval_to_duration(pre.system_time())),
            );
        }
        Some(m)
    }
}

fn timespec_to_duration(ts: TimeSpec) -> Duration {
    let secs = u64::try_from(ts.tv_sec()).unwrap_or(0);
    let nanos = u32::try_from(ts.tv_nsec()).unwrap_or(0);
    Duration::new(secs, nanos)
}

fn timeval_to_duration(tv: TimeVal) -> Duration {
    let secs = u64::try_from(tv.tv_sec()).unwrap_or(0);
    let micros = u64::try_from(tv.tv_usec()).unwrap_or(0);
    Duration::from_secs(secs) + Duration::from_micros(micros)
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Measurement {
    #[serde_as(as = "serde_with::DurationSecondsWithFrac<f64>")]
    pub elapsed: Duration,
    pub total_bytes: u64,
    pub throughput_gib_per_sec: f64,
    #[serde_as(as = "Option<serde_with::DurationSecondsWithFrac<f64>>")]
    pub user_cpu: Option<Duration>,
    #[serde_as(as = "Option<serde_with::DurationSecondsWithFrac<f64>>")]
    pub system_cpu: Option<Duration>,
}

impl Measurement {
    pub fn new(elapsed: Duration, total_bytes: u64) -> Self {
        Self {
            elapsed,
            total_bytes,
            throughput_gib_per_sec: (total_bytes as f64 / elapsed.as_secs_f64()) / GIB,
            user_cpu: None,
            system_cpu: None,
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "took {:.5} seconds to read {} bytes, for {:.5} GiB/s",
            self.elapsed.as_secs_f64(),
            self.total_bytes,
            self.throughput_gib_per_sec,
        )?;
        if let (Some(user), Some(system)) = (self.user_cpu, self.system_cpu) {
            write!(
                f,
                " (cpu: user {:.3}s sys {:.3}s)",
                user.as_secs_f64(),
                system.as_secs_f64()
            )?;
        }
        Ok(())
    }
}
