//! Summation of chunk buffers.
//!
//! A single running sum makes every add wait on the previous one, which caps throughput far
//! below memory bandwidth. [`vecsum`] instead keeps eight independent two-lane accumulators,
//! adds 16 doubles per iteration and combines the accumulators as a tree at the end.
//! The result is therefore not bit-identical to a left-to-right sum except when all
//! intermediate sums are exactly representable.

use crate::chunk::DOUBLES_PER_LOOP_ITER;

const LANES: usize = 2;
const ACCUMULATORS: usize = DOUBLES_PER_LOOP_ITER / LANES;

type Lanes = [f64; LANES];

#[inline(always)]
fn add(a: Lanes, b: Lanes) -> Lanes {
    [a[0] + b[0], a[1] + b[1]]
}

/// Sum `buf` with the configured reduction.
#[inline]
pub fn sum(buf: &[f64]) -> f64 {
    if cfg!(feature = "simple-vecsum") {
        vecsum_simple(buf)
    } else {
        vecsum(buf)
    }
}

/// Wide-accumulator sum. `buf.len()` is expected to be a multiple of [`DOUBLES_PER_LOOP_ITER`];
/// a trailing remainder, if any, is added at the end.
pub fn vecsum(buf: &[f64]) -> f64 {
    let mut sums: [Lanes; ACCUMULATORS] = [[0.0; LANES]; ACCUMULATORS];
    let mut iters = buf.chunks_exact(DOUBLES_PER_LOOP_ITER);
    for x in &mut iters {
        for (i, acc) in sums.iter_mut().enumerate() {
            acc[0] += x[LANES * i];
            acc[1] += x[LANES * i + 1];
        }
    }
    let x0 = add(sums[0], sums[1]);
    let x1 = add(sums[2], sums[3]);
    let x2 = add(sums[4], sums[5]);
    let x3 = add(sums[6], sums[7]);
    let x4 = add(x0, x1);
    let x5 = add(x2, x3);
    let [lo, hi] = add(x4, x5);
    iters.remainder().iter().fold(hi + lo, |acc, v| acc + v)
}

/// Plain left-to-right sum.
pub fn vecsum_simple(buf: &[f64]) -> f64 {
    buf.iter().sum()
}
