//! The read strategies being compared.
//!
//! Each [`Backend`] hands out the file one chunk at a time through [`Backend::next_chunk`].
//! A chunk borrows the backend, so only one is ever in flight; it is released when dropped.
//! After a pass has been drained, [`Backend::reset_to_start`] prepares the next one.
//! Closing is `Drop`.

use std::ops::Deref;

use dfs_client::ReadStatistics;
use tracing::debug;

use crate::{config::BackendKind, reduce, Error};

mod local_map;
mod standard;
mod zero_copy;

pub use local_map::LocalMap;
pub use standard::StandardRead;
pub use zero_copy::{ZeroCopy, ZeroCopyChunk};

pub trait Backend {
    type Chunk<'a>: Deref<Target = [f64]>
    where
        Self: 'a;

    fn kind(&self) -> BackendKind;

    /// Length of the file, in bytes.
    fn file_len(&self) -> u64;

    /// The next chunk of the current pass, or `None` once the pass has covered the file.
    fn next_chunk(&mut self) -> Result<Option<Self::Chunk<'_>>, Error>;

    fn reset_to_start(&mut self) -> Result<(), Error>;

    fn read_statistics(&self) -> ReadStatistics;
}

/// Drain one pass of `backend` through the reducer.
#[tracing::instrument(skip_all, level = "debug", fields(backend = %backend.kind()))]
pub fn sum_pass<B: Backend>(backend: &mut B) -> Result<f64, Error> {
    let mut sum = 0.0;
    let mut chunks = 0u64;
    while let Some(chunk) = backend.next_chunk()? {
        sum += reduce::sum(&chunk);
        chunks += 1;
    }
    debug!(chunks, "pass drained");
    Ok(sum)
}
