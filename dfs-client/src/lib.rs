//! The client side of a distributed filesystem, reduced to what a sequential reader needs.
//!
//! A [`FileSystem`] is a live connection to an endpoint. Opening a path yields a [`DfsFile`],
//! which supports two ways of getting at the bytes:
//!
//! 1. [`DfsFile::read`] copies into a caller-owned buffer, like `std::io::Read`.
//! 2. [`DfsFile::read_zero_copy`] hands out a view into memory owned by the file.
//!    The view is a guard that *mutably borrows* the file, so the next request can only be
//!    issued after the previous buffer has been released (dropped).
//!
//! Disconnecting and closing are modeled through `Drop`.
//!
//! [`local::LocalFileSystem`] implements the contract on top of the local filesystem.

use std::{
    io,
    ops::Deref,
    sync::{Arc, Mutex},
};

pub mod local;

/// A connection to a filesystem endpoint.
pub trait FileSystem: Sized {
    type File: DfsFile;

    /// Connect to the endpoint named by `address`.
    fn connect(address: &str) -> io::Result<Self>;

    /// Size of the file at `path`, in bytes.
    fn path_size(&self, path: &str) -> io::Result<u64>;

    /// Open `path` for reading, positioned at offset 0.
    fn open_read(&self, path: &str) -> io::Result<Self::File>;
}

/// A file opened for reading through a [`FileSystem`].
pub trait DfsFile {
    /// A buffer lent out by [`DfsFile::read_zero_copy`]. Dropping it releases it.
    type ZeroCopyBuf<'a>: Deref<Target = [u8]>
    where
        Self: 'a;

    /// Blocking read into `buf` at the current position.
    ///
    /// Returns fewer bytes than requested only at end of file.
    /// May fail with [`io::ErrorKind::Interrupted`], in which case nothing was consumed.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Borrow up to `max_len` bytes at the current position without copying them.
    ///
    /// `Ok(None)` means end of file.
    fn read_zero_copy(
        &mut self,
        options: &ZeroCopyOptions,
        max_len: usize,
    ) -> io::Result<Option<Self::ZeroCopyBuf<'_>>>;

    /// Reposition to the absolute `offset`.
    fn seek(&mut self, offset: u64) -> io::Result<()>;

    fn read_statistics(&self) -> ReadStatistics;
}

/// Counters of bytes handed out by a [`DfsFile`] since it was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ReadStatistics {
    pub total_bytes_read: u64,
    pub total_local_bytes_read: u64,
    /// Bytes served straight from local storage, bypassing the remote data path.
    pub total_short_circuit_bytes_read: u64,
    pub total_zero_copy_bytes_read: u64,
}

/// Knobs for [`DfsFile::read_zero_copy`].
#[derive(Debug, Clone, Default)]
pub struct ZeroCopyOptions {
    skip_checksums: bool,
    buffer_pool: Option<BufferPool>,
}

impl ZeroCopyOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero-copy views cannot be checksum-verified. Unless this is set, a read that would
    /// need verification falls back to copying into the buffer pool, or fails if there is none.
    pub fn set_skip_checksums(&mut self, skip: bool) -> &mut Self {
        self.skip_checksums = skip;
        self
    }

    pub fn set_buffer_pool(&mut self, pool: Option<BufferPool>) -> &mut Self {
        self.buffer_pool = pool;
        self
    }

    pub fn skip_checksums(&self) -> bool {
        self.skip_checksums
    }

    pub fn buffer_pool(&self) -> Option<&BufferPool> {
        self.buffer_pool.as_ref()
    }
}

/// Recycles the buffers used when a zero-copy read has to fall back to copying.
#[derive(Debug, Clone, Default)]
pub struct BufferPool(Arc<Mutex<Vec<Vec<u8>>>>);

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// A zeroed buffer of exactly `len` bytes, reusing a returned one if possible.
    pub fn get(&self, len: usize) -> Vec<u8> {
        let reused = self.0.lock().ok().and_then(|mut bufs| bufs.pop());
        let mut buf = reused.unwrap_or_default();
        buf.clear();
        buf.resize(len, 0);
        buf
    }

    pub fn put(&self, buf: Vec<u8>) {
        if let Ok(mut bufs) = self.0.lock() {
            bufs.push(buf);
        }
    }

    pub fn idle(&self) -> usize {
        self.0.lock().map(|bufs| bufs.len()).unwrap_or(0)
    }
}
