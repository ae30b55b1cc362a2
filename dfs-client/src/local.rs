//! [`FileSystem`] backed by the local filesystem.
//!
//! Zero-copy reads are served from a read-only mapping of the whole file that the
//! [`LocalFile`] creates on first use and owns until it is closed.

use std::{
    fs::File,
    io,
    ops::Deref,
    os::unix::fs::FileExt,
    path::PathBuf,
};

use memmap2::Mmap;
use tracing::{debug, trace};

use crate::{BufferPool, DfsFile, FileSystem, ReadStatistics, ZeroCopyOptions};

/// Addresses that resolve paths as given.
const DEFAULT_ADDRESSES: [&str; 2] = ["default", "local"];
const FILE_SCHEME: &str = "file://";

#[derive(Debug)]
pub struct LocalFileSystem {
    root: Option<PathBuf>,
}

impl LocalFileSystem {
    fn resolve(&self, path: &str) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path),
            None => PathBuf::from(path),
        }
    }
}

impl FileSystem for LocalFileSystem {
    type File = LocalFile;

    fn connect(address: &str) -> io::Result<Self> {
        let root = if DEFAULT_ADDRESSES
            .iter()
            .any(|a| a.eq_ignore_ascii_case(address))
        {
            None
        } else if let Some(root) = address.strip_prefix(FILE_SCHEME) {
            if root.is_empty() {
                None
            } else {
                let root = PathBuf::from(root);
                if !root.is_dir() {
                    return Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("root directory {root:?} does not exist"),
                    ));
                }
                Some(root)
            }
        } else {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                format!("no local filesystem endpoint at {address:?}"),
            ));
        };
        debug!(address, ?root, "connected");
        Ok(Self { root })
    }

    fn path_size(&self, path: &str) -> io::Result<u64> {
        let md = std::fs::metadata(self.resolve(path))?;
        if !md.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{path} is not a regular file"),
            ));
        }
        Ok(md.len())
    }

    fn open_read(&self, path: &str) -> io::Result<LocalFile> {
        let resolved = self.resolve(path);
        let file = File::open(&resolved)?;
        let len = file.metadata()?.len();
        Ok(LocalFile {
            file,
            path: resolved,
            len,
            pos: 0,
            window: None,
            stats: ReadStatistics::default(),
        })
    }
}

pub struct LocalFile {
    file: File,
    path: PathBuf,
    len: u64,
    pos: u64,
    window: Option<Mmap>,
    stats: ReadStatistics,
}

impl LocalFile {
    fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }
}

impl Drop for LocalFile {
    fn drop(&mut self) {
        trace!(path = ?self.path, mapped = self.window.is_some(), "closing");
    }
}

impl DfsFile for LocalFile {
    type ZeroCopyBuf<'a> = LocalZeroCopyBuf<'a>;

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let want = usize::try_from(self.remaining())
            .unwrap_or(usize::MAX)
            .min(buf.len());
        if want == 0 {
            return Ok(0);
        }
        let n = self.file.read_at(&mut buf[..want], self.pos)?;
        self.pos += n as u64;
        self.stats.total_bytes_read += n as u64;
        self.stats.total_local_bytes_read += n as u64;
        self.stats.total_short_circuit_bytes_read += n as u64;
        Ok(n)
    }

    fn read_zero_copy(
        &mut self,
        options: &ZeroCopyOptions,
        max_len: usize,
    ) -> io::Result<Option<LocalZeroCopyBuf<'_>>> {
        let n = usize::try_from(self.remaining())
            .unwrap_or(usize::MAX)
            .min(max_len);
        if n == 0 {
            return Ok(None);
        }
        let pool = match (options.skip_checksums(), options.buffer_pool()) {
            (true, _) => None,
            (false, Some(pool)) => Some(pool),
            (false, None) => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    "zero-copy read needs checksum verification but no fallback buffer pool is set",
                ))
            }
        };
        let start = usize::try_from(self.pos)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let window = match &mut self.window {
            Some(window) => window,
            slot @ None => {
                // SAFETY: the mapping is read-only and lives no longer than `self`.
                // Concurrent truncation of the underlying file is outside our control,
                // same as for any other mmap user.
                let window = unsafe { Mmap::map(&self.file)? };
                slot.insert(window)
            }
        };
        let bytes = window.get(start..start + n).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "{} shrank to {} bytes since it was opened",
                    self.path.display(),
                    window.len()
                ),
            )
        })?;
        self.pos += n as u64;
        self.stats.total_bytes_read += n as u64;
        self.stats.total_local_bytes_read += n as u64;
        self.stats.total_short_circuit_bytes_read += n as u64;
        let inner = match pool {
            None => {
                self.stats.total_zero_copy_bytes_read += n as u64;
                Inner::Mapped(bytes)
            }
            Some(pool) => {
                let mut copy = pool.get(n);
                copy.copy_from_slice(bytes);
                Inner::Pooled {
                    buf: copy,
                    pool: pool.clone(),
                }
            }
        };
        Ok(Some(LocalZeroCopyBuf { inner }))
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        if offset > self.len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek to {offset} past end of file ({})", self.len),
            ));
        }
        self.pos = offset;
        Ok(())
    }

    fn read_statistics(&self) -> ReadStatistics {
        self.stats
    }
}

/// A view into a [`LocalFile`]'s mapping, or a pooled copy when checksums were not skipped.
pub struct LocalZeroCopyBuf<'a> {
    inner: Inner<'a>,
}

enum Inner<'a> {
    Mapped(&'a [u8]),
    Pooled { buf: Vec<u8>, pool: BufferPool },
}

impl LocalZeroCopyBuf<'_> {
    pub fn is_mapped(&self) -> bool {
        matches!(self.inner, Inner::Mapped(_))
    }
}

impl Deref for LocalZeroCopyBuf<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match &self.inner {
            Inner::Mapped(bytes) => bytes,
            Inner::Pooled { buf, .. } => buf,
        }
    }
}

impl Drop for LocalZeroCopyBuf<'_> {
    fn drop(&mut self) {
        if let Inner::Pooled { buf, pool } = &mut self.inner {
            pool.put(std::mem::take(buf));
        }
    }
}
