use std::ops::Deref;

use dfs_client::{DfsFile, FileSystem, ReadStatistics, ZeroCopyOptions};

use crate::{
    backend::Backend,
    chunk::{self, ZCR_READ_CHUNK_SIZE},
    config::{BackendKind, Config},
    session::Session,
    Error,
};

/// Zero-copy reads of [`ZCR_READ_CHUNK_SIZE`] bytes, with checksum verification skipped and
/// no fallback buffer pool, so every chunk is a view into memory owned by the file.
pub struct ZeroCopy<F: FileSystem> {
    session: Session<F>,
    options: ZeroCopyOptions,
}

impl<F: FileSystem> ZeroCopy<F> {
    pub fn open(config: &Config) -> Result<Self, Error> {
        let session = Session::open(config)?;
        let mut options = ZeroCopyOptions::new();
        options.set_skip_checksums(true).set_buffer_pool(None);
        Ok(Self { session, options })
    }
}

/// A zero-copy buffer viewed as doubles. Released back to the file when dropped.
pub struct ZeroCopyChunk<'a, D: DfsFile + 'a> {
    buf: D::ZeroCopyBuf<'a>,
}

impl<'a, D: DfsFile + 'a> Deref for ZeroCopyChunk<'a, D> {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        // Alignment and length were checked in `next_chunk`.
        chunk::as_doubles(&self.buf).unwrap_or_default()
    }
}

impl<F: FileSystem> Backend for ZeroCopy<F> {
    type Chunk<'a> = ZeroCopyChunk<'a, F::File> where Self: 'a;

    fn kind(&self) -> BackendKind {
        BackendKind::ZeroCopy
    }

    fn file_len(&self) -> u64 {
        self.session.len
    }

    fn next_chunk(&mut self) -> Result<Option<ZeroCopyChunk<'_, F::File>>, Error> {
        let path = &self.session.path;
        let buf = match self
            .session
            .file
            .read_zero_copy(&self.options, ZCR_READ_CHUNK_SIZE)
        {
            Ok(Some(buf)) => buf,
            Ok(None) => return Ok(None),
            Err(e) => return Err(Error::io("read_zero_copy", path, e)),
        };
        if buf.len() < ZCR_READ_CHUNK_SIZE {
            return Err(Error::partial_read("read_zero_copy", path, buf.len()));
        }
        if chunk::as_doubles(&buf).is_none() {
            return Err(Error::Alignment(format!(
                "zero-copy buffer for {path} is not aligned for f64"
            )));
        }
        Ok(Some(ZeroCopyChunk { buf }))
    }

    fn reset_to_start(&mut self) -> Result<(), Error> {
        self.session.rewind()
    }

    fn read_statistics(&self) -> ReadStatistics {
        self.session.file.read_statistics()
    }
}
