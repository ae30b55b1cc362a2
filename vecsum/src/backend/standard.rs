use std::io;

use dfs_client::{DfsFile, FileSystem, ReadStatistics};
use tracing::trace;

use crate::{
    backend::Backend,
    chunk::{self, NORMAL_READ_CHUNK_SIZE},
    config::{BackendKind, Config},
    session::Session,
    Error,
};

/// Blocking reads into one reusable buffer of [`NORMAL_READ_CHUNK_SIZE`] bytes.
pub struct StandardRead<F: FileSystem> {
    session: Session<F>,
    buf: Vec<f64>,
}

impl<F: FileSystem> StandardRead<F> {
    pub fn open(config: &Config) -> Result<Self, Error> {
        let session = Session::open(config)?;
        let buf = chunk::alloc_chunk_buffer(NORMAL_READ_CHUNK_SIZE)?;
        Ok(Self { session, buf })
    }
}

/// Read until `buf` is full or the file ends. Interrupted reads are resumed.
fn read_fully<D: DfsFile>(file: &mut D, buf: &mut [u8]) -> io::Result<usize> {
    let mut nread = 0;
    while nread < buf.len() {
        match file.read(&mut buf[nread..]) {
            Ok(0) => break,
            Ok(n) => nread += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                trace!("read interrupted, retrying");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(nread)
}

impl<F: FileSystem> Backend for StandardRead<F> {
    type Chunk<'a> = &'a [f64] where Self: 'a;

    fn kind(&self) -> BackendKind {
        BackendKind::StandardRead
    }

    fn file_len(&self) -> u64 {
        self.session.len
    }

    fn next_chunk(&mut self) -> Result<Option<&[f64]>, Error> {
        let bytes = chunk::as_bytes_mut(&mut self.buf);
        let n = read_fully(&mut self.session.file, bytes)
            .map_err(|e| Error::io("read", &self.session.path, e))?;
        if n == 0 {
            return Ok(None);
        }
        if n < NORMAL_READ_CHUNK_SIZE {
            return Err(Error::partial_read("read", &self.session.path, n));
        }
        Ok(Some(self.buf.as_slice()))
    }

    fn reset_to_start(&mut self) -> Result<(), Error> {
        self.session.rewind()
    }

    fn read_statistics(&self) -> ReadStatistics {
        self.session.file.read_statistics()
    }
}
