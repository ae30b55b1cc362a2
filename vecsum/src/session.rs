use dfs_client::{DfsFile, FileSystem};
use tracing::{debug, info};

use crate::{chunk, config::Config, Error};

/// A connection and one file opened through it, held for the duration of a run.
///
/// Dropping the session closes the file and then disconnects.
pub struct Session<F: FileSystem> {
    // Field order is drop order: the file must be closed before the connection goes away.
    pub(crate) file: F::File,
    _fs: F,
    pub(crate) path: String,
    pub(crate) len: u64,
}

impl<F: FileSystem> Session<F> {
    /// Connect, check that the file length is a non-zero multiple of the chunk size of
    /// `config.backend`, then open it.
    ///
    /// Nothing is read from the file here.
    pub fn open(config: &Config) -> Result<Self, Error> {
        let fs = F::connect(&config.rpc_address)
            .map_err(|e| Error::connect("connect", &config.rpc_address, e))?;
        let len = fs
            .path_size(&config.path)
            .map_err(|e| Error::connect("get_path_info", &config.path, e))?;
        chunk::check_file_len(&config.path, len, config.backend.chunk_size())?;
        let file = fs
            .open_read(&config.path)
            .map_err(|e| Error::connect("open", &config.path, e))?;
        info!(path = %config.path, len, address = %config.rpc_address, "session opened");
        Ok(Session {
            file,
            _fs: fs,
            path: config.path.clone(),
            len,
        })
    }

    pub(crate) fn rewind(&mut self) -> Result<(), Error> {
        self.file
            .seek(0)
            .map_err(|e| Error::io("seek", &self.path, e))
    }
}

impl<F: FileSystem> Drop for Session<F> {
    fn drop(&mut self) {
        debug!(path = %self.path, "closing session");
    }
}
