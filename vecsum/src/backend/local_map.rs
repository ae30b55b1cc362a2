use std::fs::File;

use dfs_client::ReadStatistics;
use memmap2::Mmap;
use tracing::{debug, info};

use crate::{
    backend::Backend,
    chunk,
    config::BackendKind,
    Error,
};

/// A read-only mapping of a whole local file, handed out as a single chunk per pass.
///
/// The mapping stays valid for the lifetime of the backend, so starting another pass
/// needs no I/O at all.
pub struct LocalMap {
    path: String,
    map: Mmap,
    exhausted: bool,
    stats: ReadStatistics,
}

impl LocalMap {
    pub fn open(path: &str) -> Result<Self, Error> {
        let file = File::open(path).map_err(|e| Error::connect("open", path, e))?;
        let len = file
            .metadata()
            .map_err(|e| Error::io("fstat", path, e))?
            .len();
        chunk::check_file_len(path, len, BackendKind::LocalMap.chunk_size())?;
        // SAFETY: mapped read-only; the benchmark assumes nobody modifies the file while it runs.
        let map = unsafe { Mmap::map(&file) }
            .map_err(|e| Error::resource(format!("mapping of {path} ({len} bytes)"), e))?;
        // the mapping keeps its own reference to the file
        drop(file);
        info!(path, len, "mapped");
        Ok(Self {
            path: path.to_owned(),
            map,
            exhausted: false,
            stats: ReadStatistics::default(),
        })
    }
}

impl Drop for LocalMap {
    fn drop(&mut self) {
        debug!(path = %self.path, "unmapping");
    }
}

impl Backend for LocalMap {
    type Chunk<'a> = &'a [f64];

    fn kind(&self) -> BackendKind {
        BackendKind::LocalMap
    }

    fn file_len(&self) -> u64 {
        self.map.len() as u64
    }

    fn next_chunk(&mut self) -> Result<Option<&[f64]>, Error> {
        if self.exhausted {
            return Ok(None);
        }
        let doubles = chunk::as_doubles(&self.map).ok_or_else(|| {
            Error::Alignment(format!("mapping of {} is not aligned for f64", self.path))
        })?;
        self.exhausted = true;
        self.stats.total_bytes_read += self.map.len() as u64;
        self.stats.total_local_bytes_read += self.map.len() as u64;
        Ok(Some(doubles))
    }

    fn reset_to_start(&mut self) -> Result<(), Error> {
        self.exhausted = false;
        Ok(())
    }

    fn read_statistics(&self) -> ReadStatistics {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::{backend::sum_pass, chunk::VECSUM_CHUNK_SIZE};

    fn pattern_file(len: usize) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        let block: Vec<u8> = (0..16u32).flat_map(|i| f64::from(i).to_ne_bytes()).collect();
        let contents: Vec<u8> = block.iter().copied().cycle().take(len).collect();
        f.write_all(&contents).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn repeated_passes_reuse_the_mapping() {
        let f = pattern_file(2 * VECSUM_CHUNK_SIZE);
        let mut backend = LocalMap::open(f.path().to_str().unwrap()).unwrap();
        assert_eq!(backend.file_len(), 2 * VECSUM_CHUNK_SIZE as u64);

        let first = sum_pass(&mut backend).unwrap();
        // a drained pass stays drained until reset
        assert!(backend.next_chunk().unwrap().is_none());
        backend.reset_to_start().unwrap();
        let second = sum_pass(&mut backend).unwrap();

        let doubles = 2 * VECSUM_CHUNK_SIZE as u64 / 8;
        assert_eq!(first, (doubles / 16 * 120) as f64);
        assert_eq!(first, second);
        assert_eq!(
            backend.read_statistics().total_local_bytes_read,
            4 * VECSUM_CHUNK_SIZE as u64
        );
    }

    #[test]
    fn misaligned_file_is_rejected() {
        let f = pattern_file(VECSUM_CHUNK_SIZE + 128);
        let path = f.path().to_str().unwrap();
        assert!(matches!(LocalMap::open(path), Err(Error::Alignment(_))));
    }

    #[test]
    fn empty_file_is_rejected() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let path = f.path().to_str().unwrap();
        assert!(matches!(LocalMap::open(path), Err(Error::Alignment(_))));
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            LocalMap::open("/does/not/exist"),
            Err(Error::Connect { op: "open", .. })
        ));
    }
}
