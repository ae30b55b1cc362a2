//! An in-memory [`FileSystem`] whose misbehaviour is scripted per test thread.

use std::{cell::RefCell, io, num::NonZeroU32, ops::Deref};

use dfs_client::{DfsFile, FileSystem, ReadStatistics, ZeroCopyOptions};

use crate::{
    chunk::VECSUM_CHUNK_SIZE,
    config::{BackendKind, Config},
};

pub(crate) const SCRIPTED_PATH: &str = "/scripted/data";
pub(crate) const UNREACHABLE_ADDRESS: &str = "unreachable:8020";

/// File contents are the doubles `0.0, 1.0, .., 15.0` repeated.
#[derive(Debug, Clone)]
pub(crate) struct Script {
    /// Logical length in bytes.
    pub len: u64,
    /// Reported by `path_size` instead of `len`.
    pub len_override: Option<u64>,
    /// The file really ends here, regardless of what `path_size` says.
    pub truncate_to: Option<u64>,
    /// Upper bound on the bytes a single `read` returns.
    pub max_read: usize,
    /// Every n-th `read` call fails with `Interrupted`.
    pub interrupt_every: Option<u32>,
    /// Reads starting at or after this offset fail.
    pub fail_read_at: Option<u64>,
    /// `read` calls after the first n fail.
    pub fail_after_reads: Option<u32>,
    /// The first zero-copy read returns only this many bytes.
    pub short_zero_copy: Option<usize>,
}

impl Script {
    pub fn chunks(n: u64) -> Self {
        Script {
            len: n * VECSUM_CHUNK_SIZE as u64,
            len_override: None,
            truncate_to: None,
            max_read: usize::MAX,
            interrupt_every: None,
            fail_read_at: None,
            fail_after_reads: None,
            short_zero_copy: None,
        }
    }

    /// Sum of one full pass.
    pub fn expected_sum(&self) -> f64 {
        let doubles = self.len / 8;
        (doubles / 16 * (0..16).sum::<u64>()) as f64
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Counters {
    pub connects: u32,
    pub opens: u32,
    pub reads: u32,
    pub interrupts: u32,
    pub zero_copy_reads: u32,
    pub releases: u32,
}

thread_local! {
    static STATE: RefCell<(Script, Counters)> = RefCell::new((Script::chunks(1), Counters::default()));
}

pub(crate) fn install(script: Script) {
    STATE.with(|s| *s.borrow_mut() = (script, Counters::default()));
}

pub(crate) fn counters() -> Counters {
    STATE.with(|s| s.borrow().1)
}

fn script() -> Script {
    STATE.with(|s| s.borrow().0.clone())
}

fn count(f: impl FnOnce(&mut Counters)) {
    STATE.with(|s| f(&mut s.borrow_mut().1));
}

pub(crate) fn config(backend: BackendKind) -> Config {
    Config {
        path: SCRIPTED_PATH.to_owned(),
        passes: NonZeroU32::new(2).unwrap(),
        backend,
        rpc_address: "default".to_owned(),
    }
}

pub(crate) struct ScriptedFileSystem;

impl FileSystem for ScriptedFileSystem {
    type File = ScriptedFile;

    fn connect(address: &str) -> io::Result<Self> {
        count(|c| c.connects += 1);
        if address == UNREACHABLE_ADDRESS {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, address));
        }
        Ok(ScriptedFileSystem)
    }

    fn path_size(&self, path: &str) -> io::Result<u64> {
        if path != SCRIPTED_PATH {
            return Err(io::Error::new(io::ErrorKind::NotFound, path));
        }
        let script = script();
        Ok(script.len_override.unwrap_or(script.len))
    }

    fn open_read(&self, path: &str) -> io::Result<ScriptedFile> {
        if path != SCRIPTED_PATH {
            return Err(io::Error::new(io::ErrorKind::NotFound, path));
        }
        count(|c| c.opens += 1);
        let script = script();
        let real_len = script.truncate_to.unwrap_or(script.len);
        let data = (0..real_len / 8).map(|i| (i % 16) as f64).collect();
        Ok(ScriptedFile {
            script,
            data,
            pos: 0,
            read_calls: 0,
            zero_copy_calls: 0,
            stats: ReadStatistics::default(),
        })
    }
}

pub(crate) struct ScriptedFile {
    script: Script,
    data: Vec<f64>,
    pos: usize,
    read_calls: u32,
    zero_copy_calls: u32,
    stats: ReadStatistics,
}

impl ScriptedFile {
    fn bytes(&self) -> &[u8] {
        unsafe { self.data.align_to::<u8>().1 }
    }

    fn remaining(&self) -> usize {
        self.bytes().len() - self.pos
    }
}

impl DfsFile for ScriptedFile {
    type ZeroCopyBuf<'a> = ScriptedBuf<'a>;

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        count(|c| c.reads += 1);
        self.read_calls += 1;
        if let Some(every) = self.script.interrupt_every {
            if self.read_calls % every == 0 {
                count(|c| c.interrupts += 1);
                return Err(io::ErrorKind::Interrupted.into());
            }
        }
        let past_offset = matches!(self.script.fail_read_at, Some(at) if self.pos as u64 >= at);
        let past_count = matches!(self.script.fail_after_reads, Some(n) if self.read_calls > n);
        if past_offset || past_count {
            return Err(io::Error::new(io::ErrorKind::Other, "injected read failure"));
        }
        let n = buf.len().min(self.script.max_read).min(self.remaining());
        buf[..n].copy_from_slice(&self.bytes()[self.pos..self.pos + n]);
        self.pos += n;
        self.stats.total_bytes_read += n as u64;
        Ok(n)
    }

    fn read_zero_copy(
        &mut self,
        options: &ZeroCopyOptions,
        max_len: usize,
    ) -> io::Result<Option<ScriptedBuf<'_>>> {
        count(|c| c.zero_copy_reads += 1);
        self.zero_copy_calls += 1;
        if !options.skip_checksums() {
            return Err(io::ErrorKind::Unsupported.into());
        }
        let mut n = max_len.min(self.remaining());
        if n == 0 {
            return Ok(None);
        }
        if let (1, Some(short)) = (self.zero_copy_calls, self.script.short_zero_copy) {
            n = n.min(short);
        }
        let start = self.pos;
        self.pos += n;
        self.stats.total_bytes_read += n as u64;
        self.stats.total_zero_copy_bytes_read += n as u64;
        Ok(Some(ScriptedBuf {
            bytes: &self.bytes()[start..start + n],
        }))
    }

    fn seek(&mut self, offset: u64) -> io::Result<()> {
        self.pos = usize::try_from(offset)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        Ok(())
    }

    fn read_statistics(&self) -> ReadStatistics {
        self.stats
    }
}

pub(crate) struct ScriptedBuf<'a> {
    bytes: &'a [u8],
}

impl Deref for ScriptedBuf<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.bytes
    }
}

impl Drop for ScriptedBuf<'_> {
    fn drop(&mut self) {
        count(|c| c.releases += 1);
    }
}
