//! Chunk sizes and the invariants that let [`crate::reduce::vecsum`] skip tail handling.
//!
//! Every chunk handed to the reducer holds a whole number of `f64`s, and that number is a
//! multiple of [`DOUBLES_PER_LOOP_ITER`]. Files must be an exact multiple of the chunk size
//! of the backend reading them, so no pass ever ends with a short chunk.

use std::mem::size_of;

use crate::Error;

/// Alignment unit for [`crate::backend::LocalMap`] and for remote file lengths.
pub const VECSUM_CHUNK_SIZE: usize = 8 * 1024 * 1024;
/// Bytes requested per [`crate::backend::ZeroCopy`] read.
pub const ZCR_READ_CHUNK_SIZE: usize = 8 * 1024 * 1024;
/// Bytes filled per [`crate::backend::StandardRead`] read.
pub const NORMAL_READ_CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Unroll factor of the reducer.
pub const DOUBLES_PER_LOOP_ITER: usize = 16;

const CHUNK_SIZES: [(usize, &str); 3] = [
    (VECSUM_CHUNK_SIZE, "VECSUM_CHUNK_SIZE"),
    (ZCR_READ_CHUNK_SIZE, "ZCR_READ_CHUNK_SIZE"),
    (NORMAL_READ_CHUNK_SIZE, "NORMAL_READ_CHUNK_SIZE"),
];

pub fn check_chunk_size(byte_size: usize, name: &str) -> Result<(), Error> {
    if byte_size == 0 || byte_size % size_of::<f64>() != 0 {
        return Err(Error::Alignment(format!(
            "{name} ({byte_size}) is not a multiple of sizeof(f64)"
        )));
    }
    if (byte_size / size_of::<f64>()) % DOUBLES_PER_LOOP_ITER != 0 {
        return Err(Error::Alignment(format!(
            "the number of doubles contained in {name} ({byte_size}) is not a multiple of {DOUBLES_PER_LOOP_ITER}"
        )));
    }
    Ok(())
}

/// Check all built-in chunk sizes. Must pass before any I/O is attempted.
pub fn validate_chunk_sizes() -> Result<(), Error> {
    CHUNK_SIZES
        .iter()
        .try_for_each(|(size, name)| check_chunk_size(*size, name))
}

/// Reject file lengths the given chunk size does not evenly divide.
pub fn check_file_len(path: &str, len: u64, chunk_size: usize) -> Result<(), Error> {
    if len == 0 {
        return Err(Error::Alignment(format!("file {path} has size 0")));
    }
    if len % chunk_size as u64 != 0 {
        return Err(Error::Alignment(format!(
            "file {path} has size {len}, which is not aligned with the chunk size of {chunk_size}"
        )));
    }
    Ok(())
}

/// Reinterpret `bytes` as `f64`s. `None` if the start is not 8-byte aligned or the
/// length is not a whole number of `f64`s.
pub fn as_doubles(bytes: &[u8]) -> Option<&[f64]> {
    // SAFETY: every bit pattern is a valid f64.
    let (head, doubles, tail) = unsafe { bytes.align_to::<f64>() };
    if head.is_empty() && tail.is_empty() {
        Some(doubles)
    } else {
        None
    }
}

/// A zeroed buffer of `byte_size` bytes, viewed as `f64`s so that it is suitably aligned.
pub(crate) fn alloc_chunk_buffer(byte_size: usize) -> Result<Vec<f64>, Error> {
    let len = byte_size / size_of::<f64>();
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).map_err(|e| {
        Error::resource(
            format!("read buffer of size {byte_size}"),
            std::io::Error::new(std::io::ErrorKind::OutOfMemory, e),
        )
    })?;
    buf.resize(len, 0.0);
    Ok(buf)
}

/// The bytes backing `buf`, for handing to a byte-oriented read.
pub(crate) fn as_bytes_mut(buf: &mut [f64]) -> &mut [u8] {
    // SAFETY: u8 has no alignment requirement and every byte pattern is a valid f64,
    // so whatever the read writes leaves `buf` valid.
    let (head, bytes, tail) = unsafe { buf.align_to_mut::<u8>() };
    debug_assert!(head.is_empty() && tail.is_empty());
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_chunk_sizes_are_valid() {
        validate_chunk_sizes().unwrap();
        for (size, _) in CHUNK_SIZES {
            assert_eq!(size % 8, 0);
            assert_eq!((size / 8) % 16, 0);
        }
    }

    #[test]
    fn chunk_size_must_hold_whole_doubles() {
        let err = check_chunk_size(12, "BAD").unwrap_err();
        assert!(matches!(err, Error::Alignment(_)));
        assert!(err.to_string().contains("BAD"));
    }

    #[test]
    fn chunk_size_must_hold_whole_loop_iterations() {
        let err = check_chunk_size(15 * 8, "SHORT").unwrap_err();
        assert!(matches!(err, Error::Alignment(_)));
        check_chunk_size(16 * 8, "ONE_ITER").unwrap();
        assert!(check_chunk_size(0, "EMPTY").is_err());
    }

    #[test]
    fn file_len_checks() {
        check_file_len("f", 2 * VECSUM_CHUNK_SIZE as u64, VECSUM_CHUNK_SIZE).unwrap();
        assert!(matches!(
            check_file_len("f", 0, VECSUM_CHUNK_SIZE),
            Err(Error::Alignment(_))
        ));
        assert!(matches!(
            check_file_len("f", VECSUM_CHUNK_SIZE as u64 + 8, VECSUM_CHUNK_SIZE),
            Err(Error::Alignment(_))
        ));
    }

    #[test]
    fn doubles_view() {
        let mut buf = alloc_chunk_buffer(16 * 8).unwrap();
        assert_eq!(buf.len(), 16);
        as_bytes_mut(&mut buf)[..8].copy_from_slice(&2.5f64.to_ne_bytes());
        assert_eq!(buf[0], 2.5);

        let aligned: Vec<f64> = vec![0.0; 4];
        let aligned_bytes = unsafe { aligned.align_to::<u8>().1 };
        assert_eq!(as_doubles(aligned_bytes).unwrap().len(), 4);
        // a view that starts one byte in can never be aligned
        assert!(as_doubles(&aligned_bytes[1..]).is_none());
        // a length that is not a whole number of doubles
        assert!(as_doubles(&aligned_bytes[..7]).is_none());
    }
}
