//! Chunked host/device transfers
//!
//! A single contiguous copy is used whenever it fits the staging size.
//! Larger copies are split into staging-sized slices; the first failing
//! slice aborts the whole transfer with [`Error::TransferFailure`]. Downloads
//! assemble into scratch memory and only reach the caller's buffer once every
//! slice succeeded, so a failed transfer never leaves a torn result behind.

use crate::error::{Error, Result};
use bytemuck::Zeroable;
use std::ops::Range;

/// Default staging size for one transfer slice (64 MiB)
pub const DEFAULT_STAGING_BYTES: usize = 64 << 20;

/// Transfer knobs held by a device client
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferConfig {
    /// Largest number of bytes moved by one copy call
    pub staging_bytes: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            staging_bytes: DEFAULT_STAGING_BYTES,
        }
    }
}

impl TransferConfig {
    /// Create a config with the given staging size
    pub fn new(staging_bytes: usize) -> Result<Self> {
        if staging_bytes == 0 {
            return Err(Error::invalid_argument(
                "staging_bytes",
                "staging size must be non-zero",
            ));
        }
        Ok(Self { staging_bytes })
    }

    /// Number of `T` elements moved per slice (at least one)
    #[inline]
    pub fn chunk_len<T>(&self) -> usize {
        (self.staging_bytes / size_of::<T>().max(1)).max(1)
    }
}

/// Drive `copy` over `0..len` in staging-sized element ranges
///
/// Stops at the first error and reports how many bytes had completed.
pub fn copy_in_slices<T, F>(config: &TransferConfig, len: usize, mut copy: F) -> Result<()>
where
    F: FnMut(Range<usize>) -> Result<()>,
{
    let elem = size_of::<T>();
    let chunk = config.chunk_len::<T>();
    let total_bytes = len * elem;

    if len > chunk {
        tracing::debug!(
            total_bytes,
            slices = len.div_ceil(chunk),
            staging_bytes = config.staging_bytes,
            "chunked transfer"
        );
    }

    let mut start = 0;
    while start < len {
        let end = (start + chunk).min(len);
        copy(start..end).map_err(|e| Error::TransferFailure {
            completed_bytes: start * elem,
            total_bytes,
            reason: e.to_string(),
        })?;
        start = end;
    }
    Ok(())
}

/// Download into `dst` through a scratch buffer
///
/// `copy(range, scratch)` fills `scratch` (of length `range.len()`) with the
/// source elements in `range`. `dst` is only written when all slices succeed.
pub fn staged_download<T, F>(config: &TransferConfig, dst: &mut [T], mut copy: F) -> Result<()>
where
    T: Copy + Zeroable,
    F: FnMut(Range<usize>, &mut [T]) -> Result<()>,
{
    let mut scratch = vec![T::zeroed(); dst.len()];
    copy_in_slices::<T, _>(config, dst.len(), |range| {
        copy(range.clone(), &mut scratch[range])
    })?;
    dst.copy_from_slice(&scratch);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_slice_when_it_fits() {
        let config = TransferConfig::default();
        let mut calls = Vec::new();
        copy_in_slices::<f64, _>(&config, 1000, |r| {
            calls.push(r);
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, vec![0..1000]);
    }

    #[test]
    fn test_slices_cover_range() {
        let config = TransferConfig::new(16).unwrap();
        let mut calls = Vec::new();
        copy_in_slices::<u32, _>(&config, 10, |r| {
            calls.push(r);
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, vec![0..4, 4..8, 8..10]);
    }

    #[test]
    fn test_failed_slice_leaves_destination_untouched() {
        let config = TransferConfig::new(8).unwrap();
        let source = [1.0f32, 2.0, 3.0, 4.0, 5.0];
        let mut dst = [0.0f32; 5];
        let err = staged_download(&config, &mut dst, |range, out| {
            if range.start >= 4 {
                return Err(Error::Backend("link reset".into()));
            }
            out.copy_from_slice(&source[range]);
            Ok(())
        })
        .unwrap_err();

        match err {
            Error::TransferFailure {
                completed_bytes,
                total_bytes,
                reason,
            } => {
                assert_eq!(completed_bytes, 16);
                assert_eq!(total_bytes, 20);
                assert!(reason.contains("link reset"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(dst, [0.0; 5]);
    }

    #[test]
    fn test_zero_staging_rejected() {
        assert!(TransferConfig::new(0).is_err());
    }
}
