//! Shared logical sample buffer
//!
//! The transfer engine writes whole segments at the offsets the acquisition
//! controller programs; the run controller reads the buffer only after the
//! completion signal has been observed.

use std::sync::{Arc, PoisonError, RwLock};

/// Logical sample buffer filled segment by segment
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    /// Buffer data
    data: Arc<RwLock<Vec<u16>>>,
    /// Logical length `L`
    len: usize,
}

impl SampleBuffer {
    /// Create a zeroed buffer of `len` samples
    pub fn new(len: usize) -> Self {
        Self {
            data: Arc::new(RwLock::new(vec![0; len])),
            len,
        }
    }

    /// Logical length of the buffer
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Write one segment starting at `offset`
    ///
    /// Samples past the end of the logical buffer are dropped and the number
    /// actually written is returned.
    pub fn write_segment(&self, offset: usize, samples: &[u16]) -> usize {
        if offset >= self.len {
            log::warn!(
                "Segment write at offset {} outside {}-sample buffer",
                offset,
                self.len
            );
            return 0;
        }

        let end = (offset + samples.len()).min(self.len);
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        data[offset..end].copy_from_slice(&samples[..end - offset]);
        end - offset
    }

    /// Run `f` over a read-only view of the samples
    pub fn read<R>(&self, f: impl FnOnce(&[u16]) -> R) -> R {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        f(&data)
    }

    /// Copy the current contents out
    pub fn snapshot(&self) -> Vec<u16> {
        self.read(|samples| samples.to_vec())
    }

    /// Zero every sample
    pub fn clear(&self) {
        self.data
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fill(0);
    }
}
