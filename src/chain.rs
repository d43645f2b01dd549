//! Chain index: the process-wide handle tracking the backing device and
//! the current head of the transaction chain.

use std::path::Path;

use crate::device::Device;
use crate::error::{Error, Result};
use crate::frame;
use crate::io::Device as IoDevice;

/// Options controlling how the backing device is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenOptions {
    /// If true, the backing file is treated as a fixed-size block
    /// device: it must already exist and will never be grown.
    pub is_block_device: bool,
}

/// Handle owning the backing device and the current head pointer.
///
/// Opening the same file through two `ChainIndex`es yields two
/// independent views that do not coordinate with each other, that is
/// the caller's responsibility (see the concurrency model).
pub struct ChainIndex<F = std::fs::File> {
    pub(crate) device: Device<F>,
    pub(crate) head_offset: u64,
    pub(crate) head_generation: u64,
}

impl ChainIndex<std::fs::File> {
    /// Opens (or creates, for non-block devices) the store at `path`.
    pub fn open(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let device = Device::open(path, options.is_block_device)?;
        Self::from_device(device)
    }
}

impl<F: IoDevice> ChainIndex<F> {
    /// Builds a chain index from an already-open device, scanning every
    /// allocated blob for the highest-generation frame to use as head.
    pub fn from_device(device: Device<F>) -> Result<Self> {
        let mut head_offset = 0u64;
        let mut head_generation = 0u64;

        for offset in device.allocated_offsets()? {
            match frame::read_header(&device, offset) {
                Ok(header) if header.generation > head_generation => {
                    head_generation = header.generation;
                    head_offset = offset;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::trace!(offset, error = %e, "skipping undecodable blob");
                }
            }
        }

        tracing::info!(head_offset, head_generation, "chain index opened");
        Ok(ChainIndex {
            device,
            head_offset,
            head_generation,
        })
    }

    pub fn head_offset(&self) -> u64 {
        self.head_offset
    }

    pub fn head_generation(&self) -> u64 {
        self.head_generation
    }

    pub fn is_empty(&self) -> bool {
        self.head_generation == 0
    }

    pub(crate) fn device(&self) -> &Device<F> {
        &self.device
    }

    /// Releases the backing device. Present for parity with the
    /// explicit open/close lifecycle; dropping a `ChainIndex` has the
    /// same effect.
    pub fn close(self) {
        drop(self);
    }
}

/// `KeyTooLarge` is surfaced here too since both the writer and the
/// frame codec need to reject the same bound.
pub(crate) fn check_key_len(key: &[u8]) -> Result<()> {
    if key.len() > frame::MAX_KEY_LEN {
        return Err(Error::KeyTooLarge { len: key.len() });
    }
    Ok(())
}
