//! Backing device: a minimal, address-stable variable-size blob allocator
//! over a single file, in the spirit of `palloc`, the collaborator
//! `kvsm.c` links against rather than implements. Offset 0 is reserved
//! as "none" (spec): the 8-byte superblock occupies it, so the first
//! block header starts at offset 8 and the first payload a caller can
//! receive is never 0.
//!
//! Every blob handed out by `allocate` is preceded by a 9-byte block
//! header (`payload_len: u64 BE`, `flag: u8`) invisible to the frame
//! codec. This bookkeeping is scoped entirely to this module; nothing
//! above it ever sees a block header.

use std::path::Path;

use crate::error::{Error, Result};
use crate::io::Device as IoDevice;

const MAGIC: &[u8; 8] = b"KVBLK001";
const SUPERBLOCK_LEN: u64 = 8;
const BLOCK_HEADER_LEN: u64 = 9;
const FLAG_FREE: u8 = 0;
const FLAG_USED: u8 = 1;

#[derive(Debug, Clone, Copy)]
struct FreeBlock {
    /// Offset of the block header, not the payload.
    header_offset: u64,
    payload_len: u64,
}

/// A backing device over anything that can do positional I/O.
pub struct Device<F> {
    file: F,
    is_block_device: bool,
    capacity: u64,
    free_list: Vec<FreeBlock>,
}

impl Device<std::fs::File> {
    /// Opens (creating if `!is_block_device`) the file at `path` as a
    /// backing device. Fails with `OpenFailed` if the device cannot be
    /// opened or initialized.
    pub fn open(path: impl AsRef<Path>, is_block_device: bool) -> Result<Self> {
        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(!is_block_device)
            .open(path)
            .map_err(Error::OpenFailed)?;
        Self::from_file(file, is_block_device)
    }
}

impl<F: IoDevice> Device<F> {
    pub fn from_file(file: F, is_block_device: bool) -> Result<Self> {
        let len = file.len().map_err(Error::OpenFailed)?;
        if len < SUPERBLOCK_LEN {
            file.write_all_at(MAGIC, 0).map_err(Error::OpenFailed)?;
        } else {
            let mut magic = [0u8; 8];
            file.read_exact_at(&mut magic, 0).map_err(Error::OpenFailed)?;
            if magic == [0u8; 8] {
                // Untouched space (a fresh regular file or an unformatted
                // block device): format it rather than reject it.
                file.write_all_at(MAGIC, 0).map_err(Error::OpenFailed)?;
            } else if &magic != MAGIC {
                return Err(Error::OpenFailed(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "not a chainstore device (bad superblock magic)",
                )));
            }
        }
        let capacity = file.len().map_err(Error::OpenFailed)?.max(SUPERBLOCK_LEN);
        let mut dev = Device {
            file,
            is_block_device,
            capacity,
            free_list: Vec::new(),
        };
        dev.rebuild_free_list()?;
        tracing::debug!(
            is_block_device,
            capacity = dev.capacity,
            free_blocks = dev.free_list.len(),
            "opened backing device"
        );
        Ok(dev)
    }

    /// Walks every block header from right after the superblock to EOF.
    /// Returns `(header_offset, payload_len, is_allocated)` in physical
    /// (on-disk) order.
    fn blocks(&self) -> Result<Vec<(u64, u64, bool)>> {
        let len = self.file.len()?;
        let mut out = Vec::new();
        let mut offset = SUPERBLOCK_LEN;
        while offset + BLOCK_HEADER_LEN <= len {
            let (payload_len, used) = self.read_block_header(offset)?;
            out.push((offset, payload_len, used));
            offset += BLOCK_HEADER_LEN + payload_len;
        }
        Ok(out)
    }

    fn read_block_header(&self, header_offset: u64) -> Result<(u64, bool)> {
        let mut buf = [0u8; BLOCK_HEADER_LEN as usize];
        self.file.read_exact_at(&mut buf, header_offset)?;
        let payload_len = u64::from_be_bytes(buf[0..8].try_into().unwrap());
        let used = buf[8] == FLAG_USED;
        Ok((payload_len, used))
    }

    fn write_block_header(&self, header_offset: u64, payload_len: u64, used: bool) -> Result<()> {
        let mut buf = [0u8; BLOCK_HEADER_LEN as usize];
        buf[0..8].copy_from_slice(&payload_len.to_be_bytes());
        buf[8] = if used { FLAG_USED } else { FLAG_FREE };
        self.file.write_all_at(&buf, header_offset)?;
        Ok(())
    }

    fn rebuild_free_list(&mut self) -> Result<()> {
        self.free_list.clear();
        for (header_offset, payload_len, used) in self.blocks()? {
            if !used {
                self.free_list.push(FreeBlock {
                    header_offset,
                    payload_len,
                });
            }
        }
        Ok(())
    }

    /// Payload offsets of every allocated blob, in physical order. Used
    /// by `ChainIndex::open` as the candidate set of frames to scan.
    pub fn allocated_offsets(&self) -> Result<Vec<u64>> {
        Ok(self
            .blocks()?
            .into_iter()
            .filter(|(_, _, used)| *used)
            .map(|(header_offset, _, _)| header_offset + BLOCK_HEADER_LEN)
            .collect())
    }

    /// Allocates `size` contiguous bytes and returns the payload offset.
    /// Reuses a free block via first-fit before growing the file (or
    /// fails on a block device with no room left).
    pub fn allocate(&mut self, size: u64) -> Result<u64> {
        if let Some(idx) = self
            .free_list
            .iter()
            .position(|b| b.payload_len >= size)
        {
            let block = self.free_list.remove(idx);
            let remainder = block.payload_len - size;
            if remainder >= BLOCK_HEADER_LEN {
                let split_header_offset = block.header_offset + BLOCK_HEADER_LEN + size;
                let split_payload_len = remainder - BLOCK_HEADER_LEN;
                self.write_block_header(split_header_offset, split_payload_len, false)?;
                self.free_list.push(FreeBlock {
                    header_offset: split_header_offset,
                    payload_len: split_payload_len,
                });
                self.write_block_header(block.header_offset, size, true)?;
            } else {
                // Too small a remainder to host its own header: hand out the
                // whole block, padding included.
                self.write_block_header(block.header_offset, block.payload_len, true)?;
            }
            tracing::trace!(offset = block.header_offset, size, "reused free block");
            return Ok(block.header_offset + BLOCK_HEADER_LEN);
        }

        let header_offset = self.file.len()?.max(SUPERBLOCK_LEN);
        let required_end = header_offset + BLOCK_HEADER_LEN + size;
        if self.is_block_device && required_end > self.capacity {
            return Err(Error::AllocationFailed { requested: size });
        }
        self.write_block_header(header_offset, size, true)?;
        self.capacity = self.capacity.max(required_end);
        tracing::trace!(offset = header_offset, size, "grew device for new block");
        Ok(header_offset + BLOCK_HEADER_LEN)
    }

    /// Frees a previously-allocated blob. Coalesces with the next
    /// physically adjacent block if it is also free; does not coalesce
    /// backward, and does not zero the freed header's payload bytes
    /// (the allocator is expected to reclaim them regardless, per the
    /// compactor's design notes).
    pub fn free(&mut self, offset: u64) -> Result<()> {
        let header_offset = offset - BLOCK_HEADER_LEN;
        let (mut payload_len, _used) = self.read_block_header(header_offset)?;

        let next_header_offset = header_offset + BLOCK_HEADER_LEN + payload_len;
        if next_header_offset + BLOCK_HEADER_LEN <= self.file.len()? {
            let (next_payload_len, next_used) = self.read_block_header(next_header_offset)?;
            if !next_used {
                self.free_list
                    .retain(|b| b.header_offset != next_header_offset);
                payload_len += BLOCK_HEADER_LEN + next_payload_len;
            }
        }

        self.write_block_header(header_offset, payload_len, false)?;
        self.free_list.push(FreeBlock {
            header_offset,
            payload_len,
        });
        tracing::trace!(offset, "freed block");
        Ok(())
    }

    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
        self.file.read_exact_at(buf, offset)?;
        Ok(())
    }

    pub fn write_at(&self, buf: &[u8], offset: u64) -> Result<()> {
        self.file.write_all_at(buf, offset)?;
        Ok(())
    }

    pub fn sync_all(&self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use super::*;

    #[test]
    fn allocate_reuses_freed_block_of_equal_size() {
        let file = tempfile::tempfile().unwrap();
        let mut dev = Device::from_file(file, false).unwrap();

        let a = dev.allocate(32).unwrap();
        let b = dev.allocate(32).unwrap();
        assert_ne!(a, b);

        dev.free(a).unwrap();
        let c = dev.allocate(32).unwrap();
        assert_eq!(a, c, "freed block should be reused for an equal-size request");
    }

    #[test]
    fn allocate_splits_oversized_free_block() {
        let file = tempfile::tempfile().unwrap();
        let mut dev = Device::from_file(file, false).unwrap();

        let big = dev.allocate(100).unwrap();
        dev.free(big).unwrap();

        let small = dev.allocate(10).unwrap();
        assert_eq!(small, big, "small request should reuse the front of the freed block");

        // The remainder should now be allocatable as its own block.
        let offsets_before = dev.allocated_offsets().unwrap();
        assert!(offsets_before.contains(&small));
    }

    #[test]
    fn block_device_rejects_growth_past_capacity() {
        let file = tempfile::tempfile().unwrap();
        file.set_len(64).unwrap();
        let mut dev = Device::from_file(file, true).unwrap();
        let err = dev.allocate(1000).unwrap_err();
        assert!(matches!(err, Error::AllocationFailed { .. }));
    }

    #[test]
    fn allocated_offsets_survive_reopen() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        {
            let mut dev = Device::from_file(file.reopen().unwrap(), false).unwrap();
            dev.allocate(8).unwrap();
            dev.allocate(16).unwrap();
        }
        file.flush().unwrap();
        let dev = Device::from_file(file.reopen().unwrap(), false).unwrap();
        assert_eq!(dev.allocated_offsets().unwrap().len(), 2);
    }
}
