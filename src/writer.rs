//! Writer: allocate a blob, write a new frame, advance the head.

use crate::chain::{check_key_len, ChainIndex};
use crate::error::Result;
use crate::frame;
use crate::io::Device as IoDevice;

impl<F: IoDevice> ChainIndex<F> {
    /// Writes a new single-record transaction on top of the current
    /// head. Promoting the head happens last, after the frame itself
    /// is durably written.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        check_key_len(key)?;

        let records = [(key, value)];
        let size = frame::frame_size(&records)?;
        let new_offset = self.device.allocate(size)?;

        let predecessor = self.head_offset;
        let generation = self.head_generation + 1;
        frame::write_frame(&self.device, new_offset, predecessor, generation, &records)?;

        if generation > self.head_generation {
            self.head_offset = new_offset;
            self.head_generation = generation;
        }

        tracing::debug!(
            generation,
            key_len = key.len(),
            value_len = value.len(),
            "committed transaction"
        );
        Ok(())
    }

    /// Writes a tombstone for `key`, a new transaction whose record
    /// has a zero-length value, shadowing whatever came before.
    pub fn del(&mut self, key: &[u8]) -> Result<()> {
        self.set(key, &[])
    }
}
