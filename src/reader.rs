//! Reader: given a key, walk the chain from head toward tail and return
//! the newest matching value, a tombstone, or not-found.

use bytes::Bytes;

use crate::chain::ChainIndex;
use crate::error::Result;
use crate::frame;
use crate::io::Device as IoDevice;

impl<F: IoDevice> ChainIndex<F> {
    /// Returns the newest value for `key`, or `None` if the key was
    /// never set, was last deleted (a tombstone), or is longer than the
    /// 32767-byte limit (silently not-found, never an error).
    pub fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        if key.len() > frame::MAX_KEY_LEN {
            return Ok(None);
        }
        let mut cursor = match self.head()? {
            Some(c) => c,
            None => return Ok(None),
        };
        loop {
            for record in frame::iterate_records(&self.device, cursor.offset()) {
                let record = record?;
                if record.key == key {
                    if record.is_tombstone() {
                        return Ok(None);
                    }
                    return Ok(Some(Bytes::from(record.read_value(&self.device)?)));
                }
            }
            match cursor.previous()? {
                Some(prev) => cursor = prev,
                None => return Ok(None),
            }
        }
    }

    /// Returns the generation of the frame containing the newest record
    /// for `key` (tombstone or not), or 0 if the key has never been
    /// written. This is the primitive compaction uses to decide whether
    /// a transaction is still observable.
    pub fn get_generation(&self, key: &[u8]) -> Result<u64> {
        if key.len() > frame::MAX_KEY_LEN {
            return Ok(0);
        }
        let mut cursor = match self.head()? {
            Some(c) => c,
            None => return Ok(0),
        };
        loop {
            for record in frame::iterate_records(&self.device, cursor.offset()) {
                let record = record?;
                if record.key == key {
                    return Ok(cursor.generation());
                }
            }
            match cursor.previous()? {
                Some(prev) => cursor = prev,
                None => return Ok(0),
            }
        }
    }
}
