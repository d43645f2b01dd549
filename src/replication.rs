//! Serializer / ingestor: encode a single transaction to a portable,
//! offset-free byte string, and insert such a string into a chain at
//! its generation-correct position.

use bytes::Bytes;

use crate::chain::ChainIndex;
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::frame;
use crate::io::Device as IoDevice;

impl<F: IoDevice> ChainIndex<F> {
    /// Encodes `cursor`'s transaction as `[version:1][generation:8 BE]
    /// [records...][terminator:1]`. Records are copied verbatim from
    /// disk, the wire form is bit-identical to the on-disk record list,
    /// so ingesting it never needs to re-encode anything.
    pub fn serialize(&self, cursor: &Cursor<'_, F>) -> Result<Bytes> {
        frame::read_header(&self.device, cursor.offset())?;

        let list_start = cursor.offset() + 16;
        let mut list_end = list_start;
        for record in frame::iterate_records(&self.device, cursor.offset()) {
            let record = record?;
            list_end = record.value_offset + record.value_len;
        }
        let list_len = list_end - list_start + 1; // + terminator byte

        let mut buf = vec![0u8; 9 + list_len as usize];
        buf[1..9].copy_from_slice(&cursor.generation().to_be_bytes());
        self.device.read_at(&mut buf[9..], list_start)?;
        Ok(Bytes::from(buf))
    }

    /// Inserts a serialized transaction at its generation-correct
    /// position, preserving its original generation number and fixing
    /// up whichever frame used to point at the insertion point.
    ///
    /// Fails without touching any existing frame: the new blob is
    /// allocated and written first, and the only cross-frame mutation
    /// (the successor's predecessor pointer) happens after that,
    /// exactly as the writer only promotes the head as its last step.
    pub fn ingest(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() < 9 {
            return Err(Error::TruncatedIngest);
        }
        if bytes[0] != 0 {
            return Err(Error::BadVersion);
        }
        let generation = u64::from_be_bytes(bytes[1..9].try_into().unwrap());

        let (successor_offset, predecessor_offset, will_promote) = if generation
            > self.head_generation
        {
            (None, self.head_offset, true)
        } else {
            let mut current = self.head_offset;
            let mut prev: Option<u64> = None;
            let (successor, predecessor) = loop {
                let header =
                    frame::read_header(&self.device, current).map_err(|_| Error::BadChain)?;
                if header.generation == generation {
                    // A frame at this generation already exists: insert
                    // the new one as its predecessor (see design notes).
                    break (Some(current), header.predecessor);
                }
                if header.generation < generation {
                    break (prev, current);
                }
                if header.predecessor == 0 {
                    // Walked off the tail without finding anything
                    // older: the new frame becomes the tail.
                    break (Some(current), 0);
                }
                prev = Some(current);
                current = header.predecessor;
            };
            (successor, predecessor, false)
        };

        let payload_len = (bytes.len() - 1 + 8) as u64;
        let new_offset = self.device.allocate(payload_len)?;

        let word = predecessor_offset & 0x00FF_FFFF_FFFF_FFFF;
        self.device.write_at(&word.to_be_bytes(), new_offset)?;
        self.device.write_at(&bytes[1..], new_offset + 8)?;

        if let Some(succ) = successor_offset {
            frame::rewrite_predecessor(&self.device, succ, new_offset)?;
        }

        if will_promote {
            self.head_offset = new_offset;
            self.head_generation = generation;
        }

        tracing::debug!(generation, new_offset, will_promote, "ingested transaction");
        Ok(())
    }
}
