//! Compactor: reclaim transactions whose every record has been
//! superseded by something newer still reachable from the head.

use crate::chain::ChainIndex;
use crate::error::Result;
use crate::frame;
use crate::io::Device as IoDevice;

impl<F: IoDevice> ChainIndex<F> {
    /// Scans the chain from head toward tail, freeing any non-head
    /// transaction whose every record is shadowed by a newer one, and
    /// splicing its surviving successor's predecessor pointer past it.
    ///
    /// Checking each record against the live read path is O(chain
    /// length) per record, but keeps this invariant-preserving without
    /// a separate index: a transaction is discardable iff nothing a
    /// caller would observe today depends on it.
    pub fn compact(&mut self) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        // `successor` is the offset of the frame whose predecessor is
        // `current`, None while `current` is still the head.
        let mut successor: Option<u64> = None;
        let mut current = self.head_offset;

        while current != 0 {
            let header = frame::read_header(&self.device, current)?;
            let predecessor = header.predecessor;
            let generation = header.generation;

            let mut discardable = true;
            for record in frame::iterate_records(&self.device, current) {
                let record = record?;
                if self.get_generation(&record.key)? == generation {
                    discardable = false;
                    break;
                }
            }

            if !discardable {
                successor = Some(current);
                current = predecessor;
                continue;
            }

            match successor {
                Some(succ) => {
                    frame::rewrite_predecessor(&self.device, succ, predecessor)?;
                    self.device.free(current)?;
                    tracing::debug!(generation, offset = current, "compacted transaction");
                }
                None => {
                    // `current` is the head: never removed, and in
                    // practice never actually discardable, since every
                    // one of its own records is by definition the
                    // newest version of itself.
                }
            }

            current = predecessor;
        }

        Ok(())
    }
}
