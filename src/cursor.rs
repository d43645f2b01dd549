//! Cursor: an immutable, non-owning snapshot naming one transaction.
//!
//! A cursor never outlives the `&ChainIndex` it borrows, and is never
//! cached as mutable state across operations, it is a value type
//! resolved on demand, not a pinned pointer into a live structure.

use crate::chain::ChainIndex;
use crate::error::Result;
use crate::frame;
use crate::io::Device as IoDevice;

pub struct Cursor<'a, F> {
    index: &'a ChainIndex<F>,
    offset: u64,
    predecessor: u64,
    generation: u64,
}

// Manual impls: a cursor only holds a shared reference to `F`, so it can
// be `Clone`/`Copy` even when `F` (typically `std::fs::File`) is not.
impl<'a, F> Clone for Cursor<'a, F> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<'a, F> Copy for Cursor<'a, F> {}

impl<'a, F> Cursor<'a, F> {
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn predecessor(&self) -> u64 {
        self.predecessor
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl<'a, F: IoDevice> Cursor<'a, F> {
    /// Returns a cursor at this cursor's predecessor, or `None` if it
    /// has no predecessor (it is the tail).
    pub fn previous(&self) -> Result<Option<Cursor<'a, F>>> {
        if self.predecessor == 0 {
            return Ok(None);
        }
        Ok(Some(self.index.cursor_at(self.predecessor)?))
    }

    /// Returns the cursor whose predecessor equals this cursor's offset,
    /// i.e. the transaction that was committed directly after this
    /// one. Implemented by walking from the head backward until the
    /// predecessor pointer matches; the pointer accumulated during that
    /// walk is the successor. `None` if this cursor is the head.
    pub fn next(&self) -> Result<Option<Cursor<'a, F>>> {
        let mut current = match self.index.head()? {
            Some(c) => c,
            None => return Ok(None),
        };
        if current.offset == self.offset {
            return Ok(None);
        }
        loop {
            if current.predecessor == self.offset {
                return Ok(Some(current));
            }
            match current.previous()? {
                Some(prev) => current = prev,
                None => return Ok(None),
            }
        }
    }
}

impl<F: IoDevice> ChainIndex<F> {
    /// Loads the cursor at `offset`, failing if the frame there is not
    /// version 0.
    pub fn cursor_at(&self, offset: u64) -> Result<Cursor<'_, F>> {
        let header = frame::read_header(&self.device, offset)?;
        Ok(Cursor {
            index: self,
            offset,
            predecessor: header.predecessor,
            generation: header.generation,
        })
    }

    /// The head cursor, or `None` for an empty store. A genuine decode
    /// failure on the head frame propagates as `Err` rather than being
    /// read as "empty".
    pub fn head(&self) -> Result<Option<Cursor<'_, F>>> {
        if self.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.cursor_at(self.head_offset)?))
    }

    /// Walks head-to-tail for the cursor whose generation equals
    /// `generation`. If none matches exactly, returns the cursor with
    /// the smallest generation still >= `generation` (the nearest newer
    /// anchor); if `generation` is below every stored generation,
    /// returns the oldest cursor. `None` only when the store is empty
    /// or `generation` exceeds every stored generation, there is no
    /// anchor a replication peer could usefully be given.
    pub fn fetch(&self, generation: u64) -> Result<Option<Cursor<'_, F>>> {
        let mut current = match self.head()? {
            Some(c) => c,
            None => return Ok(None),
        };
        let mut best: Option<Cursor<'_, F>> = None;
        loop {
            if current.generation >= generation {
                best = Some(current);
            } else {
                break;
            }
            match current.previous()? {
                Some(prev) => current = prev,
                None => break,
            }
        }
        Ok(best)
    }
}
