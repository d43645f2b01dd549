//! `chainstore`, an embedded, append-friendly key-value store
//! persisted as a singly linked chain of self-describing transactions
//! inside a single backing file.
//!
//! Each transaction is a blob holding one or more records, a pointer to
//! its predecessor, and a monotonically increasing generation number.
//! Reads walk the chain newest-to-oldest; writes allocate a new blob
//! and promote it to head; compaction reclaims transactions whose
//! records are all superseded; a transaction can be serialized to a
//! portable byte string and ingested by a peer at its generation-correct
//! position, enabling deterministic out-of-order replication.
//!
//! ```no_run
//! use chainstore::{ChainIndex, OpenOptions};
//!
//! # fn main() -> chainstore::Result<()> {
//! let mut store = ChainIndex::open("store.db", OpenOptions::default())?;
//! store.set(b"foo", b"bar")?;
//! assert_eq!(store.get(b"foo")?.as_deref(), Some(&b"bar"[..]));
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod compactor;
pub mod cursor;
pub mod device;
pub mod error;
pub mod frame;
pub mod io;
pub mod reader;
pub mod replication;
pub mod writer;

pub use chain::{ChainIndex, OpenOptions};
pub use cursor::Cursor;
pub use error::{Error, Result};
