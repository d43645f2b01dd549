//! Error taxonomy shared by every component of the engine.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("frame has an unsupported or corrupt version byte")]
    BadVersion,

    #[error("key of {len} bytes exceeds the 32767-byte limit")]
    KeyTooLarge { len: usize },

    #[error("could not open backing device: {0}")]
    OpenFailed(std::io::Error),

    #[error("allocator could not satisfy a request for {requested} bytes")]
    AllocationFailed { requested: u64 },

    #[error("ingest payload shorter than the minimum transaction header")]
    TruncatedIngest,

    #[error("predecessor walk encountered an undecodable frame")]
    BadChain,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
