//! Crate-wide error taxonomy.

use std::io;

#[derive(thiserror::Error, Debug)]
pub enum DefragError {
    #[error("invalid partition boot record: {0}")]
    InvalidPbr(String),

    #[error("device I/O failure: {0}")]
    Io(#[from] io::Error),

    #[error("buffer access out of bounds: offset {offset} + {len} exceeds capacity {capacity}")]
    OutOfBounds {
        offset: usize,
        len: usize,
        capacity: usize,
    },

    #[error("file handle belongs to a different partition (expected serial {expected:#010x}, found {found:#010x})")]
    WrongPartition { expected: u32, found: u32 },
}

pub type Result<T> = core::result::Result<T, DefragError>;
