//! Raw device I/O.
//!
//! Unlike the block-cached, block-granular device trait this is adapted
//! from, a defragmenter addresses the volume at arbitrary byte offsets (a
//! directory entry patch is two bytes at an unaligned offset), so [`Device`]
//! exposes `seek`/`read`/`write` directly rather than a fixed block size.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::error::Result;

/// A byte-addressable, seekable volume: a raw device or a disk image file.
pub trait Device {
    fn seek(&mut self, offset: u64) -> Result<()>;
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.seek(offset)?;
        self.read_exact(buf)
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        self.seek(offset)?;
        self.write_all(buf)
    }
}

/// A [`Device`] backed by a `std::fs::File` opened on a raw device path or a
/// disk image.
pub struct BlockFile(File);

impl BlockFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self(file))
    }
}

impl Device for BlockFile {
    fn seek(&mut self, offset: u64) -> Result<()> {
        Seek::seek(&mut self.0, SeekFrom::Start(offset))?;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        Read::read_exact(&mut self.0, buf)?;
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        Write::write_all(&mut self.0, buf)?;
        Ok(())
    }
}
