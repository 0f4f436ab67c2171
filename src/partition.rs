//! Partition: the caller-facing handle combining a [`Device`], its
//! [`Geometry`], and a loaded [`FatTable`].
//!
//! This is the sole owner of the device for its lifetime — there is no
//! shared, reference-counted device handle the way a concurrent file
//! system driver would need, because this tool assumes exclusive,
//! single-threaded access to a quiesced volume (see SPEC_FULL.md §5).

use crate::bpb::Geometry;
use crate::device::{BlockFile, Device};
use crate::engine;
use crate::entry::FileInfo;
use crate::error::Result;
use crate::fat::FatTable;
use crate::path;
use crate::BOOT_SECTOR_SIZE;
use std::path::Path;

pub struct Partition {
    device: Box<dyn Device>,
    geometry: Geometry,
    fat: FatTable,
}

impl Partition {
    /// Open a raw device or disk image, parse its boot sector, and load the
    /// first FAT copy into memory.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut device: Box<dyn Device> = Box::new(BlockFile::open(path)?);
        let mut sector = vec![0u8; BOOT_SECTOR_SIZE];
        device.read_at(0, &mut sector)?;
        let geometry = Geometry::parse(&sector)?;
        let fat = FatTable::load(device.as_mut(), &geometry)?;
        log::info!(
            "opened partition: {:?}, serial={:#010x}, cluster_size={}",
            geometry.fat_type,
            geometry.serial_number,
            geometry.cluster_size
        );
        Ok(Self {
            device,
            geometry,
            fat,
        })
    }

    /// Build a [`Partition`] from parts already in hand (used by tests and
    /// by callers that need to reuse an already-open [`Device`]).
    pub fn from_parts(device: Box<dyn Device>, geometry: Geometry, fat: FatTable) -> Self {
        Self {
            device,
            geometry,
            fat,
        }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Resolve an absolute path to a [`FileInfo`] handle.
    pub fn get_file(&mut self, path: &str) -> Result<FileInfo> {
        path::resolve(self.device.as_mut(), &self.geometry, &self.fat, path)
    }

    pub fn is_file_fragmented(&self, file: &FileInfo) -> u32 {
        engine::is_fragmented(&self.fat, file)
    }

    pub fn count_clusters(&self, file: &FileInfo) -> u32 {
        engine::count_clusters(&self.fat, file)
    }

    /// Defragment `file` (or, for a directory, every file it contains).
    /// Returns the number of files relocated.
    pub fn defragment(&mut self, file: &mut FileInfo) -> Result<u32> {
        engine::defragment(self.device.as_mut(), &self.geometry, &mut self.fat, file)
    }

    pub fn print_file_info(&self, file: &FileInfo) {
        println!(
            "{:<20} kind={:?} first_cluster={:<8} size={:<10} fragments={}",
            file.name,
            file.kind,
            file.first_cluster,
            file.size,
            self.is_file_fragmented(file)
        );
    }
}
