//! Partition Boot Record (PBR) parsing.
//!
//! The first sector of a FAT volume carries the BIOS Parameter Block (BPB),
//! a set of geometry fields that differ in layout between FAT12/16 and
//! FAT32. [`BiosParameterBlock::parse`] reads the raw fields; [`Geometry`]
//! is the derived, FAT-variant-agnostic record that the rest of the crate
//! actually consumes, so callers never branch on [`FatType`] outside this
//! module.
//!
//! FAT type is determined purely by cluster count, never by the (often
//! stale) `bs_fil_sys_type` string:
//! - fewer than 4085 clusters: FAT12
//! - fewer than 65525 clusters: FAT16
//! - otherwise: FAT32
//!
//! This crate treats every FAT entry as 16 bits wide regardless of the
//! variant (see the module-level note in `engine`); `Geometry` still
//! records the true [`FatType`] so callers can reason about root-directory
//! addressing, which does differ between FAT32 and FAT12/16.

use crate::byte_buffer::{ByteBuffer, Width};
use crate::error::{DefragError, Result};
use crate::{BOOT_SECTOR_SIZE, BOOT_SIGNATURE, BOOT_SIGNATURE_OFFSET};

const MAX_CLUSTER_FAT12: u32 = 4085;
const MAX_CLUSTER_FAT16: u32 = 65525;

/// Which FAT variant a volume uses. Affects only root-directory addressing;
/// the FAT itself is always walked as 16-bit entries by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatType {
    Fat12,
    Fat16,
    Fat32,
}

/// Raw boot-sector fields, named and offset exactly as the Microsoft FAT
/// specification defines them. Not used directly outside this module;
/// [`Geometry`] is the derived record everything else consumes.
#[derive(Debug, Clone, Copy)]
pub struct BiosParameterBlock {
    /// Bytes per sector. Size: 2 bytes, offset 0x0B.
    pub bytes_per_sector: u16,
    /// Sectors per allocation unit; must be a power of two. Offset 0x0D.
    pub sectors_per_cluster: u8,
    /// Count of reserved sectors, including the boot sector itself. Offset 0x0E.
    pub reserved_sectors: u16,
    /// Number of FAT copies, normally 2. Offset 0x10.
    pub fat_count: u8,
    /// Count of 32-byte root directory entries (0 on FAT32). Offset 0x11.
    pub root_entry_count: u16,
    /// Total sector count, 16-bit form (0 if the 32-bit form is used). Offset 0x13.
    pub total_sectors_16: u16,
    /// FAT size in sectors, 16-bit form (0 on FAT32). Offset 0x16.
    pub fat_size_16: u16,
    /// Total sector count, 32-bit form. Offset 0x20.
    pub total_sectors_32: u32,
    /// FAT size in sectors, FAT32 form. Offset 0x24 (FAT32 only).
    pub fat_size_32: u32,
    /// Starting cluster of the root directory. Offset 0x2C (FAT32 only).
    pub root_cluster: u32,
    /// Volume serial number, used as a weak sanity tag on FileInfo handles.
    pub volume_serial: u32,
}

impl BiosParameterBlock {
    /// Parse the raw boot-sector fields out of a 512-byte sector buffer.
    /// Does not itself validate the signature; see [`Geometry::parse`].
    fn parse(buf: &ByteBuffer) -> Result<Self> {
        let bytes_per_sector = buf.read_u16(0x0B)?;
        let sectors_per_cluster = buf.read_u8(0x0D)?;
        let reserved_sectors = buf.read_u16(0x0E)?;
        let fat_count = buf.read_u8(0x10)?;
        let root_entry_count = buf.read_u16(0x11)?;
        let total_sectors_16 = buf.read_u16(0x13)?;
        let fat_size_16 = buf.read_u16(0x16)?;
        let total_sectors_32 = buf.read_u32(0x20)?;

        let fat_size_32 = buf.read_u32(0x24)?;
        let root_cluster = buf.read_u32(0x2C)?;
        // Volume serial lives at the same offset (0x27) on FAT12/16 and at
        // 0x43 on FAT32; discriminate once fat_size_16 tells us the variant.
        let volume_serial = if fat_size_16 == 0 {
            buf.read_u32(0x43)?
        } else {
            buf.read_u32(0x27)?
        };

        Ok(Self {
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            fat_count,
            root_entry_count,
            total_sectors_16,
            fat_size_16,
            total_sectors_32,
            fat_size_32,
            root_cluster,
            volume_serial,
        })
    }

    fn fat_size(&self) -> u32 {
        if self.fat_size_16 != 0 {
            self.fat_size_16 as u32
        } else {
            self.fat_size_32
        }
    }

    fn total_sectors(&self) -> u32 {
        if self.total_sectors_16 != 0 {
            self.total_sectors_16 as u32
        } else {
            self.total_sectors_32
        }
    }

    fn root_dir_sectors(&self) -> u32 {
        let bytes_per_sector = self.bytes_per_sector as u32;
        ((self.root_entry_count as u32) * 32 + bytes_per_sector - 1) / bytes_per_sector
    }

    fn data_sector_count(&self) -> u32 {
        self.total_sectors()
            - self.reserved_sectors as u32
            - self.fat_count as u32 * self.fat_size()
            - self.root_dir_sectors()
    }

    fn fat_type(&self) -> FatType {
        let cluster_count = self.data_sector_count() / self.sectors_per_cluster.max(1) as u32;
        if cluster_count < MAX_CLUSTER_FAT12 {
            FatType::Fat12
        } else if cluster_count < MAX_CLUSTER_FAT16 {
            FatType::Fat16
        } else {
            FatType::Fat32
        }
    }
}

/// The unified, FAT-variant-agnostic geometry derived once at open time.
/// Every other component in the crate addresses the volume purely in terms
/// of this record.
#[derive(Debug, Clone, Copy)]
pub struct Geometry {
    pub fat_type: FatType,
    pub bytes_per_sector: u32,
    pub sectors_per_cluster: u32,
    pub cluster_size: u32,
    pub reserved_sectors: u32,
    pub fat_count: u32,
    pub sectors_per_fat: u32,
    pub fat_size: u32,
    pub fat_offset: u32,
    pub root_dir_offset: u32,
    pub root_dir_size: u32,
    pub data_offset: u32,
    pub root_dir_cluster: u32,
    pub serial_number: u32,
    pub is_fat: bool,
}

impl Geometry {
    /// Parse and validate a boot sector, producing the derived geometry.
    /// Fails with [`DefragError::InvalidPbr`] if the 0x55AA signature is
    /// absent or the derived parameters are nonsensical.
    pub fn parse(sector: &[u8]) -> Result<Self> {
        if sector.len() < BOOT_SECTOR_SIZE {
            return Err(DefragError::InvalidPbr(format!(
                "boot sector too short: {} bytes",
                sector.len()
            )));
        }

        let buf = ByteBuffer::from_vec(sector[..BOOT_SECTOR_SIZE].to_vec());
        if buf.read(BOOT_SIGNATURE_OFFSET, Width::Byte)? as u8 != BOOT_SIGNATURE[0]
            || buf.read(BOOT_SIGNATURE_OFFSET + 1, Width::Byte)? as u8 != BOOT_SIGNATURE[1]
        {
            return Err(DefragError::InvalidPbr(
                "missing 0x55AA boot signature".into(),
            ));
        }

        let bpb = BiosParameterBlock::parse(&buf)?;
        if bpb.bytes_per_sector == 0 || bpb.sectors_per_cluster == 0 || bpb.fat_count == 0 {
            return Err(DefragError::InvalidPbr(
                "zero bytes_per_sector, sectors_per_cluster or fat_count".into(),
            ));
        }

        let fat_type = bpb.fat_type();
        let fat_size = bpb.fat_size();
        let bytes_per_sector = bpb.bytes_per_sector as u32;
        let fat_offset = bpb.reserved_sectors as u32 * bytes_per_sector;
        let root_dir_size = bpb.root_dir_sectors() * bytes_per_sector;
        let root_dir_offset = fat_offset + bpb.fat_count as u32 * fat_size * bytes_per_sector;

        let data_offset = match fat_type {
            FatType::Fat32 => root_dir_offset,
            FatType::Fat12 | FatType::Fat16 => root_dir_offset + root_dir_size,
        };

        Ok(Self {
            fat_type,
            bytes_per_sector,
            sectors_per_cluster: bpb.sectors_per_cluster as u32,
            cluster_size: bpb.sectors_per_cluster as u32 * bytes_per_sector,
            reserved_sectors: bpb.reserved_sectors as u32,
            fat_count: bpb.fat_count as u32,
            sectors_per_fat: fat_size,
            fat_size: fat_size * bytes_per_sector,
            fat_offset,
            root_dir_offset,
            root_dir_size,
            data_offset,
            root_dir_cluster: if fat_type == FatType::Fat32 {
                bpb.root_cluster
            } else {
                0
            },
            serial_number: bpb.volume_serial,
            is_fat: true,
        })
    }

    /// Absolute byte offset of the start of `cluster`'s data on FAT32, or of
    /// a FAT12/16 subdirectory cluster (never the fixed root region, which
    /// has no cluster number).
    pub fn cluster_offset(&self, cluster: u32) -> u64 {
        match self.fat_type {
            FatType::Fat32 => {
                self.data_offset as u64 + (cluster as u64 - 1) * self.cluster_size as u64
            }
            FatType::Fat12 | FatType::Fat16 => {
                self.data_offset as u64 + (cluster as u64 - 2) * self.cluster_size as u64
            }
        }
    }
}
