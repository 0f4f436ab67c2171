//! In-memory volume fixtures shared by the integration tests: a `Device`
//! over a `Vec<u8>` and a synthetic-volume builder, the Rust analogue of
//! the original test harness's fragmented-file synthesizer.

use fatdefrag::device::Device;
use fatdefrag::{bpb::FatType, Geometry, Result};

pub struct MemDevice {
    pub data: Vec<u8>,
    cursor: u64,
}

impl MemDevice {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, cursor: 0 }
    }
}

impl Device for MemDevice {
    fn seek(&mut self, offset: u64) -> Result<()> {
        self.cursor = offset;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let start = self.cursor as usize;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        self.cursor += buf.len() as u64;
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let start = self.cursor as usize;
        self.data[start..start + buf.len()].copy_from_slice(buf);
        self.cursor += buf.len() as u64;
        Ok(())
    }
}

const BYTES_PER_SECTOR: u32 = 512;
const RESERVED_SECTORS: u32 = 1;
const FAT_SECTORS: u32 = 4;
const ROOT_ENTRIES: u32 = 16;

/// Builds a minimal FAT12/16 volume image (one FAT copy, one sector per
/// cluster) in memory, with a caller-specified cluster budget so the
/// resulting image classifies as the requested [`FatType`].
pub struct VolumeBuilder {
    data: Vec<u8>,
    fat_offset: u32,
    root_dir_offset: u32,
    data_offset: u32,
    serial: u32,
    root_entry_cursor: u32,
}

impl VolumeBuilder {
    pub fn new(fat_type: FatType, serial: u32) -> Self {
        assert_ne!(fat_type, FatType::Fat32, "use Fat32VolumeBuilder");
        let data_clusters: u32 = if fat_type == FatType::Fat12 { 100 } else { 5000 };

        let root_dir_sectors = (ROOT_ENTRIES * 32) / BYTES_PER_SECTOR;
        let total_sectors =
            RESERVED_SECTORS + FAT_SECTORS + root_dir_sectors + data_clusters;

        let mut data = vec![0u8; (total_sectors * BYTES_PER_SECTOR) as usize];
        write_common_bpb(&mut data, total_sectors, FAT_SECTORS, ROOT_ENTRIES as u16, serial);

        let fat_offset = RESERVED_SECTORS * BYTES_PER_SECTOR;
        let root_dir_offset = fat_offset + FAT_SECTORS * BYTES_PER_SECTOR;
        let data_offset = root_dir_offset + root_dir_sectors * BYTES_PER_SECTOR;

        Self {
            data,
            fat_offset,
            root_dir_offset,
            data_offset,
            serial,
            root_entry_cursor: 0,
        }
    }

    fn cluster_offset(&self, cluster: u32) -> u32 {
        self.data_offset + (cluster - 2) * BYTES_PER_SECTOR
    }

    pub fn set_fat_entry(&mut self, cluster: u32, value: u16) -> &mut Self {
        let off = (self.fat_offset + cluster * 2) as usize;
        self.data[off..off + 2].copy_from_slice(&value.to_le_bytes());
        self
    }

    /// Lay out a chain (possibly non-contiguous) of clusters for a file and
    /// add its root-directory entry. Returns the absolute entry offset.
    pub fn add_root_file(&mut self, name: &str, chain: &[u32], size: u32) -> u64 {
        for w in chain.windows(2) {
            self.set_fat_entry(w[0], w[1] as u16);
        }
        if let Some(&last) = chain.last() {
            self.set_fat_entry(last, 0xFFFF);
        }
        for &cluster in chain {
            let off = self.cluster_offset(cluster) as usize;
            self.data[off..off + 4].copy_from_slice(b"DATA");
        }

        let entry_offset = self.root_dir_offset + self.root_entry_cursor * 32;
        self.root_entry_cursor += 1;
        write_short_entry(
            &mut self.data,
            entry_offset as usize,
            name,
            0x20,
            chain.first().copied().unwrap_or(0),
            size,
        );
        entry_offset as u64
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::parse(&self.data[..512]).unwrap()
    }

    pub fn finish(self) -> (MemDevice, u32) {
        let serial = self.serial;
        (MemDevice::new(self.data), serial)
    }
}

fn write_common_bpb(
    data: &mut [u8],
    total_sectors: u32,
    fat_sectors: u32,
    root_entries: u16,
    serial: u32,
) {
    data[0x0B..0x0D].copy_from_slice(&BYTES_PER_SECTOR.to_le_bytes()[..2]);
    data[0x0D] = 1; // sectors per cluster
    data[0x0E..0x10].copy_from_slice(&(RESERVED_SECTORS as u16).to_le_bytes());
    data[0x10] = 1; // fat_count
    data[0x11..0x13].copy_from_slice(&root_entries.to_le_bytes());
    data[0x13..0x15].copy_from_slice(&(total_sectors as u16).to_le_bytes());
    data[0x16..0x18].copy_from_slice(&(fat_sectors as u16).to_le_bytes());
    data[0x27..0x2B].copy_from_slice(&serial.to_le_bytes());
    data[510] = 0x55;
    data[511] = 0xAA;
}

fn write_short_entry(
    data: &mut [u8],
    offset: usize,
    name: &str,
    attr: u8,
    first_cluster: u32,
    size: u32,
) {
    let (stem, ext) = name.split_once('.').unwrap_or((name, ""));
    let mut name_field = [b' '; 8];
    name_field[..stem.len()].copy_from_slice(stem.as_bytes());
    let mut ext_field = [b' '; 3];
    ext_field[..ext.len()].copy_from_slice(ext.as_bytes());

    data[offset..offset + 8].copy_from_slice(&name_field);
    data[offset + 8..offset + 11].copy_from_slice(&ext_field);
    data[offset + 0x0B] = attr;
    data[offset + 0x14..offset + 0x16].copy_from_slice(&((first_cluster >> 16) as u16).to_le_bytes());
    data[offset + 0x1A..offset + 0x1C].copy_from_slice(&((first_cluster & 0xFFFF) as u16).to_le_bytes());
    data[offset + 0x1C..offset + 0x20].copy_from_slice(&size.to_le_bytes());
}

/// FAT32 counterpart of [`VolumeBuilder`]: root directory and any
/// subdirectories live in the cluster heap rather than a fixed region, so
/// entries are added against an explicit directory cluster.
const FAT32_MIN_CLUSTERS: u32 = 65_525;
const FAT32_FAT_SECTORS: u32 = 600;

pub struct Fat32VolumeBuilder {
    data: Vec<u8>,
    fat_offset: u32,
    data_offset: u32,
    serial: u32,
    root_cluster: u32,
    entry_cursor: std::collections::HashMap<u32, u32>,
}

impl Fat32VolumeBuilder {
    pub fn new(serial: u32) -> Self {
        let root_cluster = 2;
        let total_sectors = RESERVED_SECTORS + FAT32_FAT_SECTORS + FAT32_MIN_CLUSTERS + 16;
        let mut data = vec![0u8; (total_sectors * BYTES_PER_SECTOR) as usize];

        data[0x0B..0x0D].copy_from_slice(&(BYTES_PER_SECTOR as u16).to_le_bytes());
        data[0x0D] = 1; // sectors per cluster
        data[0x0E..0x10].copy_from_slice(&(RESERVED_SECTORS as u16).to_le_bytes());
        data[0x10] = 1; // fat_count
        data[0x11..0x13].copy_from_slice(&0u16.to_le_bytes()); // root_entry_count = 0
        data[0x13..0x15].copy_from_slice(&0u16.to_le_bytes()); // total_sectors_16 = 0
        data[0x16..0x18].copy_from_slice(&0u16.to_le_bytes()); // fat_size_16 = 0
        data[0x20..0x24].copy_from_slice(&total_sectors.to_le_bytes());
        data[0x24..0x28].copy_from_slice(&FAT32_FAT_SECTORS.to_le_bytes());
        data[0x2C..0x30].copy_from_slice(&root_cluster.to_le_bytes());
        data[0x43..0x47].copy_from_slice(&serial.to_le_bytes());
        data[510] = 0x55;
        data[511] = 0xAA;

        let fat_offset = RESERVED_SECTORS * BYTES_PER_SECTOR;
        let data_offset = fat_offset + FAT32_FAT_SECTORS * BYTES_PER_SECTOR;

        let mut builder = Self {
            data,
            fat_offset,
            data_offset,
            serial,
            root_cluster,
            entry_cursor: std::collections::HashMap::new(),
        };
        builder.set_fat_entry(root_cluster, 0xFFFF);
        builder
    }

    pub fn root_cluster(&self) -> u32 {
        self.root_cluster
    }

    fn cluster_offset(&self, cluster: u32) -> u32 {
        self.data_offset + (cluster - 1) * BYTES_PER_SECTOR
    }

    pub fn set_fat_entry(&mut self, cluster: u32, value: u16) -> &mut Self {
        let off = (self.fat_offset + cluster * 2) as usize;
        self.data[off..off + 2].copy_from_slice(&value.to_le_bytes());
        self
    }

    /// Add a subdirectory entry under `parent_cluster`, backed by a fresh
    /// single-cluster chain at `dir_cluster`. Returns `dir_cluster` for
    /// chaining further `add_file`/`add_dir` calls against it.
    pub fn add_dir(&mut self, parent_cluster: u32, name: &str, dir_cluster: u32) -> u32 {
        self.set_fat_entry(dir_cluster, 0xFFFF);
        let entry_offset = self.next_entry_offset(parent_cluster);
        write_short_entry(&mut self.data, entry_offset as usize, name, 0x10, dir_cluster, 0);
        dir_cluster
    }

    /// Add a file entry (possibly fragmented, per `chain`) under
    /// `parent_cluster`. Returns the absolute directory-entry offset.
    pub fn add_file(&mut self, parent_cluster: u32, name: &str, chain: &[u32], size: u32) -> u64 {
        for w in chain.windows(2) {
            self.set_fat_entry(w[0], w[1] as u16);
        }
        if let Some(&last) = chain.last() {
            self.set_fat_entry(last, 0xFFFF);
        }
        for &cluster in chain {
            let off = self.cluster_offset(cluster) as usize;
            self.data[off..off + 4].copy_from_slice(b"DATA");
        }
        let entry_offset = self.next_entry_offset(parent_cluster);
        write_short_entry(
            &mut self.data,
            entry_offset as usize,
            name,
            0x20,
            chain.first().copied().unwrap_or(0),
            size,
        );
        entry_offset as u64
    }

    fn next_entry_offset(&mut self, dir_cluster: u32) -> u32 {
        let slot = self.entry_cursor.entry(dir_cluster).or_insert(0);
        let offset = self.cluster_offset(dir_cluster) + *slot * 32;
        *slot += 1;
        offset
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::parse(&self.data[..512]).unwrap()
    }

    pub fn finish(self) -> (MemDevice, u32) {
        let serial = self.serial;
        (MemDevice::new(self.data), serial)
    }
}
