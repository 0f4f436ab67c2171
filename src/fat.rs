//! FAT Table Cache.
//!
//! The first FAT copy is read once at open and kept in memory as a single
//! [`ByteBuffer`]; every chain walk and allocation decision works against
//! this cache. [`FatTable::flush`] is the only place that writes the FAT
//! back to disk, replicating it to every mirror.
//!
//! Every entry is addressed as a 16-bit little-endian value at `cluster*2`,
//! uniformly across FAT12/16/32 (see the note in [`crate::engine`]).

use crate::bpb::Geometry;
use crate::byte_buffer::ByteBuffer;
use crate::device::Device;
use crate::error::Result;
use crate::{END_OF_CHAIN, FREE_CLUSTER};

pub struct FatTable {
    buffer: ByteBuffer,
    fat_offset: u32,
    fat_size: u32,
    fat_count: u32,
}

impl FatTable {
    /// Load the first FAT copy from `device` into memory.
    pub fn load(device: &mut dyn Device, geometry: &Geometry) -> Result<Self> {
        let mut buffer = ByteBuffer::with_len(geometry.fat_size as usize);
        device.read_at(geometry.fat_offset as u64, buffer.as_mut_slice())?;
        log::debug!(
            "loaded FAT: offset={} size={} mirrors={}",
            geometry.fat_offset,
            geometry.fat_size,
            geometry.fat_count
        );
        Ok(Self {
            buffer,
            fat_offset: geometry.fat_offset,
            fat_size: geometry.fat_size,
            fat_count: geometry.fat_count,
        })
    }

    /// Entry for `cluster`.
    pub fn next(&self, cluster: u32) -> u16 {
        self.buffer
            .read_u16(cluster as usize * 2)
            .expect("cluster index within cached FAT bounds")
    }

    /// Overwrite the entry for `cluster`.
    pub fn set(&mut self, cluster: u32, value: u16) {
        self.buffer
            .write_u16(value, cluster as usize * 2)
            .expect("cluster index within cached FAT bounds");
    }

    pub fn is_free(&self, cluster: u32) -> bool {
        self.next(cluster) == FREE_CLUSTER
    }

    pub fn is_end_of_chain(&self, entry: u16) -> bool {
        entry == END_OF_CHAIN
    }

    /// Walk the chain starting at `start`, collecting every cluster visited.
    pub fn chain(&self, start: u32) -> Vec<u32> {
        let mut clusters = Vec::new();
        if start == 0 {
            return clusters;
        }
        let mut cluster = start;
        loop {
            clusters.push(cluster);
            let entry = self.next(cluster);
            if self.is_end_of_chain(entry) || entry == FREE_CLUSTER {
                break;
            }
            cluster = entry as u32;
        }
        clusters
    }

    /// Write the cached FAT out to every mirror on `device`.
    pub fn flush(&self, device: &mut dyn Device) -> Result<()> {
        for i in 0..self.fat_count {
            let offset = self.fat_offset as u64 + i as u64 * self.fat_size as u64;
            device.write_at(offset, self.buffer.as_slice())?;
        }
        log::debug!("flushed FAT to {} mirror(s)", self.fat_count);
        Ok(())
    }

    pub fn last_cluster_index(&self) -> u32 {
        (self.fat_size / 2).saturating_sub(1)
    }
}
