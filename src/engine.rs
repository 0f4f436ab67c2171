//! Defragmentation Engine.
//!
//! Chain analysis, free-space search, relocation, FAT patching, directory
//! entry patching, and directory recursion. This is the only module that
//! writes to the volume.

use crate::bpb::{FatType, Geometry};
use crate::device::Device;
use crate::dir;
use crate::entry::{FileInfo, FileKind, ShortDirEntry};
use crate::error::Result;
use crate::fat::FatTable;
use crate::path::{read_dir_buffers, Location};
use crate::{END_OF_CHAIN, FIRST_DATA_CLUSTER, LAST_DATA_CLUSTER};

/// Number of contiguous runs in `file`'s chain; 0 means the chain is a
/// single run (not fragmented).
pub fn is_fragmented(fat: &FatTable, file: &FileInfo) -> u32 {
    let chain = fat.chain(file.first_cluster);
    if chain.len() < 2 {
        return 0;
    }
    let mut fragments = 0;
    for pair in chain.windows(2) {
        if pair[1] != pair[0] + 1 {
            fragments += 1;
        }
    }
    if fragments > 0 {
        fragments + 1
    } else {
        0
    }
}

pub fn count_clusters(fat: &FatTable, file: &FileInfo) -> u32 {
    fat.chain(file.first_cluster).len() as u32
}

/// Scan the FAT cache for the first run of `n` consecutive free clusters in
/// `[FIRST_DATA_CLUSTER, LAST_DATA_CLUSTER]`. Returns 0 if none exists.
///
/// Starts the scan at cluster 2 rather than reproducing the source's
/// off-by-one start at cluster 3 (see SPEC_FULL.md Open Questions).
pub fn find_contiguous_free(fat: &FatTable, n: u32) -> u32 {
    if n == 0 {
        return 0;
    }
    let last = LAST_DATA_CLUSTER.min(fat.last_cluster_index());
    let mut run_start = 0;
    let mut run_len = 0;
    for cluster in FIRST_DATA_CLUSTER..=last {
        if fat.is_free(cluster) {
            if run_len == 0 {
                run_start = cluster;
            }
            run_len += 1;
            if run_len == n {
                return run_start;
            }
        } else {
            run_len = 0;
        }
    }
    0
}

fn cluster_copy(
    device: &mut dyn Device,
    geometry: &Geometry,
    src_cluster: u32,
    dst_cluster: u32,
) -> Result<()> {
    let mut buf = vec![0u8; geometry.cluster_size as usize];
    device.read_at(geometry.cluster_offset(src_cluster), &mut buf)?;
    device.write_at(geometry.cluster_offset(dst_cluster), &buf)?;
    Ok(())
}

/// Relocate a single fragmented file into a contiguous run. Returns 1 if
/// relocated, 0 if already contiguous, refused (wrong partition / not a
/// plain file), or no sufficiently large free run exists.
fn defragment_file(
    device: &mut dyn Device,
    geometry: &Geometry,
    fat: &mut FatTable,
    file: &mut FileInfo,
) -> Result<u32> {
    if file.partition_serial != geometry.serial_number {
        log::warn!("refusing foreign-partition file handle");
        return Ok(0);
    }
    if file.kind != FileKind::File {
        return Ok(0);
    }
    if is_fragmented(fat, file) == 0 {
        return Ok(0);
    }

    let source_chain = fat.chain(file.first_cluster);
    let n = source_chain.len() as u32;
    let dest = find_contiguous_free(fat, n);
    if dest == 0 {
        log::warn!(
            "no contiguous run of {n} free clusters for '{}'",
            file.name
        );
        return Ok(0);
    }

    for (i, &src) in source_chain.iter().enumerate() {
        let dst = dest + i as u32;
        cluster_copy(device, geometry, src, dst)?;
        let next = if i as u32 + 1 < n {
            dest + i as u32 + 1
        } else {
            END_OF_CHAIN as u32
        };
        fat.set(dst, next as u16);
    }

    for cluster in &source_chain {
        fat.set(*cluster, 0);
    }

    fat.flush(device)?;

    for (offset, value) in ShortDirEntry::encode_first_cluster(dest) {
        device.write_at(
            file.entry_offset + offset as u64,
            &value.to_le_bytes(),
        )?;
    }

    log::info!(
        "relocated '{}': {} clusters, {} -> {}",
        file.name,
        n,
        file.first_cluster,
        dest
    );
    file.first_cluster = dest;
    Ok(1)
}

/// Defragment `file`. Recurses into directories (including the root
/// directory); a plain file is relocated directly. Returns the number of
/// files actually relocated.
pub fn defragment(
    device: &mut dyn Device,
    geometry: &Geometry,
    fat: &mut FatTable,
    file: &mut FileInfo,
) -> Result<u32> {
    match file.kind {
        FileKind::None => Ok(0),
        FileKind::File => defragment_file(device, geometry, fat, file),
        FileKind::Dir | FileKind::RootDir => defragment_directory(device, geometry, fat, file),
    }
}

fn defragment_directory(
    device: &mut dyn Device,
    geometry: &Geometry,
    fat: &mut FatTable,
    dir_file: &mut FileInfo,
) -> Result<u32> {
    let location = if dir_file.kind == FileKind::RootDir && geometry.fat_type != FatType::Fat32 {
        Location::FixedRoot {
            offset: geometry.root_dir_offset as u64,
            size: geometry.root_dir_size,
        }
    } else {
        Location::Cluster(dir_file.first_cluster)
    };

    let buffers = read_dir_buffers(device, geometry, &location, fat)?;
    let mut relocated = 0;
    for (buf, base_offset) in &buffers {
        for mut child in dir::scan(buf, *base_offset, geometry.serial_number)? {
            relocated += defragment(device, geometry, fat, &mut child)?;
        }
    }
    Ok(relocated)
}
