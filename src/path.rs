//! Path Resolver.
//!
//! Resolves a `/`-separated absolute path to a [`FileInfo`] by repeated
//! directory search, switching from the fixed root region (FAT12/16) to
//! cluster-chain addressing as soon as it descends past the root.

use crate::bpb::{FatType, Geometry};
use crate::dir;
use crate::entry::{FileInfo, FileKind};
use crate::error::Result;
use crate::fat::FatTable;
use crate::device::Device;

pub(crate) enum Location {
    FixedRoot { offset: u64, size: u32 },
    Cluster(u32),
}

pub(crate) fn read_dir_buffers(
    device: &mut dyn Device,
    geometry: &Geometry,
    location: &Location,
    fat: &FatTable,
) -> Result<Vec<(Vec<u8>, u64)>> {
    match location {
        Location::FixedRoot { offset, size } => {
            let mut buf = vec![0u8; *size as usize];
            device.read_at(*offset, &mut buf)?;
            Ok(vec![(buf, *offset)])
        }
        Location::Cluster(start) => {
            let mut out = Vec::new();
            for cluster in fat.chain(*start) {
                let offset = geometry.cluster_offset(cluster);
                let mut buf = vec![0u8; geometry.cluster_size as usize];
                device.read_at(offset, &mut buf)?;
                out.push((buf, offset));
            }
            Ok(out)
        }
    }
}

/// Resolve `path` against the open volume. Returns a [`FileKind::None`]
/// handle rather than an error when the path does not exist.
pub fn resolve(
    device: &mut dyn Device,
    geometry: &Geometry,
    fat: &FatTable,
    path: &str,
) -> Result<FileInfo> {
    let serial = geometry.serial_number;

    if path == "/" || path.is_empty() {
        return Ok(FileInfo::root(serial, geometry.root_dir_cluster));
    }

    let mut location = if geometry.fat_type == FatType::Fat32 {
        Location::Cluster(geometry.root_dir_cluster)
    } else {
        Location::FixedRoot {
            offset: geometry.root_dir_offset as u64,
            size: geometry.root_dir_size,
        }
    };

    let mut found = FileInfo::root(serial, geometry.root_dir_cluster);
    let components: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    for (i, component) in components.iter().enumerate() {
        if component.is_empty() {
            continue;
        }
        let buffers = read_dir_buffers(device, geometry, &location, fat)?;
        let mut hit = None;
        for (buf, base_offset) in &buffers {
            if let Some(f) = dir::search(buf, *base_offset, serial, component)? {
                hit = Some(f);
                break;
            }
        }

        let Some(f) = hit else {
            log::debug!("path component '{component}' not found");
            return Ok(FileInfo::none(serial));
        };

        let is_last = i == components.len() - 1;
        if !is_last && !f.is_dir() {
            return Ok(FileInfo::none(serial));
        }
        if f.is_dir() {
            location = Location::Cluster(f.first_cluster);
        }
        found = f;
    }

    if found.kind == FileKind::None {
        log::debug!("path '{path}' resolved to no entry");
    }
    Ok(found)
}
