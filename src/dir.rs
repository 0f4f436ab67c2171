//! Directory Walker.
//!
//! Parses a single directory buffer — the fixed root region on FAT12/16, or
//! one cluster's worth of bytes elsewhere — into the [`FileInfo`] entries it
//! contains. Does not itself walk cluster chains; callers supply one
//! buffer at a time and the absolute device offset it came from, so that
//! [`FileInfo::entry_offset`] is always meaningful.

use crate::entry::{FileInfo, FileKind, ShortDirEntry};
use crate::error::Result;
use crate::DIRENT_SIZE;

/// Parse every valid entry out of `buf`. `base_offset` is the absolute
/// device byte address of `buf[0]`, used to compute each entry's
/// `entry_offset`. Stops at the first end-of-directory marker.
pub fn scan(buf: &[u8], base_offset: u64, partition_serial: u32) -> Result<Vec<FileInfo>> {
    let mut entries = Vec::new();
    let mut offset = 0;
    while offset + DIRENT_SIZE <= buf.len() {
        let raw = ShortDirEntry::parse(&buf[offset..offset + DIRENT_SIZE])?;
        if raw.is_end_marker() {
            break;
        }
        if !raw.is_free() && !raw.is_dot_entry() && raw.kind() != FileKind::None {
            entries.push(FileInfo {
                partition_serial,
                kind: raw.kind(),
                first_cluster: raw.first_cluster,
                size: raw.size,
                entry_offset: base_offset + offset as u64,
                name: raw.short_name(),
            });
        }
        offset += DIRENT_SIZE;
    }
    Ok(entries)
}

/// Linear case-sensitive search for `name` within `buf`. Returns as soon as
/// an exact short-name match is found.
pub fn search(
    buf: &[u8],
    base_offset: u64,
    partition_serial: u32,
    name: &str,
) -> Result<Option<FileInfo>> {
    Ok(scan(buf, base_offset, partition_serial)?
        .into_iter()
        .find(|f| f.name == name))
}
