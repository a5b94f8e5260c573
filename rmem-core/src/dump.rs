//! Diagnostic snapshots of the pool.
//!
//! After every mutating pool operation a human-readable text file is
//! written to the dump directory. Nothing reads these files back; they
//! exist to inspect the block table and the layout of the first bytes of
//! the pool while the server runs.

use crate::pool::Block;
use chrono::{DateTime, Local};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Number of leading pool bytes drawn in the memory map.
pub const MAP_BYTES: usize = 100;

/// Cells per line in the memory map.
const MAP_WIDTH: usize = 10;

const RULE: &str = "-------------------------------------------------------------------------";

/// Writes snapshot files into a directory.
#[derive(Debug)]
pub struct DumpWriter {
    directory: PathBuf,
    /// Disambiguates snapshots taken within the same millisecond.
    sequence: AtomicU64,
}

impl DumpWriter {
    /// Create a writer for an existing directory.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            sequence: AtomicU64::new(0),
        }
    }

    /// Write a snapshot of the given table.
    ///
    /// Failures are logged and otherwise ignored: a missing snapshot never
    /// fails the pool operation that triggered it.
    pub fn write(&self, capacity: usize, blocks: &[&Block]) -> Option<PathBuf> {
        let now = Local::now();
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let path = self.directory.join(dump_file_name(&now, seq));

        match std::fs::write(&path, render_dump(&now, capacity, blocks)) {
            Ok(()) => {
                tracing::trace!(path = %path.display(), "Memory dump written");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to write memory dump");
                None
            }
        }
    }
}

/// File name for a snapshot taken at `now`.
pub fn dump_file_name(now: &DateTime<Local>, seq: u64) -> String {
    format!("mem_dump_{}_{:06}.txt", now.format("%Y%m%d_%H%M%S_%3f"), seq)
}

/// Render the snapshot text.
///
/// Blocks are listed in id order. The memory map shows, for each of the
/// first [`MAP_BYTES`] bytes, the id of the in-use block covering it or an
/// empty cell.
pub fn render_dump(now: &DateTime<Local>, capacity: usize, blocks: &[&Block]) -> String {
    let mut sorted: Vec<&Block> = blocks.to_vec();
    sorted.sort_by_key(|b| b.id);

    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(out, "Memory Dump - {}\n", now.format("%Y-%m-%d %H:%M:%S%.3f"));
    let _ = writeln!(out, "Total Memory: {} bytes", capacity);
    let _ = writeln!(out, "Block Count: {}\n", sorted.len());

    let _ = writeln!(out, "Blocks:\n{RULE}");
    let _ = writeln!(out, "ID\tOffset\tSize\tType\tRef Count\tStatus\n{RULE}");
    for block in &sorted {
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t\t{}",
            block.id.as_i32(),
            block.offset.as_usize(),
            block.size,
            block.type_tag,
            block.ref_count,
            if block.in_use { "In Use" } else { "Free" }
        );
    }
    let _ = writeln!(out, "{RULE}\n");

    let _ = writeln!(out, "Memory Map (first {} bytes):\n{RULE}", capacity.min(MAP_BYTES));
    for pos in 0..capacity.min(MAP_BYTES) {
        match sorted.iter().find(|b| b.in_use && b.contains(pos)) {
            Some(block) => {
                let _ = write!(out, "[{}]", block.id.as_i32());
            }
            None => out.push_str("[ ]"),
        }
        if (pos + 1) % MAP_WIDTH == 0 {
            out.push('\n');
        }
    }

    out
}
