//! Page-by-page despeckle pass over a video cart file
//!
//! Speckling happens because the 9918A picks up new pattern bits while the
//! matching color byte still holds the previous frame's value (or the other
//! way around). The intermediate image is wrong for exactly as many pixels
//! as changed in the pattern byte, so the pass minimizes per-cell pattern
//! churn between consecutive pages: whenever inverting a pattern byte
//! disagrees with the previous page in strictly fewer bit positions than
//! keeping it, the byte is inverted and the paired color byte's nibbles are
//! swapped. Inverted pattern + swapped fg/bg nibbles renders identically,
//! so the final frame is unchanged; only the transient improves.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, trace};
use thiserror::Error;

use crate::layout::{self, CELLS_PER_PAGE, MAGIC, PAGE_SIZE};

#[derive(Debug, Error)]
pub enum PatchError {
    #[error("failed to open '{path}' for read-write: {source}")]
    Open { path: PathBuf, source: io::Error },

    /// The file ends before the page is complete. Fatal only for page 1;
    /// for later pages a short read is the normal end of the cart.
    #[error("cart too short, no complete video page at index {page}")]
    Truncated { page: usize },

    #[error("failed to read page {page}: {source}")]
    Read { page: usize, source: io::Error },

    /// Magic-header mismatch on page 1. Deliberate safety gate so the tool
    /// can't chew up a cart that doesn't hold video data.
    #[error("this doesn't look like a video cart (bad magic in page 1)")]
    Format,

    #[error("failed to write page {page}: {source}")]
    Write { page: usize, source: io::Error },
}

/// Counters accumulated over one run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    /// Video pages read: the baseline page plus every later page
    pub pages: u64,
    /// Cells rewritten as inverted pattern + swapped color nibbles
    pub patched: u64,
    /// Net pixel toggles removed across all patches
    pub pixels_saved: u64,
    /// Pixel comparisons made, 8 per cell examined
    pub pixels_total: u64,
}

impl Stats {
    /// Share of compared pixels whose toggling was removed, rounded to the
    /// nearest percent
    pub fn percent_saved(&self) -> u32 {
        if self.pixels_total == 0 {
            return 0;
        }
        (self.pixels_saved as f64 * 100.0 / self.pixels_total as f64).round() as u32
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Process complete after {} pages, {} patches fixing {} pixels out of {} ({}%).",
            self.pages,
            self.patched,
            self.pixels_saved,
            self.pixels_total,
            self.percent_saved()
        )
    }
}

/// What one page's despeckle pass did
#[derive(Debug, Default, Clone, Copy)]
struct PageDelta {
    patched: u64,
    pixels_saved: u64,
}

/// Despeckles a video cart file in place.
///
/// Owns the file handle and both page buffers; the handle closes when the
/// patcher drops, on every exit path.
pub struct Patcher {
    file: File,
    cur: Box<[u8; PAGE_SIZE]>,
    prev: Box<[u8; PAGE_SIZE]>,
    stats: Stats,
}

impl Patcher {
    /// Open `path` for read-modify-write. Nothing is read or written yet.
    pub fn open(path: &Path) -> Result<Self, PatchError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| PatchError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            file,
            cur: Box::new([0; PAGE_SIZE]),
            prev: Box::new([0; PAGE_SIZE]),
            stats: Stats::default(),
        })
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Run the whole pass: validate page 1, then patch pages 2.. against
    /// their (already-patched) predecessors until the cart runs out.
    ///
    /// Page 0 is program code and page 1 is the baseline; neither is ever
    /// written. On a mid-run error the stats cover the pages processed so
    /// far.
    pub fn run(&mut self) -> Result<(), PatchError> {
        // Page 1 is the first video page; there's nothing to compare it to.
        if !self.read_page(1)? {
            return Err(PatchError::Truncated { page: 1 });
        }
        if self.cur[..MAGIC.len()] != MAGIC {
            return Err(PatchError::Format);
        }
        self.stats.pages = 1;

        let mut page = 1;
        loop {
            page += 1;
            // The current page becomes the comparison baseline. A swap is
            // enough: a successful read overwrites the whole new current
            // buffer, and on EOF the loop stops.
            std::mem::swap(&mut self.prev, &mut self.cur);
            if !self.read_page(page)? {
                break;
            }
            self.stats.pages += 1;

            let delta = patch_page(&self.prev, &mut self.cur);
            debug!("page {}: {} of {} cells patched", page, delta.patched, CELLS_PER_PAGE);
            self.stats.patched += delta.patched;
            self.stats.pixels_saved += delta.pixels_saved;
            self.stats.pixels_total += (8 * CELLS_PER_PAGE) as u64;

            if delta.patched > 0 {
                self.write_page(page)?;
            }
        }
        Ok(())
    }

    /// Read the page at `index` into the current buffer. `Ok(false)` means
    /// the cart ended (clean short read); anything else failing is a real
    /// I/O error.
    fn read_page(&mut self, index: usize) -> Result<bool, PatchError> {
        self.file
            .seek(SeekFrom::Start((index * PAGE_SIZE) as u64))
            .map_err(|source| PatchError::Read { page: index, source })?;
        match self.file.read_exact(&mut self.cur[..]) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
            Err(source) => Err(PatchError::Read { page: index, source }),
        }
    }

    /// Flush the current buffer back over the page at `index`.
    fn write_page(&mut self, index: usize) -> Result<(), PatchError> {
        self.file
            .seek(SeekFrom::Start((index * PAGE_SIZE) as u64))
            .and_then(|_| self.file.write_all(&self.cur[..]))
            .map_err(|source| PatchError::Write { page: index, source })
    }
}

/// Patch every cell of `cur` against `prev`, both full pages.
///
/// For each cell the two candidate encodings are the pattern byte as-is and
/// its complement (with the color nibbles swapped to compensate). Whichever
/// disagrees with the previous page in fewer bit positions wins; ties keep
/// the original, since an equal-cost swap buys nothing.
fn patch_page(prev: &[u8; PAGE_SIZE], cur: &mut [u8; PAGE_SIZE]) -> PageDelta {
    let mut delta = PageDelta::default();
    for cell in layout::cells() {
        let old = prev[cell.pattern];
        let new = cur[cell.pattern];
        let cnt = (old ^ new).count_ones();
        let invcnt = (old ^ !new).count_ones();
        if invcnt < cnt {
            trace!(
                "cell @{:#06x}: {:08b} : {:08b} -> {:08b} ({} -> {})",
                cell.pattern, old, new, !new, cnt, invcnt
            );
            cur[cell.pattern] = !new;
            cur[cell.color] = cur[cell.color].rotate_left(4);
            delta.patched += 1;
            delta.pixels_saved += (cnt - invcnt) as u64;
        }
    }
    delta
}
