//! Video cart page geometry
//!
//! A video cart is a sequence of 8KB pages. Page 0 is program code. Every
//! later page carries interleaved video and sound data starting at offset
//! 32: four repetitions of a 192-subgroup pattern group followed by its
//! matching color group, with a sound byte after every 4 data bytes and
//! between groups. All offset arithmetic for that layout lives here.

/// Fixed size of one cartridge page
pub const PAGE_SIZE: usize = 8192;

/// Header/reserved bytes at the top of each page
pub const PAGE_HEADER_LEN: usize = 32;

/// First 16 bytes of video page 1; anything else is not a video cart
pub const MAGIC: [u8; 16] = [
    0xAA, 0x01, 0x02, 0x00, 0x00, 0x00, 0x60, 0x0C,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x60, 0x1C,
];

/// Pattern/color group pairs per page
pub const BLOCKS_PER_PAGE: usize = 4;

/// Subgroups in one pattern (or color) group
pub const SUBGROUPS_PER_GROUP: usize = 192;

/// Data bytes per subgroup; a sound byte follows each subgroup
pub const BYTES_PER_SUBGROUP: usize = 4;

/// Distance between consecutive subgroup starts
pub const SUBGROUP_STRIDE: usize = BYTES_PER_SUBGROUP + 1;

/// Length of one group (pattern or color) including interleaved sound bytes
pub const GROUP_LEN: usize = SUBGROUPS_PER_GROUP * SUBGROUP_STRIDE;

/// Offset from a pattern byte to its paired color byte: one group plus the
/// sound byte separating the two groups
pub const COLOR_DELTA: usize = GROUP_LEN + 1;

/// First pattern byte of a page, past the header and the leading sound byte
pub const FIRST_PATTERN_OFFSET: usize = PAGE_HEADER_LEN + 1;

/// Distance between consecutive pattern-group starts: pattern group, sound
/// byte, color group, sound byte
pub const BLOCK_STRIDE: usize = 2 * (GROUP_LEN + 1);

/// Pattern/color cell pairs per page
pub const CELLS_PER_PAGE: usize = BLOCKS_PER_PAGE * SUBGROUPS_PER_GROUP * BYTES_PER_SUBGROUP;

/// One pattern byte and its paired color byte, as offsets into a page
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Cell {
    pub pattern: usize,
    pub color: usize,
}

/// Every cell of a page in layout order (block, subgroup, byte). Sound
/// bytes are never yielded.
pub fn cells() -> impl Iterator<Item = Cell> {
    (0..BLOCKS_PER_PAGE).flat_map(|block| {
        let group_start = FIRST_PATTERN_OFFSET + block * BLOCK_STRIDE;
        (0..SUBGROUPS_PER_GROUP).flat_map(move |subgroup| {
            let subgroup_start = group_start + subgroup * SUBGROUP_STRIDE;
            (0..BYTES_PER_SUBGROUP).map(move |byte| {
                let pattern = subgroup_start + byte;
                Cell {
                    pattern,
                    color: pattern + COLOR_DELTA,
                }
            })
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn cell_count_matches_layout() {
        assert_eq!(CELLS_PER_PAGE, 3072);
        assert_eq!(cells().count(), CELLS_PER_PAGE);
    }

    #[test]
    fn all_offsets_in_bounds() {
        for cell in cells() {
            assert!(cell.pattern < PAGE_SIZE);
            assert!(cell.color < PAGE_SIZE);
            assert_eq!(cell.color, cell.pattern + COLOR_DELTA);
        }
    }

    #[test]
    fn first_and_last_cells() {
        let first = cells().next().unwrap();
        assert_eq!(first.pattern, 33);
        assert_eq!(first.color, 33 + 961);

        let last = cells().last().unwrap();
        assert_eq!(last.pattern, FIRST_PATTERN_OFFSET + 3 * BLOCK_STRIDE + 191 * SUBGROUP_STRIDE + 3);
        assert!(last.color < PAGE_SIZE);
    }

    #[test]
    fn offsets_are_disjoint_and_unique() {
        let patterns: HashSet<usize> = cells().map(|c| c.pattern).collect();
        let colors: HashSet<usize> = cells().map(|c| c.color).collect();
        assert_eq!(patterns.len(), CELLS_PER_PAGE);
        assert_eq!(colors.len(), CELLS_PER_PAGE);
        assert!(patterns.is_disjoint(&colors));
    }

    #[test]
    fn sound_bytes_never_addressed() {
        // Sound bytes sit at offset 32, after every 4th data byte within a
        // group, and between groups.
        let mut is_sound = [false; PAGE_SIZE];
        is_sound[PAGE_HEADER_LEN] = true;
        for block in 0..BLOCKS_PER_PAGE {
            for half in 0..2 {
                let group_start = FIRST_PATTERN_OFFSET + block * BLOCK_STRIDE + half * COLOR_DELTA;
                for subgroup in 0..SUBGROUPS_PER_GROUP {
                    is_sound[group_start + subgroup * SUBGROUP_STRIDE + BYTES_PER_SUBGROUP] = true;
                }
                is_sound[group_start + GROUP_LEN] = true;
            }
        }
        for cell in cells() {
            assert!(!is_sound[cell.pattern], "pattern offset {} is a sound byte", cell.pattern);
            assert!(!is_sound[cell.color], "color offset {} is a sound byte", cell.color);
        }
    }

    #[test]
    fn header_never_addressed() {
        for cell in cells() {
            assert!(cell.pattern > PAGE_HEADER_LEN);
        }
    }
}
