//! Row diff between the on-screen frame and the next one

use heapless::Vec;

use crate::config::{PanelGeometry, MAX_REGIONS};
use crate::partial::RegionDescriptor;

/// Result of comparing two formatted frames
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowDiff {
    /// Every row is identical
    Unchanged,
    /// Changed rows as a region list
    Regions {
        regions: Vec<RegionDescriptor, MAX_REGIONS>,
        changed_lines: u32,
    },
    /// More runs of changed rows than a partial update can carry
    Fragmented { changed_lines: u32 },
}

impl RowDiff {
    /// Number of rows that differ
    pub fn changed_lines(&self) -> u32 {
        match self {
            RowDiff::Unchanged => 0,
            RowDiff::Regions { changed_lines, .. } | RowDiff::Fragmented { changed_lines } => {
                *changed_lines
            }
        }
    }
}

/// Compare `next` against `current` row by row
pub fn diff_rows(current: &[u8], next: &[u8], geometry: &PanelGeometry) -> RowDiff {
    let line_bytes = geometry.line_bytes();
    let rows = current
        .chunks_exact(line_bytes)
        .zip(next.chunks_exact(line_bytes))
        .take(geometry.lines as usize);

    let mut regions: Vec<RegionDescriptor, MAX_REGIONS> = Vec::new();
    let mut fragmented = false;
    let mut changed_lines = 0u32;
    let mut skip = 0u16;
    let mut change = 0u16;

    for (old, new) in rows {
        if old != new {
            change += 1;
            changed_lines += 1;
            continue;
        }
        if change > 0 {
            fragmented |= regions.push(RegionDescriptor { skip, change }).is_err();
            skip = 0;
            change = 0;
        }
        skip += 1;
    }
    if change > 0 {
        fragmented |= regions.push(RegionDescriptor { skip, change }).is_err();
    }

    if changed_lines == 0 {
        RowDiff::Unchanged
    } else if fragmented {
        RowDiff::Fragmented { changed_lines }
    } else {
        RowDiff::Regions {
            regions,
            changed_lines,
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::vec;

    fn geometry() -> PanelGeometry {
        PanelGeometry { width: 8, lines: 40 }
    }

    fn touch(frame: &mut [u8], line: usize) {
        frame[line * 8] ^= 0xFF;
    }

    #[test]
    fn test_identical_frames() {
        let frame = vec![7u8; 320];
        assert_eq!(diff_rows(&frame, &frame, &geometry()), RowDiff::Unchanged);
    }

    #[test]
    fn test_runs_become_regions() {
        let current = vec![0u8; 320];
        let mut next = current.clone();
        for line in [0, 1, 5, 6, 7, 39] {
            touch(&mut next, line);
        }

        let (regions, changed_lines) = match diff_rows(&current, &next, &geometry()) {
            RowDiff::Regions {
                regions,
                changed_lines,
            } => (regions, changed_lines),
            other => panic!("expected regions, got {:?}", other),
        };
        assert_eq!(changed_lines, 6);
        assert_eq!(
            regions.as_slice(),
            &[
                RegionDescriptor::new(0, 2),
                RegionDescriptor::new(3, 3),
                RegionDescriptor::new(31, 1),
            ]
        );
    }

    #[test]
    fn test_too_many_runs() {
        let current = vec![0u8; 320];
        let mut next = current.clone();
        for line in (0..40).step_by(2) {
            touch(&mut next, line);
        }
        assert_eq!(
            diff_rows(&current, &next, &geometry()),
            RowDiff::Fragmented { changed_lines: 20 }
        );
    }
}
