//! Partial-update timing calculator
//!
//! A partial update walks the panel once but only clocks pixel data into the
//! changed scanlines. The region sequencer consumes a control stream of
//! alternating skip and change counts; an independent deadline sequencer holds
//! the frame signal for exactly as long as that walk takes.
//!
//! Control stream layout, each value biased by -1:
//!
//! ```text
//! [skip_0 - 1] change_0 - 1, skip_1 - 1, change_1 - 1, ..., [trailing - 1]
//! ```
//!
//! When the first region has no skip, a literal `0` stands in for `skip_0 - 1`
//! and the region sequencer is charged with a flag telling it to discard that
//! word. The trailing term is omitted when the last change ends on the last
//! line.

use heapless::Vec;

use crate::charge::Role;
use crate::config::{PanelGeometry, PartialTiming, MAX_REGIONS};

/// Most control words in one plan
pub const MAX_CONTROL_WORDS: usize = 2 * MAX_REGIONS + 1;

/// Deadline ticks per skipped line
const SKIP_TICKS: u32 = 2;

/// Scanlines to leave alone followed by scanlines to rewrite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RegionDescriptor {
    /// Untouched lines before the change
    pub skip: u16,
    /// Lines rewritten
    pub change: u16,
}

impl RegionDescriptor {
    pub const fn new(skip: u16, change: u16) -> Self {
        Self { skip, change }
    }
}

/// Plan error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlanError {
    /// No regions
    Empty,
    /// More than `MAX_REGIONS` regions
    TooManyRegions,
    /// A region changes no lines
    EmptyChange(usize),
    /// A region after the first skips no lines (merge it with its predecessor)
    EmptySkip(usize),
    /// Regions extend past the last line
    Overflow,
}

/// Control stream and deadline for one partial update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialPlan {
    regions: Vec<RegionDescriptor, MAX_REGIONS>,
    control: Vec<u32, MAX_CONTROL_WORDS>,
    opens_with_change: bool,
    trailing: u32,
    changed_lines: u32,
    minimum_ticks: u32,
    deadline: u32,
}

/// Compute the control stream and deadline for a region list
pub fn plan(
    regions: &[RegionDescriptor],
    geometry: &PanelGeometry,
    timing: &PartialTiming,
) -> Result<PartialPlan, PlanError> {
    if regions.is_empty() {
        return Err(PlanError::Empty);
    }
    if regions.len() > MAX_REGIONS {
        return Err(PlanError::TooManyRegions);
    }

    let lines = geometry.lines as u32;
    let opens_with_change = regions[0].skip == 0;
    let mut control = Vec::new();
    let mut covered = 0u32;
    let mut changed_lines = 0u32;
    let mut minimum_ticks = 0u32;

    for (i, region) in regions.iter().enumerate() {
        let skip = region.skip as u32;
        let change = region.change as u32;
        if change == 0 {
            return Err(PlanError::EmptyChange(i));
        }
        if i > 0 && skip == 0 {
            return Err(PlanError::EmptySkip(i));
        }
        covered += skip + change;
        if covered > lines {
            return Err(PlanError::Overflow);
        }

        // Capacity is 2 * MAX_REGIONS + 1 and regions.len() <= MAX_REGIONS
        control
            .push(skip.saturating_sub(1))
            .map_err(|_| PlanError::TooManyRegions)?;
        control
            .push(change - 1)
            .map_err(|_| PlanError::TooManyRegions)?;

        changed_lines += change;
        minimum_ticks += skip * SKIP_TICKS;
        minimum_ticks += (change * 2 + 1) * timing.half_line_width;
    }

    let trailing = lines - covered;
    if trailing > 0 {
        control
            .push(trailing - 1)
            .map_err(|_| PlanError::TooManyRegions)?;
    }
    minimum_ticks += trailing * SKIP_TICKS;

    let lead = if opens_with_change {
        timing.lead_with_change
    } else {
        timing.lead_with_skip
    };
    let deadline = lead + minimum_ticks + 1;

    let mut kept = Vec::new();
    kept.extend_from_slice(regions)
        .map_err(|_| PlanError::TooManyRegions)?;

    Ok(PartialPlan {
        regions: kept,
        control,
        opens_with_change,
        trailing,
        changed_lines,
        minimum_ticks,
        deadline,
    })
}

impl PartialPlan {
    /// Region list the plan was computed from
    pub fn regions(&self) -> &[RegionDescriptor] {
        &self.regions
    }

    /// Control words for the region sequencer
    pub fn control(&self) -> &[u32] {
        &self.control
    }

    /// True when the first region starts on line 0
    pub fn opens_with_change(&self) -> bool {
        self.opens_with_change
    }

    /// Implicit skip after the last region
    pub fn trailing_skip(&self) -> u32 {
        self.trailing
    }

    /// Lines rewritten by this update
    pub fn changed_lines(&self) -> u32 {
        self.changed_lines
    }

    /// Ticks the walk itself needs, without warm-up or the closing tick
    pub fn minimum_ticks(&self) -> u32 {
        self.minimum_ticks
    }

    /// Ticks the deadline sequencer holds the frame signal
    pub fn deadline(&self) -> u32 {
        self.deadline
    }

    /// Scanlines described by the control stream after undoing the bias
    pub fn covered_lines(&self) -> u32 {
        let total: u32 = self.control.iter().map(|word| word + 1).sum();
        // The literal 0 marker stands for an empty skip, not a one-line skip
        total - self.opens_with_change as u32
    }

    /// Charge role of the region sequencer
    pub fn region_role(&self) -> Role {
        Role::Region {
            opens_with_change: self.opens_with_change,
        }
    }

    /// Charge role of the deadline sequencer
    pub fn deadline_role(&self) -> Role {
        Role::deadline(self.deadline)
    }

    /// Words the region shifter consumes for this plan
    ///
    /// Per region: a counter word, the changed lines, one zero half-line.
    pub fn payload_words(&self, geometry: &PanelGeometry) -> u32 {
        let line_words = geometry.line_bytes() as u32 / 4;
        self.regions
            .iter()
            .map(|region| 1 + region.change as u32 * line_words + geometry.half_line_words())
            .sum()
    }

    /// Bytes of the matching partial payload
    pub fn payload_bytes(&self, geometry: &PanelGeometry) -> usize {
        self.payload_words(geometry) as usize * 4
    }
}
