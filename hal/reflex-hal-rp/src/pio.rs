//! PIO microprograms and clock dividers
//!
//! # Full-frame bank (PIO0)
//!
//! ```text
//! sm0 frame_vertical  INTB/GSP (set), GCK (side)   paces half-periods, irq 4 + 5
//! sm1 gate_enable     GEN (set)                     one pulse per irq 5
//! sm2 frame_shifter   BSP/BCK (side), R/G/B (out)   one half-line per irq 4
//! ```
//!
//! # Partial-update bank (PIO1)
//!
//! ```text
//! sm0 region_vertical INTB/GSP/GCK/GEN (set), GCK (side)   walks skip/change words
//! sm1 region_shifter  BSP/BCK (side), R/G/B (out)          in-band half-line count
//! sm2 frame_deadline  INTB (set)                           drops INTB after N ticks
//! ```
//!
//! Every program that waits for the start flag uses `wait 1 irq 0`; the
//! driver forces flag 0 once the group has been armed.

use pio::Program;
use reflex_core::config::{PanelGeometry, ProtocolTiming};
use reflex_hal::MicroOp;

/// Instruction slots of one PIO block
pub const PROGRAM_SIZE: usize = pio::RP2040_MAX_PROGRAM_SIZE;

/// Vertical and deadline programs spend this many cycles per half-period
pub const VERTICAL_CYCLES_PER_HALF_PERIOD: u32 = 32;

/// Share of a gate clock half-period the data shifter may use, in percent
pub const SHIFTER_DUTY_PERCENT: u32 = 75;

/// Shifter cycles spent outside the byte-pair loop of a half-line
const SHIFTER_OVERHEAD_CYCLES: u32 = 3;

/// Shifter cycles per byte pair (two outs with one delay each, plus the jump)
const SHIFTER_PAIR_CYCLES: u32 = 5;

/// `pull noblock`
const PULL_NOBLOCK: u16 = 0x8080;
/// `out isr, 32`
const OUT_ISR_32: u16 = 0x60C0;
/// `out y, 32`
const OUT_Y_32: u16 = 0x6040;
/// `mov x, osr`
const MOV_X_OSR: u16 = 0xA027;
/// `mov x, isr`
const MOV_X_ISR: u16 = 0xA026;

/// Machine encoding of a charging micro-instruction
pub const fn encode(op: MicroOp) -> u16 {
    match op {
        MicroOp::Pull => PULL_NOBLOCK,
        MicroOp::OutIsr => OUT_ISR_32,
        MicroOp::OutY => OUT_Y_32,
        MicroOp::MovXOsr => MOV_X_OSR,
        MicroOp::MovXIsr => MOV_X_ISR,
    }
}

/// Full frame: frame start, gate clock and per-half-line flags
///
/// Pulls its half-period count after release. Each half-period is exactly
/// `VERTICAL_CYCLES_PER_HALF_PERIOD` cycles.
pub fn frame_vertical() -> Program<PROGRAM_SIZE> {
    pio::pio_asm!(
        ".side_set 1",
        "    wait 1 irq 0          side 0",
        "    pull block            side 0",
        "    out x, 32             side 0",
        "    set pins, 3           side 0 [15]", // INTB and GSP high
        "high:",
        "    irq set 4             side 1",      // data shifter takes a half-line
        "    irq set 5             side 1 [15]", // gate enable pulse
        "    set pins, 1           side 1 [13]", // GSP spans the first edge only
        "    jmp x-- low           side 1",
        "    jmp done              side 0",
        "low:",
        "    irq set 4             side 0",
        "    irq set 5             side 0 [15]",
        "    nop                   side 0 [13]",
        "    jmp x-- high          side 0",
        "done:",
        "    set pins, 0           side 0", // INTB low
        "end:",
        "    jmp end               side 0",
    )
    .program
}

/// Full frame: one gate enable pulse per half-line, then halt
pub fn gate_enable() -> Program<PROGRAM_SIZE> {
    pio::pio_asm!(
        "pulse:",
        "    wait 1 irq 5",
        "    set pins, 1 [15]",
        "    set pins, 0",
        "    jmp x-- pulse",
        "end:",
        "    jmp end",
    )
    .program
}

/// Full frame: pixel data, `X + 1` byte pairs per half-line, `Y + 1` half-lines
///
/// The inner count lives in ISR so it can be restored every half-line.
pub fn frame_shifter() -> Program<PROGRAM_SIZE> {
    pio::pio_asm!(
        ".side_set 2",
        "half_line:",
        "    wait 1 irq 4          side 0",
        "    mov x, isr            side 1 [1]", // BSP high
        "pair:",
        "    out pins, 8           side 3 [1]", // BCK rises
        "    out pins, 8           side 1 [1]", // BCK falls
        "    jmp x-- pair          side 1",
        "    jmp y-- half_line     side 0",
        "end:",
        "    jmp end               side 0",
    )
    .program
}

/// Partial update: walks the skip/change control stream
///
/// Y is charged with 1 when the frame opens on changed lines; the first
/// control word is then a marker and is discarded. Skipped lines cost two
/// cycles each, changed half-lines `VERTICAL_CYCLES_PER_HALF_PERIOD`. Once
/// the stream runs dry the walker stalls on `pull` until the deadline
/// closes the frame.
pub fn region_vertical() -> Program<PROGRAM_SIZE> {
    pio::pio_asm!(
        ".side_set 1",
        "    wait 1 irq 0          side 0",
        "    set pins, 3           side 0 [15]", // INTB and GSP high
        "    jmp !y skip_lead      side 0 [15]",
        "    pull block            side 0",      // leading marker
        "    out null, 32          side 0",
        ".wrap_target",
        "change_region:",
        "    pull block            side 0",
        "    out x, 32             side 0",      // changed lines - 1
        "change_line:",
        "    irq set 4             side 1 [15]",
        "    set pins, 9           side 1 [15]", // GEN high, GSP low
        "    irq set 4             side 0 [15]",
        "    set pins, 1           side 0 [14]",
        "    jmp x-- change_line   side 0",
        "    irq set 4             side 1 [15]", // zero half-line closes the region
        "    set pins, 1           side 1 [15]",
        "    jmp skip_region       side 0",
        "skip_lead:",
        "    set pins, 1           side 0 [15]",
        "    nop                   side 0 [15]",
        "skip_region:",
        "    pull block            side 0",
        "    out x, 32             side 0",      // skipped lines - 1
        "skip_line:",
        "    nop                   side 1",
        "    jmp x-- skip_line     side 0",
        ".wrap",
    )
    .program
}

/// Partial update: pixel data with the half-line count carried in-band
///
/// Every region starts with one word holding `2 * change`, so the region's
/// changed half-lines plus its zero half-line are shifted out.
pub fn region_shifter() -> Program<PROGRAM_SIZE> {
    pio::pio_asm!(
        ".side_set 2",
        ".wrap_target",
        "    out y, 32             side 0",
        "half_line:",
        "    wait 1 irq 4          side 0",
        "    mov x, isr            side 1 [1]",
        "pair:",
        "    out pins, 8           side 3 [1]",
        "    out pins, 8           side 1 [1]",
        "    jmp x-- pair          side 1",
        "    jmp y-- half_line     side 0",
        ".wrap",
    )
    .program
}

/// Partial update: counts `X + 1` ticks, then drops INTB
pub fn frame_deadline() -> Program<PROGRAM_SIZE> {
    pio::pio_asm!(
        "    wait 1 irq 0",
        "tick:",
        "    jmp x-- tick",
        "    set pins, 0",
        "end:",
        "    jmp end",
    )
    .program
}

/// Calculate a 16.8 clock divider from a cycle ratio
///
/// The state machine should execute `instr_cycles` instructions in
/// `sys_cycles` system clock cycles, so `divider = sys_cycles / instr_cycles`.
///
/// Returns (integer_part, fractional_part) for the 16.8 fixed-point divider.
pub fn calc_clock_divider(sys_cycles: u32, instr_cycles: u32) -> (u16, u8) {
    if instr_cycles == 0 {
        return (0xFFFF, 0xFF);
    }

    let divider_x256 = (sys_cycles as u64 * 256) / instr_cycles as u64;
    let int_part = (divider_x256 / 256).min(0xFFFF) as u16;
    let frac_part = (divider_x256 % 256) as u8;

    // A divider below 1 is not representable; run at full speed instead
    if int_part == 0 {
        return (1, 0);
    }

    (int_part, frac_part)
}

/// Divider for the vertical, gate and deadline programs
pub fn vertical_divider(timing: &ProtocolTiming) -> (u16, u8) {
    calc_clock_divider(timing.gck_half_period_cycles, VERTICAL_CYCLES_PER_HALF_PERIOD)
}

/// Instruction cycles the data shifter needs for one half-line
pub fn shifter_cycles_per_half_line(geometry: &PanelGeometry) -> u32 {
    SHIFTER_OVERHEAD_CYCLES + SHIFTER_PAIR_CYCLES * geometry.pairs_per_half_line()
}

/// Divider for the data shifters
///
/// Fast enough that a half-line finishes within `SHIFTER_DUTY_PERCENT` of a
/// gate clock half-period.
pub fn shifter_divider(timing: &ProtocolTiming, geometry: &PanelGeometry) -> (u16, u8) {
    let budget = timing.gck_half_period_cycles * SHIFTER_DUTY_PERCENT / 100;
    calc_clock_divider(budget, shifter_cycles_per_half_line(geometry))
}

/// Bits of a divider for `fixed::types::U24F8::from_bits`
pub const fn divider_bits((int_part, frac_part): (u16, u8)) -> u32 {
    ((int_part as u32) << 8) | frac_part as u32
}
