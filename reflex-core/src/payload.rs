//! Pixel payload formatting
//!
//! Pixels are `0bBBGGRR`. The panel takes a line as two half-lines: first the
//! high bit of every colour channel, then the low bit. Each byte of a
//! half-line carries two neighbouring pixels, the first on the odd bit
//! positions:
//!
//! ```text
//! bit   5     4     3     2     1     0
//!      p1.b  p2.b  p1.g  p2.g  p1.r  p2.r
//! ```

use core::ops::{Deref, DerefMut};

use crate::config::PanelGeometry;
use crate::partial::RegionDescriptor;

/// Bytes of the per-region half-line counter
pub const COUNTER_BYTES: usize = 4;

/// Payload error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PayloadError {
    /// Output buffer is too small
    TooSmall { needed: usize, available: usize },
    /// Input is not one frame of the configured geometry
    FrameSize { expected: usize, actual: usize },
    /// Regions extend past the last line
    RegionOutOfRange,
}

/// Byte buffer aligned for word transfers
#[derive(Clone)]
#[repr(C, align(4))]
pub struct AlignedBuffer<const N: usize>([u8; N]);

impl<const N: usize> AlignedBuffer<N> {
    /// A zeroed buffer
    pub const fn new() -> Self {
        Self([0; N])
    }
}

impl<const N: usize> Default for AlignedBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Deref for AlignedBuffer<N> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl<const N: usize> DerefMut for AlignedBuffer<N> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

/// Reduce 8-bit channels to a `0bBBGGRR` pixel
pub const fn to_6bpp(r: u8, g: u8, b: u8) -> u8 {
    ((b >> 6) << 4) | ((g >> 6) << 2) | (r >> 6)
}

const fn interleave(p1: u8, p2: u8) -> u8 {
    ((p1 & 0b100) << 3)
        | ((p2 & 0b100) << 2)
        | ((p1 & 0b010) << 2)
        | ((p2 & 0b010) << 1)
        | ((p1 & 0b001) << 1)
        | (p2 & 0b001)
}

/// Gather bit `shift` of each channel: bit 0 is red, bit 1 green, bit 2 blue
const fn plane(pixel: u8, shift: u8) -> u8 {
    ((pixel >> shift) & 0b1) | (((pixel >> (shift + 2)) & 0b1) << 1) | (((pixel >> (shift + 4)) & 0b1) << 2)
}

/// Split two pixels into their MSB and LSB bytes
pub const fn pack_pixel_pair(p1: u8, p2: u8) -> (u8, u8) {
    let msb = interleave(plane(p1, 1), plane(p2, 1));
    let lsb = interleave(plane(p1, 0), plane(p2, 0));
    (msb, lsb)
}

/// Recover the two pixels of an MSB/LSB byte pair
pub const fn unpack_pixel_pair(msb: u8, lsb: u8) -> (u8, u8) {
    let mut p1 = 0;
    let mut p2 = 0;
    let mut channel = 0;
    while channel < 3 {
        let odd = 1 << (channel * 2 + 1);
        let even = 1 << (channel * 2);
        let shift = channel * 2;
        p1 |= (((msb & odd != 0) as u8) << 1 | (lsb & odd != 0) as u8) << shift;
        p2 |= (((msb & even != 0) as u8) << 1 | (lsb & even != 0) as u8) << shift;
        channel += 1;
    }
    (p1, p2)
}

/// Format one line of pixels into its two half-lines
pub fn format_row(pixels: &[u8], out: &mut [u8]) {
    let half = out.len() / 2;
    let (msb_plane, lsb_plane) = out.split_at_mut(half);
    for (i, pair) in pixels.chunks_exact(2).enumerate().take(half) {
        let (msb, lsb) = pack_pixel_pair(pair[0], pair[1]);
        msb_plane[i] = msb;
        lsb_plane[i] = lsb;
    }
}

/// Format a full frame of `0bBBGGRR` pixels
pub fn format_frame(
    pixels: &[u8],
    geometry: &PanelGeometry,
    out: &mut [u8],
) -> Result<(), PayloadError> {
    if pixels.len() != geometry.frame_bytes() {
        return Err(PayloadError::FrameSize {
            expected: geometry.frame_bytes(),
            actual: pixels.len(),
        });
    }
    let width = geometry.width as usize;
    format_frame_with(geometry, out, |x, y| pixels[y * width + x])
}

/// Format a frame from a pixel function of `(x, y)`
pub fn format_frame_with(
    geometry: &PanelGeometry,
    out: &mut [u8],
    pixel: impl Fn(usize, usize) -> u8,
) -> Result<(), PayloadError> {
    let needed = geometry.frame_bytes();
    if out.len() < needed {
        return Err(PayloadError::TooSmall {
            needed,
            available: out.len(),
        });
    }
    let line_bytes = geometry.line_bytes();
    let half = geometry.half_line_bytes();
    for (y, row) in out[..needed].chunks_exact_mut(line_bytes).enumerate() {
        let (msb_plane, lsb_plane) = row.split_at_mut(half);
        for i in 0..half {
            let (msb, lsb) = pack_pixel_pair(pixel(2 * i, y), pixel(2 * i + 1, y));
            msb_plane[i] = msb;
            lsb_plane[i] = lsb;
        }
    }
    Ok(())
}

/// Eight vertical colour bars
pub fn colour_bars(geometry: &PanelGeometry, out: &mut [u8]) -> Result<(), PayloadError> {
    const BARS: [u8; 8] = [
        0b11_11_11, 0b00_11_11, 0b11_11_00, 0b00_11_00, 0b11_00_11, 0b00_00_11, 0b11_00_00, 0,
    ];
    let bar_width = (geometry.width as usize / BARS.len()).max(1);
    format_frame_with(geometry, out, |x, _| BARS[(x / bar_width).min(BARS.len() - 1)])
}

/// Build the shifter payload of a partial update from a formatted frame
///
/// Each region becomes a little-endian half-line counter (`2 * change`), the
/// changed lines, and one zero half-line. Returns the bytes written.
pub fn build_partial_payload(
    frame: &[u8],
    regions: &[RegionDescriptor],
    geometry: &PanelGeometry,
    out: &mut [u8],
) -> Result<usize, PayloadError> {
    if frame.len() != geometry.frame_bytes() {
        return Err(PayloadError::FrameSize {
            expected: geometry.frame_bytes(),
            actual: frame.len(),
        });
    }
    let line_bytes = geometry.line_bytes();
    let half = geometry.half_line_bytes();

    let needed: usize = regions
        .iter()
        .map(|region| COUNTER_BYTES + region.change as usize * line_bytes + half)
        .sum();
    if out.len() < needed {
        return Err(PayloadError::TooSmall {
            needed,
            available: out.len(),
        });
    }

    let mut line = 0usize;
    let mut at = 0usize;
    for region in regions {
        line += region.skip as usize;
        let change = region.change as usize;
        if line + change > geometry.lines as usize {
            return Err(PayloadError::RegionOutOfRange);
        }

        let counter = 2 * region.change as u32;
        out[at..at + COUNTER_BYTES].copy_from_slice(&counter.to_le_bytes());
        at += COUNTER_BYTES;

        let rows = &frame[line * line_bytes..(line + change) * line_bytes];
        out[at..at + rows.len()].copy_from_slice(rows);
        at += rows.len();

        out[at..at + half].fill(0);
        at += half;
        line += change;
    }
    Ok(at)
}
