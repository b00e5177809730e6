//! PIO block registers shared by a bank
//!
//! embassy-rp exposes state machines individually; the lock-step start needs
//! block-wide writes, so those go straight to the PAC.

use embassy_rp::pac;
use reflex_hal::{GroupControl, QueueTarget};

/// GPIO function select of each PIO block
const PIO_FUNCSEL: [u8; 2] = [6, 7];

/// DREQ numbers per block: TX queues of PIO0 start at 0, PIO1 at 8
const DREQ_STRIDE: u8 = 8;

/// Registers of PIO block `block`
pub fn regs(block: u8) -> pac::pio::Pio {
    match block {
        0 => pac::PIO0,
        _ => pac::PIO1,
    }
}

/// Address of a sequencer's transmit queue, for DMA writes
pub fn txf_addr(target: QueueTarget) -> u32 {
    regs(target.block).txf(target.lane as usize).as_ptr() as u32
}

/// Data request line raised when a sequencer's transmit queue has room
pub fn tx_dreq(target: QueueTarget) -> u8 {
    target.block * DREQ_STRIDE + target.lane
}

/// Route GPIOs to a PIO block
///
/// Only the function select changes; pad setup was done when the pins were
/// first handed to the block.
pub fn route_pins(block: u8, pins: &[u8]) {
    let funcsel = PIO_FUNCSEL[block as usize & 1];
    for &pin in pins {
        pac::IO_BANK0
            .gpio(pin as usize)
            .ctrl()
            .modify(|w| w.set_funcsel(funcsel));
    }
}

/// Group control of one PIO block
pub struct BlockControl {
    block: u8,
}

impl BlockControl {
    pub fn new(block: u8) -> Self {
        Self { block }
    }

    pub fn block(&self) -> u8 {
        self.block
    }
}

impl GroupControl for BlockControl {
    fn clear_flags(&mut self, mask: u8) {
        // Write 1 to clear
        regs(self.block).irq().write(|w| w.set_irq(mask));
    }

    fn restart_group(&mut self, mask: u8) {
        regs(self.block).ctrl().modify(|w| {
            w.set_clkdiv_restart(mask);
            w.set_sm_enable(w.sm_enable() | mask);
        });
    }

    fn disable(&mut self, mask: u8) {
        regs(self.block)
            .ctrl()
            .modify(|w| w.set_sm_enable(w.sm_enable() & !mask));
    }

    fn force_flag(&mut self, flag: u8) {
        regs(self.block)
            .irq_force()
            .write(|w| w.set_irq_force(1 << flag));
    }
}
