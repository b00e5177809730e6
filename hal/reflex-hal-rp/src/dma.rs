//! DMA channels feeding PIO transmit queues
//!
//! embassy-rp's transfer futures start a channel the moment they are created.
//! A chain needs its successor armed but idle, so channels are programmed
//! through the PAC: the non-triggering control alias arms a link, the
//! triggering one starts it.

use core::marker::PhantomData;
use core::sync::atomic::{compiler_fence, Ordering};

use embassy_rp::dma::Channel;
use embassy_rp::pac;
use embassy_rp::pac::dma::vals::{DataSize, TreqSel};
use embassy_rp::Peri;
use reflex_hal::{TransferChannel, TransferDescriptor, WordSource};

use crate::block::{tx_dreq, txf_addr};

/// Read source of zero-padding links
static ZERO_WORD: u32 = 0;

/// A claimed DMA channel
pub struct DmaChannel<'d> {
    number: u8,
    _channel: PhantomData<&'d mut ()>,
}

impl<'d> DmaChannel<'d> {
    /// Claim a channel for the lifetime of the driver
    pub fn new<C: Channel>(channel: Peri<'d, C>) -> Self {
        Self {
            number: channel.number(),
            _channel: PhantomData,
        }
    }

    fn regs(&self) -> pac::dma::Channel {
        pac::DMA.ch(self.number as usize)
    }
}

impl TransferChannel for DmaChannel<'_> {
    fn id(&self) -> u8 {
        self.number
    }

    fn configure(&mut self, desc: &TransferDescriptor<'_>, chain_to: Option<u8>, start: bool) {
        let (read_addr, incr_read) = match desc.source {
            WordSource::Buffer(bytes) => (bytes.as_ptr() as u32, true),
            WordSource::Words(words) => (words.as_ptr() as u32, true),
            WordSource::Zeros => (&ZERO_WORD as *const u32 as u32, false),
        };

        let ch = self.regs();
        ch.read_addr().write_value(read_addr);
        ch.write_addr().write_value(txf_addr(desc.target));
        ch.trans_count().write(|w| {
            w.set_mode(0.into());
            w.set_count(desc.words);
        });

        let mut ctrl = pac::dma::regs::CtrlTrig(0);
        ctrl.set_treq_sel(TreqSel::from(tx_dreq(desc.target)));
        ctrl.set_data_size(DataSize::SIZE_WORD);
        ctrl.set_incr_read(incr_read);
        ctrl.set_incr_write(false);
        // Chaining to itself means no chain
        ctrl.set_chain_to(chain_to.unwrap_or(self.number));
        ctrl.set_en(true);

        compiler_fence(Ordering::SeqCst);
        if start {
            ch.ctrl_trig().write_value(ctrl);
        } else {
            ch.al1_ctrl().write_value(ctrl.0);
        }
        compiler_fence(Ordering::SeqCst);
    }

    fn is_busy(&self) -> bool {
        self.regs().ctrl_trig().read().busy()
    }
}
