// Licensed under the Apache-2.0 license

//! Memory-mapped MAC/DMA backend for the HC32F4A0.
//!
//! Only the registers the DMA path needs are described here. Clock gating,
//! pin muxing and the MII/RMII selection are board bring-up and must be done
//! before [`Hc32f4a0Eth`] is used.

use core::ptr::{read_volatile, write_volatile};

use crate::eth::common::{Duplex, EthConfig, Speed};
use crate::eth::frame::MacAddress;
use crate::eth::hardware::{DmaStatus, EthDmaHardware, SmiBus};

/// Base address of the Ethernet block.
pub const ETH_BASE: usize = 0x4005_0000;

mod reg {
    pub const MAC_CONFIGR: usize = 0x0000;
    pub const MAC_SMIADDR: usize = 0x0010;
    pub const MAC_SMIDATR: usize = 0x0014;
    pub const MAC_MACADHR0: usize = 0x0040;
    pub const MAC_MACADLR0: usize = 0x0044;

    pub const DMA_BUSMODR: usize = 0x1000;
    pub const DMA_TXPOLLR: usize = 0x1004;
    pub const DMA_RXPOLLR: usize = 0x1008;
    pub const DMA_RXDLADR: usize = 0x100c;
    pub const DMA_TXDLADR: usize = 0x1010;
    pub const DMA_DMASTSR: usize = 0x1014;
    pub const DMA_OPRMODR: usize = 0x1018;
    pub const DMA_INTENAR: usize = 0x101c;

    /// Size of the register window touched by this driver.
    pub const WINDOW: usize = 0x1020;
}

mod mac_configr {
    pub const RE: u32 = 1 << 2;
    pub const TE: u32 = 1 << 3;
    pub const IPCO: u32 = 1 << 10;
    pub const DM: u32 = 1 << 11;
    pub const LM: u32 = 1 << 12;
    pub const FES: u32 = 1 << 14;
    pub const PS: u32 = 1 << 15;
}

mod smiaddr {
    pub const SMIB: u32 = 1 << 0;
    pub const SMIW: u32 = 1 << 1;
    pub const SMIC_SHIFT: u32 = 2;
    pub const SMIC_MASK: u32 = 0b111 << SMIC_SHIFT;
    pub const SMIR_SHIFT: u32 = 6;
    pub const SMIA_SHIFT: u32 = 11;
}

mod busmodr {
    pub const SWR: u32 = 1 << 0;
    pub const DSEN: u32 = 1 << 7;
    pub const TPBL_SHIFT: u32 = 8;
    pub const FBST: u32 = 1 << 16;
    pub const AAL: u32 = 1 << 25;
}

mod oprmodr {
    pub const SR: u32 = 1 << 1;
    pub const OSF: u32 = 1 << 2;
    pub const FEF: u32 = 1 << 7;
    pub const ST: u32 = 1 << 13;
    pub const FTF: u32 = 1 << 20;
    pub const TSF: u32 = 1 << 21;
    pub const RSF: u32 = 1 << 25;
}

mod macadhr {
    pub const AE: u32 = 1 << 31;
}

pub struct Hc32f4a0Eth {
    base: usize,
}

impl Hc32f4a0Eth {
    /// # Safety
    ///
    /// The caller must be the only user of the Ethernet block and must have
    /// enabled its clock.
    pub unsafe fn steal() -> Self {
        Self { base: ETH_BASE }
    }

    /// Backend over a register window at `base`.
    ///
    /// # Safety
    ///
    /// `base` must point at a word aligned register window covering the DMA
    /// block (0x1020 bytes) that stays valid and unaliased for the lifetime of
    /// the returned value.
    pub unsafe fn from_base(base: usize) -> Self {
        Self { base }
    }

    fn read(&self, offset: usize) -> u32 {
        // SAFETY: offset is one of the constants in `reg`, inside the window
        // guaranteed by the constructor.
        unsafe { read_volatile((self.base + offset) as *const u32) }
    }

    fn write(&mut self, offset: usize, value: u32) {
        // SAFETY: see `read`.
        unsafe { write_volatile((self.base + offset) as *mut u32, value) }
    }

    fn modify(&mut self, offset: usize, f: impl FnOnce(u32) -> u32) {
        let value = self.read(offset);
        self.write(offset, f(value));
    }
}

impl EthDmaHardware for Hc32f4a0Eth {
    fn software_reset(&mut self) {
        self.modify(reg::DMA_BUSMODR, |v| v | busmodr::SWR);
    }

    fn is_reset_complete(&self) -> bool {
        self.read(reg::DMA_BUSMODR) & busmodr::SWR == 0
    }

    fn configure(&mut self, config: &EthConfig) {
        let pbl = u32::from(config.burst_length as u8);
        self.write(
            reg::DMA_BUSMODR,
            busmodr::DSEN | busmodr::FBST | busmodr::AAL | (pbl << busmodr::TPBL_SHIFT),
        );

        let mut opr = oprmodr::OSF;
        if config.store_and_forward {
            opr |= oprmodr::TSF | oprmodr::RSF;
        }
        if !config.drop_error_frames {
            opr |= oprmodr::FEF;
        }
        self.write(reg::DMA_OPRMODR, opr);
        // Polled operation.
        self.write(reg::DMA_INTENAR, 0);

        let mut mac = mac_configr::PS | mac_configr::IPCO;
        if config.speed == Speed::Mbps100 {
            mac |= mac_configr::FES;
        }
        if config.duplex == Duplex::Full {
            mac |= mac_configr::DM;
        }
        if config.loopback {
            mac |= mac_configr::LM;
        }
        self.write(reg::MAC_CONFIGR, mac);
    }

    fn set_mac_address(&mut self, mac: &MacAddress) {
        let [a, b, c, d, e, f] = mac.0;
        self.write(
            reg::MAC_MACADHR0,
            macadhr::AE | u32::from(u16::from_le_bytes([e, f])),
        );
        self.write(reg::MAC_MACADLR0, u32::from_le_bytes([a, b, c, d]));
    }

    fn set_descriptor_lists(&mut self, tx: u32, rx: u32) {
        self.write(reg::DMA_TXDLADR, tx);
        self.write(reg::DMA_RXDLADR, rx);
    }

    fn start(&mut self) {
        self.modify(reg::MAC_CONFIGR, |v| v | mac_configr::TE);
        self.modify(reg::DMA_OPRMODR, |v| v | oprmodr::FTF);
        self.modify(reg::DMA_OPRMODR, |v| v | oprmodr::ST);
        self.modify(reg::MAC_CONFIGR, |v| v | mac_configr::RE);
        self.modify(reg::DMA_OPRMODR, |v| v | oprmodr::SR);
    }

    fn stop(&mut self) {
        self.modify(reg::DMA_OPRMODR, |v| v & !oprmodr::ST);
        self.modify(reg::MAC_CONFIGR, |v| v & !mac_configr::RE);
        self.modify(reg::DMA_OPRMODR, |v| v | oprmodr::FTF);
        self.modify(reg::MAC_CONFIGR, |v| v & !mac_configr::TE);
        self.modify(reg::DMA_OPRMODR, |v| v & !oprmodr::SR);
    }

    fn status(&self) -> DmaStatus {
        DmaStatus::from_bits_truncate(self.read(reg::DMA_DMASTSR))
    }

    fn clear_status(&mut self, flags: DmaStatus) {
        // Write-1-to-clear: a read-modify-write would clear every pending flag.
        self.write(reg::DMA_DMASTSR, flags.bits());
    }

    fn resume_transmit(&mut self) {
        self.write(reg::DMA_TXPOLLR, 0);
    }

    fn resume_receive(&mut self) {
        self.write(reg::DMA_RXPOLLR, 0);
    }
}

impl SmiBus for Hc32f4a0Eth {
    fn start_read(&mut self, phy: u8, register: u8) {
        self.modify(reg::MAC_SMIADDR, |v| {
            (v & smiaddr::SMIC_MASK) | smi_address(phy, register) | smiaddr::SMIB
        });
    }

    fn start_write(&mut self, phy: u8, register: u8, value: u16) {
        self.write(reg::MAC_SMIDATR, u32::from(value));
        self.modify(reg::MAC_SMIADDR, |v| {
            (v & smiaddr::SMIC_MASK) | smi_address(phy, register) | smiaddr::SMIW | smiaddr::SMIB
        });
    }

    fn is_busy(&self) -> bool {
        self.read(reg::MAC_SMIADDR) & smiaddr::SMIB != 0
    }

    fn data(&self) -> u16 {
        (self.read(reg::MAC_SMIDATR) & 0xffff) as u16
    }
}

fn smi_address(phy: u8, register: u8) -> u32 {
    (u32::from(phy & 0x1f) << smiaddr::SMIA_SHIFT) | (u32::from(register & 0x1f) << smiaddr::SMIR_SHIFT)
}
