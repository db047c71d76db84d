// Licensed under the Apache-2.0 license

//! Host-side doubles: a recording hardware mock and a loopback DMA engine.

use core::cell::Cell;
use core::fmt;

use embedded_hal::delay::DelayNs;

use crate::common::{Level, Logger};
use crate::eth::common::EthConfig;
use crate::eth::descriptor::{Descriptor, Owner};
use crate::eth::frame::MacAddress;
use crate::eth::hardware::{DmaStatus, EthDmaHardware, SmiBus};
use crate::eth::phy::{BCR_SOFT_RESET, PHY_BCR};
use crate::eth::ring::{RxRing, TxRing};

pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Records every call made through [`EthDmaHardware`] and [`SmiBus`].
pub struct MockHardware {
    pub status: DmaStatus,
    pub clear_calls: usize,
    pub last_cleared: DmaStatus,
    pub tx_resumes: usize,
    pub rx_resumes: usize,
    pub resets: usize,
    /// Number of completion polls before the reset bit clears; `None` keeps
    /// the engine in reset forever.
    pub reset_polls: Option<usize>,
    reset_polled: Cell<usize>,
    pub configured: bool,
    pub mac: Option<MacAddress>,
    pub tx_list: u32,
    pub rx_list: u32,
    pub running: bool,
    pub starts: usize,
    pub stops: usize,
    pub phy_registers: [u16; 32],
    pub smi_stuck: bool,
    /// Keeps the PHY soft reset bit set once written.
    pub phy_reset_stuck: bool,
    smi_data: u16,
}

impl MockHardware {
    pub fn new() -> Self {
        Self {
            status: DmaStatus::empty(),
            clear_calls: 0,
            last_cleared: DmaStatus::empty(),
            tx_resumes: 0,
            rx_resumes: 0,
            resets: 0,
            reset_polls: Some(2),
            reset_polled: Cell::new(0),
            configured: false,
            mac: None,
            tx_list: 0,
            rx_list: 0,
            running: false,
            starts: 0,
            stops: 0,
            phy_registers: [0; 32],
            smi_stuck: false,
            phy_reset_stuck: false,
            smi_data: 0,
        }
    }

    pub fn raise(&mut self, flags: DmaStatus) {
        self.status |= flags;
    }
}

impl EthDmaHardware for MockHardware {
    fn software_reset(&mut self) {
        self.resets += 1;
        self.reset_polled.set(0);
    }

    fn is_reset_complete(&self) -> bool {
        let polled = self.reset_polled.get() + 1;
        self.reset_polled.set(polled);
        self.reset_polls.is_some_and(|needed| polled > needed)
    }

    fn configure(&mut self, _config: &EthConfig) {
        self.configured = true;
    }

    fn set_mac_address(&mut self, mac: &MacAddress) {
        self.mac = Some(*mac);
    }

    fn set_descriptor_lists(&mut self, tx: u32, rx: u32) {
        self.tx_list = tx;
        self.rx_list = rx;
    }

    fn start(&mut self) {
        self.running = true;
        self.starts += 1;
    }

    fn stop(&mut self) {
        self.running = false;
        self.stops += 1;
    }

    fn status(&self) -> DmaStatus {
        self.status
    }

    fn clear_status(&mut self, flags: DmaStatus) {
        self.clear_calls += 1;
        self.last_cleared = flags;
        self.status.remove(flags);
    }

    fn resume_transmit(&mut self) {
        self.tx_resumes += 1;
    }

    fn resume_receive(&mut self) {
        self.rx_resumes += 1;
    }
}

impl SmiBus for MockHardware {
    fn start_read(&mut self, _phy: u8, register: u8) {
        self.smi_data = self.phy_registers[usize::from(register & 0x1f)];
    }

    fn start_write(&mut self, _phy: u8, register: u8, value: u16) {
        let value = if register == PHY_BCR && !self.phy_reset_stuck {
            value & !BCR_SOFT_RESET
        } else {
            value
        };
        self.phy_registers[usize::from(register & 0x1f)] = value;
    }

    fn is_busy(&self) -> bool {
        self.smi_stuck
    }

    fn data(&self) -> u16 {
        self.smi_data
    }
}

/// Stand-in for the frame check sequence the MAC appends on the wire.
const FCS: [u8; 4] = [0xde, 0xad, 0xbe, 0xef];

/// Plays the DMA engine for a MAC in loopback: every frame handed over in the
/// TX ring comes back in the RX ring, followed by its four FCS bytes.
#[derive(Default)]
pub struct LoopbackDma {
    tx_pos: usize,
    rx_pos: usize,
    /// Flag the next delivered frame with an error summary.
    pub corrupt_next: bool,
}

impl LoopbackDma {
    /// Moves every complete TX frame into the RX ring. Stops with
    /// `RX_BUFFER_UNAVAILABLE` raised when the RX ring has no room. Returns
    /// the number of frames moved.
    pub fn run<const TX: usize, const RX: usize, const BUF: usize>(
        &mut self,
        hw: &mut MockHardware,
        tx: &TxRing<TX, BUF>,
        rx: &mut RxRing<RX, BUF>,
    ) -> usize {
        let mut moved = 0;
        while tx.owner_at(self.tx_pos) == Owner::Hardware {
            let mut frame = Vec::new();
            let mut index = self.tx_pos;
            let mut used = 0;
            loop {
                let desc = tx.descriptor(index).unwrap();
                assert_eq!(desc.owner(), Owner::Hardware, "frame handed over without its tail");
                assert_eq!(desc.is_first_segment(), used == 0);
                frame.extend_from_slice(&tx.dma_buffer(index)[..desc.segment_len()]);
                used += 1;
                index = tx.next_index(index);
                if desc.is_last_segment() {
                    break;
                }
            }

            frame.extend_from_slice(&FCS);
            let needed = frame.len().div_ceil(BUF);
            let mut slot = self.rx_pos;
            for _ in 0..needed {
                if rx.owner_at(slot) != Owner::Hardware {
                    hw.raise(DmaStatus::RX_BUFFER_UNAVAILABLE | DmaStatus::ABNORMAL_SUMMARY);
                    return moved;
                }
                slot = rx.next_index(slot);
            }

            let mut index = self.tx_pos;
            for _ in 0..used {
                tx.descriptor(index).unwrap().hw_complete(0);
                index = tx.next_index(index);
            }
            self.tx_pos = index;

            let error = core::mem::take(&mut self.corrupt_next);
            for (i, chunk) in frame.chunks(BUF).enumerate() {
                rx.dma_buffer_mut(self.rx_pos)[..chunk.len()].copy_from_slice(chunk);
                rx.descriptor(self.rx_pos).unwrap().hw_write_back(
                    frame.len(),
                    i == 0,
                    i + 1 == needed,
                    error,
                );
                self.rx_pos = rx.next_index(self.rx_pos);
            }
            hw.raise(DmaStatus::TX_INTERRUPT | DmaStatus::RX_INTERRUPT | DmaStatus::NORMAL_SUMMARY);
            moved += 1;
        }
        moved
    }
}

/// Logger keeping every record for later inspection.
#[derive(Default)]
pub struct RecordingLogger {
    pub records: Vec<(Level, String)>,
}

impl Logger for RecordingLogger {
    fn log(&mut self, level: Level, args: fmt::Arguments<'_>) {
        self.records.push((level, args.to_string()));
    }
}
