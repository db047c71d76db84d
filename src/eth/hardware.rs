// Licensed under the Apache-2.0 license

//! Downstream seam between the interface logic and the MAC/DMA registers.
//!
//! The interface never touches registers directly. Boards plug in
//! [`Hc32f4a0Eth`](crate::eth::hc32f4a0::Hc32f4a0Eth); host tests plug in a mock
//! that records every call.

use bitflags::bitflags;

use crate::eth::common::EthConfig;
use crate::eth::frame::MacAddress;

bitflags! {
    /// DMA status flags, bit for bit as in the DMA status register.
    /// All flags are write-1-to-clear.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct DmaStatus: u32 {
        const TX_INTERRUPT = 1 << 0;
        const TX_STOPPED = 1 << 1;
        const TX_BUFFER_UNAVAILABLE = 1 << 2;
        const TX_JABBER_TIMEOUT = 1 << 3;
        const RX_OVERFLOW = 1 << 4;
        const TX_UNDERFLOW = 1 << 5;
        const RX_INTERRUPT = 1 << 6;
        const RX_BUFFER_UNAVAILABLE = 1 << 7;
        const RX_STOPPED = 1 << 8;
        const RX_WATCHDOG_TIMEOUT = 1 << 9;
        const EARLY_TX = 1 << 10;
        const FATAL_BUS_ERROR = 1 << 13;
        const EARLY_RX = 1 << 14;
        const ABNORMAL_SUMMARY = 1 << 15;
        const NORMAL_SUMMARY = 1 << 16;
    }
}

impl DmaStatus {
    /// Conditions that stall transmission until software resumes it.
    pub const TX_FAULTS: Self = Self::TX_UNDERFLOW.union(Self::TX_BUFFER_UNAVAILABLE);
}

/// Control of the Ethernet DMA engine and MAC core.
pub trait EthDmaHardware {
    /// Requests a DMA software reset. Completion is observed through
    /// [`is_reset_complete`](Self::is_reset_complete).
    fn software_reset(&mut self);

    fn is_reset_complete(&self) -> bool;

    /// Programs bus mode, operation mode and MAC configuration.
    fn configure(&mut self, config: &EthConfig);

    fn set_mac_address(&mut self, mac: &MacAddress);

    /// Points the DMA at the first TX and RX descriptors.
    fn set_descriptor_lists(&mut self, tx: u32, rx: u32);

    /// Enables MAC transmitter/receiver and starts both DMA directions.
    fn start(&mut self);

    fn stop(&mut self);

    fn status(&self) -> DmaStatus;

    /// Clears exactly the given flags.
    fn clear_status(&mut self, flags: DmaStatus);

    /// Kicks the transmit DMA out of suspension (transmit poll demand).
    fn resume_transmit(&mut self);

    /// Kicks the receive DMA out of suspension (receive poll demand).
    fn resume_receive(&mut self);
}

/// Station management (MDIO) bus of the MAC.
pub trait SmiBus {
    fn start_read(&mut self, phy: u8, register: u8);

    fn start_write(&mut self, phy: u8, register: u8, value: u16);

    fn is_busy(&self) -> bool;

    /// Value latched by the last completed read.
    fn data(&self) -> u16;
}
