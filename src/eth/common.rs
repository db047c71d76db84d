// Licensed under the Apache-2.0 license

//! Common types and constants for the Ethernet DMA driver.
//!
//! This module provides the driver error type, the interface configuration
//! and its builder, and the default ring geometry.

use core::fmt;

use fugit::MicrosDurationU32;
use hex_literal::hex;

use crate::eth::frame::MacAddress;

/// Largest frame a single hardware buffer is sized for: header, VLAN tag,
/// 1500 byte payload, CRC and two bytes of slack for the DMA.
pub const ETH_MAX_PACKET_SIZE: usize = 1524;

/// Default size of one TX/RX hardware buffer.
pub const ETH_BUF_SIZE: usize = ETH_MAX_PACKET_SIZE;

/// Default number of TX descriptors.
pub const ETH_TX_BUF_NUM: usize = 4;

/// Default number of RX descriptors.
pub const ETH_RX_BUF_NUM: usize = 4;

/// Length of the frame check sequence the MAC appends to received frames.
pub const ETH_CRC_LEN: usize = 4;

/// Maximum transmission unit reported to the network stack.
pub const ETH_MTU: usize = 1500;

/// Locally administered address used until the board provides a real one.
pub const DEFAULT_MAC_ADDRESS: [u8; 6] = hex!("02 00 00 00 00 00");

/// Errors returned by the Ethernet interface.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A descriptor needed for the frame is still owned by the DMA engine.
    /// Transient: the caller may retry or drop the frame.
    BufferBusy,
    /// The frame is empty or larger than the whole TX ring.
    InvalidLength,
    /// `init` has not completed.
    NotInitialized,
    /// The PHY reports no link; the DMA engine is stopped.
    LinkDown,
    /// The DMA engine did not leave software reset in time.
    ResetTimeout,
    /// The SMI (MDIO) bus stayed busy past the configured timeout.
    SmiTimeout,
    /// The PHY did not clear its soft reset bit in time.
    PhyResetTimeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::BufferBusy => "transmit descriptor busy",
            Error::InvalidLength => "invalid frame length",
            Error::NotInitialized => "interface not initialized",
            Error::LinkDown => "link down",
            Error::ResetTimeout => "DMA software reset timed out",
            Error::SmiTimeout => "SMI access timed out",
            Error::PhyResetTimeout => "PHY reset timed out",
        };
        f.write_str(msg)
    }
}

/// Checksum insertion performed by the MAC on transmitted frames.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ChecksumInsertion {
    Disabled = 0b00,
    IpHeader = 0b01,
    IpHeaderAndPayload = 0b10,
    /// Header and payload including the pseudo-header.
    Full = 0b11,
}

/// Programmable DMA burst length, in beats.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum BurstLength {
    Beats1 = 1,
    Beats2 = 2,
    Beats4 = 4,
    Beats8 = 8,
    Beats16 = 16,
    Beats32 = 32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Speed {
    Mbps10,
    Mbps100,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Duplex {
    Half,
    Full,
}

pub struct EthConfig {
    pub mac_address: MacAddress,
    pub checksum: ChecksumInsertion,
    pub burst_length: BurstLength,
    pub store_and_forward: bool,
    pub loopback: bool,
    pub speed: Speed,
    pub duplex: Duplex,
    pub drop_error_frames: bool,
    pub phy_address: u8,
    pub reset_timeout: MicrosDurationU32,
    pub smi_timeout: MicrosDurationU32,
}

impl Default for EthConfig {
    fn default() -> Self {
        EthConfigBuilder::new().build()
    }
}

pub struct EthConfigBuilder {
    mac_address: MacAddress,
    checksum: ChecksumInsertion,
    burst_length: BurstLength,
    store_and_forward: bool,
    loopback: bool,
    speed: Speed,
    duplex: Duplex,
    drop_error_frames: bool,
    phy_address: u8,
    reset_timeout: Option<MicrosDurationU32>,
    smi_timeout: Option<MicrosDurationU32>,
}

impl Default for EthConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EthConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            mac_address: MacAddress(DEFAULT_MAC_ADDRESS),
            checksum: ChecksumInsertion::Full,
            burst_length: BurstLength::Beats32,
            store_and_forward: true,
            loopback: false,
            speed: Speed::Mbps100,
            duplex: Duplex::Full,
            drop_error_frames: true,
            phy_address: 0,
            reset_timeout: None,
            smi_timeout: None,
        }
    }
    #[must_use]
    pub fn mac_address(mut self, mac: [u8; 6]) -> Self {
        self.mac_address = MacAddress(mac);
        self
    }
    #[must_use]
    pub fn checksum(mut self, mode: ChecksumInsertion) -> Self {
        self.checksum = mode;
        self
    }
    #[must_use]
    pub fn burst_length(mut self, beats: BurstLength) -> Self {
        self.burst_length = beats;
        self
    }
    #[must_use]
    pub fn store_and_forward(mut self, enabled: bool) -> Self {
        self.store_and_forward = enabled;
        self
    }
    #[must_use]
    pub fn loopback(mut self, enabled: bool) -> Self {
        self.loopback = enabled;
        self
    }
    #[must_use]
    pub fn speed(mut self, speed: Speed) -> Self {
        self.speed = speed;
        self
    }
    #[must_use]
    pub fn duplex(mut self, duplex: Duplex) -> Self {
        self.duplex = duplex;
        self
    }
    #[must_use]
    pub fn drop_error_frames(mut self, enabled: bool) -> Self {
        self.drop_error_frames = enabled;
        self
    }
    #[must_use]
    pub fn phy_address(mut self, address: u8) -> Self {
        self.phy_address = address & 0x1f;
        self
    }
    #[must_use]
    pub fn reset_timeout(mut self, timeout: MicrosDurationU32) -> Self {
        self.reset_timeout = Some(timeout);
        self
    }
    #[must_use]
    pub fn smi_timeout(mut self, timeout: MicrosDurationU32) -> Self {
        self.smi_timeout = Some(timeout);
        self
    }
    #[must_use]
    pub fn build(self) -> EthConfig {
        EthConfig {
            mac_address: self.mac_address,
            checksum: self.checksum,
            burst_length: self.burst_length,
            store_and_forward: self.store_and_forward,
            loopback: self.loopback,
            speed: self.speed,
            duplex: self.duplex,
            drop_error_frames: self.drop_error_frames,
            phy_address: self.phy_address,
            reset_timeout: self
                .reset_timeout
                .unwrap_or(MicrosDurationU32::millis(10)),
            smi_timeout: self.smi_timeout.unwrap_or(MicrosDurationU32::millis(1)),
        }
    }
}
