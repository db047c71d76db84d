// Licensed under the Apache-2.0 license

//! The network interface: both rings, the hardware backend and the entry
//! points a network stack drives.
//!
//! # Usage
//!
//! ```rust,ignore
//! use hc32f4a0_ddk::common::NoOpLogger;
//! use hc32f4a0_ddk::eth::{
//!     DescriptorRing, EthConfigBuilder, EthernetIf, Hc32f4a0Eth, HeaplessAllocator, RxRing,
//!     TxRing,
//! };
//!
//! let tx = cortex_m::singleton!(: TxRing<4, 1524> = DescriptorRing::new()).unwrap();
//! let rx = cortex_m::singleton!(: RxRing<4, 1524> = DescriptorRing::new()).unwrap();
//! let hw = unsafe { Hc32f4a0Eth::steal() };
//! let config = EthConfigBuilder::new().mac_address([0x02, 0, 0, 0x12, 0x34, 0x56]).build();
//! let mut netif: EthernetIf<Hc32f4a0Eth> = EthernetIf::new(hw, config, NoOpLogger, tx, rx);
//! netif.init(&mut delay)?;
//!
//! netif.transmit(frame.as_slice())?;
//! let mut alloc = HeaplessAllocator::<256, 6>::new();
//! netif.poll_input(&mut alloc, |packet| stack.input(packet));
//! ```
//!
//! The DMA engine holds the addresses of the descriptors, so the rings are
//! borrowed for `'static` and stay put however the interface itself moves.

use embedded_hal::delay::DelayNs;

use crate::common::{poll_with_timeout, Logger, NoOpLogger};
use crate::eth::common::{
    EthConfig, Error, ETH_BUF_SIZE, ETH_MTU, ETH_RX_BUF_NUM, ETH_TX_BUF_NUM,
};
use crate::eth::frame::{EthernetHeader, MacAddress};
use crate::eth::hardware::{DmaStatus, EthDmaHardware, SmiBus};
use crate::eth::packet::{PacketAllocator, PacketBuf};
use crate::eth::phy::{self, LinkState};
use crate::eth::recovery::{recover_receive, recover_transmit};
use crate::eth::ring::{RxRing, TxRing};
use crate::eth::transfer::{self, RxFrame, RxScan};

/// Interface counters. All counters wrap.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub tx_frames: u32,
    pub tx_bytes: u32,
    /// Transmits refused with `BufferBusy`.
    pub tx_busy: u32,
    /// TX underflows cleared and resumed. Idle suspensions are not counted.
    pub tx_recoveries: u32,
    pub rx_frames: u32,
    pub rx_bytes: u32,
    /// Frames dropped because no packet could be allocated.
    pub rx_dropped: u32,
    /// Error frames and orphan segments recycled without delivery.
    pub rx_errors: u32,
    pub rx_recoveries: u32,
    pub rx_broadcast: u32,
    pub rx_multicast: u32,
}

fn bump(counter: &mut u32, by: usize) {
    *counter = counter.wrapping_add(by as u32);
}

pub struct EthernetIf<
    H,
    L = NoOpLogger,
    const TX: usize = ETH_TX_BUF_NUM,
    const RX: usize = ETH_RX_BUF_NUM,
    const BUF: usize = ETH_BUF_SIZE,
> {
    hardware: H,
    config: EthConfig,
    logger: L,
    tx_ring: &'static mut TxRing<TX, BUF>,
    rx_ring: &'static mut RxRing<RX, BUF>,
    stats: Stats,
    link: LinkState,
    initialized: bool,
}

impl<H, L, const TX: usize, const RX: usize, const BUF: usize> EthernetIf<H, L, TX, RX, BUF>
where
    H: EthDmaHardware,
    L: Logger,
{
    pub fn new(
        hardware: H,
        config: EthConfig,
        logger: L,
        tx_ring: &'static mut TxRing<TX, BUF>,
        rx_ring: &'static mut RxRing<RX, BUF>,
    ) -> Self {
        Self {
            hardware,
            config,
            logger,
            tx_ring,
            rx_ring,
            stats: Stats::default(),
            link: LinkState::Down,
            initialized: false,
        }
    }

    /// Resets the DMA engine, programs it from the configuration, links both
    /// rings and starts transmission and reception.
    ///
    /// The link is assumed up until [`update_link`](Self::update_link) says
    /// otherwise.
    ///
    /// # Errors
    ///
    /// `Error::ResetTimeout` when the engine does not leave software reset
    /// within `config.reset_timeout`. The interface stays uninitialized.
    pub fn init<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error> {
        self.initialized = false;
        self.hardware.software_reset();
        let hardware = &self.hardware;
        let reset = poll_with_timeout(delay, self.config.reset_timeout, || {
            if hardware.is_reset_complete() {
                Ok(())
            } else {
                Err(nb::Error::<()>::WouldBlock)
            }
        });
        if reset.is_err() {
            self.logger
                .error(format_args!("eth: DMA stuck in software reset"));
            return Err(Error::ResetTimeout);
        }

        self.hardware.configure(&self.config);
        self.hardware.set_mac_address(&self.config.mac_address);
        self.tx_ring.link_descriptors();
        self.rx_ring.link_descriptors();
        self.hardware
            .set_descriptor_lists(self.tx_ring.base_address(), self.rx_ring.base_address());
        self.hardware.start();

        self.link = LinkState::Up;
        self.initialized = true;
        self.logger.info(format_args!(
            "eth: up, mac {:?}, {} tx / {} rx buffers of {} bytes",
            self.config.mac_address, TX, RX, BUF
        ));
        Ok(())
    }

    /// Queues one frame for transmission.
    ///
    /// The frame is copied into as many TX buffers as it needs and handed to
    /// the DMA engine in one step. A single attempt is made; on `BufferBusy`
    /// the caller decides whether to retry or drop.
    ///
    /// # Errors
    ///
    /// `NotInitialized`, `LinkDown`, `InvalidLength` for empty or oversized
    /// frames, and `BufferBusy` when the ring is still full of pending frames.
    pub fn transmit<P: PacketBuf + ?Sized>(&mut self, packet: &P) -> Result<(), Error> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        if self.link == LinkState::Down {
            return Err(Error::LinkDown);
        }

        let result = transfer::copy_to_ring(self.tx_ring, packet);
        match result {
            Ok(plan) => {
                transfer::commit_transmit(self.tx_ring, &plan, self.config.checksum);
                // Poll demand; the engine suspends whenever it drains the ring.
                self.hardware.resume_transmit();
                bump(&mut self.stats.tx_frames, 1);
                bump(&mut self.stats.tx_bytes, plan.len);
            }
            Err(Error::BufferBusy) => {
                bump(&mut self.stats.tx_busy, 1);
                self.logger
                    .debug(format_args!("eth: tx descriptor {} busy", self.tx_ring.cursor()));
            }
            Err(e) => {
                self.logger.warn(format_args!("eth: tx rejected: {e}"));
            }
        }

        let cleared = recover_transmit(&mut self.hardware);
        if cleared.contains(DmaStatus::TX_UNDERFLOW) {
            bump(&mut self.stats.tx_recoveries, 1);
            self.logger.warn(format_args!("eth: tx underflow, resumed"));
        } else if !cleared.is_empty() {
            self.logger.debug(format_args!("eth: tx idle, resumed"));
        }
        result.map(|_| ())
    }

    /// Takes the next completed frame out of the RX ring.
    ///
    /// Returns `None` when no complete frame is pending, or when `alloc` could
    /// not provide a packet; in that case the frame is dropped but its
    /// descriptors are still returned to the DMA engine.
    pub fn receive<A: PacketAllocator>(&mut self, alloc: &mut A) -> Option<A::Packet> {
        if !self.initialized {
            return None;
        }

        let packet = loop {
            match transfer::scan_frame(self.rx_ring) {
                RxScan::Empty => break None,
                RxScan::Orphan => {
                    bump(&mut self.stats.rx_errors, 1);
                    self.logger
                        .debug(format_args!("eth: recycled orphan rx segment"));
                }
                RxScan::Frame(mut frame) if frame.error && self.config.drop_error_frames => {
                    transfer::release_frame(self.rx_ring, &mut frame);
                    bump(&mut self.stats.rx_errors, 1);
                    self.logger
                        .warn(format_args!("eth: dropped rx error frame ({} bytes)", frame.len));
                }
                RxScan::Frame(mut frame) => {
                    let packet = alloc.allocate(frame.len).map(|mut packet| {
                        transfer::copy_from_ring(self.rx_ring, &frame, &mut packet);
                        packet
                    });
                    if packet.is_some() {
                        // Buffers must still be software owned here.
                        self.classify(&frame);
                    }
                    transfer::release_frame(self.rx_ring, &mut frame);
                    if packet.is_some() {
                        bump(&mut self.stats.rx_frames, 1);
                        bump(&mut self.stats.rx_bytes, frame.len);
                    } else {
                        bump(&mut self.stats.rx_dropped, 1);
                        self.logger.debug(format_args!(
                            "eth: no memory for {} byte frame, dropped",
                            frame.len
                        ));
                    }
                    break packet;
                }
            }
        };

        if recover_receive(&mut self.hardware) {
            bump(&mut self.stats.rx_recoveries, 1);
            self.logger
                .warn(format_args!("eth: rx buffer unavailable, resumed"));
        }
        packet
    }

    /// Drains every pending frame into `deliver`. Stops early when `alloc`
    /// runs dry. Returns the number of frames delivered.
    pub fn poll_input<A, F>(&mut self, alloc: &mut A, mut deliver: F) -> usize
    where
        A: PacketAllocator,
        F: FnMut(A::Packet),
    {
        let mut delivered = 0;
        while let Some(packet) = self.receive(alloc) {
            deliver(packet);
            delivered += 1;
        }
        delivered
    }

    fn classify(&mut self, frame: &RxFrame) {
        let header = self
            .rx_ring
            .buffer(frame.first)
            .and_then(|buffer| EthernetHeader::parse(buffer));
        if let Some(header) = header {
            if header.destination.is_broadcast() {
                bump(&mut self.stats.rx_broadcast, 1);
            } else if header.destination.is_multicast() {
                bump(&mut self.stats.rx_multicast, 1);
            }
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn mac_address(&self) -> MacAddress {
        self.config.mac_address
    }

    pub fn mtu(&self) -> usize {
        ETH_MTU
    }

    pub fn link_state(&self) -> LinkState {
        self.link
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &EthConfig {
        &self.config
    }

    pub fn tx_ring(&self) -> &TxRing<TX, BUF> {
        &*self.tx_ring
    }

    pub fn rx_ring(&self) -> &RxRing<RX, BUF> {
        &*self.rx_ring
    }

    pub fn hardware(&self) -> &H {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }

    pub fn logger_mut(&mut self) -> &mut L {
        &mut self.logger
    }

    #[cfg(test)]
    pub(crate) fn parts_mut(&mut self) -> (&mut H, &TxRing<TX, BUF>, &mut RxRing<RX, BUF>) {
        (&mut self.hardware, &*self.tx_ring, &mut *self.rx_ring)
    }
}

impl<H, L, const TX: usize, const RX: usize, const BUF: usize> EthernetIf<H, L, TX, RX, BUF>
where
    H: EthDmaHardware + SmiBus,
    L: Logger,
{
    /// Soft-resets the PHY and starts auto-negotiation. Returns the PHY
    /// identifier.
    ///
    /// # Errors
    ///
    /// `SmiTimeout` if the PHY cannot be reached, `PhyResetTimeout` if it
    /// stays in reset past `config.reset_timeout`.
    pub fn init_phy<D: DelayNs>(&mut self, delay: &mut D) -> Result<u32, Error> {
        let timeout = self.config.smi_timeout;
        let address = self.config.phy_address;
        let result = phy::identifier(&mut self.hardware, delay, timeout, address).and_then(|id| {
            phy::reset(
                &mut self.hardware,
                delay,
                timeout,
                self.config.reset_timeout,
                address,
            )?;
            phy::start_autonegotiation(&mut self.hardware, delay, timeout, address)?;
            Ok(id)
        });
        match result {
            Ok(id) => self
                .logger
                .info(format_args!("eth: phy {address} id {id:#010x}, autoneg started")),
            Err(e) => self.logger.error(format_args!("eth: phy init failed: {e}")),
        }
        result
    }

    /// Samples the PHY link bit and starts or stops the DMA engine when it
    /// changed.
    ///
    /// # Errors
    ///
    /// `NotInitialized` before `init`, `SmiTimeout` if the PHY cannot be read.
    pub fn update_link<D: DelayNs>(&mut self, delay: &mut D) -> Result<LinkState, Error> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        let state = match phy::link_state(
            &mut self.hardware,
            delay,
            self.config.smi_timeout,
            self.config.phy_address,
        ) {
            Ok(state) => state,
            Err(e) => {
                self.logger.error(format_args!("eth: phy read failed: {e}"));
                return Err(e);
            }
        };

        if state != self.link {
            match state {
                LinkState::Up => self.hardware.start(),
                LinkState::Down => self.hardware.stop(),
            }
            self.logger.info(format_args!("eth: link {state:?}"));
            self.link = state;
        }
        Ok(state)
    }
}
