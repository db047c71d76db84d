// Licensed under the Apache-2.0 license

//! Ethernet MAC/DMA driver for the HC32F4A0.
//!
//! Frames move between a network stack's scatter/gather packets and two
//! fixed rings of DMA descriptors, each descriptor bonded to one hardware
//! buffer. The OWN bit of each descriptor is the only synchronization with
//! the DMA engine:
//!
//! - [`descriptor`] describes the enhanced descriptor layout.
//! - [`ring`] owns descriptors and buffers and walks them.
//! - [`transfer`] copies frames in and out of the rings.
//! - [`recovery`] clears DMA stalls after every transfer.
//! - [`netif`] ties it together behind `transmit` and `receive`.
//!
//! Register access goes through the [`EthDmaHardware`] and [`SmiBus`] traits,
//! implemented for the silicon by [`Hc32f4a0Eth`].

pub mod common;
pub mod descriptor;
pub mod frame;
pub mod hardware;
pub mod hc32f4a0;
pub mod netif;
pub mod packet;
pub mod phy;
pub mod recovery;
pub mod ring;
pub mod transfer;

#[cfg(test)]
pub(crate) mod testing;

pub use common::{
    BurstLength, ChecksumInsertion, Duplex, Error, EthConfig, EthConfigBuilder, Speed,
};
pub use descriptor::{Descriptor, Owner, RxDescriptor, TxDescriptor};
pub use frame::{EthernetHeader, MacAddress};
pub use hardware::{DmaStatus, EthDmaHardware, SmiBus};
pub use hc32f4a0::Hc32f4a0Eth;
pub use netif::{EthernetIf, Stats};
pub use packet::{HeaplessAllocator, Packet, PacketAllocator, PacketBuf, PacketBufMut};
pub use phy::LinkState;
pub use ring::{DescriptorRing, DmaBuffer, RxRing, TxRing};
