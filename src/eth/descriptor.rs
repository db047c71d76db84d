// Licensed under the Apache-2.0 license

//! DMA descriptor layouts for the HC32F4A0 Ethernet DMA.
//!
//! The DMA engine uses the enhanced (eight word) GMAC descriptor format in
//! chained mode: every descriptor points at exactly one buffer and at the next
//! descriptor of its ring.
//!
//! The DMA engine reads and writes descriptors behind our back while they are
//! OWNed by hardware, so every word lives in a [`VolatileCell`] and all
//! accessors take `&self`. The ring is responsible for never handing out a
//! buffer that belongs to hardware.

use core::cell::UnsafeCell;

use paste::paste;

use crate::eth::common::ChecksumInsertion;

/// A memory cell only ever accessed through volatile loads and stores.
#[repr(transparent)]
pub struct VolatileCell<T: Copy>(UnsafeCell<T>);

impl<T: Copy> VolatileCell<T> {
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    #[inline(always)]
    pub fn get(&self) -> T {
        // SAFETY: the pointer comes from a live UnsafeCell and T is Copy.
        unsafe { core::ptr::read_volatile(self.0.get()) }
    }

    #[inline(always)]
    pub fn set(&self, value: T) {
        // SAFETY: see `get`; the cell is never borrowed across this write.
        unsafe { core::ptr::write_volatile(self.0.get(), value) }
    }
}

/// Which side may touch a descriptor and its buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Owner {
    Software,
    Hardware,
}

/// Operations the ring needs from a descriptor type.
pub trait Descriptor {
    /// Ownership of every descriptor once its ring is linked.
    const INITIAL_OWNER: Owner;
    /// Largest buffer the descriptor's size field can describe.
    const MAX_BUFFER_LEN: usize;
    /// Buffer sizes must be a multiple of this.
    const BUFFER_ALIGN: usize;

    fn empty() -> Self;

    /// Bonds the descriptor to its buffer and to the next descriptor of the
    /// ring. Called while the ring is not yet visible to hardware.
    fn link(&mut self, buffer: u32, buffer_len: usize, next: u32);

    fn owner(&self) -> Owner;

    /// Flips the OWN bit. Setting `Owner::Hardware` publishes the descriptor to
    /// the DMA engine; the ring issues the required barrier first.
    fn set_owner(&self, owner: Owner);

    /// Hardware address stored as the next link.
    fn next_address(&self) -> u32;

    /// Hardware address of the bonded buffer.
    fn buffer_address(&self) -> u32;
}

/// Bit positions shared by TDES0 and RDES0.
pub const DES0_OWN: u32 = 1 << 31;

/// TDES0 control/status bits.
pub mod tdes0 {
    pub const IC: u32 = 1 << 30;
    pub const LS: u32 = 1 << 29;
    pub const FS: u32 = 1 << 28;
    pub const DC: u32 = 1 << 27;
    pub const DP: u32 = 1 << 26;
    pub const CIC_SHIFT: u32 = 22;
    pub const CIC_MASK: u32 = 0b11 << CIC_SHIFT;
    pub const TER: u32 = 1 << 21;
    pub const TCH: u32 = 1 << 20;
    pub const ES: u32 = 1 << 15;
    pub const JT: u32 = 1 << 14;
    pub const FF: u32 = 1 << 13;
    pub const LCA: u32 = 1 << 11;
    pub const NC: u32 = 1 << 10;
    pub const LCO: u32 = 1 << 9;
    pub const EC: u32 = 1 << 8;
    pub const UF: u32 = 1 << 1;
}

/// TDES1 buffer size fields.
pub mod tdes1 {
    pub const TBS1_MASK: u32 = 0x1fff;
}

/// RDES0 status bits.
pub mod rdes0 {
    pub const FL_SHIFT: u32 = 16;
    pub const FL_MASK: u32 = 0x3fff << FL_SHIFT;
    pub const ES: u32 = 1 << 15;
    pub const DE: u32 = 1 << 14;
    pub const LE: u32 = 1 << 12;
    pub const OE: u32 = 1 << 11;
    pub const FS: u32 = 1 << 9;
    pub const LS: u32 = 1 << 8;
    pub const LC: u32 = 1 << 6;
    pub const RWT: u32 = 1 << 4;
    pub const RE: u32 = 1 << 3;
    pub const DBE: u32 = 1 << 2;
    pub const CE: u32 = 1 << 1;
}

/// RDES1 control bits.
pub mod rdes1 {
    pub const DIC: u32 = 1 << 31;
    pub const RER: u32 = 1 << 15;
    pub const RCH: u32 = 1 << 14;
    pub const RBS1_MASK: u32 = 0x1fff;
}

/// Generates `is_<flag>()` accessors over the status word.
macro_rules! status_flags {
    ($($flag:ident => $mask:expr),+ $(,)?) => {
        paste! {
            $(
                #[inline(always)]
                #[must_use]
                pub fn [<is_ $flag>](&self) -> bool {
                    self.status.get() & $mask != 0
                }
            )+
        }
    };
}

/// Enhanced transmit descriptor.
#[repr(C, align(4))]
pub struct TxDescriptor {
    status: VolatileCell<u32>,
    buffer_size: VolatileCell<u32>,
    buffer1: VolatileCell<u32>,
    next: VolatileCell<u32>,
    extended_status: VolatileCell<u32>,
    reserved: VolatileCell<u32>,
    timestamp_low: VolatileCell<u32>,
    timestamp_high: VolatileCell<u32>,
}

impl TxDescriptor {
    pub const SIZE: usize = core::mem::size_of::<Self>();

    pub const fn new() -> Self {
        Self {
            status: VolatileCell::new(0),
            buffer_size: VolatileCell::new(0),
            buffer1: VolatileCell::new(0),
            next: VolatileCell::new(0),
            extended_status: VolatileCell::new(0),
            reserved: VolatileCell::new(0),
            timestamp_low: VolatileCell::new(0),
            timestamp_high: VolatileCell::new(0),
        }
    }

    status_flags! {
        first_segment => tdes0::FS,
        last_segment => tdes0::LS,
    }

    /// Fills in one segment of an outgoing frame. Never touches OWN.
    pub fn prepare(&mut self, len: usize, first: bool, last: bool, checksum: ChecksumInsertion) {
        let mut status = self.status.get()
            & !(DES0_OWN | tdes0::FS | tdes0::LS | tdes0::CIC_MASK | tdes0::IC);
        status |= (checksum as u32) << tdes0::CIC_SHIFT;
        if first {
            status |= tdes0::FS;
        }
        if last {
            status |= tdes0::LS | tdes0::IC;
        }
        self.status.set(status);
        self.buffer_size.set(len as u32 & tdes1::TBS1_MASK);
    }

    /// Byte count programmed for this segment.
    #[must_use]
    pub fn segment_len(&self) -> usize {
        (self.buffer_size.get() & tdes1::TBS1_MASK) as usize
    }
}

impl Default for TxDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Descriptor for TxDescriptor {
    const INITIAL_OWNER: Owner = Owner::Software;
    const MAX_BUFFER_LEN: usize = tdes1::TBS1_MASK as usize;
    const BUFFER_ALIGN: usize = 1;

    fn empty() -> Self {
        Self::new()
    }

    fn link(&mut self, buffer: u32, _buffer_len: usize, next: u32) {
        self.status.set(tdes0::TCH);
        self.buffer_size.set(0);
        self.buffer1.set(buffer);
        self.next.set(next);
        self.extended_status.set(0);
        self.reserved.set(0);
        self.timestamp_low.set(0);
        self.timestamp_high.set(0);
    }

    #[inline(always)]
    fn owner(&self) -> Owner {
        if self.status.get() & DES0_OWN != 0 {
            Owner::Hardware
        } else {
            Owner::Software
        }
    }

    #[inline(always)]
    fn set_owner(&self, owner: Owner) {
        let status = self.status.get();
        match owner {
            Owner::Hardware => self.status.set(status | DES0_OWN),
            Owner::Software => self.status.set(status & !DES0_OWN),
        }
    }

    fn next_address(&self) -> u32 {
        self.next.get()
    }

    fn buffer_address(&self) -> u32 {
        self.buffer1.get()
    }
}

/// Enhanced receive descriptor.
#[repr(C, align(4))]
pub struct RxDescriptor {
    status: VolatileCell<u32>,
    control: VolatileCell<u32>,
    buffer1: VolatileCell<u32>,
    next: VolatileCell<u32>,
    extended_status: VolatileCell<u32>,
    reserved: VolatileCell<u32>,
    timestamp_low: VolatileCell<u32>,
    timestamp_high: VolatileCell<u32>,
}

impl RxDescriptor {
    pub const SIZE: usize = core::mem::size_of::<Self>();

    pub const fn new() -> Self {
        Self {
            status: VolatileCell::new(0),
            control: VolatileCell::new(0),
            buffer1: VolatileCell::new(0),
            next: VolatileCell::new(0),
            extended_status: VolatileCell::new(0),
            reserved: VolatileCell::new(0),
            timestamp_low: VolatileCell::new(0),
            timestamp_high: VolatileCell::new(0),
        }
    }

    status_flags! {
        first_segment => rdes0::FS,
        last_segment => rdes0::LS,
        error_summary => rdes0::ES,
    }

    /// Frame length written back by the DMA into the last descriptor of a
    /// frame. Includes the CRC.
    #[must_use]
    pub fn frame_length(&self) -> usize {
        ((self.status.get() & rdes0::FL_MASK) >> rdes0::FL_SHIFT) as usize
    }

    /// Receive buffer capacity programmed at link time.
    #[must_use]
    pub fn buffer_len(&self) -> usize {
        (self.control.get() & rdes1::RBS1_MASK) as usize
    }

    /// Hands the descriptor back to the DMA with a clean status word.
    pub fn recycle(&self) {
        self.extended_status.set(0);
        self.status.set(DES0_OWN);
    }
}

impl Default for RxDescriptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Descriptor for RxDescriptor {
    const INITIAL_OWNER: Owner = Owner::Hardware;
    const MAX_BUFFER_LEN: usize = rdes1::RBS1_MASK as usize;
    // The DMA ignores the low two bits of RBS1.
    const BUFFER_ALIGN: usize = 4;

    fn empty() -> Self {
        Self::new()
    }

    fn link(&mut self, buffer: u32, buffer_len: usize, next: u32) {
        self.status.set(0);
        self.control
            .set(rdes1::RCH | (buffer_len as u32 & rdes1::RBS1_MASK));
        self.buffer1.set(buffer);
        self.next.set(next);
        self.extended_status.set(0);
        self.reserved.set(0);
        self.timestamp_low.set(0);
        self.timestamp_high.set(0);
    }

    #[inline(always)]
    fn owner(&self) -> Owner {
        if self.status.get() & DES0_OWN != 0 {
            Owner::Hardware
        } else {
            Owner::Software
        }
    }

    #[inline(always)]
    fn set_owner(&self, owner: Owner) {
        match owner {
            Owner::Hardware => self.recycle(),
            Owner::Software => self.status.set(self.status.get() & !DES0_OWN),
        }
    }

    fn next_address(&self) -> u32 {
        self.next.get()
    }

    fn buffer_address(&self) -> u32 {
        self.buffer1.get()
    }
}

// The other side of the handshake, played by the loopback simulator in tests.
#[cfg(test)]
impl TxDescriptor {
    pub(crate) fn hw_complete(&self, status: u32) {
        self.status
            .set((self.status.get() & !DES0_OWN & !tdes0::ES & !tdes0::UF) | status);
    }
}

#[cfg(test)]
impl RxDescriptor {
    pub(crate) fn hw_write_back(&self, frame_len: usize, first: bool, last: bool, error: bool) {
        let mut status = 0;
        if first {
            status |= rdes0::FS;
        }
        if last {
            status |= rdes0::LS;
            status |= ((frame_len as u32) << rdes0::FL_SHIFT) & rdes0::FL_MASK;
            if error {
                status |= rdes0::ES | rdes0::CE;
            }
        }
        self.status.set(status);
    }
}
