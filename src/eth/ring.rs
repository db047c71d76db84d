// Licensed under the Apache-2.0 license

//! Fixed-size descriptor rings and the walker that moves through them.
//!
//! A ring owns `N` descriptors and `N` word aligned buffers, bonded one to one.
//! Software walks the ring through an index link table built at construction
//! time; the physical `next` addresses written into the descriptors are only
//! there for the DMA engine and are never followed by software.
//!
//! Once [`DescriptorRing::link_descriptors`] has published the ring's
//! addresses to hardware, the ring must not move. The interface only holds
//! rings through `&'static mut`.

use core::sync::atomic::{fence, Ordering};

use heapless::Vec;

use crate::eth::descriptor::{Descriptor, Owner, RxDescriptor, TxDescriptor};

/// One hardware buffer.
#[derive(Clone)]
#[repr(C, align(4))]
pub struct DmaBuffer<const BUF: usize>(pub [u8; BUF]);

impl<const BUF: usize> DmaBuffer<BUF> {
    pub const fn new() -> Self {
        Self([0; BUF])
    }
}

impl<const BUF: usize> Default for DmaBuffer<BUF> {
    fn default() -> Self {
        Self::new()
    }
}

/// Orders every prior descriptor and buffer write before the writes that
/// follow, as seen from the DMA master.
#[inline(always)]
pub(crate) fn dma_barrier() {
    fence(Ordering::SeqCst);
    #[cfg(target_arch = "arm")]
    cortex_m::asm::dsb();
}

pub struct DescriptorRing<D, const N: usize, const BUF: usize> {
    descriptors: [D; N],
    buffers: [DmaBuffer<BUF>; N],
    links: [usize; N],
    cursor: usize,
}

pub type TxRing<const N: usize, const BUF: usize> = DescriptorRing<TxDescriptor, N, BUF>;
pub type RxRing<const N: usize, const BUF: usize> = DescriptorRing<RxDescriptor, N, BUF>;

impl<D: Descriptor, const N: usize, const BUF: usize> Default for DescriptorRing<D, N, BUF> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Descriptor, const N: usize, const BUF: usize> DescriptorRing<D, N, BUF> {
    /// Creates an unlinked ring. Every descriptor is software owned and
    /// invisible to hardware until [`link_descriptors`](Self::link_descriptors).
    ///
    /// `BUF` is checked at compile time against the descriptor's size field:
    ///
    /// ```compile_fail
    /// use hc32f4a0_ddk::eth::{DescriptorRing, TxRing};
    /// let ring: TxRing<2, 8192> = DescriptorRing::new();
    /// ```
    ///
    /// ```compile_fail
    /// use hc32f4a0_ddk::eth::{DescriptorRing, RxRing};
    /// let ring: RxRing<2, 1522> = DescriptorRing::new();
    /// ```
    pub fn new() -> Self {
        const {
            assert!(N > 0, "a descriptor ring needs at least one entry");
            assert!(
                BUF > 0 && BUF <= D::MAX_BUFFER_LEN,
                "buffer size does not fit the descriptor size field"
            );
            assert!(
                BUF % D::BUFFER_ALIGN == 0,
                "buffer size is not a multiple of the descriptor buffer alignment"
            );
        };
        Self {
            descriptors: core::array::from_fn(|_| D::empty()),
            buffers: core::array::from_fn(|_| DmaBuffer::new()),
            links: core::array::from_fn(|i| (i + 1) % N),
            cursor: 0,
        }
    }

    /// Writes buffer and next-descriptor addresses into every descriptor,
    /// rewinds the cursor and sets each descriptor to its initial owner.
    pub fn link_descriptors(&mut self) {
        let descriptor_base = self.descriptors.as_ptr();
        let buffer_base = self.buffers.as_ptr();
        for (i, desc) in self.descriptors.iter_mut().enumerate() {
            let next = self.links.get(i).copied().unwrap_or(0);
            let buffer = buffer_base.wrapping_add(i) as usize as u32;
            let next_addr = descriptor_base.wrapping_add(next) as usize as u32;
            desc.link(buffer, BUF, next_addr);
        }
        self.cursor = 0;
        dma_barrier();
        for desc in &self.descriptors {
            desc.set_owner(D::INITIAL_OWNER);
        }
    }

    /// Hardware address of the first descriptor, for the DMA list registers.
    pub fn base_address(&self) -> u32 {
        self.descriptors.as_ptr() as usize as u32
    }

    #[allow(clippy::len_without_is_empty)]
    pub const fn len(&self) -> usize {
        N
    }

    pub const fn buffer_capacity(&self) -> usize {
        BUF
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Successor of `index` in the ring.
    pub fn next_index(&self, index: usize) -> usize {
        self.links.get(index).copied().unwrap_or(0)
    }

    /// Moves the cursor one link forward.
    pub fn advance(&mut self) {
        self.cursor = self.next_index(self.cursor);
    }

    pub fn advance_by(&mut self, count: usize) {
        for _ in 0..count {
            self.advance();
        }
    }

    pub fn peek_ownership(&self) -> Owner {
        self.owner_at(self.cursor)
    }

    /// Out of range indices report `Owner::Hardware` so they are never
    /// treated as writable.
    pub fn owner_at(&self, index: usize) -> Owner {
        self.descriptors
            .get(index)
            .map_or(Owner::Hardware, Descriptor::owner)
    }

    /// Snapshot of every descriptor's owner, in ring order from index 0.
    pub fn owners(&self) -> [Owner; N] {
        core::array::from_fn(|i| self.owner_at(i))
    }

    pub fn descriptor(&self, index: usize) -> Option<&D> {
        self.descriptors.get(index)
    }

    pub fn descriptor_mut(&mut self, index: usize) -> Option<&mut D> {
        self.descriptors.get_mut(index)
    }

    /// The buffer bonded to `index`, or `None` while hardware owns it.
    pub fn buffer(&self, index: usize) -> Option<&[u8; BUF]> {
        match self.owner_at(index) {
            Owner::Software => self.buffers.get(index).map(|b| &b.0),
            Owner::Hardware => None,
        }
    }

    pub fn buffer_mut(&mut self, index: usize) -> Option<&mut [u8; BUF]> {
        match self.owner_at(index) {
            Owner::Software => self.buffers.get_mut(index).map(|b| &mut b.0),
            Owner::Hardware => None,
        }
    }

    /// Hands `count` descriptors starting at `first` to hardware.
    ///
    /// OWN is set from the last descriptor back to the first, so the DMA
    /// engine can never pick up the head of a chain whose tail is still being
    /// prepared.
    pub fn hand_to_hardware(&mut self, first: usize, count: usize) {
        let mut chain: Vec<usize, N> = Vec::new();
        let mut index = first;
        for _ in 0..count.min(N) {
            if chain.push(index).is_err() {
                break;
            }
            index = self.next_index(index);
        }

        dma_barrier();
        for &i in chain.iter().rev() {
            if let Some(desc) = self.descriptors.get(i) {
                desc.set_owner(Owner::Hardware);
            }
        }
        dma_barrier();
    }
}

// Buffer access for the simulated DMA engine, which ignores ownership.
#[cfg(test)]
impl<D: Descriptor, const N: usize, const BUF: usize> DescriptorRing<D, N, BUF> {
    pub(crate) fn dma_buffer(&self, index: usize) -> &[u8; BUF] {
        &self.buffers[index].0
    }

    pub(crate) fn dma_buffer_mut(&mut self, index: usize) -> &mut [u8; BUF] {
        &mut self.buffers[index].0
    }
}
