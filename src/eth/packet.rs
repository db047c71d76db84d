// Licensed under the Apache-2.0 license

//! Scatter/gather packet chains.
//!
//! The interface never owns the network stack's packets; it only walks their
//! segments. Anything that can list its bytes as a sequence of slices can be
//! transmitted, and receive destinations come from a [`PacketAllocator`].

use heapless::Vec;

/// A readable chain of byte segments forming one frame.
pub trait PacketBuf {
    fn segments(&self) -> impl Iterator<Item = &[u8]>;

    /// Sum of all segment lengths.
    fn total_len(&self) -> usize {
        self.segments().map(<[u8]>::len).sum()
    }
}

/// A writable chain of byte segments.
pub trait PacketBufMut: PacketBuf {
    fn segments_mut(&mut self) -> impl Iterator<Item = &mut [u8]>;
}

/// Source of receive packets, sized to the incoming frame.
pub trait PacketAllocator {
    type Packet: PacketBufMut;

    /// Returns a chain whose total length is exactly `len`, or `None` when no
    /// memory is available.
    fn allocate(&mut self, len: usize) -> Option<Self::Packet>;
}

impl PacketBuf for [u8] {
    fn segments(&self) -> impl Iterator<Item = &[u8]> {
        core::iter::once(self)
    }
}

impl<const K: usize> PacketBuf for [u8; K] {
    fn segments(&self) -> impl Iterator<Item = &[u8]> {
        core::iter::once(self.as_slice())
    }
}

impl PacketBuf for [&[u8]] {
    fn segments(&self) -> impl Iterator<Item = &[u8]> {
        self.iter().map(|segment| &**segment)
    }
}

impl<const K: usize> PacketBuf for [&[u8]; K] {
    fn segments(&self) -> impl Iterator<Item = &[u8]> {
        self.iter().map(|segment| &**segment)
    }
}

/// Fixed-capacity packet made of up to `MAX_SEGS` segments of `SEG` bytes.
#[derive(Clone, Debug, Default)]
pub struct Packet<const SEG: usize, const MAX_SEGS: usize> {
    segments: Vec<Vec<u8, SEG>, MAX_SEGS>,
}

impl<const SEG: usize, const MAX_SEGS: usize> Packet<SEG, MAX_SEGS> {
    pub const CAPACITY: usize = SEG * MAX_SEGS;

    /// A zero-filled packet of `len` bytes, split into full `SEG` sized
    /// segments followed by the remainder.
    pub fn with_len(len: usize) -> Option<Self> {
        if len > Self::CAPACITY || SEG == 0 {
            return None;
        }
        let mut segments = Vec::new();
        let mut remaining = len;
        while remaining > 0 {
            let take = remaining.min(SEG);
            let mut segment = Vec::new();
            segment.resize(take, 0).ok()?;
            segments.push(segment).ok()?;
            remaining -= take;
        }
        Some(Self { segments })
    }

    /// Builds a packet holding `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let mut packet = Self::with_len(bytes.len())?;
        let mut offset = 0;
        for segment in packet.segments_mut() {
            let end = offset + segment.len();
            segment.copy_from_slice(bytes.get(offset..end)?);
            offset = end;
        }
        Some(packet)
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Gathers the packet into `out`, returning the number of bytes written.
    pub fn copy_to(&self, out: &mut [u8]) -> usize {
        let mut written = 0;
        for segment in self.segments() {
            let Some(dst) = out.get_mut(written..written + segment.len()) else {
                break;
            };
            dst.copy_from_slice(segment);
            written += segment.len();
        }
        written
    }
}

impl<const SEG: usize, const MAX_SEGS: usize> PacketBuf for Packet<SEG, MAX_SEGS> {
    fn segments(&self) -> impl Iterator<Item = &[u8]> {
        self.segments.iter().map(Vec::as_slice)
    }
}

impl<const SEG: usize, const MAX_SEGS: usize> PacketBufMut for Packet<SEG, MAX_SEGS> {
    fn segments_mut(&mut self) -> impl Iterator<Item = &mut [u8]> {
        self.segments.iter_mut().map(Vec::as_mut_slice)
    }
}

/// Allocator handing out [`Packet`]s, optionally limited to a number of
/// outstanding allocations.
#[derive(Clone, Debug, Default)]
pub struct HeaplessAllocator<const SEG: usize, const MAX_SEGS: usize> {
    budget: Option<usize>,
}

impl<const SEG: usize, const MAX_SEGS: usize> HeaplessAllocator<SEG, MAX_SEGS> {
    pub const fn new() -> Self {
        Self { budget: None }
    }

    /// Allocator that fails after `count` successful allocations.
    pub const fn with_budget(count: usize) -> Self {
        Self {
            budget: Some(count),
        }
    }
}

impl<const SEG: usize, const MAX_SEGS: usize> PacketAllocator for HeaplessAllocator<SEG, MAX_SEGS> {
    type Packet = Packet<SEG, MAX_SEGS>;

    fn allocate(&mut self, len: usize) -> Option<Self::Packet> {
        match self.budget {
            Some(0) => return None,
            Some(ref mut left) => *left -= 1,
            None => {}
        }
        Packet::with_len(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_chains() {
        let a = [1u8, 2, 3];
        let b = [4u8, 5];
        let chain: [&[u8]; 2] = [&a, &b];
        assert_eq!(chain.total_len(), 5);
        assert_eq!(chain.segments().count(), 2);

        let flat = [0u8; 60];
        assert_eq!(flat.total_len(), 60);
        assert_eq!(flat[..10].total_len(), 10);
    }

    #[test]
    fn test_packet_splits_into_segments() {
        let packet = Packet::<16, 4>::with_len(40).unwrap();
        let lens: std::vec::Vec<usize> = packet.segments().map(<[u8]>::len).collect();
        assert_eq!(lens, [16, 16, 8]);
        assert_eq!(packet.total_len(), 40);

        assert!(Packet::<16, 4>::with_len(65).is_none());
        assert_eq!(Packet::<16, 4>::with_len(0).unwrap().segment_count(), 0);
    }

    #[test]
    fn test_packet_from_slice_and_copy_to() {
        let bytes: std::vec::Vec<u8> = (0..50u8).collect();
        let packet = Packet::<16, 4>::from_slice(&bytes).unwrap();
        let mut out = [0u8; 64];
        assert_eq!(packet.copy_to(&mut out), 50);
        assert_eq!(&out[..50], bytes.as_slice());
    }

    #[test]
    fn test_allocator_budget() {
        let mut alloc = HeaplessAllocator::<16, 4>::with_budget(1);
        assert!(alloc.allocate(10).is_some());
        assert!(alloc.allocate(10).is_none());

        let mut unlimited = HeaplessAllocator::<16, 4>::new();
        assert!(unlimited.allocate(64).is_some());
        assert!(unlimited.allocate(65).is_none());
    }
}
