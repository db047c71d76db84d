// Licensed under the Apache-2.0 license

//! Copy engine between packet chains and the hardware buffers of a ring.
//!
//! Transmit splits a chain across as many buffers as it needs, moving to the
//! next descriptor only once the current buffer is full and bytes remain, so
//! a frame that ends exactly on a buffer boundary never consumes an empty
//! trailing descriptor. Receive does the reverse, splitting at whichever of
//! the hardware buffer or destination segment ends first.

use crate::eth::common::{ChecksumInsertion, Error, ETH_CRC_LEN};
use crate::eth::descriptor::{Descriptor, Owner};
use crate::eth::packet::{PacketBuf, PacketBufMut};
use crate::eth::ring::{RxRing, TxRing};

/// Descriptors filled by [`copy_to_ring`] and not yet handed to hardware.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TxPlan {
    pub first: usize,
    pub count: usize,
    pub len: usize,
}

/// Number of `buf` sized buffers needed for `len` bytes.
fn buffers_needed(len: usize, buf: usize) -> usize {
    len.div_ceil(buf)
}

/// Copies `packet` into the TX ring starting at the cursor.
///
/// Every descriptor the frame needs is checked for software ownership before
/// a single byte is written. Nothing is handed to hardware and the cursor
/// does not move; see [`commit_transmit`].
///
/// # Errors
///
/// `InvalidLength` for an empty frame or one larger than the whole ring,
/// `BufferBusy` when any needed descriptor is still owned by the DMA.
pub fn copy_to_ring<P, const N: usize, const BUF: usize>(
    ring: &mut TxRing<N, BUF>,
    packet: &P,
) -> Result<TxPlan, Error>
where
    P: PacketBuf + ?Sized,
{
    let len = packet.total_len();
    if len == 0 || BUF == 0 || len > N * BUF {
        return Err(Error::InvalidLength);
    }

    let first = ring.cursor();
    let count = buffers_needed(len, BUF);
    let mut index = first;
    for _ in 0..count {
        if ring.owner_at(index) == Owner::Hardware {
            return Err(Error::BufferBusy);
        }
        index = ring.next_index(index);
    }

    let mut index = first;
    let mut offset = 0;
    for segment in packet.segments() {
        let mut remaining = segment;
        while !remaining.is_empty() {
            if offset == BUF {
                index = ring.next_index(index);
                offset = 0;
            }
            let buffer = ring.buffer_mut(index).ok_or(Error::BufferBusy)?;
            let take = remaining.len().min(BUF - offset);
            let (chunk, rest) = remaining.split_at(take);
            buffer
                .get_mut(offset..offset + take)
                .ok_or(Error::InvalidLength)?
                .copy_from_slice(chunk);
            offset += take;
            remaining = rest;
        }
    }

    Ok(TxPlan { first, count, len })
}

/// Finalizes the descriptors of `plan`, hands them to hardware last to first
/// and moves the cursor past them.
pub fn commit_transmit<const N: usize, const BUF: usize>(
    ring: &mut TxRing<N, BUF>,
    plan: &TxPlan,
    checksum: ChecksumInsertion,
) {
    let mut index = plan.first;
    let mut remaining = plan.len;
    for i in 0..plan.count {
        let segment_len = remaining.min(BUF);
        if let Some(desc) = ring.descriptor_mut(index) {
            desc.prepare(segment_len, i == 0, i + 1 == plan.count, checksum);
        }
        remaining -= segment_len;
        index = ring.next_index(index);
    }
    ring.hand_to_hardware(plan.first, plan.count);
    ring.advance_by(plan.count);
}

/// A completed frame sitting in software-owned RX descriptors.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RxFrame {
    pub first: usize,
    /// Descriptors spanned by the frame. Zero once released.
    pub segments: usize,
    /// Payload length with the CRC removed.
    pub len: usize,
    /// The DMA flagged the frame with its error summary bit.
    pub error: bool,
}

/// Outcome of looking for a frame at the RX cursor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RxScan {
    /// The cursor descriptor, or part of the frame it starts, still belongs
    /// to the DMA.
    Empty,
    /// A segment without a first-segment mark was found at the cursor and
    /// returned to hardware.
    Orphan,
    Frame(RxFrame),
}

/// Looks for a complete frame at the RX cursor.
pub fn scan_frame<const N: usize, const BUF: usize>(ring: &mut RxRing<N, BUF>) -> RxScan {
    let first = ring.cursor();
    let Some(head) = ring.descriptor(first) else {
        return RxScan::Empty;
    };
    if head.owner() == Owner::Hardware {
        return RxScan::Empty;
    }
    if !head.is_first_segment() {
        recycle_cursor(ring);
        return RxScan::Orphan;
    }

    let mut index = first;
    let mut segments = 1;
    loop {
        let Some(desc) = ring.descriptor(index) else {
            return RxScan::Empty;
        };
        if desc.owner() == Owner::Hardware {
            return RxScan::Empty;
        }
        if desc.is_last_segment() {
            let len = desc
                .frame_length()
                .saturating_sub(ETH_CRC_LEN)
                .min(segments * BUF);
            return RxScan::Frame(RxFrame {
                first,
                segments,
                len,
                error: desc.is_error_summary(),
            });
        }
        if segments == N {
            // The whole ring is software owned and no frame ends in it.
            recycle_cursor(ring);
            return RxScan::Orphan;
        }
        index = ring.next_index(index);
        segments += 1;
    }
}

fn recycle_cursor<const N: usize, const BUF: usize>(ring: &mut RxRing<N, BUF>) {
    let cursor = ring.cursor();
    ring.hand_to_hardware(cursor, 1);
    ring.advance();
}

/// Copies the payload of `frame` into `packet`. Returns the number of bytes
/// copied, which is less than `frame.len` only when `packet` is shorter.
pub fn copy_from_ring<P, const N: usize, const BUF: usize>(
    ring: &RxRing<N, BUF>,
    frame: &RxFrame,
    packet: &mut P,
) -> usize
where
    P: PacketBufMut + ?Sized,
{
    let mut index = frame.first;
    let mut offset = 0;
    let mut remaining = frame.len;
    let mut copied = 0;

    for segment in packet.segments_mut() {
        let mut dst = segment;
        while !dst.is_empty() && remaining > 0 {
            if offset == BUF {
                index = ring.next_index(index);
                offset = 0;
            }
            let Some(buffer) = ring.buffer(index) else {
                return copied;
            };
            let take = dst.len().min(BUF - offset).min(remaining);
            let Some(src) = buffer.get(offset..offset + take) else {
                return copied;
            };
            let (head, tail) = core::mem::take(&mut dst).split_at_mut(take);
            head.copy_from_slice(src);
            dst = tail;
            offset += take;
            remaining -= take;
            copied += take;
        }
        if remaining == 0 {
            break;
        }
    }
    copied
}

/// Returns every descriptor of `frame` to hardware, advances the cursor past
/// them and zeroes the segment count.
pub fn release_frame<const N: usize, const BUF: usize>(
    ring: &mut RxRing<N, BUF>,
    frame: &mut RxFrame,
) {
    ring.hand_to_hardware(frame.first, frame.segments);
    ring.advance_by(frame.segments);
    frame.segments = 0;
}
