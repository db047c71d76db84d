// Licensed under the Apache-2.0 license

//! On-target checks of the Ethernet DMA path with the MAC in internal
//! loopback. The interface must have been initialized with
//! `EthConfigBuilder::loopback(true)`.
//!
//! The MAC flags frames above 1518 bytes as giants, so buffer boundaries are
//! only crossed when `BUF` is smaller than a full frame.

use embedded_hal::delay::DelayNs;
use embedded_io::{ErrorType, Write, WriteFmtError};
use fugit::MicrosDurationU32;
use zerocopy::IntoBytes;

use crate::common::{poll_with_timeout, Logger};
use crate::eth::{
    EthDmaHardware, EthernetHeader, EthernetIf, HeaplessAllocator, MacAddress, Owner, PacketBuf,
};

/// Ethertype reserved for local experiments.
const TEST_ETHERTYPE: u16 = 0x88b5;
const MAX_FRAME: usize = 1514;

type Allocator = HeaplessAllocator<256, 6>;

/// Failure to write the report itself; test failures are printed, not returned.
type Report<W> = Result<(), WriteFmtError<<W as ErrorType>::Error>>;

fn receive_timeout() -> MicrosDurationU32 {
    MicrosDurationU32::millis(10)
}

pub fn run_eth_loopback_tests<W, H, L, D, const TX: usize, const RX: usize, const BUF: usize>(
    out: &mut W,
    netif: &mut EthernetIf<H, L, TX, RX, BUF>,
    delay: &mut D,
) -> Report<W>
where
    W: Write,
    H: EthDmaHardware,
    L: Logger,
    D: DelayNs,
{
    writeln!(out, "\r\n=== Ethernet Loopback Tests ===\r")?;

    test_rings_after_init(out, netif)?;
    let own = netif.mac_address();
    let limit = MAX_FRAME.min(TX * BUF);
    // BUF - 3 leaves room for three FCS bytes only; the last one spills.
    for len in [60, BUF.saturating_sub(3), BUF - 1, BUF, BUF + 1, MAX_FRAME] {
        if len >= EthernetHeader::LEN && len <= limit {
            test_round_trip(out, netif, delay, len, own)?;
        } else {
            let min = EthernetHeader::LEN;
            writeln!(out, "Skipping {len} byte frame, outside {min}..={limit}\r")?;
        }
    }
    test_round_trip(out, netif, delay, 64, MacAddress::BROADCAST)?;
    test_empty_frame_rejected(out, netif)?;

    let stats = netif.stats();
    writeln!(
        out,
        "tx {} frames / {} bytes, rx {} frames / {} bytes, {} dropped, {} errors\r",
        stats.tx_frames,
        stats.tx_bytes,
        stats.rx_frames,
        stats.rx_bytes,
        stats.rx_dropped,
        stats.rx_errors
    )?;
    writeln!(out, "=== Ethernet Loopback Tests Done ===\r")
}

fn verdict<W: Write>(out: &mut W, passed: bool) -> Report<W> {
    if passed {
        writeln!(out, "PASSED\r")
    } else {
        writeln!(out, "FAILED\r")
    }
}

fn test_rings_after_init<W, H, L, const TX: usize, const RX: usize, const BUF: usize>(
    out: &mut W,
    netif: &EthernetIf<H, L, TX, RX, BUF>,
) -> Report<W>
where
    W: Write,
    H: EthDmaHardware,
    L: Logger,
{
    write!(out, "Testing ring state after init... ")?;
    let rx_ready = netif
        .rx_ring()
        .owners()
        .iter()
        .all(|owner| *owner == Owner::Hardware);
    verdict(out, netif.is_initialized() && rx_ready)
}

fn fill_frame(frame: &mut [u8], destination: MacAddress, source: MacAddress, seed: u8) {
    let header = EthernetHeader::new(destination, source, TEST_ETHERTYPE);
    let (head, payload) = frame.split_at_mut(EthernetHeader::LEN.min(frame.len()));
    for (dst, src) in head.iter_mut().zip(header.as_bytes()) {
        *dst = *src;
    }
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte = (i as u8).wrapping_mul(31).wrapping_add(seed);
    }
}

fn same_bytes<P: PacketBuf>(packet: &P, expected: &[u8]) -> bool {
    if packet.total_len() != expected.len() {
        return false;
    }
    let mut offset = 0;
    for segment in packet.segments() {
        let end = offset + segment.len();
        if expected.get(offset..end) != Some(segment) {
            return false;
        }
        offset = end;
    }
    true
}

fn test_round_trip<W, H, L, D, const TX: usize, const RX: usize, const BUF: usize>(
    out: &mut W,
    netif: &mut EthernetIf<H, L, TX, RX, BUF>,
    delay: &mut D,
    len: usize,
    destination: MacAddress,
) -> Report<W>
where
    W: Write,
    H: EthDmaHardware,
    L: Logger,
    D: DelayNs,
{
    write!(out, "Testing loopback of {len} byte frame to {destination:?}... ")?;

    let mut storage = [0u8; MAX_FRAME];
    let Some(frame) = storage.get_mut(..len) else {
        return verdict(out, false);
    };
    fill_frame(frame, destination, netif.mac_address(), len as u8);

    if netif.transmit(&*frame).is_err() {
        return verdict(out, false);
    }

    let mut alloc = Allocator::new();
    let received = poll_with_timeout(delay, receive_timeout(), || {
        netif
            .receive(&mut alloc)
            .ok_or(nb::Error::<()>::WouldBlock)
    });
    match received {
        Ok(packet) => verdict(out, same_bytes(&packet, frame)),
        Err(_) => verdict(out, false),
    }
}

fn test_empty_frame_rejected<W, H, L, const TX: usize, const RX: usize, const BUF: usize>(
    out: &mut W,
    netif: &mut EthernetIf<H, L, TX, RX, BUF>,
) -> Report<W>
where
    W: Write,
    H: EthDmaHardware,
    L: Logger,
{
    write!(out, "Testing empty frame is rejected... ")?;
    let cursor = netif.tx_ring().cursor();
    let rejected = netif.transmit([0u8; 0].as_slice()) == Err(crate::eth::Error::InvalidLength);
    verdict(out, rejected && netif.tx_ring().cursor() == cursor)
}
