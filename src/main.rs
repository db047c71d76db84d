// Licensed under the Apache-2.0 license

#![no_std]
#![no_main]

use core::convert::Infallible;

use cortex_m::peripheral::{itm, ITM};
use cortex_m_rt::entry;
use embedded_hal::delay::DelayNs;
use embedded_io::Write;
use panic_halt as _;

use hc32f4a0_ddk::common::{Level, UartLogger};
use hc32f4a0_ddk::eth::{
    DescriptorRing, EthConfigBuilder, EthernetIf, Hc32f4a0Eth, RxRing, TxRing,
};
use hc32f4a0_ddk::tests::functional::eth_test::run_eth_loopback_tests;

#[derive(Clone, Default)]
struct DummyDelay;

impl DelayNs for DummyDelay {
    fn delay_ns(&mut self, ns: u32) {
        for _ in 0..ns {
            cortex_m::asm::nop();
        }
    }
}

/// Console on an ITM stimulus port. Port 0 carries test output, port 1 the
/// driver log.
struct ItmWriter {
    port: usize,
}

impl embedded_io::ErrorType for ItmWriter {
    type Error = Infallible;
}

impl Write for ItmWriter {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        // SAFETY: single core, no interrupts in use, and every writer owns a
        // distinct stimulus port.
        let itm = unsafe { &mut *(ITM::PTR as *mut itm::RegisterBlock) };
        if let Some(stim) = itm.stim.get_mut(self.port) {
            cortex_m::itm::write_all(stim, buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

const TX_BUFFERS: usize = 4;
const RX_BUFFERS: usize = 4;
/// Standard size frames span several of these, so the loopback run crosses
/// buffer boundaries.
const BUFFER_SIZE: usize = 512;

type Netif = EthernetIf<Hc32f4a0Eth, UartLogger<ItmWriter>, TX_BUFFERS, RX_BUFFERS, BUFFER_SIZE>;

// Clocks, the ETH pins and the MII/RMII selection are expected to be set up
// by the boot stage before `main` runs.
#[entry]
fn main() -> ! {
    let mut console = ItmWriter { port: 0 };
    let mut delay = DummyDelay;

    let _ = writeln!(console, "\r\nHC32F4A0 Ethernet DMA bring-up\r\n");

    // SAFETY: nothing else in this image touches the Ethernet block.
    let hw = unsafe { Hc32f4a0Eth::steal() };
    let config = EthConfigBuilder::new()
        .mac_address([0x02, 0x00, 0x00, 0x4a, 0x0f, 0x01])
        .loopback(true)
        .build();
    let logger = UartLogger::new(ItmWriter { port: 1 }, Level::Info);

    let tx = cortex_m::singleton!(: TxRing<TX_BUFFERS, BUFFER_SIZE> = DescriptorRing::new());
    let rx = cortex_m::singleton!(: RxRing<RX_BUFFERS, BUFFER_SIZE> = DescriptorRing::new());
    if let (Some(tx), Some(rx)) = (tx, rx) {
        let mut netif: Netif = EthernetIf::new(hw, config, logger, tx, rx);
        match netif.init(&mut delay) {
            Ok(()) => {
                // MAC loopback does not depend on the PHY; report and go on.
                match netif.init_phy(&mut delay) {
                    Ok(id) => {
                        let _ = writeln!(console, "phy id {id:#010x}\r");
                    }
                    Err(e) => {
                        let _ = writeln!(console, "phy init failed: {e}\r");
                    }
                }
                let _ = run_eth_loopback_tests(&mut console, &mut netif, &mut delay);
            }
            Err(e) => {
                let _ = writeln!(console, "eth init failed: {e}\r");
            }
        }
    }

    loop {
        cortex_m::asm::wfi();
    }
}
