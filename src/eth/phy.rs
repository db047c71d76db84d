// Licensed under the Apache-2.0 license

//! Clause 22 PHY access over the SMI bus.

use embedded_hal::delay::DelayNs;
use fugit::MicrosDurationU32;

use crate::common::{poll_with_timeout, PollError};
use crate::eth::common::Error;
use crate::eth::hardware::SmiBus;

/// Basic mode control register.
pub const PHY_BCR: u8 = 0;
/// Basic mode status register.
pub const PHY_BSR: u8 = 1;
/// PHY identifier, OUI bits 3..18.
pub const PHY_ID1: u8 = 2;
/// PHY identifier, OUI bits 19..24, model and revision.
pub const PHY_ID2: u8 = 3;

pub const BCR_SOFT_RESET: u16 = 1 << 15;
pub const BCR_LOOPBACK: u16 = 1 << 14;
pub const BCR_AUTONEG_ENABLE: u16 = 1 << 12;
pub const BCR_RESTART_AUTONEG: u16 = 1 << 9;

pub const BSR_LINK_STATUS: u16 = 1 << 2;
pub const BSR_AUTONEG_COMPLETE: u16 = 1 << 5;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LinkState {
    Up,
    Down,
}

fn wait_idle<S, D>(smi: &S, delay: &mut D, timeout: MicrosDurationU32) -> Result<(), Error>
where
    S: SmiBus + ?Sized,
    D: DelayNs,
{
    poll_with_timeout(delay, timeout, || {
        if smi.is_busy() {
            Err(nb::Error::<()>::WouldBlock)
        } else {
            Ok(())
        }
    })
    .map_err(|e| match e {
        PollError::Timeout | PollError::Other(()) => Error::SmiTimeout,
    })
}

/// Reads PHY register `register` of the PHY at address `phy`.
///
/// # Errors
///
/// `Error::SmiTimeout` if the bus stays busy before or after the transfer.
pub fn read<S, D>(
    smi: &mut S,
    delay: &mut D,
    timeout: MicrosDurationU32,
    phy: u8,
    register: u8,
) -> Result<u16, Error>
where
    S: SmiBus + ?Sized,
    D: DelayNs,
{
    wait_idle(smi, delay, timeout)?;
    smi.start_read(phy, register);
    wait_idle(smi, delay, timeout)?;
    Ok(smi.data())
}

/// Writes `value` to PHY register `register`.
///
/// # Errors
///
/// `Error::SmiTimeout` if the bus stays busy.
pub fn write<S, D>(
    smi: &mut S,
    delay: &mut D,
    timeout: MicrosDurationU32,
    phy: u8,
    register: u8,
    value: u16,
) -> Result<(), Error>
where
    S: SmiBus + ?Sized,
    D: DelayNs,
{
    wait_idle(smi, delay, timeout)?;
    smi.start_write(phy, register, value);
    wait_idle(smi, delay, timeout)
}

/// Reads the 32-bit PHY identifier, `ID1` in the upper half.
///
/// # Errors
///
/// `Error::SmiTimeout` if the bus stays busy.
pub fn identifier<S, D>(
    smi: &mut S,
    delay: &mut D,
    timeout: MicrosDurationU32,
    phy: u8,
) -> Result<u32, Error>
where
    S: SmiBus + ?Sized,
    D: DelayNs,
{
    let high = read(smi, delay, timeout, phy, PHY_ID1)?;
    let low = read(smi, delay, timeout, phy, PHY_ID2)?;
    Ok((u32::from(high) << 16) | u32::from(low))
}

/// Soft-resets the PHY and waits for the reset bit to self-clear.
///
/// The whole wait, SMI transfers included, is bounded by `reset_timeout`.
///
/// # Errors
///
/// `Error::SmiTimeout` if the reset command cannot be written,
/// `Error::PhyResetTimeout` if the bit is still set when time runs out.
pub fn reset<S, D>(
    smi: &mut S,
    delay: &mut D,
    smi_timeout: MicrosDurationU32,
    reset_timeout: MicrosDurationU32,
    phy: u8,
) -> Result<(), Error>
where
    S: SmiBus + ?Sized,
    D: DelayNs,
{
    write(smi, delay, smi_timeout, phy, PHY_BCR, BCR_SOFT_RESET)?;

    let mut read_pending = false;
    poll_with_timeout(delay, reset_timeout, || {
        if smi.is_busy() {
            return Err(nb::Error::<()>::WouldBlock);
        }
        if !read_pending {
            smi.start_read(phy, PHY_BCR);
            read_pending = true;
            return Err(nb::Error::WouldBlock);
        }
        read_pending = false;
        if smi.data() & BCR_SOFT_RESET == 0 {
            Ok(())
        } else {
            Err(nb::Error::WouldBlock)
        }
    })
    .map_err(|_| Error::PhyResetTimeout)
}

/// Enables auto-negotiation and restarts it.
///
/// # Errors
///
/// `Error::SmiTimeout` if the bus stays busy.
pub fn start_autonegotiation<S, D>(
    smi: &mut S,
    delay: &mut D,
    timeout: MicrosDurationU32,
    phy: u8,
) -> Result<(), Error>
where
    S: SmiBus + ?Sized,
    D: DelayNs,
{
    write(
        smi,
        delay,
        timeout,
        phy,
        PHY_BCR,
        BCR_AUTONEG_ENABLE | BCR_RESTART_AUTONEG,
    )
}

/// Samples the link bit of the status register.
///
/// The bit latches low, so a single read may report a link loss that has
/// already recovered; callers poll it periodically.
pub fn link_state<S, D>(
    smi: &mut S,
    delay: &mut D,
    timeout: MicrosDurationU32,
    phy: u8,
) -> Result<LinkState, Error>
where
    S: SmiBus + ?Sized,
    D: DelayNs,
{
    let bsr = read(smi, delay, timeout, phy, PHY_BSR)?;
    Ok(if bsr & BSR_LINK_STATUS != 0 {
        LinkState::Up
    } else {
        LinkState::Down
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eth::testing::{MockHardware, NoDelay};
    use fugit::ExtU32;

    #[test]
    fn test_read_returns_register() {
        let mut smi = MockHardware::new();
        smi.phy_registers[PHY_ID1 as usize] = 0x0007;
        let value = read(&mut smi, &mut NoDelay, 100.micros(), 0, PHY_ID1).unwrap();
        assert_eq!(value, 0x0007);
    }

    #[test]
    fn test_write_reaches_phy() {
        let mut smi = MockHardware::new();
        write(&mut smi, &mut NoDelay, 100.micros(), 0, PHY_BCR, BCR_LOOPBACK).unwrap();
        assert_eq!(smi.phy_registers[PHY_BCR as usize], BCR_LOOPBACK);
    }

    #[test]
    fn test_busy_bus_times_out() {
        let mut smi = MockHardware::new();
        smi.smi_stuck = true;
        assert_eq!(
            read(&mut smi, &mut NoDelay, 50.micros(), 0, PHY_BSR),
            Err(Error::SmiTimeout)
        );
    }

    #[test]
    fn test_identifier_joins_both_registers() {
        let mut smi = MockHardware::new();
        smi.phy_registers[PHY_ID1 as usize] = 0x0007;
        smi.phy_registers[PHY_ID2 as usize] = 0xc0f1;
        assert_eq!(
            identifier(&mut smi, &mut NoDelay, 100.micros(), 0),
            Ok(0x0007_c0f1)
        );
    }

    #[test]
    fn test_reset_waits_for_self_clear() {
        let mut smi = MockHardware::new();
        assert_eq!(
            reset(&mut smi, &mut NoDelay, 100.micros(), 1000.micros(), 0),
            Ok(())
        );
        assert_eq!(smi.phy_registers[PHY_BCR as usize] & BCR_SOFT_RESET, 0);
    }

    #[test]
    fn test_reset_times_out_when_bit_sticks() {
        let mut smi = MockHardware::new();
        smi.phy_reset_stuck = true;
        assert_eq!(
            reset(&mut smi, &mut NoDelay, 100.micros(), 500.micros(), 0),
            Err(Error::PhyResetTimeout)
        );
    }

    #[test]
    fn test_autonegotiation_restart_written() {
        let mut smi = MockHardware::new();
        start_autonegotiation(&mut smi, &mut NoDelay, 100.micros(), 0).unwrap();
        assert_eq!(
            smi.phy_registers[PHY_BCR as usize],
            BCR_AUTONEG_ENABLE | BCR_RESTART_AUTONEG
        );
    }

    #[test]
    fn test_link_state_from_status_bit() {
        let mut smi = MockHardware::new();
        assert_eq!(
            link_state(&mut smi, &mut NoDelay, 100.micros(), 0),
            Ok(LinkState::Down)
        );
        smi.phy_registers[PHY_BSR as usize] = BSR_LINK_STATUS | BSR_AUTONEG_COMPLETE;
        assert_eq!(
            link_state(&mut smi, &mut NoDelay, 100.micros(), 0),
            Ok(LinkState::Up)
        );
    }
}
