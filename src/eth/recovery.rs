// Licensed under the Apache-2.0 license

//! Reactive recovery from DMA stalls.
//!
//! Both checks run after every transmit or receive attempt. They clear only
//! the flags actually set, so running them on a healthy engine is free of
//! side effects.
//!
//! TX buffer unavailable is also how the engine reports that it drained the
//! ring and suspended, so only underflow is a fault worth reporting.

use crate::eth::hardware::{DmaStatus, EthDmaHardware};

/// Clears TX underflow and TX buffer unavailable, then issues one transmit
/// resume. Returns the flags that were cleared.
pub fn recover_transmit<H: EthDmaHardware + ?Sized>(hw: &mut H) -> DmaStatus {
    let faults = hw.status() & DmaStatus::TX_FAULTS;
    if !faults.is_empty() {
        hw.clear_status(faults);
        hw.resume_transmit();
    }
    faults
}

/// Clears RX buffer unavailable and issues one receive resume. Returns
/// whether it was set.
pub fn recover_receive<H: EthDmaHardware + ?Sized>(hw: &mut H) -> bool {
    if !hw.status().contains(DmaStatus::RX_BUFFER_UNAVAILABLE) {
        return false;
    }
    hw.clear_status(DmaStatus::RX_BUFFER_UNAVAILABLE);
    hw.resume_receive();
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eth::testing::MockHardware;

    #[test]
    fn test_no_fault_no_side_effects() {
        let mut hw = MockHardware::new();
        hw.raise(DmaStatus::TX_INTERRUPT | DmaStatus::NORMAL_SUMMARY);

        assert!(recover_transmit(&mut hw).is_empty());
        assert!(!recover_receive(&mut hw));
        assert!(recover_transmit(&mut hw).is_empty());

        assert_eq!(hw.clear_calls, 0);
        assert_eq!(hw.tx_resumes, 0);
        assert_eq!(hw.rx_resumes, 0);
        assert!(hw.status().contains(DmaStatus::TX_INTERRUPT));
    }

    #[test]
    fn test_underflow_cleared_and_resumed_once() {
        let mut hw = MockHardware::new();
        hw.raise(
            DmaStatus::TX_UNDERFLOW | DmaStatus::TX_BUFFER_UNAVAILABLE | DmaStatus::RX_INTERRUPT,
        );

        assert_eq!(recover_transmit(&mut hw), DmaStatus::TX_FAULTS);
        assert_eq!(hw.tx_resumes, 1);
        assert_eq!(hw.clear_calls, 1);
        assert_eq!(hw.last_cleared, DmaStatus::TX_FAULTS);
        // Unrelated flags survive.
        assert_eq!(hw.status(), DmaStatus::RX_INTERRUPT);

        assert!(recover_transmit(&mut hw).is_empty());
        assert_eq!(hw.tx_resumes, 1);
    }

    #[test]
    fn test_only_set_tx_flag_is_cleared() {
        let mut hw = MockHardware::new();
        hw.raise(DmaStatus::TX_BUFFER_UNAVAILABLE);

        assert_eq!(recover_transmit(&mut hw), DmaStatus::TX_BUFFER_UNAVAILABLE);
        assert_eq!(hw.last_cleared, DmaStatus::TX_BUFFER_UNAVAILABLE);
    }

    #[test]
    fn test_rx_buffer_unavailable_resumes_receive() {
        let mut hw = MockHardware::new();
        hw.raise(DmaStatus::RX_BUFFER_UNAVAILABLE);

        assert!(recover_receive(&mut hw));
        assert_eq!(hw.rx_resumes, 1);
        assert_eq!(hw.tx_resumes, 0);
        assert!(hw.status().is_empty());
    }
}
