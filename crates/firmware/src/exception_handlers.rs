//! Cortex-M exception handlers for the sensor hub firmware.
//!
//! - **HardFault**: memory access violations, illegal instructions, or the
//!   stack overflowing past the bottom of RAM (flip-link layout).
//!
//! # Hardware-only handler
//!
//! The `#[cortex_m_rt::exception]` attribute requires ARM target intrinsics and
//! is therefore gated behind `#[cfg(feature = "hardware")]`. The module itself
//! (and `HARDFAULT_DEFINED`) compiles unconditionally so host tests can check
//! it is linked in.

#![allow(clippy::doc_markdown)]
/// `true` when this module compiled, so the HardFault handler below is part of
/// every hardware build.
pub const HARDFAULT_DEFINED: bool = true;

/// HardFault exception handler (hardware target only).
///
/// Logs the stacked exception frame address over RTT and halts. A wedged I2C
/// bus never reaches here: bus faults on the peripheral are reported through
/// the error interrupt, not as a processor fault.
///
/// # Safety
///
/// Must never return; returning from a HardFault handler is undefined
/// behavior on Cortex-M.
#[cfg(feature = "hardware")]
#[cortex_m_rt::exception]
#[allow(unsafe_code)]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    defmt::panic!(
        "HardFault! Stacked exception frame at 0x{:08X}. Check stacked PC.",
        ef as *const _ as u32
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hardfault_handler_module_compiled() {
        assert!(HARDFAULT_DEFINED);
    }
}
