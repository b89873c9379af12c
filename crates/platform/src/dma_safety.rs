//! DMA safety marker traits and buffer sizing constants for STM32F407VG.
//!
//! ## DMA Accessibility on STM32F407VG
//!
//! | Memory Region | Base Address | Size   | DMA1/2 | Use case |
//! |---------------|-------------|--------|--------|----------|
//! | SRAM1         | 0x2000_0000 | 112 KB | YES    | I2C landing buffer, statics |
//! | SRAM2         | 0x2001_C000 | 16 KB  | YES    | Spare |
//! | CCM RAM       | 0x1000_0000 | 64 KB  | NO     | CPU-only: stack, scratch |
//!
//! The I2C RX DMA stream writes the landing buffer directly, so the buffer must
//! live in SRAM1/2. A landing buffer accidentally placed in CCM RAM is never
//! written: the completion interrupt still fires and the engine decodes stale
//! bytes.
//!
//! ## Usage
//! ```rust
//! use platform::dma_safety::{DmaBuffer, SramRegion, I2C_LANDING_BUFFER_BYTES};
//!
//! static mut LANDING: DmaBuffer<SramRegion, I2C_LANDING_BUFFER_BYTES> = DmaBuffer::new();
//! ```

use core::marker::PhantomData;

// ── Memory region addresses ──────────────────────────────────────────────────

/// Base address of SRAM1 (DMA1/2 accessible).
pub const SRAM1_BASE: u32 = 0x2000_0000;

/// Size of SRAM1 + SRAM2 in bytes (contiguous, 128 KB).
pub const SRAM_SIZE_BYTES: usize = 128 * 1024;

/// Base address of CCM data RAM (CPU-only).
pub const CCM_BASE: u32 = 0x1000_0000;

/// True: CCM RAM is NOT DMA-accessible. Place no DMA buffers here.
pub const CCM_NOT_DMA_ACCESSIBLE: bool = true;

// ── I2C landing buffer ───────────────────────────────────────────────────────

/// Largest single register burst read by any device plan (bytes).
///
/// Sized for the longest plan step, not for the current default plan (whose
/// longest step is the 14-byte IMU burst).
pub const MAX_READ_LEN: usize = 32;

/// Landing buffer size for the I2C RX DMA stream.
pub const I2C_LANDING_BUFFER_BYTES: usize = MAX_READ_LEN;

// ── Marker traits ────────────────────────────────────────────────────────────

/// Marker trait: memory region accessible by DMA1 and DMA2.
///
/// # Safety
/// Only implement for zero-sized types representing memory regions
/// that are physically on the AHB bus matrix path of the DMA controllers.
/// Implementing this trait for CCM RAM causes DMA writes to be silently
/// dropped.
pub unsafe trait DmaAccessible: Sized {}

// ── Region zero-sized types ──────────────────────────────────────────────────

/// Zero-sized type representing SRAM1/SRAM2 (DMA accessible).
#[derive(Debug, Clone, Copy)]
pub struct SramRegion;

// SAFETY: SRAM1/2 at 0x2000_0000 are slaves of the AHB bus matrix reachable
// from both DMA controllers (RM0090 §2.1, Figure 1).
unsafe impl DmaAccessible for SramRegion {}

/// Zero-sized type representing CCM RAM (CPU-only, NOT DMA-accessible).
#[derive(Debug, Clone, Copy)]
pub struct CcmRegion;
// CcmRegion intentionally does NOT implement DmaAccessible.

// ── Typed buffer ─────────────────────────────────────────────────────────────

/// Fixed-size byte buffer tagged with the memory region it is placed in.
///
/// Hardware code only accepts `DmaBuffer<R, N>` where `R: DmaAccessible` as a
/// DMA target, so a CCM-placed buffer is a type error.
#[derive(Debug)]
pub struct DmaBuffer<R, const N: usize> {
    bytes: [u8; N],
    _region: PhantomData<R>,
}

impl<R, const N: usize> DmaBuffer<R, N> {
    /// Zero-filled buffer.
    pub const fn new() -> Self {
        Self {
            bytes: [0u8; N],
            _region: PhantomData,
        }
    }

    /// Buffer contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Capacity in bytes.
    pub const fn capacity(&self) -> usize {
        N
    }
}

impl<R: DmaAccessible, const N: usize> DmaBuffer<R, N> {
    /// Mutable view handed to a DMA transfer.
    pub fn as_dma_target(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl<R, const N: usize> Default for DmaBuffer<R, N> {
    fn default() -> Self {
        Self::new()
    }
}
