//! # Byte-addressable storage traits
//!
//! A small set of traits for regions that are read and written by offset
//! and must be erased before they are rewritten. Device flash partitions
//! reached over `AT+SYSFLASH` implement them in [`crate::pki::SysFlash`], and
//! the PKI codec in [`crate::pki::PkiStore`] is written against them so it
//! runs just as well on a RAM double in tests.
//!
//! ```text
//! ┌────────────┐     ┌─────────────────────────────────────────┐
//! │  PkiStore  │ ──► │  ReadStorage / Storage / BlockingErase  │
//! └────────────┘     └─────────────────────────────────────────┘
//!                          │                           │
//!                          ▼                           ▼
//!                   SysFlash (AT)                 RAM (tests)
//! ```
//!
//! ```rust,no_run
//! use libespat::storage::BlockingErase;
//!
//! fn replace<S: BlockingErase>(region: &mut S, data: &[u8]) -> Result<(), S::Error> {
//!     let end = region.capacity() as u32;
//!     region.erase(0, end)?;
//!     region.write(0, data)
//! }
//! ```

#![deny(unsafe_code)]

/// Reads bytes by offset.
pub trait ReadStorage {
    /// Associated error type for read operations
    type Error: core::fmt::Debug;

    /// Fills `bytes` with the content starting at `offset`.
    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error>;

    /// Size of the region in bytes.
    fn capacity(&self) -> usize;
}

/// Writes bytes by offset.
///
/// Writing to bytes that were not erased first is allowed but flash only
/// clears bits, so callers pair this with [`BlockingErase`].
pub trait Storage: ReadStorage {
    /// Writes `bytes` starting at `offset`.
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error>;
}

/// Erases a range, after which it reads back as `0xFF`.
pub trait BlockingErase: Storage {
    /// Erases `from..to`.
    ///
    /// Implementations may round the range out to their erase granularity.
    /// The call returns only once the erased region is safe to access.
    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error>;
}
