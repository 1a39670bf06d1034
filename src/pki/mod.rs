//! # PKI partition codec
//!
//! The ESP-AT firmware reads the MQTT client certificate, client key and CA
//! certificate from three flash partitions. Each partition holds one item
//! in a small little-endian container:
//!
//! ```text
//! offset  size  field
//! ──────  ────  ─────────────────────────────────────────
//!      0     2  magic          0xF1F1
//!      2     2  item count     always 1
//!      4     4  total length   item header + data
//!      8     1  item type      1 = CA, 2 = certificate, 3 = key
//!      9     1  item id        1
//!     10     2  data length
//!     12     n  data           PEM or DER bytes, unpadded
//! ```
//!
//! A partition is valid only when it starts with the magic. Partitions are
//! reached through `AT+SYSFLASH` via [`SysFlash`], and [`PkiStore`] reads,
//! writes, compares and conditionally updates the item.
//!
//! ```rust,no_run
//! use libespat::at::{AtClient, AtConfig};
//! use libespat::pki::{Partition, Update};
//! # use libespat::serial::{Clock, Serial};
//! # struct Uart;
//! # impl Serial for Uart {
//! #     type Error = ();
//! #     fn read_byte(&mut self, _t: u32) -> Result<Option<u8>, ()> { Ok(None) }
//! #     fn write(&mut self, b: &[u8]) -> Result<usize, ()> { Ok(b.len()) }
//! #     fn flush(&mut self) -> Result<(), ()> { Ok(()) }
//! #     fn available(&mut self) -> usize { 0 }
//! # }
//! # struct Ticks;
//! # impl Clock for Ticks {
//! #     fn now_ms(&mut self) -> u32 { 0 }
//! #     fn delay_ms(&mut self, _ms: u32) {}
//! # }
//!
//! const CA_PEM: &[u8] = b"-----BEGIN CERTIFICATE-----\n...";
//!
//! let mut at = AtClient::new(Uart, Ticks, AtConfig::default());
//! let mut store = at.pki(Partition::Ca);
//! if store.update_pki_item(CA_PEM)? == Update::Written {
//!     // the device must be restarted to pick up the new CA
//! }
//! # Ok::<(), libespat::Error>(())
//! ```

/// Item store on top of a storage backend.
pub mod store;
/// `AT+SYSFLASH` storage backend.
pub mod sysflash;


pub use store::{PkiStore, Update};
pub use sysflash::SysFlash;

use crate::error::Error;

/// Marks a partition as holding PKI content.
pub const FILE_MAGIC: u16 = 0xF1F1;
/// Size of the [`FileHeader`] on flash.
pub const FILE_HEADER_LEN: usize = 8;
/// Size of the [`PkiItem`] header on flash.
pub const ITEM_HEADER_LEN: usize = 4;
/// Offset of the item data.
pub const DATA_OFFSET: usize = FILE_HEADER_LEN + ITEM_HEADER_LEN;
/// Size of each PKI partition in the default partition table.
pub const PARTITION_SIZE: usize = 0x2000;

/// The three PKI partitions used by the MQTT client.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Partition {
    /// Client certificate, `mqtt_cert`.
    Cert,
    /// Client private key, `mqtt_key`.
    Key,
    /// CA certificate, `mqtt_ca`.
    Ca,
}

impl Partition {
    /// Name of the partition in the device partition table.
    pub const fn name(self) -> &'static str {
        match self {
            Partition::Cert => "mqtt_cert",
            Partition::Key => "mqtt_key",
            Partition::Ca => "mqtt_ca",
        }
    }

    /// Type of the item stored in this partition.
    pub const fn item_type(self) -> PkiType {
        match self {
            Partition::Cert => PkiType::Certificate,
            Partition::Key => PkiType::Key,
            Partition::Ca => PkiType::Ca,
        }
    }
}

/// Type tag of a PKI item.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
#[repr(u8)]
pub enum PkiType {
    /// CA certificate.
    Ca = 1,
    /// Client certificate.
    Certificate = 2,
    /// Client private key.
    Key = 3,
}

impl PkiType {
    /// Decodes a type tag.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(PkiType::Ca),
            2 => Some(PkiType::Certificate),
            3 => Some(PkiType::Key),
            _ => None,
        }
    }
}

/// Container header at offset 0.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct FileHeader {
    /// [`FILE_MAGIC`] on a valid partition.
    pub magic: u16,
    /// Number of items, always 1.
    pub item_count: u16,
    /// Item header plus data length.
    pub total_length: u32,
}

impl FileHeader {
    /// Header for a single item of `data_len` bytes.
    pub fn for_item(data_len: u16) -> Self {
        Self {
            magic: FILE_MAGIC,
            item_count: 1,
            total_length: u32::from(data_len) + ITEM_HEADER_LEN as u32,
        }
    }

    /// Returns `true` if the magic matches.
    pub fn is_valid(&self) -> bool {
        self.magic == FILE_MAGIC
    }

    /// Little-endian encoding.
    pub fn to_bytes(&self) -> [u8; FILE_HEADER_LEN] {
        let mut out = [0u8; FILE_HEADER_LEN];
        out[0..2].copy_from_slice(&self.magic.to_le_bytes());
        out[2..4].copy_from_slice(&self.item_count.to_le_bytes());
        out[4..8].copy_from_slice(&self.total_length.to_le_bytes());
        out
    }

    /// Decodes a header.
    pub fn from_bytes(bytes: &[u8; FILE_HEADER_LEN]) -> Self {
        Self {
            magic: u16::from_le_bytes([bytes[0], bytes[1]]),
            item_count: u16::from_le_bytes([bytes[2], bytes[3]]),
            total_length: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        }
    }
}

/// Item header at offset 8.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct PkiItem {
    /// Raw type tag, see [`PkiType`].
    pub item_type: u8,
    /// Item id, 1 for the single item.
    pub id: u8,
    /// Data length in bytes.
    pub len: u16,
}

impl PkiItem {
    /// Decoded type tag.
    pub fn pki_type(&self) -> Option<PkiType> {
        PkiType::from_u8(self.item_type)
    }

    /// Little-endian encoding.
    pub fn to_bytes(&self) -> [u8; ITEM_HEADER_LEN] {
        let len = self.len.to_le_bytes();
        [self.item_type, self.id, len[0], len[1]]
    }

    /// Decodes an item header.
    pub fn from_bytes(bytes: &[u8; ITEM_HEADER_LEN]) -> Self {
        Self {
            item_type: bytes[0],
            id: bytes[1],
            len: u16::from_le_bytes([bytes[2], bytes[3]]),
        }
    }
}

/// Converts a data length to the on-flash width.
pub(crate) fn item_len(data: &[u8]) -> Result<u16, Error> {
    let max = PARTITION_SIZE - DATA_OFFSET;
    if data.len() > max {
        return Err(Error::InvalidParameter);
    }
    u16::try_from(data.len()).map_err(|_| Error::InvalidParameter)
}

#[cfg(feature = "defmt")]
impl defmt::Format for Partition {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.name())
    }
}
