use super::{
    DATA_OFFSET, FILE_HEADER_LEN, FILE_MAGIC, FileHeader, ITEM_HEADER_LEN, PARTITION_SIZE,
    Partition, PkiItem, item_len,
};
use crate::error::Error;
use crate::storage::BlockingErase;

const COMPARE_CHUNK: usize = 256;

/// Outcome of [`PkiStore::update_pki_item`].
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Update {
    /// The stored item already matched, nothing was erased or written.
    Unchanged,
    /// The partition was rewritten.
    Written,
}

/// The single PKI item of one partition.
///
/// Generic over the storage backend so the codec is the same on the
/// device ([`SysFlash`](super::SysFlash)) and on a RAM double.
#[derive(Debug)]
pub struct PkiStore<F> {
    flash: F,
    partition: Partition,
}

impl<F: BlockingErase<Error = Error>> PkiStore<F> {
    /// Wraps a backend holding `partition`.
    pub fn new(flash: F, partition: Partition) -> Self {
        Self { flash, partition }
    }

    /// The partition this store manages.
    pub fn partition(&self) -> Partition {
        self.partition
    }

    /// The storage backend.
    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Releases the backend.
    pub fn into_inner(self) -> F {
        self.flash
    }

    /// Returns `true` if the partition starts with [`FILE_MAGIC`].
    pub fn check_if_valid(&mut self) -> Result<bool, Error> {
        let mut magic = [0u8; 2];
        self.flash.read(0, &mut magic)?;
        Ok(u16::from_le_bytes(magic) == FILE_MAGIC)
    }

    /// Reads the container header.
    pub fn file_header(&mut self) -> Result<FileHeader, Error> {
        if !self.check_if_valid()? {
            return Err(Error::InvalidPartition);
        }
        let mut raw = [0u8; FILE_HEADER_LEN];
        self.flash.read(0, &mut raw)?;
        Ok(FileHeader::from_bytes(&raw))
    }

    /// Reads the header of item `index`.
    ///
    /// Only one item per partition exists, so `index` must be 0.
    ///
    /// # Errors
    ///
    /// * [`Error::InvalidPartition`] if the magic is missing
    /// * [`Error::InvalidParameter`] for a non-zero `index`
    pub fn get_pki_header(&mut self, index: u32) -> Result<PkiItem, Error> {
        let _header = self.file_header()?;
        if index != 0 {
            return Err(Error::InvalidParameter);
        }
        debug!(
            "{}: {} item(s), {} bytes",
            self.partition, _header.item_count, _header.total_length
        );

        let mut raw = [0u8; ITEM_HEADER_LEN];
        self.flash.read(FILE_HEADER_LEN as u32, &mut raw)?;
        Ok(PkiItem::from_bytes(&raw))
    }

    /// Copies the data of item `index` into the front of `dest`.
    ///
    /// Returns the item header; its `len` is the number of bytes copied.
    pub fn read_pki_item(&mut self, dest: &mut [u8], index: u32) -> Result<PkiItem, Error> {
        let item = self.get_pki_header(index)?;
        let len = usize::from(item.len);
        if len > dest.len() {
            return Err(Error::BufferTooSmall);
        }
        if len > 0 {
            self.flash.read(DATA_OFFSET as u32, &mut dest[..len])?;
        }
        Ok(item)
    }

    /// Returns `true` if item `index` holds exactly `data`.
    pub fn compare_pki_item(&mut self, data: &[u8], index: u32) -> Result<bool, Error> {
        let item = self.get_pki_header(index)?;
        if usize::from(item.len) != data.len() {
            debug!(
                "{}: length differs, stored {} new {}",
                self.partition,
                item.len,
                data.len()
            );
            return Ok(false);
        }

        let mut chunk = [0u8; COMPARE_CHUNK];
        let mut offset = DATA_OFFSET as u32;
        for expected in data.chunks(COMPARE_CHUNK) {
            let stored = &mut chunk[..expected.len()];
            self.flash.read(offset, stored)?;
            if stored != expected {
                return Ok(false);
            }
            offset += expected.len() as u32;
        }
        Ok(true)
    }

    /// Replaces the partition content with `data`.
    ///
    /// Erase, container header, item header and data are written in that
    /// order, so the data is only reachable once both headers are in place.
    pub fn write_pki_item(&mut self, data: &[u8]) -> Result<(), Error> {
        let len = item_len(data)?;
        info!("{}: writing {} bytes", self.partition, len);

        self.flash.erase(0, PARTITION_SIZE as u32)?;
        self.flash.write(0, &FileHeader::for_item(len).to_bytes())?;
        let item = PkiItem {
            item_type: self.partition.item_type() as u8,
            id: 1,
            len,
        };
        self.flash.write(FILE_HEADER_LEN as u32, &item.to_bytes())?;
        if !data.is_empty() {
            self.flash.write(DATA_OFFSET as u32, data)?;
        }
        Ok(())
    }

    /// Writes `data` unless the partition already holds it.
    ///
    /// A partition without a valid header is written without a comparison.
    pub fn update_pki_item(&mut self, data: &[u8]) -> Result<Update, Error> {
        match self.compare_pki_item(data, 0) {
            Ok(true) => {
                debug!("{}: unchanged", self.partition);
                Ok(Update::Unchanged)
            }
            Ok(false) | Err(Error::InvalidPartition) => {
                self.write_pki_item(data)?;
                Ok(Update::Written)
            }
            Err(e) => Err(e),
        }
    }
}
