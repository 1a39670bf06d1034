//! Flash partitions reached through `AT+SYSFLASH`.
//!
//! ```text
//! erase  AT+SYSFLASH=0,"<name>"[,<offset>,<len>]   -> OK, then 1 s settle
//! write  AT+SYSFLASH=1,"<name>",<offset>,<len>     -> OK, '>', <len bytes>, OK
//! read   AT+SYSFLASH=2,"<name>",<offset>,<len>     -> +SYSFLASH:<len>,<bytes>, OK
//! ```

use super::{PARTITION_SIZE, Partition, PkiStore};
use crate::at::{AtClient, Params};
use crate::error::Error;
use crate::serial::{Clock, Serial};
use crate::storage::{BlockingErase, ReadStorage, Storage};

const CMD_SYSFLASH: &str = "+SYSFLASH";
const RESP_SYSFLASH: &str = "+SYSFLASH:";

const OP_ERASE: u8 = 0;
const OP_WRITE: u8 = 1;
const OP_READ: u8 = 2;

/// Time the device needs after an erase before it may be addressed again.
///
/// Sending anything earlier corrupts the partition and can hang the device.
pub const ERASE_SETTLE_MS: u32 = 1000;
/// Erase granularity for partial erases.
pub const SECTOR_SIZE: u32 = 4096;

/// One PKI partition accessed over AT.
#[derive(Debug)]
pub struct SysFlash<'a, S, C> {
    at: &'a mut AtClient<S, C>,
    partition: Partition,
}

impl<'a, S: Serial, C: Clock> SysFlash<'a, S, C> {
    /// Borrows the AT client for access to `partition`.
    pub fn new(at: &'a mut AtClient<S, C>, partition: Partition) -> Self {
        Self { at, partition }
    }

    /// The partition being accessed.
    pub fn partition(&self) -> Partition {
        self.partition
    }

    /// Erases the whole partition and waits [`ERASE_SETTLE_MS`].
    pub fn erase_partition(&mut self) -> Result<(), Error> {
        let mut params = Params::assign();
        params.number(OP_ERASE)?.quoted(self.partition.name())?;
        self.erase_with(&params)
    }

    /// Writes `data` at `offset`.
    pub fn write_sys_flash(&mut self, offset: u32, data: &[u8]) -> Result<(), Error> {
        let len = u32::try_from(data.len()).map_err(|_| Error::InvalidParameter)?;
        let mut params = Params::assign();
        params
            .number(OP_WRITE)?
            .quoted(self.partition.name())?
            .number(offset)?
            .number(len)?;

        debug!("{}: write {} bytes at {}", self.partition, len, offset);
        let timeout = self.at.config().flash_timeout_ms;
        self.at
            .send_with_payload(CMD_SYSFLASH, params.as_str(), data, timeout)?;
        self.at.wait_ok(timeout)
    }

    /// Fills `dest` from `offset`.
    pub fn read_sys_flash(&mut self, offset: u32, dest: &mut [u8]) -> Result<(), Error> {
        let len = u32::try_from(dest.len()).map_err(|_| Error::InvalidParameter)?;
        let mut params = Params::assign();
        params
            .number(OP_READ)?
            .quoted(self.partition.name())?
            .number(offset)?
            .number(len)?;

        trace!("{}: read {} bytes at {}", self.partition, len, offset);
        let timeout = self.at.config().flash_timeout_ms;
        let read = self
            .at
            .read_binary(CMD_SYSFLASH, params.as_str(), RESP_SYSFLASH, dest, timeout)?;
        if read != dest.len() {
            warn!("short flash read, {} of {} bytes", read, len);
            return Err(Error::Protocol);
        }
        Ok(())
    }

    fn erase_with(&mut self, params: &Params) -> Result<(), Error> {
        info!("{}: erasing", self.partition);
        let result = self.at.send_command(CMD_SYSFLASH, params.as_str());
        self.at.delay_ms(ERASE_SETTLE_MS);
        result
    }
}

impl<S: Serial, C: Clock> ReadStorage for SysFlash<'_, S, C> {
    type Error = Error;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.read_sys_flash(offset, bytes)
    }

    fn capacity(&self) -> usize {
        PARTITION_SIZE
    }
}

impl<S: Serial, C: Clock> Storage for SysFlash<'_, S, C> {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.write_sys_flash(offset, bytes)
    }
}

impl<S: Serial, C: Clock> BlockingErase for SysFlash<'_, S, C> {
    /// Erases the whole partition when the range covers it, otherwise the
    /// sector-aligned range `from..to`.
    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if from == 0 && to as usize >= PARTITION_SIZE {
            return self.erase_partition();
        }
        if from > to || from % SECTOR_SIZE != 0 || to % SECTOR_SIZE != 0 {
            return Err(Error::InvalidParameter);
        }
        let mut params = Params::assign();
        params
            .number(OP_ERASE)?
            .quoted(self.partition.name())?
            .number(from)?
            .number(to - from)?;
        self.erase_with(&params)
    }
}

impl<S: Serial, C: Clock> AtClient<S, C> {
    /// A [`PkiStore`] for `partition` on this device.
    pub fn pki(&mut self, partition: Partition) -> PkiStore<SysFlash<'_, S, C>> {
        PkiStore::new(SysFlash::new(self, partition), partition)
    }
}
