use std::io::Result;

use crate::disk::types::{Sector, SectorNumber};

pub trait BlockDevice: Send + Sync {
    fn read_sector(&self, sector: SectorNumber, buf: &mut Sector) -> Result<()>;
    fn write_sector(&self, sector: SectorNumber, buf: &Sector) -> Result<()>;
    fn flush(&self) -> Result<()>;
}
