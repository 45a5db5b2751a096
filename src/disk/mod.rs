mod block_device;
mod file_disk;
mod types;

pub use block_device::BlockDevice;
pub use file_disk::FileDisk;
pub use types::{Sector, SectorNumber, SECTOR_SIZE};
