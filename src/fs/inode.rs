use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::fs::{
    config::{ADDR_SLOTS, INODE_SIZE, MAX_ENCODABLE_SIZE, MEDIUM_FILE_MAX, SMALL_FILE_MAX},
    error::{FileSystemError, Result},
};

bitflags! {
    /// inode 的 mode 字段
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InodeMode: u16 {
        const ALLOCATED = 0x8000;
        const FORMAT = 0x6000;
        const DIRECTORY = 0x4000;
        const CHAR_DEVICE = 0x2000;
        const LARGE = 0x1000;
        const SET_UID = 0x0800;
        const SET_GID = 0x0400;
        const STICKY = 0x0200;
        const PERMISSIONS = 0o777;
    }
}

impl InodeMode {
    pub fn is_allocated(self) -> bool {
        self.contains(Self::ALLOCATED)
    }

    pub fn is_directory(self) -> bool {
        self.intersection(Self::FORMAT) == Self::DIRECTORY
    }

    pub fn permissions(self) -> u16 {
        self.bits() & Self::PERMISSIONS.bits()
    }
}

/// 文件大小所处的寻址层级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressTier {
    Small,  // 全部直接地址
    Medium, // 单级间接地址
}

impl AddressTier {
    pub fn for_size(size: usize) -> Result<Self> {
        if size > MEDIUM_FILE_MAX {
            Err(FileSystemError::FileTooLarge)
        } else if size > SMALL_FILE_MAX {
            Ok(Self::Medium)
        } else {
            Ok(Self::Small)
        }
    }
}

/// 磁盘上的 inode 记录（32 字节，紧密排列）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inode {
    pub mode: u16,
    pub nlink: u8,
    pub uid: u8,
    pub gid: u8,
    pub size_hi: u8,  // 24 位大小的高 8 位
    pub size_lo: u16, // 24 位大小的低 16 位
    pub addr: [u16; ADDR_SLOTS],
    pub atime: [u16; 2],
    pub mtime: [u16; 2],
}

impl Inode {
    pub fn new(mode: InodeMode) -> Self {
        Self {
            mode: mode.bits(),
            ..Self::default()
        }
    }

    pub fn mode(&self) -> InodeMode {
        InodeMode::from_bits_retain(self.mode)
    }

    pub fn is_allocated(&self) -> bool {
        self.mode().is_allocated()
    }

    pub fn is_directory(&self) -> bool {
        self.mode().is_directory()
    }

    pub fn size(&self) -> usize {
        (usize::from(self.size_hi) << 16) | usize::from(self.size_lo)
    }

    pub fn set_size(&mut self, size: usize) -> Result<()> {
        if size > MAX_ENCODABLE_SIZE as usize {
            return Err(FileSystemError::FileTooLarge);
        }
        self.size_hi = (size >> 16) as u8;
        self.size_lo = size as u16;
        Ok(())
    }

    pub fn tier(&self) -> Result<AddressTier> {
        AddressTier::for_size(self.size())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let record = bytes
            .get(..INODE_SIZE)
            .ok_or(FileSystemError::BadParameter)?;
        Ok(bincode::deserialize(record)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }
}

impl fmt::Display for Inode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "**********FS INODE START**********")?;
        writeln!(f, "{:<20}: {}", "i_mode", self.mode)?;
        writeln!(f, "{:<20}: {}", "i_nlink", self.nlink)?;
        writeln!(f, "{:<20}: {}", "i_uid", self.uid)?;
        writeln!(f, "{:<20}: {}", "i_gid", self.gid)?;
        writeln!(f, "{:<20}: {}", "i_size0", self.size_hi)?;
        writeln!(f, "{:<20}: {}", "i_size1", self.size_lo)?;
        writeln!(f, "{:<20}: {}", "size", self.size())?;
        write!(f, "**********FS INODE END**********")
    }
}
