use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    disk::{Sector, SECTOR_SIZE},
    fs::{
        config::{INODES_PER_SECTOR, SUPER_BLOCK_SECTOR},
        error::{FileSystemError, Result},
    },
    utils::{format_timestamp, from_v6_time},
};

/// 超级块：位于 1 号扇区，挂载时读取一次，之后不再修改
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuperBlock {
    /** inode 表信息 */
    pub inode_sectors: u16, // inode 表占用的扇区数
    pub total_sectors: u16, // 文件系统总扇区数
    /** 位图信息（磁盘上不维护，仅保留字段） */
    pub free_bitmap_sectors: u16,
    pub inode_bitmap_sectors: u16,
    /** 区域起点 */
    pub inode_start: u16, // inode 表起始扇区
    pub data_start: u16,  // 数据区起始扇区
    pub free_bitmap_start: u16,
    pub inode_bitmap_start: u16,
    /** 文件系统状态（只存储，不生效） */
    pub free_lock: u8,
    pub inode_lock: u8,
    pub modified: u8,
    pub read_only: u8,
    pub time: [u16; 2], // 最后修改时间
}

impl SuperBlock {
    /// 根据请求的大小计算各区域边界
    pub fn new(total_sectors: u16, total_inodes: u16) -> Self {
        let inode_sectors = (total_inodes as usize).div_ceil(INODES_PER_SECTOR) as u16;
        let inode_start = SUPER_BLOCK_SECTOR as u16 + 1;
        Self {
            inode_sectors,
            total_sectors,
            inode_start,
            data_start: inode_start + inode_sectors,
            ..Self::default()
        }
    }

    /// inode 表能容纳的 inode 个数
    pub fn inode_capacity(&self) -> u32 {
        u32::from(self.inode_sectors) * INODES_PER_SECTOR as u32
    }

    pub fn from_sector(sector: &Sector) -> Result<Self> {
        let super_block: SuperBlock = bincode::deserialize(sector)?;
        // inode 表必须位于数据区之前
        if u32::from(super_block.inode_sectors) + 1 > u32::from(super_block.data_start) {
            return Err(FileSystemError::BadParameter);
        }
        Ok(super_block)
    }

    pub fn to_sector(&self) -> Result<Sector> {
        let bytes = bincode::serialize(self)?;
        let mut sector = [0u8; SECTOR_SIZE];
        sector[..bytes.len()].copy_from_slice(&bytes);
        Ok(sector)
    }
}

impl fmt::Display for SuperBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "**********FS SUPERBLOCK START**********")?;
        writeln!(f, "{:<20}: {}", "s_isize", self.inode_sectors)?;
        writeln!(f, "{:<20}: {}", "s_fsize", self.total_sectors)?;
        writeln!(f, "{:<20}: {}", "s_fbmsize", self.free_bitmap_sectors)?;
        writeln!(f, "{:<20}: {}", "s_ibmsize", self.inode_bitmap_sectors)?;
        writeln!(f, "{:<20}: {}", "s_inode_start", self.inode_start)?;
        writeln!(f, "{:<20}: {}", "s_block_start", self.data_start)?;
        writeln!(f, "{:<20}: {}", "s_fbm_start", self.free_bitmap_start)?;
        writeln!(f, "{:<20}: {}", "s_ibm_start", self.inode_bitmap_start)?;
        writeln!(f, "{:<20}: {}", "s_flock", self.free_lock)?;
        writeln!(f, "{:<20}: {}", "s_ilock", self.inode_lock)?;
        writeln!(f, "{:<20}: {}", "s_fmod", self.modified)?;
        writeln!(f, "{:<20}: {}", "s_ronly", self.read_only)?;
        writeln!(
            f,
            "{:<20}: [{}] {} ({})",
            "s_time",
            self.time[0],
            self.time[1],
            format_timestamp(from_v6_time(self.time))
        )?;
        write!(f, "**********FS SUPERBLOCK END**********")
    }
}
