use std::{fs::File, path::Path};

use log::{debug, info};

use crate::{
    disk::{BlockDevice, FileDisk, Sector, SectorNumber, SECTOR_SIZE},
    fs::{
        bitmap::BitmapArray,
        config::{
            BOOT_MAGIC, BOOT_MAGIC_OFFSET, BOOT_SECTOR, INODES_PER_SECTOR, INODE_SIZE,
            ROOT_INUMBER, SUPER_BLOCK_SECTOR,
        },
        error::{FileSystemError, Result},
        inode::{Inode, InodeMode},
        super_block::SuperBlock,
    },
    utils::v6_now,
};

pub mod bitmap;
pub mod config;
pub mod directory;
pub mod error;
pub mod file;
pub mod inode;
pub mod inode_table;
pub mod super_block;

/// 已挂载的文件系统，所有引擎操作都显式地接收这个句柄
#[derive(Debug)]
pub struct FileSystem<D: BlockDevice = FileDisk<File>> {
    pub disk: D,                    // 底层磁盘抽象层
    pub super_block: SuperBlock,    // 文件系统总体信息
    pub inode_bitmap: BitmapArray,  // inode 分配信息
    pub data_bitmap: BitmapArray,   // 数据扇区分配信息
}

impl FileSystem<FileDisk<File>> {
    /// 挂载宿主机上的磁盘镜像
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::mount(FileDisk::open(path)?)
    }

    /// 在宿主机上创建新的磁盘镜像并格式化
    pub fn mkfs_file<P: AsRef<Path>>(path: P, total_sectors: u16, total_inodes: u16) -> Result<()> {
        // 先检查参数，避免截断已存在的文件
        Self::check_layout(&SuperBlock::new(total_sectors, total_inodes), total_inodes)?;
        let disk = FileDisk::create(path)?;
        Self::format(&disk, total_sectors, total_inodes)?;
        disk.flush()?;
        Ok(())
    }
}

impl<D: BlockDevice> FileSystem<D> {
    pub fn mount(disk: D) -> Result<Self> {
        let mut sector = [0u8; SECTOR_SIZE];
        disk.read_sector(BOOT_SECTOR, &mut sector)?;
        if sector[BOOT_MAGIC_OFFSET] != BOOT_MAGIC {
            return Err(FileSystemError::BadBootSector);
        }

        disk.read_sector(SUPER_BLOCK_SECTOR, &mut sector)?;
        let super_block = SuperBlock::from_sector(&sector)?;

        let data_max = u64::from(super_block.total_sectors)
            .checked_sub(1)
            .ok_or(FileSystemError::BadParameter)?;
        let data_bitmap = BitmapArray::new(u64::from(super_block.data_start) + 1, data_max)?;

        let inode_max = u64::from(super_block.inode_capacity())
            .checked_sub(1)
            .ok_or(FileSystemError::BadParameter)?;
        let inode_bitmap = BitmapArray::new(u64::from(super_block.inode_start), inode_max)?;

        let mut fs = Self {
            disk,
            super_block,
            inode_bitmap,
            data_bitmap,
        };
        fs.fill_inode_bitmap()?;
        fs.fill_data_bitmap()?;

        debug!(
            "mounted: {} inode sectors, {} sectors, {} inodes and {} data sectors in use",
            fs.super_block.inode_sectors,
            fs.super_block.total_sectors,
            fs.inode_bitmap.count_used(),
            fs.data_bitmap.count_used()
        );
        Ok(fs)
    }

    /// 卸载文件系统，把缓冲写回底层存储并交还磁盘
    pub fn unmount(self) -> Result<D> {
        self.disk.flush()?;
        debug!("unmounted");
        Ok(self.disk)
    }

    /// 在磁盘上写入一个全新的文件系统
    pub fn format(disk: &D, total_sectors: u16, total_inodes: u16) -> Result<()> {
        let mut super_block = SuperBlock::new(total_sectors, total_inodes);
        Self::check_layout(&super_block, total_inodes)?;
        super_block.time = v6_now();

        // 1. 引导扇区，只有魔数
        let mut sector = [0u8; SECTOR_SIZE];
        sector[BOOT_MAGIC_OFFSET] = BOOT_MAGIC;
        disk.write_sector(BOOT_SECTOR, &sector)?;

        // 2. 超级块
        disk.write_sector(SUPER_BLOCK_SECTOR, &super_block.to_sector()?)?;

        // 3. inode 表：0 号保留，根目录预先分配
        let mut root = Inode::new(InodeMode::ALLOCATED | InodeMode::DIRECTORY);
        root.mtime = super_block.time;
        let mut sector = [0u8; SECTOR_SIZE];
        let offset = ROOT_INUMBER as usize % INODES_PER_SECTOR * INODE_SIZE;
        sector[offset..offset + INODE_SIZE].copy_from_slice(&root.to_bytes()?);
        let inode_start = SectorNumber::from(super_block.inode_start);
        disk.write_sector(inode_start, &sector)?;

        let empty: Sector = [0u8; SECTOR_SIZE];
        let data_start = SectorNumber::from(super_block.data_start);
        for sector in inode_start + 1..data_start {
            disk.write_sector(sector, &empty)?;
        }

        // 4. 把存储扩展到完整大小
        disk.write_sector(SectorNumber::from(total_sectors) - 1, &empty)?;

        info!(
            "formatted {} sectors, {} inodes ({} inode sectors, data from sector {})",
            total_sectors, total_inodes, super_block.inode_sectors, super_block.data_start
        );
        Ok(())
    }

    fn check_layout(super_block: &SuperBlock, total_inodes: u16) -> Result<()> {
        if total_inodes <= ROOT_INUMBER {
            return Err(FileSystemError::BadParameter);
        }
        let total = u32::from(super_block.total_sectors);
        if total < u32::from(super_block.inode_sectors) + u32::from(total_inodes) {
            return Err(FileSystemError::NotEnoughSectors);
        }
        // 数据位图覆盖 [data_start + 1, total - 1]，至少要有一个扇区
        if total < u32::from(super_block.data_start) + 2 {
            return Err(FileSystemError::NotEnoughSectors);
        }
        Ok(())
    }

    pub(crate) fn read_sector(&self, sector: SectorNumber) -> Result<Sector> {
        let mut buf = [0u8; SECTOR_SIZE];
        self.disk.read_sector(sector, &mut buf)?;
        Ok(buf)
    }

    pub(crate) fn write_sector(&self, sector: SectorNumber, buf: &Sector) -> Result<()> {
        self.disk.write_sector(sector, buf)?;
        Ok(())
    }

    /// 根据每个 inode 的已分配标志重建 inode 位图
    fn fill_inode_bitmap(&mut self) -> Result<()> {
        let start = SectorNumber::from(self.super_block.inode_start);
        for index in 0..SectorNumber::from(self.super_block.inode_sectors) {
            let sector = self.read_sector(start + index)?;
            for (slot, record) in sector.chunks_exact(INODE_SIZE).enumerate() {
                if Inode::from_bytes(record)?.is_allocated() {
                    self.inode_bitmap
                        .set(u64::from(index) * INODES_PER_SECTOR as u64 + slot as u64);
                }
            }
        }
        Ok(())
    }

    /// 根据每个已分配 inode 占用的扇区重建数据位图
    fn fill_data_bitmap(&mut self) -> Result<()> {
        // 根目录不一定落在 inode 位图的范围内，单独处理
        self.mark_inode_sectors(ROOT_INUMBER)?;
        // 损坏的超级块可能声明超过 u16 的 inode 表
        let first = u16::try_from(self.inode_bitmap.min()).map_err(|_| FileSystemError::InodeOutOfRange)?;
        let last = u16::try_from(self.inode_bitmap.max()).map_err(|_| FileSystemError::InodeOutOfRange)?;
        for inumber in first..=last {
            self.mark_inode_sectors(inumber)?;
        }
        Ok(())
    }

    fn mark_inode_sectors(&mut self, inumber: u16) -> Result<()> {
        let inode = match self.read_inode(inumber) {
            Ok(inode) => inode,
            Err(FileSystemError::UnallocatedInode) => return Ok(()),
            Err(e) => return Err(e),
        };
        for sector in self.occupied_sectors(&inode)? {
            self.data_bitmap.set(u64::from(sector));
        }
        Ok(())
    }
}
