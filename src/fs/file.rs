use log::trace;

use crate::{
    disk::{BlockDevice, Sector, SectorNumber, SECTOR_SIZE},
    fs::{
        config::{ADDRESSES_PER_SECTOR, MEDIUM_FILE_MAX, SMALL_FILE_MAX},
        error::{FileSystemError, Result},
        inode::{Inode, InodeMode},
        inode_table::AddressTable,
        FileSystem,
    },
    utils::v6_now,
};

/// 打开的文件：inode 号、inode 的缓存副本和读写游标
///
/// 句柄不持有文件系统的引用，每个操作都显式传入 `FileSystem`。
#[derive(Debug, Clone)]
pub struct FileHandle {
    pub inumber: u16,
    pub inode: Inode,
    pub offset: usize,
}

impl FileHandle {
    /// 为一个刚分配、尚未写入记录的 inode 号构造句柄，随后调用 `create`
    pub fn new(inumber: u16) -> Self {
        Self {
            inumber,
            inode: Inode::default(),
            offset: 0,
        }
    }

    pub fn open<D: BlockDevice>(fs: &FileSystem<D>, inumber: u16) -> Result<Self> {
        Ok(Self {
            inumber,
            inode: fs.read_inode(inumber)?,
            offset: 0,
        })
    }

    pub fn size(&self) -> usize {
        self.inode.size()
    }

    pub fn seek(&mut self, offset: usize) -> Result<()> {
        if offset >= self.size() {
            return Err(FileSystemError::OffsetOutOfRange);
        }
        self.offset = offset;
        Ok(())
    }

    /// 读取游标所在的整个扇区，返回推进的字节数，0 表示文件结束
    pub fn read_block<D: BlockDevice>(&mut self, fs: &FileSystem<D>, buf: &mut Sector) -> Result<usize> {
        let size = self.size();
        if self.offset >= size {
            return Ok(0);
        }
        let sector = fs.find_sector(&self.inode, self.offset / SECTOR_SIZE)?;
        fs.disk.read_sector(SectorNumber::from(sector), buf)?;

        let read = (size - self.offset).min(SECTOR_SIZE);
        self.offset += read;
        Ok(read)
    }

    /// 从头读取文件的全部内容
    pub fn read_to_end<D: BlockDevice>(&mut self, fs: &FileSystem<D>) -> Result<Vec<u8>> {
        self.offset = 0;
        let mut content = Vec::with_capacity(self.size());
        let mut buf = [0u8; SECTOR_SIZE];
        loop {
            let read = self.read_block(fs, &mut buf)?;
            if read == 0 {
                break;
            }
            content.extend_from_slice(&buf[..read]);
        }
        Ok(content)
    }

    /// 在句柄的 inode 号上写入一个空的 inode 记录
    pub fn create<D: BlockDevice>(&mut self, fs: &mut FileSystem<D>, mode: InodeMode) -> Result<()> {
        let mut inode = Inode::new(mode);
        let now = v6_now();
        inode.atime = now;
        inode.mtime = now;

        fs.write_inode(self.inumber, &inode)?;
        self.inode = inode;
        self.offset = 0;
        Ok(())
    }

    /// 在文件末尾追加数据，必要时从直接寻址迁移到间接寻址
    ///
    /// 地址结构在副本上修改，写回 inode 成功后才更新句柄。
    pub fn append<D: BlockDevice>(&mut self, fs: &mut FileSystem<D>, data: &[u8]) -> Result<()> {
        let size = self.size();
        if size + data.len() > MEDIUM_FILE_MAX {
            return Err(FileSystemError::FileTooLarge);
        }

        let mut inode = self.inode;
        let mut written = 0;

        // 1. 先填满最后一个未写满的扇区
        let used = size % SECTOR_SIZE;
        if used != 0 && !data.is_empty() {
            let sector = fs.find_sector(&inode, (size - 1) / SECTOR_SIZE)?;
            let mut buf = fs.read_sector(SectorNumber::from(sector))?;
            written = (SECTOR_SIZE - used).min(data.len());
            buf[used..used + written].copy_from_slice(&data[..written]);
            fs.write_sector(SectorNumber::from(sector), &buf)?;
            fs.data_bitmap.set(u64::from(sector));
        }

        // 2. 剩余数据逐扇区写入新分配的扇区
        while written < data.len() {
            let chunk = (data.len() - written).min(SECTOR_SIZE);
            let sector = fs.alloc_sector()?;
            let mut buf = [0u8; SECTOR_SIZE];
            buf[..chunk].copy_from_slice(&data[written..written + chunk]);
            fs.write_sector(SectorNumber::from(sector), &buf)?;

            let position = size + written;
            self.link_sector(fs, &mut inode, position / SECTOR_SIZE, sector, position + chunk)?;
            written += chunk;
        }

        // 3. 更新大小并写回 inode
        inode.set_size(size + data.len())?;
        inode.mtime = v6_now();
        fs.write_inode(self.inumber, &inode)?;
        self.inode = inode;
        Ok(())
    }

    /// 把第 `block` 个逻辑块记录到地址结构中，`new_size` 是计入该块之后的文件大小
    fn link_sector<D: BlockDevice>(
        &self,
        fs: &mut FileSystem<D>,
        inode: &mut Inode,
        block: usize,
        sector: u16,
        new_size: usize,
    ) -> Result<()> {
        if new_size <= SMALL_FILE_MAX {
            inode.addr[block] = sector;
            return Ok(());
        }

        if block * SECTOR_SIZE <= SMALL_FILE_MAX {
            self.migrate_to_indirect(fs, inode, block)?;
        }

        let slot = block / ADDRESSES_PER_SECTOR;
        let offset = block % ADDRESSES_PER_SECTOR;
        if offset == 0 {
            // 当前间接扇区已满，新开一个
            let mut table: AddressTable = [0; ADDRESSES_PER_SECTOR];
            table[0] = sector;
            let indirect = fs.alloc_sector()?;
            fs.write_address_table(indirect, &table)?;
            inode.addr[slot] = indirect;
            trace!("inode {}: indirect slot {} -> sector {}", self.inumber, slot, indirect);
        } else {
            let indirect = inode.addr[slot];
            let mut table = fs.read_address_table(indirect)?;
            table[offset] = sector;
            fs.write_address_table(indirect, &table)?;
        }
        Ok(())
    }

    /// 小文件变为中等文件：已有的直接地址搬进新的间接扇区
    fn migrate_to_indirect<D: BlockDevice>(
        &self,
        fs: &mut FileSystem<D>,
        inode: &mut Inode,
        blocks: usize,
    ) -> Result<()> {
        let mut table: AddressTable = [0; ADDRESSES_PER_SECTOR];
        table[..blocks].copy_from_slice(&inode.addr[..blocks]);
        let indirect = fs.alloc_sector()?;
        fs.write_address_table(indirect, &table)?;

        inode.addr = Default::default();
        inode.addr[0] = indirect;
        trace!("inode {}: migrated {} direct addresses to sector {}", self.inumber, blocks, indirect);
        Ok(())
    }
}
