use std::io::Write;

use log::trace;

use crate::{
    disk::{BlockDevice, Sector, SectorNumber, SECTOR_SIZE},
    fs::{
        config::{ADDRESSES_PER_SECTOR, ADDR_SLOTS, INODES_PER_SECTOR, INODE_SIZE},
        error::{FileSystemError, Result},
        inode::{AddressTier, Inode},
        FileSystem,
    },
};

/// 间接扇区的内容：256 个小端序的扇区地址
pub type AddressTable = [u16; ADDRESSES_PER_SECTOR];

pub fn decode_address_table(sector: &Sector) -> AddressTable {
    let mut table = [0u16; ADDRESSES_PER_SECTOR];
    for (address, bytes) in table.iter_mut().zip(sector.chunks_exact(2)) {
        *address = u16::from_le_bytes([bytes[0], bytes[1]]);
    }
    table
}

pub fn encode_address_table(table: &AddressTable) -> Sector {
    let mut sector = [0u8; SECTOR_SIZE];
    for (bytes, address) in sector.chunks_exact_mut(2).zip(table.iter()) {
        bytes.copy_from_slice(&address.to_le_bytes());
    }
    sector
}

impl<D: BlockDevice> FileSystem<D> {
    fn inode_location(&self, inumber: u16) -> (SectorNumber, usize) {
        let sector = SectorNumber::from(self.super_block.inode_start)
            + SectorNumber::from(inumber) / INODES_PER_SECTOR as SectorNumber;
        let offset = usize::from(inumber) % INODES_PER_SECTOR * INODE_SIZE;
        (sector, offset)
    }

    pub fn read_inode(&self, inumber: u16) -> Result<Inode> {
        if inumber < 1 {
            return Err(FileSystemError::BadParameter);
        }
        if u32::from(inumber) >= self.super_block.inode_capacity() {
            return Err(FileSystemError::InodeOutOfRange);
        }

        let (sector, offset) = self.inode_location(inumber);
        let buf = self.read_sector(sector)?;
        let inode = Inode::from_bytes(&buf[offset..offset + INODE_SIZE])?;
        if !inode.is_allocated() {
            return Err(FileSystemError::UnallocatedInode);
        }
        Ok(inode)
    }

    /// 读-改-写 inode 所在的扇区，并在两个位图中标记占用
    pub fn write_inode(&mut self, inumber: u16, inode: &Inode) -> Result<()> {
        if inumber < 1 {
            return Err(FileSystemError::BadParameter);
        }
        let (sector, offset) = self.inode_location(inumber);
        let last = SectorNumber::from(self.super_block.inode_start)
            + SectorNumber::from(self.super_block.inode_sectors);
        if sector >= last {
            return Err(FileSystemError::BadParameter);
        }

        let mut buf = self.read_sector(sector)?;
        buf[offset..offset + INODE_SIZE].copy_from_slice(&inode.to_bytes()?);
        self.write_sector(sector, &buf)?;

        self.data_bitmap.set(u64::from(sector));
        self.inode_bitmap.set(u64::from(inumber));
        Ok(())
    }

    /// 分配一个空闲 inode 号，只标记位图，不写入记录
    pub fn alloc_inode(&mut self) -> Result<u16> {
        let inumber = match self.inode_bitmap.find_next() {
            Ok(inumber) => inumber,
            Err(FileSystemError::BitmapFull) => return Err(FileSystemError::OutOfMemory),
            Err(e) => return Err(e),
        };
        self.inode_bitmap.set(inumber);
        trace!("allocated inode {}", inumber);
        Ok(inumber as u16)
    }

    /// 分配一个空闲的数据扇区并标记为已用
    pub(crate) fn alloc_sector(&mut self) -> Result<u16> {
        let sector = match self.data_bitmap.find_next() {
            Ok(sector) => sector,
            Err(FileSystemError::BitmapFull) => return Err(FileSystemError::OutOfMemory),
            Err(e) => return Err(e),
        };
        self.data_bitmap.set(sector);
        trace!("allocated sector {}", sector);
        Ok(sector as u16)
    }

    pub(crate) fn read_address_table(&self, sector: u16) -> Result<AddressTable> {
        Ok(decode_address_table(&self.read_sector(SectorNumber::from(sector))?))
    }

    pub(crate) fn write_address_table(&self, sector: u16, table: &AddressTable) -> Result<()> {
        self.write_sector(SectorNumber::from(sector), &encode_address_table(table))
    }

    /// 把文件内的逻辑块号翻译成磁盘扇区号
    pub fn find_sector(&self, inode: &Inode, block: usize) -> Result<u16> {
        if !inode.is_allocated() {
            return Err(FileSystemError::UnallocatedInode);
        }
        match inode.tier()? {
            AddressTier::Small => inode
                .addr
                .get(block)
                .copied()
                .ok_or(FileSystemError::OffsetOutOfRange),
            AddressTier::Medium => {
                let slot = block / ADDRESSES_PER_SECTOR;
                let offset = block % ADDRESSES_PER_SECTOR;
                if slot > ADDR_SLOTS - 2 {
                    return Err(FileSystemError::OffsetOutOfRange);
                }
                let table = self.read_address_table(inode.addr[slot])?;
                Ok(table[offset])
            }
        }
    }

    /// inode 占用的全部扇区：数据扇区以及中等文件的间接扇区
    pub fn occupied_sectors(&self, inode: &Inode) -> Result<Vec<u16>> {
        let blocks = inode.size().div_ceil(SECTOR_SIZE);
        let mut sectors = Vec::with_capacity(blocks);
        match inode.tier()? {
            AddressTier::Small => sectors.extend_from_slice(&inode.addr[..blocks]),
            AddressTier::Medium => {
                let slots = blocks.div_ceil(ADDRESSES_PER_SECTOR);
                for slot in 0..slots {
                    let indirect = inode.addr[slot];
                    sectors.push(indirect);
                    let table = self.read_address_table(indirect)?;
                    let used = (blocks - slot * ADDRESSES_PER_SECTOR).min(ADDRESSES_PER_SECTOR);
                    sectors.extend_from_slice(&table[..used]);
                }
            }
        }
        Ok(sectors)
    }

    /// 打印 inode 表中所有已分配的 inode
    pub fn scan_inodes<W: Write>(&self, out: &mut W) -> Result<()> {
        let start = SectorNumber::from(self.super_block.inode_start);
        for index in 0..SectorNumber::from(self.super_block.inode_sectors) {
            let sector = self.read_sector(start + index)?;
            for (slot, record) in sector.chunks_exact(INODE_SIZE).enumerate() {
                let inode = Inode::from_bytes(record)?;
                if inode.is_allocated() {
                    let kind = if inode.is_directory() { "DIR" } else { "FIL" };
                    writeln!(
                        out,
                        "inode {:3} ({}) len   {}",
                        index as usize * INODES_PER_SECTOR + slot,
                        kind,
                        inode.size()
                    )?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{
        config::{MEDIUM_FILE_MAX, ROOT_INUMBER, SMALL_FILE_MAX},
        inode::InodeMode,
        tests::memory_fs,
    };

    #[test]
    fn address_table_round_trip() {
        let mut table = [0u16; ADDRESSES_PER_SECTOR];
        table[0] = 0x0102;
        table[255] = 77;
        let sector = encode_address_table(&table);
        assert_eq!(&sector[..2], &[0x02, 0x01]);
        assert_eq!(decode_address_table(&sector), table);
    }

    #[test]
    fn read_rejects_bad_numbers() {
        let fs = memory_fs(100, 16);
        assert!(matches!(fs.read_inode(0), Err(FileSystemError::BadParameter)));
        assert!(matches!(fs.read_inode(16), Err(FileSystemError::InodeOutOfRange)));
        assert!(matches!(fs.read_inode(5), Err(FileSystemError::UnallocatedInode)));
        assert!(fs.read_inode(ROOT_INUMBER).is_ok());
    }

    #[test]
    fn read_write_inode() {
        let mut fs = memory_fs(100, 32);
        let mut inode = Inode::new(InodeMode::ALLOCATED | InodeMode::from_bits_retain(0o644));
        inode.uid = 3;
        inode.gid = 4;
        inode.addr[0] = 40;
        inode.set_size(300).unwrap();

        fs.write_inode(20, &inode).unwrap();
        assert_eq!(fs.read_inode(20).unwrap(), inode);
        assert!(fs.inode_bitmap.get(20).unwrap());

        // 同一扇区内的其他 inode 不受影响
        assert!(matches!(fs.read_inode(21), Err(FileSystemError::UnallocatedInode)));
        assert!(fs.read_inode(ROOT_INUMBER).unwrap().is_directory());
    }

    #[test]
    fn write_outside_table() {
        let mut fs = memory_fs(100, 16);
        let inode = Inode::new(InodeMode::ALLOCATED);
        assert!(matches!(
            fs.write_inode(16, &inode),
            Err(FileSystemError::BadParameter)
        ));
        assert!(matches!(
            fs.write_inode(0, &inode),
            Err(FileSystemError::BadParameter)
        ));
    }

    #[test]
    fn alloc_until_full() {
        let mut fs = memory_fs(100, 16);
        // inode 位图覆盖 [2, 15]
        for expected in 2..16 {
            assert_eq!(fs.alloc_inode().unwrap(), expected);
        }
        assert!(matches!(fs.alloc_inode(), Err(FileSystemError::OutOfMemory)));
    }

    #[test]
    fn find_sector_small() {
        let fs = memory_fs(100, 16);
        let mut inode = Inode::new(InodeMode::ALLOCATED);
        inode.addr = [30, 31, 32, 33, 34, 35, 36, 37];
        inode.set_size(SMALL_FILE_MAX).unwrap();

        assert_eq!(fs.find_sector(&inode, 0).unwrap(), 30);
        assert_eq!(fs.find_sector(&inode, 7).unwrap(), 37);
        assert!(matches!(
            fs.find_sector(&inode, 8),
            Err(FileSystemError::OffsetOutOfRange)
        ));
        assert_eq!(fs.occupied_sectors(&inode).unwrap(), inode.addr.to_vec());
    }

    #[test]
    fn find_sector_medium() {
        let fs = memory_fs(100, 16);
        let mut first = [0u16; ADDRESSES_PER_SECTOR];
        let mut second = [0u16; ADDRESSES_PER_SECTOR];
        for (i, address) in first.iter_mut().enumerate() {
            *address = 1000 + i as u16;
        }
        second[0] = 5000;
        second[1] = 5001;
        fs.write_address_table(50, &first).unwrap();
        fs.write_address_table(51, &second).unwrap();

        let mut inode = Inode::new(InodeMode::ALLOCATED);
        inode.addr[0] = 50;
        inode.addr[1] = 51;
        inode.set_size((ADDRESSES_PER_SECTOR + 2) * SECTOR_SIZE).unwrap();

        assert_eq!(fs.find_sector(&inode, 0).unwrap(), 1000);
        assert_eq!(fs.find_sector(&inode, 255).unwrap(), 1255);
        assert_eq!(fs.find_sector(&inode, 256).unwrap(), 5000);
        assert_eq!(fs.find_sector(&inode, 257).unwrap(), 5001);
        assert!(matches!(
            fs.find_sector(&inode, 7 * ADDRESSES_PER_SECTOR),
            Err(FileSystemError::OffsetOutOfRange)
        ));

        let occupied = fs.occupied_sectors(&inode).unwrap();
        assert_eq!(occupied.len(), 2 + ADDRESSES_PER_SECTOR + 2);
        assert_eq!(occupied[0], 50);
        assert_eq!(occupied[ADDRESSES_PER_SECTOR + 1], 51);
        assert_eq!(occupied.last(), Some(&5001));
    }

    #[test]
    fn find_sector_rejects_bad_inodes() {
        let fs = memory_fs(100, 16);
        let mut inode = Inode::default();
        assert!(matches!(
            fs.find_sector(&inode, 0),
            Err(FileSystemError::UnallocatedInode)
        ));

        inode = Inode::new(InodeMode::ALLOCATED);
        inode.set_size(MEDIUM_FILE_MAX + 1).unwrap();
        assert!(matches!(
            fs.find_sector(&inode, 0),
            Err(FileSystemError::FileTooLarge)
        ));
    }

    #[test]
    fn scan_lists_allocated_inodes() {
        let mut fs = memory_fs(100, 32);
        let mut inode = Inode::new(InodeMode::ALLOCATED);
        inode.set_size(42).unwrap();
        fs.write_inode(17, &inode).unwrap();

        let mut out = Vec::new();
        fs.scan_inodes(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert_eq!(out, "inode   1 (DIR) len   0\ninode  17 (FIL) len   42\n");
    }
}
