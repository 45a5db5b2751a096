use crate::disk::SECTOR_SIZE;

pub const BOOT_SECTOR: u32 = 0;
pub const SUPER_BLOCK_SECTOR: u32 = 1;

// 引导扇区中的魔数位置与取值
pub const BOOT_MAGIC_OFFSET: usize = 32;
pub const BOOT_MAGIC: u8 = 12;

pub const ROOT_INUMBER: u16 = 1;

// 每个 Inode 32 字节，一个 512B 扇区可以存 16 个 Inode
pub const INODE_SIZE: usize = 32;
pub const INODES_PER_SECTOR: usize = SECTOR_SIZE / INODE_SIZE;

// 每个 inode 的地址槽个数
pub const ADDR_SLOTS: usize = 8;

// 一个间接扇区可以存放的扇区地址个数（每个地址 2 字节）
pub const ADDRESSES_PER_SECTOR: usize = SECTOR_SIZE / 2;

/// 小文件上限：全部使用直接地址
pub const SMALL_FILE_MAX: usize = ADDR_SLOTS * SECTOR_SIZE;

/// 中等文件上限：前 7 个槽位为间接地址
pub const MEDIUM_FILE_MAX: usize = (ADDR_SLOTS - 1) * ADDRESSES_PER_SECTOR * SECTOR_SIZE;

/// 24 位文件大小能表示的最大值
pub const MAX_ENCODABLE_SIZE: u32 = 0x00FF_FFFF;

pub const DIRENT_MAXLEN: usize = 14;
pub const DIRENT_SIZE: usize = 2 + DIRENT_MAXLEN;
pub const DIRENTS_PER_SECTOR: usize = SECTOR_SIZE / DIRENT_SIZE;

pub const MAX_PATH_LEN: usize = 1024;
pub const PATH_SEPARATOR: char = '/';
