/// 每个扇区（Sector）的大小：512 字节
/// 磁盘以“扇区”为最小读写单位，上层永远不会看到半个扇区。
pub const SECTOR_SIZE: usize = 512;

/// 定义一个扇区类型（512 字节的字节数组）
pub type Sector = [u8; SECTOR_SIZE];

/// 扇区编号
pub type SectorNumber = u32;
