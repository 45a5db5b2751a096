use std::{
    fs::{File, OpenOptions},
    io::{Error, ErrorKind, Read, Result, Seek, SeekFrom, Write},
    path::Path,
    sync::{Mutex, MutexGuard},
};

use crate::disk::{
    block_device::BlockDevice,
    types::{Sector, SectorNumber, SECTOR_SIZE},
};

/// 以扇区为单位访问任意可随机读写的字节存储（宿主文件、内存 Cursor 等）
#[derive(Debug)]
pub struct FileDisk<S = File> {
    store: Mutex<S>,
}

impl FileDisk<File> {
    /// 打开已存在的磁盘镜像
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self::new(file))
    }

    /// 创建（或截断）一个新的磁盘镜像
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::new(file))
    }
}

impl<S> FileDisk<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    pub fn into_inner(self) -> Result<S> {
        self.store
            .into_inner()
            .map_err(|_| Error::new(ErrorKind::Other, "disk lock poisoned"))
    }

    fn lock(&self) -> Result<MutexGuard<'_, S>> {
        self.store
            .lock()
            .map_err(|_| Error::new(ErrorKind::Other, "disk lock poisoned"))
    }
}

fn byte_offset(sector: SectorNumber) -> u64 {
    u64::from(sector) * SECTOR_SIZE as u64
}

impl<S: Read + Write + Seek + Send> BlockDevice for FileDisk<S> {
    fn read_sector(&self, sector: SectorNumber, buf: &mut Sector) -> Result<()> {
        let mut store = self.lock()?;
        store.seek(SeekFrom::Start(byte_offset(sector)))?;
        // 不足 512 字节视为 I/O 错误
        store.read_exact(buf)?;
        Ok(())
    }

    fn write_sector(&self, sector: SectorNumber, buf: &Sector) -> Result<()> {
        let mut store = self.lock()?;
        store.seek(SeekFrom::Start(byte_offset(sector)))?;
        store.write_all(buf)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.lock()?.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn read_write() {
        let disk = FileDisk::new(Cursor::new(Vec::new()));

        let sector = [42u8; SECTOR_SIZE];
        disk.write_sector(3, &sector).unwrap();

        let mut read = [0u8; SECTOR_SIZE];
        disk.read_sector(3, &mut read).unwrap();
        assert_eq!(sector, read);

        // 写第 3 扇区时前面的扇区被补零
        disk.read_sector(0, &mut read).unwrap();
        assert_eq!(read, [0u8; SECTOR_SIZE]);
    }

    #[test]
    fn overwrite_keeps_neighbours() {
        let disk = FileDisk::new(Cursor::new(Vec::new()));
        disk.write_sector(0, &[1u8; SECTOR_SIZE]).unwrap();
        disk.write_sector(1, &[2u8; SECTOR_SIZE]).unwrap();
        disk.write_sector(0, &[3u8; SECTOR_SIZE]).unwrap();

        let mut read = [0u8; SECTOR_SIZE];
        disk.read_sector(1, &mut read).unwrap();
        assert_eq!(read, [2u8; SECTOR_SIZE]);
        disk.read_sector(0, &mut read).unwrap();
        assert_eq!(read, [3u8; SECTOR_SIZE]);

        assert_eq!(disk.into_inner().unwrap().into_inner().len(), 2 * SECTOR_SIZE);
    }

    #[test]
    fn short_read_is_an_error() {
        let disk = FileDisk::new(Cursor::new(vec![0u8; SECTOR_SIZE + 100]));
        let mut read = [0u8; SECTOR_SIZE];
        assert!(disk.read_sector(0, &mut read).is_ok());
        let err = disk.read_sector(1, &mut read).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnexpectedEof);
    }
}
