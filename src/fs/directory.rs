use std::{borrow::Cow, io::Write};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{
    disk::{BlockDevice, SECTOR_SIZE},
    fs::{
        config::{
            DIRENTS_PER_SECTOR, DIRENT_MAXLEN, DIRENT_SIZE, MAX_PATH_LEN, PATH_SEPARATOR,
            ROOT_INUMBER,
        },
        error::{FileSystemError, Result},
        file::FileHandle,
        inode::InodeMode,
        FileSystem,
    },
};

// 磁盘上的目录项：名字不一定以 0 结尾
#[derive(Debug, Serialize, Deserialize)]
struct RawDirEntry {
    inumber: u16,
    name: [u8; DIRENT_MAXLEN],
}

/// 一个目录项，名字保留磁盘上的原始字节（不含结尾的 0）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inumber: u16,
    pub name: Vec<u8>,
}

impl DirEntry {
    pub fn new(inumber: u16, name: &str) -> Result<Self> {
        if name.len() > DIRENT_MAXLEN {
            return Err(FileSystemError::FilenameTooLong);
        }
        Ok(Self {
            inumber,
            name: name.as_bytes().to_vec(),
        })
    }

    /// 用于显示的名字，非 UTF-8 字节被替换
    pub fn name_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: RawDirEntry = bincode::deserialize(bytes)?;
        let len = raw.name.iter().position(|&b| b == 0).unwrap_or(DIRENT_MAXLEN);
        Ok(Self {
            inumber: raw.inumber,
            name: raw.name[..len].to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut name = [0u8; DIRENT_MAXLEN];
        let bytes = self.name.as_slice();
        if bytes.len() > DIRENT_MAXLEN {
            return Err(FileSystemError::FilenameTooLong);
        }
        name[..bytes.len()].copy_from_slice(bytes);
        Ok(bincode::serialize(&RawDirEntry {
            inumber: self.inumber,
            name,
        })?)
    }
}

/// 逐个读取目录项，每次从目录内容中取一个扇区缓存起来
pub struct DirectoryReader<'a, D: BlockDevice> {
    fs: &'a FileSystem<D>,
    file: FileHandle,
    cache: Vec<DirEntry>,
    produced: usize, // 已返回的目录项个数
    cached: usize,   // 已读入缓存的目录项个数
}

impl<'a, D: BlockDevice> DirectoryReader<'a, D> {
    pub fn open(fs: &'a FileSystem<D>, inumber: u16) -> Result<Self> {
        let file = FileHandle::open(fs, inumber)?;
        if !file.inode.is_directory() {
            return Err(FileSystemError::InvalidDirectoryInode);
        }
        Ok(Self {
            fs,
            file,
            cache: Vec::with_capacity(DIRENTS_PER_SECTOR),
            produced: 0,
            cached: 0,
        })
    }

    /// 下一个目录项，`None` 表示目录已读完
    pub fn next_entry(&mut self) -> Result<Option<DirEntry>> {
        if self.produced == self.cached {
            let mut buf = [0u8; SECTOR_SIZE];
            let read = self.file.read_block(self.fs, &mut buf)?;
            let count = read / DIRENT_SIZE;
            if count == 0 {
                return Ok(None);
            }
            self.cache.clear();
            for record in buf[..count * DIRENT_SIZE].chunks_exact(DIRENT_SIZE) {
                self.cache.push(DirEntry::from_bytes(record)?);
            }
            self.cached += count;
        }

        let index = self.cache.len() - (self.cached - self.produced);
        self.produced += 1;
        Ok(Some(self.cache[index].clone()))
    }
}

impl<D: BlockDevice> Iterator for DirectoryReader<'_, D> {
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}

// 路径不能超过 MAX_PATH_LEN 字节，截断时保持在字符边界上
fn truncate_path(path: &mut String) {
    if path.len() > MAX_PATH_LEN {
        let mut end = MAX_PATH_LEN;
        while !path.is_char_boundary(end) {
            end -= 1;
        }
        path.truncate(end);
    }
}

impl<D: BlockDevice> FileSystem<D> {
    /// 从 `inumber` 所在的目录出发解析路径，返回目标的 inode 号
    pub fn dir_lookup(&self, inumber: u16, path: &str) -> Result<u16> {
        if path == "/" {
            DirectoryReader::open(self, inumber)?;
            return Ok(inumber);
        }

        let path = path.trim_start_matches(PATH_SEPARATOR);
        if path.is_empty() {
            return Err(FileSystemError::InodeOutOfRange);
        }
        let (head, rest) = match path.split_once(PATH_SEPARATOR) {
            Some((head, rest)) => (head, rest.trim_start_matches(PATH_SEPARATOR)),
            None => (path, ""),
        };

        for entry in DirectoryReader::open(self, inumber)? {
            let entry = entry?;
            if entry.name == head.as_bytes() {
                if rest.is_empty() {
                    return Ok(entry.inumber);
                }
                return self.dir_lookup(entry.inumber, rest);
            }
        }
        Err(FileSystemError::InodeOutOfRange)
    }

    /// 在父目录中新建一个目录项，并为它分配、写入新的 inode
    pub fn create_entry(&mut self, path: &str, mode: InodeMode) -> Result<u16> {
        let trimmed = path.trim_end_matches(PATH_SEPARATOR);
        let (parent, leaf) = match trimmed.rsplit_once(PATH_SEPARATOR) {
            Some((parent, leaf)) => (parent.trim_end_matches(PATH_SEPARATOR), leaf),
            None => ("", trimmed),
        };
        if leaf.is_empty() {
            return Err(FileSystemError::BadParameter);
        }
        if leaf.len() > DIRENT_MAXLEN {
            return Err(FileSystemError::FilenameTooLong);
        }
        let parent = if parent.is_empty() { "/" } else { parent };

        let parent_inumber = match self.dir_lookup(ROOT_INUMBER, parent) {
            Ok(inumber) => inumber,
            Err(FileSystemError::Io(e)) => return Err(FileSystemError::Io(e)),
            Err(_) => return Err(FileSystemError::BadParameter),
        };
        match self.dir_lookup(parent_inumber, leaf) {
            Ok(_) => return Err(FileSystemError::AlreadyExists(path.to_string())),
            Err(FileSystemError::InodeOutOfRange) => {}
            Err(e) => return Err(e),
        }

        let inumber = self.alloc_inode()?;
        let entry = DirEntry::new(inumber, leaf)?;
        if let Err(e) = self.link_entry(parent_inumber, &entry, mode) {
            // 回滚 inode 的分配
            self.inode_bitmap.clear(u64::from(inumber));
            warn!("create {}: released inode {}: {}", path, inumber, e);
            return Err(e);
        }

        debug!("created {} as inode {} in directory {}", path, inumber, parent_inumber);
        Ok(inumber)
    }

    fn link_entry(&mut self, parent: u16, entry: &DirEntry, mode: InodeMode) -> Result<()> {
        let mut parent = FileHandle::open(self, parent)?;
        parent.append(self, &entry.to_bytes()?)?;
        FileHandle::new(entry.inumber).create(self, mode | InodeMode::ALLOCATED)
    }

    /// 递归打印以 `inumber` 为根的子树
    pub fn print_tree<W: Write>(&self, inumber: u16, prefix: &str, out: &mut W) -> Result<()> {
        let reader = match DirectoryReader::open(self, inumber) {
            Ok(reader) => reader,
            Err(FileSystemError::InvalidDirectoryInode) => {
                writeln!(out, "FIL {}", prefix)?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        writeln!(out, "DIR {}{}", prefix, PATH_SEPARATOR)?;

        for entry in reader {
            let entry = entry?;
            let mut child = String::from(prefix);
            child.push(PATH_SEPARATOR);
            child.push_str(&entry.name_lossy());
            truncate_path(&mut child);
            self.print_tree(entry.inumber, &child, out)?;
        }
        Ok(())
    }
}
