use std::fmt;

/// 文件系统错误类型
#[derive(Debug)]
pub enum FileSystemError {
    Io(std::io::Error),    // 底层 I/O 错误
    BadBootSector,         // 引导扇区魔数不匹配
    NotEnoughSectors,      // mkfs 时扇区数不足
    BadParameter,          // 参数非法
    FilenameTooLong,       // 文件名超过目录项长度
    OffsetOutOfRange,      // 文件内偏移越界
    OutOfMemory,           // 没有空闲 inode 或扇区可分配
    BitmapFull,            // 位图已满
    FileTooLarge,          // 超出中等文件上限
    UnallocatedInode,      // inode 未分配
    InvalidDirectoryInode, // 期望目录，实际是普通文件
    InodeOutOfRange,       // inode 编号越界或路径中找不到目录项
    AlreadyExists(String), // 目录项已存在，带路径
}

impl From<std::io::Error> for FileSystemError {
    fn from(e: std::io::Error) -> Self {
        FileSystemError::Io(e)
    }
}

impl From<bincode::Error> for FileSystemError {
    fn from(e: bincode::Error) -> Self {
        FileSystemError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

// 实现 Display trait，用于打印错误信息
impl fmt::Display for FileSystemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "Disk I/O error: {}", e),
            Self::BadBootSector => write!(f, "Bad boot sector"),
            Self::NotEnoughSectors => write!(f, "Not enough sectors for the requested inodes"),
            Self::BadParameter => write!(f, "Bad parameter"),
            Self::FilenameTooLong => write!(f, "Filename is too long"),
            Self::OffsetOutOfRange => write!(f, "Offset out of range"),
            Self::OutOfMemory => write!(f, "Out of memory"),
            Self::BitmapFull => write!(f, "Bitmap is full"),
            Self::FileTooLarge => write!(f, "File is too large"),
            Self::UnallocatedInode => write!(f, "Unallocated inode"),
            Self::InvalidDirectoryInode => write!(f, "Invalid directory inode"),
            Self::InodeOutOfRange => write!(f, "Inode out of range"),
            Self::AlreadyExists(path) => write!(f, "File or directory already exists: {}", path),
        }
    }
}

// 支持链式错误，方便追踪底层原因
impl std::error::Error for FileSystemError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

/// 文件系统统一结果类型
pub type Result<T> = std::result::Result<T, FileSystemError>;
