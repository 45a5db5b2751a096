//! UNIX v6 文件系统引擎：扇区 I/O、位图分配、挂载、inode、文件和目录层

pub mod disk;
pub mod fs;
pub mod utils;
