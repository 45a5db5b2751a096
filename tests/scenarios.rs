use std::{env, fs, path::PathBuf};

use uuid::Uuid;
use v6fs::fs::{
    config::ROOT_INUMBER,
    directory::DirectoryReader,
    error::FileSystemError,
    file::FileHandle,
    inode::InodeMode,
    FileSystem,
};

// 临时镜像文件，离开作用域时删除
struct TempImage(PathBuf);

impl TempImage {
    fn new() -> Self {
        Self(env::temp_dir().join(format!("v6fs-{}.uv6", Uuid::new_v4())))
    }
}

impl Drop for TempImage {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.0);
    }
}

fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| b'a' + (i % 26) as u8).collect()
}

#[test]
fn mkfs_then_mount() {
    let image = TempImage::new();
    FileSystem::mkfs_file(&image.0, 100, 16).unwrap();
    assert_eq!(fs::metadata(&image.0).unwrap().len(), 100 * 512);

    let filesystem = FileSystem::open(&image.0).unwrap();
    let dump = filesystem.super_block.to_string();
    assert!(dump.contains("s_isize             : 1"));
    assert!(dump.contains("s_fsize             : 100"));

    let root = filesystem.read_inode(ROOT_INUMBER).unwrap();
    assert!(root.is_directory());
    let mut reader = DirectoryReader::open(&filesystem, ROOT_INUMBER).unwrap();
    assert!(reader.next_entry().unwrap().is_none());
    filesystem.unmount().unwrap();
}

#[test]
fn mount_rejects_garbage() {
    let image = TempImage::new();
    fs::write(&image.0, vec![0u8; 4096]).unwrap();
    assert!(matches!(
        FileSystem::open(&image.0),
        Err(FileSystemError::BadBootSector)
    ));
}

#[test]
fn file_survives_remount() {
    let image = TempImage::new();
    FileSystem::mkfs_file(&image.0, 100, 16).unwrap();
    let data = content(5000);

    let mut filesystem = FileSystem::open(&image.0).unwrap();
    filesystem.create_entry("/a", InodeMode::DIRECTORY).unwrap();
    let inumber = filesystem.create_entry("/a/b.txt", InodeMode::empty()).unwrap();
    let mut file = FileHandle::open(&filesystem, inumber).unwrap();
    file.append(&mut filesystem, &data).unwrap();
    filesystem.unmount().unwrap();

    let filesystem = FileSystem::open(&image.0).unwrap();
    let inumber = filesystem.dir_lookup(ROOT_INUMBER, "/a/b.txt").unwrap();
    let mut file = FileHandle::open(&filesystem, inumber).unwrap();
    assert_eq!(file.size(), 5000);
    assert_eq!(file.read_to_end(&filesystem).unwrap(), data);

    let mut tree = Vec::new();
    filesystem.print_tree(ROOT_INUMBER, "", &mut tree).unwrap();
    assert_eq!(String::from_utf8(tree).unwrap(), "DIR /\nDIR /a/\nFIL /a/b.txt\n");
}

#[test]
fn path_through_a_file() {
    let image = TempImage::new();
    FileSystem::mkfs_file(&image.0, 100, 16).unwrap();

    let mut filesystem = FileSystem::open(&image.0).unwrap();
    filesystem.create_entry("/a", InodeMode::DIRECTORY).unwrap();
    filesystem.create_entry("/a/b.txt", InodeMode::empty()).unwrap();
    assert!(matches!(
        filesystem.dir_lookup(ROOT_INUMBER, "/a/b.txt/c"),
        Err(FileSystemError::InvalidDirectoryInode)
    ));
}
