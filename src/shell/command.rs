use std::{
    fmt, fs as host_fs,
    io::{self, Write},
    path::Path,
};

use colored::*;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use sha2::{Digest, Sha256};
use v6fs::{
    disk::{BlockDevice, SECTOR_SIZE},
    fs::{
        config::{MEDIUM_FILE_MAX, ROOT_INUMBER},
        error::FileSystemError,
        file::FileHandle,
        inode::InodeMode,
        FileSystem,
    },
};

use crate::shell::parse::COMMANDS;

// 每次追加的字节数，同时也是进度条的步长
const ADD_CHUNK: usize = 64 * SECTOR_SIZE;

#[derive(Debug)]
pub enum Command {
    Help,
    Exit,
    Mkfs {
        disk: String,
        inodes: u16,
        blocks: u16,
    },
    Mount(String),
    Umount,
    Mkdir(String),
    Lsall,
    Add {
        src: String,
        dst: String,
    },
    Cat(String),
    Istat(u16),
    Inode(String),
    Sha(String),
    Psb,
    Scan,
    Bm,
}

/// shell 层的错误，文件系统错误原样包在 `Fs` 里
#[derive(Debug)]
pub enum ShellError {
    InvalidCommand,
    WrongArguments,
    InvalidNumber(String),
    NotMounted,
    CatOnDirectory,
    Fs(FileSystemError),
    Io(io::Error),
    Prompt(dialoguer::Error),
}

impl From<FileSystemError> for ShellError {
    fn from(e: FileSystemError) -> Self {
        ShellError::Fs(e)
    }
}

impl From<io::Error> for ShellError {
    fn from(e: io::Error) -> Self {
        ShellError::Io(e)
    }
}

impl From<dialoguer::Error> for ShellError {
    fn from(e: dialoguer::Error) -> Self {
        ShellError::Prompt(e)
    }
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCommand => write!(f, "invalid command"),
            Self::WrongArguments => write!(f, "wrong number of arguments"),
            Self::InvalidNumber(arg) => write!(f, "not a valid number: {}", arg),
            Self::NotMounted => write!(f, "mount the FS before the operation"),
            Self::CatOnDirectory => write!(f, "cat on a directory is not defined"),
            Self::Fs(e) => write!(f, "{}", e),
            Self::Io(e) => write!(f, "{}", e),
            Self::Prompt(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ShellError {}

fn mounted(fs: &Option<FileSystem>) -> Result<&FileSystem, ShellError> {
    fs.as_ref().ok_or(ShellError::NotMounted)
}

fn mounted_mut(fs: &mut Option<FileSystem>) -> Result<&mut FileSystem, ShellError> {
    fs.as_mut().ok_or(ShellError::NotMounted)
}

/// 卸载当前的文件系统（如果有）
pub fn unmount(fs: &mut Option<FileSystem>) -> Result<(), ShellError> {
    if let Some(mounted) = fs.take() {
        mounted.unmount()?;
        info!("filesystem unmounted");
    }
    Ok(())
}

pub fn execute_command(cmd: &Command, fs: &mut Option<FileSystem>) -> Result<(), ShellError> {
    match cmd {
        Command::Help => print_help(),
        Command::Exit => unmount(fs)?,
        Command::Mkfs {
            disk,
            inodes,
            blocks,
        } => {
            if Path::new(disk).exists() {
                let overwrite = Confirm::new()
                    .with_prompt(format!("{} already exists, overwrite it?", disk))
                    .default(false)
                    .interact()?;
                if !overwrite {
                    return Ok(());
                }
            }
            FileSystem::mkfs_file(disk, *blocks, *inodes)?;
            println!(
                "{} {} ({} sectors, {} inodes)",
                "Created filesystem".green(),
                disk.cyan(),
                blocks,
                inodes
            );
        }
        Command::Mount(disk) => {
            unmount(fs)?;
            *fs = Some(FileSystem::open(disk)?);
            println!("{} {}", "Mounted".green(), disk.cyan());
        }
        Command::Umount => {
            if fs.is_none() {
                return Err(ShellError::NotMounted);
            }
            unmount(fs)?;
        }
        Command::Mkdir(path) => {
            let inumber = mounted_mut(fs)?.create_entry(path, InodeMode::DIRECTORY)?;
            info!("mkdir {} -> inode {}", path, inumber);
        }
        Command::Lsall => {
            let mut out = io::stdout().lock();
            mounted(fs)?.print_tree(ROOT_INUMBER, "", &mut out)?;
            out.flush()?;
        }
        Command::Add { src, dst } => add_file(mounted_mut(fs)?, src, dst)?,
        Command::Cat(path) => {
            let fs = mounted(fs)?;
            let inumber = fs.dir_lookup(ROOT_INUMBER, path)?;
            let mut file = FileHandle::open(fs, inumber)?;
            if file.inode.is_directory() {
                return Err(ShellError::CatOnDirectory);
            }
            let content = file.read_to_end(fs)?;
            println!("{}", String::from_utf8_lossy(&content));
        }
        Command::Istat(inumber) => println!("{}", mounted(fs)?.read_inode(*inumber)?),
        Command::Inode(path) => {
            let inumber = mounted(fs)?.dir_lookup(ROOT_INUMBER, path)?;
            println!("inode : {}", inumber);
        }
        Command::Sha(path) => println!("{}", sha_line(mounted(fs)?, path)?),
        Command::Psb => println!("{}", mounted(fs)?.super_block),
        Command::Scan => {
            let mut out = io::stdout().lock();
            mounted(fs)?.scan_inodes(&mut out)?;
            out.flush()?;
        }
        Command::Bm => {
            let fs = mounted(fs)?;
            println!("{}", "inode bitmap".bright_yellow());
            println!("{}", fs.inode_bitmap);
            println!("{}", "sector bitmap".bright_yellow());
            println!("{}", fs.data_bitmap);
        }
    }

    Ok(())
}

/// 把宿主机上的文件复制进文件系统
fn add_file(fs: &mut FileSystem, src: &str, dst: &str) -> Result<(), ShellError> {
    let data = host_fs::read(src)?;
    if data.len() > MEDIUM_FILE_MAX {
        return Err(FileSystemError::FileTooLarge.into());
    }

    let inumber = fs.create_entry(dst, InodeMode::empty())?;
    let mut file = FileHandle::open(fs, inumber)?;

    let pb = if data.len() > ADD_CHUNK {
        ProgressBar::new(data.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    if let Ok(style) = ProgressStyle::with_template("[{bar:40.green/black}] {bytes}/{total_bytes} {msg}") {
        pb.set_style(style.progress_chars("#>-"));
    }

    for chunk in data.chunks(ADD_CHUNK) {
        file.append(fs, chunk)?;
        pb.inc(chunk.len() as u64);
    }
    pb.finish_and_clear();

    println!(
        "{} {} -> {} (inode {}, {} bytes)",
        "Added".green(),
        src,
        dst.cyan(),
        inumber,
        data.len()
    );
    Ok(())
}

/// 文件内容的 SHA-256，目录没有摘要
fn sha_line<D: BlockDevice>(fs: &FileSystem<D>, path: &str) -> Result<String, ShellError> {
    let inumber = fs.dir_lookup(ROOT_INUMBER, path)?;
    let mut file = FileHandle::open(fs, inumber)?;
    if file.inode.is_directory() {
        return Ok(format!("SHA inode {}: no SHA for directories.", inumber));
    }
    let content = file.read_to_end(fs)?;
    Ok(format!("SHA inode {}: {:x}", inumber, Sha256::digest(&content)))
}

fn print_help() {
    println!("{}", "v6fs commands".bright_cyan().bold());
    for (name, args, help) in COMMANDS {
        let usage = if args.is_empty() {
            name.to_string()
        } else {
            format!("{} {}", name, args)
        };
        println!("  {:<40} {}", usage, help.bright_black());
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use v6fs::disk::FileDisk;

    use super::*;

    #[test]
    fn sha_of_files_and_directories() {
        let disk = FileDisk::new(Cursor::new(Vec::new()));
        FileSystem::format(&disk, 100, 16).unwrap();
        let mut fs = FileSystem::mount(disk).unwrap();
        let dir = fs.create_entry("/a", InodeMode::DIRECTORY).unwrap();
        let inumber = fs.create_entry("/a/abc", InodeMode::empty()).unwrap();
        let mut file = FileHandle::open(&fs, inumber).unwrap();
        file.append(&mut fs, b"abc").unwrap();

        assert_eq!(
            sha_line(&fs, "/a/abc").unwrap(),
            format!(
                "SHA inode {}: ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
                inumber
            )
        );
        assert_eq!(
            sha_line(&fs, "/a").unwrap(),
            format!("SHA inode {}: no SHA for directories.", dir)
        );
        assert!(matches!(
            sha_line(&fs, "/nope"),
            Err(ShellError::Fs(FileSystemError::InodeOutOfRange))
        ));
    }

    #[test]
    fn commands_need_a_mounted_fs() {
        let mut fs = None;
        for cmd in [
            Command::Lsall,
            Command::Psb,
            Command::Cat("/a".to_string()),
            Command::Sha("/a".to_string()),
            Command::Mkdir("/a".to_string()),
            Command::Umount,
        ] {
            assert!(matches!(
                execute_command(&cmd, &mut fs),
                Err(ShellError::NotMounted)
            ));
        }
    }

    #[test]
    fn error_messages() {
        assert_eq!(ShellError::WrongArguments.to_string(), "wrong number of arguments");
        assert_eq!(
            ShellError::NotMounted.to_string(),
            "mount the FS before the operation"
        );
        assert_eq!(
            ShellError::from(FileSystemError::InvalidDirectoryInode).to_string(),
            "Invalid directory inode"
        );
    }
}
