use crate::shell::command::{Command, ShellError};

/// 命令名、参数说明和帮助文字，`help` 与补全都从这里取
pub const COMMANDS: &[(&str, &str, &str)] = &[
    ("help", "", "display this help."),
    ("exit", "", "exit shell."),
    ("quit", "", "exit shell."),
    ("mkfs", "<diskname> <#inodes> <#blocks>", "create a new filesystem."),
    ("mount", "<diskname>", "mount the provided filesystem."),
    ("umount", "", "unmount the current filesystem."),
    ("mkdir", "<dirname>", "create a new directory."),
    ("lsall", "", "list all directories and files contained in the currently mounted filesystem."),
    ("add", "<src-fullpath> <dst>", "add a new file."),
    ("cat", "<pathname>", "display the content of a file."),
    ("istat", "<inode_nr>", "display information about the provided inode."),
    ("inode", "<pathname>", "display the inode number of a file."),
    ("sha", "<pathname>", "display the SHA of a file."),
    ("psb", "", "print SuperBlock of the currently mounted filesystem."),
    ("scan", "", "list every allocated inode."),
    ("bm", "", "print the inode and sector bitmaps."),
];

fn expect_args<'a>(args: &[&'a str], count: usize) -> Result<Vec<&'a str>, ShellError> {
    if args.len() != count {
        return Err(ShellError::WrongArguments);
    }
    Ok(args.to_vec())
}

fn parse_number(arg: &str) -> Result<u16, ShellError> {
    arg.parse()
        .map_err(|_| ShellError::InvalidNumber(arg.to_string()))
}

pub fn parse_command(input: &str) -> Result<Command, ShellError> {
    let tokens: Vec<&str> = input.trim().split_ascii_whitespace().collect();
    let (&cmd, args) = tokens.split_first().ok_or(ShellError::InvalidCommand)?;

    let command = match cmd {
        "help" => {
            expect_args(args, 0)?;
            Command::Help
        }
        "exit" | "quit" => {
            expect_args(args, 0)?;
            Command::Exit
        }
        "mkfs" => {
            let args = expect_args(args, 3)?;
            Command::Mkfs {
                disk: args[0].to_string(),
                inodes: parse_number(args[1])?,
                blocks: parse_number(args[2])?,
            }
        }
        "mount" => Command::Mount(expect_args(args, 1)?[0].to_string()),
        "umount" => {
            expect_args(args, 0)?;
            Command::Umount
        }
        "mkdir" => Command::Mkdir(expect_args(args, 1)?[0].to_string()),
        "lsall" => {
            expect_args(args, 0)?;
            Command::Lsall
        }
        "add" => {
            let args = expect_args(args, 2)?;
            Command::Add {
                src: args[0].to_string(),
                dst: args[1].to_string(),
            }
        }
        "cat" => Command::Cat(expect_args(args, 1)?[0].to_string()),
        "istat" => Command::Istat(parse_number(expect_args(args, 1)?[0])?),
        "inode" => Command::Inode(expect_args(args, 1)?[0].to_string()),
        "sha" => Command::Sha(expect_args(args, 1)?[0].to_string()),
        "psb" => {
            expect_args(args, 0)?;
            Command::Psb
        }
        "scan" => {
            expect_args(args, 0)?;
            Command::Scan
        }
        "bm" => {
            expect_args(args, 0)?;
            Command::Bm
        }
        _ => return Err(ShellError::InvalidCommand),
    };
    Ok(command)
}
