pub mod command;
pub mod logger;
pub mod parse;

use std::{
    io::{self, stdout},
    path::PathBuf,
};

use colored::*;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use log::warn;
use reedline::{
    DefaultCompleter, DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal,
};
use v6fs::fs::FileSystem;

use crate::shell::{
    command::{execute_command, unmount, Command},
    parse::{parse_command, COMMANDS},
};

const HISTORY_FILE: &str = ".v6fs_history";
const HISTORY_SIZE: usize = 100;

pub fn start_shell() {
    if let Err(e) = banner() {
        warn!("cannot clear the terminal: {}", e);
    }

    let username = whoami::username();
    let hostname = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());

    println!(
        "{}",
        "Type 'help' for available commands. Use ↑↓ for history, Tab for auto-completion.\n"
            .bright_black()
    );

    // 初始化 reedline
    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(HISTORY_FILE);
    let mut line_editor = Reedline::create();
    match FileBackedHistory::with_file(HISTORY_SIZE, history_path) {
        Ok(history) => line_editor = line_editor.with_history(Box::new(history)),
        Err(e) => warn!("history disabled: {}", e),
    }

    // 命令补全
    let words: Vec<String> = COMMANDS.iter().map(|(name, _, _)| name.to_string()).collect();
    let completer = DefaultCompleter::new_with_wordlen(words, 2);
    line_editor = line_editor.with_completer(Box::new(completer));

    let mut fs: Option<FileSystem> = None;

    loop {
        let status = if fs.is_some() { "mounted" } else { "no fs" };
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic(format!("{}@{}", username, hostname)),
            DefaultPromptSegment::Basic(format!("v6fs [{}]", status)),
        );

        match line_editor.read_line(&prompt) {
            Ok(Signal::Success(buffer)) => {
                let trimmed = buffer.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_command(trimmed) {
                    Ok(cmd) => {
                        if let Err(e) = execute_command(&cmd, &mut fs) {
                            println!("{} {}", "ERROR:".red().bold(), e);
                        }
                        if matches!(cmd, Command::Exit) {
                            break;
                        }
                    }
                    Err(e) => println!("{} {}", "ERROR SHELL:".yellow().bold(), e),
                }
            }
            Ok(Signal::CtrlC) => {
                println!();
                continue;
            }
            Ok(Signal::CtrlD) => break,
            #[allow(unreachable_patterns)]
            Ok(_) => continue,
            Err(e) => {
                println!("Error reading line: {}", e);
                break;
            }
        }
    }

    if let Err(e) = unmount(&mut fs) {
        println!("{} {}", "ERROR:".red().bold(), e);
    }
    println!("{}", "Bye!".bright_yellow());
}

fn banner() -> io::Result<()> {
    execute!(
        stdout(),
        Clear(ClearType::All),
        cursor::MoveTo(0, 0),
        SetForegroundColor(Color::Cyan),
        Print(format!("UNIX v6 filesystem shell v{}\n", env!("CARGO_PKG_VERSION"))),
        ResetColor
    )
}
