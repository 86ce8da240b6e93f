use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use services::{Notice, Shell};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use ui::vm::{NoticeTone, NoticeVm};

/// Shell for an interactive terminal session.
#[derive(Debug, Default)]
pub struct TerminalShell {
    leave_guard: AtomicBool,
}

impl TerminalShell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leave_guard_armed(&self) -> bool {
        self.leave_guard.load(Ordering::Relaxed)
    }
}

impl Shell for TerminalShell {
    fn notify(&self, notice: Notice) {
        let vm = NoticeVm::from(&notice);
        let marker = match vm.tone {
            NoticeTone::Info => "i",
            NoticeTone::Success => "+",
            NoticeTone::Warning => "!",
            NoticeTone::Error => "x",
        };
        println!("[{marker}] {}", vm.text);
    }

    fn set_leave_guard(&self, armed: bool) {
        self.leave_guard.store(armed, Ordering::Relaxed);
    }
}

/// Line-oriented stdin.
pub struct Input {
    lines: Lines<BufReader<Stdin>>,
}

impl Input {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Print `label` and wait for one line. `None` at end of input.
    pub async fn read(&mut self, label: &str) -> io::Result<Option<String>> {
        print!("{label}");
        io::stdout().flush()?;
        self.next_line().await
    }

    /// Cancel safe, so it can sit in a `select!` next to a timer.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.lines.next_line().await?.map(|line| line.trim().to_owned()))
    }

    pub async fn confirm(&mut self, question: &str) -> io::Result<bool> {
        let answer = self.read(&format!("{question} [y/N] ")).await?;
        Ok(matches!(
            answer.as_deref().map(str::to_ascii_lowercase).as_deref(),
            Some("y" | "yes")
        ))
    }
}
