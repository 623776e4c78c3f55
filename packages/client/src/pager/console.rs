//! Expect-style driver for the telephony console.
//!
//! The console is a line-oriented child process (pjsua). We write commands
//! to its stdin and scan its stdout for substrings, the way an operator
//! would watch the terminal.

use std::{process::Stdio, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    process::{Child, Command},
    time::{Instant, timeout_at},
};

use crate::error::ConsoleError;

const READ_CHUNK: usize = 1024;
/// Output kept for matching; older text is discarded.
const MAX_BUFFER: usize = 16 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectOutcome {
    /// Index of the pattern that matched first in the output
    Matched(usize),
    Eof,
    Timeout,
}

pub struct ExpectSession {
    reader: Box<dyn AsyncRead + Unpin + Send>,
    writer: Box<dyn AsyncWrite + Unpin + Send>,
    child: Option<Child>,
    buffer: String,
    /// Bytes of a character split across reads
    partial: Vec<u8>,
    eof: bool,
}

impl ExpectSession {
    pub fn new(
        reader: impl AsyncRead + Unpin + Send + 'static,
        writer: impl AsyncWrite + Unpin + Send + 'static,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            child: None,
            buffer: String::new(),
            partial: Vec::new(),
            eof: false,
        }
    }

    /// Start `program` with piped stdin and stdout.
    pub fn spawn(program: &str, args: &[&str]) -> Result<Self, ConsoleError> {
        let spawn_error = |source| ConsoleError::Spawn {
            program: program.to_string(),
            source,
        };
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        let (Some(stdout), Some(stdin)) = (child.stdout.take(), child.stdin.take()) else {
            return Err(spawn_error(std::io::Error::other("missing stdio pipe")));
        };
        let mut session = Self::new(stdout, stdin);
        session.child = Some(child);
        Ok(session)
    }

    pub async fn send_line(&mut self, line: &str) -> Result<(), ConsoleError> {
        tracing::debug!(worker = "pager", "console <- {}", line);
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Wait until one of `patterns` shows up in the output.
    ///
    /// When several patterns are present the one that appears earliest wins;
    /// output up to the end of the match is consumed.
    pub async fn expect(
        &mut self,
        patterns: &[&str],
        wait: Duration,
    ) -> Result<ExpectOutcome, ConsoleError> {
        let deadline = Instant::now() + wait;
        loop {
            if let Some((index, end)) = self.find(patterns) {
                self.buffer.drain(..end);
                return Ok(ExpectOutcome::Matched(index));
            }
            if self.eof {
                return Ok(ExpectOutcome::Eof);
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = match timeout_at(deadline, self.reader.read(&mut chunk)).await {
                Ok(read) => read?,
                Err(_) => return Ok(ExpectOutcome::Timeout),
            };
            if n == 0 {
                self.eof = true;
                let rest = String::from_utf8_lossy(&self.partial).into_owned();
                self.partial.clear();
                self.buffer.push_str(&rest);
                continue;
            }
            self.partial.extend_from_slice(&chunk[..n]);
            let complete = self.partial.len() - incomplete_tail(&self.partial);
            let text = String::from_utf8_lossy(&self.partial[..complete]).into_owned();
            self.partial.drain(..complete);
            for line in text.lines().filter(|line| !line.trim().is_empty()) {
                tracing::trace!(worker = "pager", "console -> {}", line);
            }
            self.buffer.push_str(&text);
            if self.buffer.len() > MAX_BUFFER {
                let mut cut = self.buffer.len() - MAX_BUFFER;
                while !self.buffer.is_char_boundary(cut) {
                    cut += 1;
                }
                self.buffer.drain(..cut);
            }
        }
    }

    /// Like [`expect`](Self::expect) with a single pattern that must appear.
    pub async fn expect_one(&mut self, pattern: &str, wait: Duration) -> Result<(), ConsoleError> {
        match self.expect(&[pattern], wait).await? {
            ExpectOutcome::Matched(_) => Ok(()),
            ExpectOutcome::Eof => Err(ConsoleError::Exited),
            ExpectOutcome::Timeout => Err(ConsoleError::Unresponsive {
                pattern: pattern.to_string(),
            }),
        }
    }

    /// Kill the child process, if any.
    pub async fn terminate(&mut self) {
        if let Some(mut child) = self.child.take()
            && let Err(e) = child.kill().await
        {
            tracing::warn!(worker = "pager", "Failed to kill console: {}", e);
        }
    }

    fn find(&self, patterns: &[&str]) -> Option<(usize, usize)> {
        patterns
            .iter()
            .enumerate()
            .filter_map(|(index, pattern)| {
                self.buffer
                    .find(pattern)
                    .map(|start| (start, index, start + pattern.len()))
            })
            .min()
            .map(|(_, index, end)| (index, end))
    }
}

/// Length of a multi-byte character cut off at the end of `bytes`.
fn incomplete_tail(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let byte = bytes[bytes.len() - back];
        if byte & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        let width = match byte {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if width > back { back } else { 0 };
    }
    0
}

/// Starts a fresh console for each registration attempt.
pub trait ConsoleLauncher: Send + Sync {
    fn launch(&mut self) -> Result<ExpectSession, ConsoleError>;
}

/// Runs `<bin> --config-file <file>`.
#[derive(Debug, Clone)]
pub struct PjsuaLauncher {
    pub bin: String,
    pub config_file: String,
}

impl ConsoleLauncher for PjsuaLauncher {
    fn launch(&mut self) -> Result<ExpectSession, ConsoleError> {
        tracing::info!(
            worker = "pager",
            "Executing {} --config-file {}",
            self.bin,
            self.config_file
        );
        ExpectSession::spawn(&self.bin, &["--config-file", &self.config_file])
    }
}
