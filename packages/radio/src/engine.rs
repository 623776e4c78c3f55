//! Request/response driver over a line-oriented byte stream.
//!
//! At most one command is in flight. While waiting for its response the
//! engine keeps reading: `+RCV=` lines go to the handler and the first other
//! non-empty line is the response. Between commands the engine polls the
//! stream with a bounded wait and calls [`LineHandler::manage_state`] on every
//! pass, so handlers can run timers or pull work from channels.

use std::time::Duration;

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    time::{Instant, timeout, timeout_at},
};

use crate::{
    codec::{LineFramer, ReceivedMessage},
    command::{AtCommand, CommandQueue},
    error::ProtocolError,
};

/// Idle wait between passes when nothing is queued.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Time a command gets to be answered.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

const READ_CHUNK: usize = 256;

/// Application behaviour plugged into the engine.
pub trait LineHandler: Send {
    /// Called for every `+RCV=` line, whatever the command state.
    fn handle_message(
        &mut self,
        message: &ReceivedMessage,
        commands: &mut CommandQueue,
    ) -> Result<(), ProtocolError>;

    /// Called once per engine pass.
    fn manage_state(&mut self, _commands: &mut CommandQueue) -> Result<(), ProtocolError> {
        Ok(())
    }
}

pub struct LineProtocolEngine<T, H> {
    io: T,
    handler: H,
    framer: LineFramer,
    commands: CommandQueue,
    poll_interval: Duration,
    response_timeout: Duration,
}

impl<T, H> LineProtocolEngine<T, H>
where
    T: AsyncRead + AsyncWrite + Unpin + Send,
    H: LineHandler,
{
    pub fn new(io: T, handler: H) -> Self {
        Self {
            io,
            handler,
            framer: LineFramer::new(),
            commands: CommandQueue::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    /// Queue commands to run before anything the handler adds.
    pub fn with_commands(mut self, commands: impl IntoIterator<Item = AtCommand>) -> Self {
        self.commands.extend(commands);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_response_timeout(mut self, response_timeout: Duration) -> Self {
        self.response_timeout = response_timeout;
        self
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn queued(&self) -> usize {
        self.commands.len()
    }

    /// Run until the first protocol or I/O failure.
    pub async fn run(&mut self) -> Result<(), ProtocolError> {
        loop {
            self.run_once().await?;
        }
    }

    /// One pass: let the handler update its state, then either run the next
    /// queued command to completion or wait briefly for input.
    pub async fn run_once(&mut self) -> Result<(), ProtocolError> {
        self.handler.manage_state(&mut self.commands)?;

        if let Some(command) = self.commands.pop() {
            let response = self.send_command(&command).await?;
            tracing::debug!("{} -> {}", command.text, response);
            return Ok(());
        }

        self.dispatch_buffered()?;
        match timeout(self.poll_interval, self.read_chunk()).await {
            Ok(read) => read?,
            Err(_) => return Ok(()),
        }
        self.dispatch_buffered()
    }

    /// Write `command` and wait for its response line.
    pub async fn send_command(&mut self, command: &AtCommand) -> Result<String, ProtocolError> {
        tracing::debug!("radio <- {}", command.text);
        self.io.write_all(&command.encode()).await?;
        self.io.flush().await?;

        let deadline = Instant::now() + self.response_timeout;
        loop {
            while let Some(line) = self.framer.next_line() {
                tracing::debug!("radio -> {}", line);
                if self.dispatch_unsolicited(&line)? || line.is_empty() {
                    continue;
                }
                return command.check_response(line);
            }

            match timeout_at(deadline, self.read_chunk()).await {
                Ok(read) => read?,
                Err(_) => {
                    return Err(ProtocolError::ResponseTimeout {
                        command: command.text.clone(),
                        timeout: self.response_timeout,
                    });
                }
            }
        }
    }

    async fn read_chunk(&mut self) -> Result<(), ProtocolError> {
        let mut buf = [0u8; READ_CHUNK];
        let n = self.io.read(&mut buf).await?;
        if n == 0 {
            return Err(ProtocolError::Closed);
        }
        self.framer.push_bytes(&buf[..n]);
        Ok(())
    }

    fn dispatch_buffered(&mut self) -> Result<(), ProtocolError> {
        while let Some(line) = self.framer.next_line() {
            tracing::debug!("radio -> {}", line);
            if !self.dispatch_unsolicited(&line)? && !line.is_empty() {
                tracing::debug!("Ignoring line with no command in flight: {}", line);
            }
        }
        Ok(())
    }

    /// Returns `true` when `line` was a receive notification.
    fn dispatch_unsolicited(&mut self, line: &str) -> Result<bool, ProtocolError> {
        match ReceivedMessage::parse(line) {
            Ok(Some(message)) => {
                self.handler.handle_message(&message, &mut self.commands)?;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => {
                // garbled over-the-air frames are dropped
                tracing::warn!("{}", e);
                Ok(true)
            }
        }
    }
}
