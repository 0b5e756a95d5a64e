//! Command correlator
//!
//! The protocol carries no request ids, so a command's response is whatever
//! the device sends during a fixed window after the write. Unsolicited lines
//! in that window (status frames, alarms) are captured as part of the
//! response. Callers rely on getting every line, so the window is not
//! narrowed.

use std::time::{Duration, Instant};

use cnclink_core::{Error, LinkEvent, Result};

use super::link::{DeviceLink, LinkInner};
use crate::communication::LINE_TERMINATOR;
use crate::firmware::grbl::RealtimeCommand;

impl LinkInner {
    /// Write `command` and capture lines for `window` while holding the
    /// transport, so the reader cannot take any of them.
    ///
    /// A transport whose session has already been ended by a disconnect is
    /// treated as absent: a command that queued for the lock before the
    /// disconnect is never written.
    pub(crate) fn send_command(&self, command: &str, window: Duration) -> Result<Vec<String>> {
        let requested = self.current_session();
        let mut guard = self.transport.lock();
        let Some(open) = guard
            .as_mut()
            .filter(|open| open.session == requested && self.is_session(requested))
        else {
            return Err(Error::NotConnected);
        };
        let session = open.session;
        let transport = &mut open.transport;

        let mut frame = Vec::with_capacity(command.len() + LINE_TERMINATOR.len());
        frame.extend_from_slice(command.as_bytes());
        frame.extend_from_slice(LINE_TERMINATOR);

        if let Err(e) = transport.write(&frame) {
            drop(guard);
            self.fail_session(session, &e);
            return Err(e.into());
        }
        tracing::debug!(">> {}", command.escape_debug());
        self.queue.push(LinkEvent::command_sent(command));

        let deadline = Instant::now() + window;
        let mut responses = Vec::new();

        while self.is_session(session) {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            match transport.read_line(remaining.min(self.config.read_timeout)) {
                Ok(Some(line)) => {
                    self.process_line(&line);
                    responses.push(line);
                }
                Ok(None) => {}
                Err(e) => {
                    drop(guard);
                    self.fail_session(session, &e);
                    return Err(e.into());
                }
            }
        }

        tracing::trace!("{} lines captured for {}", responses.len(), command.escape_debug());
        Ok(responses)
    }
}

impl DeviceLink {
    /// Send a command and return every line received during `window`.
    ///
    /// Fails with `NotConnected`, without touching the transport, when no
    /// session is open. A transport failure ends the session. Blocks the
    /// calling thread for the whole window.
    pub fn send_command(&self, command: &str, window: Duration) -> Result<Vec<String>> {
        self.inner.send_command(command, window)
    }

    /// [`send_command`](Self::send_command) with the configured default window
    pub fn send(&self, command: &str) -> Result<Vec<String>> {
        self.send_command(command, self.inner.config.command_window)
    }

    /// Run [`send_command`](Self::send_command) on tokio's blocking pool
    pub async fn send_command_async(
        &self,
        command: impl Into<String>,
        window: Duration,
    ) -> Result<Vec<String>> {
        let link = self.clone();
        let command = command.into();
        tokio::task::spawn_blocking(move || link.send_command(&command, window))
            .await
            .map_err(|e| Error::other(format!("Command task failed: {}", e)))?
    }

    /// Send a realtime control byte
    pub fn send_realtime(&self, command: RealtimeCommand, window: Duration) -> Result<Vec<String>> {
        tracing::info!("Sending realtime {}", command);
        self.send_command(&command.as_command(), window)
    }

    /// Feed hold, cycle start, then soft reset, each with its own window.
    ///
    /// Stops at the first failure. Returns the lines captured across all three.
    pub fn emergency_stop(&self, window: Duration) -> Result<Vec<String>> {
        tracing::warn!("Emergency stop requested");
        let mut responses = Vec::new();
        for command in RealtimeCommand::emergency_stop_sequence() {
            responses.extend(self.send_realtime(command, window)?);
        }
        Ok(responses)
    }
}
