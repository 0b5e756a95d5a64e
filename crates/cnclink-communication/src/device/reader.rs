//! Reader thread
//!
//! Drains the transport while the session lasts. Each iteration takes the
//! transport lock for one bounded read and for processing the line it
//! returned, so events enter the queue in wire order. The lock is released
//! fairly so a waiting correlator gets its window promptly.

use parking_lot::MutexGuard;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::link::LinkInner;

/// Name given to the reader thread
pub(crate) const READER_THREAD_NAME: &str = "cnclink-reader";

pub(crate) fn spawn(inner: Arc<LinkInner>, session: u64) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(READER_THREAD_NAME.to_string())
        .spawn(move || run(&inner, session))
}

fn run(inner: &LinkInner, session: u64) {
    let timeout = inner.config.read_timeout;
    let mut lines: u64 = 0;
    tracing::debug!("Reader started (session {})", session);

    while inner.is_session(session) {
        let mut guard = inner.transport.lock();
        let Some(open) = guard
            .as_mut()
            .filter(|open| open.session == session && inner.is_session(session))
        else {
            break;
        };

        match open.transport.read_line(timeout) {
            Ok(Some(line)) => {
                lines += 1;
                inner.process_line(&line);
            }
            Ok(None) => {}
            Err(e) => {
                drop(guard);
                inner.fail_session(session, &e);
                break;
            }
        }

        MutexGuard::unlock_fair(guard);
    }

    tracing::debug!("Reader stopped (session {}), {} lines read", session, lines);
}
