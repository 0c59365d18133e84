//! Scripted in-memory transport for tests.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::transport::config::SerialConfig;

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub open: bool,
    pub fail_open: bool,
    pub short_write: Option<usize>,
    pub incoming: VecDeque<Vec<u8>>,
    pub written: Vec<Vec<u8>>,
    pub opens: usize,
    pub closes: usize,
    pub reads: usize,
    pub read_timeouts: Vec<Duration>,
    pub flushes: usize,
}

/// Transport whose state is shared with the test that created it.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    /// Queues one chunk the device will deliver on a later read.
    pub fn respond(&self, chunk: &[u8]) {
        self.state().incoming.push_back(chunk.to_vec());
    }

    /// Returns the number of transport calls made so far.
    pub fn calls(&self) -> usize {
        let state = self.state();
        state.opens + state.closes + state.reads + state.flushes + state.written.len()
    }
}

impl Transport for MockTransport {
    fn open(&mut self, config: &SerialConfig) -> Result<()> {
        let mut state = self.state();
        state.opens += 1;
        if state.fail_open {
            return Err(Error::PortNotFound {
                port: config.port.clone(),
            });
        }
        state.open = true;
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state();
        state.closes += 1;
        state.open = false;
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut state = self.state();
        let accepted = state.short_write.unwrap_or(data.len()).min(data.len());
        state.written.push(data.to_vec());
        Ok(accepted)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let chunk = {
            let mut state = self.state();
            state.reads += 1;
            state.read_timeouts.push(timeout);
            state.incoming.pop_front()
        };

        let Some(mut chunk) = chunk else {
            std::thread::sleep(timeout);
            return Ok(0);
        };

        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.state().incoming.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state().flushes += 1;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }
}
