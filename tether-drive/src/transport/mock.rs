//! Mock transport for testing
//!
//! Records every write and read as a [`TransportEvent`] and answers requests
//! from canned rules, so tests can check exactly what reached the "wire".

use super::Transport;
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// One observed transport operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Bytes accepted by a single `write` call
    Write(Vec<u8>),
    /// Bytes returned by a single non-empty `read` call
    Read(Vec<u8>),
}

/// Mock transport for unit and integration testing
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

struct MockTransportInner {
    read_buffer: VecDeque<u8>,
    written: Vec<u8>,
    /// Index into `written` where the next request match starts
    matched_upto: usize,
    events: Vec<TransportEvent>,
    rules: Vec<(Vec<u8>, Vec<u8>)>,
    max_write_chunk: Option<usize>,
    write_delay: Duration,
    fail_writes: Option<io::ErrorKind>,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(MockTransportInner {
                read_buffer: VecDeque::new(),
                written: Vec::new(),
                matched_upto: 0,
                events: Vec::new(),
                rules: Vec::new(),
                max_write_chunk: None,
                write_delay: Duration::ZERO,
                fail_writes: None,
            })),
        }
    }

    /// Queue `response` every time the written stream ends with `request`
    pub fn respond_to(&self, request: &[u8], response: &[u8]) {
        let mut inner = self.inner.lock();
        inner.rules.retain(|(req, _)| req.as_slice() != request);
        inner.rules.push((request.to_vec(), response.to_vec()));
    }

    /// Accept at most `chunk` bytes per `write` call
    pub fn set_max_write_chunk(&self, chunk: usize) {
        self.inner.lock().max_write_chunk = Some(chunk.max(1));
    }

    /// Sleep this long inside every `write` call
    pub fn set_write_delay(&self, delay: Duration) {
        self.inner.lock().write_delay = delay;
    }

    /// Make every subsequent `write` fail with `kind` (`None` to recover)
    pub fn set_write_failure(&self, kind: Option<io::ErrorKind>) {
        self.inner.lock().fail_writes = kind;
    }

    /// Inject data to be read
    pub fn inject_read(&self, data: &[u8]) {
        self.inner.lock().read_buffer.extend(data);
    }

    /// Get all written data
    pub fn get_written(&self) -> Vec<u8> {
        self.inner.lock().written.clone()
    }

    /// Get the ordered event log
    pub fn events(&self) -> Vec<TransportEvent> {
        self.inner.lock().events.clone()
    }

    /// Clear written data and the event log
    pub fn clear_written(&self) {
        let mut inner = self.inner.lock();
        inner.written.clear();
        inner.matched_upto = 0;
        inner.events.clear();
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        let available = inner.read_buffer.len().min(buffer.len());
        if available == 0 {
            return Ok(0);
        }

        for (slot, byte) in buffer.iter_mut().zip(inner.read_buffer.drain(..available)) {
            *slot = byte;
        }
        inner
            .events
            .push(TransportEvent::Read(buffer[..available].to_vec()));

        Ok(available)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let (delay, chunk, failure) = {
            let inner = self.inner.lock();
            (inner.write_delay, inner.max_write_chunk, inner.fail_writes)
        };
        if let Some(kind) = failure {
            return Err(io::Error::new(kind, "mock write failure").into());
        }
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let len = chunk.map_or(data.len(), |c| c.min(data.len()));
        let accepted = &data[..len];

        let mut inner = self.inner.lock();
        inner.written.extend_from_slice(accepted);
        inner.events.push(TransportEvent::Write(accepted.to_vec()));

        let start = inner.matched_upto;
        let response = inner
            .rules
            .iter()
            .find(|(request, _)| inner.written[start..].ends_with(request))
            .map(|(_, response)| response.clone());
        if let Some(response) = response {
            inner.read_buffer.extend(response);
            inner.matched_upto = inner.written.len();
        }

        Ok(len)
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn discard_input(&mut self) -> Result<()> {
        self.inner.lock().read_buffer.clear();
        Ok(())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}
