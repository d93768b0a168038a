//! Mock USB channel for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::traits::{TransportError, UsbChannel};

/// Mock channel for unit testing transport and session logic.
///
/// Cloning shares the underlying queues, so a test can keep a handle
/// after moving a clone into the transport.
#[derive(Clone)]
pub struct MockChannel {
    /// Queued buffers returned by bulk reads.
    bulk_queue: Arc<Mutex<VecDeque<Vec<u8>>>>,
    /// Queued buffers returned by interrupt reads.
    event_queue: Arc<Mutex<VecDeque<Vec<u8>>>>,
    /// Captured bulk writes.
    write_log: Arc<Mutex<Vec<Vec<u8>>>>,
    /// Bulk reads attempted (including failures).
    reads_attempted: Arc<Mutex<usize>>,
    /// When true, bulk writes fail.
    fail_writes: Arc<Mutex<bool>>,
    /// Whether device is "connected".
    connected: Arc<Mutex<bool>>,
    vid: u16,
    pid: u16,
}

impl MockChannel {
    pub fn new() -> Self {
        Self {
            bulk_queue: Arc::new(Mutex::new(VecDeque::new())),
            event_queue: Arc::new(Mutex::new(VecDeque::new())),
            write_log: Arc::new(Mutex::new(Vec::new())),
            reads_attempted: Arc::new(Mutex::new(0)),
            fail_writes: Arc::new(Mutex::new(false)),
            connected: Arc::new(Mutex::new(true)),
            vid: 0x04A9, // Canon
            pid: 0x3199,
        }
    }

    /// Queue a buffer to be returned on the next bulk read.
    pub fn queue_bulk(&self, bytes: Vec<u8>) {
        self.bulk_queue.lock().unwrap().push_back(bytes);
    }

    /// Queue a buffer to be returned on the next interrupt read.
    pub fn queue_event(&self, bytes: Vec<u8>) {
        self.event_queue.lock().unwrap().push_back(bytes);
    }

    /// Get all captured writes.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.write_log.lock().unwrap().clone()
    }

    /// Clear captured writes.
    pub fn clear_writes(&self) {
        self.write_log.lock().unwrap().clear();
    }

    /// Number of bulk reads attempted so far.
    pub fn reads_attempted(&self) -> usize {
        *self.reads_attempted.lock().unwrap()
    }

    /// Make subsequent bulk writes fail.
    pub fn fail_writes(&self) {
        *self.fail_writes.lock().unwrap() = true;
    }

    /// Simulate device disconnect.
    pub fn disconnect(&self) {
        *self.connected.lock().unwrap() = false;
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl UsbChannel for MockChannel {
    fn bulk_write(&self, data: &[u8]) -> Result<usize, TransportError> {
        if !*self.connected.lock().unwrap() {
            return Err(TransportError::Disconnected);
        }
        // Writes are logged even when failing, so tests can verify the
        // encoded buffer of a failed send.
        self.write_log.lock().unwrap().push(data.to_vec());
        if *self.fail_writes.lock().unwrap() {
            return Err(TransportError::WriteFailed("mock write failure".into()));
        }
        Ok(data.len())
    }

    fn bulk_read(&self, _max_len: usize) -> Result<Vec<u8>, TransportError> {
        *self.reads_attempted.lock().unwrap() += 1;
        if !*self.connected.lock().unwrap() {
            return Err(TransportError::Disconnected);
        }
        self.bulk_queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::ReadFailed("mock bulk queue empty".into()))
    }

    fn interrupt_read(&self, _max_len: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        if !*self.connected.lock().unwrap() {
            return Err(TransportError::Disconnected);
        }
        self.event_queue
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(TransportError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            })
    }

    fn vendor_id(&self) -> u16 {
        self.vid
    }

    fn product_id(&self) -> u16 {
        self.pid
    }
}
