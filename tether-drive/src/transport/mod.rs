//! Transport layer for I/O abstraction

use crate::error::Result;

mod mock;
mod serial;
pub use mock::{MockTransport, TransportEvent};
pub use serial::SerialTransport;

/// Transport trait for robot communication
pub trait Transport: Send {
    /// Read data into buffer, returns number of bytes read (0 on read timeout)
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize>;

    /// Write data from buffer, returns number of bytes written
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Flush any pending writes (blocking until complete)
    fn flush(&mut self) -> Result<()>;

    /// Drop any unread input so the next read starts on a fresh response
    fn discard_input(&mut self) -> Result<()> {
        Ok(())
    }
}
