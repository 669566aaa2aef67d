//! Exclusive command channel to the robot
//!
//! Every operation takes the same channel lock, so the bytes of one command
//! (or one query request plus its response) are contiguous on the wire no
//! matter which thread issued it.

use crate::error::{Error, Result};
use crate::protocol::opcodes::SENSOR_PACKET_LEN;
use crate::protocol::{OiCommand, SensorPacket};
use crate::transport::Transport;
use parking_lot::Mutex;
use std::io;
use std::thread;
use std::time::{Duration, Instant};

/// Pause between empty reads while waiting for a response
const READ_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Serialized channel over a transport
pub struct Connection {
    /// `None` once closed
    link: Mutex<Option<Box<dyn Transport>>>,
    response_timeout: Duration,
}

impl Connection {
    pub fn new(transport: Box<dyn Transport>, response_timeout: Duration) -> Self {
        Self {
            link: Mutex::new(Some(transport)),
            response_timeout,
        }
    }

    pub fn is_open(&self) -> bool {
        self.link.lock().is_some()
    }

    /// Write one command frame
    pub fn send(&self, command: &OiCommand) -> Result<()> {
        let mut link = self.link.lock();
        let transport = link.as_mut().ok_or(Error::NotConnected)?;

        log::trace!("send {:?}", command);
        write_all(transport.as_mut(), &command.encode())?;
        transport.flush()
    }

    /// Write several frames back to back under one lock acquisition
    pub fn send_all(&self, commands: &[OiCommand]) -> Result<()> {
        let mut link = self.link.lock();
        let transport = link.as_mut().ok_or(Error::NotConnected)?;

        let frame: Vec<u8> = commands.iter().flat_map(OiCommand::encode).collect();
        log::trace!("send {} commands ({} bytes)", commands.len(), frame.len());
        write_all(transport.as_mut(), &frame)?;
        transport.flush()
    }

    /// Request and decode the full sensor packet
    ///
    /// Blocks until 80 bytes arrive or the response timeout elapses. No bytes
    /// at all is a `Timeout`; a partial response is a `Decode` error.
    pub fn query(&self) -> Result<SensorPacket> {
        let mut link = self.link.lock();
        let transport = link.as_mut().ok_or(Error::NotConnected)?;

        // Drop anything left over from an earlier timed-out query
        transport.discard_input()?;
        write_all(transport.as_mut(), &OiCommand::all_sensors().encode())?;
        transport.flush()?;

        let mut response = [0u8; SENSOR_PACKET_LEN];
        let mut received = 0;
        let started = Instant::now();
        let deadline = started + self.response_timeout;

        while received < SENSOR_PACKET_LEN {
            let n = transport.read(&mut response[received..])?;
            received += n;
            if n == 0 {
                if Instant::now() >= deadline {
                    break;
                }
                thread::sleep(READ_POLL_INTERVAL);
            }
        }
        drop(link);

        match received {
            SENSOR_PACKET_LEN => SensorPacket::decode(&response),
            0 => Err(Error::Timeout {
                waited: started.elapsed(),
            }),
            partial => Err(Error::Decode(format!(
                "short sensor response: {} of {} bytes",
                partial, SENSOR_PACKET_LEN
            ))),
        }
    }

    /// Release the transport; later operations fail with `NotConnected`
    pub fn close(&self) {
        if self.link.lock().take().is_some() {
            log::info!("Connection closed");
        }
    }
}

fn write_all(transport: &mut dyn Transport, mut data: &[u8]) -> Result<()> {
    while !data.is_empty() {
        let n = transport.write(data)?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "transport accepted no bytes").into());
        }
        data = &data[n..];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockTransport, TransportEvent};

    fn open(mock: &MockTransport) -> Connection {
        Connection::new(Box::new(mock.clone()), Duration::from_millis(50))
    }

    #[test]
    fn test_send_writes_whole_frame_in_chunks() {
        let mock = MockTransport::new();
        mock.set_max_write_chunk(2);
        let conn = open(&mock);

        conn.send(&OiCommand::DriveDirect {
            right: 350,
            left: 50,
        })
        .unwrap();

        assert_eq!(mock.get_written(), vec![145, 0x01, 0x5E, 0x00, 0x32]);
        assert_eq!(mock.events().len(), 3);
    }

    #[test]
    fn test_query_decodes_response() {
        let mock = MockTransport::new();
        let mut response = [0u8; SENSOR_PACKET_LEN];
        response[17..19].copy_from_slice(&14_000u16.to_be_bytes());
        mock.respond_to(&[142, 100], &response);
        let conn = open(&mock);

        let packet = conn.query().unwrap();
        assert_eq!(packet.voltage, 14_000);
        assert_eq!(mock.get_written(), vec![142, 100]);
    }

    #[test]
    fn test_query_timeout_without_response() {
        let mock = MockTransport::new();
        let conn = open(&mock);

        let err = conn.query().unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }

    #[test]
    fn test_query_partial_response_is_decode_error() {
        let mock = MockTransport::new();
        mock.respond_to(&[142, 100], &[0u8; 30]);
        let conn = open(&mock);

        let err = conn.query().unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_query_discards_stale_bytes() {
        let mock = MockTransport::new();
        mock.inject_read(&[0xAA; 12]);
        let mut response = [0u8; SENSOR_PACKET_LEN];
        response[40] = 3;
        mock.respond_to(&[142, 100], &response);
        let conn = open(&mock);

        let packet = conn.query().unwrap();
        assert_eq!(packet.oi_mode, crate::protocol::OiMode::Full);
    }

    #[test]
    fn test_closed_connection_rejects_without_io() {
        let mock = MockTransport::new();
        let conn = open(&mock);
        conn.close();
        conn.close();

        assert!(!conn.is_open());
        assert!(matches!(conn.send(&OiCommand::Start), Err(Error::NotConnected)));
        assert!(matches!(conn.query(), Err(Error::NotConnected)));
        assert!(matches!(
            conn.send_all(&[OiCommand::Start]),
            Err(Error::NotConnected)
        ));
        assert!(mock.events().is_empty());
    }

    #[test]
    fn test_send_all_is_one_contiguous_write() {
        let mock = MockTransport::new();
        let conn = open(&mock);

        conn.send_all(&[OiCommand::Safe, OiCommand::Play { number: 3 }])
            .unwrap();

        assert_eq!(mock.events(), vec![TransportEvent::Write(vec![131, 141, 3])]);
    }

    #[test]
    fn test_write_failure_is_io_error() {
        let mock = MockTransport::new();
        mock.set_write_failure(Some(io::ErrorKind::BrokenPipe));
        let conn = open(&mock);

        assert!(conn.send(&OiCommand::Start).unwrap_err().is_io());
        assert!(conn.is_open());
    }
}
