//! Teleoperation session
//!
//! Ties the connection, the motion composer, the telemetry cell and the poll
//! scheduler together. Two event sources share the connection:
//!
//! - Key events from the input layer, handled synchronously on the caller's
//!   thread and written straight through to the robot
//! - Poll firings from the scheduler's worker thread, each replacing the
//!   latest telemetry snapshot
//!
//! # State Machine
//!
//! ```text
//! Disconnected --connect--> Connected { polling: false }
//!                               |  ^
//!                toggle_polling |  | toggle_polling
//!                               v  |
//!                           Connected { polling: true }
//!
//! Connected --disconnect/shutdown--> Disconnected
//! ```
//!
//! Teardown always stops the poller and waits for an in-flight poll before
//! the connection is released.

use crate::config::{AppConfig, DriveConfig, SerialConfig};
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::motion::{Axis, DriveCommand, MotionComposer, MotionState};
use crate::protocol::{Note, OiCommand};
use crate::scheduler::{Cadence, PeriodicScheduler};
use crate::telemetry::{TelemetryCell, TelemetrySnapshot};
use crate::transport::{SerialTransport, Transport};
use parking_lot::Mutex;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Song slot used for the beep
const BEEP_SONG: u8 = 3;
/// MIDI note 64 (E4) for 16/64 s
const BEEP_NOTE: Note = Note::new(64, 16);

/// Keys understood by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalKey {
    Passive,
    Safe,
    Full,
    Clean,
    Reset,
    Dock,
    Beep,
    SensorDump,
    TogglePolling,
    Quit,
    Forward,
    Back,
    Left,
    Right,
}

impl LogicalKey {
    pub const ALL: [LogicalKey; 14] = [
        LogicalKey::Passive,
        LogicalKey::Safe,
        LogicalKey::Full,
        LogicalKey::Clean,
        LogicalKey::Reset,
        LogicalKey::Dock,
        LogicalKey::Beep,
        LogicalKey::SensorDump,
        LogicalKey::TogglePolling,
        LogicalKey::Quit,
        LogicalKey::Forward,
        LogicalKey::Back,
        LogicalKey::Left,
        LogicalKey::Right,
    ];

    /// Axis driven by this key, if it is a motion key
    pub fn axis(&self) -> Option<Axis> {
        match self {
            LogicalKey::Forward | LogicalKey::Back => Some(Axis::Velocity),
            LogicalKey::Left | LogicalKey::Right => Some(Axis::Rotation),
            _ => None,
        }
    }

    /// Short binding used on the console
    pub fn binding(&self) -> &'static str {
        match self {
            LogicalKey::Passive => "p",
            LogicalKey::Safe => "s",
            LogicalKey::Full => "f",
            LogicalKey::Clean => "c",
            LogicalKey::Reset => "r",
            LogicalKey::Dock => "d",
            LogicalKey::Beep => "space",
            LogicalKey::SensorDump => "b",
            LogicalKey::TogglePolling => "o",
            LogicalKey::Quit => "escape",
            LogicalKey::Forward => "up",
            LogicalKey::Back => "down",
            LogicalKey::Left => "left",
            LogicalKey::Right => "right",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            LogicalKey::Passive => "Passive mode",
            LogicalKey::Safe => "Safe mode",
            LogicalKey::Full => "Full mode",
            LogicalKey::Clean => "Clean",
            LogicalKey::Reset => "Reset",
            LogicalKey::Dock => "Seek dock",
            LogicalKey::Beep => "Beep",
            LogicalKey::SensorDump => "Sensor dump",
            LogicalKey::TogglePolling => "Toggle sensor polling",
            LogicalKey::Quit => "Quit",
            LogicalKey::Forward => "Drive forward",
            LogicalKey::Back => "Drive backward",
            LogicalKey::Left => "Turn left",
            LogicalKey::Right => "Turn right",
        }
    }
}

impl FromStr for LogicalKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = match s.trim().to_ascii_lowercase().as_str() {
            "p" | "passive" => LogicalKey::Passive,
            "s" | "safe" => LogicalKey::Safe,
            "f" | "full" => LogicalKey::Full,
            "c" | "clean" => LogicalKey::Clean,
            "r" | "reset" => LogicalKey::Reset,
            "d" | "dock" => LogicalKey::Dock,
            "space" | "beep" => LogicalKey::Beep,
            "b" | "dump" | "sensors" => LogicalKey::SensorDump,
            "o" | "poll" | "polling" => LogicalKey::TogglePolling,
            "escape" | "esc" | "q" | "quit" => LogicalKey::Quit,
            "up" | "forward" => LogicalKey::Forward,
            "down" | "back" => LogicalKey::Back,
            "left" => LogicalKey::Left,
            "right" => LogicalKey::Right,
            other => return Err(Error::Other(format!("Unknown key: {:?}", other))),
        };
        Ok(key)
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binding())
    }
}

/// Result of a handled key event
#[derive(Debug, Clone)]
pub enum KeyOutcome {
    /// A mode or actuator command was written
    Sent,
    /// A drive frame with these wheel velocities was written
    Drive(DriveCommand),
    /// A synchronous sensor dump
    Telemetry(Arc<TelemetrySnapshot>),
    /// Polling is now on (`true`) or off
    Polling(bool),
    /// The session has shut down
    Quit,
    /// Nothing to do for this event
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connected { polling: bool },
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Disconnected => f.write_str("disconnected"),
            SessionStatus::Connected { polling: true } => f.write_str("connected, polling"),
            SessionStatus::Connected { polling: false } => f.write_str("connected, idle"),
        }
    }
}

/// Connection slot shared with the poll callback
type LinkSlot = Arc<Mutex<Option<Arc<Connection>>>>;

/// Teleoperation session for one robot
pub struct TeleopSession {
    link: LinkSlot,
    motion: MotionComposer,
    telemetry: Arc<TelemetryCell>,
    poller: PeriodicScheduler,
    serial: SerialConfig,
    drive: DriveConfig,
}

impl TeleopSession {
    /// Create a disconnected session
    pub fn new(config: &AppConfig) -> Result<Self> {
        let link: LinkSlot = Arc::new(Mutex::new(None));
        let telemetry = Arc::new(TelemetryCell::new());

        let poll_link = Arc::clone(&link);
        let poll_telemetry = Arc::clone(&telemetry);
        let log_samples = config.polling.log_samples;
        let poller = PeriodicScheduler::new(
            "sensor-poll",
            config.polling.interval(),
            Cadence::Repeating,
            move || poll_once(&poll_link, &poll_telemetry, log_samples),
        )?;

        Ok(Self {
            link,
            motion: MotionComposer::new(),
            telemetry,
            poller,
            serial: config.serial.clone(),
            drive: config.drive.clone(),
        })
    }

    /// Open `port` and connect over it
    pub fn connect(&self, port: &str) -> Result<()> {
        if self.is_connected() {
            return Err(Error::InvalidState(
                "already connected to the robot".to_string(),
            ));
        }
        let transport = SerialTransport::open(port, self.serial.baud_rate)?;
        self.connect_with(Box::new(transport))?;
        log::info!("Connected to robot on {}", port);
        Ok(())
    }

    /// Connect over an already opened transport
    pub fn connect_with(&self, transport: Box<dyn Transport>) -> Result<()> {
        let mut link = self.link.lock();
        if link.is_some() {
            return Err(Error::InvalidState(
                "already connected to the robot".to_string(),
            ));
        }
        self.motion.reset();
        self.telemetry.clear();
        *link = Some(Arc::new(Connection::new(
            transport,
            self.serial.response_timeout(),
        )));
        Ok(())
    }

    /// Stop polling, halt the wheels and release the connection
    pub fn disconnect(&self) -> Result<()> {
        if !self.release() {
            return Err(Error::InvalidState("not connected".to_string()));
        }
        Ok(())
    }

    /// Idempotent teardown; also run on drop
    pub fn shutdown(&self) {
        self.release();
    }

    fn release(&self) -> bool {
        // Emptying the slot first keeps toggle_polling from restarting the poller
        let conn = self.link.lock().take();
        // A poll that already holds the connection finishes before it is closed
        self.poller.stop_and_wait();

        let Some(conn) = conn else {
            return false;
        };
        if let Err(e) = conn.send(&OiCommand::halt()) {
            log::warn!("Failed to halt wheels on disconnect: {}", e);
        }
        conn.close();
        self.motion.reset();
        log::info!("Disconnected from robot");
        true
    }

    /// Start or stop telemetry polling; returns the new polling state
    pub fn toggle_polling(&self) -> Result<bool> {
        let link = self.link.lock();
        if link.is_none() {
            return Err(Error::InvalidState(
                "sensor polling needs a connection".to_string(),
            ));
        }

        if self.poller.stop() {
            log::info!("Sensor polling stopped");
            Ok(false)
        } else {
            self.poller.start();
            log::info!("Sensor polling started ({:?})", self.poller.interval());
            Ok(true)
        }
    }

    /// Query the robot now and publish the result
    pub fn sensor_dump(&self) -> Result<Arc<TelemetrySnapshot>> {
        let conn = self.connection()?;
        let snapshot = self.telemetry.publish(conn.query()?);
        log::info!("Sensor dump:\n{}", snapshot.rendered);
        Ok(snapshot)
    }

    pub fn on_key_down(&self, key: LogicalKey) -> Result<KeyOutcome> {
        log::debug!("key down: {}", key);
        match key {
            LogicalKey::Passive => self.send_mode(OiCommand::Start),
            LogicalKey::Safe => self.send_mode(OiCommand::Safe),
            LogicalKey::Full => self.send_mode(OiCommand::Full),
            LogicalKey::Clean => self.send_mode(OiCommand::Clean),
            LogicalKey::Reset => self.send_mode(OiCommand::Reset),
            LogicalKey::Dock => self.send_mode(OiCommand::SeekDock),
            LogicalKey::Beep => {
                self.connection()?.send_all(&[
                    OiCommand::Song {
                        number: BEEP_SONG,
                        notes: vec![BEEP_NOTE],
                    },
                    OiCommand::Play { number: BEEP_SONG },
                ])?;
                Ok(KeyOutcome::Sent)
            }
            LogicalKey::SensorDump => self.sensor_dump().map(KeyOutcome::Telemetry),
            LogicalKey::TogglePolling => self.toggle_polling().map(KeyOutcome::Polling),
            LogicalKey::Quit => {
                self.shutdown();
                Ok(KeyOutcome::Quit)
            }
            LogicalKey::Forward => self.drive_axis(Axis::Velocity, self.drive.velocity_step),
            LogicalKey::Back => {
                self.drive_axis(Axis::Velocity, self.drive.velocity_step.saturating_neg())
            }
            LogicalKey::Left => self.drive_axis(Axis::Rotation, self.drive.rotation_step),
            LogicalKey::Right => {
                self.drive_axis(Axis::Rotation, self.drive.rotation_step.saturating_neg())
            }
        }
    }

    /// Releasing a motion key returns only its own axis to neutral
    pub fn on_key_up(&self, key: LogicalKey) -> Result<KeyOutcome> {
        log::debug!("key up: {}", key);
        match key.axis() {
            Some(axis) => self.drive_axis(axis, 0),
            None => Ok(KeyOutcome::Ignored),
        }
    }

    pub fn status(&self) -> SessionStatus {
        if self.is_connected() {
            SessionStatus::Connected {
                polling: self.poller.is_running(),
            }
        } else {
            SessionStatus::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.lock().is_some()
    }

    pub fn latest_telemetry(&self) -> Option<Arc<TelemetrySnapshot>> {
        self.telemetry.latest()
    }

    pub fn motion_state(&self) -> MotionState {
        self.motion.state()
    }

    /// Failed poll firings since the session was created
    pub fn poll_failures(&self) -> u64 {
        self.telemetry.failures()
    }

    fn connection(&self) -> Result<Arc<Connection>> {
        self.link.lock().clone().ok_or(Error::NotConnected)
    }

    fn send_mode(&self, command: OiCommand) -> Result<KeyOutcome> {
        self.connection()?.send(&command)?;
        Ok(KeyOutcome::Sent)
    }

    fn drive_axis(&self, axis: Axis, value: i16) -> Result<KeyOutcome> {
        let conn = self.connection()?;
        // Written under the composer lock so wire order matches commit order
        self.motion.set_axis_then(axis, value, |cmd| {
            conn.send(&OiCommand::DriveDirect {
                right: cmd.right,
                left: cmd.left,
            })?;
            Ok(KeyOutcome::Drive(cmd))
        })
    }
}

impl Drop for TeleopSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn poll_once(link: &LinkSlot, telemetry: &TelemetryCell, log_samples: bool) -> Result<()> {
    // A firing that races disconnect finds the slot already empty
    let Some(conn) = link.lock().clone() else {
        log::trace!("Sensor poll skipped: not connected");
        return Ok(());
    };
    match conn.query() {
        Ok(sensors) => {
            let snapshot = telemetry.publish(sensors);
            if log_samples {
                log::info!("Sensor poll #{}:\n{}", snapshot.sequence, snapshot.rendered);
            }
            Ok(())
        }
        Err(e) => {
            let failures = telemetry.record_failure();
            log::warn!("Sensor poll failed ({} total): {}", failures, e);
            Err(e)
        }
    }
}
