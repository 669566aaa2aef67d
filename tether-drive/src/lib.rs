//! TetherDrive - tethered teleoperation client for Create 2 robots
//!
//! Turns discrete key events into Open Interface drive and mode commands over
//! a serial link, while a fixed-rate scheduler samples the robot's sensors in
//! the background. Both paths share one serialized connection.

pub mod config;
pub mod connection;
pub mod error;
pub mod motion;
pub mod protocol;
pub mod scheduler;
pub mod session;
pub mod telemetry;
pub mod transport;

// Re-export commonly used types
pub use config::AppConfig;
pub use connection::Connection;
pub use error::{Error, Result};
pub use motion::{Axis, DriveCommand, MotionComposer, MotionState};
pub use scheduler::{Cadence, PeriodicScheduler, ScheduleState, SchedulerStats};
pub use session::{KeyOutcome, LogicalKey, SessionStatus, TeleopSession};
pub use telemetry::{TelemetryCell, TelemetrySnapshot};
