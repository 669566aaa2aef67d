//! Create 2 Open Interface protocol
//!
//! OI frames are raw: an opcode byte followed by zero or more data bytes, no
//! sync header and no checksum. Multi-byte values are big-endian.
//!
//! This module provides:
//! - `OiCommand`: the commands the client sends, with their wire encoding
//! - `SensorPacket`: the decoded 80-byte "all sensors" group (packet id 100)

mod command;
pub mod opcodes;
mod sensors;

pub use command::{Note, OiCommand};
pub use sensors::{
    BumpsWheelDrops, Buttons, ChargingSources, ChargingState, LightBumper, OiMode, Overcurrents,
    SensorPacket, Stasis,
};
