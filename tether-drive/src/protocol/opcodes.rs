//! Open Interface opcodes and protocol constants

// Mode commands
pub const OP_START: u8 = 128;
pub const OP_RESET: u8 = 7;
pub const OP_SAFE: u8 = 131;
pub const OP_FULL: u8 = 132;

// Cleaning commands
pub const OP_CLEAN: u8 = 135;
pub const OP_SEEK_DOCK: u8 = 143;

// Actuator commands
pub const OP_DRIVE_DIRECT: u8 = 145;
pub const OP_SONG: u8 = 140;
pub const OP_PLAY: u8 = 141;

// Input commands
pub const OP_SENSORS: u8 = 142;

/// Packet group id for "all sensors" (packets 7-58)
pub const PACKET_ALL_SENSORS: u8 = 100;

/// Length of the packet 100 response in bytes
pub const SENSOR_PACKET_LEN: usize = 80;

/// Wheel velocity limit for Drive Direct (mm/s)
pub const MAX_WHEEL_VELOCITY: i16 = 500;

/// Song slots are numbered 0-4
pub const MAX_SONG_NUMBER: u8 = 4;

/// A song holds at most 16 notes
pub const MAX_SONG_NOTES: usize = 16;
