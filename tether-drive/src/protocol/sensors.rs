//! Sensor packet 100 decoding
//!
//! Packet 100 is the concatenation of OI packets 7 through 58, 80 bytes in
//! total. Bit-packed bytes decode into small flag structs; everything else is
//! a plain integer in OI units (mm, mm/s, mV, mA, degrees, counts).

use super::opcodes::SENSOR_PACKET_LEN;
use crate::error::{Error, Result};

/// Bumper and wheel drop flags (packet 7)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BumpsWheelDrops {
    pub bump_right: bool,
    pub bump_left: bool,
    pub wheeldrop_right: bool,
    pub wheeldrop_left: bool,
}

impl BumpsWheelDrops {
    pub fn from_byte(b: u8) -> Self {
        Self {
            bump_right: bit(b, 0),
            bump_left: bit(b, 1),
            wheeldrop_right: bit(b, 2),
            wheeldrop_left: bit(b, 3),
        }
    }
}

/// Motor overcurrent flags (packet 14)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overcurrents {
    pub side_brush: bool,
    pub main_brush: bool,
    pub right_wheel: bool,
    pub left_wheel: bool,
}

impl Overcurrents {
    pub fn from_byte(b: u8) -> Self {
        // bit 1 is unused
        Self {
            side_brush: bit(b, 0),
            main_brush: bit(b, 2),
            right_wheel: bit(b, 3),
            left_wheel: bit(b, 4),
        }
    }
}

/// Button state (packet 18)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Buttons {
    pub clean: bool,
    pub spot: bool,
    pub dock: bool,
    pub minute: bool,
    pub hour: bool,
    pub day: bool,
    pub schedule: bool,
    pub clock: bool,
}

impl Buttons {
    pub fn from_byte(b: u8) -> Self {
        Self {
            clean: bit(b, 0),
            spot: bit(b, 1),
            dock: bit(b, 2),
            minute: bit(b, 3),
            hour: bit(b, 4),
            day: bit(b, 5),
            schedule: bit(b, 6),
            clock: bit(b, 7),
        }
    }
}

/// Charger availability (packet 34)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChargingSources {
    pub internal_charger: bool,
    pub home_base: bool,
}

impl ChargingSources {
    pub fn from_byte(b: u8) -> Self {
        Self {
            internal_charger: bit(b, 0),
            home_base: bit(b, 1),
        }
    }
}

/// Light bumper detections (packet 45)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LightBumper {
    pub left: bool,
    pub front_left: bool,
    pub center_left: bool,
    pub center_right: bool,
    pub front_right: bool,
    pub right: bool,
}

impl LightBumper {
    pub fn from_byte(b: u8) -> Self {
        Self {
            left: bit(b, 0),
            front_left: bit(b, 1),
            center_left: bit(b, 2),
            center_right: bit(b, 3),
            front_right: bit(b, 4),
            right: bit(b, 5),
        }
    }
}

/// Caster stasis (packet 58)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stasis {
    pub toggling: bool,
    pub disabled: bool,
}

impl Stasis {
    pub fn from_byte(b: u8) -> Self {
        Self {
            toggling: bit(b, 0),
            disabled: bit(b, 1),
        }
    }
}

/// Charging state (packet 21)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargingState {
    NotCharging,
    Reconditioning,
    Full,
    Trickle,
    Waiting,
    Fault,
    Unknown(u8),
}

impl From<u8> for ChargingState {
    fn from(b: u8) -> Self {
        match b {
            0 => ChargingState::NotCharging,
            1 => ChargingState::Reconditioning,
            2 => ChargingState::Full,
            3 => ChargingState::Trickle,
            4 => ChargingState::Waiting,
            5 => ChargingState::Fault,
            other => ChargingState::Unknown(other),
        }
    }
}

/// OI mode as reported by the robot (packet 35)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OiMode {
    Off,
    Passive,
    Safe,
    Full,
    Unknown(u8),
}

impl From<u8> for OiMode {
    fn from(b: u8) -> Self {
        match b {
            0 => OiMode::Off,
            1 => OiMode::Passive,
            2 => OiMode::Safe,
            3 => OiMode::Full,
            other => OiMode::Unknown(other),
        }
    }
}

/// Decoded "all sensors" packet
#[derive(Debug, Clone, PartialEq)]
pub struct SensorPacket {
    pub bumps_wheeldrops: BumpsWheelDrops,
    pub wall: bool,
    pub cliff_left: bool,
    pub cliff_front_left: bool,
    pub cliff_front_right: bool,
    pub cliff_right: bool,
    pub virtual_wall: bool,
    pub overcurrents: Overcurrents,
    pub dirt_detect: u8,
    pub ir_opcode: u8,
    pub buttons: Buttons,
    /// mm since the previous request
    pub distance: i16,
    /// degrees since the previous request
    pub angle: i16,
    pub charging_state: ChargingState,
    /// mV
    pub voltage: u16,
    /// mA, negative when discharging
    pub current: i16,
    /// °C
    pub temperature: i8,
    /// mAh
    pub battery_charge: u16,
    /// mAh
    pub battery_capacity: u16,
    pub wall_signal: u16,
    pub cliff_left_signal: u16,
    pub cliff_front_left_signal: u16,
    pub cliff_front_right_signal: u16,
    pub cliff_right_signal: u16,
    pub charging_sources: ChargingSources,
    pub oi_mode: OiMode,
    pub song_number: u8,
    pub song_playing: bool,
    pub num_stream_packets: u8,
    pub requested_velocity: i16,
    pub requested_radius: i16,
    pub requested_right_velocity: i16,
    pub requested_left_velocity: i16,
    pub left_encoder_counts: u16,
    pub right_encoder_counts: u16,
    pub light_bumper: LightBumper,
    pub light_bump_left_signal: u16,
    pub light_bump_front_left_signal: u16,
    pub light_bump_center_left_signal: u16,
    pub light_bump_center_right_signal: u16,
    pub light_bump_front_right_signal: u16,
    pub light_bump_right_signal: u16,
    pub ir_opcode_left: u8,
    pub ir_opcode_right: u8,
    pub left_motor_current: i16,
    pub right_motor_current: i16,
    pub main_brush_motor_current: i16,
    pub side_brush_motor_current: i16,
    pub stasis: Stasis,
}

impl SensorPacket {
    /// Decode the 80-byte packet 100 response
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SENSOR_PACKET_LEN {
            return Err(Error::Decode(format!(
                "sensor packet must be {} bytes, got {}",
                SENSOR_PACKET_LEN,
                bytes.len()
            )));
        }

        let mut r = FieldReader::new(bytes);
        let packet = SensorPacket {
            bumps_wheeldrops: BumpsWheelDrops::from_byte(r.u8()),
            wall: r.flag(),
            cliff_left: r.flag(),
            cliff_front_left: r.flag(),
            cliff_front_right: r.flag(),
            cliff_right: r.flag(),
            virtual_wall: r.flag(),
            overcurrents: Overcurrents::from_byte(r.u8()),
            dirt_detect: r.u8(),
            ir_opcode: r.skip(1).u8(),
            buttons: Buttons::from_byte(r.u8()),
            distance: r.i16(),
            angle: r.i16(),
            charging_state: ChargingState::from(r.u8()),
            voltage: r.u16(),
            current: r.i16(),
            temperature: r.u8() as i8,
            battery_charge: r.u16(),
            battery_capacity: r.u16(),
            wall_signal: r.u16(),
            cliff_left_signal: r.u16(),
            cliff_front_left_signal: r.u16(),
            cliff_front_right_signal: r.u16(),
            cliff_right_signal: r.u16(),
            charging_sources: ChargingSources::from_byte(r.skip(3).u8()),
            oi_mode: OiMode::from(r.u8()),
            song_number: r.u8(),
            song_playing: r.flag(),
            num_stream_packets: r.u8(),
            requested_velocity: r.i16(),
            requested_radius: r.i16(),
            requested_right_velocity: r.i16(),
            requested_left_velocity: r.i16(),
            left_encoder_counts: r.u16(),
            right_encoder_counts: r.u16(),
            light_bumper: LightBumper::from_byte(r.u8()),
            light_bump_left_signal: r.u16(),
            light_bump_front_left_signal: r.u16(),
            light_bump_center_left_signal: r.u16(),
            light_bump_center_right_signal: r.u16(),
            light_bump_front_right_signal: r.u16(),
            light_bump_right_signal: r.u16(),
            ir_opcode_left: r.u8(),
            ir_opcode_right: r.u8(),
            left_motor_current: r.i16(),
            right_motor_current: r.i16(),
            main_brush_motor_current: r.i16(),
            side_brush_motor_current: r.i16(),
            stasis: Stasis::from_byte(r.u8()),
        };
        debug_assert_eq!(r.pos, SENSOR_PACKET_LEN);

        Ok(packet)
    }

    /// Field names and display values, in packet order
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("bumps_wheeldrops", format!("{:?}", self.bumps_wheeldrops)),
            ("wall", self.wall.to_string()),
            ("cliff_left", self.cliff_left.to_string()),
            ("cliff_front_left", self.cliff_front_left.to_string()),
            ("cliff_front_right", self.cliff_front_right.to_string()),
            ("cliff_right", self.cliff_right.to_string()),
            ("virtual_wall", self.virtual_wall.to_string()),
            ("overcurrents", format!("{:?}", self.overcurrents)),
            ("dirt_detect", self.dirt_detect.to_string()),
            ("ir_opcode", self.ir_opcode.to_string()),
            ("buttons", format!("{:?}", self.buttons)),
            ("distance", self.distance.to_string()),
            ("angle", self.angle.to_string()),
            ("charging_state", format!("{:?}", self.charging_state)),
            ("voltage", self.voltage.to_string()),
            ("current", self.current.to_string()),
            ("temperature", self.temperature.to_string()),
            ("battery_charge", self.battery_charge.to_string()),
            ("battery_capacity", self.battery_capacity.to_string()),
            ("wall_signal", self.wall_signal.to_string()),
            ("cliff_left_signal", self.cliff_left_signal.to_string()),
            (
                "cliff_front_left_signal",
                self.cliff_front_left_signal.to_string(),
            ),
            (
                "cliff_front_right_signal",
                self.cliff_front_right_signal.to_string(),
            ),
            ("cliff_right_signal", self.cliff_right_signal.to_string()),
            ("charging_sources", format!("{:?}", self.charging_sources)),
            ("oi_mode", format!("{:?}", self.oi_mode)),
            ("song_number", self.song_number.to_string()),
            ("song_playing", self.song_playing.to_string()),
            ("num_stream_packets", self.num_stream_packets.to_string()),
            ("requested_velocity", self.requested_velocity.to_string()),
            ("requested_radius", self.requested_radius.to_string()),
            (
                "requested_right_velocity",
                self.requested_right_velocity.to_string(),
            ),
            (
                "requested_left_velocity",
                self.requested_left_velocity.to_string(),
            ),
            ("left_encoder_counts", self.left_encoder_counts.to_string()),
            ("right_encoder_counts", self.right_encoder_counts.to_string()),
            ("light_bumper", format!("{:?}", self.light_bumper)),
            (
                "light_bump_left_signal",
                self.light_bump_left_signal.to_string(),
            ),
            (
                "light_bump_front_left_signal",
                self.light_bump_front_left_signal.to_string(),
            ),
            (
                "light_bump_center_left_signal",
                self.light_bump_center_left_signal.to_string(),
            ),
            (
                "light_bump_center_right_signal",
                self.light_bump_center_right_signal.to_string(),
            ),
            (
                "light_bump_front_right_signal",
                self.light_bump_front_right_signal.to_string(),
            ),
            (
                "light_bump_right_signal",
                self.light_bump_right_signal.to_string(),
            ),
            ("ir_opcode_left", self.ir_opcode_left.to_string()),
            ("ir_opcode_right", self.ir_opcode_right.to_string()),
            ("left_motor_current", self.left_motor_current.to_string()),
            ("right_motor_current", self.right_motor_current.to_string()),
            (
                "main_brush_motor_current",
                self.main_brush_motor_current.to_string(),
            ),
            (
                "side_brush_motor_current",
                self.side_brush_motor_current.to_string(),
            ),
            ("stasis", format!("{:?}", self.stasis)),
        ]
    }

    /// One "name: value" line per field
    pub fn render(&self) -> String {
        self.fields()
            .into_iter()
            .map(|(name, value)| format!("{}: {}", name, value))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[inline]
fn bit(b: u8, n: u8) -> bool {
    b & (1 << n) != 0
}

/// Sequential big-endian reader over a length-checked buffer
struct FieldReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn skip(&mut self, n: usize) -> &mut Self {
        self.pos += n;
        self
    }

    fn u8(&mut self) -> u8 {
        let v = self.bytes[self.pos];
        self.pos += 1;
        v
    }

    fn flag(&mut self) -> bool {
        self.u8() != 0
    }

    fn u16(&mut self) -> u16 {
        let v = u16::from_be_bytes([self.bytes[self.pos], self.bytes[self.pos + 1]]);
        self.pos += 2;
        v
    }

    fn i16(&mut self) -> i16 {
        self.u16() as i16
    }
}
