//! OI command encoding

use super::opcodes::*;

/// One note of a song: MIDI note number and duration in 1/64 s
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Note {
    pub note: u8,
    pub duration: u8,
}

impl Note {
    pub const fn new(note: u8, duration: u8) -> Self {
        Self { note, duration }
    }
}

/// Commands sent to the robot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OiCommand {
    /// Start the OI; enters Passive mode
    Start,
    /// Soft reset, as if the battery were removed
    Reset,
    Safe,
    Full,
    Clean,
    SeekDock,
    /// Per-wheel velocities in mm/s
    DriveDirect { right: i16, left: i16 },
    /// Store a song in slot `number`
    Song { number: u8, notes: Vec<Note> },
    /// Play a stored song
    Play { number: u8 },
    /// Request a single sensor packet or packet group
    Sensors { packet_id: u8 },
}

impl OiCommand {
    /// Query for the full 80-byte sensor group
    pub const fn all_sensors() -> Self {
        OiCommand::Sensors {
            packet_id: PACKET_ALL_SENSORS,
        }
    }

    /// Neutral drive command
    pub const fn halt() -> Self {
        OiCommand::DriveDirect { right: 0, left: 0 }
    }

    pub fn opcode(&self) -> u8 {
        match self {
            OiCommand::Start => OP_START,
            OiCommand::Reset => OP_RESET,
            OiCommand::Safe => OP_SAFE,
            OiCommand::Full => OP_FULL,
            OiCommand::Clean => OP_CLEAN,
            OiCommand::SeekDock => OP_SEEK_DOCK,
            OiCommand::DriveDirect { .. } => OP_DRIVE_DIRECT,
            OiCommand::Song { .. } => OP_SONG,
            OiCommand::Play { .. } => OP_PLAY,
            OiCommand::Sensors { .. } => OP_SENSORS,
        }
    }

    /// Encode to wire bytes
    ///
    /// Drive Direct wheel velocities are clamped to ±500 mm/s. Song numbers
    /// are clamped to 0-4 and note lists truncated to 16 entries.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = vec![self.opcode()];
        match self {
            OiCommand::DriveDirect { right, left } => {
                bytes.extend_from_slice(&clamp_wheel(*right).to_be_bytes());
                bytes.extend_from_slice(&clamp_wheel(*left).to_be_bytes());
            }
            OiCommand::Song { number, notes } => {
                let notes = &notes[..notes.len().min(MAX_SONG_NOTES)];
                bytes.push((*number).min(MAX_SONG_NUMBER));
                bytes.push(notes.len() as u8);
                for n in notes {
                    bytes.push(n.note);
                    bytes.push(n.duration);
                }
            }
            OiCommand::Play { number } => bytes.push((*number).min(MAX_SONG_NUMBER)),
            OiCommand::Sensors { packet_id } => bytes.push(*packet_id),
            _ => {}
        }
        bytes
    }
}

fn clamp_wheel(v: i16) -> i16 {
    v.clamp(-MAX_WHEEL_VELOCITY, MAX_WHEEL_VELOCITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_byte_commands() {
        assert_eq!(OiCommand::Start.encode(), vec![128]);
        assert_eq!(OiCommand::Reset.encode(), vec![7]);
        assert_eq!(OiCommand::Safe.encode(), vec![131]);
        assert_eq!(OiCommand::Full.encode(), vec![132]);
        assert_eq!(OiCommand::Clean.encode(), vec![135]);
        assert_eq!(OiCommand::SeekDock.encode(), vec![143]);
    }

    #[test]
    fn test_drive_direct_right_wheel_first() {
        let cmd = OiCommand::DriveDirect {
            right: 350,
            left: -50,
        };
        // 350 = 0x015E, -50 = 0xFFCE
        assert_eq!(cmd.encode(), vec![145, 0x01, 0x5E, 0xFF, 0xCE]);
    }

    #[test]
    fn test_drive_direct_clamps() {
        let cmd = OiCommand::DriveDirect {
            right: 800,
            left: -650,
        };
        // ±500 = 0x01F4 / 0xFE0C
        assert_eq!(cmd.encode(), vec![145, 0x01, 0xF4, 0xFE, 0x0C]);
    }

    #[test]
    fn test_beep_song() {
        let song = OiCommand::Song {
            number: 3,
            notes: vec![Note::new(64, 16)],
        };
        assert_eq!(song.encode(), vec![140, 3, 1, 64, 16]);
        assert_eq!(OiCommand::Play { number: 3 }.encode(), vec![141, 3]);
    }

    #[test]
    fn test_song_limits() {
        let song = OiCommand::Song {
            number: 9,
            notes: vec![Note::new(60, 8); 20],
        };
        let bytes = song.encode();
        assert_eq!(bytes[1], 4);
        assert_eq!(bytes[2], 16);
        assert_eq!(bytes.len(), 3 + 32);
    }

    #[test]
    fn test_sensor_query() {
        assert_eq!(OiCommand::all_sensors().encode(), vec![142, 100]);
        assert_eq!(OiCommand::halt().encode(), vec![145, 0, 0, 0, 0]);
    }
}
