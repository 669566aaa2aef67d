//! Velocity/rotation composition into per-wheel drive commands
//!
//! Two independent input axes feed one differential drive command:
//! `left = velocity - rotation / 2`, `right = velocity + rotation / 2`
//! (integer division, truncating toward zero).

use parking_lot::Mutex;

/// Independently controlled input axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Velocity,
    Rotation,
}

/// Latest committed axis values (mm/s)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotionState {
    pub velocity: i16,
    pub rotation: i16,
}

impl MotionState {
    pub fn command(&self) -> DriveCommand {
        let velocity = i32::from(self.velocity);
        let half_rotation = i32::from(self.rotation) / 2;
        DriveCommand {
            left: saturate(velocity - half_rotation),
            right: saturate(velocity + half_rotation),
        }
    }
}

/// Per-wheel velocities (mm/s)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveCommand {
    pub left: i16,
    pub right: i16,
}

/// Serializes axis updates so every derived command comes from one
/// consistent `MotionState`
#[derive(Debug, Default)]
pub struct MotionComposer {
    state: Mutex<MotionState>,
}

impl MotionComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update one axis and return the command derived from the new state
    pub fn set_axis(&self, axis: Axis, value: i16) -> DriveCommand {
        self.set_axis_then(axis, value, |cmd| cmd)
    }

    /// Update one axis, then run `f` on the derived command before any other
    /// update can commit
    pub fn set_axis_then<T>(&self, axis: Axis, value: i16, f: impl FnOnce(DriveCommand) -> T) -> T {
        let mut state = self.state.lock();
        match axis {
            Axis::Velocity => state.velocity = value,
            Axis::Rotation => state.rotation = value,
        }
        let command = state.command();
        log::trace!("{:?} = {} -> {:?}", axis, value, command);
        f(command)
    }

    pub fn current_command(&self) -> DriveCommand {
        self.state.lock().command()
    }

    /// Return both axes to neutral
    pub fn reset(&self) {
        *self.state.lock() = MotionState::default();
    }

    pub fn state(&self) -> MotionState {
        *self.state.lock()
    }
}

fn saturate(v: i32) -> i16 {
    v.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}
