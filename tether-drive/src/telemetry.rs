//! Last-known sensor snapshot shared with the display layer

use crate::protocol::SensorPacket;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// One decoded sample with its cached text rendering
#[derive(Debug, Clone)]
pub struct TelemetrySnapshot {
    pub sensors: SensorPacket,
    /// "name: value" per line
    pub rendered: String,
    /// Increases by one with every published snapshot
    pub sequence: u64,
    pub captured_at: Instant,
}

/// Holds the latest snapshot; replaced wholesale, never mutated in place
#[derive(Debug, Default)]
pub struct TelemetryCell {
    latest: RwLock<Option<Arc<TelemetrySnapshot>>>,
    sequence: AtomicU64,
    failures: AtomicU64,
}

impl TelemetryCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `sensors` in a new snapshot and make it the latest
    pub fn publish(&self, sensors: SensorPacket) -> Arc<TelemetrySnapshot> {
        let rendered = sensors.render();
        // Numbered under the write lock so the latest always carries the highest sequence
        let mut latest = self.latest.write();
        let snapshot = Arc::new(TelemetrySnapshot {
            rendered,
            sensors,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed) + 1,
            captured_at: Instant::now(),
        });
        *latest = Some(Arc::clone(&snapshot));
        snapshot
    }

    pub fn latest(&self) -> Option<Arc<TelemetrySnapshot>> {
        self.latest.read().clone()
    }

    pub fn clear(&self) {
        *self.latest.write() = None;
    }

    pub fn record_failure(&self) -> u64 {
        self.failures.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::opcodes::SENSOR_PACKET_LEN;
    use std::thread;

    fn packet(voltage: u16) -> SensorPacket {
        let mut b = [0u8; SENSOR_PACKET_LEN];
        b[17..19].copy_from_slice(&voltage.to_be_bytes());
        SensorPacket::decode(&b).unwrap()
    }

    #[test]
    fn test_publish_replaces_snapshot() {
        let cell = TelemetryCell::new();
        assert!(cell.latest().is_none());

        let first = cell.publish(packet(14_000));
        let held = cell.latest().unwrap();
        let second = cell.publish(packet(15_000));

        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        // A reader holding the old snapshot keeps a consistent value
        assert_eq!(held.sensors.voltage, 14_000);
        assert!(held.rendered.contains("voltage: 14000"));

        let latest = cell.latest().unwrap();
        assert_eq!(latest.sensors.voltage, 15_000);
        assert!(latest.rendered.contains("voltage: 15000"));
    }

    #[test]
    fn test_clear_and_failures() {
        let cell = TelemetryCell::new();
        cell.publish(packet(1));
        cell.clear();
        assert!(cell.latest().is_none());

        assert_eq!(cell.record_failure(), 1);
        assert_eq!(cell.record_failure(), 2);
        assert_eq!(cell.failures(), 2);
    }

    #[test]
    fn test_concurrent_publish_keeps_newest() {
        let cell = Arc::new(TelemetryCell::new());
        let publishers: Vec<_> = (0..4u16)
            .map(|t| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    for i in 0..200u16 {
                        cell.publish(packet(t * 1000 + i));
                    }
                })
            })
            .collect();
        for publisher in publishers {
            publisher.join().unwrap();
        }

        assert_eq!(cell.latest().unwrap().sequence, 800);
    }
}
