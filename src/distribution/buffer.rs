use crate::vitals::{EntityId, Reading};
use std::collections::HashMap;

/// Latest pending reading per entity. A newer reading replaces an older one,
/// so each flush carries at most one reading per entity.
#[derive(Debug, Default)]
pub struct CoalescingBuffer {
    pending: HashMap<EntityId, Reading>,
}

impl CoalescingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, reading: Reading) {
        self.pending.insert(reading.entity_id, reading);
    }

    /// Take everything pending, ordered by entity id
    pub fn drain(&mut self) -> Vec<Reading> {
        let mut readings: Vec<Reading> = self.pending.drain().map(|(_, r)| r).collect();
        readings.sort_by_key(|r| r.entity_id);
        readings
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn reading(entity_id: EntityId, heart_rate: i64, offset_s: i64) -> Reading {
        Reading {
            entity_id,
            heart_rate,
            bp_systolic: 120,
            bp_diastolic: 80,
            spo2: 97.0,
            temperature: 36.6,
            is_anomaly: false,
            recorded_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
                + Duration::seconds(offset_s),
        }
    }

    #[test]
    fn test_latest_reading_wins() {
        let mut buffer = CoalescingBuffer::new();
        buffer.enqueue(reading(1, 70, 0));
        buffer.enqueue(reading(1, 71, 1));
        buffer.enqueue(reading(1, 72, 2));

        let drained = buffer.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].heart_rate, 72);
    }

    #[test]
    fn test_drain_empties_and_orders() {
        let mut buffer = CoalescingBuffer::new();
        buffer.enqueue(reading(5, 70, 0));
        buffer.enqueue(reading(2, 70, 0));
        assert_eq!(buffer.len(), 2);

        let ids: Vec<EntityId> = buffer.drain().iter().map(|r| r.entity_id).collect();
        assert_eq!(ids, vec![2, 5]);
        assert!(buffer.is_empty());
        assert!(buffer.drain().is_empty());
    }
}
