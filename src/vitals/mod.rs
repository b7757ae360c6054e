// Vital-sign data model shared by the simulator, storage and distribution layers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a monitored entity (patient record id in the external roster)
pub type EntityId = u64;

/// One simulated physiological signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    HeartRate,
    BpSystolic,
    BpDiastolic,
    Spo2,
    Temperature,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::HeartRate,
        Channel::BpSystolic,
        Channel::BpDiastolic,
        Channel::Spo2,
        Channel::Temperature,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::HeartRate => "heart_rate",
            Channel::BpSystolic => "bp_systolic",
            Channel::BpDiastolic => "bp_diastolic",
            Channel::Spo2 => "spo2",
            Channel::Temperature => "temperature",
        }
    }

    /// Hard physiological bounds `(min, max)`; every tick clamps into this range.
    pub fn bounds(self) -> (f64, f64) {
        match self {
            Channel::HeartRate => (20.0, 200.0),
            Channel::BpSystolic => (60.0, 260.0),
            Channel::BpDiastolic => (30.0, 160.0),
            Channel::Spo2 => (60.0, 100.0),
            Channel::Temperature => (34.0, 42.0),
        }
    }

    pub fn clamp(self, value: f64) -> f64 {
        let (min, max) = self.bounds();
        value.clamp(min, max)
    }

    /// Integer channels are reported in whole units, the rest to one decimal.
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Channel::HeartRate | Channel::BpSystolic | Channel::BpDiastolic
        )
    }

    pub fn round(self, value: f64) -> f64 {
        if self.is_integer() {
            value.round()
        } else {
            (value * 10.0).round() / 10.0
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference statistics for one channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChannelStat {
    pub mean: f64,
    pub std_dev: f64,
}

impl ChannelStat {
    pub const fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }

    /// Distance of `value` from the mean, in standard deviations (signed).
    pub fn z_score(&self, value: f64) -> f64 {
        (value - self.mean) / self.std_dev
    }
}

/// Per-entity clinical baseline, one statistic per channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    pub heart_rate: ChannelStat,
    pub systolic: ChannelStat,
    pub diastolic: ChannelStat,
    pub spo2: ChannelStat,
    pub temperature: ChannelStat,
}

impl Baseline {
    pub fn stat(&self, channel: Channel) -> ChannelStat {
        match channel {
            Channel::HeartRate => self.heart_rate,
            Channel::BpSystolic => self.systolic,
            Channel::BpDiastolic => self.diastolic,
            Channel::Spo2 => self.spo2,
            Channel::Temperature => self.temperature,
        }
    }

    pub fn means(&self) -> ChannelValues {
        ChannelValues::from_fn(|c| self.stat(c).mean)
    }
}

/// One floating-point value per channel
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelValues {
    pub heart_rate: f64,
    pub bp_systolic: f64,
    pub bp_diastolic: f64,
    pub spo2: f64,
    pub temperature: f64,
}

impl ChannelValues {
    pub fn from_fn(mut f: impl FnMut(Channel) -> f64) -> Self {
        Self {
            heart_rate: f(Channel::HeartRate),
            bp_systolic: f(Channel::BpSystolic),
            bp_diastolic: f(Channel::BpDiastolic),
            spo2: f(Channel::Spo2),
            temperature: f(Channel::Temperature),
        }
    }

    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::HeartRate => self.heart_rate,
            Channel::BpSystolic => self.bp_systolic,
            Channel::BpDiastolic => self.bp_diastolic,
            Channel::Spo2 => self.spo2,
            Channel::Temperature => self.temperature,
        }
    }

    pub fn get_mut(&mut self, channel: Channel) -> &mut f64 {
        match channel {
            Channel::HeartRate => &mut self.heart_rate,
            Channel::BpSystolic => &mut self.bp_systolic,
            Channel::BpDiastolic => &mut self.bp_diastolic,
            Channel::Spo2 => &mut self.spo2,
            Channel::Temperature => &mut self.temperature,
        }
    }

    pub fn set(&mut self, channel: Channel, value: f64) {
        *self.get_mut(channel) = value;
    }
}

/// Reading emitted once per entity per tick. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub entity_id: EntityId,
    pub heart_rate: i64,
    pub bp_systolic: i64,
    pub bp_diastolic: i64,
    pub spo2: f64,
    pub temperature: f64,
    pub is_anomaly: bool,
    /// Wall-clock time, independent of simulation speed
    pub recorded_at: DateTime<Utc>,
}

impl Reading {
    pub fn new(
        entity_id: EntityId,
        values: &ChannelValues,
        is_anomaly: bool,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entity_id,
            heart_rate: Channel::HeartRate.round(values.heart_rate) as i64,
            bp_systolic: Channel::BpSystolic.round(values.bp_systolic) as i64,
            bp_diastolic: Channel::BpDiastolic.round(values.bp_diastolic) as i64,
            spo2: Channel::Spo2.round(values.spo2),
            temperature: Channel::Temperature.round(values.temperature),
            is_anomaly,
            recorded_at,
        }
    }

    pub fn value(&self, channel: Channel) -> f64 {
        match channel {
            Channel::HeartRate => self.heart_rate as f64,
            Channel::BpSystolic => self.bp_systolic as f64,
            Channel::BpDiastolic => self.bp_diastolic as f64,
            Channel::Spo2 => self.spo2,
            Channel::Temperature => self.temperature,
        }
    }
}

/// Kind of state transition carried by a [`SimEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    AnomalyStarted,
    AnomalyResolved,
    ScenarioStarted,
    ScenarioEnded,
}

/// Broadcast-only notification of a simulator state transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimEvent {
    pub kind: EventKind,
    pub entity_id: EntityId,
    pub entity_name: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_channels_round_to_whole_units() {
        assert_eq!(Channel::HeartRate.round(72.49), 72.0);
        assert_eq!(Channel::BpDiastolic.round(80.5), 81.0);
    }

    #[test]
    fn test_continuous_channels_round_to_one_decimal() {
        assert_eq!(Channel::Temperature.round(36.66), 36.7);
        assert_eq!(Channel::Spo2.round(94.04), 94.0);
    }

    #[test]
    fn test_reading_rounds_values() {
        let values = ChannelValues {
            heart_rate: 77.6,
            bp_systolic: 140.2,
            bp_diastolic: 88.9,
            spo2: 93.27,
            temperature: 36.649,
        };
        let reading = Reading::new(3, &values, true, Utc::now());

        assert_eq!(reading.heart_rate, 78);
        assert_eq!(reading.bp_systolic, 140);
        assert_eq!(reading.bp_diastolic, 89);
        assert_eq!(reading.spo2, 93.3);
        assert_eq!(reading.temperature, 36.6);
        assert!(reading.is_anomaly);
    }

    #[test]
    fn test_clamp_respects_bounds() {
        assert_eq!(Channel::Spo2.clamp(104.0), 100.0);
        assert_eq!(Channel::HeartRate.clamp(5.0), 20.0);
        assert_eq!(Channel::Temperature.clamp(37.0), 37.0);
    }

    #[test]
    fn test_event_kind_serializes_snake_case() {
        let json = serde_json::to_string(&EventKind::ScenarioEnded).unwrap();
        assert_eq!(json, "\"scenario_ended\"");
    }
}
