use crate::simulator::generator::{standard_normal, ProcessParams};
use crate::simulator::scenario::{ActiveScenario, ScenarioDefinition, ScenarioId};
use crate::vitals::{Baseline, Channel, ChannelValues, EntityId};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

/// Mutable simulation record for one tracked entity
#[derive(Debug, Clone)]
pub struct EntityState {
    pub id: EntityId,
    pub name: String,
    pub baseline: Baseline,
    pub values: ChannelValues,
    pub scenario: Option<ActiveScenario>,
    pub is_anomaly: bool,
}

impl EntityState {
    /// Seed at baseline mean plus `spread` x std dev of Gaussian offset, so
    /// entities started together are not numerically identical.
    pub fn new<R: Rng + ?Sized>(
        id: EntityId,
        name: impl Into<String>,
        baseline: Baseline,
        spread: f64,
        rng: &mut R,
    ) -> Self {
        let values = ChannelValues::from_fn(|channel| {
            let stat = baseline.stat(channel);
            stat.mean + standard_normal(&mut *rng) * stat.std_dev * spread
        });
        Self {
            id,
            name: name.into(),
            baseline,
            values,
            scenario: None,
            is_anomaly: false,
        }
    }

    pub fn apply_scenario(&mut self, definition: &ScenarioDefinition, virtual_now: DateTime<Utc>) {
        self.scenario = Some(ActiveScenario::start(definition, virtual_now));
    }

    /// Clear the scenario if it has expired, returning it
    pub fn take_expired_scenario(&mut self, virtual_now: DateTime<Utc>) -> Option<ActiveScenario> {
        let expired = self
            .scenario
            .as_ref()
            .is_some_and(|active| active.is_expired(virtual_now));
        if expired {
            self.scenario.take()
        } else {
            None
        }
    }

    /// Effective process parameters for `channel` with scenario overrides applied
    pub fn effective_params(&self, channel: Channel, base: ProcessParams) -> ProcessParams {
        match self
            .scenario
            .as_ref()
            .and_then(|active| active.override_for(channel))
        {
            Some(o) => o.apply(base),
            None => base,
        }
    }

    /// True iff some channel deviates from baseline by more than `threshold` std devs
    pub fn evaluate_anomaly(&self, threshold: f64) -> bool {
        is_anomalous(&self.values, &self.baseline, threshold)
    }

    /// All channels to baseline mean, scenario and anomaly cleared
    pub fn reset_to_baseline(&mut self) {
        self.values = self.baseline.means();
        self.scenario = None;
        self.is_anomaly = false;
    }

    pub fn status(&self, virtual_now: DateTime<Utc>) -> EntityStatus {
        EntityStatus {
            entity_id: self.id,
            entity_name: self.name.clone(),
            current_values: self.values,
            active_scenario: self.scenario.as_ref().map(|active| ScenarioStatus {
                id: active.id,
                name: active.name,
                remaining_ms: active.remaining_ms(virtual_now),
            }),
            is_anomaly: self.is_anomaly,
        }
    }
}

pub fn is_anomalous(values: &ChannelValues, baseline: &Baseline, threshold: f64) -> bool {
    Channel::ALL
        .iter()
        .any(|&channel| baseline.stat(channel).z_score(values.get(channel)).abs() > threshold)
}

/// Status view of an active scenario
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioStatus {
    pub id: ScenarioId,
    pub name: &'static str,
    pub remaining_ms: i64,
}

/// Status view of one entity
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityStatus {
    pub entity_id: EntityId,
    pub entity_name: String,
    pub current_values: ChannelValues,
    pub active_scenario: Option<ScenarioStatus>,
    pub is_anomaly: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::baseline::DEFAULT_BASELINE;
    use crate::simulator::scenario::definition;
    use chrono::{Duration, TimeZone};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn entity() -> EntityState {
        let mut rng = StdRng::seed_from_u64(3);
        EntityState::new(9, "Test Entity", DEFAULT_BASELINE, 0.3, &mut rng)
    }

    #[test]
    fn test_seeded_values_near_baseline() {
        let e = entity();
        for channel in Channel::ALL {
            let z = DEFAULT_BASELINE.stat(channel).z_score(e.values.get(channel));
            assert!(z.abs() < 1.5, "{} seeded {} std away", channel, z);
        }
    }

    #[test]
    fn test_entities_seeded_together_differ() {
        let mut rng = StdRng::seed_from_u64(11);
        let a = EntityState::new(1, "a", DEFAULT_BASELINE, 0.3, &mut rng);
        let b = EntityState::new(2, "b", DEFAULT_BASELINE, 0.3, &mut rng);
        assert_ne!(a.values, b.values);
    }

    #[test]
    fn test_anomaly_threshold_is_strict() {
        let mut values = DEFAULT_BASELINE.means();
        values.spo2 = DEFAULT_BASELINE.spo2.mean - 2.0 * DEFAULT_BASELINE.spo2.std_dev;
        assert!(!is_anomalous(&values, &DEFAULT_BASELINE, 2.0));

        values.spo2 -= 0.01;
        assert!(is_anomalous(&values, &DEFAULT_BASELINE, 2.0));
    }

    #[test]
    fn test_reset_restores_means_and_clears_flags() {
        let mut e = entity();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        e.apply_scenario(&definition(ScenarioId::Desaturation), now);
        e.is_anomaly = true;
        e.values.heart_rate = 180.0;

        e.reset_to_baseline();

        assert_eq!(e.values, DEFAULT_BASELINE.means());
        assert!(e.scenario.is_none());
        assert!(!e.is_anomaly);
    }

    #[test]
    fn test_take_expired_scenario_only_after_expiry() {
        let mut e = entity();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        e.apply_scenario(&definition(ScenarioId::Bradycardia), now);

        assert!(e.take_expired_scenario(now + Duration::minutes(2)).is_none());
        assert!(e.scenario.is_some());

        let ended = e.take_expired_scenario(now + Duration::minutes(3));
        assert_eq!(ended.map(|s| s.id), Some(ScenarioId::Bradycardia));
        assert!(e.take_expired_scenario(now + Duration::minutes(10)).is_none());
    }

    #[test]
    fn test_effective_params_without_override_are_base() {
        let mut e = entity();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        e.apply_scenario(&definition(ScenarioId::FeverSpike), now);

        let base = ProcessParams {
            theta: 0.2,
            mu: 96.0,
            sigma: 0.5,
            dt: 1.0,
        };
        assert_eq!(e.effective_params(Channel::Spo2, base), base);
        assert_eq!(e.effective_params(Channel::Temperature, base).mu, 97.5);
    }
}
