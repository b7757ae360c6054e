use crate::vitals::{Baseline, ChannelStat, EntityId};
use std::collections::HashMap;

/// Generic elderly profile for entities without a registered baseline
pub const DEFAULT_BASELINE: Baseline = Baseline {
    heart_rate: ChannelStat::new(74.0, 7.0),
    systolic: ChannelStat::new(130.0, 10.0),
    diastolic: ChannelStat::new(80.0, 7.0),
    spo2: ChannelStat::new(96.0, 1.5),
    temperature: ChannelStat::new(36.6, 0.3),
};

/// Baselines for the seeded roster (ids 1-6)
const SEEDED_BASELINES: [(EntityId, Baseline); 6] = [
    // hypertension, mild COPD
    (
        1,
        Baseline {
            heart_rate: ChannelStat::new(78.0, 8.0),
            systolic: ChannelStat::new(148.0, 12.0),
            diastolic: ChannelStat::new(88.0, 8.0),
            spo2: ChannelStat::new(93.0, 2.0),
            temperature: ChannelStat::new(36.6, 0.3),
        },
    ),
    // well-controlled type 2 diabetes
    (
        2,
        Baseline {
            heart_rate: ChannelStat::new(72.0, 6.0),
            systolic: ChannelStat::new(128.0, 10.0),
            diastolic: ChannelStat::new(78.0, 6.0),
            spo2: ChannelStat::new(97.0, 1.5),
            temperature: ChannelStat::new(36.7, 0.2),
        },
    ),
    // atrial fibrillation: wide heart-rate spread
    (
        3,
        Baseline {
            heart_rate: ChannelStat::new(82.0, 14.0),
            systolic: ChannelStat::new(118.0, 10.0),
            diastolic: ChannelStat::new(68.0, 7.0),
            spo2: ChannelStat::new(95.0, 2.0),
            temperature: ChannelStat::new(36.4, 0.3),
        },
    ),
    // stable congestive heart failure
    (
        4,
        Baseline {
            heart_rate: ChannelStat::new(88.0, 10.0),
            systolic: ChannelStat::new(132.0, 12.0),
            diastolic: ChannelStat::new(82.0, 8.0),
            spo2: ChannelStat::new(93.0, 2.5),
            temperature: ChannelStat::new(36.5, 0.2),
        },
    ),
    // hypothyroidism: lower heart rate and temperature
    (
        5,
        Baseline {
            heart_rate: ChannelStat::new(62.0, 5.0),
            systolic: ChannelStat::new(120.0, 8.0),
            diastolic: ChannelStat::new(72.0, 5.0),
            spo2: ChannelStat::new(97.0, 1.0),
            temperature: ChannelStat::new(36.0, 0.3),
        },
    ),
    // post-stroke, hypertension
    (
        6,
        Baseline {
            heart_rate: ChannelStat::new(76.0, 7.0),
            systolic: ChannelStat::new(145.0, 14.0),
            diastolic: ChannelStat::new(85.0, 9.0),
            spo2: ChannelStat::new(96.0, 1.5),
            temperature: ChannelStat::new(36.5, 0.4),
        },
    ),
];

/// Per-entity clinical reference statistics
#[derive(Debug, Clone)]
pub struct BaselineRegistry {
    baselines: HashMap<EntityId, Baseline>,
    fallback: Baseline,
}

impl BaselineRegistry {
    /// Registry with no entity-specific baselines
    pub fn empty() -> Self {
        Self {
            baselines: HashMap::new(),
            fallback: DEFAULT_BASELINE,
        }
    }

    /// Registry pre-populated with the seeded roster's baselines
    pub fn seeded() -> Self {
        let mut registry = Self::empty();
        for (id, baseline) in SEEDED_BASELINES {
            registry.assign(id, baseline);
        }
        registry
    }

    /// Register or replace the baseline for `entity_id`
    pub fn assign(&mut self, entity_id: EntityId, baseline: Baseline) {
        self.baselines.insert(entity_id, baseline);
    }

    pub fn contains(&self, entity_id: EntityId) -> bool {
        self.baselines.contains_key(&entity_id)
    }

    /// Baseline for `entity_id`, falling back to the generic profile
    pub fn get(&self, entity_id: EntityId) -> Baseline {
        self.baselines
            .get(&entity_id)
            .copied()
            .unwrap_or(self.fallback)
    }

    pub fn len(&self) -> usize {
        self.baselines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.baselines.is_empty()
    }
}

impl Default for BaselineRegistry {
    fn default() -> Self {
        Self::seeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_registry_has_six_profiles() {
        let registry = BaselineRegistry::seeded();
        assert_eq!(registry.len(), 6);
        assert_eq!(registry.get(5).heart_rate.mean, 62.0);
    }

    #[test]
    fn test_unknown_entity_falls_back_to_default() {
        let registry = BaselineRegistry::seeded();
        assert!(!registry.contains(42));
        assert_eq!(registry.get(42), DEFAULT_BASELINE);
    }

    #[test]
    fn test_assign_replaces_existing_baseline() {
        let mut registry = BaselineRegistry::seeded();
        let mut custom = DEFAULT_BASELINE;
        custom.heart_rate = ChannelStat::new(100.0, 5.0);

        registry.assign(1, custom);
        assert_eq!(registry.get(1).heart_rate.mean, 100.0);
    }
}
