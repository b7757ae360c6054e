use crate::error::ControlError;
use crate::simulator::generator::ProcessParams;
use crate::vitals::Channel;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Catalog key of a clinical scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScenarioId {
    #[serde(rename = "bradycardia")]
    Bradycardia,
    #[serde(rename = "feverSpike")]
    FeverSpike,
    #[serde(rename = "desaturation")]
    Desaturation,
    #[serde(rename = "hypertensiveCrisis")]
    HypertensiveCrisis,
}

impl ScenarioId {
    pub const ALL: [ScenarioId; 4] = [
        ScenarioId::Bradycardia,
        ScenarioId::FeverSpike,
        ScenarioId::Desaturation,
        ScenarioId::HypertensiveCrisis,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScenarioId::Bradycardia => "bradycardia",
            ScenarioId::FeverSpike => "feverSpike",
            ScenarioId::Desaturation => "desaturation",
            ScenarioId::HypertensiveCrisis => "hypertensiveCrisis",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioId {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScenarioId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| ControlError::UnknownScenario(s.to_string()))
    }
}

/// Per-channel process override. Defaults are the identity (no change).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterOverride {
    pub channel: Channel,
    #[serde(default)]
    pub mu_shift: f64,
    #[serde(default = "one")]
    pub sigma_multiplier: f64,
    #[serde(default = "one")]
    pub theta_multiplier: f64,
}

fn one() -> f64 {
    1.0
}

impl ParameterOverride {
    pub const fn new(channel: Channel) -> Self {
        Self {
            channel,
            mu_shift: 0.0,
            sigma_multiplier: 1.0,
            theta_multiplier: 1.0,
        }
    }

    pub fn mu(mut self, shift: f64) -> Self {
        self.mu_shift = shift;
        self
    }

    pub fn sigma(mut self, multiplier: f64) -> Self {
        self.sigma_multiplier = multiplier;
        self
    }

    pub fn theta(mut self, multiplier: f64) -> Self {
        self.theta_multiplier = multiplier;
        self
    }

    /// Effective parameters for this tick
    pub fn apply(&self, base: ProcessParams) -> ProcessParams {
        ProcessParams {
            theta: base.theta * self.theta_multiplier,
            mu: base.mu + self.mu_shift,
            sigma: base.sigma * self.sigma_multiplier,
            dt: base.dt,
        }
    }
}

/// Static catalog entry describing a clinical pattern
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioDefinition {
    pub id: ScenarioId,
    pub name: &'static str,
    pub description: &'static str,
    /// Duration in virtual time
    pub duration_ms: i64,
    pub overrides: Vec<ParameterOverride>,
}

impl ScenarioDefinition {
    pub fn duration(&self) -> Duration {
        Duration::milliseconds(self.duration_ms)
    }
}

const MINUTE_MS: i64 = 60 * 1000;

/// Look up a catalog entry
pub fn definition(id: ScenarioId) -> ScenarioDefinition {
    match id {
        ScenarioId::Bradycardia => ScenarioDefinition {
            id,
            name: "Bradycardia",
            description: "Heart rate gradually drops below 60 bpm",
            duration_ms: 3 * MINUTE_MS,
            overrides: vec![
                // lower target, slow reversion
                ParameterOverride::new(Channel::HeartRate).mu(-20.0).theta(0.5),
                ParameterOverride::new(Channel::BpSystolic).mu(-8.0),
            ],
        },
        ScenarioId::FeverSpike => ScenarioDefinition {
            id,
            name: "Fever Spike",
            description: "Temperature rises toward 38.5+, HR compensates upward",
            duration_ms: 5 * MINUTE_MS,
            overrides: vec![
                ParameterOverride::new(Channel::Temperature).mu(1.5).sigma(1.5),
                ParameterOverride::new(Channel::HeartRate).mu(15.0),
            ],
        },
        ScenarioId::Desaturation => ScenarioDefinition {
            id,
            name: "Desaturation",
            description: "SpO2 gradually drops below 90%, HR rises to compensate",
            duration_ms: 4 * MINUTE_MS,
            overrides: vec![
                ParameterOverride::new(Channel::Spo2).mu(-6.0).theta(0.3),
                ParameterOverride::new(Channel::HeartRate).mu(20.0).sigma(1.3),
            ],
        },
        ScenarioId::HypertensiveCrisis => ScenarioDefinition {
            id,
            name: "Hypertensive Crisis",
            description: "Blood pressure spikes significantly",
            duration_ms: 4 * MINUTE_MS,
            overrides: vec![
                ParameterOverride::new(Channel::BpSystolic).mu(40.0).sigma(1.5),
                ParameterOverride::new(Channel::BpDiastolic).mu(20.0).sigma(1.3),
                ParameterOverride::new(Channel::HeartRate).mu(10.0),
            ],
        },
    }
}

/// All catalog entries
pub fn catalog() -> Vec<ScenarioDefinition> {
    ScenarioId::ALL.into_iter().map(definition).collect()
}

/// Scenario currently applied to an entity
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveScenario {
    pub id: ScenarioId,
    pub name: &'static str,
    /// Absolute virtual-time expiry
    pub expires_at: DateTime<Utc>,
    pub overrides: Vec<ParameterOverride>,
}

impl ActiveScenario {
    pub fn start(definition: &ScenarioDefinition, virtual_now: DateTime<Utc>) -> Self {
        Self {
            id: definition.id,
            name: definition.name,
            expires_at: virtual_now + definition.duration(),
            overrides: definition.overrides.clone(),
        }
    }

    pub fn override_for(&self, channel: Channel) -> Option<&ParameterOverride> {
        self.overrides.iter().find(|o| o.channel == channel)
    }

    pub fn is_expired(&self, virtual_now: DateTime<Utc>) -> bool {
        virtual_now >= self.expires_at
    }

    pub fn remaining_ms(&self, virtual_now: DateTime<Utc>) -> i64 {
        (self.expires_at - virtual_now).num_milliseconds().max(0)
    }
}
