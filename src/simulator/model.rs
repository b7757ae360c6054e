use crate::simulator::circadian::{self, CircadianProfile};
use crate::simulator::correlation::{CorrelationRule, DEFAULT_RULES};
use crate::simulator::generator::{derive_sigma, ProcessParams, DT};
use crate::vitals::{Channel, ChannelStat};

/// Deviation, in baseline standard deviations, above which an entity is anomalous
pub const ANOMALY_THRESHOLD: f64 = 2.0;

/// Spread of the initial offset from baseline mean, as a fraction of std dev
pub const SEED_SPREAD: f64 = 0.3;

/// Static process configuration for one channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelModel {
    pub theta: f64,
    pub volatility_fraction: f64,
    pub circadian: Option<CircadianProfile>,
}

/// Tunable constants of the numerical model
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationModel {
    channels: [ChannelModel; 5],
    pub correlations: Vec<CorrelationRule>,
    pub anomaly_threshold: f64,
    pub seed_spread: f64,
}

impl SimulationModel {
    pub fn channel(&self, channel: Channel) -> &ChannelModel {
        &self.channels[Self::slot(channel)]
    }

    pub fn channel_mut(&mut self, channel: Channel) -> &mut ChannelModel {
        &mut self.channels[Self::slot(channel)]
    }

    fn slot(channel: Channel) -> usize {
        match channel {
            Channel::HeartRate => 0,
            Channel::BpSystolic => 1,
            Channel::BpDiastolic => 2,
            Channel::Spo2 => 3,
            Channel::Temperature => 4,
        }
    }

    /// Flat target means (no time-of-day variation)
    pub fn without_circadian(mut self) -> Self {
        for model in self.channels.iter_mut() {
            model.circadian = None;
        }
        self
    }

    /// Same volatility fraction on every channel; zero gives a noiseless model
    pub fn with_volatility_fraction(mut self, fraction: f64) -> Self {
        for model in self.channels.iter_mut() {
            model.volatility_fraction = fraction;
        }
        self
    }

    pub fn without_correlations(mut self) -> Self {
        self.correlations.clear();
        self
    }

    /// Base parameters for `channel` at `hour` of day, before scenario overrides
    pub fn base_params(&self, channel: Channel, stat: ChannelStat, hour: f64) -> ProcessParams {
        let model = self.channel(channel);
        ProcessParams {
            theta: model.theta,
            mu: circadian::modulate(stat.mean, model.circadian.as_ref(), hour),
            sigma: derive_sigma(model.volatility_fraction, stat.std_dev, model.theta),
            dt: DT,
        }
    }
}

impl Default for SimulationModel {
    fn default() -> Self {
        Self {
            channels: [
                ChannelModel {
                    theta: 0.15,
                    volatility_fraction: 0.6,
                    // peaks mid-afternoon
                    circadian: Some(CircadianProfile::new(14.0, 0.10)),
                },
                ChannelModel {
                    theta: 0.12,
                    volatility_fraction: 0.6,
                    circadian: Some(CircadianProfile::new(10.0, 0.08)),
                },
                ChannelModel {
                    theta: 0.12,
                    volatility_fraction: 0.6,
                    circadian: Some(CircadianProfile::new(10.0, 0.08)),
                },
                ChannelModel {
                    theta: 0.20,
                    volatility_fraction: 0.6,
                    circadian: Some(CircadianProfile::new(14.0, 0.02)),
                },
                ChannelModel {
                    theta: 0.10,
                    volatility_fraction: 0.6,
                    // peaks late afternoon
                    circadian: Some(CircadianProfile::new(18.0, 0.015)),
                },
            ],
            correlations: DEFAULT_RULES.to_vec(),
            anomaly_threshold: ANOMALY_THRESHOLD,
            seed_spread: SEED_SPREAD,
        }
    }
}
