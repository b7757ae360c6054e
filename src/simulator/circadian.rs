use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Time-of-day curve for one channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircadianProfile {
    /// Hour of day (0-24) at which the channel peaks
    pub peak_hour: f64,
    /// Fraction of the baseline mean to modulate by (0.10 = +/-10%)
    pub amplitude: f64,
}

impl CircadianProfile {
    pub const fn new(peak_hour: f64, amplitude: f64) -> Self {
        Self {
            peak_hour,
            amplitude,
        }
    }
}

/// Adjust `baseline_mean` for the time of day.
///
/// Cosine curve peaking at `peak_hour`, troughing 12 hours later. Channels
/// without a profile pass through unchanged.
pub fn modulate(baseline_mean: f64, profile: Option<&CircadianProfile>, hour: f64) -> f64 {
    let Some(profile) = profile else {
        return baseline_mean;
    };
    let phase = (hour - profile.peak_hour) / 24.0 * 2.0 * PI;
    baseline_mean * (1.0 + profile.amplitude * phase.cos())
}
