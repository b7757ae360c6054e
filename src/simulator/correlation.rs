use crate::vitals::{Baseline, Channel, ChannelValues};
use serde::Serialize;

/// Directed coupling from one channel's deviation to another channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorrelationRule {
    pub source: Channel,
    pub target: Channel,
    /// Signed fraction of the source's standardized deviation transferred
    pub coefficient: f64,
}

impl CorrelationRule {
    pub const fn new(source: Channel, target: Channel, coefficient: f64) -> Self {
        Self {
            source,
            target,
            coefficient,
        }
    }
}

pub const DEFAULT_RULES: [CorrelationRule; 4] = [
    // HR up -> BP up
    CorrelationRule::new(Channel::HeartRate, Channel::BpSystolic, 0.3),
    CorrelationRule::new(Channel::HeartRate, Channel::BpDiastolic, 0.2),
    // desaturation -> compensatory tachycardia
    CorrelationRule::new(Channel::Spo2, Channel::HeartRate, -0.4),
    // fever -> HR up
    CorrelationRule::new(Channel::Temperature, Channel::HeartRate, 0.25),
];

/// Apply `rules` to independently generated `raw` values.
///
/// Each rule reads only `raw`, never another rule's output, so rule order
/// does not change the result.
pub fn apply(rules: &[CorrelationRule], raw: &ChannelValues, baseline: &Baseline) -> ChannelValues {
    let mut adjusted = *raw;
    for rule in rules {
        let source = baseline.stat(rule.source);
        let target = baseline.stat(rule.target);
        let deviation = source.z_score(raw.get(rule.source));
        *adjusted.get_mut(rule.target) += rule.coefficient * deviation * target.std_dev;
    }
    adjusted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::baseline::DEFAULT_BASELINE;

    #[test]
    fn test_values_at_baseline_are_unchanged() {
        let raw = DEFAULT_BASELINE.means();
        assert_eq!(apply(&DEFAULT_RULES, &raw, &DEFAULT_BASELINE), raw);
    }

    #[test]
    fn test_heart_rate_deviation_raises_blood_pressure() {
        let mut raw = DEFAULT_BASELINE.means();
        // +2 std heart rate
        raw.heart_rate += 2.0 * DEFAULT_BASELINE.heart_rate.std_dev;

        let out = apply(&DEFAULT_RULES, &raw, &DEFAULT_BASELINE);
        let sys = DEFAULT_BASELINE.systolic;
        let dia = DEFAULT_BASELINE.diastolic;
        assert!((out.bp_systolic - (sys.mean + 0.3 * 2.0 * sys.std_dev)).abs() < 1e-9);
        assert!((out.bp_diastolic - (dia.mean + 0.2 * 2.0 * dia.std_dev)).abs() < 1e-9);
        assert_eq!(out.heart_rate, raw.heart_rate);
    }

    #[test]
    fn test_rule_order_does_not_matter() {
        let mut raw = DEFAULT_BASELINE.means();
        raw.heart_rate += 10.0;
        raw.spo2 -= 3.0;
        raw.temperature += 1.0;

        let mut reversed = DEFAULT_RULES;
        reversed.reverse();

        let a = apply(&DEFAULT_RULES, &raw, &DEFAULT_BASELINE);
        let b = apply(&reversed, &raw, &DEFAULT_BASELINE);
        for channel in Channel::ALL {
            assert!((a.get(channel) - b.get(channel)).abs() < 1e-9);
        }
    }
}
