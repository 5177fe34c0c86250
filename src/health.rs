//! Advisory health checks on the optimization process.
//!
//! Findings are observations, never errors. The runner logs them and keeps
//! training; nothing here mutates parameters or the stopping decision.

use tracing::warn;

use crate::model::ParameterSnapshot;

/// Threshold above which a parameter's spread looks like exploding values.
const STD_DEV_LIMIT: f64 = 2.0;

/// One pathological signal observed during a health check.
#[derive(Debug, Clone, PartialEq)]
pub enum HealthSignal {
    /// Every element of the named parameter is bit-for-bit identical to the
    /// previous check. A parameter that gradient updates never move is
    /// usually disconnected from the loss.
    StalledParameter { name: String },
    /// The loss is exactly zero, which in practice means a degenerate target
    /// or a leaking label, not a perfect model.
    ZeroLoss,
    /// The named parameter's values spread wider than [`STD_DEV_LIMIT`]
    /// standard deviations, a cheap proxy for exploding magnitudes.
    HighVariance { name: String, std_dev: f64 },
}

/// Compares each check against the previous one and reports advisory
/// [`HealthSignal`]s. The first check has no baseline and can only report
/// loss-related signals.
#[derive(Debug, Default)]
pub struct HealthValidator {
    previous: Option<ParameterSnapshot>,
}

impl HealthValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspects the current loss and parameters, logs a warning per finding,
    /// and returns all findings.
    pub fn check(&mut self, current_loss: f64, params: &ParameterSnapshot) -> Vec<HealthSignal> {
        let mut signals = Vec::new();

        if current_loss == 0.0 {
            warn!("validation loss is exactly zero");
            signals.push(HealthSignal::ZeroLoss);
        }

        for (name, values) in params.iter() {
            if let Some(previous) = self.previous.as_ref().and_then(|p| p.get(name)) {
                if bitwise_equal(previous, values) {
                    warn!(parameter = name, "parameter unchanged since previous check");
                    signals.push(HealthSignal::StalledParameter { name: name.to_string() });
                }
            }

            let std_dev = population_std_dev(values);
            if std_dev > STD_DEV_LIMIT {
                warn!(parameter = name, std_dev, "parameter values show high variance");
                signals.push(HealthSignal::HighVariance {
                    name: name.to_string(),
                    std_dev,
                });
            }
        }

        self.previous = Some(params.clone());
        signals
    }
}

fn bitwise_equal(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.to_bits() == y.to_bits())
}

fn population_std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(entries: &[(&str, &[f64])]) -> ParameterSnapshot {
        entries
            .iter()
            .map(|(name, values)| (name.to_string(), values.to_vec()))
            .collect()
    }

    #[test]
    fn test_first_check_has_no_baseline() {
        let mut validator = HealthValidator::new();
        let signals = validator.check(1.0, &snapshot(&[("weights", &[0.5, 0.5])]));
        assert!(signals.is_empty());
    }

    #[test]
    fn test_unchanged_parameter_is_flagged_on_the_second_check_only() {
        let mut validator = HealthValidator::new();
        let params = snapshot(&[("weights", &[0.5, -0.25]), ("bias", &[1.0])]);

        assert!(validator.check(1.0, &params).is_empty());

        let mut moved = params.clone();
        moved.insert("bias", vec![1.5]);
        let signals = validator.check(1.0, &moved);
        assert_eq!(
            signals,
            vec![HealthSignal::StalledParameter { name: "weights".into() }]
        );
    }

    #[test]
    fn test_signed_zeros_are_not_bitwise_identical() {
        let mut validator = HealthValidator::new();
        validator.check(1.0, &snapshot(&[("bias", &[0.0])]));
        let signals = validator.check(1.0, &snapshot(&[("bias", &[-0.0])]));
        assert!(signals.is_empty());
    }

    #[test]
    fn test_zero_loss_is_always_flagged() {
        let mut validator = HealthValidator::new();
        let signals = validator.check(0.0, &snapshot(&[]));
        assert_eq!(signals, vec![HealthSignal::ZeroLoss]);
    }

    #[test]
    fn test_wide_spread_is_flagged_with_its_std_dev() {
        let mut validator = HealthValidator::new();
        let signals = validator.check(1.0, &snapshot(&[("weights", &[0.0, 5.0])]));
        match &signals[..] {
            [HealthSignal::HighVariance { name, std_dev }] => {
                assert_eq!(name, "weights");
                assert!((std_dev - 2.5).abs() < 1e-12);
            }
            other => panic!("unexpected signals: {other:?}"),
        }
    }

    #[test]
    fn test_spread_at_the_threshold_is_not_flagged() {
        let mut validator = HealthValidator::new();
        // Population std dev of [0, 4] is exactly 2.0.
        let signals = validator.check(1.0, &snapshot(&[("weights", &[0.0, 4.0])]));
        assert!(signals.is_empty());
    }

    #[test]
    fn test_renamed_parameters_are_not_compared() {
        let mut validator = HealthValidator::new();
        validator.check(1.0, &snapshot(&[("old", &[1.0])]));
        let signals = validator.check(1.0, &snapshot(&[("new", &[1.0])]));
        assert!(signals.is_empty());
    }
}
