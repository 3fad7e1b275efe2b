//! Score vectors, composite weights and rank direction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

/// Metric name for the Fourier magnitude similarity.
pub const FREQUENCY: &str = "frequency";
/// Metric name for the Sobel edge similarity.
pub const EDGE: &str = "edge";
/// Metric name for the Gram matrix similarity.
pub const TEXTURE: &str = "texture";
/// Name under which the composite is reported when it is the rank metric.
pub const COMPOSITE: &str = "composite";

/// Below this total the supplied weights are treated as all zero.
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// Weights for the composite score.
///
/// Keys missing from a serialized weight map default to zero; the legacy
/// short names `fft` and `gram` are accepted as aliases. When no weights are
/// supplied at all, [`ScoreWeights::default`] applies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ScoreWeights {
    #[serde(default, alias = "fft")]
    pub frequency: f64,

    #[serde(default)]
    pub edge: f64,

    #[serde(default, alias = "gram")]
    pub texture: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            frequency: 0.4,
            edge: 0.3,
            texture: 0.3,
        }
    }
}

impl ScoreWeights {
    pub fn new(frequency: f64, edge: f64, texture: f64) -> Self {
        Self {
            frequency,
            edge,
            texture,
        }
    }

    /// All weights zero.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Build weights from `(key, value)` pairs; absent keys stay at zero.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut weights = Self::zero();
        for (key, value) in pairs {
            match key.trim() {
                FREQUENCY | "fft" => weights.frequency = value,
                EDGE => weights.edge = value,
                TEXTURE | "gram" => weights.texture = value,
                other => return Err(ConfigError::UnknownWeight(other.to_string())),
            }
        }
        weights.validate()?;
        Ok(weights)
    }

    /// Reject negative, NaN or infinite weights.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            (FREQUENCY, self.frequency),
            (EDGE, self.edge),
            (TEXTURE, self.texture),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeight { name, value });
            }
        }
        Ok(())
    }

    /// Weights re-normalized to sum to one, as `(frequency, edge, texture)`.
    ///
    /// When the total is below [`WEIGHT_EPSILON`] every metric gets 1/3.
    pub fn normalized(&self) -> (f64, f64, f64) {
        let total = self.frequency + self.edge + self.texture;
        if !total.is_finite() || total < WEIGHT_EPSILON {
            let third = 1.0 / 3.0;
            return (third, third, third);
        }
        (
            self.frequency / total,
            self.edge / total,
            self.texture / total,
        )
    }
}

/// Per-metric similarities in `[0, 1]` plus their weighted composite.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreVector {
    pub metrics: BTreeMap<String, f64>,
    pub composite: f64,
}

impl ScoreVector {
    /// Combine the three similarities with the given weights.
    pub fn from_similarities(
        frequency: f64,
        edge: f64,
        texture: f64,
        weights: &ScoreWeights,
    ) -> Self {
        let (wf, we, wt) = weights.normalized();
        let composite = (frequency * wf + edge * we + texture * wt).clamp(0.0, 1.0);

        let mut metrics = BTreeMap::new();
        metrics.insert(FREQUENCY.to_string(), frequency);
        metrics.insert(EDGE.to_string(), edge);
        metrics.insert(TEXTURE.to_string(), texture);

        Self { metrics, composite }
    }

    pub fn get(&self, metric: &str) -> Option<f64> {
        self.metrics.get(metric).copied()
    }

    pub fn frequency(&self) -> f64 {
        self.get(FREQUENCY).unwrap_or_default()
    }

    pub fn edge(&self) -> f64 {
        self.get(EDGE).unwrap_or_default()
    }

    pub fn texture(&self) -> f64 {
        self.get(TEXTURE).unwrap_or_default()
    }
}

/// Which way a rank metric improves.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RankDirection {
    /// Distances: smaller is closer to the target.
    LowerIsBetter,

    /// Similarities: larger is closer to the target.
    HigherIsBetter,
}

impl RankDirection {
    /// Strict improvement test; equal values never improve.
    pub fn improves(self, candidate: f64, current: f64) -> bool {
        match self {
            RankDirection::LowerIsBetter => candidate < current,
            RankDirection::HigherIsBetter => candidate > current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights() {
        let w = ScoreWeights::default();
        assert_eq!(w.frequency, 0.4);
        assert_eq!(w.edge, 0.3);
        assert_eq!(w.texture, 0.3);
    }

    #[test]
    fn test_missing_keys_default_to_zero() {
        let w: ScoreWeights = serde_json::from_str(r#"{"edge": 2.0}"#).expect("deserialize");
        assert_eq!(w, ScoreWeights::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn test_aliases_accepted() {
        let w: ScoreWeights =
            serde_json::from_str(r#"{"fft": 0.5, "edge": 0.25, "gram": 0.25}"#).expect("deserialize");
        assert_eq!(w, ScoreWeights::new(0.5, 0.25, 0.25));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let res: Result<ScoreWeights, _> = serde_json::from_str(r#"{"color": 1.0}"#);
        assert!(res.is_err());

        let err = ScoreWeights::from_pairs([("color", 1.0)]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownWeight(k) if k == "color"));
    }

    #[test]
    fn test_negative_and_nan_rejected() {
        assert!(ScoreWeights::new(-0.1, 0.5, 0.5).validate().is_err());
        assert!(ScoreWeights::new(f64::NAN, 0.5, 0.5).validate().is_err());
        assert!(ScoreWeights::new(0.0, f64::INFINITY, 0.5).validate().is_err());
        assert!(ScoreWeights::zero().validate().is_ok());
    }

    #[test]
    fn test_normalized_sums_to_one() {
        let (f, e, t) = ScoreWeights::new(2.0, 1.0, 1.0).normalized();
        assert!((f - 0.5).abs() < 1e-12);
        assert!((e - 0.25).abs() < 1e-12);
        assert!((t - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_all_zero_weights_fall_back_to_thirds() {
        let (f, e, t) = ScoreWeights::zero().normalized();
        assert_eq!(f, 1.0 / 3.0);
        assert_eq!(e, 1.0 / 3.0);
        assert_eq!(t, 1.0 / 3.0);

        let v = ScoreVector::from_similarities(0.9, 0.6, 0.3, &ScoreWeights::zero());
        assert!((v.composite - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_zero_weight_metric_does_not_move_composite() {
        let w = ScoreWeights::new(1.0, 0.0, 1.0);
        let a = ScoreVector::from_similarities(0.8, 0.0, 0.4, &w);
        let b = ScoreVector::from_similarities(0.8, 1.0, 0.4, &w);
        assert_eq!(a.composite, b.composite);
        assert!((a.composite - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_rank_direction_is_strict() {
        assert!(RankDirection::LowerIsBetter.improves(0.1, 0.2));
        assert!(!RankDirection::LowerIsBetter.improves(0.2, 0.2));
        assert!(RankDirection::HigherIsBetter.improves(0.3, 0.2));
        assert!(!RankDirection::HigherIsBetter.improves(0.2, 0.2));
    }
}
