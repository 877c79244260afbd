use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::Path as FsPath;
use thiserror::Error;

use crate::models::GeoPoint;

/// Per-point scoring failure; callers decide what it contributes
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringUnavailable {
    #[error("point {0} has non-finite coordinates")]
    NonFiniteInput(GeoPoint),

    #[error("scaler produced a non-finite feature for {0}")]
    NonFiniteFeature(GeoPoint),

    #[error("density is not a number at {0}")]
    NonFiniteDensity(GeoPoint),
}

/// Errors raised while loading the model artifact
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid model artifact: {0}")]
    Invalid(String),
}

/// Returns a non-negative risk density for a point
pub trait RiskScorer: Send + Sync {
    fn score(&self, point: GeoPoint) -> Result<f64, ScoringUnavailable>;
}

/// Which feature space the density is evaluated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSpace {
    /// Standardize the coordinate with the fitted scaler first
    #[default]
    Scaled,
    /// Evaluate on the raw (latitude, longitude) pair; the scaler is still applied
    /// as a sanity check on the input but its output is discarded
    Raw,
}

/// Serialized form of the fitted scaler + mixture, features ordered (latitude, longitude)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub scaler: ScalerArtifact,
    pub gmm: MixtureArtifact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerArtifact {
    pub mean: [f64; 2],
    pub scale: [f64; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixtureArtifact {
    pub weights: Vec<f64>,
    pub means: Vec<[f64; 2]>,
    pub covariance: CovarianceArtifact,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum CovarianceArtifact {
    Full(Vec<[[f64; 2]; 2]>),
    Tied([[f64; 2]; 2]),
    Diag(Vec<[f64; 2]>),
    Spherical(Vec<f64>),
}

impl CovarianceArtifact {
    fn expand(&self, n_components: usize) -> Result<Vec<[[f64; 2]; 2]>, ModelError> {
        let matrices: Vec<[[f64; 2]; 2]> = match self {
            CovarianceArtifact::Full(m) => m.clone(),
            CovarianceArtifact::Tied(m) => vec![*m; n_components],
            CovarianceArtifact::Diag(d) => d.iter().map(|v| [[v[0], 0.0], [0.0, v[1]]]).collect(),
            CovarianceArtifact::Spherical(s) => s.iter().map(|v| [[*v, 0.0], [0.0, *v]]).collect(),
        };

        if matrices.len() != n_components {
            return Err(ModelError::Invalid(format!(
                "expected {} covariances, found {}",
                n_components,
                matrices.len()
            )));
        }
        Ok(matrices)
    }
}

#[derive(Debug, Clone, Copy)]
struct Scaler {
    mean: [f64; 2],
    scale: [f64; 2],
}

impl Scaler {
    fn transform(&self, x: [f64; 2]) -> [f64; 2] {
        [
            (x[0] - self.mean[0]) / self.scale[0],
            (x[1] - self.mean[1]) / self.scale[1],
        ]
    }
}

/// One Gaussian component with its covariance pre-factored
#[derive(Debug, Clone, Copy)]
struct Component {
    log_weight: f64,
    mean: [f64; 2],
    // Lower Cholesky factor [[l11, 0], [l21, l22]]
    l11: f64,
    l21: f64,
    l22: f64,
    log_norm: f64,
}

impl Component {
    fn new(weight: f64, mean: [f64; 2], cov: [[f64; 2]; 2], idx: usize) -> Result<Self, ModelError> {
        let [[a, b], [c, d]] = cov;
        if ![a, b, c, d].iter().all(|v| v.is_finite()) {
            return Err(ModelError::Invalid(format!("component {} covariance is not finite", idx)));
        }
        if (b - c).abs() > 1e-9 * a.abs().max(d.abs()).max(1.0) {
            return Err(ModelError::Invalid(format!("component {} covariance is not symmetric", idx)));
        }
        if a <= 0.0 {
            return Err(ModelError::Invalid(format!(
                "component {} covariance is not positive definite",
                idx
            )));
        }

        let l11 = a.sqrt();
        let l21 = b / l11;
        let rem = d - l21 * l21;
        if rem <= 0.0 {
            return Err(ModelError::Invalid(format!(
                "component {} covariance is not positive definite",
                idx
            )));
        }
        let l22 = rem.sqrt();

        // -0.5 * (k ln 2pi + ln|Sigma|) with k = 2 and ln|Sigma| = 2 (ln l11 + ln l22)
        let log_norm = -(2.0 * PI).ln() - l11.ln() - l22.ln();

        Ok(Self {
            log_weight: weight.ln(),
            mean,
            l11,
            l21,
            l22,
            log_norm,
        })
    }

    #[inline]
    fn weighted_log_pdf(&self, x: [f64; 2]) -> f64 {
        let r0 = x[0] - self.mean[0];
        let r1 = x[1] - self.mean[1];
        let y0 = r0 / self.l11;
        let y1 = (r1 - self.l21 * y0) / self.l22;
        self.log_weight + self.log_norm - 0.5 * (y0 * y0 + y1 * y1)
    }
}

/// Fitted Gaussian mixture density plus its feature scaler
///
/// Built once at startup and shared read-only between workers.
#[derive(Debug, Clone)]
pub struct RiskModel {
    scaler: Scaler,
    components: Vec<Component>,
    input_space: InputSpace,
}

impl RiskModel {
    /// Load and validate a JSON artifact from disk
    pub fn load<P: AsRef<FsPath>>(path: P, input_space: InputSpace) -> Result<Self, ModelError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let artifact: ModelArtifact = serde_json::from_str(&raw)?;
        Self::from_artifact(&artifact, input_space)
    }

    pub fn from_artifact(artifact: &ModelArtifact, input_space: InputSpace) -> Result<Self, ModelError> {
        let gmm = &artifact.gmm;
        let n = gmm.weights.len();

        if n == 0 {
            return Err(ModelError::Invalid("mixture has no components".into()));
        }
        if gmm.means.len() != n {
            return Err(ModelError::Invalid(format!(
                "expected {} means, found {}",
                n,
                gmm.means.len()
            )));
        }
        if gmm.weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
            return Err(ModelError::Invalid("weights must be finite and positive".into()));
        }
        if gmm.means.iter().flatten().any(|m| !m.is_finite()) {
            return Err(ModelError::Invalid("means must be finite".into()));
        }

        let scaler = &artifact.scaler;
        if scaler.mean.iter().chain(&scaler.scale).any(|v| !v.is_finite()) {
            return Err(ModelError::Invalid("scaler parameters must be finite".into()));
        }
        // Zero-variance features are left unscaled
        let scale = scaler.scale.map(|s| if s == 0.0 { 1.0 } else { s });

        let total: f64 = gmm.weights.iter().sum();
        let covariances = gmm.covariance.expand(n)?;

        let components = gmm
            .weights
            .iter()
            .zip(&gmm.means)
            .zip(covariances)
            .enumerate()
            .map(|(idx, ((w, mean), cov))| Component::new(w / total, *mean, cov, idx))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            scaler: Scaler {
                mean: scaler.mean,
                scale,
            },
            components,
            input_space,
        })
    }

    pub fn n_components(&self) -> usize {
        self.components.len()
    }

    pub fn input_space(&self) -> InputSpace {
        self.input_space
    }

    /// Log-likelihood of the mixture at a point
    pub fn log_density(&self, point: GeoPoint) -> Result<f64, ScoringUnavailable> {
        if !point.latitude.is_finite() || !point.longitude.is_finite() {
            return Err(ScoringUnavailable::NonFiniteInput(point));
        }

        let raw = [point.latitude, point.longitude];
        let scaled = self.scaler.transform(raw);
        if !scaled.iter().all(|v| v.is_finite()) {
            return Err(ScoringUnavailable::NonFiniteFeature(point));
        }

        let x = match self.input_space {
            InputSpace::Scaled => scaled,
            InputSpace::Raw => raw,
        };

        let log_density = log_sum_exp(self.components.iter().map(|c| c.weighted_log_pdf(x)));
        if log_density.is_nan() || log_density == f64::INFINITY {
            return Err(ScoringUnavailable::NonFiniteDensity(point));
        }
        Ok(log_density)
    }
}

impl RiskScorer for RiskModel {
    fn score(&self, point: GeoPoint) -> Result<f64, ScoringUnavailable> {
        let density = self.log_density(point)?.exp();
        if !density.is_finite() {
            return Err(ScoringUnavailable::NonFiniteDensity(point));
        }
        Ok(density)
    }
}

fn log_sum_exp<I: Iterator<Item = f64> + Clone>(values: I) -> f64 {
    let max = values.clone().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return max;
    }
    max + values.map(|v| (v - max).exp()).sum::<f64>().ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_component(covariance: CovarianceArtifact) -> ModelArtifact {
        ModelArtifact {
            scaler: ScalerArtifact {
                mean: [0.0, 0.0],
                scale: [1.0, 1.0],
            },
            gmm: MixtureArtifact {
                weights: vec![1.0],
                means: vec![[0.0, 0.0]],
                covariance,
            },
        }
    }

    #[test]
    fn test_standard_normal_peak() {
        let model = RiskModel::from_artifact(
            &single_component(CovarianceArtifact::Full(vec![[[1.0, 0.0], [0.0, 1.0]]])),
            InputSpace::Scaled,
        )
        .unwrap();

        let density = model.score(GeoPoint::new(0.0, 0.0)).unwrap();
        assert!((density - 1.0 / (2.0 * PI)).abs() < 1e-12);

        // One unit away along an axis: exp(-0.5) / 2pi
        let density = model.score(GeoPoint::new(1.0, 0.0)).unwrap();
        assert!((density - (-0.5f64).exp() / (2.0 * PI)).abs() < 1e-12);
    }

    #[test]
    fn test_correlated_covariance() {
        // Sigma = [[2, 1], [1, 2]], |Sigma| = 3, Sigma^-1 = [[2, -1], [-1, 2]] / 3
        let model = RiskModel::from_artifact(
            &single_component(CovarianceArtifact::Full(vec![[[2.0, 1.0], [1.0, 2.0]]])),
            InputSpace::Scaled,
        )
        .unwrap();

        let x: [f64; 2] = [1.0, -1.0];
        let maha = (2.0 * x[0] * x[0] - 2.0 * x[0] * x[1] + 2.0 * x[1] * x[1]) / 3.0;
        let expected = (-0.5 * maha).exp() / (2.0 * PI * 3.0f64.sqrt());

        let density = model.score(GeoPoint::new(x[0], x[1])).unwrap();
        assert!((density - expected).abs() < 1e-12);
    }

    #[test]
    fn test_covariance_shapes_agree() {
        let full = RiskModel::from_artifact(
            &single_component(CovarianceArtifact::Full(vec![[[0.5, 0.0], [0.0, 0.5]]])),
            InputSpace::Scaled,
        )
        .unwrap();
        let diag = RiskModel::from_artifact(
            &single_component(CovarianceArtifact::Diag(vec![[0.5, 0.5]])),
            InputSpace::Scaled,
        )
        .unwrap();
        let spherical = RiskModel::from_artifact(
            &single_component(CovarianceArtifact::Spherical(vec![0.5])),
            InputSpace::Scaled,
        )
        .unwrap();
        let tied = RiskModel::from_artifact(
            &single_component(CovarianceArtifact::Tied([[0.5, 0.0], [0.0, 0.5]])),
            InputSpace::Scaled,
        )
        .unwrap();

        let point = GeoPoint::new(0.3, -0.7);
        let expected = full.score(point).unwrap();
        for model in [&diag, &spherical, &tied] {
            assert!((model.score(point).unwrap() - expected).abs() < 1e-12);
        }
    }

    #[test]
    fn test_scaler_applied_before_density() {
        let mut artifact =
            single_component(CovarianceArtifact::Spherical(vec![1.0]));
        artifact.scaler = ScalerArtifact {
            mean: [12.95, 77.60],
            scale: [0.05, 0.05],
        };

        let scaled = RiskModel::from_artifact(&artifact, InputSpace::Scaled).unwrap();
        let at_mean = scaled.score(GeoPoint::new(12.95, 77.60)).unwrap();
        assert!((at_mean - 1.0 / (2.0 * PI)).abs() < 1e-12);

        // In raw space the same point is far from the component mean at the origin
        let raw = RiskModel::from_artifact(&artifact, InputSpace::Raw).unwrap();
        assert!(raw.score(GeoPoint::new(12.95, 77.60)).unwrap() < 1e-100);
    }

    #[test]
    fn test_zero_scale_is_left_unscaled() {
        let mut artifact = single_component(CovarianceArtifact::Spherical(vec![1.0]));
        artifact.scaler.scale = [0.0, 1.0];

        let model = RiskModel::from_artifact(&artifact, InputSpace::Scaled).unwrap();
        assert!(model.score(GeoPoint::new(0.0, 0.0)).is_ok());
    }

    #[test]
    fn test_mixture_weights_are_normalized() {
        let artifact = ModelArtifact {
            scaler: ScalerArtifact {
                mean: [0.0, 0.0],
                scale: [1.0, 1.0],
            },
            gmm: MixtureArtifact {
                weights: vec![2.0, 2.0],
                means: vec![[0.0, 0.0], [0.0, 0.0]],
                covariance: CovarianceArtifact::Spherical(vec![1.0, 1.0]),
            },
        };

        let model = RiskModel::from_artifact(&artifact, InputSpace::Scaled).unwrap();
        assert_eq!(model.n_components(), 2);
        let density = model.score(GeoPoint::new(0.0, 0.0)).unwrap();
        assert!((density - 1.0 / (2.0 * PI)).abs() < 1e-12);
    }

    #[test]
    fn test_far_point_scores_zero() {
        let model = RiskModel::from_artifact(
            &single_component(CovarianceArtifact::Spherical(vec![1e-6])),
            InputSpace::Raw,
        )
        .unwrap();

        assert_eq!(model.score(GeoPoint::new(80.0, 170.0)).unwrap(), 0.0);
    }

    #[test]
    fn test_non_finite_input_is_unavailable() {
        let model = RiskModel::from_artifact(
            &single_component(CovarianceArtifact::Spherical(vec![1.0])),
            InputSpace::Scaled,
        )
        .unwrap();

        assert!(matches!(
            model.score(GeoPoint::new(f64::NAN, 0.0)),
            Err(ScoringUnavailable::NonFiniteInput(_))
        ));
        assert!(matches!(
            model.score(GeoPoint::new(0.0, f64::INFINITY)),
            Err(ScoringUnavailable::NonFiniteInput(_))
        ));
    }

    #[test]
    fn test_rejects_invalid_artifacts() {
        let not_pd = single_component(CovarianceArtifact::Full(vec![[[1.0, 2.0], [2.0, 1.0]]]));
        assert!(matches!(
            RiskModel::from_artifact(&not_pd, InputSpace::Scaled),
            Err(ModelError::Invalid(_))
        ));

        let asymmetric = single_component(CovarianceArtifact::Full(vec![[[1.0, 0.5], [0.0, 1.0]]]));
        assert!(RiskModel::from_artifact(&asymmetric, InputSpace::Scaled).is_err());

        let mut empty = single_component(CovarianceArtifact::Spherical(vec![]));
        empty.gmm.weights.clear();
        empty.gmm.means.clear();
        assert!(RiskModel::from_artifact(&empty, InputSpace::Scaled).is_err());

        let mismatched = single_component(CovarianceArtifact::Spherical(vec![1.0, 1.0]));
        assert!(RiskModel::from_artifact(&mismatched, InputSpace::Scaled).is_err());

        let mut negative_weight = single_component(CovarianceArtifact::Spherical(vec![1.0]));
        negative_weight.gmm.weights = vec![-1.0];
        assert!(RiskModel::from_artifact(&negative_weight, InputSpace::Scaled).is_err());
    }

    #[test]
    fn test_artifact_json_format() {
        let json = r#"{
            "scaler": {"mean": [12.95, 77.6], "scale": [0.02, 0.02]},
            "gmm": {
                "weights": [0.6, 0.4],
                "means": [[0.5, -0.5], [-1.0, 1.0]],
                "covariance": {"type": "diag", "values": [[1.0, 0.5], [0.3, 0.3]]}
            }
        }"#;

        let artifact: ModelArtifact = serde_json::from_str(json).unwrap();
        let model = RiskModel::from_artifact(&artifact, InputSpace::Scaled).unwrap();
        assert_eq!(model.n_components(), 2);
        assert!(model.score(GeoPoint::new(12.96, 77.59)).unwrap() > 0.0);
    }

    #[test]
    fn test_load_missing_file() {
        let err = RiskModel::load("/nonexistent/risk_model.json", InputSpace::Scaled).unwrap_err();
        assert!(matches!(err, ModelError::Io(_)));
    }
}
