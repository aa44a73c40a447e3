use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::detect::backend::GestureClassifier;
use crate::detect::features::{HandFeatures, FEATURE_LEN};
use crate::detect::result::Classification;
use crate::detect::GESTURE_LABELS;

/// One-vs-rest linear classifier over hand features.
///
/// Model file (JSON):
///
/// ```json
/// { "weights": [[w0, ..., w39], ...], "intercepts": [b0, ...] }
/// ```
///
/// One weight row and one intercept per class, rows in label-table order.
/// Confidence is the softmax of the decision scores at the winning class.
pub struct LinearClassifier {
    weights: Vec<[f32; FEATURE_LEN]>,
    intercepts: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct LinearModelFile {
    weights: Vec<Vec<f32>>,
    intercepts: Vec<f32>,
}

impl LinearClassifier {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read classifier model {}", path.display()))?;
        let file: LinearModelFile = serde_json::from_str(&raw)
            .with_context(|| format!("parse classifier model {}", path.display()))?;
        Self::new(file.weights, file.intercepts)
    }

    pub fn new(weights: Vec<Vec<f32>>, intercepts: Vec<f32>) -> Result<Self> {
        if weights.is_empty() {
            return Err(anyhow!("classifier model has no classes"));
        }
        if weights.len() > GESTURE_LABELS.len() {
            return Err(anyhow!(
                "classifier model has {} classes, only {} gesture labels are known",
                weights.len(),
                GESTURE_LABELS.len()
            ));
        }
        if weights.len() != intercepts.len() {
            return Err(anyhow!(
                "classifier model has {} weight rows but {} intercepts",
                weights.len(),
                intercepts.len()
            ));
        }
        let weights = weights
            .into_iter()
            .enumerate()
            .map(|(class, row)| {
                <[f32; FEATURE_LEN]>::try_from(row.as_slice()).map_err(|_| {
                    anyhow!(
                        "classifier row {} has {} weights, expected {}",
                        class,
                        row.len(),
                        FEATURE_LEN
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            weights,
            intercepts,
        })
    }

    pub fn class_count(&self) -> usize {
        self.weights.len()
    }

    fn scores(&self, features: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .zip(&self.intercepts)
            .map(|(row, bias)| row.iter().zip(features).map(|(w, x)| w * x).sum::<f32>() + bias)
            .collect()
    }
}

impl GestureClassifier for LinearClassifier {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn classify(&self, features: &HandFeatures) -> Result<Classification> {
        let scores = self.scores(features.as_slice());
        let (label_index, best) = scores
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |acc, (i, s)| if s > acc.1 { (i, s) } else { acc });
        if !best.is_finite() {
            return Err(anyhow!("classifier produced non-finite scores"));
        }
        let total: f32 = scores.iter().map(|s| (s - best).exp()).sum();
        Ok(Classification {
            label_index,
            confidence: 1.0 / total,
        })
    }
}
