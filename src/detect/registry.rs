use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use super::backend::{GestureClassifier, HandLandmarker};
use super::backends::{LinearClassifier, StubClassifier, StubLandmarker};
use super::label_index;

/// Which landmark and classifier backends to build, and from what.
#[derive(Clone, Debug, PartialEq)]
pub struct BackendSettings {
    /// "stub" or "tract".
    pub landmarker: String,
    /// ONNX landmark model, required by "tract".
    pub landmark_model: Option<PathBuf>,
    /// "stub" or "linear".
    pub classifier: String,
    /// JSON weights file, required by "linear".
    pub classifier_model: Option<PathBuf>,
    /// Label the stub classifier answers with.
    pub stub_gesture: String,
    /// Confidence the stub classifier answers with.
    pub stub_confidence: f32,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            landmarker: "stub".to_string(),
            landmark_model: None,
            classifier: "stub".to_string(),
            classifier_model: None,
            stub_gesture: "five".to_string(),
            stub_confidence: 0.9,
        }
    }
}

impl BackendSettings {
    pub fn validate(&self) -> Result<()> {
        match self.landmarker.as_str() {
            "stub" => {}
            "tract" => {
                if self.landmark_model.is_none() {
                    return Err(anyhow!("tract landmarker requires a landmark model path"));
                }
            }
            other => return Err(anyhow!("unknown landmarker backend '{}'", other)),
        }
        match self.classifier.as_str() {
            "stub" => {
                label_index(&self.stub_gesture)?;
                if !(0.0..=1.0).contains(&self.stub_confidence) {
                    return Err(anyhow!("stub confidence must be within 0..=1"));
                }
            }
            "linear" => {
                if self.classifier_model.is_none() {
                    return Err(anyhow!("linear classifier requires a model path"));
                }
            }
            other => return Err(anyhow!("unknown classifier backend '{}'", other)),
        }
        Ok(())
    }
}

/// Build the configured landmarker.
pub fn build_landmarker(settings: &BackendSettings) -> Result<Box<dyn HandLandmarker>> {
    match settings.landmarker.as_str() {
        "stub" => Ok(Box::new(StubLandmarker::new())),
        #[cfg(feature = "backend-tract")]
        "tract" => {
            let path = settings
                .landmark_model
                .as_ref()
                .ok_or_else(|| anyhow!("tract landmarker requires a landmark model path"))?;
            Ok(Box::new(super::backends::TractLandmarker::new(path)?))
        }
        #[cfg(not(feature = "backend-tract"))]
        "tract" => Err(anyhow!(
            "tract landmarker requires the backend-tract feature"
        )),
        other => Err(anyhow!("unknown landmarker backend '{}'", other)),
    }
}

/// Build the configured classifier, shared read-only for the process lifetime.
pub fn build_classifier(settings: &BackendSettings) -> Result<Arc<dyn GestureClassifier>> {
    match settings.classifier.as_str() {
        "stub" => Ok(Arc::new(StubClassifier::fixed(
            label_index(&settings.stub_gesture)?,
            settings.stub_confidence,
        ))),
        "linear" => {
            let path = settings
                .classifier_model
                .as_ref()
                .ok_or_else(|| anyhow!("linear classifier requires a model path"))?;
            Ok(Arc::new(LinearClassifier::load(path)?))
        }
        other => Err(anyhow!("unknown classifier backend '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_build_stub_backends() -> Result<()> {
        let settings = BackendSettings::default();
        settings.validate()?;
        assert_eq!(build_landmarker(&settings)?.name(), "stub");
        assert_eq!(build_classifier(&settings)?.name(), "stub");
        Ok(())
    }

    #[test]
    fn unknown_backend_rejected() {
        let settings = BackendSettings {
            classifier: "svm".to_string(),
            ..BackendSettings::default()
        };
        assert!(settings.validate().is_err());
        assert!(build_classifier(&settings).is_err());
    }

    #[test]
    fn stub_gesture_must_be_a_known_label() {
        let settings = BackendSettings {
            stub_gesture: "wave".to_string(),
            ..BackendSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn model_backends_need_paths() {
        let settings = BackendSettings {
            classifier: "linear".to_string(),
            ..BackendSettings::default()
        };
        assert!(settings.validate().is_err());
    }
}
