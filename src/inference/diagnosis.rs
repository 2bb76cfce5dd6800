//! Visual diagnosis predictor: leaf photo in, symptom label out.

use std::{collections::BTreeMap, path::Path};

use image::imageops::FilterType;
use tract_onnx::prelude::*;

use super::{unavailable, InferenceError, LazyArtifact, LoadStatus};

// ---

/// Square input resolution expected by the classifier.
pub const IMG_SIZE: u32 = 224;

/// Decoded classifier output.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnosis {
    // ---
    pub label: String,
    pub confidence: f64,
    /// Raw per-label scores. Not renormalized.
    pub scores: BTreeMap<String, f64>,
}

/// Decode image bytes into an NHWC `[1, 224, 224, 3]` row scaled to `[0, 1]`.
pub fn preprocess(image_bytes: &[u8]) -> Result<Vec<f32>, InferenceError> {
    // ---
    let rgb = image::load_from_memory(image_bytes)?.to_rgb8();
    let resized = image::imageops::resize(&rgb, IMG_SIZE, IMG_SIZE, FilterType::CatmullRom);
    Ok(resized
        .into_raw()
        .into_iter()
        .map(|px| f32::from(px) / 255.0)
        .collect())
}

/// Index-to-label table, built from a `{label: index}` JSON document.
#[derive(Debug, Clone)]
pub struct LabelIndex {
    labels: Vec<String>,
}

impl LabelIndex {
    // ---
    /// Build from `{label: index}` pairs. Indices must cover `0..n` exactly.
    pub fn from_map(map: BTreeMap<String, usize>) -> Result<Self, InferenceError> {
        // ---
        let mut slots: Vec<Option<String>> = vec![None; map.len()];
        for (label, index) in map {
            let Some(slot) = slots.get_mut(index) else {
                return Err(InferenceError::ModelUnavailable(format!(
                    "label '{label}' has out-of-range index {index}"
                )));
            };
            if let Some(existing) = slot {
                return Err(InferenceError::ModelUnavailable(format!(
                    "label index {index} used by both '{existing}' and '{label}'"
                )));
            }
            *slot = Some(label);
        }
        let labels = slots.into_iter().flatten().collect::<Vec<_>>();
        if labels.is_empty() {
            return Err(InferenceError::ModelUnavailable(
                "label map is empty".to_string(),
            ));
        }
        Ok(LabelIndex { labels })
    }

    pub fn from_path(path: &Path) -> Result<Self, InferenceError> {
        // ---
        let raw = std::fs::read_to_string(path)
            .map_err(|e| unavailable(&format!("reading {}", path.display()), e))?;
        let map: BTreeMap<String, usize> = serde_json::from_str(&raw)
            .map_err(|e| unavailable(&format!("parsing {}", path.display()), e))?;
        Self::from_map(map)
    }

    pub(crate) fn len(&self) -> usize {
        self.labels.len()
    }

    /// Turn one row of raw scores into label, confidence and score map.
    pub fn decode(&self, raw: &[f32]) -> Result<Diagnosis, InferenceError> {
        // ---
        if raw.len() != self.labels.len() {
            return Err(InferenceError::Inference(format!(
                "classifier returned {} scores for {} labels",
                raw.len(),
                self.labels.len()
            )));
        }

        let (best, top) = raw
            .iter()
            .copied()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |acc, (i, s)| {
                if s > acc.1 {
                    (i, s)
                } else {
                    acc
                }
            });

        let scores = self
            .labels
            .iter()
            .cloned()
            .zip(raw.iter().map(|s| f64::from(*s)))
            .collect();

        Ok(Diagnosis {
            label: self.labels[best].clone(),
            confidence: f64::from(top).clamp(0.0, 1.0),
            scores,
        })
    }
}

/// A loaded image classifier: preprocessed pixels in, one score per label out.
pub trait Classifier: Send + Sync {
    fn classify(&self, pixels: &[f32]) -> Result<Vec<f32>, InferenceError>;
}

/// Image classifier exported to ONNX (NHWC input) and executed with tract.
pub struct OnnxClassifier {
    plan: TypedRunnableModel<TypedModel>,
}

impl OnnxClassifier {
    // ---
    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        // ---
        let side = IMG_SIZE as usize;
        let what = format!("loading {}", path.display());
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| unavailable(&what, e))?
            .with_input_fact(0, f32::fact([1, side, side, 3]).into())
            .map_err(|e| unavailable(&what, e))?
            .into_optimized()
            .map_err(|e| unavailable(&what, e))?
            .into_runnable()
            .map_err(|e| unavailable(&what, e))?;
        Ok(OnnxClassifier { plan })
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, pixels: &[f32]) -> Result<Vec<f32>, InferenceError> {
        // ---
        let side = IMG_SIZE as usize;
        let input = Tensor::from_shape(&[1, side, side, 3], pixels)
            .map_err(|e| InferenceError::Inference(format!("building input tensor: {e}")))?;

        // Outputs hold non-Send values; copy the scores out before returning.
        let outputs = self
            .plan
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::Inference(e.to_string()))?;
        let first = outputs
            .first()
            .ok_or_else(|| InferenceError::Inference("model produced no outputs".to_string()))?;
        let view = first
            .to_array_view::<f32>()
            .map_err(|e| InferenceError::Inference(e.to_string()))?;
        Ok(view.iter().copied().collect())
    }
}

pub struct VisionArtifacts {
    // ---
    pub model: Box<dyn Classifier>,
    pub labels: LabelIndex,
}

impl VisionArtifacts {
    // ---
    pub fn predict(&self, image_bytes: &[u8]) -> Result<Diagnosis, InferenceError> {
        let pixels = preprocess(image_bytes)?;
        let raw = self.model.classify(&pixels)?;
        self.labels.decode(&raw)
    }
}

/// Lazily loaded leaf classifier, shared across requests.
pub struct DiagnosisPredictor {
    artifacts: LazyArtifact<VisionArtifacts>,
}

impl DiagnosisPredictor {
    // ---
    pub fn from_paths(model_path: &Path, label_map_path: &Path) -> Self {
        // ---
        let model_path = model_path.to_path_buf();
        let label_map_path = label_map_path.to_path_buf();
        Self::from_loader(move || {
            let labels = LabelIndex::from_path(&label_map_path)?;
            let model = OnnxClassifier::load(&model_path)?;
            tracing::debug!("Diagnosis model ready with {} labels", labels.len());
            Ok(VisionArtifacts {
                model: Box::new(model),
                labels,
            })
        })
    }

    pub fn from_loader<F>(loader: F) -> Self
    where
        F: Fn() -> Result<VisionArtifacts, InferenceError> + Send + Sync + 'static,
    {
        DiagnosisPredictor {
            artifacts: LazyArtifact::new("diagnosis model", loader),
        }
    }

    pub fn status(&self) -> LoadStatus {
        self.artifacts.status()
    }

    pub fn last_error(&self) -> Option<String> {
        self.artifacts.last_error()
    }

    /// Make sure the model is loaded, without running a prediction.
    pub async fn ensure_loaded(&self) -> bool {
        self.artifacts.get().await.is_ok()
    }

    pub async fn predict(&self, image_bytes: Vec<u8>) -> Result<Diagnosis, InferenceError> {
        // ---
        let artifacts = self.artifacts.get().await?;
        tokio::task::spawn_blocking(move || artifacts.predict(&image_bytes))
            .await
            .map_err(|e| InferenceError::Inference(format!("diagnosis task failed: {e}")))?
    }
}
