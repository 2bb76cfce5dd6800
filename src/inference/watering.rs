//! Tabular watering predictor.
//!
//! Feature vector layout (one row):
//!
//! | column | source |
//! |---|---|
//! | 0 | `soil_moisture` |
//! | 1 | `temperature` |
//! | 2 | `air_humidity` |
//! | 3 | `light` |
//! | 4 | `last_watered_days` |
//! | 5 | `ml_prediction_prev` |
//! | 6.. | one-hot `plant_type_<category>`, in encoder order |
//!
//! The regression model returns `(water_given_ml, next_watering_days)`.

use std::path::Path;

use serde::Deserialize;
use tract_onnx::prelude::*;

use super::{unavailable, InferenceError, LazyArtifact, LoadStatus};
use crate::models::PredictRequest;

// ---

/// Number of numeric columns ahead of the one-hot block.
pub const NUMERIC_FEATURES: usize = 6;

/// One-hot encoder for the `plant_type` column.
#[derive(Debug, Clone, Deserialize)]
pub struct PlantTypeEncoder {
    // ---
    #[serde(default = "default_feature_name")]
    feature: String,
    categories: Vec<String>,
}

fn default_feature_name() -> String {
    "plant_type".to_string()
}

impl PlantTypeEncoder {
    // ---
    #[cfg(test)]
    pub fn new(categories: Vec<String>) -> Self {
        PlantTypeEncoder {
            feature: default_feature_name(),
            categories,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, InferenceError> {
        // ---
        let raw = std::fs::read_to_string(path)
            .map_err(|e| unavailable(&format!("reading {}", path.display()), e))?;
        let encoder: PlantTypeEncoder = serde_json::from_str(&raw)
            .map_err(|e| unavailable(&format!("parsing {}", path.display()), e))?;
        if encoder.categories.is_empty() {
            return Err(InferenceError::ModelUnavailable(format!(
                "{} lists no categories",
                path.display()
            )));
        }
        Ok(encoder)
    }

    pub fn width(&self) -> usize {
        self.categories.len()
    }

    /// Output column names, e.g. `plant_type_tomato`.
    pub fn feature_names(&self) -> Vec<String> {
        // ---
        self.categories
            .iter()
            .map(|c| format!("{}_{}", self.feature, c))
            .collect()
    }

    pub fn encode(&self, plant_type: &str) -> Result<Vec<f32>, InferenceError> {
        // ---
        let hot = self
            .categories
            .iter()
            .position(|c| c == plant_type)
            .ok_or_else(|| InferenceError::UnknownCategory(plant_type.to_string()))?;

        let mut row = vec![0.0; self.categories.len()];
        row[hot] = 1.0;
        Ok(row)
    }
}

/// A loaded regression model: one feature row in, raw outputs out.
pub trait Regressor: Send + Sync {
    fn predict_row(&self, features: &[f32]) -> Result<Vec<f32>, InferenceError>;
}

/// Regression model exported to ONNX and executed with tract.
pub struct OnnxRegressor {
    // ---
    plan: TypedRunnableModel<TypedModel>,
    width: usize,
}

impl OnnxRegressor {
    // ---
    pub fn load(path: &Path, width: usize) -> Result<Self, InferenceError> {
        // ---
        let what = format!("loading {}", path.display());
        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .map_err(|e| unavailable(&what, e))?
            .with_input_fact(0, f32::fact([1, width]).into())
            .map_err(|e| unavailable(&what, e))?
            .into_optimized()
            .map_err(|e| unavailable(&what, e))?
            .into_runnable()
            .map_err(|e| unavailable(&what, e))?;

        Ok(OnnxRegressor { plan, width })
    }
}

impl Regressor for OnnxRegressor {
    fn predict_row(&self, features: &[f32]) -> Result<Vec<f32>, InferenceError> {
        // ---
        let input = Tensor::from_shape(&[1, self.width], features)
            .map_err(|e| InferenceError::Inference(format!("building input tensor: {e}")))?;
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

/// Encoder plus regression model, loaded together.
pub struct TabularArtifacts {
    // ---
    pub encoder: PlantTypeEncoder,
    pub model: Box<dyn Regressor>,
}

impl TabularArtifacts {
    // ---
    /// Assemble the feature row in the documented column order.
    pub fn features(&self, req: &PredictRequest) -> Result<Vec<f32>, InferenceError> {
        // ---
        let one_hot = self.encoder.encode(&req.plant_type)?;
        let mut row = Vec::with_capacity(NUMERIC_FEATURES + one_hot.len());
        row.extend(
            [
                req.soil_moisture,
                req.temperature,
                req.air_humidity,
                req.light,
                req.last_watered_days,
                req.ml_prediction_prev,
            ]
            .map(|v| v as f32),
        );
        row.extend(one_hot);
        Ok(row)
    }

    /// Run one prediction and return `(water_given_ml, next_watering_days)`.
    pub fn predict(&self, req: &PredictRequest) -> Result<(f64, f64), InferenceError> {
        // ---
        let row = self.features(req)?;
        match self.model.predict_row(&row)?.as_slice() {
            [water_ml, next_days] => Ok((f64::from(*water_ml), f64::from(*next_days))),
            other => Err(InferenceError::Inference(format!(
                "expected 2 regression outputs, got {}",
                other.len()
            ))),
        }
    }
}

/// Lazily loaded watering model, shared across requests.
pub struct WateringPredictor {
    artifacts: LazyArtifact<TabularArtifacts>,
}

impl WateringPredictor {
    // ---
    /// Predictor backed by the encoder JSON and ONNX model on disk.
    pub fn from_paths(model_path: &Path, encoder_path: &Path) -> Self {
        // ---
        let model_path = model_path.to_path_buf();
        let encoder_path = encoder_path.to_path_buf();
        Self::from_loader(move || {
            let encoder = PlantTypeEncoder::from_path(&encoder_path)?;
            let width = NUMERIC_FEATURES + encoder.width();
            tracing::debug!(
                "Watering model columns: {} numeric + {:?}",
                NUMERIC_FEATURES,
                encoder.feature_names()
            );
            let model = OnnxRegressor::load(&model_path, width)?;
            Ok(TabularArtifacts {
                encoder,
                model: Box::new(model),
            })
        })
    }

    pub fn from_loader<F>(loader: F) -> Self
    where
        F: Fn() -> Result<TabularArtifacts, InferenceError> + Send + Sync + 'static,
    {
        WateringPredictor {
            artifacts: LazyArtifact::new("watering model", loader),
        }
    }

    pub fn status(&self) -> LoadStatus {
        self.artifacts.status()
    }

    pub async fn predict(&self, req: &PredictRequest) -> Result<(f64, f64), InferenceError> {
        // ---
        let artifacts = self.artifacts.get().await?;
        let req = req.clone();
        tokio::task::spawn_blocking(move || artifacts.predict(&req))
            .await
            .map_err(|e| InferenceError::Inference(format!("prediction task failed: {e}")))?
    }
}

#[cfg(test)]
pub(crate) mod tests {
    // ---
    use super::*;

    /// Regressor that echoes soil moisture and the tomato column.
    pub(crate) struct EchoRegressor;

    impl Regressor for EchoRegressor {
        fn predict_row(&self, features: &[f32]) -> Result<Vec<f32>, InferenceError> {
            Ok(vec![features[0] * 2.0, features[NUMERIC_FEATURES + 1] + 2.0])
        }
    }

    pub(crate) fn test_predictor() -> WateringPredictor {
        // ---
        WateringPredictor::from_loader(|| {
            Ok(TabularArtifacts {
                encoder: PlantTypeEncoder::new(vec![
                    "basil".to_string(),
                    "tomato".to_string(),
                    "rosie".to_string(),
                ]),
                model: Box::new(EchoRegressor),
            })
        })
    }

    pub(crate) fn create_test_request(plant_type: &str, soil_moisture: f64) -> PredictRequest {
        // ---
        PredictRequest {
            soil_moisture,
            temperature: 25.0,
            air_humidity: 50.0,
            light: 1000.0,
            last_watered_days: 2.0,
            ml_prediction_prev: 0.5,
            plant_type: plant_type.to_string(),
        }
    }

    #[test]
    fn test_one_hot_follows_encoder_order() {
        // ---
        let encoder = PlantTypeEncoder::new(vec!["basil".into(), "tomato".into(), "rosie".into()]);
        assert_eq!(encoder.encode("rosie").unwrap(), vec![0.0, 0.0, 1.0]);
        assert_eq!(
            encoder.feature_names(),
            vec!["plant_type_basil", "plant_type_tomato", "plant_type_rosie"]
        );
    }

    #[test]
    fn test_unknown_category_is_rejected() {
        // ---
        let encoder = PlantTypeEncoder::new(vec!["basil".into()]);
        assert!(matches!(
            encoder.encode("cactus"),
            Err(InferenceError::UnknownCategory(name)) if name == "cactus"
        ));
    }

    #[test]
    fn test_feature_row_column_order() {
        // ---
        let artifacts = TabularArtifacts {
            encoder: PlantTypeEncoder::new(vec!["basil".into(), "tomato".into()]),
            model: Box::new(EchoRegressor),
        };
        let row = artifacts.features(&create_test_request("tomato", 20.0)).unwrap();
        assert_eq!(row, vec![20.0, 25.0, 50.0, 1000.0, 2.0, 0.5, 0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_predict_with_loaded_model() {
        // ---
        let predictor = test_predictor();
        let (water_ml, next_days) = predictor
            .predict(&create_test_request("tomato", 20.0))
            .await
            .unwrap();
        assert_eq!(water_ml, 40.0);
        assert_eq!(next_days, 3.0);
        assert_eq!(predictor.status(), LoadStatus::Ready);
    }

    #[tokio::test]
    async fn test_wrong_output_arity_is_an_error() {
        // ---
        struct Scalar;
        impl Regressor for Scalar {
            fn predict_row(&self, _: &[f32]) -> Result<Vec<f32>, InferenceError> {
                Ok(vec![1.0])
            }
        }
        let predictor = WateringPredictor::from_loader(|| {
            Ok(TabularArtifacts {
                encoder: PlantTypeEncoder::new(vec!["tomato".into()]),
                model: Box::new(Scalar),
            })
        });
        let err = predictor
            .predict(&create_test_request("tomato", 50.0))
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::Inference(_)));
    }

    #[tokio::test]
    async fn test_missing_artifacts_are_unavailable() {
        // ---
        let predictor = WateringPredictor::from_paths(
            Path::new("/nonexistent/watering.onnx"),
            Path::new("/nonexistent/encoder.json"),
        );
        let err = predictor
            .predict(&create_test_request("tomato", 50.0))
            .await
            .unwrap_err();
        assert!(matches!(err, InferenceError::ModelUnavailable(_)));
        assert_eq!(predictor.status(), LoadStatus::Failed);
    }
}
