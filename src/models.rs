//! Data models for the plant-watering service: request bodies, response
//! payloads and persisted log records.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---

/// Check that `value` is finite and inside `[min, max]`.
fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), String> {
    // ---
    if !value.is_finite() || value < min || value > max {
        return Err(format!("{field} must be between {min} and {max}, got {value}"));
    }
    Ok(())
}

/// Check that `value` is finite and not negative.
fn check_non_negative(field: &str, value: f64) -> Result<(), String> {
    // ---
    if !value.is_finite() || value < 0.0 {
        return Err(format!("{field} must be >= 0, got {value}"));
    }
    Ok(())
}

/// Raw telemetry posted by the device.
///
/// Temperature and humidity arrive as `null` when the DHT read fails on the
/// device, so only soil moisture is mandatory.
#[derive(Debug, Clone, Deserialize)]
pub struct SensorData {
    // ---
    pub plant_type: Option<String>,
    pub soil_moisture: f64,
    pub temperature: Option<f64>,
    pub air_humidity: Option<f64>,
    pub light: Option<f64>,
}

impl SensorData {
    // ---
    pub fn validate(&self) -> Result<(), String> {
        // ---
        check_range("soil_moisture", self.soil_moisture, 0.0, 100.0)?;
        if let Some(t) = self.temperature {
            check_range("temperature", t, -20.0, 60.0)?;
        }
        if let Some(h) = self.air_humidity {
            check_range("air_humidity", h, 0.0, 100.0)?;
        }
        if let Some(l) = self.light {
            check_non_negative("light", l)?;
        }
        Ok(())
    }
}

/// Input features for a watering prediction. Every field is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    // ---
    pub soil_moisture: f64,
    pub temperature: f64,
    pub air_humidity: f64,
    pub light: f64,
    pub last_watered_days: f64,
    pub ml_prediction_prev: f64,
    pub plant_type: String,
}

impl PredictRequest {
    // ---
    pub fn validate(&self) -> Result<(), String> {
        // ---
        check_range("soil_moisture", self.soil_moisture, 0.0, 100.0)?;
        check_range("temperature", self.temperature, -20.0, 60.0)?;
        check_range("air_humidity", self.air_humidity, 0.0, 100.0)?;
        check_non_negative("light", self.light)?;
        check_non_negative("last_watered_days", self.last_watered_days)?;
        if !self.ml_prediction_prev.is_finite() {
            return Err("ml_prediction_prev must be a finite number".to_string());
        }
        if self.plant_type.trim().is_empty() {
            return Err("plant_type must not be empty".to_string());
        }
        Ok(())
    }
}

/// Where a watering recommendation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredictionSource {
    // ---
    #[serde(rename = "ML")]
    Ml,
    #[serde(rename = "fallback")]
    Fallback,
}

impl PredictionSource {
    // ---
    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionSource::Ml => "ML",
            PredictionSource::Fallback => "fallback",
        }
    }
}

/// Watering recommendation, rounded for presentation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WateringPrediction {
    // ---
    pub water_given_ml: f64,
    pub next_watering_days: f64,
    pub source: PredictionSource,
}

/// Body returned by `POST /predict`.
#[derive(Debug, Serialize)]
pub struct WateringResponse {
    // ---
    #[serde(flatten)]
    pub prediction: WateringPrediction,

    /// False when the watering log could not be written.
    pub logged: bool,
}

/// Outcome of a leaf photo diagnosis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    // ---
    pub predicted_class: String,
    pub confidence: f64,
    pub all_scores: BTreeMap<String, f64>,
    pub action_message: String,
    pub adjust_days: f64,
    pub reduce_ml: f64,
    pub decision_reason: String,
}

/// One entry of the static plant catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlantInfo {
    // ---
    #[serde(default)]
    pub plant_type: String,
    pub description: Option<String>,
    #[serde(alias = "tratament")]
    pub treatment: Option<String>,
}

// --- persisted log records

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SensorLog {
    // ---
    pub id: Uuid,
    #[sqlx(rename = "created_at")]
    pub timestamp: DateTime<Utc>,
    pub plant_type: Option<String>,
    pub soil_moisture: f64,
    pub temperature: Option<f64>,
    pub air_humidity: Option<f64>,
    pub light: Option<f64>,
}

impl SensorLog {
    // ---
    pub fn from_reading(data: &SensorData) -> Self {
        // ---
        SensorLog {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            plant_type: data.plant_type.clone(),
            soil_moisture: data.soil_moisture,
            temperature: data.temperature,
            air_humidity: data.air_humidity,
            light: data.light,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WateringLog {
    // ---
    pub id: Uuid,
    #[sqlx(rename = "created_at")]
    pub timestamp: DateTime<Utc>,
    pub plant_type: String,
    pub soil_moisture: f64,
    pub temperature: f64,
    pub air_humidity: f64,
    pub light: f64,
    pub last_watered_days: f64,
    pub ml_prediction_prev: f64,
    pub water_given_ml: f64,
    pub next_watering_days: f64,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DiagnosticLog {
    // ---
    pub id: Uuid,
    #[sqlx(rename = "created_at")]
    pub timestamp: DateTime<Utc>,
    pub plant_type: Option<String>,
    pub predicted_class: String,
    pub confidence: f64,
    pub action_message: String,
    pub adjust_days: f64,
    pub reduce_ml: f64,
    pub all_scores: sqlx::types::Json<BTreeMap<String, f64>>,
    pub decision_reason: String,
    pub user_feedback: Option<String>,
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn create_test_request(soil_moisture: f64) -> PredictRequest {
        // ---
        PredictRequest {
            soil_moisture,
            temperature: 24.0,
            air_humidity: 55.0,
            light: 1200.0,
            last_watered_days: 2.0,
            ml_prediction_prev: 0.0,
            plant_type: "tomato".to_string(),
        }
    }

    #[test]
    fn test_predict_request_ranges() {
        // ---
        assert!(create_test_request(0.0).validate().is_ok());
        assert!(create_test_request(100.0).validate().is_ok());
        assert!(create_test_request(-0.1).validate().is_err());
        assert!(create_test_request(100.5).validate().is_err());
        assert!(create_test_request(f64::NAN).validate().is_err());

        let mut cold = create_test_request(40.0);
        cold.temperature = -25.0;
        assert!(cold.validate().is_err());

        let mut dark = create_test_request(40.0);
        dark.light = -1.0;
        assert!(dark.validate().is_err());

        let mut unnamed = create_test_request(40.0);
        unnamed.plant_type = "  ".to_string();
        assert!(unnamed.validate().is_err());
    }

    #[test]
    fn test_predict_request_requires_all_fields() {
        // ---
        let missing_prev = serde_json::json!({
            "soil_moisture": 20,
            "temperature": 25,
            "air_humidity": 50,
            "light": 1000,
            "last_watered_days": 2,
            "plant_type": "tomato"
        });
        assert!(serde_json::from_value::<PredictRequest>(missing_prev).is_err());
    }

    #[test]
    fn test_sensor_data_accepts_null_readings() {
        // ---
        let body = serde_json::json!({
            "plant_type": "rosie",
            "soil_moisture": 42.5,
            "temperature": null,
            "air_humidity": null,
            "light": 3000
        });
        let data: SensorData = serde_json::from_value(body).unwrap();
        assert!(data.validate().is_ok());
        assert_eq!(data.temperature, None);
    }

    #[test]
    fn test_prediction_source_wire_names() {
        // ---
        assert_eq!(serde_json::to_value(PredictionSource::Ml).unwrap(), "ML");
        assert_eq!(
            serde_json::to_value(PredictionSource::Fallback).unwrap(),
            "fallback"
        );
        assert_eq!(PredictionSource::Fallback.as_str(), "fallback");
    }

    #[test]
    fn test_watering_response_is_flat() {
        // ---
        let resp = WateringResponse {
            prediction: WateringPrediction {
                water_given_ml: 80.0,
                next_watering_days: 1.0,
                source: PredictionSource::Fallback,
            },
            logged: true,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["water_given_ml"], 80.0);
        assert_eq!(json["next_watering_days"], 1.0);
        assert_eq!(json["source"], "fallback");
        assert_eq!(json["logged"], true);
    }

    #[test]
    fn test_plant_info_accepts_legacy_spelling() {
        // ---
        let info: PlantInfo = serde_json::from_value(serde_json::json!({
            "plant_type": "tomato",
            "description": "Warm season crop",
            "tratament": "Water at the base"
        }))
        .unwrap();
        assert_eq!(info.treatment.as_deref(), Some("Water at the base"));
    }
}
