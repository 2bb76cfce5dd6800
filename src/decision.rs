//! Decision assembly: turns raw predictor output into response payloads and
//! log records.

use chrono::Utc;
use uuid::Uuid;

use crate::inference::{diagnosis::Diagnosis, InferenceError};
use crate::models::{
    DiagnosisResult, DiagnosticLog, PredictRequest, PredictionSource, WateringLog,
    WateringPrediction,
};
use crate::symptoms;

// ---

/// Soil moisture (%) below which the fallback rule waters.
pub const FALLBACK_DRY_THRESHOLD: f64 = 30.0;

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Deterministic rule used when the watering model cannot answer.
pub fn fallback(soil_moisture: f64) -> WateringPrediction {
    // ---
    let (water_given_ml, next_watering_days) = if soil_moisture < FALLBACK_DRY_THRESHOLD {
        (80.0, 1.0)
    } else {
        (0.0, 3.0)
    };
    WateringPrediction {
        water_given_ml,
        next_watering_days,
        source: PredictionSource::Fallback,
    }
}

/// Build the watering recommendation from the model outcome.
///
/// Model errors never escape: they are logged and replaced by [`fallback`].
pub fn watering(
    req: &PredictRequest,
    outcome: Result<(f64, f64), InferenceError>,
) -> WateringPrediction {
    // ---
    match outcome {
        Ok((water_ml, next_days)) => WateringPrediction {
            water_given_ml: round1(water_ml.max(0.0)),
            next_watering_days: round1(next_days.max(0.0)),
            source: PredictionSource::Ml,
        },
        Err(e) => {
            tracing::error!("ML prediction failed: {}", e);
            fallback(req.soil_moisture)
        }
    }
}

pub fn watering_log(req: &PredictRequest, prediction: &WateringPrediction) -> WateringLog {
    // ---
    WateringLog {
        id: Uuid::new_v4(),
        timestamp: Utc::now(),
        plant_type: req.plant_type.clone(),
        soil_moisture: req.soil_moisture,
        temperature: req.temperature,
        air_humidity: req.air_humidity,
        light: req.light,
        last_watered_days: req.last_watered_days,
        ml_prediction_prev: req.ml_prediction_prev,
        water_given_ml: prediction.water_given_ml,
        next_watering_days: prediction.next_watering_days,
        source: prediction.source.as_str().to_string(),
    }
}

/// Combine a classifier result with the symptom-action table.
pub fn diagnosis(diagnosis: Diagnosis) -> DiagnosisResult {
    // ---
    let action = symptoms::lookup(&diagnosis.label);
    let decision_reason = format!(
        "Detected '{}' with score {:.2}. {}",
        diagnosis.label, diagnosis.confidence, action.notify_user
    );
    DiagnosisResult {
        predicted_class: diagnosis.label,
        confidence: diagnosis.confidence,
        all_scores: diagnosis.scores,
        action_message: action.notify_user.to_string(),
        adjust_days: action.adjust_watering_days,
        reduce_ml: action.reduce_water_ml,
        decision_reason,
    }
}

pub fn diagnostic_log(plant_type: Option<String>, result: &DiagnosisResult) -> DiagnosticLog {
    // ---
    DiagnosticLog {
        id: Uuid::new_v4(),
        timestamp: Utc::now(),
        plant_type,
        predicted_class: result.predicted_class.clone(),
        confidence: result.confidence,
        action_message: result.action_message.clone(),
        adjust_days: result.adjust_days,
        reduce_ml: result.reduce_ml,
        all_scores: sqlx::types::Json(result.all_scores.clone()),
        decision_reason: result.decision_reason.clone(),
        user_feedback: None,
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::collections::BTreeMap;

    fn create_test_request(soil_moisture: f64) -> PredictRequest {
        // ---
        PredictRequest {
            soil_moisture,
            temperature: 22.0,
            air_humidity: 60.0,
            light: 800.0,
            last_watered_days: 1.0,
            ml_prediction_prev: 0.0,
            plant_type: "tomato".to_string(),
        }
    }

    fn unavailable() -> Result<(f64, f64), InferenceError> {
        Err(InferenceError::ModelUnavailable("no model".to_string()))
    }

    #[test]
    fn test_fallback_when_dry() {
        // ---
        for moisture in [0.0, 12.5, 29.9] {
            let p = watering(&create_test_request(moisture), unavailable());
            assert_eq!(p.water_given_ml, 80.0);
            assert_eq!(p.next_watering_days, 1.0);
            assert_eq!(p.source, PredictionSource::Fallback);
        }
    }

    #[test]
    fn test_fallback_when_moist() {
        // ---
        for moisture in [30.0, 30.1, 75.0, 100.0] {
            let p = watering(&create_test_request(moisture), unavailable());
            assert_eq!(p.water_given_ml, 0.0);
            assert_eq!(p.next_watering_days, 3.0);
            assert_eq!(p.source, PredictionSource::Fallback);
        }
    }

    #[test]
    fn test_unknown_category_also_falls_back() {
        // ---
        let p = watering(
            &create_test_request(10.0),
            Err(InferenceError::UnknownCategory("cactus".to_string())),
        );
        assert_eq!(p, fallback(10.0));
    }

    #[test]
    fn test_model_output_is_rounded_and_non_negative() {
        // ---
        let p = watering(&create_test_request(40.0), Ok((123.456, -0.7)));
        assert_eq!(p.water_given_ml, 123.5);
        assert_eq!(p.next_watering_days, 0.0);
        assert_eq!(p.source, PredictionSource::Ml);
    }

    #[test]
    fn test_watering_log_mirrors_prediction() {
        // ---
        let req = create_test_request(20.0);
        let p = fallback(req.soil_moisture);
        let log = watering_log(&req, &p);
        assert_eq!(log.source, "fallback");
        assert_eq!(log.water_given_ml, 80.0);
        assert_eq!(log.plant_type, "tomato");
    }

    #[test]
    fn test_diagnosis_reason_embeds_label_and_score() {
        // ---
        let result = diagnosis(Diagnosis {
            label: "overwatering".to_string(),
            confidence: 0.8765,
            scores: BTreeMap::from([
                ("healthy".to_string(), 0.1235),
                ("overwatering".to_string(), 0.8765),
            ]),
        });
        assert_eq!(result.adjust_days, 2.0);
        assert_eq!(result.reduce_ml, 50.0);
        assert!(result
            .decision_reason
            .starts_with("Detected 'overwatering' with score 0.88. "));
        assert!(result.decision_reason.ends_with(&result.action_message));
    }

    #[test]
    fn test_unlisted_label_uses_unknown_action() {
        // ---
        let result = diagnosis(Diagnosis {
            label: "spider_mites".to_string(),
            confidence: 0.51,
            scores: BTreeMap::from([("spider_mites".to_string(), 0.51)]),
        });
        assert_eq!(result.predicted_class, "spider_mites");
        assert_eq!(
            result.action_message,
            symptoms::lookup(symptoms::UNKNOWN).notify_user
        );

        let log = diagnostic_log(Some("basil".to_string()), &result);
        assert_eq!(log.plant_type.as_deref(), Some("basil"));
        assert_eq!(log.all_scores.0, result.all_scores);
        assert_eq!(log.user_feedback, None);
    }
}
