//! Persistence gateway for sensor, watering and diagnostic logs.
//!
//! Every call is a single statement against the hosted PostgreSQL database:
//! no transactions, batching or retries wrap it.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{DiagnosticLog, SensorLog, WateringLog};

// ---

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Append-only log tables plus the single feedback update.
#[async_trait]
pub trait LogStore: Send + Sync {
    // ---
    async fn insert_sensor_log(&self, log: &SensorLog) -> StoreResult<()>;
    async fn recent_sensor_logs(&self, limit: i64) -> StoreResult<Vec<SensorLog>>;

    async fn insert_watering_log(&self, log: &WateringLog) -> StoreResult<()>;
    async fn recent_watering_logs(&self, limit: i64) -> StoreResult<Vec<WateringLog>>;

    async fn insert_diagnostic_log(&self, log: &DiagnosticLog) -> StoreResult<()>;
    async fn recent_diagnostic_logs(&self, limit: i64) -> StoreResult<Vec<DiagnosticLog>>;

    /// Attach feedback to a diagnostic log. `None` when the id is unknown.
    async fn set_diagnostic_feedback(
        &self,
        id: Uuid,
        feedback: &str,
    ) -> StoreResult<Option<DiagnosticLog>>;
}

/// [`LogStore`] backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgLogStore {
    pool: PgPool,
}

impl PgLogStore {
    pub fn new(pool: PgPool) -> Self {
        PgLogStore { pool }
    }
}

#[async_trait]
impl LogStore for PgLogStore {
    // ---
    async fn insert_sensor_log(&self, log: &SensorLog) -> StoreResult<()> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO sensor_logs (
                id, created_at, plant_type,
                soil_moisture, temperature, air_humidity, light
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(log.id)
        .bind(log.timestamp)
        .bind(&log.plant_type)
        .bind(log.soil_moisture)
        .bind(log.temperature)
        .bind(log.air_humidity)
        .bind(log.light)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_sensor_logs(&self, limit: i64) -> StoreResult<Vec<SensorLog>> {
        // ---
        let rows = sqlx::query_as::<_, SensorLog>(
            "SELECT * FROM sensor_logs ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_watering_log(&self, log: &WateringLog) -> StoreResult<()> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO watering_logs (
                id, created_at, plant_type,
                soil_moisture, temperature, air_humidity, light,
                last_watered_days, ml_prediction_prev,
                water_given_ml, next_watering_days, source
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(log.id)
        .bind(log.timestamp)
        .bind(&log.plant_type)
        .bind(log.soil_moisture)
        .bind(log.temperature)
        .bind(log.air_humidity)
        .bind(log.light)
        .bind(log.last_watered_days)
        .bind(log.ml_prediction_prev)
        .bind(log.water_given_ml)
        .bind(log.next_watering_days)
        .bind(&log.source)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_watering_logs(&self, limit: i64) -> StoreResult<Vec<WateringLog>> {
        // ---
        let rows = sqlx::query_as::<_, WateringLog>(
            "SELECT * FROM watering_logs ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn insert_diagnostic_log(&self, log: &DiagnosticLog) -> StoreResult<()> {
        // ---
        sqlx::query(
            r#"
            INSERT INTO diagnostic_logs (
                id, created_at, plant_type,
                predicted_class, confidence, action_message,
                adjust_days, reduce_ml, all_scores,
                decision_reason, user_feedback
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(log.id)
        .bind(log.timestamp)
        .bind(&log.plant_type)
        .bind(&log.predicted_class)
        .bind(log.confidence)
        .bind(&log.action_message)
        .bind(log.adjust_days)
        .bind(log.reduce_ml)
        .bind(&log.all_scores)
        .bind(&log.decision_reason)
        .bind(&log.user_feedback)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_diagnostic_logs(&self, limit: i64) -> StoreResult<Vec<DiagnosticLog>> {
        // ---
        let rows = sqlx::query_as::<_, DiagnosticLog>(
            "SELECT * FROM diagnostic_logs ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn set_diagnostic_feedback(
        &self,
        id: Uuid,
        feedback: &str,
    ) -> StoreResult<Option<DiagnosticLog>> {
        // ---
        let row = sqlx::query_as::<_, DiagnosticLog>(
            "UPDATE diagnostic_logs SET user_feedback = $1 WHERE id = $2 RETURNING *",
        )
        .bind(feedback)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}
