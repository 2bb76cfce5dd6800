//! Database schema management for `smartplant-backend`.
//!
//! Ensures required tables and indexes exist before serving requests.
//! Applied once on startup from `main.rs` (EMBP: single gateway call).

use anyhow::Result;
use sqlx::PgPool;

// ---

/// Create or update the database schema (idempotent).
///
/// Creates the three append-only log tables (`sensor_logs`, `watering_logs`,
/// `diagnostic_logs`) and a recency index on each. Safe to call on every
/// startup; no-op if objects already exist.
///
/// Errors are propagated if any SQL execution fails.
pub async fn create_schema(pool: &PgPool) -> Result<()> {
    // ---
    let mut tx = pool.begin().await?;

    // Raw device telemetry from `/api/sensor-data`
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sensor_logs (
            id            UUID PRIMARY KEY,
            created_at    TIMESTAMPTZ      NOT NULL DEFAULT now(),
            plant_type    TEXT,
            soil_moisture DOUBLE PRECISION NOT NULL,
            temperature   DOUBLE PRECISION,
            air_humidity  DOUBLE PRECISION,
            light         DOUBLE PRECISION
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // One row per `/predict` answer, ML or fallback
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS watering_logs (
            id                 UUID PRIMARY KEY,
            created_at         TIMESTAMPTZ      NOT NULL DEFAULT now(),
            plant_type         TEXT             NOT NULL,
            soil_moisture      DOUBLE PRECISION NOT NULL,
            temperature        DOUBLE PRECISION NOT NULL,
            air_humidity       DOUBLE PRECISION NOT NULL,
            light              DOUBLE PRECISION NOT NULL,
            last_watered_days  DOUBLE PRECISION NOT NULL,
            ml_prediction_prev DOUBLE PRECISION NOT NULL,
            water_given_ml     DOUBLE PRECISION NOT NULL,
            next_watering_days DOUBLE PRECISION NOT NULL,
            source             TEXT             NOT NULL
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // Photo diagnoses; `user_feedback` is the only column ever updated
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS diagnostic_logs (
            id              UUID PRIMARY KEY,
            created_at      TIMESTAMPTZ      NOT NULL DEFAULT now(),
            plant_type      TEXT,
            predicted_class TEXT             NOT NULL,
            confidence      DOUBLE PRECISION NOT NULL,
            action_message  TEXT             NOT NULL,
            adjust_days     DOUBLE PRECISION NOT NULL,
            reduce_ml       DOUBLE PRECISION NOT NULL,
            all_scores      JSONB            NOT NULL,
            decision_reason TEXT             NOT NULL,
            user_feedback   TEXT
        );
        "#,
    )
    .execute(&mut *tx)
    .await?;

    // History endpoints always read newest first
    for table in ["sensor_logs", "watering_logs", "diagnostic_logs"] {
        sqlx::query(&format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_created_at ON {table} (created_at DESC);"
        ))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
