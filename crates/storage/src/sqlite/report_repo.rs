use quiz_core::model::{Report, SessionKey};
use sqlx::Row;

use super::{SqliteRepository, conn, ser};
use crate::repository::{ReportRepository, ReportRow, StorageError};

fn count_i64(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn map_report_row(row: &sqlx::sqlite::SqliteRow) -> Result<ReportRow, StorageError> {
    let id: i64 = row.try_get("id").map_err(ser)?;
    let key: String = row.try_get("session_key").map_err(ser)?;
    let json: String = row.try_get("report").map_err(ser)?;

    Ok(ReportRow {
        id,
        session_key: key.parse().map_err(ser)?,
        report: serde_json::from_str(&json).map_err(ser)?,
    })
}

#[async_trait::async_trait]
impl ReportRepository for SqliteRepository {
    async fn append_report(&self, key: SessionKey, report: &Report) -> Result<i64, StorageError> {
        let json = serde_json::to_string(report).map_err(ser)?;

        let res = sqlx::query(
            r"
                INSERT INTO quiz_reports (
                    session_key, correct_count, total_questions, completed_at, report
                )
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(key.to_string())
        .bind(count_i64("correct_count", report.correct_count())?)
        .bind(count_i64("total_questions", report.total_questions())?)
        .bind(report.completed_at())
        .bind(json)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.last_insert_rowid())
    }

    async fn get_report(&self, id: i64) -> Result<Report, StorageError> {
        let row = sqlx::query("SELECT id, session_key, report FROM quiz_reports WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        Ok(map_report_row(&row)?.report)
    }

    async fn report_id_for_session(&self, key: SessionKey) -> Result<Option<i64>, StorageError> {
        let row = sqlx::query(
            "SELECT id FROM quiz_reports WHERE session_key = ?1 ORDER BY id LIMIT 1",
        )
        .bind(key.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.map(|row| row.try_get::<i64, _>("id").map_err(ser)).transpose()
    }

    async fn list_reports(&self, limit: u32) -> Result<Vec<ReportRow>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, session_key, report
                FROM quiz_reports
                ORDER BY id DESC
                LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_report_row).collect()
    }
}
