use quiz_core::model::{SessionKey, SessionSnapshot};
use sqlx::Row;

use super::{SqliteRepository, conn, ser};
use crate::repository::{QuizSessionRepository, StorageError};

#[async_trait::async_trait]
impl QuizSessionRepository for SqliteRepository {
    async fn save_session(
        &self,
        key: SessionKey,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StorageError> {
        let json = serde_json::to_string(snapshot).map_err(ser)?;

        sqlx::query(
            r"
                INSERT INTO quiz_sessions (session_key, snapshot)
                VALUES (?1, ?2)
                ON CONFLICT(session_key) DO UPDATE SET
                    snapshot = excluded.snapshot
            ",
        )
        .bind(key.to_string())
        .bind(json)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn load_session(&self, key: SessionKey) -> Result<Option<SessionSnapshot>, StorageError> {
        let row = sqlx::query("SELECT snapshot FROM quiz_sessions WHERE session_key = ?1")
            .bind(key.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.map(|row| {
            let json: String = row.try_get("snapshot").map_err(ser)?;
            serde_json::from_str(&json).map_err(ser)
        })
        .transpose()
    }

    async fn delete_session(&self, key: SessionKey) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM quiz_sessions WHERE session_key = ?1")
            .bind(key.to_string())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
