use chrono::{DateTime, Utc};
use course_core::model::{LessonId, LessonProgress, UserId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    db_err, id_from_i64, id_to_i64, ids_to_i64, map_progress_row, placeholders, ser,
};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_id, lesson_id, completed, completed_at, created_at, updated_at
            FROM lesson_progress
            WHERE user_id = ?1 AND lesson_id = ?2
            ",
        )
        .bind(user.to_string())
        .bind(id_to_i64(lesson)?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_progress_row).transpose()
    }

    async fn mark_completed(
        &self,
        user: UserId,
        lesson: LessonId,
        at: DateTime<Utc>,
    ) -> Result<LessonProgress, StorageError> {
        // Single statement. An already-completed row keeps its completed_at.
        let row = sqlx::query(
            r"
            INSERT INTO lesson_progress
                (user_id, lesson_id, completed, completed_at, created_at, updated_at)
            VALUES (?1, ?2, 1, ?3, ?3, ?3)
            ON CONFLICT(user_id, lesson_id) DO UPDATE SET
                completed_at = CASE
                    WHEN lesson_progress.completed = 1 THEN lesson_progress.completed_at
                    ELSE excluded.completed_at
                END,
                completed = 1,
                updated_at = excluded.updated_at
            RETURNING user_id, lesson_id, completed, completed_at, created_at, updated_at
            ",
        )
        .bind(user.to_string())
        .bind(id_to_i64(lesson)?)
        .bind(at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;

        tracing::debug!(user_id = %user, lesson_id = %lesson, "marked lesson completed");
        map_progress_row(&row)
    }

    async fn completed_among(
        &self,
        user: UserId,
        lessons: &[LessonId],
    ) -> Result<Vec<LessonId>, StorageError> {
        if lessons.is_empty() {
            return Ok(Vec::new());
        }

        let lesson_ids = ids_to_i64(lessons)?;
        let sql = format!(
            "SELECT lesson_id FROM lesson_progress \
             WHERE user_id = ?1 AND completed = 1 AND lesson_id IN ({}) \
             ORDER BY lesson_id ASC",
            placeholders(2, lesson_ids.len()),
        );

        let mut query = sqlx::query(&sql).bind(user.to_string());
        for id in &lesson_ids {
            query = query.bind(*id);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;

        rows.iter()
            .map(|row| id_from_i64::<LessonId>(row.try_get("lesson_id").map_err(ser)?))
            .collect()
    }

    async fn reset_progress(
        &self,
        user: UserId,
        lesson: LessonId,
        at: DateTime<Utc>,
    ) -> Result<Option<LessonProgress>, StorageError> {
        let row = sqlx::query(
            r"
            UPDATE lesson_progress
            SET completed = 0, completed_at = NULL, updated_at = ?3
            WHERE user_id = ?1 AND lesson_id = ?2
            RETURNING user_id, lesson_id, completed, completed_at, created_at, updated_at
            ",
        )
        .bind(user.to_string())
        .bind(id_to_i64(lesson)?)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        if row.is_some() {
            tracing::info!(user_id = %user, lesson_id = %lesson, "reset lesson progress");
        }
        row.as_ref().map(map_progress_row).transpose()
    }
}
