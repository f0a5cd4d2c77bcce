use chrono::{DateTime, Utc};
use course_core::model::{LessonId, NewQuizAttempt, QuizAttempt, UserId};

use super::SqliteRepository;
use super::mapping::{db_err, encode_json, id_to_i64, map_attempt_row};
use crate::repository::{AttemptRepository, StorageError};

#[async_trait::async_trait]
impl AttemptRepository for SqliteRepository {
    async fn append_attempt(&self, attempt: &NewQuizAttempt) -> Result<i64, StorageError> {
        let results = encode_json(&attempt.results)?;

        let res = sqlx::query(
            r"
            INSERT INTO quiz_attempts
                (user_id, lesson_id, score, total_questions, passed, results, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(attempt.user_id.to_string())
        .bind(id_to_i64(attempt.lesson_id)?)
        .bind(i64::from(attempt.score))
        .bind(i64::from(attempt.total_questions))
        .bind(i64::from(attempt.passed))
        .bind(results)
        .bind(attempt.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        let id = res.last_insert_rowid();
        tracing::debug!(
            attempt_id = id,
            user_id = %attempt.user_id,
            lesson_id = %attempt.lesson_id,
            passed = attempt.passed,
            "appended quiz attempt"
        );
        Ok(id)
    }

    async fn attempts_for(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Vec<QuizAttempt>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, user_id, lesson_id, score, total_questions, passed, results, created_at
            FROM quiz_attempts
            WHERE user_id = ?1 AND lesson_id = ?2
            ORDER BY id ASC
            ",
        )
        .bind(user.to_string())
        .bind(id_to_i64(lesson)?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_attempt_row).collect()
    }

    async fn has_passing_attempt_since(
        &self,
        user: UserId,
        lesson: LessonId,
        since: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        // Compared after decoding: stored timestamp text does not sort
        // chronologically across precisions.
        let rows = sqlx::query(
            r"
            SELECT id, user_id, lesson_id, score, total_questions, passed, results, created_at
            FROM quiz_attempts
            WHERE user_id = ?1 AND lesson_id = ?2 AND passed = 1
            ORDER BY id DESC
            ",
        )
        .bind(user.to_string())
        .bind(id_to_i64(lesson)?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        for row in &rows {
            if map_attempt_row(row)?.passed_since(since) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
