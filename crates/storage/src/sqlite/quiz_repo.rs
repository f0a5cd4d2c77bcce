use course_core::model::{LessonId, QuizQuestion};

use super::SqliteRepository;
use super::mapping::{db_err, encode_json, id_to_i64, map_question_row};
use crate::repository::{QuizRepository, StorageError};

#[async_trait::async_trait]
impl QuizRepository for SqliteRepository {
    async fn upsert_question(&self, question: &QuizQuestion) -> Result<(), StorageError> {
        let options = encode_json(question.options())?;
        let correct_index = i64::try_from(question.correct_index())
            .map_err(|_| StorageError::Serialization("correct_index overflow".into()))?;

        sqlx::query(
            r"
            INSERT INTO quiz_questions
                (id, lesson_id, prompt, options, correct_index, explanation, position)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                lesson_id = excluded.lesson_id,
                prompt = excluded.prompt,
                options = excluded.options,
                correct_index = excluded.correct_index,
                explanation = excluded.explanation,
                position = excluded.position
            ",
        )
        .bind(id_to_i64(question.id())?)
        .bind(id_to_i64(question.lesson_id())?)
        .bind(question.prompt())
        .bind(options)
        .bind(correct_index)
        .bind(question.explanation())
        .bind(i64::from(question.order()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        tracing::debug!(
            question_id = %question.id(),
            lesson_id = %question.lesson_id(),
            "upserted quiz question"
        );
        Ok(())
    }

    async fn questions_for_lesson(
        &self,
        lesson: LessonId,
    ) -> Result<Vec<QuizQuestion>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, lesson_id, prompt, options, correct_index, explanation, position
            FROM quiz_questions
            WHERE lesson_id = ?1
            ORDER BY position ASC, id ASC
            ",
        )
        .bind(id_to_i64(lesson)?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_question_row).collect()
    }
}
