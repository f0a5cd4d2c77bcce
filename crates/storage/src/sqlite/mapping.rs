use std::str::FromStr;

use course_core::model::{
    EntityId, LessonId, LessonProgress, QuestionId, QuestionResult, QuizAttempt, QuizQuestion,
    UserId,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Map driver errors: uniqueness violations are conflicts, dangling foreign
/// keys are missing rows, everything else is a connection problem.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StorageError::Conflict;
        }
        if db.is_foreign_key_violation() {
            return StorageError::NotFound;
        }
    }
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_to_i64<I: EntityId>(id: I) -> Result<i64, StorageError> {
    i64::try_from(id.value())
        .map_err(|_| StorageError::Serialization(format!("{} id overflow", I::KIND)))
}

pub(crate) fn id_from_i64<I: EntityId>(v: i64) -> Result<I, StorageError> {
    u64::try_from(v)
        .map(I::from_value)
        .map_err(|_| StorageError::Serialization(format!("{} id sign overflow", I::KIND)))
}

pub(crate) fn ids_to_i64<I: EntityId>(ids: &[I]) -> Result<Vec<i64>, StorageError> {
    ids.iter().copied().map(id_to_i64).collect()
}

pub(crate) fn user_from_str(raw: &str) -> Result<UserId, StorageError> {
    UserId::from_str(raw).map_err(ser)
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

/// `?N, ?N+1, ...` placeholder list for an `IN (...)` clause.
pub(crate) fn placeholders(first: usize, count: usize) -> String {
    (first..first + count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

// ─── JSON columns ──────────────────────────────────────────────────────────────

pub(crate) fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

pub(crate) fn decode_json<T: DeserializeOwned>(
    field: &'static str,
    raw: &str,
) -> Result<T, StorageError> {
    serde_json::from_str(raw)
        .map_err(|e| StorageError::Serialization(format!("invalid {field} column: {e}")))
}

// ─── Rows ──────────────────────────────────────────────────────────────────────

pub(crate) fn map_question_row(row: &SqliteRow) -> Result<QuizQuestion, StorageError> {
    let raw_options = row.try_get::<String, _>("options").map_err(ser)?;
    let options: Vec<String> = decode_json("options", &raw_options)?;
    let correct_index = usize::try_from(row.try_get::<i64, _>("correct_index").map_err(ser)?)
        .map_err(|_| StorageError::Serialization("invalid correct_index".into()))?;

    let question = QuizQuestion::new(
        id_from_i64::<QuestionId>(row.try_get("id").map_err(ser)?)?,
        id_from_i64::<LessonId>(row.try_get("lesson_id").map_err(ser)?)?,
        row.try_get::<String, _>("prompt").map_err(ser)?,
        options,
        correct_index,
        u32_from_i64("position", row.try_get("position").map_err(ser)?)?,
    )
    .map_err(ser)?;

    Ok(match row.try_get::<Option<String>, _>("explanation").map_err(ser)? {
        Some(explanation) => question.with_explanation(explanation),
        None => question,
    })
}

pub(crate) fn map_attempt_row(row: &SqliteRow) -> Result<QuizAttempt, StorageError> {
    let results: Vec<QuestionResult> =
        decode_json("results", &row.try_get::<String, _>("results").map_err(ser)?)?;

    Ok(QuizAttempt {
        id: row.try_get("id").map_err(ser)?,
        user_id: user_from_str(&row.try_get::<String, _>("user_id").map_err(ser)?)?,
        lesson_id: id_from_i64(row.try_get("lesson_id").map_err(ser)?)?,
        score: u32_from_i64("score", row.try_get("score").map_err(ser)?)?,
        total_questions: u32_from_i64(
            "total_questions",
            row.try_get("total_questions").map_err(ser)?,
        )?,
        passed: row.try_get::<i64, _>("passed").map_err(ser)? != 0,
        results,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<LessonProgress, StorageError> {
    Ok(LessonProgress {
        user_id: user_from_str(&row.try_get::<String, _>("user_id").map_err(ser)?)?,
        lesson_id: id_from_i64(row.try_get("lesson_id").map_err(ser)?)?,
        completed: row.try_get::<i64, _>("completed").map_err(ser)? != 0,
        completed_at: row.try_get("completed_at").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
        updated_at: row.try_get("updated_at").map_err(ser)?,
    })
}
