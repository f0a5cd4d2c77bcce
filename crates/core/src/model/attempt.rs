use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{LessonId, QuestionId, UserId};

/// Per-question outcome recorded with every attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_id: QuestionId,
    /// Option the learner picked; `None` when the question was left unanswered.
    pub selected: Option<usize>,
    pub correct_index: usize,
    pub correct: bool,
}

/// A graded submission that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuizAttempt {
    pub user_id: UserId,
    pub lesson_id: LessonId,
    pub score: u32,
    pub total_questions: u32,
    pub passed: bool,
    pub results: Vec<QuestionResult>,
    pub created_at: DateTime<Utc>,
}

/// Immutable record of one graded quiz submission.
///
/// Attempts are append-only: nothing updates or deletes them once stored, and
/// any number may exist per `(user, lesson)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAttempt {
    pub id: i64,
    pub user_id: UserId,
    pub lesson_id: LessonId,
    pub score: u32,
    pub total_questions: u32,
    pub passed: bool,
    pub results: Vec<QuestionResult>,
    pub created_at: DateTime<Utc>,
}

impl QuizAttempt {
    #[must_use]
    pub fn from_new(id: i64, attempt: NewQuizAttempt) -> Self {
        Self {
            id,
            user_id: attempt.user_id,
            lesson_id: attempt.lesson_id,
            score: attempt.score,
            total_questions: attempt.total_questions,
            passed: attempt.passed,
            results: attempt.results,
            created_at: attempt.created_at,
        }
    }

    /// Whether this attempt passed at or after `since`.
    #[must_use]
    pub fn passed_since(&self, since: DateTime<Utc>) -> bool {
        self.passed && self.created_at >= since
    }
}
