use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::ids::{LessonId, UserId};

/// Per-user, per-lesson completion record. Unique on `(user_id, lesson_id)`.
///
/// `completed` only moves from `false` to `true` through the normal write
/// path; an explicit reset is the single way back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgress {
    pub user_id: UserId,
    pub lesson_id: LessonId,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LessonProgress {
    /// A fresh record for a lesson completed at `at`.
    #[must_use]
    pub fn completed_at(user_id: UserId, lesson_id: LessonId, at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            lesson_id,
            completed: true,
            completed_at: Some(at),
            created_at: at,
            updated_at: at,
        }
    }

    /// Apply another completion signal: keeps the first completion time and
    /// only refreshes `updated_at`.
    pub fn mark_completed(&mut self, at: DateTime<Utc>) {
        if !self.completed {
            self.completed = true;
            self.completed_at = Some(at);
        }
        self.updated_at = at;
    }

    pub fn reset(&mut self, at: DateTime<Utc>) {
        self.completed = false;
        self.completed_at = None;
        self.updated_at = at;
    }
}

/// Completion flag of one lesson inside a course rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonCompletion {
    pub lesson_id: LessonId,
    pub completed: bool,
}

/// Per-user completion statistics for a course.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub total_lessons: u32,
    pub completed_lessons: u32,
    pub progress_percentage: u8,
    pub lessons: Vec<LessonCompletion>,
}

impl CourseProgress {
    /// Build from de-duplicated lessons in display order.
    #[must_use]
    pub fn from_lessons(lessons: Vec<LessonCompletion>) -> Self {
        let total = u32::try_from(lessons.len()).unwrap_or(u32::MAX);
        let completed = u32::try_from(lessons.iter().filter(|l| l.completed).count())
            .unwrap_or(u32::MAX);
        Self {
            total_lessons: total,
            completed_lessons: completed,
            progress_percentage: progress_percentage(completed, total),
            lessons,
        }
    }

    /// Safe default shown to learners when the rollup cannot be computed.
    #[must_use]
    pub fn zeroed() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn completed_lesson_ids(&self) -> Vec<LessonId> {
        self.lessons
            .iter()
            .filter(|l| l.completed)
            .map(|l| l.lesson_id)
            .collect()
    }
}

/// `completed / total * 100`, rounded half-up; 0 for an empty course.
///
/// Integer arithmetic keeps the result deterministic across platforms.
#[must_use]
pub fn progress_percentage(completed: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = u64::from(completed.min(total));
    let total = u64::from(total);
    let rounded = (completed * 200 + total) / (total * 2);
    u8::try_from(rounded.min(100)).unwrap_or(100)
}
