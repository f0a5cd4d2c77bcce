//! Transport-agnostic operation surface.
//!
//! Every operation takes raw string identifiers and an optional caller as
//! resolved by the auth layer, and answers with a serializable DTO or an
//! [`ApiError`] carrying its HTTP status category. Routing and rendering are
//! left to the embedding transport.

use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use course_core::model::{
    CourseId, CourseModules, CourseProgress, EntityId, LessonCompletion, LessonId, LessonProgress,
    Link, ModuleLessons, ParseIdError, QuestionId, QuizAttempt, QuizSubmission, Relation, UserId,
};

use crate::backfill_service::{BackfillReport, BackfillService};
use crate::error::{ProgressError, QuizServiceError, RelationError};
use crate::progress_service::ProgressService;
use crate::quiz_service::{QuizQuestionView, QuizResult, QuizService};
use crate::relation_service::RelationStore;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Status category of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    Validation,
    Unauthenticated,
    NotFound,
    Internal,
}

impl ErrorCategory {
    /// HTTP status code for this category.
    #[must_use]
    pub fn status_code(self) -> u16 {
        match self {
            ErrorCategory::Validation => 400,
            ErrorCategory::Unauthenticated => 401,
            ErrorCategory::NotFound => 404,
            ErrorCategory::Internal => 500,
        }
    }
}

/// Structured error response: `{error, details}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{error}")]
pub struct ApiError {
    #[serde(skip)]
    pub category: ErrorCategory,
    pub error: String,
    pub details: Option<String>,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(category: ErrorCategory, error: impl Into<String>) -> Self {
        Self {
            category,
            error: error.into(),
            details: None,
        }
    }

    pub fn validation(error: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, error)
    }

    #[must_use]
    pub fn unauthenticated() -> Self {
        Self::new(ErrorCategory::Unauthenticated, "authentication required")
    }

    pub fn not_found(error: impl Into<String>) -> Self {
        Self::new(ErrorCategory::NotFound, error)
    }

    /// Storage or other internal failure. The cause is logged, not returned.
    pub fn internal(cause: &dyn std::error::Error) -> Self {
        tracing::error!(error = %cause, "internal error");
        Self::new(ErrorCategory::Internal, "upstream failure")
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.category.status_code()
    }
}

impl From<ParseIdError> for ApiError {
    fn from(err: ParseIdError) -> Self {
        ApiError::validation(format!("malformed {} id", err.kind())).with_details(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::validation("malformed request body").with_details(err.to_string())
    }
}

impl From<RelationError> for ApiError {
    fn from(err: RelationError) -> Self {
        match err {
            RelationError::Validation(msg) => {
                ApiError::validation("invalid relation request").with_details(msg)
            }
            RelationError::NotFound => ApiError::not_found("link endpoint not found"),
            other => ApiError::internal(&other),
        }
    }
}

impl From<ProgressError> for ApiError {
    fn from(err: ProgressError) -> Self {
        match err {
            ProgressError::NotFound(what) => ApiError::not_found(format!("{what} not found")),
            other => ApiError::internal(&other),
        }
    }
}

impl From<QuizServiceError> for ApiError {
    fn from(err: QuizServiceError) -> Self {
        match err {
            QuizServiceError::NotFound(what) => ApiError::not_found(format!("{what} not found")),
            QuizServiceError::NoQuestions(lesson) => ApiError::not_found("quiz not found")
                .with_details(format!("lesson {lesson} has no questions")),
            QuizServiceError::Grading(err) => {
                ApiError::validation("invalid submission").with_details(err.to_string())
            }
            other => ApiError::internal(&other),
        }
    }
}

fn require_user(caller: Option<UserId>) -> ApiResult<UserId> {
    caller.ok_or_else(ApiError::unauthenticated)
}

fn parse_id<I: EntityId>(raw: &str) -> ApiResult<I> {
    Ok(I::from_str(raw)?)
}

//
// ─── DTOS ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgressDto {
    pub total_lessons: u32,
    pub completed_lessons: u32,
    pub progress_percentage: u8,
    pub lessons: Vec<LessonCompletion>,
    pub completed_lesson_ids: Vec<LessonId>,
}

impl From<CourseProgress> for CourseProgressDto {
    fn from(progress: CourseProgress) -> Self {
        Self {
            completed_lesson_ids: progress.completed_lesson_ids(),
            total_lessons: progress.total_lessons,
            completed_lessons: progress.completed_lessons,
            progress_percentage: progress.progress_percentage,
            lessons: progress.lessons,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgressDto {
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentlyPassedDto {
    pub lesson_id: LessonId,
    pub recently_passed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkDto {
    pub relation: &'static str,
    pub parent: u64,
    pub child: u64,
    pub order: u32,
    /// Set on link requests: whether this call created the link.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
}

impl LinkDto {
    fn from_link<R: Relation>(link: &Link<R>) -> Self {
        Self {
            relation: R::NAME,
            parent: link.parent.value(),
            child: link.child.value(),
            order: link.order,
            created: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlinkDto {
    pub removed: bool,
}

/// Which junction an admin relation request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    CourseModules,
    ModuleLessons,
}

//
// ─── SUBMISSIONS ───────────────────────────────────────────────────────────────
//

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyedAnswer {
    question_id: QuestionId,
    selected: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SubmissionBody {
    Positional(Vec<usize>),
    Tagged(QuizSubmission),
    Keyed { answers: Vec<KeyedAnswer> },
}

/// Parse a submission body.
///
/// Accepts a bare array of option indexes (positional), the tagged
/// `{"mode": ..., "answers": ...}` form, or `{"answers": [{"questionId", "selected"}]}`.
///
/// # Errors
///
/// Returns a validation `ApiError` if the body matches none of these shapes.
pub fn parse_submission(raw: &str) -> ApiResult<QuizSubmission> {
    let body: SubmissionBody = serde_json::from_str(raw)?;
    Ok(match body {
        SubmissionBody::Positional(answers) => QuizSubmission::Positional(answers),
        SubmissionBody::Tagged(submission) => submission,
        SubmissionBody::Keyed { answers } => QuizSubmission::ByQuestion(
            answers
                .into_iter()
                .map(|a| (a.question_id, a.selected))
                .collect(),
        ),
    })
}

//
// ─── API ───────────────────────────────────────────────────────────────────────
//

/// Entry point for transports (HTTP handlers, CLI, jobs).
#[derive(Clone)]
pub struct CourseApi {
    progress: Arc<ProgressService>,
    quiz: Arc<QuizService>,
    backfill: Arc<BackfillService>,
    course_modules: RelationStore<CourseModules>,
    module_lessons: RelationStore<ModuleLessons>,
}

impl CourseApi {
    #[must_use]
    pub fn new(
        progress: Arc<ProgressService>,
        quiz: Arc<QuizService>,
        backfill: Arc<BackfillService>,
        course_modules: RelationStore<CourseModules>,
        module_lessons: RelationStore<ModuleLessons>,
    ) -> Self {
        Self {
            progress,
            quiz,
            backfill,
            course_modules,
            module_lessons,
        }
    }

    /// # Errors
    ///
    /// 401 without a caller, 400 for a malformed id, 404 for an unknown course.
    pub async fn get_course_progress(
        &self,
        caller: Option<UserId>,
        course_id: &str,
    ) -> ApiResult<CourseProgressDto> {
        let user = require_user(caller)?;
        let course: CourseId = parse_id(course_id)?;
        let progress = self.progress.course_progress_or_default(user, course).await?;
        Ok(progress.into())
    }

    /// # Errors
    ///
    /// 401 without a caller, 400 for a malformed id. Storage failures read
    /// as not completed.
    pub async fn get_lesson_progress(
        &self,
        caller: Option<UserId>,
        lesson_id: &str,
    ) -> ApiResult<LessonProgressDto> {
        let user = require_user(caller)?;
        let lesson: LessonId = parse_id(lesson_id)?;
        let completed = self.progress.lesson_progress_or_default(user, lesson).await;
        Ok(LessonProgressDto { completed })
    }

    /// # Errors
    ///
    /// 401 without a caller, 400 for a malformed id, 404 if the user or
    /// lesson is unknown.
    pub async fn mark_lesson_complete(
        &self,
        caller: Option<UserId>,
        lesson_id: &str,
    ) -> ApiResult<LessonProgress> {
        let user = require_user(caller)?;
        let lesson: LessonId = parse_id(lesson_id)?;
        Ok(self.progress.mark_lesson_complete(user, lesson).await?)
    }

    /// Admin-only reset of a lesson's completion.
    ///
    /// # Errors
    ///
    /// 400 for malformed ids, 404 if no progress record exists.
    pub async fn reset_lesson_progress(
        &self,
        user_id: &str,
        lesson_id: &str,
    ) -> ApiResult<LessonProgress> {
        let user = UserId::from_str(user_id)?;
        let lesson: LessonId = parse_id(lesson_id)?;
        Ok(self.progress.reset_lesson_progress(user, lesson).await?)
    }

    /// # Errors
    ///
    /// 400 for a malformed id, 404 if the lesson has no quiz.
    pub async fn get_quiz(&self, lesson_id: &str) -> ApiResult<Vec<QuizQuestionView>> {
        let lesson: LessonId = parse_id(lesson_id)?;
        Ok(self.quiz.get_quiz(lesson).await?)
    }

    /// # Errors
    ///
    /// 401 without a caller, 400 for a malformed id or submission, 404 if the
    /// lesson or its quiz is missing.
    pub async fn submit_quiz(
        &self,
        caller: Option<UserId>,
        lesson_id: &str,
        submission: &QuizSubmission,
    ) -> ApiResult<QuizResult> {
        let user = require_user(caller)?;
        let lesson: LessonId = parse_id(lesson_id)?;
        Ok(self.quiz.submit_quiz(user, lesson, submission).await?)
    }

    /// # Errors
    ///
    /// 401 without a caller, 400 for a malformed id.
    pub async fn recently_passed(
        &self,
        caller: Option<UserId>,
        lesson_id: &str,
    ) -> ApiResult<RecentlyPassedDto> {
        let user = require_user(caller)?;
        let lesson: LessonId = parse_id(lesson_id)?;
        let recently_passed = self.quiz.is_recently_completed(user, lesson).await?;
        Ok(RecentlyPassedDto {
            lesson_id: lesson,
            recently_passed,
        })
    }

    /// # Errors
    ///
    /// 401 without a caller, 400 for a malformed id.
    pub async fn attempt_history(
        &self,
        caller: Option<UserId>,
        lesson_id: &str,
    ) -> ApiResult<Vec<QuizAttempt>> {
        let user = require_user(caller)?;
        let lesson: LessonId = parse_id(lesson_id)?;
        Ok(self.quiz.attempt_history(user, lesson).await?)
    }

    /// Admin-triggered migration of legacy parent references. Item failures
    /// are reported in the body, never as an error.
    pub async fn run_backfill(&self) -> BackfillReport {
        self.backfill.run().await
    }

    /// # Errors
    ///
    /// 400 for malformed ids, 404 if either endpoint is unknown.
    pub async fn link(
        &self,
        kind: RelationKind,
        parent: &str,
        child: &str,
        order: u32,
    ) -> ApiResult<LinkDto> {
        match kind {
            RelationKind::CourseModules => {
                link_in(&self.course_modules, parent, child, order).await
            }
            RelationKind::ModuleLessons => {
                link_in(&self.module_lessons, parent, child, order).await
            }
        }
    }

    /// # Errors
    ///
    /// 400 for malformed ids.
    pub async fn unlink(
        &self,
        kind: RelationKind,
        parent: &str,
        child: &str,
    ) -> ApiResult<UnlinkDto> {
        match kind {
            RelationKind::CourseModules => unlink_in(&self.course_modules, parent, child).await,
            RelationKind::ModuleLessons => unlink_in(&self.module_lessons, parent, child).await,
        }
    }

    /// # Errors
    ///
    /// 400 for a malformed id.
    pub async fn children(&self, kind: RelationKind, parent: &str) -> ApiResult<Vec<LinkDto>> {
        match kind {
            RelationKind::CourseModules => children_in(&self.course_modules, parent).await,
            RelationKind::ModuleLessons => children_in(&self.module_lessons, parent).await,
        }
    }

    /// # Errors
    ///
    /// 400 for malformed ids or a child list that is not exactly the current
    /// sibling set.
    pub async fn reorder(
        &self,
        kind: RelationKind,
        parent: &str,
        children: &[String],
    ) -> ApiResult<Vec<LinkDto>> {
        match kind {
            RelationKind::CourseModules => reorder_in(&self.course_modules, parent, children).await,
            RelationKind::ModuleLessons => reorder_in(&self.module_lessons, parent, children).await,
        }
    }
}

async fn link_in<R: Relation>(
    store: &RelationStore<R>,
    parent: &str,
    child: &str,
    order: u32,
) -> ApiResult<LinkDto> {
    let parent: R::Parent = parse_id(parent)?;
    let child: R::Child = parse_id(child)?;
    let outcome = store.link_with_outcome(parent, child, order).await?;
    Ok(LinkDto {
        created: Some(outcome.is_created()),
        ..LinkDto::from_link(&outcome.link())
    })
}

async fn unlink_in<R: Relation>(
    store: &RelationStore<R>,
    parent: &str,
    child: &str,
) -> ApiResult<UnlinkDto> {
    let parent: R::Parent = parse_id(parent)?;
    let child: R::Child = parse_id(child)?;
    let removed = store.unlink(parent, child).await?;
    Ok(UnlinkDto { removed })
}

async fn children_in<R: Relation>(
    store: &RelationStore<R>,
    parent: &str,
) -> ApiResult<Vec<LinkDto>> {
    let parent: R::Parent = parse_id(parent)?;
    let links = store.list_children(parent).await?;
    Ok(links.iter().map(LinkDto::from_link).collect())
}

async fn reorder_in<R: Relation>(
    store: &RelationStore<R>,
    parent: &str,
    children: &[String],
) -> ApiResult<Vec<LinkDto>> {
    let parent: R::Parent = parse_id(parent)?;
    let ordered = children
        .iter()
        .map(|raw| parse_id::<R::Child>(raw))
        .collect::<ApiResult<Vec<_>>>()?;
    let links = store.reorder(parent, &ordered).await?;
    Ok(links.iter().map(LinkDto::from_link).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_map_to_status_codes() {
        assert_eq!(ApiError::validation("x").status_code(), 400);
        assert_eq!(ApiError::unauthenticated().status_code(), 401);
        assert_eq!(ApiError::not_found("x").status_code(), 404);
    }

    #[test]
    fn error_body_has_error_and_details_only() {
        let err = ApiError::not_found("course not found").with_details("course 9");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["error"], "course not found");
        assert_eq!(json["details"], "course 9");
        assert!(json.get("category").is_none());
    }

    #[test]
    fn malformed_ids_are_validation_errors() {
        let err = parse_id::<CourseId>("abc").unwrap_err();
        assert_eq!(err.category, ErrorCategory::Validation);
        assert!(err.error.contains("course"));
    }

    #[test]
    fn submissions_parse_in_every_shape() {
        assert_eq!(
            parse_submission("[0, 2, 1]").unwrap(),
            QuizSubmission::Positional(vec![0, 2, 1])
        );
        assert_eq!(
            parse_submission(r#"{"answers": [{"questionId": 4, "selected": 1}]}"#).unwrap(),
            QuizSubmission::ByQuestion(vec![(QuestionId::new(4), 1)])
        );
        assert_eq!(
            parse_submission(r#"{"mode": "positional", "answers": [1]}"#).unwrap(),
            QuizSubmission::Positional(vec![1])
        );
        let err = parse_submission(r#"{"answers": "nope"}"#).unwrap_err();
        assert_eq!(err.category, ErrorCategory::Validation);
    }

    #[test]
    fn grading_errors_are_client_errors() {
        let err: ApiError =
            QuizServiceError::Grading(course_core::grading::GradingError::NoQuestions).into();
        assert_eq!(err.status_code(), 400);
        let err: ApiError = QuizServiceError::NoQuestions(LessonId::new(1)).into();
        assert_eq!(err.status_code(), 404);
    }
}
