use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::model::{
    Course, CourseId, CourseModules, LegacyRef, Lesson, LessonId, LessonProgress, Link, Module,
    ModuleId, ModuleLessons, NewQuizAttempt, QuizAttempt, QuizQuestion, Relation, UserId,
};
use thiserror::Error;

pub use crate::memory::InMemoryRepository;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    /// A uniqueness constraint rejected the write (e.g. duplicate link pair).
    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Entity rows for courses, modules and lessons.
///
/// Authoring tools own these writes; the engine only needs lookups.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository access failure.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the module cannot be stored.
    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository access failure.
    async fn get_module(&self, id: ModuleId) -> Result<Option<Module>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` if the lesson cannot be stored.
    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository access failure.
    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Register a user id handed over by the auth layer. Existing users are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the user cannot be stored.
    async fn upsert_user(&self, user: UserId, created_at: DateTime<Utc>)
    -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository access failure.
    async fn user_exists(&self, user: UserId) -> Result<bool, StorageError>;
}

//
// ─── RELATIONS ─────────────────────────────────────────────────────────────────
//

/// Junction-table access for one relation.
#[async_trait]
pub trait LinkRepository<R: Relation>: Send + Sync {
    /// Insert a new link.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the `(parent, child)` pair already exists,
    /// or other storage errors.
    async fn insert_link(&self, link: &Link<R>) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository access failure.
    async fn get_link(
        &self,
        parent: R::Parent,
        child: R::Child,
    ) -> Result<Option<Link<R>>, StorageError>;

    /// Remove a link. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository access failure.
    async fn delete_link(&self, parent: R::Parent, child: R::Child) -> Result<bool, StorageError>;

    /// Links under `parent`, ascending by `order` (ties broken by child id).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository access failure.
    async fn children(&self, parent: R::Parent) -> Result<Vec<Link<R>>, StorageError>;

    /// Links under any of `parents`, grouped by parent in the given order and
    /// ascending by `order` within each parent.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository access failure.
    async fn children_of_many(&self, parents: &[R::Parent]) -> Result<Vec<Link<R>>, StorageError>;

    /// Set `order` for every `(child, order)` pair under `parent` in one unit.
    ///
    /// `orders` must cover the whole sibling set as it stands when the write
    /// is applied.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if any child is not linked to `parent`,
    /// and `StorageError::Conflict` if `parent` has children that `orders`
    /// leaves out. No order value is changed on error.
    async fn reorder(&self, parent: R::Parent, orders: &[(R::Child, u32)])
    -> Result<(), StorageError>;
}

/// Parent references held in legacy direct foreign-key columns.
#[async_trait]
pub trait LegacyLinkSource<R: Relation>: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on repository access failure.
    async fn legacy_refs(&self) -> Result<Vec<LegacyRef<R>>, StorageError>;
}

//
// ─── QUIZ ──────────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait QuizRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the question cannot be stored.
    async fn upsert_question(&self, question: &QuizQuestion) -> Result<(), StorageError>;

    /// Questions for a lesson, ascending by `order`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository access failure or if a stored
    /// question no longer validates.
    async fn questions_for_lesson(&self, lesson: LessonId)
    -> Result<Vec<QuizQuestion>, StorageError>;
}

/// Append-only attempt log. There is deliberately no update or delete.
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    /// Persist a new attempt and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the attempt cannot be stored.
    async fn append_attempt(&self, attempt: &NewQuizAttempt) -> Result<i64, StorageError>;

    /// All attempts of `user` on `lesson`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository access failure.
    async fn attempts_for(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Vec<QuizAttempt>, StorageError>;

    /// Whether a passing attempt was created at or after `since`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository access failure.
    async fn has_passing_attempt_since(
        &self,
        user: UserId,
        lesson: LessonId,
        since: DateTime<Utc>,
    ) -> Result<bool, StorageError>;
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on repository access failure.
    async fn get_progress(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError>;

    /// Upsert `completed = true`. Never writes `false`; keeps the first
    /// `completed_at` and refreshes `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be written.
    async fn mark_completed(
        &self,
        user: UserId,
        lesson: LessonId,
        at: DateTime<Utc>,
    ) -> Result<LessonProgress, StorageError>;

    /// The subset of `lessons` that `user` has completed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository access failure.
    async fn completed_among(
        &self,
        user: UserId,
        lessons: &[LessonId],
    ) -> Result<Vec<LessonId>, StorageError>;

    /// Explicitly clear completion. Returns `None` when no record exists.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be written.
    async fn reset_progress(
        &self,
        user: UserId,
        lesson: LessonId,
        at: DateTime<Utc>,
    ) -> Result<Option<LessonProgress>, StorageError>;
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub catalog: Arc<dyn CatalogRepository>,
    pub users: Arc<dyn UserRepository>,
    pub course_modules: Arc<dyn LinkRepository<CourseModules>>,
    pub module_lessons: Arc<dyn LinkRepository<ModuleLessons>>,
    pub legacy_course_modules: Arc<dyn LegacyLinkSource<CourseModules>>,
    pub legacy_module_lessons: Arc<dyn LegacyLinkSource<ModuleLessons>>,
    pub questions: Arc<dyn QuizRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub progress: Arc<dyn ProgressRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_backend(InMemoryRepository::new())
    }

    /// Wire every repository slot to the same backend.
    #[must_use]
    pub fn from_backend<B>(backend: B) -> Self
    where
        B: CatalogRepository
            + UserRepository
            + LinkRepository<CourseModules>
            + LinkRepository<ModuleLessons>
            + LegacyLinkSource<CourseModules>
            + LegacyLinkSource<ModuleLessons>
            + QuizRepository
            + AttemptRepository
            + ProgressRepository
            + Clone
            + 'static,
    {
        Self {
            catalog: Arc::new(backend.clone()),
            users: Arc::new(backend.clone()),
            course_modules: Arc::new(backend.clone()),
            module_lessons: Arc::new(backend.clone()),
            legacy_course_modules: Arc::new(backend.clone()),
            legacy_module_lessons: Arc::new(backend.clone()),
            questions: Arc::new(backend.clone()),
            attempts: Arc::new(backend.clone()),
            progress: Arc::new(backend),
        }
    }
}
