use std::collections::HashSet;
use std::sync::Arc;

use course_core::model::{
    CourseId, CourseModules, CourseProgress, LessonCompletion, LessonId, LessonProgress,
    ModuleId, ModuleLessons, UserId,
};
use storage::repository::{CatalogRepository, LinkRepository, ProgressRepository, UserRepository};

use crate::Clock;
use crate::error::ProgressError;

/// Per-user completion state and course rollups.
#[derive(Clone)]
pub struct ProgressService {
    clock: Clock,
    catalog: Arc<dyn CatalogRepository>,
    users: Arc<dyn UserRepository>,
    course_modules: Arc<dyn LinkRepository<CourseModules>>,
    module_lessons: Arc<dyn LinkRepository<ModuleLessons>>,
    progress: Arc<dyn ProgressRepository>,
}

impl ProgressService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn CatalogRepository>,
        users: Arc<dyn UserRepository>,
        course_modules: Arc<dyn LinkRepository<CourseModules>>,
        module_lessons: Arc<dyn LinkRepository<ModuleLessons>>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            catalog,
            users,
            course_modules,
            module_lessons,
            progress,
        }
    }

    /// Lessons reachable from `course` through the junction tables, each once,
    /// in display order (module order, then lesson order).
    async fn course_lessons(&self, course: CourseId) -> Result<Vec<LessonId>, ProgressError> {
        let mut seen_modules = HashSet::new();
        let modules: Vec<ModuleId> = self
            .course_modules
            .children(course)
            .await?
            .into_iter()
            .map(|link| link.child)
            .filter(|module| seen_modules.insert(*module))
            .collect();

        let mut seen_lessons = HashSet::new();
        let lessons = self
            .module_lessons
            .children_of_many(&modules)
            .await?
            .into_iter()
            .map(|link| link.child)
            .filter(|lesson| seen_lessons.insert(*lesson))
            .collect();
        Ok(lessons)
    }

    /// Completion rollup for `user` over every lesson of `course`.
    ///
    /// A lesson reachable through several modules counts once. A course
    /// without lessons yields a zero percentage rather than an error.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NotFound` for an unknown course and
    /// `ProgressError::Upstream` on storage failure.
    pub async fn compute_course_progress(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<CourseProgress, ProgressError> {
        if self.catalog.get_course(course).await?.is_none() {
            return Err(ProgressError::NotFound("course"));
        }

        let lessons = self.course_lessons(course).await?;
        let completed: HashSet<LessonId> = self
            .progress
            .completed_among(user, &lessons)
            .await?
            .into_iter()
            .collect();

        let rollup = CourseProgress::from_lessons(
            lessons
                .into_iter()
                .map(|lesson_id| LessonCompletion {
                    lesson_id,
                    completed: completed.contains(&lesson_id),
                })
                .collect(),
        );
        tracing::debug!(
            user_id = %user,
            course_id = %course,
            total = rollup.total_lessons,
            completed = rollup.completed_lessons,
            "computed course progress"
        );
        Ok(rollup)
    }

    /// Learner-facing variant of [`ProgressService::compute_course_progress`].
    ///
    /// An unknown course still fails; any other failure is logged and the
    /// zeroed rollup is returned instead.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NotFound` for an unknown course.
    pub async fn course_progress_or_default(
        &self,
        user: UserId,
        course: CourseId,
    ) -> Result<CourseProgress, ProgressError> {
        match self.compute_course_progress(user, course).await {
            Ok(progress) => Ok(progress),
            Err(err @ ProgressError::NotFound(_)) => Err(err),
            Err(err) => {
                tracing::warn!(
                    user_id = %user,
                    course_id = %course,
                    error = %err,
                    "course progress unavailable, serving zeroed rollup"
                );
                Ok(CourseProgress::zeroed())
            }
        }
    }

    /// Whether `user` has completed `lesson`; `false` when nothing is recorded.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Upstream` on storage failure.
    pub async fn compute_lesson_progress(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<bool, ProgressError> {
        Ok(self
            .progress
            .get_progress(user, lesson)
            .await?
            .is_some_and(|p| p.completed))
    }

    /// Learner-facing variant of [`ProgressService::compute_lesson_progress`]:
    /// a storage failure is logged and reads as not completed.
    pub async fn lesson_progress_or_default(&self, user: UserId, lesson: LessonId) -> bool {
        self.compute_lesson_progress(user, lesson)
            .await
            .unwrap_or_else(|err| {
                tracing::warn!(
                    user_id = %user,
                    lesson_id = %lesson,
                    error = %err,
                    "lesson progress unavailable, serving not completed"
                );
                false
            })
    }

    /// Mark `lesson` completed for `user`. Repeating the call keeps the record
    /// completed and its first completion time.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NotFound` if the user or lesson is unknown and
    /// `ProgressError::Upstream` on storage failure.
    pub async fn mark_lesson_complete(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<LessonProgress, ProgressError> {
        if !self.users.user_exists(user).await? {
            return Err(ProgressError::NotFound("user"));
        }
        if self.catalog.get_lesson(lesson).await?.is_none() {
            return Err(ProgressError::NotFound("lesson"));
        }

        let record = self
            .progress
            .mark_completed(user, lesson, self.clock.now())
            .await?;
        tracing::info!(user_id = %user, lesson_id = %lesson, "lesson marked complete");
        Ok(record)
    }

    /// Clear completion for `user` on `lesson`. This is the only way a
    /// completed lesson becomes incomplete again.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::NotFound` if no progress record exists and
    /// `ProgressError::Upstream` on storage failure.
    pub async fn reset_lesson_progress(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<LessonProgress, ProgressError> {
        self.progress
            .reset_progress(user, lesson, self.clock.now())
            .await?
            .ok_or(ProgressError::NotFound("progress record"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use chrono::Duration;
    use course_core::model::{Course, Lesson, Link, Module};
    use course_core::time::fixed_now;
    use storage::repository::{InMemoryRepository, StorageError};

    fn service(repo: &InMemoryRepository, clock: Clock) -> ProgressService {
        ProgressService::new(
            clock,
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    async fn seed_shared_lesson(repo: &InMemoryRepository) {
        repo.upsert_course(&Course::new(CourseId::new(1), "C").unwrap())
            .await
            .unwrap();
        for m in 1..=2 {
            repo.upsert_module(&Module::new(ModuleId::new(m), format!("M{m}")).unwrap())
                .await
                .unwrap();
        }
        for l in 1..=3 {
            repo.upsert_lesson(&Lesson::new(LessonId::new(l), format!("L{l}")).unwrap())
                .await
                .unwrap();
        }
        for (module, order) in [(1, 0), (2, 1)] {
            repo.insert_link(&Link::<CourseModules>::new(
                CourseId::new(1),
                ModuleId::new(module),
                order,
            ))
            .await
            .unwrap();
        }
        // Lesson 2 is reachable through both modules.
        for (module, lesson, order) in [(1, 1, 0), (1, 2, 1), (2, 2, 0), (2, 3, 1)] {
            repo.insert_link(&Link::<ModuleLessons>::new(
                ModuleId::new(module),
                LessonId::new(lesson),
                order,
            ))
            .await
            .unwrap();
        }
    }

    #[tokio::test]
    async fn lessons_reached_twice_count_once() {
        let repo = InMemoryRepository::new();
        seed_shared_lesson(&repo).await;
        let user = UserId::random();
        repo.mark_completed(user, LessonId::new(2), fixed_now())
            .await
            .unwrap();

        let progress = service(&repo, Clock::fixed(fixed_now()))
            .compute_course_progress(user, CourseId::new(1))
            .await
            .unwrap();

        assert_eq!(progress.total_lessons, 3);
        assert_eq!(progress.completed_lessons, 1);
        assert_eq!(progress.progress_percentage, 33);
        let order: Vec<u64> = progress.lessons.iter().map(|l| l.lesson_id.value()).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert_eq!(progress.completed_lesson_ids(), vec![LessonId::new(2)]);
    }

    #[tokio::test]
    async fn empty_course_is_zero_not_an_error() {
        let repo = InMemoryRepository::new();
        repo.upsert_course(&Course::new(CourseId::new(5), "Empty").unwrap())
            .await
            .unwrap();

        let progress = service(&repo, Clock::fixed(fixed_now()))
            .compute_course_progress(UserId::random(), CourseId::new(5))
            .await
            .unwrap();
        assert_eq!(progress, CourseProgress::zeroed());
    }

    #[tokio::test]
    async fn unknown_course_is_not_found_even_for_learners() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo, Clock::fixed(fixed_now()));

        let err = svc
            .course_progress_or_default(UserId::random(), CourseId::new(404))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressError::NotFound("course")));
    }

    struct BrokenLinks;

    #[async_trait]
    impl LinkRepository<CourseModules> for BrokenLinks {
        async fn insert_link(&self, _link: &Link<CourseModules>) -> Result<(), StorageError> {
            Err(StorageError::Connection("down".into()))
        }
        async fn get_link(
            &self,
            _parent: CourseId,
            _child: ModuleId,
        ) -> Result<Option<Link<CourseModules>>, StorageError> {
            Err(StorageError::Connection("down".into()))
        }
        async fn delete_link(
            &self,
            _parent: CourseId,
            _child: ModuleId,
        ) -> Result<bool, StorageError> {
            Err(StorageError::Connection("down".into()))
        }
        async fn children(
            &self,
            _parent: CourseId,
        ) -> Result<Vec<Link<CourseModules>>, StorageError> {
            Err(StorageError::Connection("down".into()))
        }
        async fn children_of_many(
            &self,
            _parents: &[CourseId],
        ) -> Result<Vec<Link<CourseModules>>, StorageError> {
            Err(StorageError::Connection("down".into()))
        }
        async fn reorder(
            &self,
            _parent: CourseId,
            _orders: &[(ModuleId, u32)],
        ) -> Result<(), StorageError> {
            Err(StorageError::Connection("down".into()))
        }
    }

    #[tokio::test]
    async fn learner_reads_degrade_to_zero_on_storage_failure() {
        let repo = InMemoryRepository::new();
        repo.upsert_course(&Course::new(CourseId::new(1), "C").unwrap())
            .await
            .unwrap();
        let svc = ProgressService::new(
            Clock::fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(BrokenLinks),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        );

        let raw = svc
            .compute_course_progress(UserId::random(), CourseId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(raw, ProgressError::Upstream(_)));

        let degraded = svc
            .course_progress_or_default(UserId::random(), CourseId::new(1))
            .await
            .unwrap();
        assert_eq!(degraded, CourseProgress::zeroed());
    }

    struct BrokenProgress;

    #[async_trait]
    impl ProgressRepository for BrokenProgress {
        async fn get_progress(
            &self,
            _user: UserId,
            _lesson: LessonId,
        ) -> Result<Option<LessonProgress>, StorageError> {
            Err(StorageError::Connection("down".into()))
        }
        async fn mark_completed(
            &self,
            _user: UserId,
            _lesson: LessonId,
            _at: chrono::DateTime<chrono::Utc>,
        ) -> Result<LessonProgress, StorageError> {
            Err(StorageError::Connection("down".into()))
        }
        async fn completed_among(
            &self,
            _user: UserId,
            _lessons: &[LessonId],
        ) -> Result<Vec<LessonId>, StorageError> {
            Err(StorageError::Connection("down".into()))
        }
        async fn reset_progress(
            &self,
            _user: UserId,
            _lesson: LessonId,
            _at: chrono::DateTime<chrono::Utc>,
        ) -> Result<Option<LessonProgress>, StorageError> {
            Err(StorageError::Connection("down".into()))
        }
    }

    #[tokio::test]
    async fn lesson_reads_degrade_to_not_completed() {
        let repo = InMemoryRepository::new();
        let svc = ProgressService::new(
            Clock::fixed(fixed_now()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(BrokenProgress),
        );
        let user = UserId::random();

        let raw = svc
            .compute_lesson_progress(user, LessonId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(raw, ProgressError::Upstream(_)));
        assert!(!svc.lesson_progress_or_default(user, LessonId::new(1)).await);
    }

    #[tokio::test]
    async fn mark_complete_requires_known_user_and_lesson() {
        let repo = InMemoryRepository::new();
        let svc = service(&repo, Clock::fixed(fixed_now()));
        let user = UserId::random();

        let err = svc
            .mark_lesson_complete(user, LessonId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressError::NotFound("user")));

        repo.upsert_user(user, fixed_now()).await.unwrap();
        let err = svc
            .mark_lesson_complete(user, LessonId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressError::NotFound("lesson")));
    }

    #[tokio::test]
    async fn repeated_completion_never_reverts() {
        let repo = InMemoryRepository::new();
        let user = UserId::random();
        repo.upsert_user(user, fixed_now()).await.unwrap();
        repo.upsert_lesson(&Lesson::new(LessonId::new(1), "L1").unwrap())
            .await
            .unwrap();

        let mut clock = Clock::fixed(fixed_now());
        let first = service(&repo, clock)
            .mark_lesson_complete(user, LessonId::new(1))
            .await
            .unwrap();
        clock.advance(Duration::hours(2));
        let svc = service(&repo, clock);
        let second = svc.mark_lesson_complete(user, LessonId::new(1)).await.unwrap();

        assert!(second.completed);
        assert_eq!(second.completed_at, first.completed_at);
        assert!(svc.compute_lesson_progress(user, LessonId::new(1)).await.unwrap());
    }

    #[tokio::test]
    async fn reset_is_explicit_and_requires_a_record() {
        let repo = InMemoryRepository::new();
        let user = UserId::random();
        let svc = service(&repo, Clock::fixed(fixed_now()));

        let err = svc
            .reset_lesson_progress(user, LessonId::new(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressError::NotFound(_)));

        repo.upsert_lesson(&Lesson::new(LessonId::new(1), "L1").unwrap())
            .await
            .unwrap();
        repo.mark_completed(user, LessonId::new(1), fixed_now())
            .await
            .unwrap();
        let reset = svc.reset_lesson_progress(user, LessonId::new(1)).await.unwrap();
        assert!(!reset.completed);
        assert!(!svc.compute_lesson_progress(user, LessonId::new(1)).await.unwrap());
    }
}
