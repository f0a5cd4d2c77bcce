use std::sync::Arc;

use course_core::model::{CourseModules, ModuleLessons};
use storage::repository::Storage;

use crate::Clock;
use crate::api::CourseApi;
use crate::backfill_service::BackfillService;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;
use crate::quiz_service::QuizService;
use crate::relation_service::RelationStore;

/// Assembles every service over one `Storage`.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    course_modules: RelationStore<CourseModules>,
    module_lessons: RelationStore<ModuleLessons>,
    progress: Arc<ProgressService>,
    quiz: Arc<QuizService>,
    backfill: Arc<BackfillService>,
    api: CourseApi,
}

impl AppServices {
    #[must_use]
    pub fn new(storage: Storage, clock: Clock) -> Self {
        let course_modules = RelationStore::new(Arc::clone(&storage.course_modules));
        let module_lessons = RelationStore::new(Arc::clone(&storage.module_lessons));

        let progress = Arc::new(ProgressService::new(
            clock,
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.users),
            Arc::clone(&storage.course_modules),
            Arc::clone(&storage.module_lessons),
            Arc::clone(&storage.progress),
        ));
        let quiz = Arc::new(QuizService::new(
            clock,
            Arc::clone(&storage.catalog),
            Arc::clone(&storage.questions),
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.progress),
        ));
        let backfill = Arc::new(BackfillService::new(
            course_modules.clone(),
            module_lessons.clone(),
            Arc::clone(&storage.legacy_course_modules),
            Arc::clone(&storage.legacy_module_lessons),
        ));
        let api = CourseApi::new(
            Arc::clone(&progress),
            Arc::clone(&quiz),
            Arc::clone(&backfill),
            course_modules.clone(),
            module_lessons.clone(),
        );

        Self {
            storage,
            course_modules,
            module_lessons,
            progress,
            quiz,
            backfill,
            api,
        }
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if the database cannot be opened or migrated.
    pub async fn new_sqlite(
        db_url: &str,
        max_connections: u32,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite_with(db_url, max_connections).await?;
        tracing::debug!(db_url, "sqlite storage ready");
        Ok(Self::new(storage, clock))
    }

    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::new(Storage::in_memory(), clock)
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn course_modules(&self) -> RelationStore<CourseModules> {
        self.course_modules.clone()
    }

    #[must_use]
    pub fn module_lessons(&self) -> RelationStore<ModuleLessons> {
        self.module_lessons.clone()
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn quiz(&self) -> Arc<QuizService> {
        Arc::clone(&self.quiz)
    }

    #[must_use]
    pub fn backfill(&self) -> Arc<BackfillService> {
        Arc::clone(&self.backfill)
    }

    #[must_use]
    pub fn api(&self) -> &CourseApi {
        &self.api
    }
}
