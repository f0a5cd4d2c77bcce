use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::model::{
    Course, CourseId, CourseModules, EntityId, LegacyRef, Lesson, LessonId, LessonProgress, Link,
    Module, ModuleId, ModuleLessons, NewQuizAttempt, QuestionId, QuizAttempt, QuizQuestion,
    Relation, UserId,
};

use crate::repository::{
    AttemptRepository, CatalogRepository, LegacyLinkSource, LinkRepository, ProgressRepository,
    QuizRepository, StorageError, UserRepository,
};

/// `(parent, child) -> order`, keyed by relation name.
type LinkTables = HashMap<&'static str, BTreeMap<(u64, u64), u32>>;

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    mutex
        .lock()
        .map_err(|e| StorageError::Connection(e.to_string()))
}

fn to_link<R: Relation>(parent: u64, child: u64, order: u32) -> Link<R> {
    Link::new(
        R::Parent::from_value(parent),
        R::Child::from_value(child),
        order,
    )
}

fn sort_links<R: Relation>(links: &mut [Link<R>]) {
    links.sort_by_key(|l| (l.order, l.child));
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    courses: Arc<Mutex<HashMap<CourseId, Course>>>,
    modules: Arc<Mutex<HashMap<ModuleId, Module>>>,
    lessons: Arc<Mutex<HashMap<LessonId, Lesson>>>,
    users: Arc<Mutex<HashMap<UserId, DateTime<Utc>>>>,
    links: Arc<Mutex<LinkTables>>,
    questions: Arc<Mutex<HashMap<QuestionId, QuizQuestion>>>,
    attempts: Arc<Mutex<Vec<QuizAttempt>>>,
    progress: Arc<Mutex<HashMap<(UserId, LessonId), LessonProgress>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Foreign-key check: referenced catalog rows must exist.
    fn require<I: EntityId>(&self, id: I) -> Result<(), StorageError> {
        let value = id.value();
        let exists = match I::KIND {
            "course" => lock(&self.courses)?.contains_key(&CourseId::new(value)),
            "module" => lock(&self.modules)?.contains_key(&ModuleId::new(value)),
            "lesson" => lock(&self.lessons)?.contains_key(&LessonId::new(value)),
            _ => lock(&self.questions)?.contains_key(&QuestionId::new(value)),
        };
        if exists {
            Ok(())
        } else {
            Err(StorageError::NotFound)
        }
    }
}

#[async_trait]
impl CatalogRepository for InMemoryRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        lock(&self.courses)?.insert(course.id(), course.clone());
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        Ok(lock(&self.courses)?.get(&id).cloned())
    }

    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError> {
        if let Some(course) = module.legacy_course_id() {
            self.require(course)?;
        }
        lock(&self.modules)?.insert(module.id(), module.clone());
        Ok(())
    }

    async fn get_module(&self, id: ModuleId) -> Result<Option<Module>, StorageError> {
        Ok(lock(&self.modules)?.get(&id).cloned())
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        if let Some(module) = lesson.legacy_module_id() {
            self.require(module)?;
        }
        lock(&self.lessons)?.insert(lesson.id(), lesson.clone());
        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        Ok(lock(&self.lessons)?.get(&id).cloned())
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn upsert_user(
        &self,
        user: UserId,
        created_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        lock(&self.users)?.entry(user).or_insert(created_at);
        Ok(())
    }

    async fn user_exists(&self, user: UserId) -> Result<bool, StorageError> {
        Ok(lock(&self.users)?.contains_key(&user))
    }
}

#[async_trait]
impl<R: Relation> LinkRepository<R> for InMemoryRepository {
    async fn insert_link(&self, link: &Link<R>) -> Result<(), StorageError> {
        self.require(link.parent)?;
        self.require(link.child)?;
        let mut guard = lock(&self.links)?;
        let table = guard.entry(R::NAME).or_default();
        let key = (link.parent.value(), link.child.value());
        if table.contains_key(&key) {
            return Err(StorageError::Conflict);
        }
        table.insert(key, link.order);
        Ok(())
    }

    async fn get_link(
        &self,
        parent: R::Parent,
        child: R::Child,
    ) -> Result<Option<Link<R>>, StorageError> {
        let guard = lock(&self.links)?;
        let key = (parent.value(), child.value());
        Ok(guard
            .get(R::NAME)
            .and_then(|table| table.get(&key))
            .map(|order| Link::new(parent, child, *order)))
    }

    async fn delete_link(&self, parent: R::Parent, child: R::Child) -> Result<bool, StorageError> {
        let mut guard = lock(&self.links)?;
        let key = (parent.value(), child.value());
        Ok(guard
            .get_mut(R::NAME)
            .is_some_and(|table| table.remove(&key).is_some()))
    }

    async fn children(&self, parent: R::Parent) -> Result<Vec<Link<R>>, StorageError> {
        <Self as LinkRepository<R>>::children_of_many(self, &[parent]).await
    }

    async fn children_of_many(&self, parents: &[R::Parent]) -> Result<Vec<Link<R>>, StorageError> {
        let guard = lock(&self.links)?;
        let Some(table) = guard.get(R::NAME) else {
            return Ok(Vec::new());
        };

        let mut seen = HashSet::with_capacity(parents.len());
        let mut out = Vec::new();
        for parent in parents {
            if !seen.insert(*parent) {
                continue;
            }
            let p = parent.value();
            let mut links: Vec<Link<R>> = table
                .range((p, u64::MIN)..=(p, u64::MAX))
                .map(|((parent, child), order)| to_link::<R>(*parent, *child, *order))
                .collect();
            sort_links(&mut links);
            out.extend(links);
        }
        Ok(out)
    }

    async fn reorder(
        &self,
        parent: R::Parent,
        orders: &[(R::Child, u32)],
    ) -> Result<(), StorageError> {
        let mut guard = lock(&self.links)?;
        let Some(table) = guard.get_mut(R::NAME) else {
            return if orders.is_empty() {
                Ok(())
            } else {
                Err(StorageError::NotFound)
            };
        };
        let p = parent.value();

        // Validate the whole batch before touching anything.
        if orders
            .iter()
            .any(|(child, _)| !table.contains_key(&(p, child.value())))
        {
            return Err(StorageError::NotFound);
        }
        let siblings = table.range((p, u64::MIN)..=(p, u64::MAX)).count();
        if siblings != orders.len() {
            return Err(StorageError::Conflict);
        }

        for (child, order) in orders {
            table.insert((p, child.value()), *order);
        }
        Ok(())
    }
}

#[async_trait]
impl LegacyLinkSource<CourseModules> for InMemoryRepository {
    async fn legacy_refs(&self) -> Result<Vec<LegacyRef<CourseModules>>, StorageError> {
        let guard = lock(&self.modules)?;
        let mut refs: Vec<LegacyRef<CourseModules>> = guard
            .values()
            .filter_map(|m| m.legacy_course_id().map(|c| LegacyRef::new(c, m.id())))
            .collect();
        refs.sort_by_key(|r| (r.child, r.parent));
        Ok(refs)
    }
}

#[async_trait]
impl LegacyLinkSource<ModuleLessons> for InMemoryRepository {
    async fn legacy_refs(&self) -> Result<Vec<LegacyRef<ModuleLessons>>, StorageError> {
        let guard = lock(&self.lessons)?;
        let mut refs: Vec<LegacyRef<ModuleLessons>> = guard
            .values()
            .filter_map(|l| l.legacy_module_id().map(|m| LegacyRef::new(m, l.id())))
            .collect();
        refs.sort_by_key(|r| (r.child, r.parent));
        Ok(refs)
    }
}

#[async_trait]
impl QuizRepository for InMemoryRepository {
    async fn upsert_question(&self, question: &QuizQuestion) -> Result<(), StorageError> {
        self.require(question.lesson_id())?;
        lock(&self.questions)?.insert(question.id(), question.clone());
        Ok(())
    }

    async fn questions_for_lesson(
        &self,
        lesson: LessonId,
    ) -> Result<Vec<QuizQuestion>, StorageError> {
        let guard = lock(&self.questions)?;
        let mut questions: Vec<QuizQuestion> = guard
            .values()
            .filter(|q| q.lesson_id() == lesson)
            .cloned()
            .collect();
        questions.sort_by_key(|q| (q.order(), q.id()));
        Ok(questions)
    }
}

#[async_trait]
impl AttemptRepository for InMemoryRepository {
    async fn append_attempt(&self, attempt: &NewQuizAttempt) -> Result<i64, StorageError> {
        self.require(attempt.lesson_id)?;
        let mut guard = lock(&self.attempts)?;
        let id = i64::try_from(guard.len() + 1)
            .map_err(|_| StorageError::Serialization("attempt id overflow".into()))?;
        guard.push(QuizAttempt::from_new(id, attempt.clone()));
        Ok(id)
    }

    async fn attempts_for(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Vec<QuizAttempt>, StorageError> {
        let guard = lock(&self.attempts)?;
        Ok(guard
            .iter()
            .filter(|a| a.user_id == user && a.lesson_id == lesson)
            .cloned()
            .collect())
    }

    async fn has_passing_attempt_since(
        &self,
        user: UserId,
        lesson: LessonId,
        since: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let guard = lock(&self.attempts)?;
        Ok(guard
            .iter()
            .any(|a| a.user_id == user && a.lesson_id == lesson && a.passed_since(since)))
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Option<LessonProgress>, StorageError> {
        Ok(lock(&self.progress)?.get(&(user, lesson)).cloned())
    }

    async fn mark_completed(
        &self,
        user: UserId,
        lesson: LessonId,
        at: DateTime<Utc>,
    ) -> Result<LessonProgress, StorageError> {
        self.require(lesson)?;
        let mut guard = lock(&self.progress)?;
        let record = guard
            .entry((user, lesson))
            .and_modify(|p| p.mark_completed(at))
            .or_insert_with(|| LessonProgress::completed_at(user, lesson, at));
        Ok(record.clone())
    }

    async fn completed_among(
        &self,
        user: UserId,
        lessons: &[LessonId],
    ) -> Result<Vec<LessonId>, StorageError> {
        let guard = lock(&self.progress)?;
        Ok(lessons
            .iter()
            .filter(|lesson| guard.get(&(user, **lesson)).is_some_and(|p| p.completed))
            .copied()
            .collect())
    }

    async fn reset_progress(
        &self,
        user: UserId,
        lesson: LessonId,
        at: DateTime<Utc>,
    ) -> Result<Option<LessonProgress>, StorageError> {
        let mut guard = lock(&self.progress)?;
        Ok(guard.get_mut(&(user, lesson)).map(|p| {
            p.reset(at);
            p.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{CourseModuleLink, ModuleLessonLink};
    use course_core::time::fixed_now;

    /// Course 1, modules 1..=2, lessons 1..=3 and 10..=11.
    async fn seeded() -> InMemoryRepository {
        let repo = InMemoryRepository::new();
        repo.upsert_course(&Course::new(CourseId::new(1), "Rust").unwrap())
            .await
            .unwrap();
        for m in 1..=2 {
            repo.upsert_module(&Module::new(ModuleId::new(m), format!("M{m}")).unwrap())
                .await
                .unwrap();
        }
        for l in [1, 2, 3, 10, 11] {
            repo.upsert_lesson(&Lesson::new(LessonId::new(l), format!("L{l}")).unwrap())
                .await
                .unwrap();
        }
        repo
    }

    #[tokio::test]
    async fn duplicate_link_is_a_conflict() {
        let repo = seeded().await;
        let link = CourseModuleLink::new(CourseId::new(1), ModuleId::new(2), 0);

        repo.insert_link(&link).await.unwrap();
        let err = repo.insert_link(&link).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));

        let children = LinkRepository::<CourseModules>::children(&repo, CourseId::new(1))
            .await
            .unwrap();
        assert_eq!(children, vec![link]);
    }

    #[tokio::test]
    async fn link_to_missing_entity_is_not_found() {
        let repo = seeded().await;

        let missing_child = repo
            .insert_link(&CourseModuleLink::new(CourseId::new(1), ModuleId::new(404), 0))
            .await
            .unwrap_err();
        assert!(matches!(missing_child, StorageError::NotFound));

        let missing_parent = repo
            .insert_link(&ModuleLessonLink::new(ModuleId::new(404), LessonId::new(1), 0))
            .await
            .unwrap_err();
        assert!(matches!(missing_parent, StorageError::NotFound));

        let children = LinkRepository::<CourseModules>::children(&repo, CourseId::new(1))
            .await
            .unwrap();
        assert!(children.is_empty());
    }

    #[tokio::test]
    async fn relations_are_stored_separately() {
        let repo = seeded().await;
        repo.insert_link(&CourseModuleLink::new(CourseId::new(1), ModuleId::new(1), 0))
            .await
            .unwrap();
        // Same numeric pair in the other junction is not a duplicate.
        repo.insert_link(&ModuleLessonLink::new(ModuleId::new(1), LessonId::new(1), 0))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reorder_is_all_or_nothing() {
        let repo = seeded().await;
        let parent = ModuleId::new(1);
        for (child, order) in [(10, 0), (11, 1)] {
            repo.insert_link(&ModuleLessonLink::new(parent, LessonId::new(child), order))
                .await
                .unwrap();
        }

        let err = LinkRepository::<ModuleLessons>::reorder(
            &repo,
            parent,
            &[(LessonId::new(11), 0), (LessonId::new(99), 1)],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));

        let partial =
            LinkRepository::<ModuleLessons>::reorder(&repo, parent, &[(LessonId::new(11), 0)])
                .await
                .unwrap_err();
        assert!(matches!(partial, StorageError::Conflict));

        let children = LinkRepository::<ModuleLessons>::children(&repo, parent)
            .await
            .unwrap();
        let ids: Vec<_> = children.iter().map(|l| l.child).collect();
        assert_eq!(ids, vec![LessonId::new(10), LessonId::new(11)]);
    }

    #[tokio::test]
    async fn mark_completed_never_downgrades() {
        let repo = seeded().await;
        let user = UserId::random();
        let lesson = LessonId::new(3);
        let now = fixed_now();

        let first = repo.mark_completed(user, lesson, now).await.unwrap();
        let second = repo
            .mark_completed(user, lesson, now + chrono::Duration::hours(1))
            .await
            .unwrap();

        assert!(first.completed && second.completed);
        assert_eq!(second.completed_at, Some(now));
        assert_eq!(
            repo.completed_among(user, &[lesson, LessonId::new(4)])
                .await
                .unwrap(),
            vec![lesson]
        );
    }

    #[tokio::test]
    async fn progress_for_missing_lesson_is_not_found() {
        let repo = seeded().await;
        let err = repo
            .mark_completed(UserId::random(), LessonId::new(404), fixed_now())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn legacy_refs_come_from_parent_columns() {
        let repo = seeded().await;
        let module = Module::new(ModuleId::new(2), "Intro")
            .unwrap()
            .with_legacy_course(CourseId::new(1));
        repo.upsert_module(&module).await.unwrap();

        let dangling = Module::new(ModuleId::new(3), "Orphan")
            .unwrap()
            .with_legacy_course(CourseId::new(404));
        let err = repo.upsert_module(&dangling).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));

        let refs = LegacyLinkSource::<CourseModules>::legacy_refs(&repo)
            .await
            .unwrap();
        assert_eq!(refs, vec![LegacyRef::new(CourseId::new(1), ModuleId::new(2))]);
    }
}
