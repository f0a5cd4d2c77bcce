use chrono::{DateTime, Utc};
use course_core::model::{
    Course, CourseId, CourseModules, LegacyRef, Lesson, LessonId, Module, ModuleId, ModuleLessons,
    UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{db_err, id_from_i64, id_to_i64, ser};
use crate::repository::{CatalogRepository, LegacyLinkSource, StorageError, UserRepository};

#[async_trait::async_trait]
impl CatalogRepository for SqliteRepository {
    async fn upsert_course(&self, course: &Course) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO courses (id, title)
            VALUES (?1, ?2)
            ON CONFLICT(id) DO UPDATE SET title = excluded.title
            ",
        )
        .bind(id_to_i64(course.id())?)
        .bind(course.title())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        tracing::debug!(course_id = %course.id(), "upserted course");
        Ok(())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let row = sqlx::query("SELECT id, title FROM courses WHERE id = ?1")
            .bind(id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(|row| {
            Course::new(
                id_from_i64(row.try_get("id").map_err(ser)?)?,
                row.try_get::<String, _>("title").map_err(ser)?,
            )
            .map_err(ser)
        })
        .transpose()
    }

    async fn upsert_module(&self, module: &Module) -> Result<(), StorageError> {
        let legacy = module.legacy_course_id().map(id_to_i64).transpose()?;

        sqlx::query(
            r"
            INSERT INTO modules (id, title, course_id)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                course_id = excluded.course_id
            ",
        )
        .bind(id_to_i64(module.id())?)
        .bind(module.title())
        .bind(legacy)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        tracing::debug!(module_id = %module.id(), "upserted module");
        Ok(())
    }

    async fn get_module(&self, id: ModuleId) -> Result<Option<Module>, StorageError> {
        let row = sqlx::query("SELECT id, title, course_id FROM modules WHERE id = ?1")
            .bind(id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(module_from_row).transpose()
    }

    async fn upsert_lesson(&self, lesson: &Lesson) -> Result<(), StorageError> {
        let legacy = lesson.legacy_module_id().map(id_to_i64).transpose()?;

        sqlx::query(
            r"
            INSERT INTO lessons (id, title, module_id)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                module_id = excluded.module_id
            ",
        )
        .bind(id_to_i64(lesson.id())?)
        .bind(lesson.title())
        .bind(legacy)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        tracing::debug!(lesson_id = %lesson.id(), "upserted lesson");
        Ok(())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let row = sqlx::query("SELECT id, title, module_id FROM lessons WHERE id = ?1")
            .bind(id_to_i64(id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.as_ref().map(lesson_from_row).transpose()
    }
}

#[async_trait::async_trait]
impl UserRepository for SqliteRepository {
    async fn upsert_user(
        &self,
        user: UserId,
        created_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO users (id, created_at)
            VALUES (?1, ?2)
            ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(user.to_string())
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn user_exists(&self, user: UserId) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM users WHERE id = ?1")
            .bind(user.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(row.is_some())
    }
}

#[async_trait::async_trait]
impl LegacyLinkSource<CourseModules> for SqliteRepository {
    async fn legacy_refs(&self) -> Result<Vec<LegacyRef<CourseModules>>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT course_id, id FROM modules
            WHERE course_id IS NOT NULL
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| -> Result<LegacyRef<CourseModules>, StorageError> {
                Ok(LegacyRef::new(
                    id_from_i64(row.try_get("course_id").map_err(ser)?)?,
                    id_from_i64(row.try_get("id").map_err(ser)?)?,
                ))
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl LegacyLinkSource<ModuleLessons> for SqliteRepository {
    async fn legacy_refs(&self) -> Result<Vec<LegacyRef<ModuleLessons>>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT module_id, id FROM lessons
            WHERE module_id IS NOT NULL
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| -> Result<LegacyRef<ModuleLessons>, StorageError> {
                Ok(LegacyRef::new(
                    id_from_i64(row.try_get("module_id").map_err(ser)?)?,
                    id_from_i64(row.try_get("id").map_err(ser)?)?,
                ))
            })
            .collect()
    }
}

fn module_from_row(row: &SqliteRow) -> Result<Module, StorageError> {
    let module = Module::new(
        id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
    )
    .map_err(ser)?;

    Ok(match row.try_get::<Option<i64>, _>("course_id").map_err(ser)? {
        Some(course_id) => module.with_legacy_course(id_from_i64(course_id)?),
        None => module,
    })
}

fn lesson_from_row(row: &SqliteRow) -> Result<Lesson, StorageError> {
    let lesson = Lesson::new(
        id_from_i64(row.try_get("id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
    )
    .map_err(ser)?;

    Ok(match row.try_get::<Option<i64>, _>("module_id").map_err(ser)? {
        Some(module_id) => lesson.with_legacy_module(id_from_i64(module_id)?),
        None => lesson,
    })
}
