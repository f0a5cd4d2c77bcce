use thiserror::Error;

use crate::model::ids::{CourseId, LessonId, ModuleId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("{0} title cannot be empty")]
    EmptyTitle(&'static str),
}

fn normalize_title(kind: &'static str, title: impl Into<String>) -> Result<String, CatalogError> {
    let title = title.into();
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::EmptyTitle(kind));
    }
    Ok(trimmed.to_owned())
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// Top-level learning product. Its modules hang off `CourseModuleLink`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    id: CourseId,
    title: String,
}

impl Course {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyTitle` if the title is blank.
    pub fn new(id: CourseId, title: impl Into<String>) -> Result<Self, CatalogError> {
        Ok(Self {
            id,
            title: normalize_title("course", title)?,
        })
    }

    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }
}

//
// ─── MODULE ────────────────────────────────────────────────────────────────────
//

/// Named grouping of lessons.
///
/// `legacy_course_id` is the pre-junction-table parent reference. Runtime
/// traversal never consults it; only the relation backfill reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    id: ModuleId,
    title: String,
    legacy_course_id: Option<CourseId>,
}

impl Module {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyTitle` if the title is blank.
    pub fn new(id: ModuleId, title: impl Into<String>) -> Result<Self, CatalogError> {
        Ok(Self {
            id,
            title: normalize_title("module", title)?,
            legacy_course_id: None,
        })
    }

    #[must_use]
    pub fn with_legacy_course(mut self, course_id: CourseId) -> Self {
        self.legacy_course_id = Some(course_id);
        self
    }

    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn legacy_course_id(&self) -> Option<CourseId> {
        self.legacy_course_id
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// Atomic learning unit, optionally carrying a quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    id: LessonId,
    title: String,
    legacy_module_id: Option<ModuleId>,
}

impl Lesson {
    /// # Errors
    ///
    /// Returns `CatalogError::EmptyTitle` if the title is blank.
    pub fn new(id: LessonId, title: impl Into<String>) -> Result<Self, CatalogError> {
        Ok(Self {
            id,
            title: normalize_title("lesson", title)?,
            legacy_module_id: None,
        })
    }

    #[must_use]
    pub fn with_legacy_module(mut self, module_id: ModuleId) -> Self {
        self.legacy_module_id = Some(module_id);
        self
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn legacy_module_id(&self) -> Option<ModuleId> {
        self.legacy_module_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_are_trimmed() {
        let course = Course::new(CourseId::new(1), "  Rust 101 ").unwrap();
        assert_eq!(course.title(), "Rust 101");
    }

    #[test]
    fn blank_title_is_rejected() {
        let err = Lesson::new(LessonId::new(1), "   ").unwrap_err();
        assert_eq!(err, CatalogError::EmptyTitle("lesson"));
    }

    #[test]
    fn legacy_parent_is_opt_in() {
        let module = Module::new(ModuleId::new(3), "Basics").unwrap();
        assert_eq!(module.legacy_course_id(), None);

        let module = module.with_legacy_course(CourseId::new(9));
        assert_eq!(module.legacy_course_id(), Some(CourseId::new(9)));
    }
}
