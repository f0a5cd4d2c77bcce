mod attempt;
mod catalog;
mod ids;
mod progress;
mod quiz;
mod relation;

pub use attempt::{NewQuizAttempt, QuestionResult, QuizAttempt};
pub use catalog::{CatalogError, Course, Lesson, Module};
pub use ids::{
    CourseId, EntityId, LessonId, MAX_CATALOG_ID, ModuleId, ParseIdError, QuestionId, UserId,
};
pub use progress::{CourseProgress, LessonCompletion, LessonProgress, progress_percentage};
pub use quiz::{QuizError, QuizQuestion, QuizSubmission};
pub use relation::{
    CourseModuleLink, CourseModules, LegacyRef, Link, ModuleLessonLink, ModuleLessons, Relation,
};
