//! Small demo catalog for local runs.
//!
//! One course with two modules and three lessons, each lesson with a short
//! quiz. Parents are recorded only in the legacy columns, so a fresh demo
//! database needs a backfill before course progress sees any lessons.

use std::str::FromStr;

use serde::Serialize;

use course_core::model::{
    Course, CourseId, Lesson, LessonId, Module, ModuleId, QuestionId, QuizQuestion, UserId,
};
use storage::repository::Storage;

use crate::Clock;
use crate::error::SeedError;

pub const DEMO_USER_ID: &str = "00000000-0000-4000-8000-000000000001";
pub const DEMO_COURSE_ID: u64 = 1;

const MODULES: &[(u64, &str)] = &[(1, "Ownership"), (2, "Traits")];

const LESSONS: &[(u64, u64, &str)] = &[
    (1, 1, "Moves and copies"),
    (2, 1, "Borrowing rules"),
    (3, 2, "Trait objects"),
];

/// `(lesson, prompt, options, correct index)`
const QUESTIONS: &[(u64, &str, &[&str], usize)] = &[
    (
        1,
        "What happens to a String after `let b = a;`?",
        &["It is copied", "It is moved into b", "It is borrowed"],
        1,
    ),
    (1, "Which type is Copy?", &["Vec<u8>", "String", "u32"], 2),
    (1, "Can a moved-from binding be read?", &["Yes", "No"], 1),
    (
        2,
        "How many &mut borrows may coexist?",
        &["One", "Two", "Unlimited"],
        0,
    ),
    (2, "Can & and &mut borrows overlap?", &["Yes", "No"], 1),
    (
        2,
        "What checks borrow rules?",
        &["The borrow checker", "The runtime", "The linker"],
        0,
    ),
    (
        3,
        "What does `dyn Trait` use for dispatch?",
        &["Monomorphization", "A vtable", "Macros"],
        1,
    ),
    (
        3,
        "Which bound makes a trait object shareable across threads?",
        &["Send + Sync", "Copy", "Sized"],
        0,
    ),
    (
        3,
        "When can a trait with generic methods be used as `dyn Trait`?",
        &["Always", "When those methods require `Self: Sized`", "Never"],
        1,
    ),
];

/// What `seed_demo` wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoSeed {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub modules: usize,
    pub lessons: usize,
    pub questions: usize,
}

struct DemoCatalog {
    user: UserId,
    course: Course,
    modules: Vec<Module>,
    lessons: Vec<Lesson>,
    questions: Vec<QuizQuestion>,
}

fn demo_catalog() -> Result<DemoCatalog, course_core::Error> {
    let course_id = CourseId::new(DEMO_COURSE_ID);
    let course = Course::new(course_id, "Rust Foundations")?;

    let modules = MODULES
        .iter()
        .map(|&(id, title)| -> Result<Module, course_core::Error> {
            Ok(Module::new(ModuleId::new(id), title)?.with_legacy_course(course_id))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let lessons = LESSONS
        .iter()
        .map(|&(id, module, title)| -> Result<Lesson, course_core::Error> {
            Ok(Lesson::new(LessonId::new(id), title)?.with_legacy_module(ModuleId::new(module)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut questions = Vec::with_capacity(QUESTIONS.len());
    let mut order_in_lesson = 0;
    let mut previous_lesson = 0;
    for (index, &(lesson, prompt, options, correct)) in QUESTIONS.iter().enumerate() {
        if lesson != previous_lesson {
            order_in_lesson = 0;
            previous_lesson = lesson;
        }
        let id = QuestionId::new(u64::try_from(index).unwrap_or(u64::MAX) + 1);
        questions.push(QuizQuestion::new(
            id,
            LessonId::new(lesson),
            prompt,
            options.iter().map(|o| (*o).to_owned()).collect(),
            correct,
            order_in_lesson,
        )?);
        order_in_lesson += 1;
    }

    Ok(DemoCatalog {
        user: UserId::from_str(DEMO_USER_ID)?,
        course,
        modules,
        lessons,
        questions,
    })
}

/// Write the demo catalog and demo user. Safe to run repeatedly.
///
/// # Errors
///
/// Returns `SeedError` if the catalog fails validation or cannot be stored.
pub async fn seed_demo(storage: &Storage, clock: Clock) -> Result<DemoSeed, SeedError> {
    let catalog = demo_catalog()?;

    storage.catalog.upsert_course(&catalog.course).await?;
    for module in &catalog.modules {
        storage.catalog.upsert_module(module).await?;
    }
    for lesson in &catalog.lessons {
        storage.catalog.upsert_lesson(lesson).await?;
    }
    for question in &catalog.questions {
        storage.questions.upsert_question(question).await?;
    }
    storage.users.upsert_user(catalog.user, clock.now()).await?;

    tracing::info!(
        course_id = %catalog.course.id(),
        lessons = catalog.lessons.len(),
        questions = catalog.questions.len(),
        "demo catalog seeded"
    );

    Ok(DemoSeed {
        user_id: catalog.user,
        course_id: catalog.course.id(),
        modules: catalog.modules.len(),
        lessons: catalog.lessons.len(),
        questions: catalog.questions.len(),
    })
}
