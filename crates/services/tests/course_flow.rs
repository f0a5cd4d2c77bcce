use std::str::FromStr;

use course_core::model::{
    Course, CourseId, Lesson, LessonId, Module, ModuleId, QuestionId, QuizQuestion,
    QuizSubmission, UserId,
};
use course_core::time::fixed_now;
use services::demo::{DEMO_USER_ID, seed_demo};
use services::{AppServices, Clock, ErrorCategory, RelationKind};
use storage::repository::{CatalogRepository, QuizRepository, Storage, UserRepository};

/// Course 1 -> modules [1, 2]; module 1 -> lessons [1, 2]; module 2 -> lesson [3].
async fn scenario(app: &AppServices) -> UserId {
    let storage = app.storage();
    storage
        .catalog
        .upsert_course(&Course::new(CourseId::new(1), "C").unwrap())
        .await
        .unwrap();
    for m in 1..=2 {
        storage
            .catalog
            .upsert_module(&Module::new(ModuleId::new(m), format!("M{m}")).unwrap())
            .await
            .unwrap();
    }
    for l in 1..=3 {
        storage
            .catalog
            .upsert_lesson(&Lesson::new(LessonId::new(l), format!("L{l}")).unwrap())
            .await
            .unwrap();
    }

    let api = app.api();
    api.link(RelationKind::CourseModules, "1", "1", 0).await.unwrap();
    api.link(RelationKind::CourseModules, "1", "2", 1).await.unwrap();
    api.link(RelationKind::ModuleLessons, "1", "1", 0).await.unwrap();
    api.link(RelationKind::ModuleLessons, "1", "2", 1).await.unwrap();
    api.link(RelationKind::ModuleLessons, "2", "3", 0).await.unwrap();

    let user = UserId::random();
    storage.users.upsert_user(user, fixed_now()).await.unwrap();
    user
}

async fn add_quiz(storage: &Storage, lesson: LessonId, count: u64) {
    for i in 0..count {
        storage
            .questions
            .upsert_question(
                &QuizQuestion::new(
                    QuestionId::new(lesson.value() * 100 + i),
                    lesson,
                    format!("Q{i}"),
                    vec!["yes".into(), "no".into()],
                    0,
                    u32::try_from(i).unwrap(),
                )
                .unwrap(),
            )
            .await
            .unwrap();
    }
}

async fn sqlite_app(name: &str) -> AppServices {
    AppServices::new_sqlite(
        &format!("sqlite:file:{name}?mode=memory&cache=shared"),
        5,
        Clock::fixed(fixed_now()),
    )
    .await
    .expect("sqlite services")
}

async fn two_of_three_is_67_percent(app: AppServices) {
    let user = scenario(&app).await;
    let api = app.api();

    api.mark_lesson_complete(Some(user), "1").await.unwrap();
    api.mark_lesson_complete(Some(user), "2").await.unwrap();

    let progress = api.get_course_progress(Some(user), "1").await.unwrap();
    assert_eq!(progress.total_lessons, 3);
    assert_eq!(progress.completed_lessons, 2);
    assert_eq!(progress.progress_percentage, 67);
    assert_eq!(
        progress.completed_lesson_ids,
        vec![LessonId::new(1), LessonId::new(2)]
    );
}

#[tokio::test]
async fn scenario_reports_two_of_three_in_memory() {
    two_of_three_is_67_percent(AppServices::in_memory(Clock::fixed(fixed_now()))).await;
}

#[tokio::test]
async fn scenario_reports_two_of_three_on_sqlite() {
    two_of_three_is_67_percent(sqlite_app("memdb_flow_scenario").await).await;
}

#[tokio::test]
async fn passing_quiz_flows_into_lesson_and_course_progress() {
    let app = sqlite_app("memdb_flow_quiz").await;
    let user = scenario(&app).await;
    add_quiz(app.storage(), LessonId::new(3), 10).await;
    let api = app.api();

    assert!(!api.get_lesson_progress(Some(user), "3").await.unwrap().completed);

    let answers: Vec<usize> = (0..10).map(|i| usize::from(i >= 7)).collect();
    let result = api
        .submit_quiz(Some(user), "3", &QuizSubmission::Positional(answers))
        .await
        .unwrap();
    assert_eq!((result.score, result.total_questions), (7, 10));
    assert!(result.passed);
    assert!(result.completion_recorded);

    assert!(api.get_lesson_progress(Some(user), "3").await.unwrap().completed);
    let course = api.get_course_progress(Some(user), "1").await.unwrap();
    assert_eq!(course.completed_lessons, 1);
    assert!(api.recently_passed(Some(user), "3").await.unwrap().recently_passed);
    assert_eq!(api.attempt_history(Some(user), "3").await.unwrap().len(), 1);
}

#[tokio::test]
async fn linking_twice_persists_one_link() {
    let app = AppServices::in_memory(Clock::fixed(fixed_now()));
    scenario(&app).await;
    let api = app.api();

    let again = api.link(RelationKind::CourseModules, "1", "1", 7).await.unwrap();
    assert_eq!(again.created, Some(false));
    assert_eq!(again.order, 0);

    let children = api.children(RelationKind::CourseModules, "1").await.unwrap();
    assert_eq!(children.len(), 2);
}

#[tokio::test]
async fn reorder_through_api_rewrites_positions() {
    let app = sqlite_app("memdb_flow_reorder").await;
    scenario(&app).await;
    let api = app.api();

    let links = api
        .reorder(
            RelationKind::ModuleLessons,
            "1",
            &["2".to_string(), "1".to_string()],
        )
        .await
        .unwrap();
    let children: Vec<u64> = links.iter().map(|l| l.child).collect();
    assert_eq!(children, vec![2, 1]);

    let err = api
        .reorder(RelationKind::ModuleLessons, "1", &["2".to_string()])
        .await
        .unwrap_err();
    assert_eq!(err.category, ErrorCategory::Validation);
}

#[tokio::test]
async fn demo_backfill_is_a_fixed_point_on_sqlite() {
    let app = sqlite_app("memdb_flow_backfill").await;
    let seed = seed_demo(app.storage(), Clock::fixed(fixed_now())).await.unwrap();
    let api = app.api();
    let user = UserId::from_str(DEMO_USER_ID).unwrap();
    assert_eq!(seed.user_id, user);

    let before = api.get_course_progress(Some(user), "1").await.unwrap();
    assert_eq!(before.total_lessons, 0);

    let first = api.run_backfill().await;
    assert_eq!((first.created, first.skipped, first.failed), (5, 0, 0));
    let second = api.run_backfill().await;
    assert_eq!(second.created, 0);
    assert_eq!(second.skipped, first.created);

    let after = api.get_course_progress(Some(user), "1").await.unwrap();
    assert_eq!(after.total_lessons, 3);
    assert_eq!(after.progress_percentage, 0);
}

#[tokio::test]
async fn api_errors_carry_their_categories() {
    let app = AppServices::in_memory(Clock::fixed(fixed_now()));
    let user = scenario(&app).await;
    let api = app.api();

    let unauthenticated = api.get_course_progress(None, "1").await.unwrap_err();
    assert_eq!(unauthenticated.status_code(), 401);

    let malformed = api.get_course_progress(Some(user), "one").await.unwrap_err();
    assert_eq!(malformed.status_code(), 400);

    let missing = api.get_course_progress(Some(user), "99").await.unwrap_err();
    assert_eq!(missing.status_code(), 404);

    let no_quiz = api.get_quiz("1").await.unwrap_err();
    assert_eq!(no_quiz.status_code(), 404);

    let stranger = api
        .mark_lesson_complete(Some(UserId::random()), "1")
        .await
        .unwrap_err();
    assert_eq!(stranger.category, ErrorCategory::NotFound);
}

#[tokio::test]
async fn ids_beyond_the_signed_range_are_malformed() {
    let app = sqlite_app("memdb_flow_id_range").await;
    let user = scenario(&app).await;
    let api = app.api();
    let too_big = "9223372036854775808";

    let progress = api.get_course_progress(Some(user), too_big).await.unwrap_err();
    assert_eq!(progress.status_code(), 400);

    let link = api
        .link(RelationKind::CourseModules, "1", too_big, 0)
        .await
        .unwrap_err();
    assert_eq!(link.status_code(), 400);

    let largest = i64::MAX.to_string();
    let missing = api.get_course_progress(Some(user), &largest).await.unwrap_err();
    assert_eq!(missing.status_code(), 404);
}
