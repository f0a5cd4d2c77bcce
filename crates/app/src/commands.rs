use std::str::FromStr;

use serde::Serialize;
use serde_json::{Value, json};

use course_core::Clock;
use course_core::model::UserId;
use services::demo::seed_demo;
use services::{ApiError, ApiResult, AppServices, api::parse_submission};

use crate::cli::Commands;

/// Run one command against the assembled services and return its JSON body.
pub async fn dispatch(
    command: Commands,
    app: &AppServices,
    clock: Clock,
    user: Option<&str>,
) -> ApiResult<Value> {
    let caller = user.map(UserId::from_str).transpose()?;
    let api = app.api();

    match command {
        Commands::Migrate => Ok(json!({ "migrated": true })),
        Commands::SeedDemo => {
            let seed = seed_demo(app.storage(), clock)
                .await
                .map_err(|err| ApiError::internal(&err))?;
            to_json(&seed)
        }
        Commands::CourseProgress { course_id } => {
            to_json(&api.get_course_progress(caller, &course_id).await?)
        }
        Commands::LessonProgress { lesson_id } => {
            to_json(&api.get_lesson_progress(caller, &lesson_id).await?)
        }
        Commands::Complete { lesson_id } => {
            to_json(&api.mark_lesson_complete(caller, &lesson_id).await?)
        }
        Commands::ResetProgress { user_id, lesson_id } => {
            to_json(&api.reset_lesson_progress(&user_id, &lesson_id).await?)
        }
        Commands::Quiz { lesson_id } => to_json(&api.get_quiz(&lesson_id).await?),
        Commands::Submit { lesson_id, answers } => {
            let submission = parse_submission(&answers)?;
            to_json(&api.submit_quiz(caller, &lesson_id, &submission).await?)
        }
        Commands::RecentlyPassed { lesson_id } => {
            to_json(&api.recently_passed(caller, &lesson_id).await?)
        }
        Commands::Attempts { lesson_id } => {
            to_json(&api.attempt_history(caller, &lesson_id).await?)
        }
        Commands::Link {
            relation,
            parent,
            child,
            order,
        } => to_json(&api.link(relation.into(), &parent, &child, order).await?),
        Commands::Unlink {
            relation,
            parent,
            child,
        } => to_json(&api.unlink(relation.into(), &parent, &child).await?),
        Commands::Children { relation, parent } => {
            to_json(&api.children(relation.into(), &parent).await?)
        }
        Commands::Reorder {
            relation,
            parent,
            children,
        } => to_json(&api.reorder(relation.into(), &parent, &children).await?),
        Commands::Backfill => to_json(&api.run_backfill().await),
    }
}

fn to_json<T: Serialize>(value: &T) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|err| ApiError::internal(&err))
}
