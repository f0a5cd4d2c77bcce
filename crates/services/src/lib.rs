#![forbid(unsafe_code)]

pub mod api;
pub mod app_services;
pub mod backfill_service;
pub mod demo;
pub mod error;
pub mod progress_service;
pub mod quiz_service;
pub mod relation_service;

pub use course_core::Clock;

pub use api::{ApiError, ApiResult, CourseApi, ErrorCategory, RelationKind};
pub use app_services::AppServices;
pub use backfill_service::{BackfillFailure, BackfillReport, BackfillService};
pub use error::{
    AppServicesError, BackfillError, ProgressError, QuizServiceError, RelationError, SeedError,
};
pub use progress_service::ProgressService;
pub use quiz_service::{QuizQuestionView, QuizResult, QuizService};
pub use relation_service::{LinkOutcome, RelationStore};
