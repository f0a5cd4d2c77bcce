use std::sync::Arc;

use serde::Serialize;

use course_core::model::{CourseModules, EntityId, ModuleLessons, Relation};
use storage::repository::LegacyLinkSource;

use crate::error::BackfillError;
use crate::relation_service::RelationStore;

/// One legacy reference that could not be migrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillFailure {
    pub relation: &'static str,
    /// Absent when the legacy references themselves could not be read.
    pub parent: Option<u64>,
    pub child: Option<u64>,
    pub reason: String,
}

/// Tally of a backfill run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub created: u32,
    pub skipped: u32,
    pub failed: u32,
    pub failures: Vec<BackfillFailure>,
}

impl BackfillReport {
    fn record_failure<R: Relation>(
        &mut self,
        parent: Option<R::Parent>,
        child: Option<R::Child>,
        error: &BackfillError,
    ) {
        self.failed += 1;
        self.failures.push(BackfillFailure {
            relation: R::NAME,
            parent: parent.map(|p| p.value()),
            child: child.map(|c| c.value()),
            reason: error.to_string(),
        });
    }
}

/// Copies legacy direct parent references into the junction tables.
///
/// Each reference is migrated on its own: a failure is counted and logged and
/// the run moves on. Running it again only reports skips.
#[derive(Clone)]
pub struct BackfillService {
    course_modules: RelationStore<CourseModules>,
    module_lessons: RelationStore<ModuleLessons>,
    legacy_course_modules: Arc<dyn LegacyLinkSource<CourseModules>>,
    legacy_module_lessons: Arc<dyn LegacyLinkSource<ModuleLessons>>,
}

impl BackfillService {
    #[must_use]
    pub fn new(
        course_modules: RelationStore<CourseModules>,
        module_lessons: RelationStore<ModuleLessons>,
        legacy_course_modules: Arc<dyn LegacyLinkSource<CourseModules>>,
        legacy_module_lessons: Arc<dyn LegacyLinkSource<ModuleLessons>>,
    ) -> Self {
        Self {
            course_modules,
            module_lessons,
            legacy_course_modules,
            legacy_module_lessons,
        }
    }

    /// Migrate course → module references, then module → lesson references.
    pub async fn run(&self) -> BackfillReport {
        let mut report = BackfillReport::default();
        backfill_relation(
            &self.course_modules,
            self.legacy_course_modules.as_ref(),
            &mut report,
        )
        .await;
        backfill_relation(
            &self.module_lessons,
            self.legacy_module_lessons.as_ref(),
            &mut report,
        )
        .await;

        tracing::info!(
            created = report.created,
            skipped = report.skipped,
            failed = report.failed,
            "relation backfill finished"
        );
        report
    }
}

async fn backfill_relation<R: Relation>(
    store: &RelationStore<R>,
    source: &dyn LegacyLinkSource<R>,
    report: &mut BackfillReport,
) {
    let refs = match source.legacy_refs().await {
        Ok(refs) => refs,
        Err(err) => {
            let err = BackfillError::LegacyRead(err);
            tracing::error!(relation = R::NAME, error = %err, "backfill skipped relation");
            report.record_failure::<R>(None, None, &err);
            return;
        }
    };

    for legacy in refs {
        match store.link_with_outcome(legacy.parent, legacy.child, 0).await {
            Ok(outcome) if outcome.is_created() => report.created += 1,
            Ok(_) => report.skipped += 1,
            Err(err) => {
                let err = BackfillError::from(err);
                tracing::error!(
                    relation = R::NAME,
                    parent = %legacy.parent,
                    child = %legacy.child,
                    error = %err,
                    "backfill item failed"
                );
                report.record_failure::<R>(Some(legacy.parent), Some(legacy.child), &err);
            }
        }
    }
}
