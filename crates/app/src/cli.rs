use clap::{Parser, Subcommand, ValueEnum};

use services::RelationKind;

/// Operator CLI for course progress, quizzes and relation maintenance.
///
/// Every command prints JSON to stdout. Failures print `{error, details}`
/// and exit non-zero.
#[derive(Debug, Parser)]
#[command(name = "courseline", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database URL; overrides `database_url` from config.
    #[arg(long, global = true)]
    pub db: Option<String>,

    /// Caller identity (user UUID), as an auth layer would supply it.
    #[arg(short, long, global = true, env = "COURSELINE_USER")]
    pub user: Option<String>,

    /// Only log errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Debug logging.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RelationArg {
    CourseModules,
    ModuleLessons,
}

impl From<RelationArg> for RelationKind {
    fn from(arg: RelationArg) -> Self {
        match arg {
            RelationArg::CourseModules => RelationKind::CourseModules,
            RelationArg::ModuleLessons => RelationKind::ModuleLessons,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create or upgrade the database schema.
    Migrate,
    /// Load the demo course, quizzes and user.
    SeedDemo,
    /// Aggregate progress of the caller in a course.
    CourseProgress { course_id: String },
    /// Whether the caller has completed a lesson.
    LessonProgress { lesson_id: String },
    /// Mark a lesson complete for the caller.
    Complete { lesson_id: String },
    /// Clear a user's completion of a lesson (admin).
    ResetProgress { user_id: String, lesson_id: String },
    /// Show a lesson's quiz without answers.
    Quiz { lesson_id: String },
    /// Grade and record a quiz submission for the caller.
    Submit {
        lesson_id: String,
        /// `[1,0,2]`, `{"answers":[{"questionId":1,"selected":0}]}` or a tagged submission.
        answers: String,
    },
    /// Whether the caller passed a lesson's quiz in the last 24 hours.
    RecentlyPassed { lesson_id: String },
    /// The caller's attempts at a lesson's quiz, oldest first.
    Attempts { lesson_id: String },
    /// Link a child under a parent; linking an existing pair is a no-op.
    Link {
        relation: RelationArg,
        parent: String,
        child: String,
        #[arg(long, default_value_t = 0)]
        order: u32,
    },
    /// Remove a link.
    Unlink {
        relation: RelationArg,
        parent: String,
        child: String,
    },
    /// List a parent's children in order.
    Children { relation: RelationArg, parent: String },
    /// Rewrite sibling order; must name every current child exactly once.
    Reorder {
        relation: RelationArg,
        parent: String,
        #[arg(required = true, num_args = 1..)]
        children: Vec<String>,
    },
    /// Copy legacy parent references into the junction tables (admin).
    Backfill,
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Cli, Commands, RelationArg};

    #[test]
    fn clap_command_tree_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "courseline",
            "course-progress",
            "1",
            "--user",
            "00000000-0000-4000-8000-000000000001",
            "--db",
            "sqlite::memory:",
        ])
        .expect("cli should parse");

        assert_eq!(cli.db.as_deref(), Some("sqlite::memory:"));
        assert!(cli.user.is_some());
        assert!(matches!(
            cli.command,
            Commands::CourseProgress { ref course_id } if course_id == "1"
        ));
    }

    #[test]
    fn link_accepts_relation_and_order() {
        let cli = Cli::try_parse_from([
            "courseline",
            "link",
            "module-lessons",
            "2",
            "3",
            "--order",
            "4",
        ])
        .expect("cli should parse");

        match cli.command {
            Commands::Link {
                relation, order, ..
            } => {
                assert_eq!(relation, RelationArg::ModuleLessons);
                assert_eq!(order, 4);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn reorder_requires_children() {
        let parsed = Cli::try_parse_from(["courseline", "reorder", "course-modules", "1"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn quiet_and_verbose_conflict() {
        let parsed = Cli::try_parse_from(["courseline", "-q", "-v", "backfill"]);
        assert!(parsed.is_err());
    }
}
