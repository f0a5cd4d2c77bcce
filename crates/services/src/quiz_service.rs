use std::sync::Arc;

use serde::Serialize;

use course_core::grading::{self, GradingError};
use course_core::model::{
    LessonId, NewQuizAttempt, QuestionId, QuestionResult, QuizAttempt, QuizQuestion,
    QuizSubmission, UserId,
};
use course_core::time::recent_completion_window;
use storage::repository::{
    AttemptRepository, CatalogRepository, ProgressRepository, QuizRepository,
};

use crate::Clock;
use crate::error::QuizServiceError;

/// A question as shown to learners; the correct answer is withheld.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizQuestionView {
    pub id: QuestionId,
    pub prompt: String,
    pub answer_options: Vec<String>,
    pub explanation: Option<String>,
    pub order: u32,
}

impl From<&QuizQuestion> for QuizQuestionView {
    fn from(question: &QuizQuestion) -> Self {
        Self {
            id: question.id(),
            prompt: question.prompt().to_owned(),
            answer_options: question.options().to_vec(),
            explanation: question.explanation().map(str::to_owned),
            order: question.order(),
        }
    }
}

/// Outcome of a graded and recorded submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizResult {
    pub attempt_id: i64,
    pub score: u32,
    pub total_questions: u32,
    pub pass_threshold: u32,
    pub passed: bool,
    pub per_question_results: Vec<QuestionResult>,
    /// `false` when the attempt passed but the lesson completion could not be
    /// written. The attempt itself is always recorded.
    pub completion_recorded: bool,
}

/// Grades quiz submissions, records attempts and triggers lesson completion.
#[derive(Clone)]
pub struct QuizService {
    clock: Clock,
    catalog: Arc<dyn CatalogRepository>,
    questions: Arc<dyn QuizRepository>,
    attempts: Arc<dyn AttemptRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl QuizService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn CatalogRepository>,
        questions: Arc<dyn QuizRepository>,
        attempts: Arc<dyn AttemptRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            catalog,
            questions,
            attempts,
            progress,
        }
    }

    /// Questions of `lesson` in display order, without correct answers.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::NoQuestions` if the lesson has no quiz and
    /// `QuizServiceError::Upstream` on storage failure.
    pub async fn get_quiz(
        &self,
        lesson: LessonId,
    ) -> Result<Vec<QuizQuestionView>, QuizServiceError> {
        let questions = self.questions.questions_for_lesson(lesson).await?;
        if questions.is_empty() {
            return Err(QuizServiceError::NoQuestions(lesson));
        }
        Ok(questions.iter().map(QuizQuestionView::from).collect())
    }

    /// Grade `submission`, append the attempt and, on a pass, mark the lesson
    /// completed.
    ///
    /// Once the attempt is stored the call succeeds: a failed completion write
    /// is logged and reported through `completion_recorded`.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::NotFound` for an unknown lesson,
    /// `QuizServiceError::NoQuestions` if it has no quiz,
    /// `QuizServiceError::Grading` for a malformed submission and
    /// `QuizServiceError::Upstream` if the attempt cannot be stored.
    pub async fn submit_quiz(
        &self,
        user: UserId,
        lesson: LessonId,
        submission: &QuizSubmission,
    ) -> Result<QuizResult, QuizServiceError> {
        if self.catalog.get_lesson(lesson).await?.is_none() {
            return Err(QuizServiceError::NotFound("lesson"));
        }

        let questions = self.questions.questions_for_lesson(lesson).await?;
        let outcome = grading::grade(&questions, submission).map_err(|err| match err {
            GradingError::NoQuestions => QuizServiceError::NoQuestions(lesson),
            other => QuizServiceError::Grading(other),
        })?;

        let now = self.clock.now();
        let attempt = NewQuizAttempt {
            user_id: user,
            lesson_id: lesson,
            score: outcome.score,
            total_questions: outcome.total_questions,
            passed: outcome.passed,
            results: outcome.results,
            created_at: now,
        };
        let attempt_id = self.attempts.append_attempt(&attempt).await?;
        tracing::info!(
            user_id = %user,
            lesson_id = %lesson,
            attempt_id,
            score = attempt.score,
            total = attempt.total_questions,
            passed = attempt.passed,
            "quiz attempt recorded"
        );

        let completion_recorded = if attempt.passed {
            match self.progress.mark_completed(user, lesson, now).await {
                Ok(_) => true,
                Err(err) => {
                    tracing::error!(
                        user_id = %user,
                        lesson_id = %lesson,
                        attempt_id,
                        error = %err,
                        "passing attempt recorded but lesson completion failed"
                    );
                    false
                }
            }
        } else {
            false
        };

        Ok(QuizResult {
            attempt_id,
            score: attempt.score,
            total_questions: attempt.total_questions,
            pass_threshold: outcome.pass_threshold,
            passed: attempt.passed,
            per_question_results: attempt.results,
            completion_recorded,
        })
    }

    /// Whether `user` passed the quiz of `lesson` within the trailing 24 hours.
    ///
    /// Independent of the permanent completion flag: a lesson completed long
    /// ago is not recent, and a reset lesson can still be recently passed.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Upstream` on storage failure.
    pub async fn is_recently_completed(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<bool, QuizServiceError> {
        let since = self.clock.window_start(recent_completion_window());
        Ok(self
            .attempts
            .has_passing_attempt_since(user, lesson, since)
            .await?)
    }

    /// Every recorded attempt of `user` on `lesson`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `QuizServiceError::Upstream` on storage failure.
    pub async fn attempt_history(
        &self,
        user: UserId,
        lesson: LessonId,
    ) -> Result<Vec<QuizAttempt>, QuizServiceError> {
        Ok(self.attempts.attempts_for(user, lesson).await?)
    }
}
