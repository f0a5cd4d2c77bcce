use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{LessonId, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("question prompt cannot be empty")]
    EmptyPrompt,

    #[error("a question needs at least two answer options, got {0}")]
    TooFewOptions(usize),

    #[error("answer option {index} is empty")]
    EmptyOption { index: usize },

    #[error("correct option index {index} is out of range for {options} options")]
    CorrectIndexOutOfRange { index: usize, options: usize },
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A multiple-choice question attached to a lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    id: QuestionId,
    lesson_id: LessonId,
    prompt: String,
    options: Vec<String>,
    correct_index: usize,
    explanation: Option<String>,
    order: u32,
}

impl QuizQuestion {
    /// Build a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuizError` if the prompt or any option is blank, fewer than two
    /// options are given, or `correct_index` does not address an option.
    pub fn new(
        id: QuestionId,
        lesson_id: LessonId,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_index: usize,
        order: u32,
    ) -> Result<Self, QuizError> {
        let prompt = prompt.into().trim().to_owned();
        if prompt.is_empty() {
            return Err(QuizError::EmptyPrompt);
        }
        if options.len() < 2 {
            return Err(QuizError::TooFewOptions(options.len()));
        }
        if let Some(index) = options.iter().position(|o| o.trim().is_empty()) {
            return Err(QuizError::EmptyOption { index });
        }
        if correct_index >= options.len() {
            return Err(QuizError::CorrectIndexOutOfRange {
                index: correct_index,
                options: options.len(),
            });
        }

        Ok(Self {
            id,
            lesson_id,
            prompt,
            options,
            correct_index,
            explanation: None,
            order,
        })
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        let explanation = explanation.into();
        self.explanation = (!explanation.trim().is_empty()).then_some(explanation);
        self
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn lesson_id(&self) -> LessonId {
        self.lesson_id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[must_use]
    pub fn is_correct(&self, selected: usize) -> bool {
        selected == self.correct_index
    }
}

//
// ─── SUBMISSION ────────────────────────────────────────────────────────────────
//

/// Answers submitted for one quiz attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "mode", content = "answers")]
pub enum QuizSubmission {
    /// Answer `i` belongs to the `i`-th question in display order.
    ///
    /// Kept for clients that submit bare arrays; misattributes answers if the
    /// question order changed between fetch and submit.
    Positional(Vec<usize>),
    /// Each answer names the question it belongs to.
    ByQuestion(Vec<(QuestionId, usize)>),
}

impl QuizSubmission {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            QuizSubmission::Positional(answers) => answers.len(),
            QuizSubmission::ByQuestion(answers) => answers.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("option {i}")).collect()
    }

    #[test]
    fn valid_question_builds() {
        let q = QuizQuestion::new(QuestionId::new(1), LessonId::new(2), " Why? ", options(3), 2, 0)
            .unwrap()
            .with_explanation("Because.");
        assert_eq!(q.prompt(), "Why?");
        assert_eq!(q.explanation(), Some("Because."));
        assert!(q.is_correct(2));
        assert!(!q.is_correct(0));
    }

    #[test]
    fn rejects_out_of_range_correct_index() {
        let err = QuizQuestion::new(QuestionId::new(1), LessonId::new(2), "Q", options(2), 2, 0)
            .unwrap_err();
        assert_eq!(
            err,
            QuizError::CorrectIndexOutOfRange {
                index: 2,
                options: 2
            }
        );
    }

    #[test]
    fn rejects_single_option_and_blank_option() {
        let err = QuizQuestion::new(QuestionId::new(1), LessonId::new(2), "Q", options(1), 0, 0)
            .unwrap_err();
        assert_eq!(err, QuizError::TooFewOptions(1));

        let err = QuizQuestion::new(
            QuestionId::new(1),
            LessonId::new(2),
            "Q",
            vec!["a".into(), " ".into()],
            0,
            0,
        )
        .unwrap_err();
        assert_eq!(err, QuizError::EmptyOption { index: 1 });
    }

    #[test]
    fn blank_explanation_is_dropped() {
        let q = QuizQuestion::new(QuestionId::new(1), LessonId::new(2), "Q", options(2), 0, 0)
            .unwrap()
            .with_explanation("  ");
        assert_eq!(q.explanation(), None);
    }

    #[test]
    fn submission_deserializes_both_modes() {
        let positional: QuizSubmission =
            serde_json::from_str(r#"{"mode":"positional","answers":[1,0]}"#).unwrap();
        assert_eq!(positional, QuizSubmission::Positional(vec![1, 0]));

        let keyed: QuizSubmission =
            serde_json::from_str(r#"{"mode":"byQuestion","answers":[[5,1]]}"#).unwrap();
        assert_eq!(
            keyed,
            QuizSubmission::ByQuestion(vec![(QuestionId::new(5), 1)])
        );
    }
}
