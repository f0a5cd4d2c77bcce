//! Deterministic quiz scoring.
//!
//! Grading is pure: it takes the lesson's questions and one submission and
//! produces the score, the pass decision and a per-question breakdown. Storage
//! and completion side effects live in the services crate.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::model::{QuestionId, QuestionResult, QuizQuestion, QuizSubmission};

/// Share of questions that must be answered correctly to pass, in tenths.
pub const PASS_RATIO_TENTHS: u32 = 7;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GradingError {
    #[error("lesson has no quiz questions")]
    NoQuestions,

    #[error("submitted {submitted} answers for {questions} questions")]
    TooManyAnswers { submitted: usize, questions: usize },

    #[error("answer references unknown question {0}")]
    UnknownQuestion(QuestionId),

    #[error("question {0} was answered more than once")]
    DuplicateAnswer(QuestionId),
}

//
// ─── OUTCOME ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeOutcome {
    pub score: u32,
    pub total_questions: u32,
    pub pass_threshold: u32,
    pub passed: bool,
    pub results: Vec<QuestionResult>,
}

/// `ceil(total * 0.7)` without floating point.
#[must_use]
pub fn pass_threshold(total_questions: u32) -> u32 {
    (total_questions * PASS_RATIO_TENTHS).div_ceil(10)
}

/// Grade `submission` against `questions`.
///
/// Questions are graded in ascending `order`. Unanswered questions and
/// out-of-range option indexes count as incorrect.
///
/// # Errors
///
/// - `GradingError::NoQuestions` if `questions` is empty.
/// - `GradingError::TooManyAnswers` if a positional submission is longer than the quiz.
/// - `GradingError::UnknownQuestion` / `DuplicateAnswer` for malformed keyed submissions.
pub fn grade(
    questions: &[QuizQuestion],
    submission: &QuizSubmission,
) -> Result<GradeOutcome, GradingError> {
    if questions.is_empty() {
        return Err(GradingError::NoQuestions);
    }

    let mut ordered: Vec<&QuizQuestion> = questions.iter().collect();
    ordered.sort_by_key(|q| (q.order(), q.id()));

    let selections = match submission {
        QuizSubmission::Positional(answers) => {
            if answers.len() > ordered.len() {
                return Err(GradingError::TooManyAnswers {
                    submitted: answers.len(),
                    questions: ordered.len(),
                });
            }
            (0..ordered.len())
                .map(|i| answers.get(i).copied())
                .collect::<Vec<_>>()
        }
        QuizSubmission::ByQuestion(answers) => {
            let known: HashSet<QuestionId> = ordered.iter().map(|q| q.id()).collect();
            let mut by_id = HashMap::with_capacity(answers.len());
            for (question_id, selected) in answers {
                if !known.contains(question_id) {
                    return Err(GradingError::UnknownQuestion(*question_id));
                }
                if by_id.insert(*question_id, *selected).is_some() {
                    return Err(GradingError::DuplicateAnswer(*question_id));
                }
            }
            ordered
                .iter()
                .map(|q| by_id.get(&q.id()).copied())
                .collect()
        }
    };

    let results: Vec<QuestionResult> = ordered
        .iter()
        .zip(selections)
        .map(|(question, selected)| QuestionResult {
            question_id: question.id(),
            selected,
            correct_index: question.correct_index(),
            correct: selected.is_some_and(|s| question.is_correct(s)),
        })
        .collect();

    let total_questions = u32::try_from(results.len()).unwrap_or(u32::MAX);
    let score = u32::try_from(results.iter().filter(|r| r.correct).count()).unwrap_or(u32::MAX);
    let threshold = pass_threshold(total_questions);

    Ok(GradeOutcome {
        score,
        total_questions,
        pass_threshold: threshold,
        passed: score >= threshold,
        results,
    })
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LessonId;

    fn question(id: u64, order: u32, correct: usize) -> QuizQuestion {
        QuizQuestion::new(
            QuestionId::new(id),
            LessonId::new(1),
            format!("Question {id}"),
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct,
            order,
        )
        .unwrap()
    }

    fn ten_questions() -> Vec<QuizQuestion> {
        (0..10).map(|i| question(i + 1, u32::try_from(i).unwrap(), 0)).collect()
    }

    fn answers_with_correct(correct: usize) -> QuizSubmission {
        QuizSubmission::Positional((0..10).map(|i| usize::from(i >= correct)).collect())
    }

    #[test]
    fn threshold_is_ceil_of_seventy_percent() {
        assert_eq!(pass_threshold(10), 7);
        assert_eq!(pass_threshold(3), 3);
        assert_eq!(pass_threshold(4), 3);
        assert_eq!(pass_threshold(5), 4);
        assert_eq!(pass_threshold(1), 1);
        assert_eq!(pass_threshold(0), 0);
    }

    #[test]
    fn seven_of_ten_passes() {
        let outcome = grade(&ten_questions(), &answers_with_correct(7)).unwrap();
        assert_eq!(outcome.score, 7);
        assert_eq!(outcome.pass_threshold, 7);
        assert!(outcome.passed);
    }

    #[test]
    fn six_of_ten_fails() {
        let outcome = grade(&ten_questions(), &answers_with_correct(6)).unwrap();
        assert_eq!(outcome.score, 6);
        assert!(!outcome.passed);
    }

    #[test]
    fn empty_quiz_is_an_error() {
        let err = grade(&[], &QuizSubmission::Positional(vec![0])).unwrap_err();
        assert_eq!(err, GradingError::NoQuestions);
    }

    #[test]
    fn positional_answers_follow_question_order() {
        // Stored out of order; display order is q2, q1.
        let questions = vec![question(1, 1, 2), question(2, 0, 1)];
        let outcome = grade(&questions, &QuizSubmission::Positional(vec![1, 2])).unwrap();

        assert_eq!(outcome.results[0].question_id, QuestionId::new(2));
        assert_eq!(outcome.results[1].question_id, QuestionId::new(1));
        assert_eq!(outcome.score, 2);
    }

    #[test]
    fn missing_and_out_of_range_answers_are_incorrect() {
        let questions = vec![question(1, 0, 0), question(2, 1, 0), question(3, 2, 0)];
        let outcome = grade(&questions, &QuizSubmission::Positional(vec![0, 9])).unwrap();

        assert_eq!(outcome.score, 1);
        assert_eq!(outcome.results[1].selected, Some(9));
        assert!(!outcome.results[1].correct);
        assert_eq!(outcome.results[2].selected, None);
        assert!(!outcome.results[2].correct);
    }

    #[test]
    fn too_many_positional_answers_are_rejected() {
        let questions = vec![question(1, 0, 0)];
        let err = grade(&questions, &QuizSubmission::Positional(vec![0, 0])).unwrap_err();
        assert_eq!(
            err,
            GradingError::TooManyAnswers {
                submitted: 2,
                questions: 1
            }
        );
    }

    #[test]
    fn keyed_answers_ignore_submission_order() {
        let questions = vec![question(1, 0, 3), question(2, 1, 1)];
        let submission = QuizSubmission::ByQuestion(vec![
            (QuestionId::new(2), 1),
            (QuestionId::new(1), 3),
        ]);
        let outcome = grade(&questions, &submission).unwrap();
        assert_eq!(outcome.score, 2);
        assert!(outcome.passed);
    }

    #[test]
    fn keyed_answers_reject_unknown_and_duplicate_ids() {
        let questions = vec![question(1, 0, 0)];

        let err = grade(
            &questions,
            &QuizSubmission::ByQuestion(vec![(QuestionId::new(99), 0)]),
        )
        .unwrap_err();
        assert_eq!(err, GradingError::UnknownQuestion(QuestionId::new(99)));

        let err = grade(
            &questions,
            &QuizSubmission::ByQuestion(vec![(QuestionId::new(1), 0), (QuestionId::new(1), 1)]),
        )
        .unwrap_err();
        assert_eq!(err, GradingError::DuplicateAnswer(QuestionId::new(1)));
    }
}
