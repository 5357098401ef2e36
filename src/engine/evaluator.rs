use crate::errors::AppError;
use crate::model::{GradeResult, Quiz};
use std::collections::HashMap;

/// Grades a complete answer set, keyed by question text.
///
/// Partial submissions and answers to questions the quiz does not contain are rejected as a
/// whole. Each exact match against the correct option is worth one mark.
pub fn grade(quiz: &Quiz, answers: &HashMap<String, String>) -> Result<GradeResult, AppError> {
    if answers.len() != quiz.questions.len() {
        return Err(AppError::ValidationError(format!(
            "Expected answers for all {} questions, got {}",
            quiz.questions.len(),
            answers.len()
        )));
    }

    if let Some(unknown) = answers.keys().find(|text| quiz.question(text).is_none()) {
        return Err(AppError::ValidationError(format!(
            "Quiz {} has no question {:?}",
            quiz.quiz_id, unknown
        )));
    }

    let score = quiz
        .questions
        .iter()
        .filter(|question| {
            answers
                .get(&question.question)
                .is_some_and(|answer| *answer == question.correct_option)
        })
        .count();
    let score = u32::try_from(score).unwrap_or(u32::MAX);

    Ok(GradeResult {
        score,
        total: quiz.total_marks,
        passed: score >= quiz.passing_marks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Question;

    fn quiz() -> Quiz {
        let questions = (1..=5)
            .map(|i| Question {
                question: format!("Q{i}"),
                options: vec!["A".to_string(), "B".to_string()],
                correct_option: "A".to_string(),
            })
            .collect();
        Quiz {
            quiz_id: "quiz".to_string(),
            course_id: "course".to_string(),
            title: String::new(),
            questions,
            total_marks: 5,
            passing_marks: 3,
        }
    }

    fn answers(correct: usize) -> HashMap<String, String> {
        (1..=5)
            .map(|i| {
                let option = if i <= correct { "A" } else { "B" };
                (format!("Q{i}"), option.to_string())
            })
            .collect()
    }

    #[test]
    fn test_grade_four_of_five() {
        let result = grade(&quiz(), &answers(4)).unwrap();
        assert_eq!(
            result,
            GradeResult {
                score: 4,
                total: 5,
                passed: true
            }
        );
    }

    #[test]
    fn test_pass_threshold_is_inclusive() {
        assert!(grade(&quiz(), &answers(3)).unwrap().passed);
        assert!(!grade(&quiz(), &answers(2)).unwrap().passed);
    }

    #[test]
    fn test_partial_submission_rejected() {
        let mut partial = answers(5);
        partial.remove("Q5");

        let err = grade(&quiz(), &partial).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_unknown_question_rejected() {
        let mut wrong = answers(5);
        wrong.remove("Q5");
        wrong.insert("Q6".to_string(), "A".to_string());

        let err = grade(&quiz(), &wrong).unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[test]
    fn test_matching_is_exact() {
        let mut near = answers(5);
        near.insert("Q1".to_string(), "a".to_string());
        near.insert("Q2".to_string(), "A ".to_string());

        assert_eq!(grade(&quiz(), &near).unwrap().score, 3);
    }

    #[test]
    fn test_grading_is_repeatable() {
        let set = answers(4);
        assert_eq!(grade(&quiz(), &set).unwrap(), grade(&quiz(), &set).unwrap());
    }
}
