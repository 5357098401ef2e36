use crate::model::ProgressKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::{Validate, ValidationError};

/// Upper bounds on a quiz submission. The catalog rejects quizzes that could not be answered
/// within them.
pub const MAX_ANSWERS: usize = 200;
pub const MAX_QUESTION_LEN: usize = 1000;
pub const MAX_OPTION_LEN: usize = 500;

#[derive(Deserialize, Serialize, Debug, Validate)]
pub struct StudentParams {
    #[validate(length(min = 1, max = 64))]
    pub student_id: String,
}

#[derive(Deserialize, Serialize, Debug, Validate)]
pub struct CourseParams {
    #[validate(length(min = 1, max = 64))]
    pub student_id: String,
    #[validate(length(min = 1, max = 64))]
    pub course_id: String,
}

impl CourseParams {
    pub fn key(&self) -> ProgressKey {
        ProgressKey::new(&self.student_id, &self.course_id)
    }
}

#[derive(Deserialize, Serialize, Debug, Validate)]
pub struct WatchParams {
    #[validate(length(min = 1, max = 64))]
    pub student_id: String,
    #[validate(length(min = 1, max = 64))]
    pub course_id: String,
    /// Minutes watched so far.
    #[validate(range(max = 100_000))]
    pub watch_duration: u32,
}

impl WatchParams {
    pub fn key(&self) -> ProgressKey {
        ProgressKey::new(&self.student_id, &self.course_id)
    }
}

#[derive(Deserialize, Serialize, Debug, Validate)]
pub struct SubmitQuizPayload {
    #[validate(length(min = 1, max = 64))]
    pub student_id: String,
    #[validate(length(min = 1, max = 64))]
    pub quiz_id: String,
    /// Question text -> chosen option.
    #[validate(custom(function = validate_answers))]
    pub answers: HashMap<String, String>,
}

fn validate_answers(answers: &HashMap<String, String>) -> Result<(), ValidationError> {
    if answers.is_empty() {
        return Err(ValidationError::new("answers_cannot_be_empty"));
    }
    if answers.len() > MAX_ANSWERS {
        return Err(ValidationError::new("too_many_answers"));
    }
    for (question, option) in answers {
        if question.len() > MAX_QUESTION_LEN || option.len() > MAX_OPTION_LEN {
            return Err(ValidationError::new("answer_too_long"));
        }
    }
    Ok(())
}
