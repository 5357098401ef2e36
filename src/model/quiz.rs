use serde::{Deserialize, Serialize};

/// A single multiple-choice question. Its text is the question's identity within a quiz.
///
/// The correct option is accepted when the catalog is loaded but never serialized back out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    pub options: Vec<String>,
    #[serde(rename = "correct_answer", skip_serializing)]
    pub correct_option: String,
}

/// Quiz definition owned by the course catalog. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    pub quiz_id: String,
    pub course_id: String,
    #[serde(default)]
    pub title: String,
    pub questions: Vec<Question>,
    pub total_marks: u32,
    pub passing_marks: u32,
}

impl Quiz {
    pub fn question(&self, text: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.question == text)
    }
}

/// Outcome of grading one answer set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeResult {
    pub score: u32,
    pub total: u32,
    pub passed: bool,
}
