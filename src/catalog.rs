//! Read-only course catalog: courses, their quizzes and the badge catalog.
//!
//! The catalog is owned by the course-catalog service; this server receives it as a JSON
//! document at startup and never mutates it.

use crate::model::{Badge, Course, Quiz, default_badges};
use crate::payloads::progress::{MAX_ANSWERS, MAX_OPTION_LEN, MAX_QUESTION_LEN};
use anyhow::{Context, bail, ensure};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;

#[derive(Deserialize, Debug)]
struct CatalogDocument {
    #[serde(default)]
    courses: Vec<Course>,
    #[serde(default)]
    quizzes: Vec<Quiz>,
    #[serde(default = "default_badges")]
    badges: Vec<Badge>,
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    courses: HashMap<String, Course>,
    quizzes: HashMap<String, Quiz>,
    quiz_by_course: HashMap<String, String>,
    badges: Vec<Badge>,
}

impl Catalog {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        let catalog = Self::from_json_str(&raw)
            .with_context(|| format!("Invalid catalog file {}", path.display()))?;

        info!(
            "Loaded catalog with {} courses, {} quizzes and {} badges",
            catalog.courses.len(),
            catalog.quizzes.len(),
            catalog.badges.len()
        );
        Ok(catalog)
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let document: CatalogDocument =
            serde_json::from_str(raw).context("Failed to parse catalog JSON")?;
        Self::new(document.courses, document.quizzes, document.badges)
    }

    pub fn new(courses: Vec<Course>, quizzes: Vec<Quiz>, badges: Vec<Badge>) -> anyhow::Result<Self> {
        let mut catalog = Catalog::default();

        for course in courses {
            ensure!(!course.course_id.is_empty(), "Course with empty course_id");
            let course_id = course.course_id.clone();
            if catalog.courses.insert(course_id.clone(), course).is_some() {
                bail!("Duplicate course_id {}", course_id);
            }
        }

        for quiz in quizzes {
            validate_quiz(&quiz)?;
            ensure!(
                catalog.courses.contains_key(&quiz.course_id),
                "Quiz {} references unknown course {}",
                quiz.quiz_id,
                quiz.course_id
            );
            if let Some(existing) = catalog
                .quiz_by_course
                .insert(quiz.course_id.clone(), quiz.quiz_id.clone())
            {
                bail!(
                    "Course {} has more than one quiz ({} and {})",
                    quiz.course_id,
                    existing,
                    quiz.quiz_id
                );
            }
            let quiz_id = quiz.quiz_id.clone();
            if catalog.quizzes.insert(quiz_id.clone(), quiz).is_some() {
                bail!("Duplicate quiz_id {}", quiz_id);
            }
        }

        let mut badge_ids = HashSet::new();
        for badge in &badges {
            ensure!(
                badge_ids.insert(badge.badge_id.as_str()),
                "Duplicate badge_id {}",
                badge.badge_id
            );
        }
        catalog.badges = badges;

        Ok(catalog)
    }

    pub fn course(&self, course_id: &str) -> Option<&Course> {
        self.courses.get(course_id)
    }

    pub fn quiz(&self, quiz_id: &str) -> Option<&Quiz> {
        self.quizzes.get(quiz_id)
    }

    pub fn quiz_for_course(&self, course_id: &str) -> Option<&Quiz> {
        self.quiz_by_course
            .get(course_id)
            .and_then(|quiz_id| self.quizzes.get(quiz_id))
    }

    pub fn badges(&self) -> &[Badge] {
        &self.badges
    }

    pub fn badge(&self, badge_id: &str) -> Option<&Badge> {
        self.badges.iter().find(|b| b.badge_id == badge_id)
    }
}

fn validate_quiz(quiz: &Quiz) -> anyhow::Result<()> {
    ensure!(!quiz.quiz_id.is_empty(), "Quiz with empty quiz_id");
    ensure!(
        !quiz.questions.is_empty(),
        "Quiz {} has no questions",
        quiz.quiz_id
    );
    ensure!(
        quiz.passing_marks <= quiz.total_marks,
        "Quiz {} passing_marks ({}) exceed total_marks ({})",
        quiz.quiz_id,
        quiz.passing_marks,
        quiz.total_marks
    );

    ensure!(
        quiz.questions.len() <= MAX_ANSWERS,
        "Quiz {} has {} questions, at most {} can be submitted",
        quiz.quiz_id,
        quiz.questions.len(),
        MAX_ANSWERS
    );
    // One mark per question, so the score never exceeds the question count.
    ensure!(
        quiz.passing_marks as usize <= quiz.questions.len(),
        "Quiz {} passing_marks ({}) exceed its {} questions",
        quiz.quiz_id,
        quiz.passing_marks,
        quiz.questions.len()
    );

    let mut texts = HashSet::new();
    for question in &quiz.questions {
        ensure!(
            question.question.len() <= MAX_QUESTION_LEN,
            "Quiz {} has a question longer than {} bytes",
            quiz.quiz_id,
            MAX_QUESTION_LEN
        );
        ensure!(
            question.options.iter().all(|option| option.len() <= MAX_OPTION_LEN),
            "Quiz {} question {:?} has an option longer than {} bytes",
            quiz.quiz_id,
            question.question,
            MAX_OPTION_LEN
        );
        ensure!(
            texts.insert(question.question.as_str()),
            "Quiz {} repeats question {:?}",
            quiz.quiz_id,
            question.question
        );
        ensure!(
            question.options.contains(&question.correct_option),
            "Quiz {} question {:?} has a correct answer that is not among its options",
            quiz.quiz_id,
            question.question
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BadgeRule;

    const CATALOG: &str = r#"{
        "courses": [
            {"course_id": "algebra", "title": "Algebra", "credits": 50, "duration_minutes": 30}
        ],
        "quizzes": [
            {
                "quiz_id": "algebra-quiz",
                "course_id": "algebra",
                "questions": [
                    {"question": "2 + 2", "options": ["3", "4"], "correct_answer": "4"}
                ],
                "total_marks": 1,
                "passing_marks": 1
            }
        ]
    }"#;

    #[test]
    fn test_load_with_default_badges() {
        let catalog = Catalog::from_json_str(CATALOG).unwrap();

        assert_eq!(catalog.course("algebra").unwrap().credits, 50);
        assert_eq!(
            catalog.quiz_for_course("algebra").unwrap().quiz_id,
            "algebra-quiz"
        );
        assert_eq!(catalog.badges().len(), default_badges().len());
        assert_eq!(
            catalog.badge("first-steps").unwrap().rule,
            BadgeRule::CoursesCompleted { count: 1 }
        );
    }

    #[test]
    fn test_quiz_answer_not_serialized() {
        let catalog = Catalog::from_json_str(CATALOG).unwrap();
        let quiz = catalog.quiz("algebra-quiz").unwrap();

        let json = serde_json::to_string(quiz).unwrap();
        assert!(!json.contains("correct_answer"));
    }

    #[test]
    fn test_rejects_quiz_for_unknown_course() {
        let loaded = Catalog::from_json_str(CATALOG).unwrap();
        let mut quiz = loaded.quiz("algebra-quiz").unwrap().clone();
        quiz.course_id = "nope".to_string();
        let course = loaded.course("algebra").unwrap().clone();

        assert!(Catalog::new(vec![course], vec![quiz], Vec::new()).is_err());
    }

    #[test]
    fn test_rejects_answer_outside_options() {
        let raw = CATALOG.replace(r#""correct_answer": "4""#, r#""correct_answer": "5""#);
        assert!(Catalog::from_json_str(&raw).is_err());
    }

    #[test]
    fn test_rejects_passing_above_question_count() {
        let loaded = Catalog::from_json_str(CATALOG).unwrap();
        let mut quiz = loaded.quiz("algebra-quiz").unwrap().clone();
        quiz.total_marks = 10;
        quiz.passing_marks = 2;
        let course = loaded.course("algebra").unwrap().clone();

        assert!(Catalog::new(vec![course], vec![quiz], Vec::new()).is_err());
    }

    #[test]
    fn test_rejects_question_beyond_submission_limit() {
        let loaded = Catalog::from_json_str(CATALOG).unwrap();
        let mut quiz = loaded.quiz("algebra-quiz").unwrap().clone();
        quiz.questions[0].question = "x".repeat(MAX_QUESTION_LEN + 1);
        let course = loaded.course("algebra").unwrap().clone();

        assert!(Catalog::new(vec![course], vec![quiz], Vec::new()).is_err());
    }

    #[test]
    fn test_rejects_passing_above_total() {
        let raw = CATALOG.replace(r#""passing_marks": 1"#, r#""passing_marks": 2"#);
        assert!(Catalog::from_json_str(&raw).is_err());
    }
}
