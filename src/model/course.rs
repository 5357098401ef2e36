use serde::{Deserialize, Serialize};

/// Course data owned by the course catalog. Only the fields the engine reads are kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub course_id: String,
    #[serde(default)]
    pub title: String,
    /// Credits granted on the first quiz pass.
    pub credits: u64,
    pub duration_minutes: u32,
}
