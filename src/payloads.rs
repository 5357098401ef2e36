pub mod progress;
pub mod rewards;

pub use progress::{CourseParams, StudentParams, SubmitQuizPayload, WatchParams};
pub use rewards::LeaderboardParams;
