use serde::{Deserialize, Serialize};

pub const DEFAULT_LEADERBOARD_LIMIT: usize = 50;
pub const MAX_LEADERBOARD_LIMIT: usize = 100;

#[derive(Deserialize, Serialize, Debug, Default)]
pub struct LeaderboardParams {
    pub limit: Option<usize>,
}

impl LeaderboardParams {
    /// Requested size clamped to `1..=MAX_LEADERBOARD_LIMIT`.
    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
            .clamp(1, MAX_LEADERBOARD_LIMIT)
    }
}
