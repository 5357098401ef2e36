pub mod progress;
pub mod rewards;
