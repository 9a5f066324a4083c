pub mod data;
pub mod day_bucket;
pub mod grader;
pub mod parlay;
pub mod payout;
