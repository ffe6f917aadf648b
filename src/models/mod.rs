pub mod schedule;
pub mod task;
pub mod user;
