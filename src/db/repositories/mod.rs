pub mod task_repository;
pub mod token_repository;
pub mod user_repository;
