pub mod crypto;
pub mod logger;
