pub mod attendance;
pub mod config;
pub mod login;
pub mod project;
pub mod raw;
