pub mod add;
pub mod clear;
pub mod common;
pub mod config;
pub mod delete;
pub mod export;
pub mod import;
pub mod list;
pub mod status;
pub mod update;
pub mod watch;
