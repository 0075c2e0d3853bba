pub mod api;
pub mod catalog;
pub mod config;
pub mod content_patch;
pub mod creation_log;
pub mod database;
pub mod error;
pub mod logger;
pub mod orchestrator;
pub mod services;
pub mod users;
