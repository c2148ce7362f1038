pub mod commands;
pub mod config;
pub mod db;
pub mod logging;
pub mod rss;
pub mod scheduler;

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_DB: &str = "db_query";
pub const TARGET_SCHEDULER: &str = "scheduler";
