pub mod address;
pub mod browser;
pub mod captcha;
pub mod config;
pub mod error;
pub mod flow;
pub mod models;
pub mod report;
pub mod scheduler;
pub mod utils;
