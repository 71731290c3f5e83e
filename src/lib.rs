pub mod adapt;
pub mod app;
pub mod config;
pub mod error;
pub mod format;
pub mod handlers;
pub mod logs;
pub mod relay;
pub mod resolve;
pub mod types;
pub mod upstream;
