pub mod app;
pub mod cli;
pub mod config;
pub mod imaging;
pub mod navigation;
pub mod notifications;
pub mod sharing;
pub mod source;
pub mod timeline;

pub use app::Journal;
pub use config::{AppConfig, ConfigLoader, ConfigPaths};
