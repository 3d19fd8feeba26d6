pub mod config;
pub mod format;
pub mod paths;
pub mod types;

pub use config::Config;
pub use format::{format_duration, goal_label};
pub use paths::PbossPaths;
pub use types::*;
