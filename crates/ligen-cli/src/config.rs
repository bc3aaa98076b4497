//! Run configuration assembled from defaults, an optional TOML file, `--set`
//! overrides and command-line flags.

mod builder;
mod defaults;
mod file;
mod models;

pub use builder::build_config;
pub use models::AppConfig;
