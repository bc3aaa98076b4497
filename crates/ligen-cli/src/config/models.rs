use ligen::engine::config::RunConfig;
use std::path::PathBuf;

pub struct AppConfig {
    pub run: RunConfig,
    /// Rule-file filters to register before the run, as `(name, path)`.
    pub rule_files: Vec<(String, PathBuf)>,
}
