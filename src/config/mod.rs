pub mod generate;
pub mod parse;
pub mod types;

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub use parse::{load_config, parse_config, validate_config, ConfigError};
pub use types::{Config, ConsumerConfig, IndexConfig, SchedulerConfig};

pub(crate) fn env_var_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env var pattern is valid")
    })
}

/// Replaces every `$env{NAME}` whose variable is set; unset ones stay as written.
pub fn expand_env_vars(text: &str) -> String {
    env_var_regex()
        .replace_all(text, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// `--config` wins and may start with `~`; otherwise the first existing
/// default location.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(home_relative(path)),
        None => default_config_paths().into_iter().find(|path| path.exists()),
    }
}

fn home_relative(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// Default lookup locations, most specific first.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(2);
    if let Some(home_dir) = dirs::home_dir() {
        paths.push(home_dir.join(USER_CONFIG_PATH));
    }
    paths.push(PathBuf::from(SYSTEM_CONFIG_PATH));
    paths
}

pub const USER_CONFIG_PATH: &str = ".config/conveyor/config.yml";
pub const SYSTEM_CONFIG_PATH: &str = "/etc/conveyor/config.yml";
