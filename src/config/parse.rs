use super::types::*;
use crate::config::{env_var_regex, expand_env_vars};
use crate::parser::ParserRegistry;
use crate::scheduler::StrategyRegistry;
use crate::source::PROP_PARSER;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

/// Loads a config file, validating it against the built-in strategies and parsers.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    let config = parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })?;

    validate_config(
        &config,
        &StrategyRegistry::with_builtins(),
        &ParserRegistry::with_builtins(),
    )?;

    Ok(config)
}

/// Expands `$env{VAR}` references and deserializes, without validating.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml_string)?;
    Ok(serde_yaml::from_str(&yaml_string)?)
}

/// Fails on any `$env{VAR}` reference still present after expansion.
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let mut unexpanded_vars: Vec<&str> = env_var_regex()
        .captures_iter(yaml_string)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort_unstable();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with the actual value",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             Set them before starting, or replace them in the config file.",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

/// Collects every problem in the config instead of stopping at the first.
pub fn validate_config(
    config: &Config,
    strategies: &StrategyRegistry,
    parsers: &ParserRegistry,
) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.scheduler.lock_duration_seconds == 0 {
        errors.push("scheduler.lock_duration_seconds must be greater than zero".to_string());
    }
    if config.scheduler.pass_interval.is_zero() {
        errors.push("scheduler.pass_interval must be greater than zero".to_string());
    }
    if config.scheduler.queue_capacity == 0 {
        errors.push("scheduler.queue_capacity must be greater than zero".to_string());
    }
    if config.index.url.trim().is_empty() {
        errors.push("index.url cannot be empty".to_string());
    }
    if config.index.mappings_path.trim().is_empty() {
        errors.push("index.mappings_path cannot be empty".to_string());
    }

    let mut type_keys = HashSet::new();
    for (i, source) in config.sources.iter().enumerate() {
        let prefix = if source.type_key.is_empty() {
            format!("sources[{}]", i)
        } else {
            format!("source '{}'", source.type_key)
        };

        if source.type_key.trim().is_empty() {
            errors.push(format!("{}: type_key cannot be empty", prefix));
        } else if !type_keys.insert(source.type_key.as_str()) {
            errors.push(format!("{}: duplicate type_key", prefix));
        }

        if source.scheduling_frequency.is_zero() {
            errors.push(format!(
                "{}: scheduling_frequency must be greater than zero",
                prefix
            ));
        }

        if !strategies.contains(&source.scheduler_type) {
            errors.push(format!(
                "{}: unknown scheduler_type '{}' (known: {})",
                prefix,
                source.scheduler_type,
                strategies.names().collect::<Vec<_>>().join(", ")
            ));
        }

        if let Some(parser) = source.property(PROP_PARSER) {
            if !parsers.contains(parser) {
                errors.push(format!(
                    "{}: unknown parser '{}' (known: {})",
                    prefix,
                    parser,
                    parsers.names().collect::<Vec<_>>().join(", ")
                ));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registries() -> (StrategyRegistry, ParserRegistry) {
        (StrategyRegistry::with_builtins(), ParserRegistry::with_builtins())
    }

    const VALID: &str = r#"
index:
  url: http://localhost:9200
  mappings_path: https://example.com/mappings/
sources:
  - type_key: site_a
    scheduler_type: windowed
    scheduling_frequency: 5m
    properties:
      Parser: sitecore
"#;

    #[test]
    fn test_valid_config_passes() {
        let config = parse_config(VALID).unwrap();
        let (strategies, parsers) = registries();
        validate_config(&config, &strategies, &parsers).unwrap();
        assert!(config.sources[0].active);
    }

    #[test]
    fn test_unknown_names_are_reported_together() {
        let mut config = parse_config(VALID).unwrap();
        config.sources[0].scheduler_type = "cron".to_string();
        config.sources[0]
            .properties
            .insert(PROP_PARSER.to_string(), "json".to_string());
        let (strategies, parsers) = registries();

        match validate_config(&config, &strategies, &parsers) {
            Err(ConfigError::ValidationList(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(errors[0].contains("unknown scheduler_type 'cron'"));
                assert!(errors[1].contains("unknown parser 'json'"));
            }
            other => panic!("expected validation errors, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_type_keys_rejected() {
        let mut config = parse_config(VALID).unwrap();
        config.sources.push(config.sources[0].clone());
        let (strategies, parsers) = registries();

        let err = validate_config(&config, &strategies, &parsers).unwrap_err();
        assert!(err.to_string().contains("duplicate type_key"));
    }

    #[test]
    fn test_unset_env_var_is_an_error() {
        let yaml = VALID.replace(
            "http://localhost:9200",
            "$env{CONVEYOR_TEST_SURELY_UNSET_VAR}",
        );
        let err = parse_config(&yaml).unwrap_err();
        assert!(err.to_string().contains("CONVEYOR_TEST_SURELY_UNSET_VAR"));
    }
}
