use super::types::*;
use crate::config::{expand_env_vars, expand_tilde, ENV_REFERENCE};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
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

/// Load, expand and validate the configuration at `path`.
///
/// Relative input and template paths are resolved against the directory
/// containing the config file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = std::fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut config = parse_config(&yaml_string)?;

    let config_dir = path.parent().unwrap_or_else(|| Path::new("."));
    resolve_paths(&mut config, config_dir);

    validate_config(&config)?;

    Ok(config)
}

/// Parse a YAML document into a [`Config`] after `$env{VAR}` expansion.
/// Paths are left as written.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml_string = expand_env_vars(yaml);

    check_unexpanded_vars(&yaml_string)?;

    Ok(serde_yaml::from_str(&yaml_string)?)
}

/// Fails on `$env{NAME}` references left behind by [`expand_env_vars`],
/// naming every missing variable once.
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let reference = Regex::new(ENV_REFERENCE).unwrap();
    let missing: BTreeSet<&str> = reference
        .captures_iter(yaml_string)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
        .collect();

    if missing.is_empty() {
        return Ok(());
    }

    let names: Vec<&str> = missing.into_iter().collect();
    let example = names[0];
    Err(ConfigError::Validation(format!(
        "config references unset environment variable(s): {}\n\
         Export them before starting sest (e.g. `export {}=/var/log/myapp`) \
         or write the tailed paths into the config directly",
        names.join(", "),
        example
    )))
}

/// Expands `~` and anchors relative paths at `base`.
fn resolve_paths(config: &mut Config, base: &Path) {
    let resolve = |path: &Path| -> PathBuf {
        let expanded = expand_tilde(path);
        if expanded.is_absolute() {
            expanded
        } else {
            base.join(expanded)
        }
    };

    for file in config.input.files.iter_mut() {
        *file = resolve(file);
    }

    for dir in config.input.directories.iter_mut() {
        *dir = resolve(dir);
    }

    for (_, event) in config.events.iter_mut() {
        event.dest = resolve(&event.dest);
    }
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    if config.input.files.is_empty() && config.input.directories.is_empty() {
        errors.push(
            "input must name at least one file ('input.files') or directory ('input.directories')"
                .to_string(),
        );
    }

    if config.watch.poll_interval.is_zero() {
        errors.push("watch.poll_interval must be greater than zero".to_string());
    }

    // A bad filter, bad patterns and missing templates are not listed here.
    // They are logged where they are used and startup continues.

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}
