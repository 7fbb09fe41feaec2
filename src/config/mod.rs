pub mod parse;
pub mod types;

use regex::Regex;
use std::path::{Path, PathBuf};

pub use parse::{load_config, parse_config, ConfigError};
pub use types::{
    Config, EventConfig, InputConfig, OutputConfig, OutputFormat, ReadStart, WatchConfig,
    WatchMode,
};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "SEST_CONFIG_PATH";

/// Config file used when neither `--config` nor `SEST_CONFIG_PATH` is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sest/config.yml";

/// Matches a `$env{NAME}` reference; group 1 is the variable name.
pub(crate) const ENV_REFERENCE: &str = r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}";

/// Replace every `$env{NAME}` with the value of `NAME`. References to unset
/// variables are kept verbatim so they can be reported afterwards.
pub fn expand_env_vars(text: &str) -> String {
    let reference = Regex::new(ENV_REFERENCE).unwrap();

    reference
        .replace_all(text, |caps: &regex::Captures| match std::env::var(&caps[1]) {
            Ok(value) => value,
            Err(_) => caps[0].to_string(),
        })
        .into_owned()
}

/// `~` and `~/rest` become paths under the home directory. Anything else,
/// including `~user`, is returned as is.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let (Ok(rest), Some(home)) = (path.strip_prefix("~"), dirs::home_dir()) else {
        return path.to_path_buf();
    };

    if rest.as_os_str().is_empty() {
        home
    } else {
        home.join(rest)
    }
}

/// Resolves the config file path.
/// Order: explicit path (tilde-expanded), then `SEST_CONFIG_PATH`, then
/// `/etc/sest/config.yml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return expand_tilde(path);
    }

    match std::env::var_os(CONFIG_PATH_ENV) {
        Some(value) if !value.is_empty() => expand_tilde(Path::new(&value)),
        _ => PathBuf::from(DEFAULT_CONFIG_PATH),
    }
}
