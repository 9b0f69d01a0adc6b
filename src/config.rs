//! # Engine Configuration
//!
//! Defaults for how an [`Engine`](crate::Engine) runs its units. Values come
//! from code (builder methods), JSON, or the environment:
//!
//! | Variable | Field |
//! |---|---|
//! | `ASSAY_DEBUG` | `debug` (`1`, `true`, `yes`, `on`) |
//! | `ASSAY_MAX_SUITE_DEPTH` | `max_suite_depth` |

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::errors::AssayError;

pub const DEFAULT_MAX_SUITE_DEPTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How many suites may be nested inside one run before a suite stops
    /// expanding its members.
    pub max_suite_depth: usize,
    /// Runs propagate failures instead of reporting them, unless a test or
    /// run says otherwise.
    pub debug: bool,
    /// Debug mode for the zero-argument run form when attached to a terminal.
    pub interactive_debug: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_suite_depth: DEFAULT_MAX_SUITE_DEPTH,
            debug: false,
            interactive_debug: true,
        }
    }
}

static GLOBAL: Lazy<EngineConfig> = Lazy::new(|| EngineConfig::from_env().unwrap_or_default());

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment-derived defaults, read once per process. Invalid values
    /// fall back to the built-in defaults.
    pub fn global() -> &'static EngineConfig {
        &GLOBAL
    }

    pub fn max_suite_depth(mut self, depth: usize) -> Self {
        self.max_suite_depth = depth;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn interactive_debug(mut self, debug: bool) -> Self {
        self.interactive_debug = debug;
        self
    }

    pub fn from_json(text: &str) -> Result<Self, AssayError> {
        serde_json::from_str(text).map_err(|e| AssayError::Config {
            message: e.to_string(),
        })
    }

    pub fn from_env() -> Result<Self, AssayError> {
        Self::from_vars(std::env::vars())
    }

    /// Applies `ASSAY_*` variables from `vars` over the defaults.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, AssayError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::default();
        for (key, value) in vars {
            let value = value.as_ref().trim();
            match key.as_ref() {
                "ASSAY_DEBUG" => config.debug = parse_flag("ASSAY_DEBUG", value)?,
                "ASSAY_MAX_SUITE_DEPTH" => {
                    config.max_suite_depth = value.parse().map_err(|_| AssayError::Config {
                        message: format!("ASSAY_MAX_SUITE_DEPTH must be a number, got {:?}", value),
                    })?
                }
                _ => {}
            }
        }
        Ok(config)
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool, AssayError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AssayError::Config {
            message: format!("{} must be a boolean, got {:?}", name, other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vars_override_defaults() {
        let config = EngineConfig::from_vars([
            ("ASSAY_DEBUG", "yes"),
            ("ASSAY_MAX_SUITE_DEPTH", "3"),
            ("UNRELATED", "x"),
        ])
        .unwrap();
        assert!(config.debug);
        assert_eq!(config.max_suite_depth, 3);
    }

    #[test]
    fn bad_values_are_config_errors() {
        let err = EngineConfig::from_vars([("ASSAY_MAX_SUITE_DEPTH", "deep")]).unwrap_err();
        assert!(matches!(err, AssayError::Config { .. }));
        assert!(EngineConfig::from_vars([("ASSAY_DEBUG", "maybe")]).is_err());
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = EngineConfig::from_json(r#"{"debug": true}"#).unwrap();
        assert!(config.debug);
        assert_eq!(config.max_suite_depth, DEFAULT_MAX_SUITE_DEPTH);
        assert!(EngineConfig::from_json("[").is_err());
    }
}
